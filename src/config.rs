use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_mins: i64,
    pub refresh_token_ttl_days: i64,
    pub otp_ttl_mins: i64,
    pub otp_hourly_limit: i64,
    pub allow_reregistration: bool,
    pub booker_may_cancel: bool,
    pub admin_token: String,
    pub sms_provider: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from_number: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "appoint.db".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            access_token_ttl_mins: env::var("ACCESS_TOKEN_TTL_MINS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            refresh_token_ttl_days: env::var("REFRESH_TOKEN_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            otp_ttl_mins: env::var("OTP_TTL_MINS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            otp_hourly_limit: env::var("OTP_HOURLY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            allow_reregistration: env::var("ALLOW_REREGISTRATION")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            booker_may_cancel: env::var("BOOKER_MAY_CANCEL")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            sms_provider: env::var("SMS_PROVIDER").unwrap_or_else(|_| "console".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_from_number: env::var("TWILIO_FROM_NUMBER").unwrap_or_default(),
        }
    }
}

fn parse_bool(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}
