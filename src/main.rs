use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use appoint::auth::token::TokenService;
use appoint::config::AppConfig;
use appoint::db;
use appoint::services::sms::twilio::TwilioSmsSender;
use appoint::services::sms::{ConsoleSmsSender, SmsSender};
use appoint::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let tokens = TokenService::from_config(&config)?;
    let conn = db::init_db(&config.database_url)?;

    let sms: Box<dyn SmsSender> = match config.sms_provider.as_str() {
        "twilio" => {
            anyhow::ensure!(
                !config.twilio_account_sid.is_empty(),
                "TWILIO_ACCOUNT_SID must be set when SMS_PROVIDER=twilio"
            );
            anyhow::ensure!(
                !config.twilio_auth_token.is_empty(),
                "TWILIO_AUTH_TOKEN must be set when SMS_PROVIDER=twilio"
            );
            anyhow::ensure!(
                !config.twilio_from_number.is_empty(),
                "TWILIO_FROM_NUMBER must be set when SMS_PROVIDER=twilio"
            );
            tracing::info!("using Twilio SMS sender (from: {})", config.twilio_from_number);
            Box::new(TwilioSmsSender::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
                config.twilio_from_number.clone(),
            ))
        }
        _ => {
            tracing::info!("using console SMS sender (codes are logged, not delivered)");
            Box::new(ConsoleSmsSender)
        }
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        sms,
        tokens,
    });

    let app = appoint::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
