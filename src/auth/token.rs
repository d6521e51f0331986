use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::User;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Phone number, carried for log correlation.
    pub phn: String,
    /// Role string, the one claim the permission table reads.
    pub rol: String,
    /// Token type discriminant: an access token is never accepted where a
    /// refresh token is expected, and vice versa.
    pub typ: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> NaiveDateTime {
        chrono::DateTime::from_timestamp(self.exp, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or_else(|| Utc::now().naive_utc())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_mins: i64,
    refresh_ttl_days: i64,
}

impl TokenService {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.jwt_secret.is_empty(), "JWT_SECRET must be set");
        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl_mins: config.access_token_ttl_mins,
            refresh_ttl_days: config.refresh_token_ttl_days,
        })
    }

    pub fn issue_pair(&self, user: &User) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(
                user,
                TOKEN_TYPE_ACCESS,
                chrono::Duration::minutes(self.access_ttl_mins),
            )?,
            refresh_token: self.issue(
                user,
                TOKEN_TYPE_REFRESH,
                chrono::Duration::days(self.refresh_ttl_days),
            )?,
        })
    }

    fn issue(&self, user: &User, typ: &str, ttl: chrono::Duration) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            phn: user.phone.clone(),
            rol: user.role.as_str().to_string(),
            typ: typ.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).context("failed to sign token")
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TOKEN_TYPE_ACCESS)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.verify(token, TOKEN_TYPE_REFRESH)
    }

    /// Signature, expiry and type check in one place. Every failure collapses
    /// to Unauthorized; callers never learn which check tripped.
    fn verify(&self, token: &str, expected_typ: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| AppError::Unauthorized)?;

        if data.claims.typ != expected_typ {
            return Err(AppError::Unauthorized);
        }
        Ok(data.claims)
    }
}
