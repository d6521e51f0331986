use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::token::TokenPair;
use crate::auth::{self, Action};
use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{normalize_phone, Role, User};
use crate::services::otp;
use crate::state::AppState;

use super::UserResponse;

// POST /api/account/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub role: String,
    pub name: String,
    pub family: Option<String>,
    pub bio: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phone = validate_phone(&body.phone)?;
    let role = Role::parse(body.role.trim())
        .ok_or_else(|| AppError::Validation("role must be 'scheduler' or 'booker'".to_string()))?;
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }

    let code = {
        let db = state.db.lock().unwrap();

        // An existing phone keeps its user row; whether it may request a new
        // code is a deployment decision, a different role never is.
        match queries::get_user_by_phone(&db, &phone)? {
            Some(existing) => {
                if existing.role != role {
                    return Err(AppError::Validation(
                        "phone is already registered with a different role".to_string(),
                    ));
                }
                if !state.config.allow_reregistration {
                    return Err(AppError::Validation(
                        "phone is already registered".to_string(),
                    ));
                }
            }
            None => {
                let user = User {
                    id: Uuid::new_v4().to_string(),
                    phone: phone.clone(),
                    role,
                    name,
                    family: body.family.map(|f| f.trim().to_string()).unwrap_or_default(),
                    bio: body
                        .bio
                        .map(|b| b.trim().to_string())
                        .filter(|b| !b.is_empty()),
                    created_at: Utc::now().naive_utc(),
                };
                queries::create_user(&db, &user)?;
                tracing::info!(phone = %phone, role = %role.as_str(), "registered user");
            }
        }

        issue_code_limited(&db, &state.config, &phone)?
    };

    let delivered = deliver_code(&state, &phone, &code).await;
    Ok(Json(
        serde_json::json!({"message": "verification code sent", "delivered": delivered}),
    ))
}

// POST /api/account/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub phone: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phone = validate_phone(&body.phone)?;

    let code = {
        let db = state.db.lock().unwrap();
        if queries::get_user_by_phone(&db, &phone)?.is_none() {
            return Err(AppError::NotFound("phone is not registered".to_string()));
        }
        issue_code_limited(&db, &state.config, &phone)?
    };

    let delivered = deliver_code(&state, &phone, &code).await;
    Ok(Json(
        serde_json::json!({"message": "verification code sent", "delivered": delivered}),
    ))
}

// POST /api/account/verify
#[derive(Deserialize)]
pub struct VerifyRequest {
    pub phone: String,
    pub code: String,
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let phone = validate_phone(&body.phone)?;

    let user = {
        let db = state.db.lock().unwrap();
        let user = queries::get_user_by_phone(&db, &phone)?
            .ok_or_else(|| AppError::NotFound("phone is not registered".to_string()))?;
        otp::verify_code(&db, &phone, body.code.trim())?;
        user
    };

    let pair = state.tokens.issue_pair(&user)?;
    tracing::info!(phone = %phone, "code verified, token pair issued");
    Ok(Json(pair))
}

// POST /api/account/refresh
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let claims = state.tokens.verify_refresh(&body.refresh_token)?;

    let user = {
        let db = state.db.lock().unwrap();
        if queries::is_token_revoked(&db, &claims.jti)? {
            return Err(AppError::Unauthorized);
        }
        // Rotation: the presented token is spent no matter what follows.
        queries::revoke_token(&db, &claims.jti, &claims.expires_at())?;
        queries::get_user_by_id(&db, &claims.sub)?.ok_or(AppError::Unauthorized)?
    };

    let pair = state.tokens.issue_pair(&user)?;
    Ok(Json(pair))
}

// POST /api/account/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = state.tokens.verify_refresh(&body.refresh_token)?;

    {
        let db = state.db.lock().unwrap();
        queries::revoke_token(&db, &claims.jti, &claims.expires_at())?;
    }

    tracing::info!(phone = %claims.phn, "logged out");
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/account/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, AppError> {
    let auth_user = auth::authorize(&state, &headers, Action::ManageProfile)?;

    let user = {
        let db = state.db.lock().unwrap();
        queries::get_user_by_id(&db, &auth_user.id)?
            .ok_or_else(|| AppError::NotFound("user no longer exists".to_string()))?
    };

    Ok(Json(UserResponse::from(user)))
}

// POST /api/account/profile
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub family: Option<String>,
    pub bio: Option<String>,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let auth_user = auth::authorize(&state, &headers, Action::ManageProfile)?;

    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".to_string()));
        }
    }

    let user = {
        let db = state.db.lock().unwrap();
        let mut user = queries::get_user_by_id(&db, &auth_user.id)?
            .ok_or_else(|| AppError::NotFound("user no longer exists".to_string()))?;

        if let Some(name) = body.name {
            user.name = name.trim().to_string();
        }
        if let Some(family) = body.family {
            user.family = family.trim().to_string();
        }
        if let Some(bio) = body.bio {
            let bio = bio.trim().to_string();
            user.bio = if bio.is_empty() { None } else { Some(bio) };
        }

        queries::update_user_profile(&db, &user)?;
        user
    };

    Ok(Json(UserResponse::from(user)))
}

fn validate_phone(raw: &str) -> Result<String, AppError> {
    normalize_phone(raw).ok_or_else(|| {
        AppError::Validation(
            "phone must be 7 to 15 digits with an optional leading +".to_string(),
        )
    })
}

/// Rate check, supersede, insert, and a piggybacked purge of stale rows. The
/// caller still holds the lock; only the returned code crosses an await.
fn issue_code_limited(
    db: &Connection,
    config: &AppConfig,
    phone: &str,
) -> Result<String, AppError> {
    let request_count = queries::record_otp_request(db, phone)?;
    if request_count > config.otp_hourly_limit {
        tracing::warn!(phone = %phone, count = request_count, "code request limit exceeded");
        return Err(AppError::RateLimited(
            "too many code requests for this phone, try again later".to_string(),
        ));
    }

    let otp = otp::issue_code(db, phone, config.otp_ttl_mins)?;
    tracing::info!(phone = %phone, expires_at = %otp.expires_at, "verification code issued");

    if let Err(e) = queries::purge_expired(db) {
        tracing::warn!(error = %e, "failed to purge expired rows");
    }

    Ok(otp.code)
}

/// Delivery failure is reported, never fatal: the code is already persisted
/// and stays verifiable.
async fn deliver_code(state: &AppState, phone: &str, code: &str) -> bool {
    match state.sms.send_code(phone, code).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, phone = %phone, "code delivery failed");
            false
        }
    }
}
