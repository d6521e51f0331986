pub mod token;

use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;

/// Everything a role can be asked to do. Handlers never test roles directly;
/// they name an action and let the table decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateAppointment,
    CancelAppointment,
    ListAppointments,
    ViewOpenAppointments,
    BookAppointment,
    CancelBooking,
    ListBookings,
    ManageProfile,
}

pub fn permits(role: Role, action: Action) -> bool {
    use Action::*;

    match role {
        Role::Scheduler => matches!(
            action,
            CreateAppointment | CancelAppointment | ListAppointments | ManageProfile
        ),
        Role::Booker => matches!(
            action,
            ViewOpenAppointments | BookAppointment | CancelBooking | ListBookings | ManageProfile
        ),
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub phone: String,
    pub role: Role,
}

pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let claims = state.tokens.verify_access(token)?;
    let role = Role::parse(&claims.rol).ok_or(AppError::Unauthorized)?;

    Ok(AuthUser {
        id: claims.sub,
        phone: claims.phn,
        role,
    })
}

pub fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    action: Action,
) -> Result<AuthUser, AppError> {
    let user = authenticate(state, headers)?;
    if !permits(user.role, action) {
        return Err(AppError::Forbidden(
            "your role is not permitted to do this".to_string(),
        ));
    }
    Ok(user)
}
