use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::auth::{self, Action};
use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

use super::AppointmentResponse;

// GET /api/booker/appointments/open
#[derive(Deserialize)]
pub struct OpenQuery {
    pub limit: Option<i64>,
}

pub async fn list_open(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<OpenQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    auth::authorize(&state, &headers, Action::ViewOpenAppointments)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_open_appointments(&db, limit)?
    };

    Ok(Json(
        appointments
            .into_iter()
            .map(AppointmentResponse::from)
            .collect(),
    ))
}

// POST /api/booker/appointments/:id/book
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, AppError> {
    let user = auth::authorize(&state, &headers, Action::BookAppointment)?;

    let appt = {
        let db = state.db.lock().unwrap();

        // One upcoming appointment per booker.
        if queries::next_appointment_for_booker(&db, &user.id)?.is_some() {
            return Err(AppError::Validation(
                "you already have an upcoming appointment".to_string(),
            ));
        }

        if !queries::book_appointment(&db, &id, &user.id)? {
            match queries::get_appointment_by_id(&db, &id)? {
                None => return Err(AppError::NotFound("appointment not found".to_string())),
                Some(_) => {
                    return Err(AppError::Conflict(
                        "appointment is no longer open".to_string(),
                    ))
                }
            }
        }

        queries::get_appointment_by_id(&db, &id)?
            .ok_or_else(|| AppError::NotFound("appointment not found".to_string()))?
    };

    tracing::info!(booker = %user.id, appointment = %id, "appointment booked");
    Ok(Json(AppointmentResponse::from(appt)))
}

// GET /api/booker/appointments
#[derive(Deserialize)]
pub struct MyAppointmentsQuery {
    /// "upcoming", "past", or absent for everything.
    pub scope: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_my_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MyAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    let user = auth::authorize(&state, &headers, Action::ListBookings)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments_for_booker(&db, &user.id, query.scope.as_deref(), limit)?
    };

    Ok(Json(
        appointments
            .into_iter()
            .map(AppointmentResponse::from)
            .collect(),
    ))
}

// GET /api/booker/appointments/next
pub async fn next_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AppointmentResponse>, AppError> {
    let user = auth::authorize(&state, &headers, Action::ListBookings)?;

    let appt = {
        let db = state.db.lock().unwrap();
        queries::next_appointment_for_booker(&db, &user.id)?
    }
    .ok_or_else(|| AppError::NotFound("no upcoming appointment".to_string()))?;

    Ok(Json(AppointmentResponse::from(appt)))
}

// POST /api/booker/appointments/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = auth::authorize(&state, &headers, Action::CancelBooking)?;

    if !state.config.booker_may_cancel {
        return Err(AppError::Forbidden(
            "cancellations are handled by the scheduler".to_string(),
        ));
    }

    {
        let db = state.db.lock().unwrap();
        if !queries::cancel_appointment_by_booker(&db, &id, &user.id)? {
            match queries::get_appointment_by_id(&db, &id)? {
                None => return Err(AppError::NotFound("appointment not found".to_string())),
                Some(appt) if appt.booker_id.as_deref() != Some(user.id.as_str()) => {
                    return Err(AppError::Forbidden(
                        "appointment is not yours to cancel".to_string(),
                    ));
                }
                Some(_) => {
                    return Err(AppError::Conflict(
                        "appointment is not currently booked".to_string(),
                    ));
                }
            }
        }
    }

    tracing::info!(booker = %user.id, appointment = %id, "booking cancelled");
    Ok(Json(serde_json::json!({"ok": true})))
}
