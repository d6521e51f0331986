use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{self, Action};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus};
use crate::state::AppState;

use super::AppointmentResponse;

// POST /api/scheduler/appointments
#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    pub starts_at: String,
    pub duration_minutes: i32,
    pub note: Option<String>,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), AppError> {
    let user = auth::authorize(&state, &headers, Action::CreateAppointment)?;

    let starts_at = parse_starts_at(&body.starts_at)?;
    if !(5..=480).contains(&body.duration_minutes) {
        return Err(AppError::Validation(
            "duration_minutes must be between 5 and 480".to_string(),
        ));
    }

    let now = Utc::now().naive_utc();
    let appt = Appointment {
        id: Uuid::new_v4().to_string(),
        scheduler_id: user.id.clone(),
        booker_id: None,
        starts_at,
        duration_minutes: body.duration_minutes,
        status: AppointmentStatus::Open,
        note: body.note.filter(|n| !n.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };

    let inserted = {
        let db = state.db.lock().unwrap();
        queries::insert_appointment(&db, &appt)?
    };
    if !inserted {
        return Err(AppError::Conflict(
            "you already have a slot at that time".to_string(),
        ));
    }

    tracing::info!(scheduler = %user.id, starts_at = %appt.starts_at, "appointment created");
    Ok((StatusCode::CREATED, Json(AppointmentResponse::from(appt))))
}

// GET /api/scheduler/appointments
#[derive(Deserialize)]
pub struct ListAppointmentsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    let user = auth::authorize(&state, &headers, Action::ListAppointments)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let status_filter = query.status.as_deref();

    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments_for_scheduler(&db, &user.id, status_filter, limit)?
    };

    Ok(Json(
        appointments
            .into_iter()
            .map(AppointmentResponse::from)
            .collect(),
    ))
}

// POST /api/scheduler/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = auth::authorize(&state, &headers, Action::CancelAppointment)?;

    {
        let db = state.db.lock().unwrap();
        if !queries::cancel_appointment_by_scheduler(&db, &id, &user.id)? {
            // Zero rows affected: work out which refusal this was.
            match queries::get_appointment_by_id(&db, &id)? {
                None => {
                    return Err(AppError::NotFound("appointment not found".to_string()));
                }
                Some(appt) if appt.scheduler_id != user.id => {
                    return Err(AppError::Forbidden(
                        "appointment belongs to another scheduler".to_string(),
                    ));
                }
                Some(_) => {
                    return Err(AppError::Conflict(
                        "appointment is already cancelled".to_string(),
                    ));
                }
            }
        }
    }

    tracing::info!(scheduler = %user.id, appointment = %id, "appointment cancelled");
    Ok(Json(serde_json::json!({"ok": true})))
}

fn parse_starts_at(s: &str) -> Result<NaiveDateTime, AppError> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .map_err(|_| {
            AppError::Validation("starts_at must look like 2025-07-01 14:30:00".to_string())
        })
}
