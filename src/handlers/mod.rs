pub mod account;
pub mod admin;
pub mod booker;
pub mod health;
pub mod scheduler;

use serde::Serialize;

use crate::models::{Appointment, User};

#[derive(Serialize)]
pub struct AppointmentResponse {
    id: String,
    scheduler_id: String,
    booker_id: Option<String>,
    starts_at: String,
    duration_minutes: i32,
    status: String,
    note: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<Appointment> for AppointmentResponse {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            scheduler_id: a.scheduler_id,
            booker_id: a.booker_id,
            starts_at: a.starts_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration_minutes: a.duration_minutes,
            status: a.status.as_str().to_string(),
            note: a.note,
            created_at: a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            updated_at: a.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    id: String,
    phone: String,
    role: String,
    name: String,
    family: String,
    bio: Option<String>,
    created_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            phone: u.phone,
            role: u.role.as_str().to_string(),
            name: u.name,
            family: u.family,
            bio: u.bio,
            created_at: u.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
