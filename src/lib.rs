pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/account/register", post(handlers::account::register))
        .route("/api/account/login", post(handlers::account::login))
        .route("/api/account/verify", post(handlers::account::verify))
        .route("/api/account/refresh", post(handlers::account::refresh))
        .route("/api/account/logout", post(handlers::account::logout))
        .route("/api/account/profile", get(handlers::account::get_profile))
        .route(
            "/api/account/profile",
            post(handlers::account::update_profile),
        )
        .route(
            "/api/scheduler/appointments",
            post(handlers::scheduler::create_appointment),
        )
        .route(
            "/api/scheduler/appointments",
            get(handlers::scheduler::list_appointments),
        )
        .route(
            "/api/scheduler/appointments/:id/cancel",
            post(handlers::scheduler::cancel_appointment),
        )
        .route(
            "/api/booker/appointments/open",
            get(handlers::booker::list_open),
        )
        .route(
            "/api/booker/appointments/next",
            get(handlers::booker::next_appointment),
        )
        .route(
            "/api/booker/appointments",
            get(handlers::booker::list_my_appointments),
        )
        .route(
            "/api/booker/appointments/:id/book",
            post(handlers::booker::book_appointment),
        )
        .route(
            "/api/booker/appointments/:id/cancel",
            post(handlers::booker::cancel_booking),
        )
        .route("/api/admin/users", get(handlers::admin::list_users))
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
