use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_utils::extractor::{auth_middleware, role_guard};

use crate::handlers;

const DOCTOR_ROLES: &[Role] = &[Role::Doctor];
const BOOKING_ROLES: &[Role] = &[Role::Doctor, Role::Patient];

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Queue actions are fired from the doctor dashboard only.
    let doctor_routes = Router::new()
        .route("/queue", get(handlers::get_queue))
        .route("/stats", get(handlers::get_appointment_stats))
        .route("/{appointment_id}/queue", post(handlers::add_to_queue))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", post(handlers::request_reschedule))
        .route(
            "/{appointment_id}/reschedule/confirm",
            post(handlers::confirm_reschedule),
        )
        .route("/{appointment_id}/follow-up", post(handlers::schedule_follow_up))
        .layer(middleware::from_fn_with_state(DOCTOR_ROLES, role_guard));

    let shared_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/room", post(handlers::open_consultation_room))
        .route(
            "/patients/{patient_id}",
            get(handlers::get_patient_appointments),
        )
        .layer(middleware::from_fn_with_state(BOOKING_ROLES, role_guard));

    Router::new()
        .merge(doctor_routes)
        .merge(shared_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
