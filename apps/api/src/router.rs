use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use ehr_cell::router::ehr_routes;
use lab_cell::router::lab_routes;
use patient_cell::router::patient_routes;
use pharmacy_cell::router::pharmacy_routes;
use shared_config::AppConfig;

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "medportal-api",
    }))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "MedPortal API is running!" }))
        .route("/health", get(health))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/ehr", ehr_routes(state.clone()))
        .nest("/pharmacy", pharmacy_routes(state.clone()))
        .nest("/lab", lab_routes(state))
}
