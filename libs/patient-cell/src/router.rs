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

const CLINICIAN_ROLES: &[Role] = &[Role::Doctor];

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_patient))
        .route("/search", get(handlers::search_patients))
        .route(
            "/{patient_id}",
            get(handlers::get_patient).put(handlers::update_patient),
        )
        .layer(middleware::from_fn_with_state(CLINICIAN_ROLES, role_guard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
