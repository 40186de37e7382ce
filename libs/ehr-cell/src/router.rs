use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_utils::extractor::{auth_middleware, role_guard};

use crate::handlers;

const AUTHOR_ROLES: &[Role] = &[Role::Doctor];
const READER_ROLES: &[Role] = &[Role::Doctor, Role::Patient];

pub fn ehr_routes(state: Arc<AppConfig>) -> Router {
    let author_routes = Router::new()
        .route("/", post(handlers::create_record))
        .route("/{record_id}", put(handlers::update_record))
        .route("/{record_id}/complete", post(handlers::complete_record))
        .route("/{record_id}/sign", post(handlers::sign_record))
        .layer(middleware::from_fn_with_state(AUTHOR_ROLES, role_guard));

    let reader_routes = Router::new()
        .route("/{record_id}", get(handlers::get_record))
        .route("/patients/{patient_id}", get(handlers::get_patient_records))
        .layer(middleware::from_fn_with_state(READER_ROLES, role_guard));

    Router::new()
        .merge(author_routes)
        .merge(reader_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
