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

const LAB_ROLES: &[Role] = &[Role::Pathology];
const ORDERING_ROLES: &[Role] = &[Role::Doctor, Role::Pathology];
const READER_ROLES: &[Role] = &[Role::Doctor, Role::Pathology, Role::Patient];

pub fn lab_routes(state: Arc<AppConfig>) -> Router {
    let lab_routes = Router::new()
        .route("/reports", get(handlers::list_lab_reports))
        .route("/reports/{report_id}/collect", post(handlers::collect_sample))
        .route("/reports/{report_id}/publish", post(handlers::publish_report))
        .layer(middleware::from_fn_with_state(LAB_ROLES, role_guard));

    let ordering_routes = Router::new()
        .route("/reports", post(handlers::create_report))
        .layer(middleware::from_fn_with_state(ORDERING_ROLES, role_guard));

    let reader_routes = Router::new()
        .route("/reports/{report_id}", get(handlers::get_report))
        .route(
            "/reports/patients/{patient_id}",
            get(handlers::get_patient_reports),
        )
        .layer(middleware::from_fn_with_state(READER_ROLES, role_guard));

    Router::new()
        .merge(lab_routes)
        .merge(ordering_routes)
        .merge(reader_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
