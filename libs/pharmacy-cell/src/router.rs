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
use crate::services::InventoryStore;

const PHARMACY_ROLES: &[Role] = &[Role::Pharmacy];

#[derive(Clone)]
pub struct PharmacyState {
    pub config: Arc<AppConfig>,
    pub inventory: InventoryStore,
}

impl PharmacyState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            inventory: InventoryStore::new(),
        }
    }
}

pub fn pharmacy_routes(config: Arc<AppConfig>) -> Router {
    pharmacy_routes_with_state(PharmacyState::new(config))
}

pub fn pharmacy_routes_with_state(state: PharmacyState) -> Router {
    Router::new()
        .route(
            "/inventory",
            get(handlers::list_inventory).post(handlers::add_item),
        )
        .route("/inventory/preview", post(handlers::preview_import))
        .route("/inventory/import", post(handlers::import_inventory))
        .route("/inventory/export", get(handlers::export_inventory))
        .route("/inventory/summary", get(handlers::inventory_summary))
        .route(
            "/inventory/{item_id}",
            put(handlers::update_item).delete(handlers::delete_item),
        )
        .layer(middleware::from_fn_with_state(PHARMACY_ROLES, role_guard))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
