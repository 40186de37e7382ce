use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CsvPreview, ImportQuery, ImportReport, InventoryError, InventoryQuery, InventorySummary,
    Medicine, MedicineInput, UpdateMedicineRequest,
};
use crate::router::PharmacyState;
use crate::services::csv_format::{export_inventory_csv, parse_inventory_csv};
use crate::services::fields::medicine_from_input;
use crate::services::reports::{apply_filters, summarize};

/// Each pharmacy account owns one inventory, keyed by its user id.
fn pharmacy_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Token subject is not a valid id".to_string()))
}

// ==============================================================================
// CSV IMPORT / EXPORT
// ==============================================================================

#[axum::debug_handler]
pub async fn preview_import(
    Extension(user): Extension<User>,
    body: String,
) -> Result<Json<CsvPreview>, AppError> {
    debug!("Previewing inventory upload from {} ({} bytes)", user.id, body.len());
    let preview = parse_inventory_csv(&body)?;
    Ok(Json(preview))
}

#[axum::debug_handler]
pub async fn import_inventory(
    State(state): State<PharmacyState>,
    Extension(user): Extension<User>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> Result<Json<ImportReport>, AppError> {
    let pharmacy_id = pharmacy_id(&user)?;
    let preview = parse_inventory_csv(&body)?;

    let outcome = state
        .inventory
        .import(pharmacy_id, preview.items.clone(), query.mode)
        .await;

    Ok(Json(ImportReport {
        mode: query.mode,
        outcome,
        preview,
    }))
}

#[axum::debug_handler]
pub async fn export_inventory(
    State(state): State<PharmacyState>,
    Extension(user): Extension<User>,
) -> Result<Response, AppError> {
    let pharmacy_id = pharmacy_id(&user)?;
    let items = state.inventory.list(pharmacy_id).await;
    let csv = export_inventory_csv(&items)?;

    let filename = format!("inventory-{}.csv", Utc::now().format("%Y-%m-%d"));
    info!("Exported {} inventory items for pharmacy {}", items.len(), pharmacy_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response())
}

// ==============================================================================
// INVENTORY CRUD
// ==============================================================================

#[axum::debug_handler]
pub async fn list_inventory(
    State(state): State<PharmacyState>,
    Extension(user): Extension<User>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<Value>, AppError> {
    let pharmacy_id = pharmacy_id(&user)?;
    let items = state.inventory.list(pharmacy_id).await;

    let filtered = apply_filters(
        items,
        &query,
        Utc::now().date_naive(),
        state.config.inventory_low_stock_threshold,
    )?;

    Ok(Json(json!({
        "items": filtered,
        "total": filtered.len(),
    })))
}

#[axum::debug_handler]
pub async fn add_item(
    State(state): State<PharmacyState>,
    Extension(user): Extension<User>,
    Json(input): Json<MedicineInput>,
) -> Result<(StatusCode, Json<Medicine>), AppError> {
    let pharmacy_id = pharmacy_id(&user)?;
    let medicine = medicine_from_input(&input).map_err(InventoryError::ValidationError)?;

    let created = state.inventory.add(pharmacy_id, medicine).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
pub async fn update_item(
    State(state): State<PharmacyState>,
    Extension(user): Extension<User>,
    Path(item_id): Path<Uuid>,
    Json(changes): Json<UpdateMedicineRequest>,
) -> Result<Json<Medicine>, AppError> {
    let pharmacy_id = pharmacy_id(&user)?;
    let updated = state.inventory.update(pharmacy_id, item_id, changes).await?;
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn delete_item(
    State(state): State<PharmacyState>,
    Extension(user): Extension<User>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let pharmacy_id = pharmacy_id(&user)?;
    let removed = state.inventory.remove(pharmacy_id, item_id).await?;

    Ok(Json(json!({
        "success": true,
        "deleted": removed,
    })))
}

#[axum::debug_handler]
pub async fn inventory_summary(
    State(state): State<PharmacyState>,
    Extension(user): Extension<User>,
) -> Result<Json<InventorySummary>, AppError> {
    let pharmacy_id = pharmacy_id(&user)?;
    let items = state.inventory.list(pharmacy_id).await;

    Ok(Json(summarize(
        &items,
        Utc::now().date_naive(),
        state.config.inventory_low_stock_threshold,
        state.config.inventory_expiry_warning_days,
    )))
}
