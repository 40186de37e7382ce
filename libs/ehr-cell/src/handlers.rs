use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{CreateRecordRequest, HealthRecord, RecordError, UpdateRecordRequest};
use crate::services::HealthRecordService;

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Token subject is not a valid id".to_string()))
}

/// Author doctor and admins may change a record.
async fn load_for_author(
    service: &HealthRecordService,
    record_id: Uuid,
    user: &User,
    token: &str,
) -> Result<HealthRecord, AppError> {
    let record = service.get_record(record_id, token).await?;
    if !record.is_author(&user.id) && !user.is_admin() {
        return Err(RecordError::Unauthorized.into());
    }
    Ok(record)
}

#[axum::debug_handler]
pub async fn create_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecordRequest>,
) -> Result<Json<HealthRecord>, AppError> {
    let doctor_id = user_uuid(&user)?;

    let service = HealthRecordService::new(&state);
    let record = service
        .create_record(doctor_id, user.is_admin(), request, auth.token())
        .await?;

    Ok(Json(record))
}

#[axum::debug_handler]
pub async fn get_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<HealthRecord>, AppError> {
    let service = HealthRecordService::new(&state);
    let record = service.get_record(record_id, auth.token()).await?;

    let is_patient = record.patient_id.to_string() == user.id;
    let allowed = record.is_author(&user.id)
        || user.is_admin()
        || (is_patient && record.visible_to_patient());

    if !allowed {
        // Patients do not learn that a draft exists.
        if is_patient {
            return Err(RecordError::NotFound.into());
        }
        return Err(RecordError::Unauthorized.into());
    }

    Ok(Json(record))
}

#[axum::debug_handler]
pub async fn get_patient_records(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let is_self = patient_id.to_string() == user.id;
    let is_clinician = user.has_any_role(&[Role::Doctor]);
    if !is_self && !is_clinician {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's records".to_string(),
        ));
    }

    let service = HealthRecordService::new(&state);
    let records = service
        .patient_records(patient_id, is_clinician, auth.token())
        .await?;

    Ok(Json(json!({
        "records": records,
        "total": records.len(),
    })))
}

#[axum::debug_handler]
pub async fn update_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateRecordRequest>,
) -> Result<Json<HealthRecord>, AppError> {
    let service = HealthRecordService::new(&state);
    let record = load_for_author(&service, record_id, &user, auth.token()).await?;

    let updated = service.update_record(&record, request, auth.token()).await?;
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn complete_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<HealthRecord>, AppError> {
    let service = HealthRecordService::new(&state);
    let record = load_for_author(&service, record_id, &user, auth.token()).await?;

    let updated = service.complete_record(&record, auth.token()).await?;
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn sign_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<HealthRecord>, AppError> {
    let service = HealthRecordService::new(&state);
    let record = service.get_record(record_id, auth.token()).await?;

    let signed = service.sign_record(&record, &user.id, auth.token()).await?;
    Ok(Json(signed))
}
