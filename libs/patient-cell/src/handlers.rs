use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Token subject is not a valid id".to_string()))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), AppError> {
    let doctor_id = user_uuid(&user)?;

    let service = PatientService::new(&state);
    let patient = service.create_patient(doctor_id, request, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.get_patient(patient_id, auth.token()).await?;
    Ok(Json(patient))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&state);
    let patient = service.get_patient(patient_id, auth.token()).await?;

    if !patient.registered_by(&user.id) && !user.is_admin() {
        return Err(PatientError::Unauthorized.into());
    }

    let updated = service.update_patient(&patient, request, auth.token()).await?;
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let scope = if user.is_admin() { None } else { Some(user_uuid(&user)?) };

    let service = PatientService::new(&state);
    let patients = service.search_patients(scope, &query, auth.token()).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len(),
    })))
}
