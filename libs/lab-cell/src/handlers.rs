use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{CreateLabRequest, LabError, LabQuery, LabReport, PublishReportRequest};
use crate::services::LabReportService;

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Token subject is not a valid id".to_string()))
}

async fn load_for_lab(
    service: &LabReportService,
    report_id: Uuid,
    user: &User,
    token: &str,
) -> Result<LabReport, AppError> {
    let report = service.get_report(report_id, token).await?;
    if report.lab_id.to_string() != user.id && !user.is_admin() {
        return Err(LabError::Unauthorized.into());
    }
    Ok(report)
}

#[axum::debug_handler]
pub async fn create_report(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateLabRequest>,
) -> Result<Json<LabReport>, AppError> {
    let caller = user_uuid(&user)?;

    let (lab_id, doctor_id) = match user.portal_role() {
        Some(Role::Pathology) => match request.lab_id {
            Some(other) if other != caller => {
                return Err(AppError::Forbidden(
                    "Labs can only register tests for themselves".to_string(),
                ))
            }
            _ => (caller, None),
        },
        Some(Role::Doctor) => (
            request
                .lab_id
                .ok_or_else(|| AppError::BadRequest("lab_id is required".to_string()))?,
            Some(caller),
        ),
        _ => (
            request
                .lab_id
                .ok_or_else(|| AppError::BadRequest("lab_id is required".to_string()))?,
            None,
        ),
    };

    let service = LabReportService::new(&state);
    let report = service
        .request_test(lab_id, request.patient_id, doctor_id, &request.test_name, auth.token())
        .await?;

    Ok(Json(report))
}

#[axum::debug_handler]
pub async fn get_report(
    State(state): State<Arc<AppConfig>>,
    Path(report_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<LabReport>, AppError> {
    let service = LabReportService::new(&state);
    let report = service.get_report(report_id, auth.token()).await?;

    if !report.involves(&user.id) && !user.has_any_role(&[Role::Doctor]) {
        return Err(LabError::Unauthorized.into());
    }
    Ok(Json(report))
}

#[axum::debug_handler]
pub async fn list_lab_reports(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<LabQuery>,
) -> Result<Json<Value>, AppError> {
    let lab_id = if user.is_admin() {
        query
            .lab_id
            .ok_or_else(|| AppError::BadRequest("lab_id is required for admin requests".to_string()))?
    } else {
        user_uuid(&user)?
    };

    let service = LabReportService::new(&state);
    let reports = service.lab_reports(lab_id, query.status, auth.token()).await?;

    Ok(Json(json!({
        "reports": reports,
        "total": reports.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_patient_reports(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let is_self = patient_id.to_string() == user.id;
    if !is_self && !user.has_any_role(&[Role::Doctor, Role::Pathology]) {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's lab reports".to_string(),
        ));
    }

    let service = LabReportService::new(&state);
    let reports = service.patient_reports(patient_id, auth.token()).await?;

    Ok(Json(json!({
        "reports": reports,
        "total": reports.len(),
    })))
}

#[axum::debug_handler]
pub async fn collect_sample(
    State(state): State<Arc<AppConfig>>,
    Path(report_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<LabReport>, AppError> {
    let service = LabReportService::new(&state);
    let report = load_for_lab(&service, report_id, &user, auth.token()).await?;

    let updated = service.collect_sample(&report, auth.token()).await?;
    Ok(Json(updated))
}

#[axum::debug_handler]
pub async fn publish_report(
    State(state): State<Arc<AppConfig>>,
    Path(report_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<PublishReportRequest>,
) -> Result<Json<LabReport>, AppError> {
    let service = LabReportService::new(&state);
    let report = load_for_lab(&service, report_id, &user, auth.token()).await?;

    let updated = service
        .publish(
            &report,
            &request.result_summary,
            request.report_url.as_deref(),
            auth.token(),
        )
        .await?;
    Ok(Json(updated))
}
