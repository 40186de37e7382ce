use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, CancelAppointmentRequest, ConfirmRescheduleRequest,
    CreateAppointmentRequest, FollowUpRequest, QueueQuery, QueueView, RescheduleRequest,
    RoomResponse, StatsQuery,
};
use crate::services::{stats, AppointmentQueueService, QueueLifecycle};

// ==============================================================================
// HELPERS
// ==============================================================================

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Token subject is not a valid id".to_string()))
}

/// Doctors act on their own schedule; admins name the doctor explicitly.
fn resolve_doctor(user: &User, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    if user.is_admin() {
        return requested
            .ok_or_else(|| AppError::BadRequest("doctor_id is required for admin requests".to_string()));
    }

    let own = user_uuid(user)?;
    match requested {
        Some(other) if other != own => Err(AppError::Forbidden(
            "Doctors can only access their own schedule".to_string(),
        )),
        _ => Ok(own),
    }
}

/// Loads an appointment that the caller may drive through the queue.
async fn load_for_doctor(
    service: &AppointmentQueueService,
    appointment_id: Uuid,
    user: &User,
    token: &str,
) -> Result<Appointment, AppError> {
    let appointment = service.get_appointment(appointment_id, token).await?;

    if appointment.doctor_id.to_string() != user.id && !user.is_admin() {
        return Err(AppointmentError::Unauthorized.into());
    }

    Ok(appointment)
}

fn transition_response(appointment: Appointment, message: &str) -> Json<Value> {
    let actions = QueueLifecycle::new().available_actions(appointment.status);
    Json(json!({
        "success": true,
        "appointment": appointment,
        "available_actions": actions,
        "message": message,
    }))
}

// ==============================================================================
// BOOKING & LOOKUP
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = match user.portal_role() {
        Some(Role::Doctor) => resolve_doctor(&user, request.doctor_id)?,
        Some(Role::Patient) => {
            if request.patient_id != user_uuid(&user)? {
                return Err(AppError::Forbidden(
                    "Patients can only book appointments for themselves".to_string(),
                ));
            }
            request
                .doctor_id
                .ok_or_else(|| AppError::BadRequest("doctor_id is required".to_string()))?
        }
        Some(Role::Admin) => resolve_doctor(&user, request.doctor_id)?,
        _ => {
            return Err(AppError::Forbidden(
                "Only doctors and patients can book appointments".to_string(),
            ))
        }
    };

    let service = AppointmentQueueService::new(&state);
    let appointment = service
        .create_appointment(doctor_id, request, auth.token())
        .await?;

    Ok(transition_response(appointment, "Appointment scheduled"))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = service.get_appointment(appointment_id, auth.token()).await?;

    if !appointment.involves(&user.id) && !user.is_admin() {
        return Err(AppointmentError::Unauthorized.into());
    }

    let actions = QueueLifecycle::new().available_actions(appointment.status);
    Ok(Json(json!({
        "appointment": appointment,
        "available_actions": actions,
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let is_self = patient_id.to_string() == user.id;
    if !is_self && !user.has_any_role(&[Role::Doctor]) {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's appointments".to_string(),
        ));
    }

    let service = AppointmentQueueService::new(&state);
    let appointments = service.patient_appointments(patient_id, auth.token()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

// ==============================================================================
// DOCTOR QUEUE
// ==============================================================================

#[axum::debug_handler]
pub async fn get_queue(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueView>, AppError> {
    let doctor_id = resolve_doctor(&user, query.doctor_id)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    debug!("Queue request for doctor {} on {} ({:?})", doctor_id, date, query.status);

    let service = AppointmentQueueService::new(&state);
    let view = service
        .doctor_queue(doctor_id, date, query.status, auth.token())
        .await?;

    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_doctor(&user, query.doctor_id)?;
    let (from, to) = stats::resolve_range(query.from, query.to, Utc::now().date_naive())?;

    let service = AppointmentQueueService::new(&state);
    let days = service.daily_stats(doctor_id, from, to, auth.token()).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "from": from,
        "to": to,
        "days": days,
    })))
}

#[axum::debug_handler]
pub async fn add_to_queue(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = load_for_doctor(&service, appointment_id, &user, auth.token()).await?;

    let updated = service.add_to_queue(&appointment, auth.token()).await?;
    Ok(transition_response(updated, "Patient added to queue"))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = load_for_doctor(&service, appointment_id, &user, auth.token()).await?;

    let updated = service.complete(&appointment, auth.token()).await?;
    Ok(transition_response(updated, "Consultation completed"))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = load_for_doctor(&service, appointment_id, &user, auth.token()).await?;

    let updated = service
        .cancel(&appointment, &request.reason, auth.token())
        .await?;
    Ok(transition_response(updated, "Appointment cancelled"))
}

#[axum::debug_handler]
pub async fn request_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = load_for_doctor(&service, appointment_id, &user, auth.token()).await?;

    let updated = service
        .request_reschedule(&appointment, request.reason.as_deref(), auth.token())
        .await?;
    Ok(transition_response(updated, "Appointment marked for rescheduling"))
}

#[axum::debug_handler]
pub async fn confirm_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmRescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = load_for_doctor(&service, appointment_id, &user, auth.token()).await?;

    let updated = service
        .confirm_reschedule(&appointment, request.new_time, auth.token())
        .await?;
    Ok(transition_response(updated, "Appointment rescheduled"))
}

#[axum::debug_handler]
pub async fn schedule_follow_up(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<FollowUpRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = load_for_doctor(&service, appointment_id, &user, auth.token()).await?;

    let result = service
        .schedule_follow_up(
            &appointment,
            request.follow_up_at,
            request.reason.as_deref(),
            auth.token(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "source": result.source,
        "follow_up": result.follow_up,
        "message": "Follow-up scheduled",
    })))
}

// ==============================================================================
// CONSULTATION ROOM
// ==============================================================================

#[axum::debug_handler]
pub async fn open_consultation_room(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<RoomResponse>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let appointment = service.get_appointment(appointment_id, auth.token()).await?;

    if !appointment.involves(&user.id) && !user.is_admin() {
        return Err(AppointmentError::Unauthorized.into());
    }

    let room = service.open_room(&appointment, auth.token()).await?;
    Ok(Json(room))
}
