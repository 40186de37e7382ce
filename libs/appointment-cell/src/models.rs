use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub follow_up_at: Option<DateTime<Utc>>,
    /// Source appointment when this one was booked as a follow-up.
    pub follow_up_of: Option<Uuid>,
    pub reschedule_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub queued_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub room_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn involves(&self, user_id: &str) -> bool {
        self.doctor_id.to_string() == user_id || self.patient_id.to_string() == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    InQueue,
    Completed,
    Cancelled,
    Rescheduling,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InQueue => "in-queue",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduling => "rescheduling",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Button-level actions a doctor can fire against an appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    AddToQueue,
    Complete,
    Cancel,
    RequestReschedule,
    ConfirmReschedule,
    ScheduleFollowUp,
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueAction::AddToQueue => "add_to_queue",
            QueueAction::Complete => "complete",
            QueueAction::Cancel => "cancel",
            QueueAction::RequestReschedule => "request_reschedule",
            QueueAction::ConfirmReschedule => "confirm_reschedule",
            QueueAction::ScheduleFollowUp => "schedule_follow_up",
        };
        f.write_str(name)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    /// Defaults to the caller when a doctor books.
    pub doctor_id: Option<Uuid>,
    pub patient_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRescheduleRequest {
    pub new_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub follow_up_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpResponse {
    pub source: Appointment,
    pub follow_up: Appointment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueQuery {
    /// Admins pick the doctor; doctors always see their own queue.
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub scheduled: usize,
    pub in_queue: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub rescheduling: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: AppointmentStatus) {
        match status {
            AppointmentStatus::Scheduled => self.scheduled += 1,
            AppointmentStatus::InQueue => self.in_queue += 1,
            AppointmentStatus::Completed => self.completed += 1,
            AppointmentStatus::Cancelled => self.cancelled += 1,
            AppointmentStatus::Rescheduling => self.rescheduling += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueView {
    pub date: NaiveDate,
    pub status_filter: Option<AppointmentStatus>,
    pub appointments: Vec<Appointment>,
    /// Counts over the whole day, before the status filter.
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsQuery {
    pub doctor_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    pub appointment_id: Uuid,
    pub room_url: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        action: QueueAction,
    },

    #[error("Appointment was modified by another session; reload and retry")]
    ConcurrentModification,

    #[error("A follow-up is already scheduled for this appointment")]
    FollowUpAlreadyScheduled,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidTransition { .. }
            | AppointmentError::ConcurrentModification
            | AppointmentError::FollowUpAlreadyScheduled => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidTime(_) => AppError::BadRequest(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::ExternalService(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&AppointmentStatus::InQueue).unwrap();
        assert_eq!(json, "\"in-queue\"");
        assert_eq!(AppointmentStatus::InQueue.to_string(), "in-queue");
    }

    #[test]
    fn invalid_transition_maps_to_conflict() {
        let err = AppointmentError::InvalidTransition {
            from: AppointmentStatus::Completed,
            action: QueueAction::Cancel,
        };
        assert_eq!(err.to_string(), "Cannot cancel an appointment that is completed");
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
    }
}
