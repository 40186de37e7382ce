use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// HEALTH RECORD MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub vitals: Vitals,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    pub follow_up: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: RecordStatus,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealthRecord {
    pub fn is_author(&self, user_id: &str) -> bool {
        self.doctor_id.to_string() == user_id
    }

    /// Drafts stay private to the authoring doctor.
    pub fn visible_to_patient(&self) -> bool {
        self.status != RecordStatus::Draft
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordStatus {
    Draft,
    Completed,
    Signed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "Draft",
            RecordStatus::Completed => "Completed",
            RecordStatus::Signed => "Signed",
        }
    }

    /// Records only move forward: Draft, then Completed, then Signed.
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        matches!(
            (self, next),
            (RecordStatus::Draft, RecordStatus::Completed)
                | (RecordStatus::Completed, RecordStatus::Signed)
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Systolic over diastolic, e.g. `120/80`.
    pub blood_pressure: Option<String>,
    pub pulse: Option<u32>,
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    pub spo2: Option<u32>,
    pub respiratory_rate: Option<u32>,
    /// Kilograms.
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub medicine: String,
    pub dosage: String,
    pub frequency: Option<String>,
    pub duration_days: Option<u32>,
    pub instructions: Option<String>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub appointment_id: Uuid,
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub vitals: Vitals,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    pub follow_up: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecordRequest {
    pub chief_complaint: Option<String>,
    pub vitals: Option<Vitals>,
    pub diagnosis: Option<String>,
    pub prescriptions: Option<Vec<Prescription>>,
    pub follow_up: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl UpdateRecordRequest {
    pub fn is_empty(&self) -> bool {
        self.chief_complaint.is_none()
            && self.vitals.is_none()
            && self.diagnosis.is_none()
            && self.prescriptions.is_none()
            && self.follow_up.is_none()
            && self.notes.is_none()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecordError {
    #[error("Health record not found")]
    NotFound,

    #[error("A health record already exists for this appointment")]
    AlreadyExists,

    #[error("Health record is {0} and can no longer be edited")]
    NotEditable(RecordStatus),

    #[error("Cannot move a {from} health record to {to}")]
    InvalidTransition { from: RecordStatus, to: RecordStatus },

    #[error("Health record is incomplete: {0}")]
    Incomplete(String),

    #[error("Not authorized to access this health record")]
    Unauthorized,

    #[error("Health record was modified by another session; reload and retry")]
    ConcurrentModification,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound => AppError::NotFound(err.to_string()),
            RecordError::AlreadyExists
            | RecordError::NotEditable(_)
            | RecordError::InvalidTransition { .. }
            | RecordError::ConcurrentModification => AppError::Conflict(err.to_string()),
            RecordError::Incomplete(_) => AppError::ValidationError(err.to_string()),
            RecordError::Unauthorized => AppError::Forbidden(err.to_string()),
            RecordError::ValidationError(msg) => AppError::ValidationError(msg),
            RecordError::DatabaseError(msg) => AppError::ExternalService(msg),
        }
    }
}
