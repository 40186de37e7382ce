use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_models::auth::Role;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// SIGNUP WIZARD
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDetails {
    pub specialization: String,
    pub license_number: String,
    pub experience_years: Option<u32>,
    pub clinic_address: Option<String>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PharmacyDetails {
    pub store_name: String,
    pub license_number: String,
    pub address: String,
    pub opening_hours: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathologyDetails {
    pub lab_name: String,
    pub accreditation_number: String,
    pub address: String,
    #[serde(default)]
    pub tests_offered: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDetails {
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Final step of the signup wizard. Exactly the details block matching `role`
/// is read; the others are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub doctor: Option<DoctorDetails>,
    pub pharmacy: Option<PharmacyDetails>,
    pub pathology: Option<PathologyDetails>,
    pub patient: Option<PatientDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    /// Shallow-merged into the stored details object.
    pub details: Option<Value>,
}

// ==============================================================================
// ROUTING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub role: Role,
    pub dashboard: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAccessRequest {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub allowed: bool,
    pub redirect_to: Option<String>,
}

impl RouteDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            redirect_to: None,
        }
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        Self {
            allowed: false,
            redirect_to: Some(to.into()),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile not found")]
    NotFound,

    #[error("Profile already exists for this account")]
    AlreadyExists,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => AppError::NotFound(err.to_string()),
            ProfileError::AlreadyExists => AppError::Conflict(err.to_string()),
            ProfileError::ValidationError(msg) => AppError::ValidationError(msg),
            ProfileError::DatabaseError(msg) => AppError::ExternalService(msg),
        }
    }
}
