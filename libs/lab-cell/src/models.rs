use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabReport {
    pub id: Uuid,
    pub lab_id: Uuid,
    pub patient_id: Uuid,
    /// Set when a doctor ordered the test.
    pub doctor_id: Option<Uuid>,
    pub test_name: String,
    pub status: LabStatus,
    pub result_summary: Option<String>,
    pub report_url: Option<String>,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabReport {
    pub fn involves(&self, user_id: &str) -> bool {
        self.lab_id.to_string() == user_id
            || self.patient_id.to_string() == user_id
            || self.doctor_id.is_some_and(|d| d.to_string() == user_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LabStatus {
    Requested,
    SampleCollected,
    ReportReady,
}

impl LabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabStatus::Requested => "requested",
            LabStatus::SampleCollected => "sample-collected",
            LabStatus::ReportReady => "report-ready",
        }
    }

    pub fn next(&self) -> Option<LabStatus> {
        match self {
            LabStatus::Requested => Some(LabStatus::SampleCollected),
            LabStatus::SampleCollected => Some(LabStatus::ReportReady),
            LabStatus::ReportReady => None,
        }
    }
}

impl fmt::Display for LabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLabRequest {
    pub patient_id: Uuid,
    /// Required when a doctor orders; labs always order for themselves.
    pub lab_id: Option<Uuid>,
    pub test_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReportRequest {
    pub result_summary: String,
    pub report_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabQuery {
    /// Admins pick the lab; labs always see their own worklist.
    pub lab_id: Option<Uuid>,
    pub status: Option<LabStatus>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LabError {
    #[error("Lab report not found")]
    NotFound,

    #[error("Cannot move a {from} lab report to {to}")]
    InvalidTransition { from: LabStatus, to: LabStatus },

    #[error("Not authorized to access this lab report")]
    Unauthorized,

    #[error("Lab report was modified by another session; reload and retry")]
    ConcurrentModification,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<LabError> for AppError {
    fn from(err: LabError) -> Self {
        match err {
            LabError::NotFound => AppError::NotFound(err.to_string()),
            LabError::InvalidTransition { .. } | LabError::ConcurrentModification => {
                AppError::Conflict(err.to_string())
            }
            LabError::Unauthorized => AppError::Forbidden(err.to_string()),
            LabError::ValidationError(msg) => AppError::ValidationError(msg),
            LabError::DatabaseError(msg) => AppError::ExternalService(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn statuses_advance_one_step_at_a_time() {
        assert_eq!(LabStatus::Requested.next(), Some(LabStatus::SampleCollected));
        assert_eq!(LabStatus::SampleCollected.next(), Some(LabStatus::ReportReady));
        assert_eq!(LabStatus::ReportReady.next(), None);
    }

    #[test]
    fn status_wire_names() {
        let json = serde_json::to_string(&LabStatus::SampleCollected).unwrap();
        assert_eq!(json, "\"sample-collected\"");
    }

    #[test]
    fn out_of_order_steps_are_conflicts() {
        let err = LabError::InvalidTransition {
            from: LabStatus::Requested,
            to: LabStatus::ReportReady,
        };
        assert_eq!(err.to_string(), "Cannot move a requested lab report to report-ready");
        assert_matches!(AppError::from(err), AppError::Conflict(_));
    }
}
