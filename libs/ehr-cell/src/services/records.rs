use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::AppointmentError;
use appointment_cell::services::AppointmentQueueService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateRecordRequest, HealthRecord, RecordError, RecordStatus, UpdateRecordRequest};
use crate::services::vitals::{validate_prescriptions, validate_vitals};

const RECORDS_TABLE: &str = "health_records";

pub struct HealthRecordService {
    supabase: SupabaseClient,
    appointments: AppointmentQueueService,
}

impl HealthRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            appointments: AppointmentQueueService::new(config),
        }
    }

    pub async fn get_record(
        &self,
        record_id: Uuid,
        auth_token: &str,
    ) -> Result<HealthRecord, RecordError> {
        debug!("Fetching health record {}", record_id);

        let query = format!("id=eq.{}", record_id);
        self.supabase
            .select_one(RECORDS_TABLE, &query, auth_token)
            .await
            .map_err(|e| RecordError::DatabaseError(e.to_string()))?
            .ok_or(RecordError::NotFound)
    }

    pub async fn find_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<HealthRecord>, RecordError> {
        let query = format!("appointment_id=eq.{}", appointment_id);
        self.supabase
            .select_one(RECORDS_TABLE, &query, auth_token)
            .await
            .map_err(|e| RecordError::DatabaseError(e.to_string()))
    }

    /// Newest first. Drafts are dropped unless `include_drafts`.
    pub async fn patient_records(
        &self,
        patient_id: Uuid,
        include_drafts: bool,
        auth_token: &str,
    ) -> Result<Vec<HealthRecord>, RecordError> {
        let query = format!("patient_id=eq.{}&order=created_at.desc", patient_id);
        let mut records: Vec<HealthRecord> = self
            .supabase
            .select(RECORDS_TABLE, &query, auth_token)
            .await
            .map_err(|e| RecordError::DatabaseError(e.to_string()))?;

        if !include_drafts {
            records.retain(HealthRecord::visible_to_patient);
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Opens the Draft record for a consultation. The appointment must belong
    /// to `doctor_id` unless `is_admin`.
    pub async fn create_record(
        &self,
        doctor_id: Uuid,
        is_admin: bool,
        request: CreateRecordRequest,
        auth_token: &str,
    ) -> Result<HealthRecord, RecordError> {
        validate_vitals(&request.vitals)?;
        validate_prescriptions(&request.prescriptions)?;

        let appointment = self
            .appointments
            .get_appointment(request.appointment_id, auth_token)
            .await
            .map_err(|e| match e {
                AppointmentError::NotFound => {
                    RecordError::ValidationError("Appointment not found".to_string())
                }
                other => RecordError::DatabaseError(other.to_string()),
            })?;

        if appointment.doctor_id != doctor_id && !is_admin {
            return Err(RecordError::Unauthorized);
        }

        if self
            .find_for_appointment(appointment.id, auth_token)
            .await?
            .is_some()
        {
            return Err(RecordError::AlreadyExists);
        }

        let now = timestamp_now();
        let document = json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment.id,
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "chief_complaint": trimmed(request.chief_complaint),
            "vitals": request.vitals,
            "diagnosis": trimmed(request.diagnosis),
            "prescriptions": request.prescriptions,
            "follow_up": request.follow_up,
            "notes": request.notes,
            "status": RecordStatus::Draft,
            "signed_at": null,
            "created_at": now,
            "updated_at": now,
        });

        let record: HealthRecord = self
            .supabase
            .insert(RECORDS_TABLE, document, auth_token)
            .await
            .map_err(|e| RecordError::DatabaseError(e.to_string()))?;

        info!(
            "Opened health record {} for appointment {}",
            record.id, record.appointment_id
        );
        Ok(record)
    }

    pub async fn update_record(
        &self,
        record: &HealthRecord,
        request: UpdateRecordRequest,
        auth_token: &str,
    ) -> Result<HealthRecord, RecordError> {
        if record.status != RecordStatus::Draft {
            return Err(RecordError::NotEditable(record.status));
        }
        if request.is_empty() {
            return Err(RecordError::ValidationError(
                "No fields to update".to_string(),
            ));
        }

        let mut changes = Map::new();
        if let Some(complaint) = request.chief_complaint {
            changes.insert("chief_complaint".to_string(), json!(trimmed(Some(complaint))));
        }
        if let Some(vitals) = request.vitals {
            validate_vitals(&vitals)?;
            changes.insert("vitals".to_string(), json!(vitals));
        }
        if let Some(diagnosis) = request.diagnosis {
            changes.insert("diagnosis".to_string(), json!(trimmed(Some(diagnosis))));
        }
        if let Some(prescriptions) = request.prescriptions {
            validate_prescriptions(&prescriptions)?;
            changes.insert("prescriptions".to_string(), json!(prescriptions));
        }
        if let Some(follow_up) = request.follow_up {
            changes.insert("follow_up".to_string(), json!(follow_up));
        }
        if let Some(notes) = request.notes {
            changes.insert("notes".to_string(), json!(notes));
        }
        changes.insert("updated_at".to_string(), json!(timestamp_now()));

        let updated = self.conditional_update(record, changes, auth_token).await?;
        debug!("Updated draft health record {}", updated.id);
        Ok(updated)
    }

    /// Draft -> Completed. A completed record carries at least a complaint
    /// and a diagnosis.
    pub async fn complete_record(
        &self,
        record: &HealthRecord,
        auth_token: &str,
    ) -> Result<HealthRecord, RecordError> {
        ensure_transition(record.status, RecordStatus::Completed)?;

        if is_blank(&record.chief_complaint) {
            return Err(RecordError::Incomplete("chief complaint is required".to_string()));
        }
        if is_blank(&record.diagnosis) {
            return Err(RecordError::Incomplete("diagnosis is required".to_string()));
        }

        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(RecordStatus::Completed));
        changes.insert("updated_at".to_string(), json!(timestamp_now()));

        let updated = self.conditional_update(record, changes, auth_token).await?;
        info!("Health record {} completed", updated.id);
        Ok(updated)
    }

    /// Completed -> Signed. Only the authoring doctor signs.
    pub async fn sign_record(
        &self,
        record: &HealthRecord,
        signer_id: &str,
        auth_token: &str,
    ) -> Result<HealthRecord, RecordError> {
        if !record.is_author(signer_id) {
            return Err(RecordError::Unauthorized);
        }
        ensure_transition(record.status, RecordStatus::Signed)?;

        let now = timestamp_now();
        let mut changes = Map::new();
        changes.insert("status".to_string(), json!(RecordStatus::Signed));
        changes.insert("signed_at".to_string(), json!(now));
        changes.insert("updated_at".to_string(), json!(now));

        let updated = self.conditional_update(record, changes, auth_token).await?;
        info!("Health record {} signed by {}", updated.id, signer_id);
        Ok(updated)
    }

    async fn conditional_update(
        &self,
        record: &HealthRecord,
        changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<HealthRecord, RecordError> {
        let filter = format!("id=eq.{}&status=eq.{}", record.id, record.status.as_str());

        let rows: Vec<HealthRecord> = self
            .supabase
            .update(RECORDS_TABLE, &filter, Value::Object(changes), auth_token)
            .await
            .map_err(|e| RecordError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or_else(|| {
            warn!(
                "Health record {} no longer {}; update skipped",
                record.id, record.status
            );
            RecordError::ConcurrentModification
        })
    }
}

fn ensure_transition(from: RecordStatus, to: RecordStatus) -> Result<(), RecordError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        warn!("Rejected health record transition {} -> {}", from, to);
        Err(RecordError::InvalidTransition { from, to })
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn signed_records_cannot_be_completed_again() {
        assert_matches!(
            ensure_transition(RecordStatus::Signed, RecordStatus::Completed),
            Err(RecordError::InvalidTransition { .. })
        );
        assert!(ensure_transition(RecordStatus::Draft, RecordStatus::Completed).is_ok());
    }

    #[test]
    fn whitespace_counts_as_blank() {
        assert!(is_blank(&None));
        assert!(is_blank(&Some("   ".to_string())));
        assert!(!is_blank(&Some("Migraine".to_string())));
        assert_eq!(trimmed(Some("  ".to_string())), None);
    }
}
