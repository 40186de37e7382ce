use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{LabError, LabReport, LabStatus};

const REPORTS_TABLE: &str = "lab_reports";
const MAX_SUMMARY_LEN: usize = 4000;

pub struct LabReportService {
    supabase: SupabaseClient,
}

impl LabReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_report(&self, report_id: Uuid, auth_token: &str) -> Result<LabReport, LabError> {
        let query = format!("id=eq.{}", report_id);
        self.supabase
            .select_one(REPORTS_TABLE, &query, auth_token)
            .await
            .map_err(|e| LabError::DatabaseError(e.to_string()))?
            .ok_or(LabError::NotFound)
    }

    /// A lab's worklist, oldest request first.
    pub async fn lab_reports(
        &self,
        lab_id: Uuid,
        status: Option<LabStatus>,
        auth_token: &str,
    ) -> Result<Vec<LabReport>, LabError> {
        let mut query = format!("lab_id=eq.{}", lab_id);
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        query.push_str("&order=created_at.asc");

        debug!("Loading lab worklist: {}", query);
        self.supabase
            .select(REPORTS_TABLE, &query, auth_token)
            .await
            .map_err(|e| LabError::DatabaseError(e.to_string()))
    }

    pub async fn patient_reports(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<LabReport>, LabError> {
        let query = format!("patient_id=eq.{}&order=created_at.desc", patient_id);
        self.supabase
            .select(REPORTS_TABLE, &query, auth_token)
            .await
            .map_err(|e| LabError::DatabaseError(e.to_string()))
    }

    pub async fn request_test(
        &self,
        lab_id: Uuid,
        patient_id: Uuid,
        doctor_id: Option<Uuid>,
        test_name: &str,
        auth_token: &str,
    ) -> Result<LabReport, LabError> {
        let test_name = test_name.trim();
        if test_name.is_empty() {
            return Err(LabError::ValidationError("Test name is required".to_string()));
        }

        let now = timestamp_now();
        let document = json!({
            "id": Uuid::new_v4(),
            "lab_id": lab_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "test_name": test_name,
            "status": LabStatus::Requested,
            "result_summary": null,
            "report_url": null,
            "created_at": now,
            "updated_at": now,
        });

        let report: LabReport = self
            .supabase
            .insert(REPORTS_TABLE, document, auth_token)
            .await
            .map_err(|e| LabError::DatabaseError(e.to_string()))?;

        info!("Lab test {} requested at lab {} for patient {}", report.id, lab_id, patient_id);
        Ok(report)
    }

    pub async fn collect_sample(
        &self,
        report: &LabReport,
        auth_token: &str,
    ) -> Result<LabReport, LabError> {
        let mut changes = Map::new();
        changes.insert("collected_at".to_string(), json!(timestamp_now()));
        self.advance(report, LabStatus::SampleCollected, changes, auth_token)
            .await
    }

    pub async fn publish(
        &self,
        report: &LabReport,
        result_summary: &str,
        report_url: Option<&str>,
        auth_token: &str,
    ) -> Result<LabReport, LabError> {
        let summary = result_summary.trim();
        if summary.is_empty() {
            return Err(LabError::ValidationError(
                "A result summary is required to publish".to_string(),
            ));
        }
        if summary.chars().count() > MAX_SUMMARY_LEN {
            return Err(LabError::ValidationError(format!(
                "Result summary cannot exceed {} characters",
                MAX_SUMMARY_LEN
            )));
        }

        let report_url = report_url.map(str::trim).filter(|u| !u.is_empty());
        if let Some(url) = report_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(LabError::ValidationError(
                    "Report URL must be an http(s) link".to_string(),
                ));
            }
        }

        let now = timestamp_now();
        let mut changes = Map::new();
        changes.insert("result_summary".to_string(), json!(summary));
        changes.insert("report_url".to_string(), json!(report_url));
        changes.insert("published_at".to_string(), json!(now));
        self.advance(report, LabStatus::ReportReady, changes, auth_token)
            .await
    }

    async fn advance(
        &self,
        report: &LabReport,
        to: LabStatus,
        mut changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<LabReport, LabError> {
        if report.status.next() != Some(to) {
            warn!("Rejected lab report transition {} -> {}", report.status, to);
            return Err(LabError::InvalidTransition {
                from: report.status,
                to,
            });
        }

        changes.insert("status".to_string(), json!(to));
        changes.insert("updated_at".to_string(), json!(timestamp_now()));

        let filter = format!("id=eq.{}&status=eq.{}", report.id, report.status.as_str());
        let rows: Vec<LabReport> = self
            .supabase
            .update(REPORTS_TABLE, &filter, Value::Object(changes), auth_token)
            .await
            .map_err(|e| LabError::DatabaseError(e.to_string()))?;

        let updated = rows
            .into_iter()
            .next()
            .ok_or(LabError::ConcurrentModification)?;
        info!("Lab report {} {} -> {}", report.id, report.status, updated.status);
        Ok(updated)
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
