use std::sync::OnceLock;

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest,
};

const PATIENTS_TABLE: &str = "patients";
const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;
const BLOOD_GROUPS: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
    })
}

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,18}[0-9]$").expect("valid phone regex"))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn required_name(name: &str) -> Result<String, PatientError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PatientError::ValidationError("Full name is required".to_string()));
    }
    Ok(name.to_string())
}

fn check_optional_fields(
    phone: Option<&str>,
    blood_group: Option<&str>,
    date_of_birth: Option<chrono::NaiveDate>,
) -> Result<(), PatientError> {
    if let Some(phone) = phone {
        if !phone_pattern().is_match(phone) {
            return Err(PatientError::ValidationError(format!("Invalid phone number: {}", phone)));
        }
    }
    if let Some(group) = blood_group {
        if !BLOOD_GROUPS.contains(&group) {
            return Err(PatientError::ValidationError(format!("Unknown blood group: {}", group)));
        }
    }
    if let Some(dob) = date_of_birth {
        if dob > Utc::now().date_naive() {
            return Err(PatientError::ValidationError(
                "Date of birth cannot be in the future".to_string(),
            ));
        }
    }
    Ok(())
}

/// Builds the PostgREST filter for a search. Free text is matched with
/// case-insensitive `ilike` and url-encoded.
pub fn search_filter(doctor_id: Option<Uuid>, query: &PatientSearchQuery) -> String {
    let mut parts = Vec::new();

    if let Some(doctor_id) = doctor_id {
        parts.push(format!("doctor_id=eq.{}", doctor_id));
    }
    let terms = [
        ("full_name", query.name.as_deref()),
        ("email", query.email.as_deref()),
        ("phone", query.phone.as_deref()),
    ];
    for (column, term) in terms {
        if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(format!(
                "{}=ilike.{}",
                column,
                urlencoding::encode(&format!("*{}*", term))
            ));
        }
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    parts.push("order=full_name.asc".to_string());
    parts.push(format!("limit={}", limit));
    parts.push(format!("offset={}", offset));

    parts.join("&")
}

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient {}", patient_id);

        let query = format!("id=eq.{}", patient_id);
        self.supabase
            .select_one(PATIENTS_TABLE, &query, auth_token)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?
            .ok_or(PatientError::NotFound)
    }

    pub async fn create_patient(
        &self,
        doctor_id: Uuid,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let full_name = required_name(&request.full_name)?;
        let email = request.email.trim().to_lowercase();
        if !email_pattern().is_match(&email) {
            return Err(PatientError::ValidationError(format!("Invalid email: {}", request.email)));
        }
        check_optional_fields(
            request.phone.as_deref(),
            request.blood_group.as_deref(),
            request.date_of_birth,
        )?;

        let existing: Option<Patient> = self
            .supabase
            .select_one(
                PATIENTS_TABLE,
                &format!("email=eq.{}", urlencoding::encode(&email)),
                auth_token,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;
        if existing.is_some() {
            warn!("Rejected duplicate patient registration for {}", email);
            return Err(PatientError::EmailAlreadyExists { email });
        }

        let timestamp = now();
        let document = json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "full_name": full_name,
            "email": email,
            "phone": request.phone,
            "date_of_birth": request.date_of_birth,
            "gender": request.gender,
            "blood_group": request.blood_group,
            "address": request.address,
            "allergies": request.allergies,
            "created_at": timestamp,
            "updated_at": timestamp,
        });

        let patient: Patient = self
            .supabase
            .insert(PATIENTS_TABLE, document, auth_token)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Doctor {} registered patient {}", doctor_id, patient.id);
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        patient: &Patient,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        if request.is_empty() {
            return Err(PatientError::ValidationError("No fields to update".to_string()));
        }
        check_optional_fields(
            request.phone.as_deref(),
            request.blood_group.as_deref(),
            request.date_of_birth,
        )?;

        let mut changes = Map::new();
        if let Some(name) = request.full_name {
            changes.insert("full_name".to_string(), json!(required_name(&name)?));
        }
        let optional = [
            ("phone", request.phone),
            ("gender", request.gender),
            ("blood_group", request.blood_group),
            ("address", request.address),
            ("allergies", request.allergies),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                changes.insert(field.to_string(), json!(value));
            }
        }
        if let Some(dob) = request.date_of_birth {
            changes.insert("date_of_birth".to_string(), json!(dob));
        }
        changes.insert("updated_at".to_string(), json!(now()));

        let filter = format!("id=eq.{}", patient.id);
        let updated: Vec<Patient> = self
            .supabase
            .update(PATIENTS_TABLE, &filter, Value::Object(changes), auth_token)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let patient = updated.into_iter().next().ok_or(PatientError::NotFound)?;
        info!("Updated patient {}", patient.id);
        Ok(patient)
    }

    /// Doctors search within the patients they registered; `doctor_id` is
    /// `None` for admins.
    pub async fn search_patients(
        &self,
        doctor_id: Option<Uuid>,
        query: &PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let filter = search_filter(doctor_id, query);
        debug!("Searching patients with {}", filter);

        self.supabase
            .select(PATIENTS_TABLE, &filter, auth_token)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}
