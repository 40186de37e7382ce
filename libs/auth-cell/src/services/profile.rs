use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};

use crate::models::{Profile, ProfileError, SignupRequest, UpdateProfileRequest};

const PROFILES_TABLE: &str = "profiles";

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

pub struct ProfileService {
    supabase: SupabaseClient,
}

impl ProfileService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_profile(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<Profile>, ProfileError> {
        debug!("Fetching profile for user: {}", user_id);

        let query = format!("id=eq.{}", urlencoding::encode(user_id));
        self.supabase
            .select_one(PROFILES_TABLE, &query, auth_token)
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))
    }

    pub async fn get_profile(&self, user_id: &str, auth_token: &str) -> Result<Profile, ProfileError> {
        self.find_profile(user_id, auth_token)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    /// Stores the profile built by the signup wizard. Each account signs up once.
    pub async fn create_profile(
        &self,
        user: &User,
        request: SignupRequest,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        let details = validate_signup(&request)?;

        if self.find_profile(&user.id, auth_token).await?.is_some() {
            warn!("User {} attempted a second signup", user.id);
            return Err(ProfileError::AlreadyExists);
        }

        let now = Utc::now().to_rfc3339();
        let document = json!({
            "id": user.id,
            "role": request.role,
            "full_name": request.full_name.trim(),
            "email": request.email.trim().to_ascii_lowercase(),
            "phone": request.phone.as_deref().map(str::trim),
            "details": details,
            "created_at": now,
            "updated_at": now,
        });

        let profile: Profile = self
            .supabase
            .insert(PROFILES_TABLE, document, auth_token)
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        info!("Created {} profile for user {}", profile.role, profile.id);

        // Refreshed tokens then resolve the role from user_metadata. The
        // profile stays authoritative, so a failed sync is only logged.
        if let Err(e) = self
            .supabase
            .update_user_metadata(json!({ "role": profile.role }), auth_token)
            .await
        {
            warn!("Could not copy role to auth metadata for user {}: {}", user.id, e);
        }

        Ok(profile)
    }

    /// The token's role, or the role stored at signup when the token was
    /// issued before the account finished signing up.
    pub async fn resolve_role(&self, user: &User, auth_token: &str) -> Result<Option<Role>, ProfileError> {
        if let Some(role) = user.portal_role() {
            return Ok(Some(role));
        }

        let profile = self.find_profile(&user.id, auth_token).await?;
        Ok(profile.map(|p| p.role))
    }

    /// Settings page update. Role and email are fixed at signup.
    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
        auth_token: &str,
    ) -> Result<Profile, ProfileError> {
        let current = self.get_profile(user_id, auth_token).await?;

        let mut changes = Map::new();

        if let Some(full_name) = request.full_name {
            if full_name.trim().is_empty() {
                return Err(ProfileError::ValidationError("Full name cannot be empty".to_string()));
            }
            changes.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(phone) = request.phone {
            validate_phone(&phone)?;
            changes.insert("phone".to_string(), json!(phone.trim()));
        }
        if let Some(details) = request.details {
            changes.insert("details".to_string(), merge_details(&current.details, details)?);
        }

        if changes.is_empty() {
            return Ok(current);
        }

        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let query = format!("id=eq.{}", urlencoding::encode(user_id));
        let updated: Vec<Profile> = self
            .supabase
            .update(PROFILES_TABLE, &query, Value::Object(changes), auth_token)
            .await
            .map_err(|e| ProfileError::DatabaseError(e.to_string()))?;

        updated.into_iter().next().ok_or(ProfileError::NotFound)
    }
}

/// Checks the wizard's common fields and returns the role's details block.
pub fn validate_signup(request: &SignupRequest) -> Result<Value, ProfileError> {
    if request.full_name.trim().is_empty() {
        return Err(ProfileError::ValidationError("Full name is required".to_string()));
    }
    if !email_pattern().is_match(request.email.trim()) {
        return Err(ProfileError::ValidationError(format!(
            "Invalid email address: {}",
            request.email
        )));
    }
    if let Some(phone) = &request.phone {
        validate_phone(phone)?;
    }

    let missing = |section: &str| {
        ProfileError::ValidationError(format!("{} details are required for this role", section))
    };
    let required = |value: &str, field: &str| {
        if value.trim().is_empty() {
            Err(ProfileError::ValidationError(format!("{} is required", field)))
        } else {
            Ok(())
        }
    };
    let encode = |value: Result<Value, serde_json::Error>| {
        value.map_err(|e| ProfileError::ValidationError(e.to_string()))
    };

    match request.role {
        Role::Doctor => {
            let details = request.doctor.as_ref().ok_or_else(|| missing("Doctor"))?;
            required(&details.specialization, "Specialization")?;
            required(&details.license_number, "License number")?;
            if details.consultation_fee.is_some_and(|fee| fee < 0.0) {
                return Err(ProfileError::ValidationError(
                    "Consultation fee cannot be negative".to_string(),
                ));
            }
            encode(serde_json::to_value(details))
        }
        Role::Pharmacy => {
            let details = request.pharmacy.as_ref().ok_or_else(|| missing("Pharmacy"))?;
            required(&details.store_name, "Store name")?;
            required(&details.license_number, "License number")?;
            required(&details.address, "Address")?;
            encode(serde_json::to_value(details))
        }
        Role::Pathology => {
            let details = request.pathology.as_ref().ok_or_else(|| missing("Pathology"))?;
            required(&details.lab_name, "Lab name")?;
            required(&details.accreditation_number, "Accreditation number")?;
            required(&details.address, "Address")?;
            encode(serde_json::to_value(details))
        }
        Role::Patient => {
            let details = request.patient.as_ref().ok_or_else(|| missing("Patient"))?;
            if details.date_of_birth > Utc::now().date_naive() {
                return Err(ProfileError::ValidationError(
                    "Date of birth cannot be in the future".to_string(),
                ));
            }
            required(&details.gender, "Gender")?;
            encode(serde_json::to_value(details))
        }
        Role::Admin => Err(ProfileError::ValidationError(
            "Admin accounts cannot be created through signup".to_string(),
        )),
    }
}

fn validate_phone(phone: &str) -> Result<(), ProfileError> {
    if phone_pattern().is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ProfileError::ValidationError(format!("Invalid phone number: {}", phone)))
    }
}

fn merge_details(current: &Value, patch: Value) -> Result<Value, ProfileError> {
    let Value::Object(patch) = patch else {
        return Err(ProfileError::ValidationError("Details must be an object".to_string()));
    };

    let mut merged = match current {
        Value::Object(existing) => existing.clone(),
        _ => Map::new(),
    };
    merged.extend(patch);
    Ok(Value::Object(merged))
}
