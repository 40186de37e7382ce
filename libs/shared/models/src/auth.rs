use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Portal role of the token holder. The auth service's own `role` claim is
    /// usually `authenticated`, so the profile role stored in the metadata wins.
    pub fn portal_role(&self) -> Option<String> {
        let from_metadata = |meta: &Option<serde_json::Value>| {
            meta.as_ref()
                .and_then(|m| m.get("role"))
                .and_then(|r| r.as_str())
                .filter(|r| r.parse::<Role>().is_ok())
                .map(str::to_string)
        };

        from_metadata(&self.app_metadata)
            .or_else(|| from_metadata(&self.user_metadata))
            .or_else(|| self.role.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
    Pharmacy,
    Pathology,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Doctor,
        Role::Patient,
        Role::Pharmacy,
        Role::Pathology,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Patient => "patient",
            Role::Pharmacy => "pharmacy",
            Role::Pathology => "pathology",
            Role::Admin => "admin",
        }
    }

    /// Client route of the role's landing dashboard.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Doctor => "/doctor/dashboard",
            Role::Patient => "/patient/dashboard",
            Role::Pharmacy => "/pharmacy/dashboard",
            Role::Pathology => "/pathology/dashboard",
            Role::Admin => "/admin/dashboard",
        }
    }

    /// Leading client route segment owned by the role.
    pub fn route_prefix(&self) -> &'static str {
        match self {
            Role::Doctor => "/doctor",
            Role::Patient => "/patient",
            Role::Pharmacy => "/pharmacy",
            Role::Pathology => "/pathology",
            Role::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            "pharmacy" | "pharmacist" => Ok(Role::Pharmacy),
            "pathology" | "lab" => Ok(Role::Pathology),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn portal_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.portal_role() == Some(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Admin satisfies every role check.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        match self.portal_role() {
            Some(Role::Admin) => true,
            Some(role) => roles.contains(&role),
            None => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}
