use tracing::debug;

use shared_models::auth::Role;

use crate::models::RouteDecision;

const PUBLIC_ROUTES: [&str; 4] = ["/", "/login", "/signup", "/forgot-password"];
const SHARED_ROUTES: [&str; 1] = ["/settings"];
const SIGNUP_ROUTE: &str = "/signup";

/// Client-side route guard: decides whether a role may open a dashboard route
/// and where to send it otherwise.
pub struct RouteGuard;

impl RouteGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, role: Option<Role>, path: &str) -> RouteDecision {
        let path = normalize(path);
        debug!("Checking route access for {:?} on {}", role, path);

        if PUBLIC_ROUTES.contains(&path.as_str()) {
            return RouteDecision::allow();
        }

        // Signed in but the signup wizard was never finished.
        let Some(role) = role else {
            return RouteDecision::redirect(SIGNUP_ROUTE);
        };

        if role == Role::Admin {
            return RouteDecision::allow();
        }

        if SHARED_ROUTES.iter().any(|shared| has_prefix(&path, shared)) {
            return RouteDecision::allow();
        }

        // The consultation room is shared by both ends of a call.
        if has_prefix(&path, "/video-call") {
            return if matches!(role, Role::Doctor | Role::Patient) {
                RouteDecision::allow()
            } else {
                RouteDecision::redirect(role.dashboard_path())
            };
        }

        match owner_of(&path) {
            Some(owner) if owner == role => RouteDecision::allow(),
            Some(_) => RouteDecision::redirect(role.dashboard_path()),
            None => RouteDecision::allow(),
        }
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    let path = path.split(&['?', '#'][..]).next().unwrap_or("").trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_ascii_lowercase()
    } else {
        format!("/{}", trimmed.to_ascii_lowercase())
    }
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn owner_of(path: &str) -> Option<Role> {
    Role::ALL
        .into_iter()
        .find(|role| has_prefix(path, role.route_prefix()))
}
