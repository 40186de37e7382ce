use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Pulls the raw token out of an `Authorization: Bearer ...` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Validates the bearer token and stores the resulting `User` in the request
/// extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;

    let user = validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Rejects users whose role is not in the allowed set. Must run after
/// `auth_middleware`, i.e. be layered before it.
pub async fn role_guard(
    State(allowed): State<&'static [Role]>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;
    ensure_role(&user, allowed)?;
    Ok(next.run(request).await)
}

pub fn ensure_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if user.has_any_role(allowed) {
        debug!("User {} passed role guard {:?}", user.id, allowed);
        return Ok(());
    }

    warn!(
        "User {} with role {:?} denied, requires one of {:?}",
        user.id, user.role, allowed
    );
    Err(AppError::Forbidden(format!(
        "This action requires one of the roles: {}",
        allowed
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    use crate::test_utils::{JwtTestUtils, TestConfig, TestUser};

    const DOCTOR_ONLY: &[Role] = &[Role::Doctor];

    fn guarded_app() -> (Router, String) {
        let config = TestConfig::default().to_arc();
        let secret = config.supabase_jwt_secret.clone();
        let app = Router::new()
            .route("/queue", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(DOCTOR_ONLY, role_guard))
            .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
            .with_state(config);
        (app, secret)
    }

    async fn guarded_status(user: &TestUser) -> axum::http::StatusCode {
        let (app, secret) = guarded_app();
        let token = JwtTestUtils::create_test_token(user, &secret, Some(1));
        let request = Request::builder()
            .uri("/queue")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_matches!(extract_bearer_token(&headers), Err(AppError::Auth(_)));
    }

    #[test]
    fn ensure_role_forbids_other_roles() {
        let patient = TestUser::patient("p@example.com").to_user();
        assert_matches!(
            ensure_role(&patient, &[Role::Doctor]),
            Err(AppError::Forbidden(msg)) if msg.contains("doctor")
        );

        let admin = TestUser::admin("a@example.com").to_user();
        assert!(ensure_role(&admin, &[Role::Doctor]).is_ok());
    }

    #[tokio::test]
    async fn role_guard_mounts_behind_auth_middleware() {
        use axum::http::StatusCode;

        assert_eq!(guarded_status(&TestUser::doctor("d@example.com")).await, StatusCode::OK);
        assert_eq!(guarded_status(&TestUser::admin("a@example.com")).await, StatusCode::OK);
        assert_eq!(
            guarded_status(&TestUser::pharmacy("rx@example.com")).await,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn extract_user_requires_authenticated_request() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_matches!(extract_user(&request), Err(AppError::Auth(_)));
    }
}
