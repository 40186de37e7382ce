use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::extract_bearer_token;
use shared_utils::jwt;

use crate::models::{
    DashboardResponse, Profile, RouteAccessRequest, RouteDecision, SignupRequest,
    UpdateProfileRequest,
};
use crate::services::{ProfileService, RouteGuard};

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    let user = jwt::validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Boolean check for clients; never fails, even without a header.
pub async fn verify_token(State(config): State<Arc<AppConfig>>, headers: HeaderMap) -> Json<Value> {
    debug!("Verifying token");

    let valid = extract_bearer_token(&headers)
        .ok()
        .is_some_and(|token| jwt::validate_token(&token, &config.supabase_jwt_secret).is_ok());

    Json(json!({ "valid": valid }))
}

#[axum::debug_handler]
pub async fn signup(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("Signup for user {} as {}", user.id, request.role);

    let service = ProfileService::new(&config);
    let profile = service.create_profile(&user, request, auth.token()).await?;

    info!("User {} completed signup", user.id);
    Ok(Json(json!({
        "success": true,
        "profile": profile,
        "dashboard": profile.role.dashboard_path(),
    })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Profile>, AppError> {
    debug!("Getting profile for user: {}", user.id);

    let service = ProfileService::new(&config);
    let profile = service.get_profile(&user.id, auth.token()).await?;

    Ok(Json(profile))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    debug!("Updating settings for user: {}", user.id);

    let service = ProfileService::new(&config);
    let profile = service.update_profile(&user.id, request, auth.token()).await?;

    Ok(Json(profile))
}

/// Landing route after login, picked from the token's role or the stored
/// profile.
#[axum::debug_handler]
pub async fn get_dashboard(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<DashboardResponse>, AppError> {
    let service = ProfileService::new(&config);
    let role = service
        .resolve_role(&user, auth.token())
        .await?
        .ok_or_else(|| AppError::Forbidden("Account has no portal role; complete signup first".to_string()))?;

    Ok(Json(DashboardResponse {
        role,
        dashboard: role.dashboard_path().to_string(),
    }))
}

#[axum::debug_handler]
pub async fn check_route_access(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RouteAccessRequest>,
) -> Result<Json<RouteDecision>, AppError> {
    let service = ProfileService::new(&config);
    let role = service.resolve_role(&user, auth.token()).await?;

    let decision = RouteGuard::new().check(role, &request.path);
    debug!(
        "Route {} for user {}: allowed={} redirect={:?}",
        request.path, user.id, decision.allowed, decision.redirect_to
    );
    Ok(Json(decision))
}
