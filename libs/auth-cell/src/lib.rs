pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Profile, ProfileError, RouteAccessRequest, RouteDecision, SignupRequest, UpdateProfileRequest};
pub use router::auth_routes;
