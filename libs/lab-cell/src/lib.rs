pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{LabError, LabReport, LabStatus};
pub use router::lab_routes;
