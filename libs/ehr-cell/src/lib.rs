pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{HealthRecord, Prescription, RecordError, RecordStatus, Vitals};
pub use router::ehr_routes;
