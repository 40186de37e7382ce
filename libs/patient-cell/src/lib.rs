pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Patient, PatientError};
pub use router::patient_routes;
