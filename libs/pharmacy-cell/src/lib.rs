pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{CsvPreview, InventoryError, InventorySummary, Medicine};
pub use router::{pharmacy_routes, PharmacyState};
pub use services::InventoryStore;
