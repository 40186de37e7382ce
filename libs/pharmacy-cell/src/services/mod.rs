pub mod csv_format;
pub mod fields;
pub mod reports;
pub mod store;

pub use store::InventoryStore;
