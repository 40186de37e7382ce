pub mod records;
pub mod vitals;

pub use records::HealthRecordService;
