pub mod reports;

pub use reports::LabReportService;
