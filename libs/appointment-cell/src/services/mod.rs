pub mod lifecycle;
pub mod queue;
pub mod stats;

pub use lifecycle::QueueLifecycle;
pub use queue::AppointmentQueueService;
