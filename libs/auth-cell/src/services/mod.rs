pub mod guard;
pub mod profile;

pub use guard::RouteGuard;
pub use profile::ProfileService;
