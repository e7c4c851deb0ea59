//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the database, the search API and the
//! background machinery.

mod dashboard;

pub use dashboard::DashboardService;
