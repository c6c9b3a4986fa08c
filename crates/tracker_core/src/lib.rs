//! Core domain logic for tracker enrollments.
//! This crate owns enrollment persistence and its invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::enrollment::{Enrollment, EnrollmentValidationError, ProgramStatus};
pub use model::program::{NotificationTrigger, Program, ProgramNotificationTemplate, TrackedEntity};
pub use model::uid::{Uid, UidError};
pub use repo::enrollment_repo::{EnrollmentStore, SqliteEnrollmentStore};
pub use repo::metadata_repo::{MetadataStore, SqliteMetadataStore};
pub use repo::{RepoError, RepoResult};
pub use service::enrollment_service::{EnrollmentService, ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
