//! Tracker domain model.
//!
//! # Responsibility
//! - Define enrollment records and the metadata they reference.
//! - Keep identifier and date validation close to the types that carry them.
//!
//! # Invariants
//! - Every record is identified by a validated `Uid`.
//! - Enrollment deletion is a soft-delete flag; physical removal is a
//!   repository operation (`hard_delete`).

pub mod enrollment;
pub mod program;
pub mod uid;
