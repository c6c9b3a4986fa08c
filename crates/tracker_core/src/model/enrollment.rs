//! Enrollment domain model.
//!
//! # Responsibility
//! - Define the record linking a tracked entity to a program.
//! - Provide lifecycle helpers for status and soft-delete semantics.
//!
//! # Invariants
//! - `uid` is stable and never reused for another enrollment.
//! - `is_deleted` is the source of truth for tombstone state.
//! - `completed_date` is never earlier than `enrollment_date`.

use crate::model::program::{Program, TrackedEntity};
use crate::model::uid::Uid;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lifecycle state of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    Active,
    Completed,
    Cancelled,
}

/// Validation failures for enrollment invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentValidationError {
    CompletedBeforeEnrollment {
        enrollment_date: NaiveDate,
        completed_date: NaiveDate,
    },
}

impl Display for EnrollmentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompletedBeforeEnrollment {
                enrollment_date,
                completed_date,
            } => write!(
                f,
                "completed_date ({completed_date}) must be >= enrollment_date ({enrollment_date})"
            ),
        }
    }
}

impl Error for EnrollmentValidationError {}

/// A tracked entity's enrollment into one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EnrollmentWire")]
pub struct Enrollment {
    pub uid: Uid,
    /// Owning program UID.
    pub program: Uid,
    /// Enrolled subject UID.
    pub tracked_entity: Uid,
    pub status: ProgramStatus,
    /// Date the subject was enrolled.
    pub enrollment_date: NaiveDate,
    /// Incident date, when the program records one.
    pub occurred_date: Option<NaiveDate>,
    pub completed_date: Option<NaiveDate>,
    /// Soft delete tombstone.
    pub is_deleted: bool,
}

#[derive(Deserialize)]
struct EnrollmentWire {
    uid: Uid,
    program: Uid,
    tracked_entity: Uid,
    status: ProgramStatus,
    enrollment_date: NaiveDate,
    #[serde(default)]
    occurred_date: Option<NaiveDate>,
    #[serde(default)]
    completed_date: Option<NaiveDate>,
    #[serde(default)]
    is_deleted: bool,
}

impl TryFrom<EnrollmentWire> for Enrollment {
    type Error = EnrollmentValidationError;

    fn try_from(value: EnrollmentWire) -> Result<Self, Self::Error> {
        let enrollment = Self {
            uid: value.uid,
            program: value.program,
            tracked_entity: value.tracked_entity,
            status: value.status,
            enrollment_date: value.enrollment_date,
            occurred_date: value.occurred_date,
            completed_date: value.completed_date,
            is_deleted: value.is_deleted,
        };
        enrollment.validate()?;
        Ok(enrollment)
    }
}

impl Enrollment {
    /// Creates an active enrollment with a generated UID.
    pub fn new(
        program: &Program,
        tracked_entity: &TrackedEntity,
        enrollment_date: NaiveDate,
    ) -> Self {
        Self::with_uid(
            Uid::generate(),
            program.uid.clone(),
            tracked_entity.uid.clone(),
            enrollment_date,
        )
    }

    /// Creates an active enrollment with a caller-provided UID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_uid(
        uid: Uid,
        program: Uid,
        tracked_entity: Uid,
        enrollment_date: NaiveDate,
    ) -> Self {
        Self {
            uid,
            program,
            tracked_entity,
            status: ProgramStatus::Active,
            enrollment_date,
            occurred_date: None,
            completed_date: None,
            is_deleted: false,
        }
    }

    /// Validates date invariants.
    pub fn validate(&self) -> Result<(), EnrollmentValidationError> {
        if let Some(completed_date) = self.completed_date {
            if completed_date < self.enrollment_date {
                return Err(EnrollmentValidationError::CompletedBeforeEnrollment {
                    enrollment_date: self.enrollment_date,
                    completed_date,
                });
            }
        }
        Ok(())
    }

    /// Marks this enrollment as softly deleted.
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    /// Clears the soft delete flag.
    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    /// Returns whether this enrollment is visible to default lookups.
    pub fn is_visible(&self) -> bool {
        !self.is_deleted
    }
}
