//! Enrollment use-case service.
//!
//! # Responsibility
//! - Provide enroll/complete/cancel/reopen entry points.
//! - Delegate persistence and lookups to an `EnrollmentStore`.
//!
//! # Invariants
//! - Status changes follow `active -> completed|cancelled` and
//!   `completed|cancelled -> active`; nothing else.
//! - Soft-deleted enrollments cannot change status.
//! - Service layer remains storage-agnostic.

use crate::model::enrollment::{Enrollment, ProgramStatus};
use crate::model::program::{Program, ProgramNotificationTemplate, TrackedEntity};
use crate::model::uid::Uid;
use crate::repo::enrollment_repo::EnrollmentStore;
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDate;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from enrollment use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    /// No visible enrollment with this UID.
    NotFound(Uid),
    InvalidTransition {
        uid: Uid,
        from: ProgramStatus,
        to: ProgramStatus,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::NotFound(uid) => write!(f, "enrollment not found: {uid}"),
            Self::InvalidTransition { uid, from, to } => write!(
                f,
                "enrollment {uid} cannot move from {from:?} to {to:?}"
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::NotFound(_) | Self::InvalidTransition { .. } => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Use-case service wrapper for enrollment operations.
pub struct EnrollmentService<S: EnrollmentStore> {
    store: S,
}

impl<S: EnrollmentStore> EnrollmentService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Enrolls a tracked entity into a program as `active`.
    ///
    /// Returns the persisted enrollment with its generated UID.
    pub fn enroll(
        &self,
        tracked_entity: &TrackedEntity,
        program: &Program,
        enrollment_date: NaiveDate,
        occurred_date: Option<NaiveDate>,
    ) -> ServiceResult<Enrollment> {
        let mut enrollment = Enrollment::new(program, tracked_entity, enrollment_date);
        enrollment.occurred_date = occurred_date;
        self.store.save(&enrollment)?;
        info!("event=enrollment_create module=service status=ok");
        Ok(enrollment)
    }

    /// Completes an active enrollment on `completed_date`.
    pub fn complete(&self, uid: &Uid, completed_date: NaiveDate) -> ServiceResult<Enrollment> {
        self.transition(uid, ProgramStatus::Completed, Some(completed_date))
    }

    /// Cancels an active enrollment.
    pub fn cancel(&self, uid: &Uid) -> ServiceResult<Enrollment> {
        self.transition(uid, ProgramStatus::Cancelled, None)
    }

    /// Moves a completed or cancelled enrollment back to `active`.
    pub fn reopen(&self, uid: &Uid) -> ServiceResult<Enrollment> {
        self.transition(uid, ProgramStatus::Active, None)
    }

    /// Enrollments due a scheduled notification of `template` on `date`.
    pub fn due_notifications(
        &self,
        template: &ProgramNotificationTemplate,
        date: NaiveDate,
    ) -> ServiceResult<Vec<Enrollment>> {
        let due = self.store.get_with_scheduled_notifications(template, date)?;
        info!(
            "event=due_notifications module=service status=ok date={} count={}",
            date,
            due.len()
        );
        Ok(due)
    }

    pub fn get(&self, uid: &Uid, include_deleted: bool) -> RepoResult<Option<Enrollment>> {
        self.store.get_by_uid(uid, include_deleted)
    }

    pub fn get_by_program(&self, program: &Program) -> RepoResult<Vec<Enrollment>> {
        self.store.get_by_program(program)
    }

    pub fn get_by_program_and_status(
        &self,
        program: &Program,
        status: ProgramStatus,
    ) -> RepoResult<Vec<Enrollment>> {
        self.store.get_by_program_and_status(program, status)
    }

    pub fn get_by_tracked_entity(
        &self,
        tracked_entity: &TrackedEntity,
        program: &Program,
        status: ProgramStatus,
    ) -> RepoResult<Vec<Enrollment>> {
        self.store.get_by_tracked_entity(tracked_entity, program, status)
    }

    pub fn get_by_programs(&self, programs: &[Program]) -> RepoResult<Vec<Enrollment>> {
        self.store.get_by_programs(programs)
    }

    pub fn get_including_deleted(&self, uids: &[Uid]) -> RepoResult<Vec<Enrollment>> {
        self.store.get_including_deleted(uids)
    }

    pub fn exists(&self, uid: &str) -> RepoResult<bool> {
        self.store.exists(uid)
    }

    pub fn exists_including_deleted(&self, uid: &str) -> RepoResult<bool> {
        self.store.exists_including_deleted(uid)
    }

    /// Soft-deletes an enrollment by UID.
    pub fn soft_delete(&self, uid: &Uid) -> RepoResult<()> {
        self.store.soft_delete(uid)
    }

    /// Permanently removes an enrollment. Cannot be undone.
    pub fn hard_delete(&self, enrollment: &Enrollment) -> RepoResult<()> {
        self.store.hard_delete(enrollment)
    }

    fn transition(
        &self,
        uid: &Uid,
        to: ProgramStatus,
        completed_date: Option<NaiveDate>,
    ) -> ServiceResult<Enrollment> {
        let mut enrollment = self
            .store
            .get_by_uid(uid, false)?
            .ok_or_else(|| ServiceError::NotFound(uid.clone()))?;

        let from = enrollment.status;
        if !is_allowed_transition(from, to) {
            return Err(ServiceError::InvalidTransition {
                uid: uid.clone(),
                from,
                to,
            });
        }

        enrollment.status = to;
        enrollment.completed_date = completed_date;
        self.store.update(&enrollment)?;

        info!(
            "event=enrollment_transition module=service status=ok from={:?} to={:?}",
            from, to
        );
        Ok(enrollment)
    }
}

fn is_allowed_transition(from: ProgramStatus, to: ProgramStatus) -> bool {
    matches!(
        (from, to),
        (ProgramStatus::Active, ProgramStatus::Completed)
            | (ProgramStatus::Active, ProgramStatus::Cancelled)
            | (ProgramStatus::Completed, ProgramStatus::Active)
            | (ProgramStatus::Cancelled, ProgramStatus::Active)
    )
}

#[cfg(test)]
mod tests {
    use super::is_allowed_transition;
    use crate::model::enrollment::ProgramStatus::{Active, Cancelled, Completed};

    #[test]
    fn transitions_only_leave_or_return_to_active() {
        assert!(is_allowed_transition(Active, Completed));
        assert!(is_allowed_transition(Active, Cancelled));
        assert!(is_allowed_transition(Completed, Active));
        assert!(is_allowed_transition(Cancelled, Active));

        assert!(!is_allowed_transition(Active, Active));
        assert!(!is_allowed_transition(Completed, Cancelled));
        assert!(!is_allowed_transition(Cancelled, Completed));
        assert!(!is_allowed_transition(Completed, Completed));
    }
}
