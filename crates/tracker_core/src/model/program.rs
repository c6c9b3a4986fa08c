//! Program metadata referenced by enrollments.
//!
//! # Responsibility
//! - Define programs, tracked entities and notification templates.
//! - Resolve the calendar date a scheduled template counts from.
//!
//! # Invariants
//! - Only scheduled-days triggers have a trigger date.
//! - Day offsets are applied to calendar dates, never to timestamps.

use crate::model::uid::Uid;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Health program definition. An enrollment belongs to exactly one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub uid: Uid,
    pub name: String,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uid: Uid::generate(),
            name: name.into(),
        }
    }
}

/// Subject (person) enrolled into programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub uid: Uid,
    pub is_deleted: bool,
}

impl TrackedEntity {
    pub fn new() -> Self {
        Self::with_uid(Uid::generate())
    }

    pub fn with_uid(uid: Uid) -> Self {
        Self {
            uid,
            is_deleted: false,
        }
    }
}

impl Default for TrackedEntity {
    fn default() -> Self {
        Self::new()
    }
}

/// Event that makes a program notification template fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTrigger {
    /// Fires immediately when an enrollment is created.
    Enrollment,
    /// Fires immediately when an enrollment is completed.
    Completion,
    /// Fires `relative_scheduled_days` after the enrollment date.
    ScheduledDaysEnrollmentDate,
    /// Fires `relative_scheduled_days` after the incident (occurred) date.
    ScheduledDaysIncidentDate,
}

impl NotificationTrigger {
    /// Returns whether this trigger is resolved by date scheduling.
    pub fn is_scheduled(self) -> bool {
        matches!(
            self,
            Self::ScheduledDaysEnrollmentDate | Self::ScheduledDaysIncidentDate
        )
    }
}

/// Notification rule attached to one or more programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramNotificationTemplate {
    pub uid: Uid,
    pub name: String,
    pub trigger: NotificationTrigger,
    /// Signed day offset from the trigger date. Negative values schedule
    /// reminders ahead of the trigger date.
    pub relative_scheduled_days: i32,
}

impl ProgramNotificationTemplate {
    pub fn new(
        name: impl Into<String>,
        trigger: NotificationTrigger,
        relative_scheduled_days: i32,
    ) -> Self {
        Self {
            uid: Uid::generate(),
            name: name.into(),
            trigger,
            relative_scheduled_days,
        }
    }

    /// Returns the trigger date whose notification lands on
    /// `notification_date`.
    ///
    /// Returns `None` for non-scheduled triggers and for dates outside the
    /// supported calendar range.
    pub fn trigger_date_for(&self, notification_date: NaiveDate) -> Option<NaiveDate> {
        if !self.trigger.is_scheduled() {
            return None;
        }
        notification_date
            .checked_sub_signed(Duration::days(i64::from(self.relative_scheduled_days)))
    }
}
