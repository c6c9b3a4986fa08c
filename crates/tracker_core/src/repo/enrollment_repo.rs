//! Enrollment store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide lookups of enrollments by program, status, subject and UID.
//! - Resolve which enrollments have a scheduled notification on a date.
//! - Own the irreversible `hard_delete` path next to soft delete.
//!
//! # Invariants
//! - Default lookups never return soft-deleted rows; only the
//!   `*_including_deleted` operations see tombstones.
//! - List results are ordered by `enrollment_date ASC, uid ASC`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::enrollment::{Enrollment, ProgramStatus};
use crate::model::program::{
    NotificationTrigger, Program, ProgramNotificationTemplate, TrackedEntity,
};
use crate::model::uid::Uid;
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_bool, parse_uid, RepoError, RepoResult,
    RequiredTable,
};
use chrono::NaiveDate;
use log::{debug, info};
use rusqlite::{params, params_from_iter, Connection, Params, Row};
use std::collections::BTreeSet;

const ENROLLMENT_SELECT_SQL: &str = "SELECT
    e.uid AS uid,
    e.program_uid AS program_uid,
    e.tracked_entity_uid AS tracked_entity_uid,
    e.status AS status,
    e.enrollment_date AS enrollment_date,
    e.occurred_date AS occurred_date,
    e.completed_date AS completed_date,
    e.is_deleted AS is_deleted
FROM enrollments e";

const ENROLLMENT_ORDER_SQL: &str = " ORDER BY e.enrollment_date ASC, e.uid ASC";

/// Upper bound of bound parameters per `IN (...)` batch.
const UID_BATCH_SIZE: usize = 500;

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "enrollments",
        columns: &[
            "uid",
            "program_uid",
            "tracked_entity_uid",
            "status",
            "enrollment_date",
            "occurred_date",
            "completed_date",
            "is_deleted",
            "updated_at",
        ],
    },
    RequiredTable {
        name: "program_notification_templates",
        columns: &["program_uid", "template_uid"],
    },
];

/// Data access contract for enrollments.
pub trait EnrollmentStore {
    /// Inserts a new enrollment and returns its UID.
    fn save(&self, enrollment: &Enrollment) -> RepoResult<Uid>;
    /// Overwrites an existing enrollment by UID.
    fn update(&self, enrollment: &Enrollment) -> RepoResult<()>;
    /// Gets one enrollment with optional deleted-row visibility.
    fn get_by_uid(&self, uid: &Uid, include_deleted: bool) -> RepoResult<Option<Enrollment>>;
    /// Marks an enrollment deleted. Repeated calls are no-ops.
    fn soft_delete(&self, uid: &Uid) -> RepoResult<()>;

    /// All visible enrollments on a program.
    fn get_by_program(&self, program: &Program) -> RepoResult<Vec<Enrollment>>;
    /// Visible enrollments on a program with the given status.
    fn get_by_program_and_status(
        &self,
        program: &Program,
        status: ProgramStatus,
    ) -> RepoResult<Vec<Enrollment>>;
    /// Visible enrollments of one tracked entity on a program with the given status.
    fn get_by_tracked_entity(
        &self,
        tracked_entity: &TrackedEntity,
        program: &Program,
        status: ProgramStatus,
    ) -> RepoResult<Vec<Enrollment>>;
    /// Checks for a visible enrollment with this UID.
    fn exists(&self, uid: &str) -> RepoResult<bool>;
    /// Checks for an enrollment with this UID, deleted or not.
    fn exists_including_deleted(&self, uid: &str) -> RepoResult<bool>;
    /// Batch lookup by UID, deleted rows included.
    fn get_including_deleted(&self, uids: &[Uid]) -> RepoResult<Vec<Enrollment>>;
    /// Active enrollments whose schedule for `template` lands on `notification_date`.
    fn get_with_scheduled_notifications(
        &self,
        template: &ProgramNotificationTemplate,
        notification_date: NaiveDate,
    ) -> RepoResult<Vec<Enrollment>>;
    /// Visible enrollments across several programs.
    fn get_by_programs(&self, programs: &[Program]) -> RepoResult<Vec<Enrollment>>;
    /// Permanently removes the enrollment row.
    fn hard_delete(&self, enrollment: &Enrollment) -> RepoResult<()>;
}

/// SQLite-backed enrollment store.
pub struct SqliteEnrollmentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEnrollmentStore<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn query_enrollments(&self, sql: &str, params: impl Params) -> RepoResult<Vec<Enrollment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut enrollments = Vec::new();
        while let Some(row) = rows.next()? {
            enrollments.push(parse_enrollment_row(row)?);
        }
        Ok(enrollments)
    }

    /// Runs `{ENROLLMENT_SELECT_SQL} WHERE <column> IN (...) <extra>` over
    /// deduplicated keys in batches and merges the results in list order.
    fn query_in_batches(
        &self,
        column: &str,
        keys: BTreeSet<&str>,
        extra_filter: &str,
    ) -> RepoResult<Vec<Enrollment>> {
        let keys: Vec<&str> = keys.into_iter().collect();
        let mut enrollments = Vec::new();
        for chunk in keys.chunks(UID_BATCH_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "{ENROLLMENT_SELECT_SQL} WHERE {column} IN ({placeholders}){extra_filter}"
            );
            enrollments.extend(self.query_enrollments(&sql, params_from_iter(chunk.iter()))?);
        }
        sort_enrollments(&mut enrollments);
        Ok(enrollments)
    }

    fn exists_with_filter(&self, uid: &str, include_deleted: bool) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM enrollments
                WHERE uid = ?1
                  AND (?2 = 1 OR is_deleted = 0)
            );",
            params![uid, bool_to_int(include_deleted)],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl EnrollmentStore for SqliteEnrollmentStore<'_> {
    fn save(&self, enrollment: &Enrollment) -> RepoResult<Uid> {
        enrollment.validate()?;

        self.conn.execute(
            "INSERT INTO enrollments (
                uid,
                program_uid,
                tracked_entity_uid,
                status,
                enrollment_date,
                occurred_date,
                completed_date,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                enrollment.uid.as_str(),
                enrollment.program.as_str(),
                enrollment.tracked_entity.as_str(),
                status_to_db(enrollment.status),
                enrollment.enrollment_date,
                enrollment.occurred_date,
                enrollment.completed_date,
                bool_to_int(enrollment.is_deleted),
            ],
        )?;

        Ok(enrollment.uid.clone())
    }

    fn update(&self, enrollment: &Enrollment) -> RepoResult<()> {
        enrollment.validate()?;

        let changed = self.conn.execute(
            "UPDATE enrollments
             SET
                program_uid = ?1,
                tracked_entity_uid = ?2,
                status = ?3,
                enrollment_date = ?4,
                occurred_date = ?5,
                completed_date = ?6,
                is_deleted = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uid = ?8;",
            params![
                enrollment.program.as_str(),
                enrollment.tracked_entity.as_str(),
                status_to_db(enrollment.status),
                enrollment.enrollment_date,
                enrollment.occurred_date,
                enrollment.completed_date,
                bool_to_int(enrollment.is_deleted),
                enrollment.uid.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(enrollment.uid.clone()));
        }

        Ok(())
    }

    fn get_by_uid(&self, uid: &Uid, include_deleted: bool) -> RepoResult<Option<Enrollment>> {
        let sql = format!(
            "{ENROLLMENT_SELECT_SQL}
             WHERE e.uid = ?1
               AND (?2 = 1 OR e.is_deleted = 0);"
        );
        let mut found =
            self.query_enrollments(&sql, params![uid.as_str(), bool_to_int(include_deleted)])?;
        Ok(found.pop())
    }

    fn soft_delete(&self, uid: &Uid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE enrollments
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uid = ?1;",
            [uid.as_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(uid.clone()));
        }

        Ok(())
    }

    fn get_by_program(&self, program: &Program) -> RepoResult<Vec<Enrollment>> {
        let sql = format!(
            "{ENROLLMENT_SELECT_SQL}
             WHERE e.program_uid = ?1
               AND e.is_deleted = 0{ENROLLMENT_ORDER_SQL};"
        );
        self.query_enrollments(&sql, [program.uid.as_str()])
    }

    fn get_by_program_and_status(
        &self,
        program: &Program,
        status: ProgramStatus,
    ) -> RepoResult<Vec<Enrollment>> {
        let sql = format!(
            "{ENROLLMENT_SELECT_SQL}
             WHERE e.program_uid = ?1
               AND e.status = ?2
               AND e.is_deleted = 0{ENROLLMENT_ORDER_SQL};"
        );
        self.query_enrollments(&sql, params![program.uid.as_str(), status_to_db(status)])
    }

    fn get_by_tracked_entity(
        &self,
        tracked_entity: &TrackedEntity,
        program: &Program,
        status: ProgramStatus,
    ) -> RepoResult<Vec<Enrollment>> {
        let sql = format!(
            "{ENROLLMENT_SELECT_SQL}
             WHERE e.tracked_entity_uid = ?1
               AND e.program_uid = ?2
               AND e.status = ?3
               AND e.is_deleted = 0{ENROLLMENT_ORDER_SQL};"
        );
        self.query_enrollments(
            &sql,
            params![
                tracked_entity.uid.as_str(),
                program.uid.as_str(),
                status_to_db(status)
            ],
        )
    }

    fn exists(&self, uid: &str) -> RepoResult<bool> {
        self.exists_with_filter(uid, false)
    }

    fn exists_including_deleted(&self, uid: &str) -> RepoResult<bool> {
        self.exists_with_filter(uid, true)
    }

    fn get_including_deleted(&self, uids: &[Uid]) -> RepoResult<Vec<Enrollment>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = uids.iter().map(Uid::as_str).collect();
        self.query_in_batches("e.uid", keys, "")
    }

    fn get_with_scheduled_notifications(
        &self,
        template: &ProgramNotificationTemplate,
        notification_date: NaiveDate,
    ) -> RepoResult<Vec<Enrollment>> {
        let Some(column) = trigger_date_column(template.trigger) else {
            debug!(
                "event=scheduled_notifications module=repo status=skipped reason=unscheduled_trigger"
            );
            return Ok(Vec::new());
        };
        let Some(trigger_date) = template.trigger_date_for(notification_date) else {
            debug!(
                "event=scheduled_notifications module=repo status=skipped reason=date_out_of_range"
            );
            return Ok(Vec::new());
        };

        let sql = format!(
            "{ENROLLMENT_SELECT_SQL}
             INNER JOIN program_notification_templates pnt
                ON pnt.program_uid = e.program_uid
             WHERE pnt.template_uid = ?1
               AND e.is_deleted = 0
               AND e.status = ?2
               AND e.{column} = ?3{ENROLLMENT_ORDER_SQL};"
        );
        let enrollments = self.query_enrollments(
            &sql,
            params![
                template.uid.as_str(),
                status_to_db(ProgramStatus::Active),
                trigger_date
            ],
        )?;
        debug!(
            "event=scheduled_notifications module=repo status=ok column={} count={}",
            column,
            enrollments.len()
        );
        Ok(enrollments)
    }

    fn get_by_programs(&self, programs: &[Program]) -> RepoResult<Vec<Enrollment>> {
        if programs.is_empty() {
            return Ok(Vec::new());
        }
        let keys = programs.iter().map(|program| program.uid.as_str()).collect();
        self.query_in_batches("e.program_uid", keys, " AND e.is_deleted = 0")
    }

    fn hard_delete(&self, enrollment: &Enrollment) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM enrollments WHERE uid = ?1;",
            [enrollment.uid.as_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(enrollment.uid.clone()));
        }

        info!("event=enrollment_hard_delete module=repo status=ok");
        Ok(())
    }
}

fn parse_enrollment_row(row: &Row<'_>) -> RepoResult<Enrollment> {
    let uid = parse_uid(&row.get::<_, String>("uid")?, "enrollments.uid")?;
    let program = parse_uid(
        &row.get::<_, String>("program_uid")?,
        "enrollments.program_uid",
    )?;
    let tracked_entity = parse_uid(
        &row.get::<_, String>("tracked_entity_uid")?,
        "enrollments.tracked_entity_uid",
    )?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in enrollments.status"
        ))
    })?;

    let enrollment = Enrollment {
        uid,
        program,
        tracked_entity,
        status,
        enrollment_date: row.get("enrollment_date")?,
        occurred_date: row.get("occurred_date")?,
        completed_date: row.get("completed_date")?,
        is_deleted: parse_bool(row.get("is_deleted")?, "enrollments.is_deleted")?,
    };
    enrollment.validate()?;
    Ok(enrollment)
}

fn sort_enrollments(enrollments: &mut [Enrollment]) {
    enrollments.sort_by(|left, right| {
        left.enrollment_date
            .cmp(&right.enrollment_date)
            .then_with(|| left.uid.cmp(&right.uid))
    });
}

fn trigger_date_column(trigger: NotificationTrigger) -> Option<&'static str> {
    match trigger {
        NotificationTrigger::ScheduledDaysEnrollmentDate => Some("enrollment_date"),
        NotificationTrigger::ScheduledDaysIncidentDate => Some("occurred_date"),
        NotificationTrigger::Enrollment | NotificationTrigger::Completion => None,
    }
}

fn status_to_db(status: ProgramStatus) -> &'static str {
    match status {
        ProgramStatus::Active => "active",
        ProgramStatus::Completed => "completed",
        ProgramStatus::Cancelled => "cancelled",
    }
}

fn parse_status(value: &str) -> Option<ProgramStatus> {
    match value {
        "active" => Some(ProgramStatus::Active),
        "completed" => Some(ProgramStatus::Completed),
        "cancelled" => Some(ProgramStatus::Cancelled),
        _ => None,
    }
}
