//! Program metadata repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist programs, tracked entities and notification templates.
//! - Own the program-to-template link table used by scheduled lookups.
//!
//! # Invariants
//! - Linking a template to a program is idempotent.
//! - Links may only reference existing programs and templates (foreign keys).

use crate::model::program::{
    NotificationTrigger, Program, ProgramNotificationTemplate, TrackedEntity,
};
use crate::model::uid::Uid;
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_bool, parse_uid, RepoError, RepoResult,
    RequiredTable,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const REQUIRED_TABLES: &[RequiredTable] = &[
    RequiredTable {
        name: "programs",
        columns: &["uid", "name"],
    },
    RequiredTable {
        name: "tracked_entities",
        columns: &["uid", "is_deleted"],
    },
    RequiredTable {
        name: "notification_templates",
        columns: &["uid", "name", "trigger_kind", "relative_scheduled_days"],
    },
    RequiredTable {
        name: "program_notification_templates",
        columns: &["program_uid", "template_uid"],
    },
];

const TEMPLATE_SELECT_SQL: &str = "SELECT
    t.uid AS uid,
    t.name AS name,
    t.trigger_kind AS trigger_kind,
    t.relative_scheduled_days AS relative_scheduled_days
FROM notification_templates t";

/// Repository interface for metadata referenced by enrollments.
pub trait MetadataStore {
    fn create_program(&self, program: &Program) -> RepoResult<Uid>;
    fn get_program(&self, uid: &Uid) -> RepoResult<Option<Program>>;
    fn create_tracked_entity(&self, tracked_entity: &TrackedEntity) -> RepoResult<Uid>;
    fn get_tracked_entity(
        &self,
        uid: &Uid,
        include_deleted: bool,
    ) -> RepoResult<Option<TrackedEntity>>;
    fn create_template(&self, template: &ProgramNotificationTemplate) -> RepoResult<Uid>;
    fn get_template(&self, uid: &Uid) -> RepoResult<Option<ProgramNotificationTemplate>>;
    /// Attaches a template to a program. Re-attaching is a no-op.
    fn attach_template(
        &self,
        program: &Program,
        template: &ProgramNotificationTemplate,
    ) -> RepoResult<()>;
    /// Lists templates attached to a program, sorted by name then UID.
    fn list_program_templates(
        &self,
        program: &Program,
    ) -> RepoResult<Vec<ProgramNotificationTemplate>>;
}

/// SQLite-backed metadata repository.
pub struct SqliteMetadataStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMetadataStore<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl MetadataStore for SqliteMetadataStore<'_> {
    fn create_program(&self, program: &Program) -> RepoResult<Uid> {
        self.conn.execute(
            "INSERT INTO programs (uid, name) VALUES (?1, ?2);",
            params![program.uid.as_str(), program.name.as_str()],
        )?;
        Ok(program.uid.clone())
    }

    fn get_program(&self, uid: &Uid) -> RepoResult<Option<Program>> {
        let row = self
            .conn
            .query_row(
                "SELECT uid, name FROM programs WHERE uid = ?1;",
                [uid.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            Some((uid_text, name)) => Ok(Some(Program {
                uid: parse_uid(&uid_text, "programs.uid")?,
                name,
            })),
            None => Ok(None),
        }
    }

    fn create_tracked_entity(&self, tracked_entity: &TrackedEntity) -> RepoResult<Uid> {
        self.conn.execute(
            "INSERT INTO tracked_entities (uid, is_deleted) VALUES (?1, ?2);",
            params![
                tracked_entity.uid.as_str(),
                bool_to_int(tracked_entity.is_deleted)
            ],
        )?;
        Ok(tracked_entity.uid.clone())
    }

    fn get_tracked_entity(
        &self,
        uid: &Uid,
        include_deleted: bool,
    ) -> RepoResult<Option<TrackedEntity>> {
        let row = self
            .conn
            .query_row(
                "SELECT uid, is_deleted
                 FROM tracked_entities
                 WHERE uid = ?1
                   AND (?2 = 1 OR is_deleted = 0);",
                params![uid.as_str(), bool_to_int(include_deleted)],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((uid_text, is_deleted)) => Ok(Some(TrackedEntity {
                uid: parse_uid(&uid_text, "tracked_entities.uid")?,
                is_deleted: parse_bool(is_deleted, "tracked_entities.is_deleted")?,
            })),
            None => Ok(None),
        }
    }

    fn create_template(&self, template: &ProgramNotificationTemplate) -> RepoResult<Uid> {
        self.conn.execute(
            "INSERT INTO notification_templates (
                uid,
                name,
                trigger_kind,
                relative_scheduled_days
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                template.uid.as_str(),
                template.name.as_str(),
                trigger_to_db(template.trigger),
                template.relative_scheduled_days,
            ],
        )?;
        Ok(template.uid.clone())
    }

    fn get_template(&self, uid: &Uid) -> RepoResult<Option<ProgramNotificationTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE t.uid = ?1;"))?;
        let mut rows = stmt.query([uid.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_template_row(row)?));
        }
        Ok(None)
    }

    fn attach_template(
        &self,
        program: &Program,
        template: &ProgramNotificationTemplate,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO program_notification_templates (program_uid, template_uid)
             VALUES (?1, ?2);",
            params![program.uid.as_str(), template.uid.as_str()],
        )?;
        Ok(())
    }

    fn list_program_templates(
        &self,
        program: &Program,
    ) -> RepoResult<Vec<ProgramNotificationTemplate>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TEMPLATE_SELECT_SQL}
             INNER JOIN program_notification_templates pnt ON pnt.template_uid = t.uid
             WHERE pnt.program_uid = ?1
             ORDER BY t.name ASC, t.uid ASC;"
        ))?;
        let mut rows = stmt.query([program.uid.as_str()])?;
        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }
        Ok(templates)
    }
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<ProgramNotificationTemplate> {
    let trigger_text: String = row.get("trigger_kind")?;
    let trigger = parse_trigger(&trigger_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid trigger `{trigger_text}` in notification_templates.trigger_kind"
        ))
    })?;

    Ok(ProgramNotificationTemplate {
        uid: parse_uid(&row.get::<_, String>("uid")?, "notification_templates.uid")?,
        name: row.get("name")?,
        trigger,
        relative_scheduled_days: row.get("relative_scheduled_days")?,
    })
}

fn trigger_to_db(trigger: NotificationTrigger) -> &'static str {
    match trigger {
        NotificationTrigger::Enrollment => "enrollment",
        NotificationTrigger::Completion => "completion",
        NotificationTrigger::ScheduledDaysEnrollmentDate => "scheduled_days_enrollment_date",
        NotificationTrigger::ScheduledDaysIncidentDate => "scheduled_days_incident_date",
    }
}

fn parse_trigger(value: &str) -> Option<NotificationTrigger> {
    match value {
        "enrollment" => Some(NotificationTrigger::Enrollment),
        "completion" => Some(NotificationTrigger::Completion),
        "scheduled_days_enrollment_date" => Some(NotificationTrigger::ScheduledDaysEnrollmentDate),
        "scheduled_days_incident_date" => Some(NotificationTrigger::ScheduledDaysIncidentDate),
        _ => None,
    }
}
