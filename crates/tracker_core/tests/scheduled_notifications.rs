use chrono::NaiveDate;
use rusqlite::Connection;
use tracker_core::db::open_db_in_memory;
use tracker_core::{
    Enrollment, EnrollmentStore, MetadataStore, NotificationTrigger, Program,
    ProgramNotificationTemplate, ProgramStatus, SqliteEnrollmentStore, SqliteMetadataStore,
    TrackedEntity, Uid,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

struct Fixture {
    conn: Connection,
    program: Program,
    person: TrackedEntity,
}

impl Fixture {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let program = Program::new("Antenatal care");
        let person = TrackedEntity::new();
        {
            let metadata = SqliteMetadataStore::try_new(&conn).unwrap();
            metadata.create_program(&program).unwrap();
            metadata.create_tracked_entity(&person).unwrap();
        }
        Self {
            conn,
            program,
            person,
        }
    }

    fn template(&self, trigger: NotificationTrigger, days: i32) -> ProgramNotificationTemplate {
        let template = ProgramNotificationTemplate::new("follow-up", trigger, days);
        let metadata = SqliteMetadataStore::try_new(&self.conn).unwrap();
        metadata.create_template(&template).unwrap();
        metadata.attach_template(&self.program, &template).unwrap();
        template
    }

    fn store(&self) -> SqliteEnrollmentStore<'_> {
        SqliteEnrollmentStore::try_new(&self.conn).unwrap()
    }

    fn enroll(&self, enrollment_date: NaiveDate, occurred_date: Option<NaiveDate>) -> Enrollment {
        let mut enrollment = Enrollment::new(&self.program, &self.person, enrollment_date);
        enrollment.occurred_date = occurred_date;
        self.store().save(&enrollment).unwrap();
        enrollment
    }
}

fn due_uids(
    fixture: &Fixture,
    template: &ProgramNotificationTemplate,
    on: NaiveDate,
) -> Vec<Uid> {
    fixture
        .store()
        .get_with_scheduled_notifications(template, on)
        .unwrap()
        .into_iter()
        .map(|item| item.uid)
        .collect()
}

#[test]
fn enrollment_date_trigger_matches_exact_day_only() {
    let fixture = Fixture::new();
    let template = fixture.template(NotificationTrigger::ScheduledDaysEnrollmentDate, 3);
    let due = fixture.enroll(date(2024, 2, 28), None);
    let day_before = fixture.enroll(date(2024, 2, 27), None);
    let day_after = fixture.enroll(date(2024, 2, 29), None);

    assert_eq!(due_uids(&fixture, &template, date(2024, 3, 2)), vec![due.uid]);
    assert_eq!(
        due_uids(&fixture, &template, date(2024, 3, 1)),
        vec![day_before.uid]
    );
    assert_eq!(
        due_uids(&fixture, &template, date(2024, 3, 3)),
        vec![day_after.uid]
    );
    assert!(due_uids(&fixture, &template, date(2024, 3, 5)).is_empty());
}

#[test]
fn incident_date_trigger_uses_occurred_date() {
    let fixture = Fixture::new();
    let template = fixture.template(NotificationTrigger::ScheduledDaysIncidentDate, 7);
    let with_incident = fixture.enroll(date(2024, 1, 20), Some(date(2024, 1, 1)));
    fixture.enroll(date(2024, 1, 1), None);

    assert_eq!(
        due_uids(&fixture, &template, date(2024, 1, 8)),
        vec![with_incident.uid]
    );
    assert!(due_uids(&fixture, &template, date(2024, 1, 27)).is_empty());
}

#[test]
fn negative_offset_schedules_before_trigger_date() {
    let fixture = Fixture::new();
    let template = fixture.template(NotificationTrigger::ScheduledDaysEnrollmentDate, -2);
    let enrollment = fixture.enroll(date(2024, 1, 1), None);

    assert_eq!(
        due_uids(&fixture, &template, date(2023, 12, 30)),
        vec![enrollment.uid]
    );
}

#[test]
fn only_active_visible_enrollments_are_due() {
    let fixture = Fixture::new();
    let template = fixture.template(NotificationTrigger::ScheduledDaysEnrollmentDate, 0);
    let active = fixture.enroll(date(2024, 4, 1), None);
    let mut completed = fixture.enroll(date(2024, 4, 1), None);
    let deleted = fixture.enroll(date(2024, 4, 1), None);

    let store = fixture.store();
    completed.status = ProgramStatus::Completed;
    completed.completed_date = Some(date(2024, 4, 2));
    store.update(&completed).unwrap();
    store.soft_delete(&deleted.uid).unwrap();

    assert_eq!(
        due_uids(&fixture, &template, date(2024, 4, 1)),
        vec![active.uid]
    );
}

#[test]
fn template_must_be_attached_to_enrollment_program() {
    let fixture = Fixture::new();
    let detached = ProgramNotificationTemplate::new(
        "other program reminder",
        NotificationTrigger::ScheduledDaysEnrollmentDate,
        0,
    );
    SqliteMetadataStore::try_new(&fixture.conn)
        .unwrap()
        .create_template(&detached)
        .unwrap();
    fixture.enroll(date(2024, 4, 1), None);

    assert!(due_uids(&fixture, &detached, date(2024, 4, 1)).is_empty());
}

#[test]
fn immediate_triggers_never_match() {
    let fixture = Fixture::new();
    let on_enrollment = fixture.template(NotificationTrigger::Enrollment, 0);
    let on_completion = fixture.template(NotificationTrigger::Completion, 0);
    fixture.enroll(date(2024, 4, 1), Some(date(2024, 4, 1)));

    assert!(due_uids(&fixture, &on_enrollment, date(2024, 4, 1)).is_empty());
    assert!(due_uids(&fixture, &on_completion, date(2024, 4, 1)).is_empty());
}
