use chrono::NaiveDate;
use tracker_core::{
    Enrollment, EnrollmentValidationError, Program, ProgramStatus, TrackedEntity, Uid,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[test]
fn enrollment_new_sets_defaults() {
    let program = Program::new("Antenatal care");
    let person = TrackedEntity::new();
    let enrollment = Enrollment::new(&program, &person, date(2024, 5, 1));

    assert_eq!(enrollment.program, program.uid);
    assert_eq!(enrollment.tracked_entity, person.uid);
    assert_eq!(enrollment.status, ProgramStatus::Active);
    assert_eq!(enrollment.occurred_date, None);
    assert_eq!(enrollment.completed_date, None);
    assert!(enrollment.is_visible());
    assert_ne!(enrollment.uid, program.uid);
}

#[test]
fn soft_delete_and_restore_toggle_visibility() {
    let program = Program::new("TB");
    let mut enrollment = Enrollment::new(&program, &TrackedEntity::new(), date(2024, 1, 1));

    enrollment.soft_delete();
    assert!(enrollment.is_deleted);
    assert!(!enrollment.is_visible());

    enrollment.restore();
    assert!(enrollment.is_visible());
}

#[test]
fn validate_rejects_completion_before_enrollment() {
    let program = Program::new("TB");
    let mut enrollment = Enrollment::new(&program, &TrackedEntity::new(), date(2024, 3, 10));
    enrollment.completed_date = Some(date(2024, 3, 9));

    assert_eq!(
        enrollment.validate().unwrap_err(),
        EnrollmentValidationError::CompletedBeforeEnrollment {
            enrollment_date: date(2024, 3, 10),
            completed_date: date(2024, 3, 9),
        }
    );

    enrollment.completed_date = Some(date(2024, 3, 10));
    assert!(enrollment.validate().is_ok());
}

#[test]
fn enrollment_serialization_uses_expected_wire_fields() {
    let mut enrollment = Enrollment::with_uid(
        Uid::parse("MNWZ6hnuhSw").unwrap(),
        Uid::parse("IpHINAT79UW").unwrap(),
        Uid::parse("PQfMcpmXeFE").unwrap(),
        date(2024, 2, 29),
    );
    enrollment.status = ProgramStatus::Completed;
    enrollment.occurred_date = Some(date(2024, 2, 20));
    enrollment.completed_date = Some(date(2024, 4, 1));

    let json = serde_json::to_value(&enrollment).unwrap();
    assert_eq!(json["uid"], "MNWZ6hnuhSw");
    assert_eq!(json["program"], "IpHINAT79UW");
    assert_eq!(json["tracked_entity"], "PQfMcpmXeFE");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["enrollment_date"], "2024-02-29");
    assert_eq!(json["occurred_date"], "2024-02-20");
    assert_eq!(json["completed_date"], "2024-04-01");
    assert_eq!(json["is_deleted"], false);

    let decoded: Enrollment = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, enrollment);
}

#[test]
fn deserialize_rejects_malformed_uid() {
    let value = serde_json::json!({
        "uid": "not a uid",
        "program": "IpHINAT79UW",
        "tracked_entity": "PQfMcpmXeFE",
        "status": "active",
        "enrollment_date": "2024-01-01"
    });

    let err = serde_json::from_value::<Enrollment>(value).unwrap_err();
    assert!(err.to_string().contains("invalid uid"));
}

#[test]
fn deserialize_rejects_completion_before_enrollment() {
    let value = serde_json::json!({
        "uid": "MNWZ6hnuhSw",
        "program": "IpHINAT79UW",
        "tracked_entity": "PQfMcpmXeFE",
        "status": "completed",
        "enrollment_date": "2024-01-10",
        "completed_date": "2024-01-01"
    });

    let err = serde_json::from_value::<Enrollment>(value).unwrap_err();
    assert!(err.to_string().contains("completed_date"));
}
