use super::*;

#[test]
fn short_title_reports_minimum_length() {
    let err = draft_from_form("ab", "a valid description", "PENDING").expect_err("must fail");
    assert_eq!(
        err.violations,
        vec![Violation::TooShort {
            field: DraftField::Title,
            min: 3
        }]
    );
    assert!(err.to_string().contains("title must be at least 3 characters"));
}

#[test]
fn every_violation_is_reported_together() {
    let err = draft_from_form("   ", "tiny", "DONE").expect_err("must fail");
    assert_eq!(
        err.violations,
        vec![
            Violation::Required {
                field: DraftField::Title
            },
            Violation::TooShort {
                field: DraftField::Description,
                min: 5
            },
            Violation::InvalidStatus("DONE".to_string()),
        ]
    );
    assert!(err.has_violation_for(DraftField::Status));
}

#[test]
fn missing_status_is_required() {
    let err = draft_from_form("Valid title", "Valid description", "").expect_err("must fail");
    assert_eq!(
        err.violations,
        vec![Violation::Required {
            field: DraftField::Status
        }]
    );
}

#[test]
fn length_is_measured_after_trimming() {
    let padded_title = format!("  {}  ", "x".repeat(TITLE_MAX_LEN));
    let draft = TaskDraft::new(padded_title, "  enough text  ", TaskStatus::Pending);
    let cleaned = validate_draft(&draft).expect("valid after trim");
    assert_eq!(cleaned.title.len(), TITLE_MAX_LEN);
    assert_eq!(cleaned.description, "enough text");

    let too_long = TaskDraft::new(
        "Fine title",
        "d".repeat(DESCRIPTION_MAX_LEN + 1),
        TaskStatus::Completed,
    );
    let err = validate_draft(&too_long).expect_err("too long");
    assert_eq!(
        err.violations,
        vec![Violation::TooLong {
            field: DraftField::Description,
            max: DESCRIPTION_MAX_LEN
        }]
    );
}

#[test]
fn multibyte_characters_count_once() {
    let draft = TaskDraft::new("día", "añadir café", TaskStatus::Pending);
    assert!(validate_draft(&draft).is_ok());
}

#[test]
fn form_input_is_trimmed_and_parsed() {
    let draft =
        draft_from_form("  Buy milk ", " Two liters, skimmed ", "completed").expect("valid");
    assert_eq!(
        draft,
        TaskDraft::new("Buy milk", "Two liters, skimmed", TaskStatus::Completed)
    );
}

#[test]
fn validation_error_maps_to_uniform_shape() {
    let err = draft_from_form("ab", "a valid description", "PENDING").expect_err("must fail");
    let api: ApiError = err.into();
    assert!(api.is_validation());
    assert_eq!(api.status, None);
    assert_eq!(api.code.as_deref(), Some("VALIDATION_ERROR"));
    assert_eq!(
        api.details,
        Some(serde_json::json!(["title must be at least 3 characters"]))
    );
}

#[test]
fn non_positive_ids_are_rejected() {
    assert!(validate_id(TaskId(0)).is_err());
    assert!(validate_id(TaskId(-4)).is_err());
    assert_eq!(validate_id(TaskId(5)).expect("valid"), TaskId(5));
}
