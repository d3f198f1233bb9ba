use std::fmt;

use shared::{
    domain::{TaskId, TaskStatus},
    error::ApiError,
    protocol::TaskDraft,
};
use thiserror::Error;

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 100;
pub const DESCRIPTION_MIN_LEN: usize = 5;
pub const DESCRIPTION_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Description,
    Status,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DraftField::Title => "title",
            DraftField::Description => "description",
            DraftField::Status => "status",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("{field} is required")]
    Required { field: DraftField },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: DraftField, min: usize },
    #[error("{field} must not exceed {max} characters")]
    TooLong { field: DraftField, max: usize },
    #[error("status '{0}' is invalid")]
    InvalidStatus(String),
}

impl Violation {
    pub fn field(&self) -> DraftField {
        match self {
            Violation::Required { field }
            | Violation::TooShort { field, .. }
            | Violation::TooLong { field, .. } => *field,
            Violation::InvalidStatus(_) => DraftField::Status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task data: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn has_violation_for(&self, field: DraftField) -> bool {
        self.violations.iter().any(|v| v.field() == field)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        let details = value
            .violations
            .iter()
            .map(|v| serde_json::Value::String(v.to_string()))
            .collect();
        ApiError::validation(value.to_string())
            .with_code("VALIDATION_ERROR")
            .with_details(serde_json::Value::Array(details))
    }
}

/// Checks a typed draft and returns its trimmed form.
pub fn validate_draft(draft: &TaskDraft) -> Result<TaskDraft, ValidationError> {
    let mut violations = Vec::new();
    check_text(
        DraftField::Title,
        &draft.title,
        TITLE_MIN_LEN,
        TITLE_MAX_LEN,
        &mut violations,
    );
    check_text(
        DraftField::Description,
        &draft.description,
        DESCRIPTION_MIN_LEN,
        DESCRIPTION_MAX_LEN,
        &mut violations,
    );

    if violations.is_empty() {
        Ok(draft.trimmed())
    } else {
        Err(ValidationError { violations })
    }
}

pub fn draft_from_form(
    title: &str,
    description: &str,
    status: &str,
) -> Result<TaskDraft, ValidationError> {
    let mut violations = Vec::new();
    check_text(
        DraftField::Title,
        title,
        TITLE_MIN_LEN,
        TITLE_MAX_LEN,
        &mut violations,
    );
    check_text(
        DraftField::Description,
        description,
        DESCRIPTION_MIN_LEN,
        DESCRIPTION_MAX_LEN,
        &mut violations,
    );

    let parsed_status = if status.trim().is_empty() {
        violations.push(Violation::Required {
            field: DraftField::Status,
        });
        None
    } else {
        match status.parse::<TaskStatus>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                violations.push(Violation::InvalidStatus(status.to_string()));
                None
            }
        }
    };

    match parsed_status {
        Some(status) if violations.is_empty() => {
            Ok(TaskDraft::new(title.trim(), description.trim(), status))
        }
        _ => Err(ValidationError { violations }),
    }
}

pub fn validate_id(id: TaskId) -> Result<TaskId, ApiError> {
    if id.is_valid() {
        Ok(id)
    } else {
        Err(ApiError::validation(format!("invalid task id {id}")).with_code("INVALID_ID"))
    }
}

fn check_text(
    field: DraftField,
    value: &str,
    min: usize,
    max: usize,
    violations: &mut Vec<Violation>,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        violations.push(Violation::Required { field });
        return;
    }

    let len = trimmed.chars().count();
    if len < min {
        violations.push(Violation::TooShort { field, min });
    } else if len > max {
        violations.push(Violation::TooLong { field, max });
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
