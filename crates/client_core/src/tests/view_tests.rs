use super::*;
use chrono::{Duration, TimeZone, Utc};
use shared::domain::TaskId;

fn task(id: i64, title: &str, description: &str, status: TaskStatus, age_minutes: i64) -> Task {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    Task {
        id: TaskId(id),
        title: title.to_string(),
        description: description.to_string(),
        status,
        created_at: base - Duration::minutes(age_minutes),
        updated_at: base - Duration::minutes(age_minutes / 2),
    }
}

fn groceries() -> Vec<Task> {
    vec![
        task(1, "Buy milk", "From the corner shop", TaskStatus::Pending, 30),
        task(2, "Buy eggs", "A dozen", TaskStatus::Completed, 10),
        task(3, "Call plumber", "Kitchen sink leaks, BUY washer", TaskStatus::Pending, 20),
    ]
}

fn ids(tasks: &[Task]) -> Vec<i64> {
    tasks.iter().map(|t| t.id.0).collect()
}

#[test]
fn empty_query_is_the_full_list() {
    let full = groceries();
    assert_eq!(recompute(&full, &ViewQuery::default()), full);
}

#[test]
fn status_and_search_compose() {
    let full = vec![
        task(1, "Buy milk", "Two liters", TaskStatus::Pending, 1),
        task(2, "Buy eggs", "A dozen", TaskStatus::Completed, 2),
    ];
    let query = ViewQuery {
        status: Some(TaskStatus::Pending),
        search: "buy".to_string(),
        sort: None,
    };
    let view = recompute(&full, &query);
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].title, "Buy milk");
}

#[test]
fn search_matches_description_case_insensitively() {
    let query = ViewQuery {
        search: "  WASHER ".to_string(),
        ..ViewQuery::default()
    };
    assert_eq!(ids(&recompute(&groceries(), &query)), vec![3]);
}

#[test]
fn blank_search_keeps_status_constraint() {
    let query = ViewQuery {
        status: Some(TaskStatus::Pending),
        search: "   ".to_string(),
        sort: None,
    };
    assert_eq!(ids(&recompute(&groceries(), &query)), vec![1, 3]);
}

#[test]
fn sorting_applies_after_filtering() {
    let by_created = ViewQuery {
        sort: Some(SortSpec::asc(SortKey::CreatedAt)),
        ..ViewQuery::default()
    };
    assert_eq!(ids(&recompute(&groceries(), &by_created)), vec![1, 3, 2]);

    let by_title_desc = ViewQuery {
        status: Some(TaskStatus::Pending),
        sort: Some(SortSpec::desc(SortKey::Title)),
        ..ViewQuery::default()
    };
    assert_eq!(ids(&recompute(&groceries(), &by_title_desc)), vec![3, 1]);
}

#[test]
fn no_match_yields_empty_view() {
    let query = ViewQuery {
        status: Some(TaskStatus::Cancelled),
        ..ViewQuery::default()
    };
    assert!(recompute(&groceries(), &query).is_empty());
}
