use std::cmp::Ordering;

use shared::{domain::TaskStatus, protocol::Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(key: SortKey) -> Self {
        Self {
            key,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(key: SortKey) -> Self {
        Self {
            key,
            order: SortOrder::Desc,
        }
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = match self.key {
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub status: Option<TaskStatus>,
    pub search: String,
    pub sort: Option<SortSpec>,
}

impl ViewQuery {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }

        let term = self.search.trim();
        if term.is_empty() {
            return true;
        }
        let term = term.to_lowercase();
        task.title.to_lowercase().contains(&term) || task.description.to_lowercase().contains(&term)
    }

    pub fn is_identity(&self) -> bool {
        self.status.is_none() && self.search.trim().is_empty() && self.sort.is_none()
    }
}

/// Pure projection of `full_list`; server order is kept unless a sort is set.
pub fn recompute(full_list: &[Task], query: &ViewQuery) -> Vec<Task> {
    if query.is_identity() {
        return full_list.to_vec();
    }

    let mut view: Vec<Task> = full_list
        .iter()
        .filter(|task| query.matches(task))
        .cloned()
        .collect();
    if let Some(sort) = query.sort {
        view.sort_by(|a, b| sort.compare(a, b));
    }
    view
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
