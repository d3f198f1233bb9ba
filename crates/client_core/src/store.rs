//! Cached task list with refetch-on-write.
//!
//! The store never patches its list locally: each mutation is followed by a
//! full refresh, and a refresh publishes the list and the stats together or
//! not at all. Failures end up in `last_error` as display text; no error
//! value crosses into callers.

use std::sync::Arc;

use shared::{
    domain::{TaskId, TaskStatus},
    error::ApiError,
    protocol::{Task, TaskDraft, TaskStats},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    gateway::TaskGateway,
    view::{recompute, SortSpec, ViewQuery},
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    LoadingChanged(bool),
    Refreshed { total: usize },
    ViewChanged { visible: usize },
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Visible (filtered, searched, sorted) tasks.
    pub tasks: Vec<Task>,
    pub all_tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
    pub stats: TaskStats,
}

#[derive(Default)]
struct StoreState {
    full_list: Vec<Task>,
    derived_view: Vec<Task>,
    stats: TaskStats,
    loading: bool,
    last_error: Option<String>,
    query: ViewQuery,
    refresh_generation: u64,
}

impl StoreState {
    fn recompute_view(&mut self) -> usize {
        self.derived_view = recompute(&self.full_list, &self.query);
        self.derived_view.len()
    }
}

pub struct TaskStore {
    gateway: Arc<dyn TaskGateway>,
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl TaskStore {
    pub fn new(gateway: Arc<dyn TaskGateway>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn TaskGateway> {
        &self.gateway
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Only the most recently started refresh publishes. A superseded one
    /// leaves state alone and reports whether its own fetch succeeded.
    pub async fn refresh(&self) -> bool {
        let generation = {
            let mut guard = self.state.write().await;
            guard.refresh_generation += 1;
            guard.loading = true;
            guard.last_error = None;
            guard.refresh_generation
        };
        self.emit(StoreEvent::LoadingChanged(true));

        let fetched = futures::try_join!(self.gateway.list_all(), self.gateway.get_stats());

        let outcome = {
            let mut guard = self.state.write().await;
            if guard.refresh_generation != generation {
                debug!(
                    generation,
                    latest = guard.refresh_generation,
                    "dropping superseded task refresh"
                );
                return fetched.is_ok();
            }
            guard.loading = false;
            match fetched {
                Ok((tasks, stats)) => {
                    guard.full_list = tasks;
                    guard.stats = stats;
                    let visible = guard.recompute_view();
                    Ok((guard.full_list.len(), visible))
                }
                Err(err) => {
                    let message = describe("Failed to load tasks", &err);
                    guard.last_error = Some(message.clone());
                    Err(message)
                }
            }
        };
        self.emit(StoreEvent::LoadingChanged(false));

        match outcome {
            Ok((total, visible)) => {
                info!(total, visible, "task list refreshed");
                self.emit(StoreEvent::Refreshed { total });
                self.emit(StoreEvent::ViewChanged { visible });
                true
            }
            Err(message) => {
                warn!(error = %message, "task refresh failed; keeping previous list");
                self.emit(StoreEvent::Error(message));
                false
            }
        }
    }

    pub async fn create(&self, draft: TaskDraft) -> Option<Task> {
        self.clear_error().await;
        let result = self.gateway.create(&draft).await;
        self.settle_mutation(result, "Failed to create task").await
    }

    pub async fn update(&self, id: TaskId, draft: TaskDraft) -> Option<Task> {
        self.clear_error().await;
        let result = self.gateway.update(id, &draft).await;
        self.settle_mutation(result, "Failed to update task").await
    }

    pub async fn remove(&self, id: TaskId) -> bool {
        self.clear_error().await;
        let result = self.gateway.remove(id).await;
        self.settle_mutation(result, "Failed to delete task")
            .await
            .is_some()
    }

    pub async fn filter_by_status(&self, status: Option<TaskStatus>) {
        self.update_query(|query| query.status = status).await;
    }

    pub async fn search(&self, term: &str) {
        let term = term.to_string();
        self.update_query(move |query| query.search = term).await;
    }

    pub async fn sort_by(&self, sort: Option<SortSpec>) {
        self.update_query(|query| query.sort = sort).await;
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let guard = self.state.read().await;
        StoreSnapshot {
            tasks: guard.derived_view.clone(),
            all_tasks: guard.full_list.clone(),
            loading: guard.loading,
            error: guard.last_error.clone(),
            stats: guard.stats,
        }
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.read().await.derived_view.clone()
    }

    pub async fn all_tasks(&self) -> Vec<Task> {
        self.state.read().await.full_list.clone()
    }

    pub async fn stats(&self) -> TaskStats {
        self.state.read().await.stats
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn query(&self) -> ViewQuery {
        self.state.read().await.query.clone()
    }

    pub async fn find_task(&self, id: TaskId) -> Option<Task> {
        self.state
            .read()
            .await
            .full_list
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    pub(crate) async fn record_error(&self, message: String) {
        self.state.write().await.last_error = Some(message.clone());
        self.emit(StoreEvent::Error(message));
    }

    async fn settle_mutation<T>(&self, result: Result<T, ApiError>, context: &str) -> Option<T> {
        if let Err(err) = &result {
            warn!(error = %err, kind = ?err.kind, "{context}");
        }

        self.refresh().await;

        match result {
            Ok(value) => Some(value),
            Err(err) => {
                // refresh() cleared last_error; the mutation failure takes precedence
                self.record_error(describe(context, &err)).await;
                None
            }
        }
    }

    async fn update_query<F>(&self, change: F)
    where
        F: FnOnce(&mut ViewQuery),
    {
        let visible = {
            let mut guard = self.state.write().await;
            change(&mut guard.query);
            let visible = guard.recompute_view();
            debug!(query = ?guard.query, visible, "task view recomputed");
            visible
        };
        self.emit(StoreEvent::ViewChanged { visible });
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

fn describe(context: &str, err: &ApiError) -> String {
    if err.message.trim().is_empty() {
        context.to_string()
    } else {
        format!("{context}: {}", err.message)
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
