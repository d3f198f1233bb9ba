//! Two-step confirmation for task deletes and status changes.
//!
//! At most one action is pending. Nothing reaches the store until
//! `confirm()`; per-item busy markers are set before the store call starts and
//! cleared once it settles or the `confirm()` future is dropped.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::{TaskId, TaskStatus};
use tracing::{debug, info, warn};

use crate::store::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerPhase {
    #[default]
    Idle,
    PendingConfirmation,
    Executing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Delete { task_id: TaskId },
    StatusChange { task_id: TaskId, new_status: TaskStatus },
}

impl PendingAction {
    pub fn task_id(&self) -> TaskId {
        match self {
            PendingAction::Delete { task_id } | PendingAction::StatusChange { task_id, .. } => {
                *task_id
            }
        }
    }

    fn busy_state(&self) -> ItemState {
        match self {
            PendingAction::Delete { .. } => ItemState::Deleting,
            PendingAction::StatusChange { .. } => ItemState::Updating,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemState {
    #[default]
    Idle,
    Deleting,
    Updating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    Prompted,
    Replaced(PendingAction),
    /// Same status as the task already has, or the task is not listed.
    Unchanged,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Succeeded(PendingAction),
    Failed(PendingAction),
    /// The task disappeared before the status change could be built.
    Skipped(PendingAction),
    NothingPending,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTone {
    Danger,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub title: &'static str,
    pub message: String,
    pub tone: PromptTone,
}

#[derive(Debug, Default)]
struct ControllerState {
    phase: ControllerPhase,
    pending: Option<PendingAction>,
    items: HashMap<TaskId, ItemState>,
}

impl ControllerState {
    fn settle(&mut self, task_id: TaskId) {
        self.items.remove(&task_id);
        self.pending = None;
        self.phase = ControllerPhase::Idle;
    }
}

/// Returns the controller to `Idle` when dropped, including when the
/// `confirm()` future is cancelled mid-flight.
struct ExecutionReset<'a> {
    state: &'a Mutex<ControllerState>,
    task_id: TaskId,
}

impl Drop for ExecutionReset<'_> {
    fn drop(&mut self) {
        lock_state(self.state).settle(self.task_id);
    }
}

// never held across an await
fn lock_state(state: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ConfirmationController {
    store: Arc<TaskStore>,
    state: Mutex<ControllerState>,
}

impl ConfirmationController {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub async fn request_delete(&self, task_id: TaskId) -> IntentOutcome {
        self.open(PendingAction::Delete { task_id }).await
    }

    pub async fn request_status_change(
        &self,
        task_id: TaskId,
        new_status: TaskStatus,
    ) -> IntentOutcome {
        if self.phase().await == ControllerPhase::Executing {
            return IntentOutcome::Busy;
        }
        match self.store.find_task(task_id).await {
            Some(task) if task.status != new_status => {
                self.open(PendingAction::StatusChange {
                    task_id,
                    new_status,
                })
                .await
            }
            Some(_) => {
                debug!(%task_id, status = %new_status, "status unchanged; no prompt");
                IntentOutcome::Unchanged
            }
            None => {
                debug!(%task_id, "status change requested for unknown task");
                IntentOutcome::Unchanged
            }
        }
    }

    pub async fn request_status_cycle(&self, task_id: TaskId) -> IntentOutcome {
        match self.store.find_task(task_id).await {
            Some(task) => self.request_status_change(task_id, task.status.next()).await,
            None => IntentOutcome::Unchanged,
        }
    }

    pub async fn confirm(&self) -> ConfirmOutcome {
        let action = {
            let mut state = self.lock();
            match (state.phase, state.pending) {
                (ControllerPhase::Executing, _) => return ConfirmOutcome::Busy,
                (ControllerPhase::PendingConfirmation, Some(action)) => {
                    state.phase = ControllerPhase::Executing;
                    state.items.insert(action.task_id(), action.busy_state());
                    action
                }
                _ => {
                    state.phase = ControllerPhase::Idle;
                    state.pending = None;
                    return ConfirmOutcome::NothingPending;
                }
            }
        };
        let reset = ExecutionReset {
            state: &self.state,
            task_id: action.task_id(),
        };
        info!(?action, "executing confirmed task action");

        let outcome = match action {
            PendingAction::Delete { task_id } => {
                if self.store.remove(task_id).await {
                    ConfirmOutcome::Succeeded(action)
                } else {
                    ConfirmOutcome::Failed(action)
                }
            }
            PendingAction::StatusChange {
                task_id,
                new_status,
            } => match self.store.find_task(task_id).await {
                Some(task) => {
                    let draft = task.to_draft().with_status(new_status);
                    if self.store.update(task_id, draft).await.is_some() {
                        ConfirmOutcome::Succeeded(action)
                    } else {
                        ConfirmOutcome::Failed(action)
                    }
                }
                None => {
                    warn!(%task_id, "task vanished before its status change ran");
                    self.store
                        .record_error(format!(
                            "Failed to update task: task {task_id} no longer exists"
                        ))
                        .await;
                    ConfirmOutcome::Skipped(action)
                }
            },
        };

        drop(reset);
        debug!(?outcome, "confirmation settled");
        outcome
    }

    pub async fn cancel(&self) -> Option<PendingAction> {
        let mut state = self.lock();
        if state.phase != ControllerPhase::PendingConfirmation {
            return None;
        }
        state.phase = ControllerPhase::Idle;
        let dropped = state.pending.take();
        debug!(?dropped, "confirmation cancelled");
        dropped
    }

    /// Built from the task's title at call time; empty once the task is no
    /// longer listed.
    pub async fn confirmation_message(&self) -> String {
        let Some(action) = self.pending().await else {
            return String::new();
        };
        let Some(task) = self.store.find_task(action.task_id()).await else {
            return String::new();
        };
        match action {
            PendingAction::Delete { .. } => format!(
                "Are you sure you want to delete the task \"{}\"? This action cannot be undone.",
                task.title
            ),
            PendingAction::StatusChange { new_status, .. } => format!(
                "Change the status of task \"{}\" to \"{}\"?",
                task.title,
                new_status.label()
            ),
        }
    }

    pub async fn prompt(&self) -> Option<ConfirmationPrompt> {
        let action = self.pending().await?;
        let (title, tone) = match action {
            PendingAction::Delete { .. } => ("Delete Task", PromptTone::Danger),
            PendingAction::StatusChange { .. } => ("Change Status", PromptTone::Info),
        };
        Some(ConfirmationPrompt {
            title,
            message: self.confirmation_message().await,
            tone,
        })
    }

    pub async fn per_item_state(&self, task_id: TaskId) -> ItemState {
        self.lock()
            .items
            .get(&task_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn per_item_states(&self) -> HashMap<TaskId, ItemState> {
        self.lock().items.clone()
    }

    pub async fn phase(&self) -> ControllerPhase {
        self.lock().phase
    }

    pub async fn pending(&self) -> Option<PendingAction> {
        self.lock().pending
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        lock_state(&self.state)
    }

    async fn open(&self, action: PendingAction) -> IntentOutcome {
        let mut state = self.lock();
        if state.phase == ControllerPhase::Executing {
            return IntentOutcome::Busy;
        }
        let previous = state.pending.replace(action);
        state.phase = ControllerPhase::PendingConfirmation;
        match previous {
            Some(previous) => {
                debug!(?previous, ?action, "pending action replaced");
                IntentOutcome::Replaced(previous)
            }
            None => {
                debug!(?action, "confirmation requested");
                IntentOutcome::Prompted
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/confirm_tests.rs"]
mod tests;
