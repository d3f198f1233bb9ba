pub mod config;
pub mod confirm;
pub mod gateway;
pub mod metrics;
pub mod store;
pub mod validation;
pub mod view;

pub use config::{load_settings, ClientSettings};
pub use confirm::{
    ConfirmOutcome, ConfirmationController, ConfirmationPrompt, ControllerPhase, IntentOutcome,
    ItemState, PendingAction, PromptTone,
};
pub use gateway::{HttpTaskGateway, TaskGateway};
pub use metrics::{MetricsBuffer, RequestMetric};
pub use store::{StoreEvent, StoreSnapshot, TaskStore};
pub use view::{SortKey, SortOrder, SortSpec, ViewQuery};

#[cfg(test)]
#[path = "tests/fake_server.rs"]
mod fake_server;

#[cfg(test)]
#[path = "tests/memory_gateway.rs"]
mod memory_gateway;
