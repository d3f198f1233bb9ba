//! In-process task service speaking the REST contract, for gateway and store tests.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use shared::{
    domain::{TaskId, TaskStatus},
    error::ErrorBody,
    protocol::{Task, TaskDraft},
};
use tokio::{net::TcpListener, sync::Mutex};

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

#[derive(Clone, Default)]
pub struct FakeServiceState {
    pub tasks: Arc<Mutex<Vec<Task>>>,
    pub next_id: Arc<Mutex<i64>>,
    pub requests: Arc<Mutex<Vec<String>>>,
    pub fail_listing: Arc<Mutex<bool>>,
    pub fail_status: Arc<Mutex<Option<TaskStatus>>>,
    pub delay: Arc<Mutex<Option<Duration>>>,
}

impl FakeServiceState {
    pub async fn seed(&self, title: &str, description: &str, status: TaskStatus) -> Task {
        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let now = Utc::now();
        let task = Task {
            id: TaskId(*next_id),
            title: title.to_string(),
            description: description.to_string(),
            status,
            created_at: now,
            updated_at: now,
        };
        self.tasks.lock().await.push(task.clone());
        task
    }

    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    async fn log(&self, line: String) {
        self.requests.lock().await.push(line);
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn failure(
        &self,
        status: StatusCode,
        error: &str,
        message: String,
    ) -> (StatusCode, Json<ErrorBody>) {
        (
            status,
            Json(ErrorBody {
                timestamp: Some("2024-01-01T10:00:00".to_string()),
                status: Some(status.as_u16()),
                error: Some(error.to_string()),
                message,
                details: None,
            }),
        )
    }
}

async fn list_tasks(State(state): State<FakeServiceState>) -> ApiResult<Json<Vec<Task>>> {
    state.log("GET /tasks".to_string()).await;
    if *state.fail_listing.lock().await {
        return Err(state
            .failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An unexpected error occurred".to_string(),
            )
            .await);
    }
    Ok(Json(state.tasks.lock().await.clone()))
}

async fn create_task(
    State(state): State<FakeServiceState>,
    Json(draft): Json<TaskDraft>,
) -> (StatusCode, Json<Task>) {
    state.log("POST /tasks".to_string()).await;
    let task = state
        .seed(&draft.title, &draft.description, draft.status)
        .await;
    (StatusCode::CREATED, Json(task))
}

async fn get_task(
    State(state): State<FakeServiceState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    state.log(format!("GET /tasks/{id}")).await;
    let found = state
        .tasks
        .lock()
        .await
        .iter()
        .find(|task| task.id == TaskId(id))
        .cloned();
    match found {
        Some(task) => Ok(Json(task)),
        None => Err(state
            .failure(
                StatusCode::NOT_FOUND,
                "Task Not Found",
                format!("Task {id} does not exist"),
            )
            .await),
    }
}

async fn update_task(
    State(state): State<FakeServiceState>,
    Path(id): Path<i64>,
    Json(draft): Json<TaskDraft>,
) -> ApiResult<Json<Task>> {
    state.log(format!("PUT /tasks/{id}")).await;
    let updated = {
        let mut tasks = state.tasks.lock().await;
        tasks.iter_mut().find(|task| task.id == TaskId(id)).map(|task| {
            task.title = draft.title.clone();
            task.description = draft.description.clone();
            task.status = draft.status;
            task.updated_at = Utc::now();
            task.clone()
        })
    };
    match updated {
        Some(task) => Ok(Json(task)),
        None => Err(state
            .failure(
                StatusCode::NOT_FOUND,
                "Task Not Found",
                format!("Task {id} does not exist"),
            )
            .await),
    }
}

async fn delete_task(
    State(state): State<FakeServiceState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.log(format!("DELETE /tasks/{id}")).await;
    let removed = {
        let mut tasks = state.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|task| task.id != TaskId(id));
        tasks.len() != before
    };
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(state
            .failure(
                StatusCode::NOT_FOUND,
                "Task Not Found",
                format!("Task {id} does not exist"),
            )
            .await)
    }
}

async fn list_by_status(
    State(state): State<FakeServiceState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Vec<Task>>> {
    state.log(format!("GET /tasks/status/{status}")).await;
    let parsed = status.parse::<TaskStatus>().ok();
    let failing = *state.fail_status.lock().await;
    match parsed {
        Some(parsed) if failing != Some(parsed) => Ok(Json(
            state
                .tasks
                .lock()
                .await
                .iter()
                .filter(|task| task.status == parsed)
                .cloned()
                .collect(),
        )),
        Some(_) => Err(state
            .failure(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                "status index offline".to_string(),
            )
            .await),
        None => Err(state
            .failure(
                StatusCode::BAD_REQUEST,
                "STATUS_INVALID",
                format!("Status '{status}' is invalid"),
            )
            .await),
    }
}

pub async fn spawn_task_service() -> anyhow::Result<(String, FakeServiceState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = FakeServiceState::default();
    let app = Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/status/:status", get(list_by_status))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}
