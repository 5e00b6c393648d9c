use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::gateway::{GatewayError, TaskGateway};
use crate::task::{Task, TaskCreate, TaskId, TaskPatch, TaskStatus};

/// Failure of a store intent. In every case the local collection is left as
/// it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to fetch tasks: {cause}")]
    Fetch { cause: GatewayError },
    #[error("failed to create task: {cause}")]
    Create { cause: GatewayError },
    #[error("failed to update task {id}: {cause}")]
    Update { id: TaskId, cause: GatewayError },
    #[error("failed to delete task {id}: {cause}")]
    Delete { id: TaskId, cause: GatewayError },
    #[error("task title must not be empty")]
    EmptyTitle,
}

impl StoreError {
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            StoreError::Fetch { cause }
            | StoreError::Create { cause }
            | StoreError::Update { cause, .. }
            | StoreError::Delete { cause, .. } => Some(cause),
            StoreError::EmptyTitle => None,
        }
    }
}

/// Owner of the local task collection.
///
/// Cloning yields another handle onto the same collection. Every mutation
/// performs its remote call first and only touches local state once the
/// backend has confirmed it. The lock is never held across a remote call, so
/// overlapping intents are possible and the last one to resolve wins.
pub struct TaskStore<G> {
    gateway: Arc<G>,
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl<G> Clone for TaskStore<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl<G: TaskGateway> TaskStore<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway: Arc::new(gateway),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().iter().find(|t| t.id == id).cloned()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.lock().iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Replaces the collection with the backend's full task list.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<usize, StoreError> {
        let fetched = self
            .gateway
            .list_tasks()
            .await
            .map_err(|cause| StoreError::Fetch { cause })?;

        let fetched_count = fetched.len();
        let tasks = dedupe_by_id(fetched);
        if tasks.len() != fetched_count {
            warn!(
                fetched = fetched_count,
                kept = tasks.len(),
                "backend returned duplicate task ids; kept the last of each"
            );
        }

        let count = tasks.len();
        *self.tasks.lock() = tasks;
        info!(count, "loaded tasks");
        Ok(count)
    }

    #[tracing::instrument(skip(self, payload), fields(title_len = payload.title.len()))]
    pub async fn create(&self, payload: TaskCreate) -> Result<Task, StoreError> {
        if payload.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        let payload = payload.with_defaults();

        let created = self
            .gateway
            .create_task(&payload)
            .await
            .map_err(|cause| StoreError::Create { cause })?;

        let mut tasks = self.tasks.lock();
        if let Some(existing) = tasks.iter_mut().find(|t| t.id == created.id) {
            warn!(task_id = created.id, "created task id already present; replacing local entry");
            *existing = created.clone();
        } else {
            tasks.push(created.clone());
        }
        info!(task_id = created.id, status = %created.status, "created task");
        Ok(created)
    }

    /// Moves a task to another column. Only the local `status` field is
    /// reconciled; the rest of the entry stays as it was.
    #[tracing::instrument(skip(self), fields(task_id = id, status = %status))]
    pub async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), StoreError> {
        if !self.contains(id) {
            debug!("status update issued for a task missing from the local collection");
        }

        self.gateway
            .update_status(id, status)
            .await
            .map_err(|cause| StoreError::Update { id, cause })?;

        let mut tasks = self.tasks.lock();
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                let previous = task.status;
                task.status = status;
                info!(from = %previous, to = %status, "task status updated");
            }
            None => warn!("task vanished locally before its status update resolved"),
        }
        Ok(())
    }

    /// Applies a field patch and replaces the local entry with the server's
    /// representation of the task.
    #[tracing::instrument(skip(self, patch), fields(task_id = id))]
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(StoreError::EmptyTitle);
        }

        let updated = self
            .gateway
            .update_task(id, &patch)
            .await
            .map_err(|cause| StoreError::Update { id, cause })?;

        let mut tasks = self.tasks.lock();
        match tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                *task = updated.clone();
                info!("task updated");
            }
            None => warn!("task vanished locally before its update resolved"),
        }
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(task_id = id))]
    pub async fn remove(&self, id: TaskId) -> Result<(), StoreError> {
        self.gateway
            .delete_task(id)
            .await
            .map_err(|cause| StoreError::Delete { id, cause })?;

        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            warn!("deleted task was not in the local collection");
        } else {
            info!(remaining = tasks.len(), "task deleted");
        }
        Ok(())
    }
}

fn dedupe_by_id(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let mut kept: Vec<Task> = tasks
        .into_iter()
        .rev()
        .filter(|t| seen.insert(t.id))
        .collect();
    kept.reverse();
    kept
}
