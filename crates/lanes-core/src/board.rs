//! The coordinating owner of the store, the sort order and the drag and
//! editor sessions.

use tracing::{debug, error, info, warn};

use crate::drag::{DragController, DragError, Intent};
use crate::editor::{EditorError, EditorSession};
use crate::gateway::TaskGateway;
use crate::projector::{Column, SortOrder, project};
use crate::store::{StoreError, TaskStore};
use crate::task::{Task, TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// What came of a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// No drag was active, the card landed on its own column, or outside
    /// every column.
    NoChange,
    Moved { id: TaskId, status: TaskStatus },
    /// The backend refused the move; local state was never touched.
    Rejected { id: TaskId, status: TaskStatus },
}

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("task {0} is not on the board")]
    UnknownTask(TaskId),
    #[error("no editor is open")]
    NoEditor,
    #[error(transparent)]
    Drag(#[from] DragError),
    #[error(transparent)]
    Editor(#[from] EditorError),
}

pub struct Board<G> {
    store: TaskStore<G>,
    sort: SortOrder,
    load_state: LoadState,
    drag: DragController,
    editor: Option<EditorSession>,
}

impl<G: TaskGateway> Board<G> {
    pub fn new(store: TaskStore<G>, sort: SortOrder) -> Self {
        Self {
            store,
            sort,
            load_state: LoadState::Loading,
            drag: DragController::new(),
            editor: None,
        }
    }

    pub fn store(&self) -> &TaskStore<G> {
        &self.store
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    pub fn set_sort_order(&mut self, sort: SortOrder) {
        if self.sort != sort {
            debug!(from = %self.sort, to = %sort, "sort order changed");
            self.sort = sort;
        }
    }

    /// Runs the one startup fetch. A failure leaves an empty board in the
    /// `Failed` state instead of propagating.
    #[tracing::instrument(skip(self))]
    pub async fn start(&mut self) -> &LoadState {
        self.load_state = LoadState::Loading;
        self.load_state = match self.store.load().await {
            Ok(count) => {
                info!(count, "board ready");
                LoadState::Ready
            }
            Err(err) => {
                error!(error = %err, "initial task load failed");
                let reason = err
                    .gateway_error()
                    .map_or_else(|| err.to_string(), ToString::to_string);
                LoadState::Failed(reason)
            }
        };
        &self.load_state
    }

    pub fn columns(&self) -> Vec<Column> {
        project(&self.store.tasks(), self.sort)
    }

    pub fn task(&self, id: TaskId) -> Result<Task, BoardError> {
        self.store.get(id).ok_or(BoardError::UnknownTask(id))
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn begin_drag(&mut self, id: TaskId) -> Result<(), BoardError> {
        let task = self.task(id)?;
        self.drag.begin(&task)?;
        Ok(())
    }

    pub fn drag_over(&mut self, target: Option<TaskStatus>) {
        self.drag.hover(target);
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Resolves the active drag. A rejected move is logged, not returned as
    /// an error: nothing changed locally, so the card simply stays put.
    pub async fn drop_drag(&mut self) -> DropOutcome {
        let Some(intent) = self.drag.release() else {
            return DropOutcome::NoChange;
        };
        let Intent::UpdateStatus { id, status } = intent;
        match self.dispatch(intent).await {
            Ok(()) => DropOutcome::Moved { id, status },
            Err(err) => {
                warn!(task_id = id, status = %status, error = %err, "move rejected; card stays in place");
                DropOutcome::Rejected { id, status }
            }
        }
    }

    pub async fn dispatch(&self, intent: Intent) -> Result<(), StoreError> {
        match intent {
            Intent::UpdateStatus { id, status } => self.store.update_status(id, status).await,
        }
    }

    /// Opens a create form, replacing any form already open.
    pub fn open_create(&mut self, pinned_status: Option<TaskStatus>) -> &mut EditorSession {
        if self.editor.is_some() {
            debug!("replacing open editor with a create form");
        }
        self.editor.insert(EditorSession::create(pinned_status))
    }

    pub fn open_edit(&mut self, id: TaskId) -> Result<&mut EditorSession, BoardError> {
        let task = self.task(id)?;
        if self.editor.is_some() {
            debug!(task_id = id, "replacing open editor with an edit form");
        }
        Ok(self.editor.insert(EditorSession::edit(&task)))
    }

    pub fn editor(&self) -> Option<&EditorSession> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut EditorSession> {
        self.editor.as_mut()
    }

    pub fn close_editor(&mut self) {
        self.editor = None;
    }

    /// Submits the open form. The form closes on success and stays open on
    /// any failure.
    pub async fn submit_editor(&mut self) -> Result<Task, BoardError> {
        let session = self.editor.as_ref().ok_or(BoardError::NoEditor)?;
        let result = session.submit(&self.store).await;
        match result {
            Ok(task) => {
                self.editor = None;
                Ok(task)
            }
            Err(err) => {
                warn!(error = %err, "editor submit failed; form stays open");
                Err(err.into())
            }
        }
    }

    pub async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        self.store.remove(id).await
    }
}
