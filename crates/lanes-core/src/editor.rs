//! Create/edit form sessions.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::datetime::{format_timestamp, parse_date_expr};
use crate::gateway::TaskGateway;
use crate::store::{StoreError, TaskStore};
use crate::task::{Task, TaskCreate, TaskId, TaskPatch, TaskPriority, TaskStatus};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("status is pinned to {pinned} for this form")]
    StatusPinned { pinned: TaskStatus },
    #[error("invalid due date {input:?}: {reason}")]
    InvalidDueDate { input: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create { pinned_status: Option<TaskStatus> },
    Edit { id: TaskId },
}

/// Working copy of the editable fields, as raw form input.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: String,
}

/// What a validated draft turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Create(TaskCreate),
    Update { id: TaskId, patch: TaskPatch },
}

#[derive(Debug, Clone, PartialEq)]
enum Origin {
    Create { pinned_status: Option<TaskStatus> },
    Edit(Box<Task>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorSession {
    origin: Origin,
    draft: TaskDraft,
}

impl EditorSession {
    /// Opens a blank form. A pinned status comes from a column's add
    /// button and cannot be changed afterwards.
    pub fn create(pinned_status: Option<TaskStatus>) -> Self {
        Self {
            origin: Origin::Create { pinned_status },
            draft: TaskDraft {
                title: String::new(),
                description: String::new(),
                status: pinned_status.unwrap_or_default(),
                priority: TaskPriority::default(),
                due_date: String::new(),
            },
        }
    }

    /// Opens a form seeded from `task`. Only fields whose draft moves away
    /// from the seed end up in the submitted patch.
    pub fn edit(task: &Task) -> Self {
        Self {
            origin: Origin::Edit(Box::new(task.clone())),
            draft: TaskDraft {
                title: task.title.clone(),
                description: task.description.clone().unwrap_or_default(),
                status: task.status,
                priority: task.priority,
                due_date: task.due_date.map(format_timestamp).unwrap_or_default(),
            },
        }
    }

    pub fn mode(&self) -> EditorMode {
        match &self.origin {
            Origin::Create { pinned_status } => EditorMode::Create {
                pinned_status: *pinned_status,
            },
            Origin::Edit(seed) => EditorMode::Edit { id: seed.id },
        }
    }

    pub fn draft(&self) -> &TaskDraft {
        &self.draft
    }

    pub fn pinned_status(&self) -> Option<TaskStatus> {
        match self.origin {
            Origin::Create { pinned_status } => pinned_status,
            Origin::Edit(_) => None,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn set_priority(&mut self, priority: TaskPriority) {
        self.draft.priority = priority;
    }

    pub fn set_due_date(&mut self, raw: impl Into<String>) {
        self.draft.due_date = raw.into();
    }

    pub fn set_status(&mut self, status: TaskStatus) -> Result<(), EditorError> {
        if let Some(pinned) = self.pinned_status() {
            if pinned != status {
                return Err(EditorError::StatusPinned { pinned });
            }
        }
        self.draft.status = status;
        Ok(())
    }

    /// Validates the draft and builds the payload it would submit.
    pub fn submission(&self, now: DateTime<Utc>) -> Result<Submission, EditorError> {
        let title = self.draft.title.trim();
        if title.is_empty() {
            return Err(EditorError::EmptyTitle);
        }
        let description = Some(self.draft.description.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        match &self.origin {
            Origin::Create { .. } => {
                let due_date = self.parse_due(now)?;
                self.warn_if_unscheduled(due_date);
                Ok(Submission::Create(TaskCreate {
                    title: title.to_string(),
                    description,
                    status: Some(self.draft.status),
                    priority: Some(self.draft.priority),
                    due_date,
                }))
            }
            Origin::Edit(seed) => {
                let seeded_description = seed.description.as_deref().unwrap_or_default();
                let seeded_due = seed.due_date.map(format_timestamp).unwrap_or_default();

                let due_date = if self.draft.due_date.trim() == seeded_due {
                    None
                } else {
                    Some(self.parse_due(now)?).filter(|due| *due != seed.due_date)
                };
                self.warn_if_unscheduled(due_date.unwrap_or(seed.due_date));

                let patch = TaskPatch {
                    title: (self.draft.title != seed.title && title != seed.title)
                        .then(|| title.to_string()),
                    description: (self.draft.description != seeded_description
                        && description != seed.description)
                        .then_some(description),
                    status: (self.draft.status != seed.status).then_some(self.draft.status),
                    priority: (self.draft.priority != seed.priority)
                        .then_some(self.draft.priority),
                    due_date,
                };
                Ok(Submission::Update { id: seed.id, patch })
            }
        }
    }

    fn parse_due(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, EditorError> {
        let raw = self.draft.due_date.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse_date_expr(raw, now)
            .map(Some)
            .map_err(|err| EditorError::InvalidDueDate {
                input: raw.to_string(),
                reason: format!("{err:#}"),
            })
    }

    fn warn_if_unscheduled(&self, due_date: Option<DateTime<Utc>>) {
        if self.draft.status == TaskStatus::Scheduled && due_date.is_none() {
            warn!("scheduled task submitted without a due date");
        }
    }

    /// Sends the draft through the store. On error the session is left as
    /// it was so the caller can keep it open for another attempt. An edit
    /// that changes nothing resolves to the seeded task without a call.
    #[tracing::instrument(skip(self, store), fields(mode = ?self.mode()))]
    pub async fn submit<G: TaskGateway>(&self, store: &TaskStore<G>) -> Result<Task, EditorError> {
        let submission = self.submission(Utc::now())?;
        if let (Origin::Edit(seed), Submission::Update { patch, .. }) = (&self.origin, &submission)
            && patch.is_empty()
        {
            debug!(task_id = seed.id, "edit changed nothing; skipping update");
            return Ok(store.get(seed.id).unwrap_or_else(|| (**seed).clone()));
        }

        let task = match submission {
            Submission::Create(payload) => store.create(payload).await?,
            Submission::Update { id, patch } => store.update(id, patch).await?,
        };
        info!(task_id = task.id, "editor submitted");
        Ok(task)
    }
}
