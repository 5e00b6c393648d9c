use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::iso_serde;

pub type TaskId = i64;

/// Column a task lives in. Declaration order is the board's display order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    New,
    Scheduled,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::New,
        TaskStatus::Scheduled,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::New => "New",
            TaskStatus::Scheduled => "Scheduled",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "new" => Ok(TaskStatus::New),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "in_progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            _ => Err(anyhow!(
                "unknown status: {s} (expected new, scheduled, in_progress or completed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::High => 3,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(TaskPriority::Low),
            "medium" | "m" => Ok(TaskPriority::Medium),
            "high" | "h" => Ok(TaskPriority::High),
            _ => Err(anyhow!("unknown priority: {s} (expected low, medium or high)")),
        }
    }
}

/// A task as the backend returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub status: TaskStatus,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default, with = "iso_serde::option")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(with = "iso_serde")]
    pub created_on: DateTime<Utc>,

    #[serde(with = "iso_serde")]
    pub updated_on: DateTime<Utc>,
}

/// Body of `POST /tasks/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskCreate {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_serde::option"
    )]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskCreate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Fills the fields the board never leaves unset.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.status.get_or_insert(TaskStatus::New);
        self.priority.get_or_insert(TaskPriority::Medium);
        self
    }
}

/// Body of `PATCH /tasks/{id}`.
///
/// An outer `None` leaves the field untouched; for the nullable fields
/// `Some(None)` clears it on the server.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso_serde::patch::serialize"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}
