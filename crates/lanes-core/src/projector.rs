use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::task::{
  Task,
  TaskStatus
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum SortOrder {
  #[default]
  Priority,
  DueDateAsc,
  CreatedOnDesc
}

impl SortOrder {
  pub fn as_str(self) -> &'static str {
    match self {
      | SortOrder::Priority => "priority",
      | SortOrder::DueDateAsc => {
        "due_date_asc"
      }
      | SortOrder::CreatedOnDesc => {
        "created_on_desc"
      }
    }
  }
}

impl fmt::Display for SortOrder {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortOrder {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let key = s
      .trim()
      .to_ascii_lowercase()
      .replace('-', "_");
    match key.as_str() {
      | "priority" => {
        Ok(SortOrder::Priority)
      }
      | "due_date_asc" | "due" => {
        Ok(SortOrder::DueDateAsc)
      }
      | "created_on_desc"
      | "created" => {
        Ok(SortOrder::CreatedOnDesc)
      }
      | _ => Err(anyhow!(
        "unknown sort order: {s} \
         (expected priority, \
         due_date_asc or \
         created_on_desc)"
      ))
    }
  }
}

/// One status column of the board.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
  pub status: TaskStatus,
  pub tasks:  Vec<Task>
}

impl Column {
  pub fn title(&self) -> &'static str {
    self.status.label()
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }
}

/// Splits `tasks` into the four
/// status columns in display order,
/// each sorted by `sort`.
///
/// Sorting is stable: ties keep the
/// order they had in `tasks`.
#[must_use]
pub fn project(
  tasks: &[Task],
  sort: SortOrder
) -> Vec<Column> {
  TaskStatus::ALL
    .iter()
    .map(|&status| {
      let mut column: Vec<Task> = tasks
        .iter()
        .filter(|task| {
          task.status == status
        })
        .cloned()
        .collect();
      column.sort_by(|a, b| {
        compare(a, b, sort)
      });
      Column {
        status,
        tasks: column
      }
    })
    .collect()
}

fn compare(
  a: &Task,
  b: &Task,
  sort: SortOrder
) -> Ordering {
  match sort {
    | SortOrder::Priority => b
      .priority
      .rank()
      .cmp(&a.priority.rank()),
    | SortOrder::DueDateAsc => {
      match (a.due_date, b.due_date) {
        | (Some(x), Some(y)) => {
          x.cmp(&y)
        }
        | (Some(_), None) => {
          Ordering::Less
        }
        | (None, Some(_)) => {
          Ordering::Greater
        }
        | (None, None) => {
          Ordering::Equal
        }
      }
    }
    | SortOrder::CreatedOnDesc => b
      .created_on
      .cmp(&a.created_on)
  }
}
