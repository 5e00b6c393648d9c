use tracing::debug;

use crate::task::{
  Task,
  TaskId,
  TaskStatus
};

/// A request from a board component
/// for one remote-backed mutation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Intent {
  UpdateStatus {
    id:     TaskId,
    status: TaskStatus
  }
}

#[derive(
  Debug,
  thiserror::Error,
  PartialEq,
  Eq,
)]
pub enum DragError {
  #[error(
    "task {active} is already being \
     dragged"
  )]
  AlreadyDragging { active: TaskId }
}

/// The card currently held by the
/// pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
  snapshot: Task,
  over:     Option<TaskStatus>
}

impl DragSession {
  pub fn task_id(&self) -> TaskId {
    self.snapshot.id
  }

  /// The task as it was when picked
  /// up, for rendering a preview.
  pub fn snapshot(&self) -> &Task {
    &self.snapshot
  }

  pub fn over(
    &self
  ) -> Option<TaskStatus> {
    self.over
  }
}

/// Tracks at most one drag at a time.
///
/// `Idle` is `session == None`. The
/// controller never touches the store;
/// a successful drop hands back an
/// [`Intent`] for the owner to
/// dispatch.
#[derive(Debug, Default)]
pub struct DragController {
  session: Option<DragSession>
}

impl DragController {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_dragging(&self) -> bool {
    self.session.is_some()
  }

  pub fn session(
    &self
  ) -> Option<&DragSession> {
    self.session.as_ref()
  }

  pub fn begin(
    &mut self,
    task: &Task
  ) -> Result<(), DragError> {
    if let Some(active) = &self.session
    {
      return Err(
        DragError::AlreadyDragging {
          active: active.task_id()
        }
      );
    }

    debug!(
      task_id = task.id,
      status = %task.status,
      "drag start"
    );
    self.session = Some(DragSession {
      snapshot: task.clone(),
      over:     None
    });
    Ok(())
  }

  /// Records the drop target under
  /// the pointer, `None` when it is
  /// outside every column.
  pub fn hover(
    &mut self,
    target: Option<TaskStatus>
  ) {
    let Some(session) =
      self.session.as_mut()
    else {
      return;
    };
    if session.over != target {
      debug!(
        task_id = session.task_id(),
        over = ?target,
        "drag over"
      );
      session.over = target;
    }
  }

  /// Ends the drag at the current
  /// target. Yields a status intent
  /// only when the target is a column
  /// other than the one the card was
  /// picked up from.
  pub fn release(
    &mut self
  ) -> Option<Intent> {
    let session = self.session.take()?;
    let id = session.task_id();
    let from = session.snapshot.status;

    match session.over {
      | Some(target)
        if target != from =>
      {
        debug!(
          task_id = id,
          from = %from,
          to = %target,
          "drop on new column"
        );
        Some(Intent::UpdateStatus {
          id,
          status: target
        })
      }
      | Some(_) => {
        debug!(
          task_id = id,
          "drop on own column; nothing \
           to do"
        );
        None
      }
      | None => {
        debug!(
          task_id = id,
          "drop outside any column"
        );
        None
      }
    }
  }

  pub fn cancel(&mut self) {
    if let Some(session) =
      self.session.take()
    {
      debug!(
        task_id = session.task_id(),
        "drag cancelled"
      );
    }
  }
}
