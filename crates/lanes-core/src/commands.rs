use anyhow::{Context, bail};
use tracing::{debug, instrument};

use crate::board::{Board, LoadState};
use crate::cli::Command;
use crate::editor::EditorSession;
use crate::gateway::TaskGateway;
use crate::render::Renderer;
use crate::task::{TaskPriority, TaskStatus};

/// Field edits requested from the command line, applied to an open form.
#[derive(Debug, Clone, Default)]
struct FormInput {
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    due: Option<String>,
}

impl FormInput {
    fn apply(self, session: &mut EditorSession) -> anyhow::Result<()> {
        if let Some(title) = self.title {
            session.set_title(title);
        }
        if let Some(description) = self.description {
            session.set_description(description);
        }
        if let Some(status) = self.status {
            session.set_status(status)?;
        }
        if let Some(priority) = self.priority {
            session.set_priority(priority);
        }
        if let Some(due) = self.due {
            session.set_due_date(due);
        }
        Ok(())
    }
}

#[instrument(skip(board, renderer))]
pub async fn dispatch<G: TaskGateway>(
    board: &mut Board<G>,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Board { sort } => {
            if let Some(sort) = sort {
                board.set_sort_order(sort);
            }
            board.start().await;
            renderer.print_board(&board.columns(), board.sort_order(), board.load_state())
        }
        Command::Show { id } => {
            require_loaded(board).await?;
            let task = board.task(id)?;
            renderer.print_task_info(&task)
        }
        Command::Add {
            title,
            description,
            status,
            priority,
            due,
        } => {
            require_loaded(board).await?;
            let session = board.open_create(status);
            FormInput {
                title: Some(title),
                description,
                status: None,
                priority,
                due,
            }
            .apply(session)?;
            let task = board.submit_editor().await.context("failed to create task")?;
            renderer.print_line(&format!("Created task {}.", task.id))?;
            renderer.print_task_info(&task)
        }
        Command::Edit {
            id,
            title,
            description,
            status,
            priority,
            due,
        } => {
            require_loaded(board).await?;
            let input = FormInput {
                title,
                description,
                status,
                priority,
                due,
            };
            let session = board.open_edit(id)?;
            input.apply(session)?;
            let task = board
                .submit_editor()
                .await
                .with_context(|| format!("failed to update task {id}"))?;
            renderer.print_line(&format!("Updated task {}.", task.id))?;
            renderer.print_task_info(&task)
        }
        Command::Move { id, status } => {
            require_loaded(board).await?;
            board.begin_drag(id)?;
            board.drag_over(Some(status));
            if let Some(session) = board.drag().session() {
                debug!(task_id = session.task_id(), over = ?session.over(), "dragging");
            }
            let outcome = board.drop_drag().await;
            debug!(?outcome, "drop resolved");
            renderer.print_drop_outcome(outcome)
        }
        Command::Delete { id } => {
            require_loaded(board).await?;
            board
                .delete(id)
                .await
                .with_context(|| format!("failed to delete task {id}"))?;
            renderer.print_line(&format!("Deleted task {id}."))
        }
    }
}

async fn require_loaded<G: TaskGateway>(board: &mut Board<G>) -> anyhow::Result<()> {
    if let LoadState::Failed(message) = board.start().await {
        bail!("could not load tasks: {message}");
    }
    Ok(())
}
