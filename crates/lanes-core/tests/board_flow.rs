use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use lanes_core::board::{Board, BoardError, DropOutcome, LoadState};
use lanes_core::cli::Command;
use lanes_core::commands::dispatch;
use lanes_core::editor::EditorError;
use lanes_core::gateway::{GatewayError, TaskGateway};
use lanes_core::projector::SortOrder;
use lanes_core::render::Renderer;
use lanes_core::store::{StoreError, TaskStore};
use lanes_core::task::{Task, TaskCreate, TaskId, TaskPatch, TaskPriority, TaskStatus};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    List,
    Create(TaskCreate),
    UpdateStatus(TaskId, TaskStatus),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
}

/// Backend stand-in: keeps its own copy of the tasks, records every call,
/// and can be told to fail or to hold a status response until released.
#[derive(Default)]
struct MemoryGateway {
    server: RefCell<Vec<Task>>,
    next_id: Cell<TaskId>,
    calls: RefCell<Vec<Call>>,
    failing: Cell<bool>,
    status_gates: RefCell<HashMap<TaskStatus, oneshot::Receiver<()>>>,
}

impl MemoryGateway {
    fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        Self {
            server: RefCell::new(tasks),
            next_id: Cell::new(next_id),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| *c != Call::List).collect()
    }

    fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    fn hold_status(&self, status: TaskStatus, gate: oneshot::Receiver<()>) {
        self.status_gates.borrow_mut().insert(status, gate);
    }

    fn check_failure(&self) -> Result<(), GatewayError> {
        if self.failing.get() {
            return Err(GatewayError::Status {
                status: 500,
                body: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn modify(&self, id: TaskId, apply: impl FnOnce(&mut Task)) -> Result<Task, GatewayError> {
        let mut server = self.server.borrow_mut();
        let task = server
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                body: format!("task {id} not found"),
            })?;
        apply(task);
        task.updated_on += Duration::minutes(1);
        Ok(task.clone())
    }
}

impl TaskGateway for MemoryGateway {
    async fn list_tasks(&self) -> Result<Vec<Task>, GatewayError> {
        self.calls.borrow_mut().push(Call::List);
        self.check_failure()?;
        Ok(self.server.borrow().clone())
    }

    async fn create_task(&self, payload: &TaskCreate) -> Result<Task, GatewayError> {
        self.calls.borrow_mut().push(Call::Create(payload.clone()));
        self.check_failure()?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let task = Task {
            id,
            title: payload.title.clone(),
            description: payload.description.clone(),
            status: payload.status.unwrap_or_default(),
            priority: payload.priority.unwrap_or_default(),
            due_date: payload.due_date,
            created_on: base_time(),
            updated_on: base_time(),
        };
        self.server.borrow_mut().push(task.clone());
        Ok(task)
    }

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, GatewayError> {
        self.calls.borrow_mut().push(Call::UpdateStatus(id, status));
        self.check_failure()?;
        let updated = self.modify(id, |task| task.status = status)?;
        let gate = self.status_gates.borrow_mut().remove(&status);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(updated)
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.calls.borrow_mut().push(Call::Update(id, patch.clone()));
        self.check_failure()?;
        let patch = patch.clone();
        self.modify(id, move |task| {
            if let Some(title) = patch.title {
                task.title = title.trim().to_string();
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(due_date) = patch.due_date {
                task.due_date = due_date;
            }
        })
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), GatewayError> {
        self.calls.borrow_mut().push(Call::Delete(id));
        self.check_failure()?;
        let mut server = self.server.borrow_mut();
        let before = server.len();
        server.retain(|t| t.id != id);
        if server.len() == before {
            return Err(GatewayError::Status {
                status: 404,
                body: format!("task {id} not found"),
            });
        }
        Ok(())
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0)
        .single()
        .expect("valid base time")
}

fn task(id: TaskId, status: TaskStatus, priority: TaskPriority) -> Task {
    Task {
        id,
        title: format!("task {id}"),
        description: Some(format!("about task {id}")),
        status,
        priority,
        due_date: None,
        created_on: base_time(),
        updated_on: base_time(),
    }
}

async fn loaded_store(tasks: Vec<Task>) -> TaskStore<MemoryGateway> {
    let store = TaskStore::new(MemoryGateway::with_tasks(tasks));
    store.load().await.expect("initial load");
    store
}

async fn ready_board(tasks: Vec<Task>) -> Board<MemoryGateway> {
    let mut board = Board::new(
        TaskStore::new(MemoryGateway::with_tasks(tasks)),
        SortOrder::Priority,
    );
    assert_eq!(board.start().await, &LoadState::Ready);
    board
}

#[tokio::test]
async fn failed_initial_load_leaves_an_empty_failed_board() {
    let gateway = MemoryGateway::with_tasks(vec![task(1, TaskStatus::New, TaskPriority::High)]);
    gateway.set_failing(true);
    let mut board = Board::new(TaskStore::new(gateway), SortOrder::Priority);
    assert_eq!(board.load_state(), &LoadState::Loading);

    let state = board.start().await.clone();
    assert_eq!(
        state,
        LoadState::Failed("HTTP 500: backend unavailable".to_string())
    );
    assert!(board.store().is_empty());
    assert!(board.columns().iter().all(|c| c.is_empty()));

    let err = board.store().load().await.expect_err("load keeps failing");
    assert!(matches!(err, StoreError::Fetch { .. }));
    assert!(err.gateway_error().is_some());
}

#[tokio::test]
async fn create_fills_status_and_priority_defaults() {
    let store = loaded_store(vec![]).await;

    let created = store.create(TaskCreate::new("X")).await.expect("create");
    assert_eq!(created.status, TaskStatus::New);
    assert_eq!(created.priority, TaskPriority::Medium);
    assert_eq!(store.tasks(), vec![created.clone()]);

    assert_eq!(
        store.gateway().mutating_calls(),
        vec![Call::Create(TaskCreate {
            title: "X".to_string(),
            status: Some(TaskStatus::New),
            priority: Some(TaskPriority::Medium),
            ..TaskCreate::default()
        })]
    );
}

#[tokio::test]
async fn create_with_blank_title_never_reaches_the_backend() {
    let store = loaded_store(vec![]).await;
    let err = store.create(TaskCreate::new("  ")).await.expect_err("blank title");
    assert!(matches!(err, StoreError::EmptyTitle));
    assert!(store.gateway().mutating_calls().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn status_update_changes_only_the_status_field() {
    let original = task(3, TaskStatus::New, TaskPriority::Low);
    let store = loaded_store(vec![original.clone(), task(4, TaskStatus::New, TaskPriority::High)]).await;

    store
        .update_status(3, TaskStatus::InProgress)
        .await
        .expect("update status");

    let after = store.get(3).expect("task 3 still present");
    assert_eq!(after.status, TaskStatus::InProgress);
    assert_eq!(
        Task {
            status: original.status,
            ..after
        },
        original,
        "every other field is untouched, including updated_on"
    );
    assert_eq!(store.get(4).expect("task 4").status, TaskStatus::New);
}

#[tokio::test]
async fn full_update_takes_the_server_representation() {
    let store = loaded_store(vec![task(8, TaskStatus::Scheduled, TaskPriority::Medium)]).await;

    let patch = TaskPatch {
        title: Some("  Renamed  ".to_string()),
        description: Some(None),
        ..TaskPatch::default()
    };
    let updated = store.update(8, patch).await.expect("update");

    let local = store.get(8).expect("task 8");
    assert_eq!(local, updated);
    assert_eq!(local.title, "Renamed");
    assert_eq!(local.description, None);
    assert_eq!(local.updated_on, base_time() + Duration::minutes(1));
}

#[tokio::test]
async fn remove_drops_exactly_one_task() {
    let store = loaded_store(vec![
        task(1, TaskStatus::New, TaskPriority::Low),
        task(2, TaskStatus::Completed, TaskPriority::Low),
        task(3, TaskStatus::New, TaskPriority::Low),
    ])
    .await;

    store.remove(2).await.expect("remove");
    assert_eq!(store.len(), 2);
    assert!(!store.contains(2));
}

#[tokio::test]
async fn failed_mutations_leave_the_collection_untouched() {
    let store = loaded_store(vec![
        task(1, TaskStatus::New, TaskPriority::High),
        task(2, TaskStatus::Scheduled, TaskPriority::Low),
    ])
    .await;
    let before = store.tasks();
    store.gateway().set_failing(true);

    let err = store.create(TaskCreate::new("never")).await.expect_err("create fails");
    assert!(matches!(err, StoreError::Create { .. }));
    assert_eq!(store.tasks(), before);

    let err = store
        .update_status(1, TaskStatus::Completed)
        .await
        .expect_err("status update fails");
    assert!(matches!(err, StoreError::Update { id: 1, .. }));
    assert_eq!(store.tasks(), before);

    let patch = TaskPatch {
        title: Some("never".to_string()),
        ..TaskPatch::default()
    };
    let err = store.update(2, patch).await.expect_err("update fails");
    assert!(matches!(err, StoreError::Update { id: 2, .. }));
    assert_eq!(store.tasks(), before);

    let err = store.remove(1).await.expect_err("remove fails");
    assert!(matches!(err, StoreError::Delete { id: 1, .. }));
    assert_eq!(store.tasks(), before);
}

#[tokio::test]
async fn dragging_to_another_column_moves_the_task() {
    let mut board = ready_board(vec![task(5, TaskStatus::New, TaskPriority::Medium)]).await;

    board.begin_drag(5).expect("begin drag");
    board.drag_over(Some(TaskStatus::Scheduled));
    board.drag_over(Some(TaskStatus::Completed));
    assert_eq!(
        board.drag().session().expect("active drag").snapshot().status,
        TaskStatus::New
    );

    let outcome = board.drop_drag().await;
    assert_eq!(
        outcome,
        DropOutcome::Moved {
            id: 5,
            status: TaskStatus::Completed
        }
    );
    assert_eq!(
        board.store().gateway().mutating_calls(),
        vec![Call::UpdateStatus(5, TaskStatus::Completed)]
    );
    assert_eq!(board.task(5).expect("task 5").status, TaskStatus::Completed);
    assert!(!board.drag().is_dragging());

    let columns = board.columns();
    assert!(columns[0].is_empty());
    assert_eq!(columns[3].tasks[0].id, 5);
}

#[tokio::test]
async fn dropping_on_the_same_column_makes_no_call() {
    let mut board = ready_board(vec![task(2, TaskStatus::InProgress, TaskPriority::High)]).await;

    board.begin_drag(2).expect("begin drag");
    board.drag_over(Some(TaskStatus::InProgress));
    assert_eq!(board.drop_drag().await, DropOutcome::NoChange);

    board.begin_drag(2).expect("begin second drag");
    board.drag_over(Some(TaskStatus::Completed));
    board.cancel_drag();
    assert_eq!(board.drop_drag().await, DropOutcome::NoChange);

    assert!(board.store().gateway().mutating_calls().is_empty());
}

#[tokio::test]
async fn rejected_drop_snaps_back() {
    let mut board = ready_board(vec![task(7, TaskStatus::New, TaskPriority::Medium)]).await;
    let before = board.store().tasks();
    board.store().gateway().set_failing(true);

    board.begin_drag(7).expect("begin drag");
    board.drag_over(Some(TaskStatus::Completed));
    assert_eq!(
        board.drop_drag().await,
        DropOutcome::Rejected {
            id: 7,
            status: TaskStatus::Completed
        }
    );
    assert_eq!(board.store().tasks(), before);
    assert!(!board.drag().is_dragging());
}

#[tokio::test]
async fn dragging_an_unknown_task_is_refused() {
    let mut board = ready_board(vec![]).await;
    assert!(matches!(board.begin_drag(42), Err(BoardError::UnknownTask(42))));
    assert!(!board.drag().is_dragging());
}

#[tokio::test]
async fn editor_stays_open_until_a_submit_succeeds() {
    let mut board = ready_board(vec![]).await;

    let session = board.open_create(Some(TaskStatus::Scheduled));
    session.set_title("  ");
    let err = board.submit_editor().await.expect_err("blank title");
    assert!(matches!(err, BoardError::Editor(EditorError::EmptyTitle)));
    assert!(board.editor().is_some());
    assert!(board.store().gateway().mutating_calls().is_empty());

    board.editor_mut().expect("editor open").set_title("Quarterly plan");
    board
        .editor_mut()
        .expect("editor open")
        .set_due_date("2026-03-01T10:00:00Z");
    board.store().gateway().set_failing(true);
    let err = board.submit_editor().await.expect_err("backend down");
    assert!(matches!(
        err,
        BoardError::Editor(EditorError::Store(StoreError::Create { .. }))
    ));
    assert!(board.editor().is_some());
    assert!(board.store().is_empty());

    board.store().gateway().set_failing(false);
    let created = board.submit_editor().await.expect("submit succeeds");
    assert!(board.editor().is_none());
    assert_eq!(created.status, TaskStatus::Scheduled);
    assert_eq!(created.title, "Quarterly plan");
    assert_eq!(
        created.due_date,
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).single()
    );
    assert_eq!(board.store().tasks(), vec![created]);
}

#[tokio::test]
async fn closing_the_editor_discards_the_draft() {
    let mut board = ready_board(vec![task(1, TaskStatus::New, TaskPriority::Low)]).await;

    board.open_edit(1).expect("open edit").set_title("Never saved");
    board.close_editor();
    assert!(board.editor().is_none());
    assert!(matches!(board.submit_editor().await, Err(BoardError::NoEditor)));
    assert_eq!(board.task(1).expect("task 1").title, "task 1");
    assert!(board.store().gateway().mutating_calls().is_empty());
}

#[tokio::test]
async fn untouched_edit_form_makes_no_call() {
    let mut seeded = task(6, TaskStatus::Scheduled, TaskPriority::High);
    seeded.description = Some("  keep my spacing\n".to_string());
    seeded.due_date = Some(base_time() + Duration::milliseconds(250));
    let mut board = ready_board(vec![seeded.clone()]).await;

    board.open_edit(6).expect("open edit");
    let submitted = board.submit_editor().await.expect("submit unchanged");
    assert!(board.editor().is_none());
    assert_eq!(submitted, seeded);
    assert_eq!(board.task(6).expect("task 6"), seeded);
    assert!(board.store().gateway().mutating_calls().is_empty());
}

#[tokio::test]
async fn add_command_loads_before_creating() {
    let mut board = Board::new(
        TaskStore::new(MemoryGateway::with_tasks(vec![task(
            1,
            TaskStatus::New,
            TaskPriority::Low,
        )])),
        SortOrder::Priority,
    );

    dispatch(
        &mut board,
        &Renderer::plain(),
        Command::Add {
            title: "Follow up".to_string(),
            description: None,
            status: Some(TaskStatus::InProgress),
            priority: None,
            due: None,
        },
    )
    .await
    .expect("add command");

    let calls = board.store().gateway().calls();
    assert_eq!(calls.first(), Some(&Call::List));
    assert!(matches!(calls.get(1), Some(Call::Create(payload)) if payload.title == "Follow up"));
    assert_eq!(board.load_state(), &LoadState::Ready);
    assert_eq!(board.store().len(), 2);
    assert_eq!(board.columns()[2].tasks[0].title, "Follow up");
}

#[tokio::test]
async fn edit_form_updates_the_local_task() {
    let mut board = ready_board(vec![task(4, TaskStatus::New, TaskPriority::Low)]).await;

    let session = board.open_edit(4).expect("open edit");
    assert_eq!(session.draft().title, "task 4");
    session.set_title("Sharpened");
    session.set_priority(TaskPriority::High);
    session.set_status(TaskStatus::InProgress).expect("edit status is free");

    let updated = board.submit_editor().await.expect("submit edit");
    assert!(board.editor().is_none());
    assert_eq!(updated.title, "Sharpened");
    assert_eq!(board.task(4).expect("task 4"), updated);
    assert_eq!(board.columns()[2].tasks[0].priority, TaskPriority::High);

    assert!(matches!(board.open_edit(99), Err(BoardError::UnknownTask(99))));
    assert!(matches!(board.submit_editor().await, Err(BoardError::NoEditor)));
}

#[tokio::test]
async fn overlapping_status_updates_resolve_last_wins() {
    let store = loaded_store(vec![task(1, TaskStatus::New, TaskPriority::Medium)]).await;
    let (release_scheduled, scheduled_gate) = oneshot::channel();
    let (release_completed, completed_gate) = oneshot::channel();
    store.gateway().hold_status(TaskStatus::Scheduled, scheduled_gate);
    store.gateway().hold_status(TaskStatus::Completed, completed_gate);

    let first = store.update_status(1, TaskStatus::Scheduled);
    let second = store.update_status(1, TaskStatus::Completed);
    let driver = async {
        release_completed.send(()).expect("release completed");
        while store.get(1).map(|t| t.status) != Some(TaskStatus::Completed) {
            tokio::task::yield_now().await;
        }
        release_scheduled.send(()).expect("release scheduled");
    };

    let (first, second, ()) = tokio::join!(first, second, driver);
    first.expect("first update");
    second.expect("second update");

    // Issued first, resolved last: its status is what stays on the board.
    assert_eq!(store.get(1).expect("task 1").status, TaskStatus::Scheduled);
}

#[tokio::test]
async fn status_update_resolving_after_delete_does_not_resurrect() {
    let store = loaded_store(vec![task(1, TaskStatus::New, TaskPriority::Medium)]).await;
    let (release_status, status_gate) = oneshot::channel();
    store.gateway().hold_status(TaskStatus::Completed, status_gate);

    let status = store.update_status(1, TaskStatus::Completed);
    let delete = async {
        tokio::task::yield_now().await;
        let result = store.remove(1).await;
        release_status.send(()).expect("release status");
        result
    };

    let (status, delete) = tokio::join!(status, delete);
    status.expect("status update");
    delete.expect("delete");
    assert!(store.is_empty());
}

#[tokio::test]
async fn move_command_drags_through_the_board() {
    let mut board = Board::new(
        TaskStore::new(MemoryGateway::with_tasks(vec![task(
            3,
            TaskStatus::New,
            TaskPriority::Medium,
        )])),
        SortOrder::Priority,
    );

    dispatch(
        &mut board,
        &Renderer::plain(),
        Command::Move {
            id: 3,
            status: TaskStatus::Scheduled,
        },
    )
    .await
    .expect("move command");

    assert_eq!(
        board.store().gateway().mutating_calls(),
        vec![Call::UpdateStatus(3, TaskStatus::Scheduled)]
    );
    assert_eq!(board.task(3).expect("task 3").status, TaskStatus::Scheduled);
    assert!(!board.drag().is_dragging());
}
