//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level planner functions to Dart via FRB.
//! - Translate core errors into response envelopes the UI can render.
//! - Keep the local-notification plan in sync with task mutations.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Identity is passed explicitly on every call; `None` means signed out.
//! - Dates cross the boundary as `DD.MM.YYYY`, times as `HH:MM`.

use chrono::{Local, NaiveDateTime};
use log::warn;
use planner_core::db::open_db;
use planner_core::schedule::codec::format_task_time;
use planner_core::{
    core_version as core_version_inner, expand_recurrence, format_date,
    init_logging as init_logging_inner, ping as ping_inner, AuthProvider, CompletionAction,
    CompletionMark, CurrentUser, InMemoryNotificationScheduler, NewTaskRequest,
    NotificationRequest, NotificationScheduler, PlannerConfig, RecurrenceMode, ReminderService,
    ServiceResult, SqliteTaskRepository, StaticAuthProvider, Task, TaskId, TaskService,
    TaskVisibility, UserId,
};
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const DB_FILE_NAME: &str = "planner.sqlite3";
const DB_PATH_ENV: &str = "PLANNER_DB_PATH";
const CONFIG_JSON_ENV: &str = "PLANNER_CONFIG_JSON";

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static CONFIG: OnceLock<Result<PlannerConfig, String>> = OnceLock::new();
static REMINDERS: OnceLock<Result<ReminderService<InMemoryNotificationScheduler>, String>> =
    OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Signed-in caller as reported by the host's auth SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    /// Admin claim; required to publish global tasks.
    pub is_admin: bool,
}

/// Task projection for list and detail screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub task_id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    /// `DD.MM.YYYY`.
    pub date: String,
    /// Empty, `HH:MM`, or `HH:MM-HH:MM`.
    pub time: String,
    pub color: String,
    pub category: String,
    /// `personal|global`.
    pub visibility: String,
    /// Caller's state: `unmarked|completed|uncompleted`, or `None` if the
    /// caller has not joined this global task.
    pub completion: Option<String>,
    pub participant_count: u32,
    pub is_active: bool,
    pub can_mark: bool,
    /// `too_early|expired` when `can_mark` is false.
    pub block_reason: Option<String>,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub ok: bool,
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Affected task IDs; one per materialized date on create.
    pub task_ids: Vec<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, task_ids: Vec<String>) -> Self {
        Self {
            ok: true,
            task_ids,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_ids: Vec::new(),
            message: message.into(),
        }
    }
}

/// Completion marking response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub ok: bool,
    /// New caller state on success.
    pub state: Option<String>,
    pub message: String,
}

/// Window status of one task at the current device time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStatusResponse {
    pub ok: bool,
    pub is_active: bool,
    pub can_mark: bool,
    pub block_reason: Option<String>,
    pub message: String,
}

/// Dates a recurrence would produce, without writing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrencePreviewResponse {
    pub ok: bool,
    pub dates: Vec<String>,
    pub message: String,
}

/// Completion counts for the statistics screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSummaryResponse {
    pub ok: bool,
    pub completed: u32,
    pub uncompleted: u32,
    pub unmarked: u32,
    pub message: String,
}

/// Pending local notification for the host scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationItem {
    pub task_id: String,
    /// `reminder|completion_prompt`.
    pub category: String,
    pub title: String,
    pub body: String,
    /// Device-local trigger as `DD.MM.YYYY HH:MM`.
    pub trigger_at: String,
}

/// Creates one task per recurrence date.
///
/// Input semantics:
/// - `recurrence`: `once|weekly|custom`; `custom_dates` is used only for
///   `custom`.
/// - `global`: publish to every user; requires `user.is_admin`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Returns created task IDs in recurrence order on success.
#[allow(clippy::too_many_arguments)]
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_create(
    user: Option<UserContext>,
    name: String,
    description: String,
    date: String,
    time: String,
    recurrence: String,
    custom_dates: Vec<String>,
    color: Option<String>,
    category: Option<String>,
    global: bool,
) -> TaskActionResponse {
    let mode = match parse_recurrence(&recurrence, custom_dates) {
        Ok(mode) => mode,
        Err(err) => return TaskActionResponse::failure(format!("tasks_create failed: {err}")),
    };
    let request = NewTaskRequest {
        name,
        description,
        date: date.trim().to_string(),
        time: time.trim().to_string(),
        recurrence: mode,
        color: color.filter(|value| !value.trim().is_empty()),
        category: category.filter(|value| !value.trim().is_empty()),
        visibility: if global {
            TaskVisibility::Global
        } else {
            TaskVisibility::Personal
        },
    };

    let caller = match to_current_user(user) {
        Ok(caller) => caller,
        Err(err) => return TaskActionResponse::failure(format!("tasks_create failed: {err}")),
    };
    let result = with_task_service(|service| {
        let ids = service.create_tasks(caller.as_ref(), &request)?;
        let now = now();
        for id in &ids {
            resync_task(service, caller.as_ref(), *id, now);
        }
        Ok(ids)
    });

    match result {
        Ok(ids) => TaskActionResponse::success(
            format!("Created {} task(s).", ids.len()),
            ids.iter().map(Uuid::to_string).collect(),
        ),
        Err(err) => TaskActionResponse::failure(format!("tasks_create failed: {err}")),
    }
}

/// Lists tasks on `date` the caller owns or has joined, in display order.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Signed-out callers get an empty list with `ok = true`.
#[flutter_rust_bridge::frb(sync)]
pub fn tasks_for_date(user: Option<UserContext>, date: String) -> TaskListResponse {
    list_response("tasks_for_date", user, |service, caller| {
        service.agenda_for_date(caller, date.trim())
    })
}

/// Lists global tasks, optionally restricted to one day.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Signed-out callers get an empty list with `ok = true`.
#[flutter_rust_bridge::frb(sync)]
pub fn global_tasks(user: Option<UserContext>, date: Option<String>) -> TaskListResponse {
    list_response("global_tasks", user, |service, caller| {
        service.list_global_tasks(caller, date.as_deref().map(str::trim))
    })
}

/// Applies a completion action for the caller.
///
/// Input semantics:
/// - `action`: `toggle|completed|uncompleted`.
///
/// # FFI contract
/// - Sync call, DB-backed execution, evaluated at the current device time.
/// - Rejections (`too_early`, `expired`, not a participant) return `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn task_mark(user: Option<UserContext>, task_id: String, action: String) -> CompletionResponse {
    let failure = |message: String| CompletionResponse {
        ok: false,
        state: None,
        message: format!("task_mark failed: {message}"),
    };
    let action = match parse_action(&action) {
        Ok(action) => action,
        Err(err) => return failure(err),
    };
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return failure(err),
    };
    let caller = match to_current_user(user) {
        Ok(caller) => caller,
        Err(err) => return failure(err),
    };

    let now = now();
    let result = with_task_service(|service| {
        let state = service.mark_completion(caller.as_ref(), id, action, now)?;
        resync_task(service, caller.as_ref(), id, now);
        Ok(state)
    });
    match result {
        Ok(state) => CompletionResponse {
            ok: true,
            state: Some(state.as_str().to_string()),
            message: format!("Task marked {}.", state.as_str()),
        },
        Err(err) => failure(err),
    }
}

/// Joins a global task and schedules the caller's reminders.
#[flutter_rust_bridge::frb(sync)]
pub fn task_join(user: Option<UserContext>, task_id: String) -> TaskActionResponse {
    membership_action("task_join", user, task_id, |service, caller, id| {
        let joined = service.join_global_task(caller, id)?;
        resync_task(service, caller, id, now());
        Ok(if joined { "Joined." } else { "Already joined." })
    })
}

/// Leaves a global task, dropping the caller's completion state.
#[flutter_rust_bridge::frb(sync)]
pub fn task_leave(user: Option<UserContext>, task_id: String) -> TaskActionResponse {
    membership_action("task_leave", user, task_id, |service, caller, id| {
        let left = service.leave_global_task(caller, id)?;
        cancel_reminders(id);
        Ok(if left { "Left." } else { "Not joined." })
    })
}

/// Deletes a task owned by the caller and cancels its notifications.
#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(user: Option<UserContext>, task_id: String) -> TaskActionResponse {
    membership_action("task_delete", user, task_id, |service, caller, id| {
        service.delete_task(caller, id)?;
        cancel_reminders(id);
        Ok("Task deleted.")
    })
}

/// Reports whether a task is active and markable right now.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Unknown or invisible tasks return `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn task_window_status(user: Option<UserContext>, task_id: String) -> WindowStatusResponse {
    let failure = |message: String| WindowStatusResponse {
        ok: false,
        is_active: false,
        can_mark: false,
        block_reason: None,
        message: format!("task_window_status failed: {message}"),
    };
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(err) => return failure(err),
    };
    let caller = match to_current_user(user) {
        Ok(caller) => caller,
        Err(err) => return failure(err),
    };

    let result = with_task_service(|service| {
        let task = service.get_task(caller.as_ref(), id)?;
        Ok(task.map(|task| service.window_status(&task, now())))
    });
    match result {
        Ok(Some(status)) => WindowStatusResponse {
            ok: true,
            is_active: status.is_active,
            can_mark: status.verdict.can_mark,
            block_reason: status.verdict.reason.map(|reason| reason.as_str().to_string()),
            message: String::new(),
        },
        Ok(None) => failure(format!("task not found: {id}")),
        Err(err) => failure(err),
    }
}

/// Expands a recurrence without creating tasks.
///
/// # FFI contract
/// - Sync call, pure computation.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn recurrence_preview(
    date: String,
    recurrence: String,
    custom_dates: Vec<String>,
) -> RecurrencePreviewResponse {
    let result = parse_recurrence(&recurrence, custom_dates)
        .and_then(|mode| expand_recurrence(date.trim(), &mode).map_err(|err| err.to_string()));
    match result {
        Ok(dates) => RecurrencePreviewResponse {
            ok: true,
            message: format!("{} date(s).", dates.len()),
            dates,
        },
        Err(err) => RecurrencePreviewResponse {
            ok: false,
            dates: Vec::new(),
            message: format!("recurrence_preview failed: {err}"),
        },
    }
}

/// Completion counts over everything the caller owns or has joined.
#[flutter_rust_bridge::frb(sync)]
pub fn completion_summary(user: Option<UserContext>) -> CompletionSummaryResponse {
    let result = to_current_user(user).and_then(|caller| {
        with_task_service(|service| service.completion_summary(caller.as_ref()))
    });
    match result {
        Ok(summary) => CompletionSummaryResponse {
            ok: true,
            completed: to_u32(summary.completed),
            uncompleted: to_u32(summary.uncompleted),
            unmarked: to_u32(summary.unmarked),
            message: format!("{} task(s).", summary.total()),
        },
        Err(err) => CompletionSummaryResponse {
            ok: false,
            completed: 0,
            uncompleted: 0,
            unmarked: 0,
            message: format!("completion_summary failed: {err}"),
        },
    }
}

/// Notifications the host should have scheduled with its local SDK.
///
/// # FFI contract
/// - Sync call, in-memory read.
/// - Returns an empty list if the reminder planner could not be configured.
#[flutter_rust_bridge::frb(sync)]
pub fn pending_notifications() -> Vec<NotificationItem> {
    let Ok(reminders) = resolve_reminders() else {
        return Vec::new();
    };
    match reminders.scheduler().pending() {
        Ok(pending) => pending.into_iter().map(to_notification_item).collect(),
        Err(err) => {
            warn!("event=notification_list module=ffi status=error error={err}");
            Vec::new()
        }
    }
}

fn list_response(
    operation: &str,
    user: Option<UserContext>,
    f: impl FnOnce(
        &TaskService<SqliteTaskRepository<'_>>,
        Option<&CurrentUser>,
    ) -> ServiceResult<Vec<Task>>,
) -> TaskListResponse {
    let result = to_current_user(user).and_then(|caller| {
        with_task_service(|service| {
            let tasks = f(service, caller.as_ref())?;
            let now = now();
            Ok(tasks
                .iter()
                .map(|task| to_task_item(service, task, caller.as_ref(), now))
                .collect::<Vec<_>>())
        })
    });
    match result {
        Ok(items) => TaskListResponse {
            ok: true,
            message: if items.is_empty() {
                "No tasks.".to_string()
            } else {
                format!("Found {} task(s).", items.len())
            },
            items,
        },
        Err(err) => TaskListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("{operation} failed: {err}"),
        },
    }
}

fn membership_action(
    operation: &str,
    user: Option<UserContext>,
    task_id: String,
    f: impl FnOnce(
        &TaskService<SqliteTaskRepository<'_>>,
        Option<&CurrentUser>,
        TaskId,
    ) -> ServiceResult<&'static str>,
) -> TaskActionResponse {
    let result = parse_task_id(&task_id).and_then(|id| {
        let caller = to_current_user(user)?;
        with_task_service(|service| f(service, caller.as_ref(), id))
    });
    match result {
        Ok(message) => TaskActionResponse::success(message, vec![task_id.trim().to_string()]),
        Err(err) => TaskActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn with_task_service<T>(
    f: impl FnOnce(&TaskService<SqliteTaskRepository<'_>>) -> ServiceResult<T>,
) -> Result<T, String> {
    let config = resolve_config()?;
    let db_path = resolve_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("planner DB open failed: {err}"))?;
    let service = TaskService::new(SqliteTaskRepository::new(&conn)).with_config(config.schedule);
    f(&service).map_err(|err| err.to_string())
}

/// Refreshes the caller's reminders for `id` after a committed mutation.
///
/// Failures are logged only; the mutation itself already succeeded.
/// Returns whether the task could be reloaded.
fn resync_task(
    service: &TaskService<SqliteTaskRepository<'_>>,
    caller: Option<&CurrentUser>,
    id: TaskId,
    now: NaiveDateTime,
) -> bool {
    let Some(caller) = caller else {
        return false;
    };
    match service.get_task(Some(caller), id) {
        Ok(Some(task)) => {
            sync_reminders(&caller.id, &task, now);
            true
        }
        Ok(None) => false,
        Err(err) => {
            warn!("event=reminder_sync module=ffi status=error task_id={id} error={err}");
            false
        }
    }
}

fn sync_reminders(user: &UserId, task: &Task, now: NaiveDateTime) {
    let Ok(reminders) = resolve_reminders() else {
        return;
    };
    if let Err(err) = reminders.sync_task(user, task, now) {
        warn!(
            "event=reminder_sync module=ffi status=error task_id={} error={err}",
            task.id
        );
    }
}

fn cancel_reminders(id: TaskId) {
    let Ok(reminders) = resolve_reminders() else {
        return;
    };
    if let Err(err) = reminders.cancel_task(id) {
        warn!("event=reminder_cancel module=ffi status=error task_id={id} error={err}");
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn resolve_config() -> Result<&'static PlannerConfig, String> {
    CONFIG
        .get_or_init(|| match std::env::var(CONFIG_JSON_ENV) {
            Ok(raw) if !raw.trim().is_empty() => {
                PlannerConfig::from_json_str(&raw).map_err(|err| {
                    warn!("event=config_load module=ffi status=error error={err}");
                    err.to_string()
                })
            }
            _ => Ok(PlannerConfig::default()),
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn resolve_reminders() -> Result<&'static ReminderService<InMemoryNotificationScheduler>, String> {
    REMINDERS
        .get_or_init(|| {
            let config = resolve_config()?;
            ReminderService::new(InMemoryNotificationScheduler::new(), config)
                .map_err(|err| err.to_string())
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn to_current_user(user: Option<UserContext>) -> Result<Option<CurrentUser>, String> {
    Ok(auth_provider(user)?.current_user())
}

/// Wraps the host-reported identity in the core auth contract.
fn auth_provider(user: Option<UserContext>) -> Result<StaticAuthProvider, String> {
    let Some(user) = user else {
        return Ok(StaticAuthProvider::signed_out());
    };
    let id = UserId::new(user.user_id).map_err(|err| err.to_string())?;
    Ok(StaticAuthProvider::signed_in(if user.is_admin {
        CurrentUser::admin(id)
    } else {
        CurrentUser::member(id)
    }))
}

fn parse_task_id(raw: &str) -> Result<TaskId, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid task id `{}`", raw.trim()))
}

fn parse_recurrence(raw: &str, custom_dates: Vec<String>) -> Result<RecurrenceMode, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "once" => Ok(RecurrenceMode::Once),
        "weekly" => Ok(RecurrenceMode::Weekly),
        "custom" => Ok(RecurrenceMode::Custom(
            custom_dates
                .into_iter()
                .map(|date| date.trim().to_string())
                .collect(),
        )),
        other => Err(format!(
            "unsupported recurrence `{other}`; expected once|weekly|custom"
        )),
    }
}

fn parse_action(raw: &str) -> Result<CompletionAction, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "toggle" => Ok(CompletionAction::Toggle),
        "completed" => Ok(CompletionAction::Set(CompletionMark::Completed)),
        "uncompleted" => Ok(CompletionAction::Set(CompletionMark::Uncompleted)),
        other => Err(format!(
            "unsupported action `{other}`; expected toggle|completed|uncompleted"
        )),
    }
}

fn to_task_item(
    service: &TaskService<SqliteTaskRepository<'_>>,
    task: &Task,
    caller: Option<&CurrentUser>,
    now: NaiveDateTime,
) -> TaskItem {
    let status = service.window_status(task, now);
    TaskItem {
        task_id: task.id.to_string(),
        owner_id: task.owner.to_string(),
        name: task.name.clone(),
        description: task.description.clone(),
        date: format_date(task.date),
        time: format_task_time(&task.time),
        color: task.color.clone(),
        category: task.category.clone(),
        visibility: match task.visibility {
            TaskVisibility::Personal => "personal",
            TaskVisibility::Global => "global",
        }
        .to_string(),
        completion: caller
            .and_then(|caller| task.completion_for(&caller.id))
            .map(|state| state.as_str().to_string()),
        participant_count: to_u32(task.participants.len()),
        is_active: status.is_active,
        can_mark: status.verdict.can_mark,
        block_reason: status
            .verdict
            .reason
            .map(|reason| reason.as_str().to_string()),
    }
}

fn to_notification_item(request: NotificationRequest) -> NotificationItem {
    NotificationItem {
        task_id: request.task_id.to_string(),
        category: request.category.as_str().to_string(),
        title: request.title,
        body: request.body,
        trigger_at: request.trigger_at.format("%d.%m.%Y %H:%M").to_string(),
    }
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
