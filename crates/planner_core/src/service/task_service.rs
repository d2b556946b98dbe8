//! Task use-case service.
//!
//! # Responsibility
//! - Create tasks from form input, materializing recurrence into records.
//! - Gate completion marking through the window calculator and state machine.
//! - Handle join/leave on global tasks and owner-only deletion.
//!
//! # Invariants
//! - Identity is always an explicit parameter; reads without one return
//!   empty results, mutations without one fail with `AuthenticationRequired`.
//! - Every successful mutation is published to the attached feed.
//! - Global tasks are only created by admins.

use crate::config::ScheduleConfig;
use crate::feed::{sort_for_display, TaskFeed};
use crate::identity::CurrentUser;
use crate::model::completion::{CompletionAction, CompletionError, CompletionState};
use crate::model::task::{
    Task, TaskId, TaskValidationError, TaskVisibility, DEFAULT_TASK_CATEGORY, DEFAULT_TASK_COLOR,
};
use crate::repo::task_repo::{RepoError, TaskFilter, TaskRepository};
use crate::schedule::codec::{parse_date, parse_task_time, FormatError};
use crate::schedule::recurrence::{expand_dates, RecurrenceError, RecurrenceMode};
use crate::schedule::window::{can_mark_completed, is_active, MarkVerdict};
use chrono::NaiveDateTime;
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for task use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// A mutation was attempted without a signed-in user.
    AuthenticationRequired,
    /// The caller lacks the right to perform this action.
    Forbidden(&'static str),
    TaskNotFound(TaskId),
    /// Form input violates a task invariant.
    Validation(TaskValidationError),
    Format(FormatError),
    Recurrence(RecurrenceError),
    Completion(CompletionError),
    /// Caller tried to mark a global task it has not joined.
    NotParticipant(TaskId),
    /// Join/leave on a personal task.
    NotGlobal(TaskId),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationRequired => write!(f, "authentication required"),
            Self::Forbidden(action) => write!(f, "not allowed to {action}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Format(err) => write!(f, "{err}"),
            Self::Recurrence(err) => write!(f, "{err}"),
            Self::Completion(err) => write!(f, "{err}"),
            Self::NotParticipant(id) => write!(f, "not a participant of task {id}"),
            Self::NotGlobal(id) => write!(f, "task {id} is not a global task"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Format(err) => Some(err),
            Self::Recurrence(err) => Some(err),
            Self::Completion(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TaskValidationError> for ServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<FormatError> for ServiceError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

impl From<RecurrenceError> for ServiceError {
    fn from(value: RecurrenceError) -> Self {
        Self::Recurrence(value)
    }
}

impl From<CompletionError> for ServiceError {
    fn from(value: CompletionError) -> Self {
        Self::Completion(value)
    }
}

/// Form input for creating one task definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskRequest {
    pub name: String,
    pub description: String,
    /// `DD.MM.YYYY` start day.
    pub date: String,
    /// Empty, `HH:MM`, or `HH:MM-HH:MM`.
    pub time: String,
    pub recurrence: RecurrenceMode,
    pub color: Option<String>,
    pub category: Option<String>,
    pub visibility: TaskVisibility,
}

impl NewTaskRequest {
    /// Personal one-off task on `date`.
    pub fn personal(name: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            date: date.into(),
            time: String::new(),
            recurrence: RecurrenceMode::Once,
            color: None,
            category: None,
            visibility: TaskVisibility::Personal,
        }
    }
}

/// Activity and marking status of a task at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    pub is_active: bool,
    pub verdict: MarkVerdict,
}

/// Completion counts over a user's agenda.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionSummary {
    pub completed: usize,
    pub uncompleted: usize,
    pub unmarked: usize,
}

impl CompletionSummary {
    pub fn total(&self) -> usize {
        self.completed + self.uncompleted + self.unmarked
    }

    fn record(&mut self, state: CompletionState) {
        match state {
            CompletionState::Completed => self.completed += 1,
            CompletionState::Uncompleted => self.uncompleted += 1,
            CompletionState::Unmarked => self.unmarked += 1,
        }
    }
}

/// Use-case service for task operations.
pub struct TaskService<R: TaskRepository> {
    repo: R,
    config: ScheduleConfig,
    feed: Option<Arc<TaskFeed>>,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            config: ScheduleConfig::default(),
            feed: None,
        }
    }

    pub fn with_config(mut self, config: ScheduleConfig) -> Self {
        self.config = config;
        self
    }

    /// Publishes every successful mutation to `feed`.
    pub fn with_feed(mut self, feed: Arc<TaskFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Creates one task per recurrence date, all or nothing. Returns IDs in
    /// the order of the expansion.
    pub fn create_tasks(
        &self,
        user: Option<&CurrentUser>,
        request: &NewTaskRequest,
    ) -> ServiceResult<Vec<TaskId>> {
        let user = require_user(user)?;
        if request.visibility == TaskVisibility::Global && !user.is_admin {
            return Err(ServiceError::Forbidden("create global tasks"));
        }

        let start = parse_date(&request.date)?;
        let time = parse_task_time(&request.time)?;
        let dates = expand_dates(start, &request.recurrence)?;

        let mut template = Task::new(user.id.clone(), request.name.trim(), start);
        template.description = request.description.trim().to_string();
        template.time = time;
        template.color = request
            .color
            .clone()
            .unwrap_or_else(|| DEFAULT_TASK_COLOR.to_string());
        template.category = request
            .category
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_TASK_CATEGORY)
            .to_string();
        template.visibility = request.visibility;
        template.validate()?;

        let tasks: Vec<Task> = dates
            .into_iter()
            .map(|date| {
                let mut task = template.clone();
                task.id = Uuid::new_v4();
                task.date = date;
                task
            })
            .collect();
        let ids = self.repo.create_tasks(&tasks)?;

        info!(
            "event=task_create module=service status=ok count={} recurrence={} visibility={}",
            ids.len(),
            request.recurrence.as_str(),
            if template.is_global() { "global" } else { "personal" }
        );
        self.publish();
        Ok(ids)
    }

    /// Returns a task visible to `user` (owned or global).
    pub fn get_task(&self, user: Option<&CurrentUser>, id: TaskId) -> ServiceResult<Option<Task>> {
        let Some(user) = user else {
            return Ok(None);
        };
        Ok(self
            .repo
            .get_task(id)?
            .filter(|task| task.is_global() || task.owner == user.id))
    }

    /// Tasks on `date` the user owns or has joined, in display order.
    pub fn agenda_for_date(&self, user: Option<&CurrentUser>, date: &str) -> ServiceResult<Vec<Task>> {
        let Some(user) = user else {
            return Ok(Vec::new());
        };
        let date = parse_date(date)?;
        self.merged(
            TaskFilter::owned_by(user.id.clone()).on(date),
            TaskFilter::joined_by(user.id.clone()).on(date),
        )
    }

    fn merged(&self, owned: TaskFilter, joined: TaskFilter) -> ServiceResult<Vec<Task>> {
        let mut seen = BTreeSet::new();
        let mut tasks = Vec::new();
        for task in self
            .repo
            .list_tasks(&owned)?
            .into_iter()
            .chain(self.repo.list_tasks(&joined)?)
        {
            if seen.insert(task.id) {
                tasks.push(task);
            }
        }
        sort_for_display(&mut tasks);
        Ok(tasks)
    }

    /// Global tasks, optionally restricted to one day.
    pub fn list_global_tasks(
        &self,
        user: Option<&CurrentUser>,
        date: Option<&str>,
    ) -> ServiceResult<Vec<Task>> {
        if user.is_none() {
            return Ok(Vec::new());
        }
        let mut filter = TaskFilter::global();
        if let Some(date) = date {
            filter = filter.on(parse_date(date)?);
        }
        Ok(self.repo.list_tasks(&filter)?)
    }

    /// Activity and marking status of a task at `now`.
    pub fn window_status(&self, task: &Task, now: NaiveDateTime) -> WindowStatus {
        let schedule = task.schedule();
        WindowStatus {
            is_active: is_active(&schedule, now, &self.config),
            verdict: can_mark_completed(&schedule, now, &self.config),
        }
    }

    /// Applies a completion action for `user` if the window allows it.
    ///
    /// Personal tasks: owner only. Global tasks: the caller's participant
    /// state changes; other participants are untouched.
    pub fn mark_completion(
        &self,
        user: Option<&CurrentUser>,
        id: TaskId,
        action: CompletionAction,
        now: NaiveDateTime,
    ) -> ServiceResult<CompletionState> {
        let user = require_user(user)?;
        let mut task = self.load(id)?;

        let current = match task.visibility {
            TaskVisibility::Personal if task.owner != user.id => {
                return Err(ServiceError::Forbidden("mark another user's task"));
            }
            TaskVisibility::Personal => task.completion,
            TaskVisibility::Global => task
                .participants
                .get(&user.id)
                .copied()
                .ok_or(ServiceError::NotParticipant(id))?,
        };

        let verdict = can_mark_completed(&task.schedule(), now, &self.config);
        let next = current.transition(action, verdict).map_err(|err| {
            info!(
                "event=task_mark module=service status=rejected task_id={id} reason={}",
                verdict.reason.map_or("unknown", |reason| reason.as_str())
            );
            err
        })?;

        match task.visibility {
            TaskVisibility::Personal => task.completion = next,
            TaskVisibility::Global => {
                task.participants.insert(user.id.clone(), next);
            }
        }
        self.repo.update_task(&task)?;

        info!(
            "event=task_mark module=service status=ok task_id={id} from={} to={}",
            current.as_str(),
            next.as_str()
        );
        self.publish();
        Ok(next)
    }

    /// Joins a global task. Returns `false` if already joined.
    pub fn join_global_task(&self, user: Option<&CurrentUser>, id: TaskId) -> ServiceResult<bool> {
        let user = require_user(user)?;
        let mut task = self.load(id)?;
        if !task.is_global() {
            return Err(ServiceError::NotGlobal(id));
        }
        if !task.join(user.id.clone()) {
            return Ok(false);
        }
        self.repo.update_task(&task)?;
        info!("event=task_join module=service status=ok task_id={id}");
        self.publish();
        Ok(true)
    }

    /// Leaves a global task, dropping the caller's completion state. Returns
    /// `false` if the caller had not joined.
    pub fn leave_global_task(&self, user: Option<&CurrentUser>, id: TaskId) -> ServiceResult<bool> {
        let user = require_user(user)?;
        let mut task = self.load(id)?;
        if !task.is_global() {
            return Err(ServiceError::NotGlobal(id));
        }
        if !task.leave(&user.id) {
            return Ok(false);
        }
        self.repo.update_task(&task)?;
        info!("event=task_leave module=service status=ok task_id={id}");
        self.publish();
        Ok(true)
    }

    /// Deletes a task. Only its owner may delete it.
    pub fn delete_task(&self, user: Option<&CurrentUser>, id: TaskId) -> ServiceResult<()> {
        let user = require_user(user)?;
        let task = self.load(id)?;
        if task.owner != user.id {
            return Err(ServiceError::Forbidden("delete another user's task"));
        }
        self.repo.delete_task(id)?;
        info!("event=task_delete module=service status=ok task_id={id}");
        self.publish();
        Ok(())
    }

    /// Completion counts over everything the user owns or has joined.
    pub fn completion_summary(&self, user: Option<&CurrentUser>) -> ServiceResult<CompletionSummary> {
        let Some(user) = user else {
            return Ok(CompletionSummary::default());
        };
        let tasks = self.merged(
            TaskFilter {
                owner: Some(user.id.clone()),
                visibility: Some(TaskVisibility::Personal),
                ..TaskFilter::default()
            },
            TaskFilter::joined_by(user.id.clone()),
        )?;

        let mut summary = CompletionSummary::default();
        for state in tasks.iter().filter_map(|task| task.completion_for(&user.id)) {
            summary.record(state);
        }
        Ok(summary)
    }

    fn load(&self, id: TaskId) -> ServiceResult<Task> {
        self.repo.get_task(id)?.ok_or(ServiceError::TaskNotFound(id))
    }

    fn publish(&self) {
        if let Some(feed) = &self.feed {
            feed.publish(&self.repo);
        }
    }
}

fn require_user(user: Option<&CurrentUser>) -> ServiceResult<&CurrentUser> {
    user.ok_or_else(|| {
        warn!("event=auth_check module=service status=error error_code=auth_required");
        ServiceError::AuthenticationRequired
    })
}
