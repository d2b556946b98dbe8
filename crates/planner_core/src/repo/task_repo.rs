//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and equality-filtered listing over task storage.
//! - Persist per-participant completion rows for global tasks.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - Read paths reject rows whose `date_key` and `date_ts` disagree.
//! - A task and its participant rows are written in one transaction.

use crate::db::DbError;
use crate::identity::UserId;
use crate::model::completion::CompletionState;
use crate::model::task::{day_timestamp_ms, Task, TaskId, TaskTime, TaskValidationError, TaskVisibility};
use crate::schedule::codec::{format_date, format_time, parse_date, parse_time_of_day};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    owner_id,
    name,
    description,
    date_key,
    date_ts,
    time_kind,
    time_from,
    time_to,
    color,
    category,
    visibility,
    completion
FROM tasks";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Equality filters for listing and live subscriptions.
///
/// Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub owner: Option<UserId>,
    pub date: Option<NaiveDate>,
    pub visibility: Option<TaskVisibility>,
    /// Only global tasks this user has joined.
    pub participant: Option<UserId>,
}

impl TaskFilter {
    pub fn owned_by(owner: UserId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn global() -> Self {
        Self {
            visibility: Some(TaskVisibility::Global),
            ..Self::default()
        }
    }

    pub fn joined_by(user: UserId) -> Self {
        Self {
            visibility: Some(TaskVisibility::Global),
            participant: Some(user),
            ..Self::default()
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// In-memory counterpart of the SQL filter.
    pub fn matches(&self, task: &Task) -> bool {
        self.owner.as_ref().map_or(true, |owner| &task.owner == owner)
            && self.date.map_or(true, |date| task.date == date)
            && self
                .visibility
                .map_or(true, |visibility| task.visibility == visibility)
            && self
                .participant
                .as_ref()
                .map_or(true, |user| task.participants.contains_key(user))
    }
}

/// Repository interface for task storage.
pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    /// Creates every task in `tasks`, or none of them.
    fn create_tasks(&self, tasks: &[Task]) -> RepoResult<Vec<TaskId>>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists tasks ordered by date, then start time (unscheduled last).
    fn list_tasks(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Inserts a task row and its participants inside the caller's transaction.
    fn insert_task(&self, task: &Task) -> RepoResult<()> {
        let (time_kind, time_from, time_to) = time_to_db(&task.time);
        self.conn.execute(
            "INSERT INTO tasks (
                uuid,
                owner_id,
                name,
                description,
                date_key,
                date_ts,
                time_kind,
                time_from,
                time_to,
                color,
                category,
                visibility,
                completion
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                task.id.to_string(),
                task.owner.as_str(),
                task.name.as_str(),
                task.description.as_str(),
                format_date(task.date),
                task.day_timestamp_ms(),
                time_kind,
                time_from,
                time_to,
                task.color.as_str(),
                task.category.as_str(),
                visibility_to_db(task.visibility),
                task.completion.as_str(),
            ],
        )?;
        self.replace_participants(task)
    }

    fn replace_participants(&self, task: &Task) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM task_participants WHERE task_uuid = ?1;",
            [task.id.to_string()],
        )?;
        let mut stmt = self.conn.prepare(
            "INSERT INTO task_participants (task_uuid, user_id, completion)
             VALUES (?1, ?2, ?3);",
        )?;
        for (user, state) in &task.participants {
            stmt.execute(params![task.id.to_string(), user.as_str(), state.as_str()])?;
        }
        Ok(())
    }

    fn load_participants(&self, id: TaskId) -> RepoResult<BTreeMap<UserId, CompletionState>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, completion FROM task_participants WHERE task_uuid = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut participants = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let user_text: String = row.get(0)?;
            let user = UserId::new(user_text).map_err(|err| {
                RepoError::InvalidData(format!("{err} in task_participants.user_id"))
            })?;
            let completion_text: String = row.get(1)?;
            let completion = CompletionState::parse(&completion_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid completion `{completion_text}` in task_participants.completion"
                ))
            })?;
            participants.insert(user, completion);
        }
        Ok(participants)
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        self.insert_task(task)?;
        tx.commit()?;

        Ok(task.id)
    }

    fn create_tasks(&self, tasks: &[Task]) -> RepoResult<Vec<TaskId>> {
        for task in tasks {
            task.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            self.insert_task(task)?;
            ids.push(task.id);
        }
        tx.commit()?;

        Ok(ids)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        let (time_kind, time_from, time_to) = time_to_db(&task.time);

        let tx = self.conn.unchecked_transaction()?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                owner_id = ?1,
                name = ?2,
                description = ?3,
                date_key = ?4,
                date_ts = ?5,
                time_kind = ?6,
                time_from = ?7,
                time_to = ?8,
                color = ?9,
                category = ?10,
                visibility = ?11,
                completion = ?12,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?13;",
            params![
                task.owner.as_str(),
                task.name.as_str(),
                task.description.as_str(),
                format_date(task.date),
                task.day_timestamp_ms(),
                time_kind,
                time_from,
                time_to,
                task.color.as_str(),
                task.category.as_str(),
                visibility_to_db(task.visibility),
                task.completion.as_str(),
                task.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(task.id));
        }
        self.replace_participants(task)?;
        tx.commit()?;

        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => {
                let mut task = parse_task_row(row)?;
                task.participants = self.load_participants(task.id)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn list_tasks(&self, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(owner) = &filter.owner {
            sql.push_str(" AND owner_id = ?");
            bind_values.push(Value::Text(owner.as_str().to_string()));
        }
        if let Some(date) = filter.date {
            sql.push_str(" AND date_key = ?");
            bind_values.push(Value::Text(format_date(date)));
        }
        if let Some(visibility) = filter.visibility {
            sql.push_str(" AND visibility = ?");
            bind_values.push(Value::Text(visibility_to_db(visibility).to_string()));
        }
        if let Some(user) = &filter.participant {
            sql.push_str(
                " AND uuid IN (SELECT task_uuid FROM task_participants WHERE user_id = ?)",
            );
            bind_values.push(Value::Text(user.as_str().to_string()));
        }

        sql.push_str(" ORDER BY date_ts ASC, time_from IS NULL, time_from ASC, uuid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        for task in &mut tasks {
            task.participants = self.load_participants(task.id)?;
        }

        Ok(tasks)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in tasks.uuid"))
    })?;

    let owner_text: String = row.get("owner_id")?;
    let owner = UserId::new(owner_text)
        .map_err(|err| RepoError::InvalidData(format!("{err} in tasks.owner_id")))?;

    let date_key: String = row.get("date_key")?;
    let date = parse_date(&date_key)
        .map_err(|err| RepoError::InvalidData(format!("{err} in tasks.date_key")))?;
    let date_ts: i64 = row.get("date_ts")?;
    if day_timestamp_ms(date) != date_ts {
        return Err(RepoError::InvalidData(format!(
            "tasks.date_ts `{date_ts}` does not match date_key `{date_key}`"
        )));
    }

    let time = parse_time_columns(
        row.get("time_kind")?,
        row.get("time_from")?,
        row.get("time_to")?,
    )?;

    let visibility_text: String = row.get("visibility")?;
    let visibility = parse_visibility(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in tasks.visibility"
        ))
    })?;

    let completion_text: String = row.get("completion")?;
    let completion = CompletionState::parse(&completion_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid completion `{completion_text}` in tasks.completion"
        ))
    })?;

    Ok(Task {
        id,
        owner,
        name: row.get("name")?,
        description: row.get("description")?,
        date,
        time,
        color: row.get("color")?,
        category: row.get("category")?,
        visibility,
        completion,
        participants: BTreeMap::new(),
    })
}

fn parse_time_columns(
    kind: String,
    from: Option<String>,
    to: Option<String>,
) -> RepoResult<TaskTime> {
    let parse = |column: &str, value: Option<String>| -> RepoResult<chrono::NaiveTime> {
        let value = value.ok_or_else(|| {
            RepoError::InvalidData(format!("missing tasks.{column} for time_kind `{kind}`"))
        })?;
        parse_time_of_day(&value)
            .map_err(|err| RepoError::InvalidData(format!("{err} in tasks.{column}")))
    };

    match kind.as_str() {
        "unscheduled" => Ok(TaskTime::Unscheduled),
        "at" => Ok(TaskTime::At(parse("time_from", from)?)),
        "range" => Ok(TaskTime::Range {
            from: parse("time_from", from)?,
            to: parse("time_to", to)?,
        }),
        other => Err(RepoError::InvalidData(format!(
            "invalid time kind `{other}` in tasks.time_kind"
        ))),
    }
}

fn time_to_db(time: &TaskTime) -> (&'static str, Option<String>, Option<String>) {
    match time {
        TaskTime::Unscheduled => ("unscheduled", None, None),
        TaskTime::At(at) => ("at", Some(format_time(*at)), None),
        TaskTime::Range { from, to } => ("range", Some(format_time(*from)), Some(format_time(*to))),
    }
}

fn visibility_to_db(visibility: TaskVisibility) -> &'static str {
    match visibility {
        TaskVisibility::Personal => "personal",
        TaskVisibility::Global => "global",
    }
}

fn parse_visibility(value: &str) -> Option<TaskVisibility> {
    match value {
        "personal" => Some(TaskVisibility::Personal),
        "global" => Some(TaskVisibility::Global),
        _ => None,
    }
}
