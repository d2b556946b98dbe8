use chrono::{NaiveDate, NaiveTime};
use planner_core::db::open_db_in_memory;
use planner_core::{
    CompletionState, RepoError, SqliteTaskRepository, Task, TaskFilter, TaskRepository, TaskTime,
    TaskValidationError, TaskVisibility, UserId,
};

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut task = Task::new(user("u1"), "Linear algebra", date(8));
    task.description = "Room 101".to_string();
    task.time = TaskTime::Range {
        from: hm(9, 0),
        to: hm(10, 30),
    };
    task.category = "lecture".to_string();
    let id = repo.create_task(&task).unwrap();

    let loaded = repo.get_task(id).unwrap().unwrap();
    assert_eq!(loaded, task);
}

#[test]
fn create_rejects_invalid_task() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let task = Task::new(user("u1"), "   ", date(8));
    let err = repo.create_task(&task).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TaskValidationError::EmptyName)
    ));
    assert!(repo.get_task(task.id).unwrap().is_none());
}

#[test]
fn update_persists_participants_and_completion() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut task = Task::new(user("admin"), "Career fair", date(10));
    task.visibility = TaskVisibility::Global;
    repo.create_task(&task).unwrap();

    task.join(user("u1"));
    task.join(user("u2"));
    task.participants
        .insert(user("u2"), CompletionState::Completed);
    repo.update_task(&task).unwrap();

    let loaded = repo.get_task(task.id).unwrap().unwrap();
    assert_eq!(loaded.participants.len(), 2);
    assert_eq!(
        loaded.completion_for(&user("u2")),
        Some(CompletionState::Completed)
    );

    task.leave(&user("u1"));
    repo.update_task(&task).unwrap();
    let loaded = repo.get_task(task.id).unwrap().unwrap();
    assert_eq!(loaded.completion_for(&user("u1")), None);
}

#[test]
fn update_not_found_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let task = Task::new(user("u1"), "missing", date(8));
    let err = repo.update_task(&task).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == task.id));
}

#[test]
fn list_filters_by_owner_and_date_and_orders_by_time() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut late = Task::new(user("u1"), "late", date(8));
    late.time = TaskTime::At(hm(18, 0));
    let mut early = Task::new(user("u1"), "early", date(8));
    early.time = TaskTime::At(hm(8, 0));
    let untimed = Task::new(user("u1"), "untimed", date(8));
    let other_day = Task::new(user("u1"), "other day", date(9));
    let other_user = Task::new(user("u2"), "other user", date(8));
    for task in [&late, &untimed, &early, &other_day, &other_user] {
        repo.create_task(task).unwrap();
    }

    let listed = repo
        .list_tasks(&TaskFilter::owned_by(user("u1")).on(date(8)))
        .unwrap();
    let names: Vec<_> = listed.iter().map(|task| task.name.as_str()).collect();
    assert_eq!(names, vec!["early", "late", "untimed"]);

    let all_mine = repo.list_tasks(&TaskFilter::owned_by(user("u1"))).unwrap();
    assert_eq!(all_mine.len(), 4);
    assert_eq!(all_mine.last().unwrap().name, "other day");
}

#[test]
fn list_filters_joined_global_tasks() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut joined = Task::new(user("admin"), "joined", date(8));
    joined.visibility = TaskVisibility::Global;
    joined.join(user("u1"));
    let mut open = Task::new(user("admin"), "open", date(8));
    open.visibility = TaskVisibility::Global;
    repo.create_task(&joined).unwrap();
    repo.create_task(&open).unwrap();

    let mine = repo.list_tasks(&TaskFilter::joined_by(user("u1"))).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, joined.id);
    assert!(TaskFilter::joined_by(user("u1")).matches(&mine[0]));

    assert_eq!(repo.list_tasks(&TaskFilter::global()).unwrap().len(), 2);
}

#[test]
fn delete_removes_task_and_participants() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let mut task = Task::new(user("admin"), "talk", date(8));
    task.visibility = TaskVisibility::Global;
    task.join(user("u1"));
    repo.create_task(&task).unwrap();

    repo.delete_task(task.id).unwrap();
    assert!(repo.get_task(task.id).unwrap().is_none());
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM task_participants", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);

    assert!(matches!(
        repo.delete_task(task.id),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn date_timestamp_is_utc_midnight_of_task_day() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let task = Task::new(user("u1"), "pinned", date(8));
    repo.create_task(&task).unwrap();

    let (date_key, date_ts): (String, i64) = conn
        .query_row(
            "SELECT date_key, date_ts FROM tasks WHERE uuid = ?1",
            [task.id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(date_key, "08.01.2024");
    // 2024-01-08T00:00:00Z
    assert_eq!(date_ts, 1_704_672_000_000);
}

#[test]
fn create_tasks_writes_batch_or_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let first = Task::new(user("u1"), "first", date(8));
    let second = Task::new(user("u1"), "second", date(15));
    let ids = repo.create_tasks(&[first.clone(), second.clone()]).unwrap();
    assert_eq!(ids, vec![first.id, second.id]);

    let fresh = Task::new(user("u1"), "fresh", date(22));
    let err = repo.create_tasks(&[fresh.clone(), first.clone()]).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
    assert!(repo.get_task(fresh.id).unwrap().is_none());

    let invalid = Task::new(user("u1"), " ", date(29));
    assert!(matches!(
        repo.create_tasks(&[fresh.clone(), invalid]),
        Err(RepoError::Validation(TaskValidationError::EmptyName))
    ));
    assert!(repo.get_task(fresh.id).unwrap().is_none());
}

#[test]
fn read_rejects_mismatched_date_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::new(&conn);

    let task = Task::new(user("u1"), "drifted", date(8));
    repo.create_task(&task).unwrap();
    conn.execute(
        "UPDATE tasks SET date_ts = date_ts + 86400000 WHERE uuid = ?1",
        [task.id.to_string()],
    )
    .unwrap();

    let err = repo.get_task(task.id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("date_ts")));
}
