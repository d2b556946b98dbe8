use chrono::{NaiveDate, NaiveDateTime};
use planner_core::db::open_db_in_memory;
use planner_core::{
    CompletionAction, CompletionError, CompletionMark, CompletionState, CurrentUser,
    NewTaskRequest, RecurrenceMode, ServiceError, SqliteTaskRepository, TaskService, TaskTime,
    TaskValidationError, TaskVisibility, UserId,
};

fn member(id: &str) -> CurrentUser {
    CurrentUser::member(UserId::new(id).unwrap())
}

fn admin(id: &str) -> CurrentUser {
    CurrentUser::admin(UserId::new(id).unwrap())
}

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn timed(name: &str, date: &str, time: &str) -> NewTaskRequest {
    let mut request = NewTaskRequest::personal(name, date);
    request.time = time.to_string();
    request
}

fn global(name: &str, date: &str, time: &str) -> NewTaskRequest {
    let mut request = timed(name, date, time);
    request.visibility = TaskVisibility::Global;
    request
}

#[test]
fn weekly_recurrence_creates_one_task_per_date_in_month() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let user = member("u1");

    let mut request = timed("Gym", "01.01.2024", "18:00");
    request.recurrence = RecurrenceMode::Weekly;
    let ids = service.create_tasks(Some(&user), &request).unwrap();
    assert_eq!(ids.len(), 5);

    for date in ["01.01.2024", "08.01.2024", "15.01.2024", "22.01.2024", "29.01.2024"] {
        let agenda = service.agenda_for_date(Some(&user), date).unwrap();
        assert_eq!(agenda.len(), 1, "expected one task on {date}");
        assert_eq!(agenda[0].name, "Gym");
        assert_eq!(agenda[0].completion, CompletionState::Unmarked);
    }
    assert!(service
        .agenda_for_date(Some(&user), "05.02.2024")
        .unwrap()
        .is_empty());
}

#[test]
fn failed_insert_rolls_back_whole_recurrence() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_second_week
         BEFORE INSERT ON tasks
         WHEN NEW.date_key = '08.01.2024'
         BEGIN
             SELECT RAISE(ABORT, 'rejected');
         END;",
    )
    .unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let user = member("u1");

    let mut request = timed("Gym", "01.01.2024", "18:00");
    request.recurrence = RecurrenceMode::Weekly;
    assert!(matches!(
        service.create_tasks(Some(&user), &request),
        Err(ServiceError::Repo(_))
    ));

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
    assert!(service
        .agenda_for_date(Some(&user), "01.01.2024")
        .unwrap()
        .is_empty());
}

#[test]
fn custom_recurrence_uses_given_dates_and_defaults() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let user = member("u1");

    let mut request = NewTaskRequest::personal("Exam prep", "03.01.2024");
    request.recurrence =
        RecurrenceMode::Custom(vec!["10.01.2024".to_string(), "3.2.2024".to_string()]);
    let ids = service.create_tasks(Some(&user), &request).unwrap();
    assert_eq!(ids.len(), 2);

    let task = service.get_task(Some(&user), ids[1]).unwrap().unwrap();
    assert_eq!(task.date_key(), "03.02.2024");
    assert_eq!(task.time, TaskTime::Unscheduled);
    assert_eq!(task.color, "#4A90E2");
    assert_eq!(task.category, "general");
}

#[test]
fn create_rejects_malformed_input_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let user = member("u1");

    assert!(matches!(
        service.create_tasks(Some(&user), &timed("x", "2024-01-08", "")),
        Err(ServiceError::Format(_))
    ));
    assert!(matches!(
        service.create_tasks(Some(&user), &timed("x", "08.01.2024", "25:00")),
        Err(ServiceError::Format(_))
    ));
    assert!(matches!(
        service.create_tasks(Some(&user), &timed("  ", "08.01.2024", "")),
        Err(ServiceError::Validation(TaskValidationError::EmptyName))
    ));
    assert!(matches!(
        service.create_tasks(Some(&user), &timed("Lab", "08.01.2024", "12:00-10:00")),
        Err(ServiceError::Validation(TaskValidationError::InvalidTimeRange { .. }))
    ));
    assert!(service
        .agenda_for_date(Some(&user), "08.01.2024")
        .unwrap()
        .is_empty());
}

#[test]
fn mutations_require_identity_and_reads_return_empty() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let user = member("u1");
    let ids = service
        .create_tasks(Some(&user), &timed("Lecture", "08.01.2024", "10:00"))
        .unwrap();

    assert!(matches!(
        service.create_tasks(None, &timed("Lecture", "08.01.2024", "10:00")),
        Err(ServiceError::AuthenticationRequired)
    ));
    assert!(matches!(
        service.mark_completion(None, ids[0], CompletionAction::Toggle, at(8, 10, 30)),
        Err(ServiceError::AuthenticationRequired)
    ));
    assert!(service.agenda_for_date(None, "08.01.2024").unwrap().is_empty());
    assert!(service.get_task(None, ids[0]).unwrap().is_none());
    assert_eq!(service.completion_summary(None).unwrap().total(), 0);
}

#[test]
fn marking_respects_window_and_toggles() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let user = member("u1");
    let id = service
        .create_tasks(Some(&user), &timed("Lecture", "08.01.2024", "10:00"))
        .unwrap()[0];

    let early = service.mark_completion(Some(&user), id, CompletionAction::Toggle, at(8, 9, 59));
    assert!(matches!(
        early,
        Err(ServiceError::Completion(CompletionError::TooEarly))
    ));

    let toggle = CompletionAction::Toggle;
    assert_eq!(
        service.mark_completion(Some(&user), id, toggle, at(8, 10, 30)).unwrap(),
        CompletionState::Completed
    );
    assert_eq!(
        service.mark_completion(Some(&user), id, toggle, at(8, 11, 15)).unwrap(),
        CompletionState::Uncompleted
    );
    assert_eq!(
        service.mark_completion(Some(&user), id, toggle, at(8, 11, 30)).unwrap(),
        CompletionState::Completed
    );

    let late = service.mark_completion(Some(&user), id, toggle, at(8, 11, 31));
    assert!(matches!(
        late,
        Err(ServiceError::Completion(CompletionError::Expired))
    ));

    let task = service.get_task(Some(&user), id).unwrap().unwrap();
    assert_eq!(task.completion, CompletionState::Completed);
}

#[test]
fn window_status_reports_activity_and_verdict() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let user = member("u1");
    let id = service
        .create_tasks(Some(&user), &timed("Lab", "08.01.2024", "10:00-12:00"))
        .unwrap()[0];
    let task = service.get_task(Some(&user), id).unwrap().unwrap();

    let inside = service.window_status(&task, at(8, 11, 0));
    assert!(inside.is_active);
    assert!(inside.verdict.can_mark);

    let grace = service.window_status(&task, at(8, 12, 20));
    assert!(!grace.is_active);
    assert!(grace.verdict.can_mark);

    let next_day = service.window_status(&task, at(9, 11, 0));
    assert!(!next_day.is_active);
    assert!(!next_day.verdict.can_mark);
}

#[test]
fn only_owner_marks_or_deletes_personal_tasks() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let owner = member("u1");
    let other = member("u2");
    let id = service
        .create_tasks(Some(&owner), &timed("Lecture", "08.01.2024", "10:00"))
        .unwrap()[0];

    assert!(matches!(
        service.mark_completion(Some(&other), id, CompletionAction::Toggle, at(8, 10, 30)),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        service.delete_task(Some(&other), id),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(service.get_task(Some(&other), id).unwrap().is_none());

    service.delete_task(Some(&owner), id).unwrap();
    assert!(matches!(
        service.delete_task(Some(&owner), id),
        Err(ServiceError::TaskNotFound(_))
    ));
}

#[test]
fn global_tasks_are_admin_only_and_tracked_per_participant() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let root = admin("root");
    let alice = member("alice");
    let bob = member("bob");

    assert!(matches!(
        service.create_tasks(Some(&alice), &global("Career fair", "10.01.2024", "14:00")),
        Err(ServiceError::Forbidden(_))
    ));
    let id = service
        .create_tasks(Some(&root), &global("Career fair", "10.01.2024", "14:00"))
        .unwrap()[0];

    assert!(matches!(
        service.mark_completion(Some(&alice), id, CompletionAction::Toggle, at(10, 14, 30)),
        Err(ServiceError::NotParticipant(_))
    ));

    assert!(service.join_global_task(Some(&alice), id).unwrap());
    assert!(!service.join_global_task(Some(&alice), id).unwrap());
    assert!(service.join_global_task(Some(&bob), id).unwrap());

    let done = CompletionAction::Set(CompletionMark::Completed);
    assert_eq!(
        service.mark_completion(Some(&alice), id, done, at(10, 14, 30)).unwrap(),
        CompletionState::Completed
    );

    let task = service.get_task(Some(&bob), id).unwrap().unwrap();
    assert_eq!(
        task.completion_for(&alice.id),
        Some(CompletionState::Completed)
    );
    assert_eq!(task.completion_for(&bob.id), Some(CompletionState::Unmarked));

    let alice_agenda = service.agenda_for_date(Some(&alice), "10.01.2024").unwrap();
    assert_eq!(alice_agenda.len(), 1);
    assert_eq!(
        service
            .list_global_tasks(Some(&bob), Some("10.01.2024"))
            .unwrap()
            .len(),
        1
    );

    assert!(service.leave_global_task(Some(&alice), id).unwrap());
    assert!(!service.leave_global_task(Some(&alice), id).unwrap());
    assert!(service
        .agenda_for_date(Some(&alice), "10.01.2024")
        .unwrap()
        .is_empty());
}

#[test]
fn join_on_personal_task_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let owner = member("u1");
    let id = service
        .create_tasks(Some(&owner), &timed("Lecture", "08.01.2024", ""))
        .unwrap()[0];

    assert!(matches!(
        service.join_global_task(Some(&member("u2")), id),
        Err(ServiceError::NotGlobal(_))
    ));
}

#[test]
fn completion_summary_counts_owned_and_joined_tasks() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let root = admin("root");
    let user = member("u1");

    let first = service
        .create_tasks(Some(&user), &timed("A", "08.01.2024", "10:00"))
        .unwrap()[0];
    let second = service
        .create_tasks(Some(&user), &timed("B", "08.01.2024", "12:00"))
        .unwrap()[0];
    service
        .create_tasks(Some(&user), &timed("C", "09.01.2024", ""))
        .unwrap();
    let talk = service
        .create_tasks(Some(&root), &global("Talk", "08.01.2024", "15:00"))
        .unwrap()[0];
    service.join_global_task(Some(&user), talk).unwrap();

    service
        .mark_completion(Some(&user), first, CompletionAction::Toggle, at(8, 10, 30))
        .unwrap();
    service
        .mark_completion(
            Some(&user),
            second,
            CompletionAction::Set(CompletionMark::Uncompleted),
            at(8, 12, 30),
        )
        .unwrap();

    let summary = service.completion_summary(Some(&user)).unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.uncompleted, 1);
    assert_eq!(summary.unmarked, 2);
    assert_eq!(summary.total(), 4);

    // Admin owns the global task but is not a participant.
    assert_eq!(service.completion_summary(Some(&root)).unwrap().total(), 0);
}
