//! Live task feed.
//!
//! # Responsibility
//! - Let callers subscribe to a filtered task query.
//! - Deliver a full, ordered snapshot on subscribe and after every published
//!   change.
//!
//! # Invariants
//! - Snapshots are complete result sets, never deltas.
//! - Snapshot order: date, then start time (unscheduled last), then id.
//! - Subscriptions are independent; a dropped receiver is pruned on the next
//!   publish.

use crate::model::task::Task;
use crate::repo::task_repo::{RepoResult, TaskFilter, TaskRepository};
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub type SubscriptionId = u64;

/// Full result set of one subscription at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub subscription_id: SubscriptionId,
    /// Monotonic per feed; lets callers discard stale snapshots.
    pub sequence: u64,
    pub tasks: Vec<Task>,
}

/// Receiving side of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<TaskSnapshot>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the next pending snapshot without blocking.
    pub fn try_next(&self) -> Option<TaskSnapshot> {
        match self.receiver.try_recv() {
            Ok(snapshot) => Some(snapshot),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next snapshot.
    pub fn next_timeout(&self, timeout: Duration) -> Option<TaskSnapshot> {
        match self.receiver.recv_timeout(timeout) {
            Ok(snapshot) => Some(snapshot),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains pending snapshots and returns the newest one.
    pub fn latest(&self) -> Option<TaskSnapshot> {
        let mut latest = None;
        while let Some(snapshot) = self.try_next() {
            latest = Some(snapshot);
        }
        latest
    }
}

struct Subscriber {
    id: SubscriptionId,
    filter: TaskFilter,
    sender: Sender<TaskSnapshot>,
}

/// Registry of live task subscriptions.
#[derive(Default)]
pub struct TaskFeed {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    sequence: AtomicU64,
}

impl TaskFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `filter` and delivers its first snapshot immediately.
    pub fn subscribe(
        &self,
        repo: &dyn TaskRepository,
        filter: TaskFilter,
    ) -> RepoResult<Subscription> {
        let tasks = load_snapshot(repo, &filter)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::channel();

        let snapshot = TaskSnapshot {
            subscription_id: id,
            sequence: self.next_sequence(),
            tasks,
        };
        // The receiver is alive in this scope, so the first send cannot fail.
        let _ = sender.send(snapshot);

        self.lock().push(Subscriber { id, filter, sender });
        debug!("event=feed_subscribe module=feed status=ok subscription_id={id}");
        Ok(Subscription { id, receiver })
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Re-runs every subscription's query and pushes fresh snapshots.
    ///
    /// Returns the number of snapshots delivered. Query failures are logged
    /// and skip that subscription for this round.
    pub fn publish(&self, repo: &dyn TaskRepository) -> usize {
        let mut subscribers = self.lock();
        let mut delivered = 0;

        subscribers.retain(|subscriber| {
            let tasks = match load_snapshot(repo, &subscriber.filter) {
                Ok(tasks) => tasks,
                Err(err) => {
                    warn!(
                        "event=feed_publish module=feed status=error subscription_id={} error={err}",
                        subscriber.id
                    );
                    return true;
                }
            };
            let snapshot = TaskSnapshot {
                subscription_id: subscriber.id,
                sequence: self.next_sequence(),
                tasks,
            };
            match subscriber.sender.send(snapshot) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(
                        "event=feed_prune module=feed status=ok subscription_id={}",
                        subscriber.id
                    );
                    false
                }
            }
        });

        debug!(
            "event=feed_publish module=feed status=ok delivered={delivered} subscribers={}",
            subscribers.len()
        );
        delivered
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sorts tasks by date, then start time with unscheduled tasks last, then id.
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        left.date
            .cmp(&right.date)
            .then_with(|| match (left.time.start(), right.time.start()) {
                (Some(l), Some(r)) => l.cmp(&r),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| left.id.cmp(&right.id))
    });
}

fn load_snapshot(repo: &dyn TaskRepository, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
    let mut tasks = repo.list_tasks(filter)?;
    sort_for_display(&mut tasks);
    Ok(tasks)
}
