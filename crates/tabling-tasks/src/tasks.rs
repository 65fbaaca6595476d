//! Keyed cancellable tasks
//!
//! At most one task runs per [`TaskKey`]. Spawning under a key that is
//! still busy cancels the older task first, so a stale response can never
//! overwrite newer state. Tasks check their [`TaskTicket`] before
//! dispatching anything.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tabling_rows::{GroupId, MarkupId, RowId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Logical identity of an in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// The table's list fetch
    List,
    /// Debounced search refetch
    Search,
    /// Create, update or delete of one row
    Row(RowId),
    /// Group membership update or delete
    Group(GroupId),
    /// Markup delete
    Markup(MarkupId),
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("list"),
            Self::Search => f.write_str("search"),
            Self::Row(id) => write!(f, "row:{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
            Self::Markup(id) => write!(f, "markup:{id}"),
        }
    }
}

/// Handle a task uses to find out whether it was superseded
#[derive(Debug, Clone)]
pub struct TaskTicket {
    key: TaskKey,
    generation: u64,
    token: CancellationToken,
}

impl TaskTicket {
    /// Key the task runs under
    #[inline]
    #[must_use]
    pub fn key(&self) -> TaskKey {
        self.key
    }

    /// Spawn order across the registry
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check that the task has not been cancelled or superseded
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves once the task is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

struct Entry {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Entry {
    fn cancel(&self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Registry of keyed tasks
pub struct TaskRegistry {
    tasks: Arc<DashMap<TaskKey, Entry>>,
    next_generation: AtomicU64,
    tracker: TaskTracker,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn a task under `key`, cancelling whatever ran there before
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(&self, key: TaskKey, task: F) -> TaskTicket
    where
        F: FnOnce(TaskTicket) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let ticket = TaskTicket {
            key,
            generation,
            token: token.clone(),
        };

        let future = task(ticket.clone());
        let tasks = Arc::clone(&self.tasks);
        let cancel = token.clone();
        let run = async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!(%key, generation, "task cancelled");
                }
                () = future => {}
            }
            tasks.remove_if(&key, |_, entry| entry.generation == generation);
        };

        // The slot stays locked until the entry is in place, so the task
        // cannot finish and clean up before it is registered
        match self.tasks.entry(key) {
            MapEntry::Occupied(mut slot) => {
                tracing::debug!(%key, generation = slot.get().generation, "superseding task");
                slot.get().cancel();
                let handle = self.tracker.spawn(run);
                slot.insert(Entry {
                    generation,
                    token,
                    handle,
                });
            }
            MapEntry::Vacant(slot) => {
                let handle = self.tracker.spawn(run);
                slot.insert(Entry {
                    generation,
                    token,
                    handle,
                });
            }
        }
        ticket
    }

    /// Cancel the task under `key`; returns whether one was running
    pub fn cancel(&self, key: TaskKey) -> bool {
        match self.tasks.remove(&key) {
            Some((_, entry)) => {
                entry.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every task
    pub fn cancel_all(&self) {
        self.tasks.retain(|key, entry| {
            tracing::debug!(%key, "cancelling task");
            entry.cancel();
            false
        });
    }

    /// Check for a live task under `key`
    #[must_use]
    pub fn is_running(&self, key: TaskKey) -> bool {
        self.tasks
            .get(&key)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// Number of live tasks
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| !entry.handle.is_finished())
            .count()
    }

    /// Wait until every task spawned so far has finished or been cancelled
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tabling_rows::ModelId;

    #[tokio::test(start_paused = true)]
    async fn respawn_cancels_previous_task() {
        let registry = TaskRegistry::new();
        let done = Arc::new(AtomicUsize::new(0));
        let key = TaskKey::Row(RowId::Model(ModelId(1)));

        let first_done = Arc::clone(&done);
        let first = registry.spawn(key, |_| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            first_done.fetch_add(1, Ordering::SeqCst);
        });
        let second_done = Arc::clone(&done);
        let second = registry.spawn(key, |_| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            second_done.fetch_add(10, Ordering::SeqCst);
        });

        assert!(!first.is_current());
        assert!(second.is_current());
        registry.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert!(!registry.is_running(key));
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_run_side_by_side() {
        let registry = TaskRegistry::new();
        let done = Arc::new(AtomicUsize::new(0));
        for key in [TaskKey::List, TaskKey::Group(GroupId(1))] {
            let done = Arc::clone(&done);
            registry.spawn(key, |_| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(registry.active_count(), 2);
        registry.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_marks_ticket_stale() {
        let registry = TaskRegistry::new();
        let ticket = registry.spawn(TaskKey::List, |ticket| async move {
            ticket.cancelled().await;
        });
        assert!(registry.cancel(TaskKey::List));
        assert!(!ticket.is_current());
        assert!(!registry.cancel(TaskKey::List));
        registry.settle().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn finished_tasks_leave_no_entries() {
        let registry = TaskRegistry::new();
        for id in 0..200 {
            registry.spawn(TaskKey::Row(RowId::Model(ModelId(id))), |_| async {});
        }
        registry.settle().await;
        assert_eq!(registry.tasks.len(), 0);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn keys_render() {
        assert_eq!(TaskKey::Group(GroupId(2)).to_string(), "group:group-2");
        assert_eq!(TaskKey::Row(RowId::Model(ModelId(4))).to_string(), "row:4");
    }
}
