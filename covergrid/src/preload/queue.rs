//! Priority-ordered, de-duplicated preload queue.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::trace;

use crate::preload::task::PreloadTask;

struct QueueInner {
    /// Pending tasks, ascending by priority, FIFO within a priority band.
    tasks: Vec<PreloadTask>,
    /// Fingerprints of pending tasks, for O(1) duplicate detection.
    pending: HashSet<String>,
}

/// Work queue of pending coverage-grid computations.
///
/// At most one pending task exists per fingerprint: enqueueing a duplicate
/// while the first is still pending silently drops the newcomer, keeping the
/// first-seen priority. Enqueue wakes the worker through a [`Notify`] so the
/// worker never has to poll an idle queue at a fixed interval.
pub struct PreloadQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl Default for PreloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PreloadQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                tasks: Vec::new(),
                pending: HashSet::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Add a task unless one with the same fingerprint is already pending.
    ///
    /// Returns `true` if the task was accepted.
    pub fn enqueue(&self, task: PreloadTask) -> bool {
        let key = task.fingerprint();
        let mut inner = self.inner.lock().unwrap();

        if !inner.pending.insert(key.as_str().to_string()) {
            trace!(key = key.short(), "dropping duplicate preload task");
            return false;
        }

        // Insert after every task of equal-or-lower priority number so that
        // ordering stays stable within a band.
        let position = inner
            .tasks
            .partition_point(|pending| pending.priority <= task.priority);
        inner.tasks.insert(position, task);
        drop(inner);

        self.notify.notify_one();
        true
    }

    /// Remove and return the most urgent task, if any.
    pub fn dequeue(&self) -> Option<PreloadTask> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tasks.is_empty() {
            return None;
        }
        let task = inner.tasks.remove(0);
        let key = task.fingerprint();
        inner.pending.remove(key.as_str());
        Some(task)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until a task is enqueued (or a stored permit is consumed).
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{GridQuery, VendorFilters};

    fn task(city: &str, lines: &[&str], priority: u8) -> PreloadTask {
        PreloadTask::new(
            GridQuery::new(
                city,
                lines.iter().map(|l| l.to_string()).collect(),
                VendorFilters::default(),
            ),
            priority,
        )
    }

    #[test]
    fn test_enqueue_dequeue() {
        let queue = PreloadQueue::new();
        assert!(queue.enqueue(task("tehran", &["restaurant"], 1)));
        assert_eq!(queue.len(), 1);

        let popped = queue.dequeue().unwrap();
        assert_eq!(popped.query.city, "tehran");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_empty() {
        let queue = PreloadQueue::new();
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_priority_ordering() {
        let queue = PreloadQueue::new();
        queue.enqueue(task("shiraz", &["bakery"], 4));
        queue.enqueue(task("tehran", &["restaurant"], 1));
        queue.enqueue(task("mashhad", &["coffee"], 2));

        assert_eq!(queue.dequeue().unwrap().query.city, "tehran");
        assert_eq!(queue.dequeue().unwrap().query.city, "mashhad");
        assert_eq!(queue.dequeue().unwrap().query.city, "shiraz");
    }

    #[test]
    fn test_fifo_within_priority_band() {
        let queue = PreloadQueue::new();
        queue.enqueue(task("tehran", &["restaurant"], 2));
        queue.enqueue(task("mashhad", &["restaurant"], 2));
        queue.enqueue(task("shiraz", &["restaurant"], 2));

        assert_eq!(queue.dequeue().unwrap().query.city, "tehran");
        assert_eq!(queue.dequeue().unwrap().query.city, "mashhad");
        assert_eq!(queue.dequeue().unwrap().query.city, "shiraz");
    }

    #[test]
    fn test_duplicate_fingerprint_dropped() {
        let queue = PreloadQueue::new();
        assert!(queue.enqueue(task("tehran", &["restaurant"], 3)));
        // Same query at a better priority: still dropped, first-seen wins.
        assert!(!queue.enqueue(task("tehran", &["restaurant"], 1)));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue().unwrap().priority, 3);
    }

    #[test]
    fn test_line_order_is_same_fingerprint() {
        let queue = PreloadQueue::new();
        assert!(queue.enqueue(task("tehran", &["restaurant", "coffee"], 2)));
        assert!(!queue.enqueue(task("tehran", &["coffee", "restaurant"], 2)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_requeue_after_dequeue_allowed() {
        let queue = PreloadQueue::new();
        queue.enqueue(task("tehran", &["restaurant"], 1));
        queue.dequeue().unwrap();

        // No longer pending, so the same fingerprint may be enqueued again.
        assert!(queue.enqueue(task("tehran", &["restaurant"], 1)));
    }

    #[tokio::test]
    async fn test_enqueue_wakes_waiter() {
        use std::sync::Arc;
        use std::time::Duration;

        let queue = Arc::new(PreloadQueue::new());
        let waiter = Arc::clone(&queue);
        let handle = tokio::spawn(async move {
            waiter.notified().await;
            waiter.dequeue()
        });

        // Give the waiter a moment to park before enqueueing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(task("tehran", &["restaurant"], 1));

        let popped = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should be woken")
            .unwrap();
        assert!(popped.is_some());
    }
}
