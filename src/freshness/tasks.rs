//! Fire-and-forget background work.

use std::future::Future;

use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::Result;

/// Dispatches background tasks whose failures are logged, never returned.
///
/// Cloning shares the tracker, so [`wait_idle`](Self::wait_idle) sees tasks
/// spawned through any clone.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` without awaiting it. An error is logged under `name`.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            match task.await {
                Ok(()) => debug!(task = name, "Background task finished"),
                Err(e) => warn!(task = name, error = %e, "Background task failed"),
            }
        });
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every task spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_waits_for_tasks() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            tasks.spawn("count", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        tasks.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_failing_task_is_isolated() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("fail", async { Err(crate::TrendError::Network("down".into())) });
        tasks.wait_idle().await;

        // tracker still usable afterwards
        let flag = Arc::new(AtomicUsize::new(0));
        let f = flag.clone();
        tasks.spawn("after", async move {
            f.store(1, Ordering::SeqCst);
            Ok(())
        });
        tasks.wait_idle().await;
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }
}
