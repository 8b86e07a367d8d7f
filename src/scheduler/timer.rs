//! One-shot timers with cancellable handles

use crate::error::{AppError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Runs a callback once after a delay.
///
/// Implementations must return before the callback runs.
pub trait OneShotTimer: Send + Sync {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TaskHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Pending,
    Fired,
    Cancelled,
}

struct TaskInner {
    state: Mutex<TaskState>,
    abort: Mutex<Option<AbortHandle>>,
}

/// Shared handle to a scheduled callback
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskInner>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TaskInner {
                state: Mutex::new(TaskState::Pending),
                abort: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> TaskState {
        *self.inner.state.lock()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TaskState::Pending
    }

    pub fn has_fired(&self) -> bool {
        self.state() == TaskState::Fired
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// Pending -> Cancelled. Returns false if the task already fired or was
    /// cancelled.
    pub fn cancel(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if *state != TaskState::Pending {
                return false;
            }
            *state = TaskState::Cancelled;
        }
        if let Some(abort) = self.inner.abort.lock().take() {
            abort.abort();
        }
        true
    }

    /// Pending -> Fired; the caller runs the callback only on `true`
    pub fn begin_fire(&self) -> bool {
        let mut state = self.inner.state.lock();
        if *state != TaskState::Pending {
            return false;
        }
        *state = TaskState::Fired;
        true
    }

    pub fn same_task(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn set_abort(&self, abort: AbortHandle) {
        *self.inner.abort.lock() = Some(abort);
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .finish()
    }
}

/// Timer backed by a tokio task sleeping on `tokio::time`
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime of the calling context
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| AppError::Internal(format!("No tokio runtime: {}", e)))?;
        Ok(Self::new(handle))
    }
}

impl OneShotTimer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TaskHandle {
        let task = TaskHandle::new();
        let firing = task.clone();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if firing.begin_fire() {
                callback();
            }
        });
        task.set_abort(join.abort_handle());
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(hits: &Arc<AtomicUsize>) -> TimerCallback {
        let hits = hits.clone();
        Box::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let timer = TokioTimer::current().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let task = timer.schedule(Duration::from_secs(2), counting_callback(&hits));

        tokio::time::sleep(Duration::from_millis(1_999)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(task.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(task.has_fired());
        assert!(!task.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_never_fires() {
        let timer = TokioTimer::current().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let task = timer.schedule(Duration::from_secs(1), counting_callback(&hits));

        assert!(task.cancel());
        assert!(!task.cancel());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(task.is_cancelled());
    }

    #[test]
    fn test_begin_fire_is_exclusive() {
        let task = TaskHandle::new();
        let clone = task.clone();
        assert!(task.begin_fire());
        assert!(!clone.begin_fire());
        assert!(clone.same_task(&task));
        assert!(!TaskHandle::new().same_task(&task));
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(TokioTimer::current().is_err());
    }
}
