//! §5 Concurrency & Resource Model — `TaskController`: cancellation token
//! checked at every suspension point of a long-running operation (indexing,
//! summarization, multi-step plan execution).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AstraError;

/// `{isCancelled, currentTask, startTime}` (§5).
pub struct TaskController {
    is_cancelled: AtomicBool,
    current_task: Mutex<Option<String>>,
    start_time: Mutex<Option<u64>>,
}

impl Default for TaskController {
    fn default() -> Self {
        Self { is_cancelled: AtomicBool::new(false), current_task: Mutex::new(None), start_time: Mutex::new(None) }
    }
}

impl TaskController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a new task, resetting any prior cancellation flag.
    pub fn begin(&self, task_name: impl Into<String>) {
        self.is_cancelled.store(false, Ordering::SeqCst);
        *self.current_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task_name.into());
        *self.start_time.lock().unwrap_or_else(|e| e.into_inner()) = Some(now());
    }

    pub fn cancel(&self) {
        self.is_cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(Ordering::SeqCst)
    }

    pub fn current_task(&self) -> Option<String> {
        self.current_task.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn start_time(&self) -> Option<u64> {
        *self.start_time.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn finish(&self) {
        *self.current_task.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.start_time.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Called at every suspension point (§5): between batches, files,
    /// chunks, LLM invocations. Returns `TaskCancelled` so the caller can
    /// propagate it with `?` and stop at a clean boundary.
    pub fn check_cancelled(&self) -> Result<(), AstraError> {
        if self.is_cancelled() {
            Err(AstraError::TaskCancelled)
        } else {
            Ok(())
        }
    }
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
