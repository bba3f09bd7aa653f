//! Abstraction over "run this closure periodically, return a cancellation handle".
//!
//! The manager's background sync depends only on this trait, never on a thread pool or timer
//! library directly, so tests can swap in a deterministic fake instead of a real clock.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

/// Cancellation handle for a task scheduled via [`Scheduler::schedule`].
pub trait ScheduledTask: Send {
    fn cancel(&self);
}

pub trait Scheduler: Send + Sync {
    /// Runs `task` roughly every `interval` until the returned handle is cancelled.
    fn schedule(&self, interval: Duration, task: Box<dyn Fn() + Send + Sync>) -> Box<dyn ScheduledTask>;
}

/// A single dedicated thread, woken on a fixed interval, checking a cancellation flag on each
/// wake. Not the focus of this crate: kept intentionally simple, one thread per scheduled task.
#[derive(Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        ThreadScheduler
    }
}

struct ThreadHandle {
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask for ThreadHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, interval: Duration, task: Box<dyn Fn() + Send + Sync>) -> Box<dyn ScheduledTask> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_in_thread = Arc::clone(&cancelled);
        thread::spawn(move || {
            while !cancelled_in_thread.load(Ordering::SeqCst) {
                thread::sleep(interval);
                if cancelled_in_thread.load(Ordering::SeqCst) {
                    break;
                }
                task();
            }
        });
        Box::new(ThreadHandle { cancelled })
    }
}
