//! Counters for the wrapper layer.
//!
//! These count what the wrappers asked of the kernel, not what the kernel
//! did with it. All updates are relaxed atomics so they are safe to bump
//! from the tick interrupt.

use portable_atomic::{AtomicUsize, Ordering};

/// Live counters owned by a [`Kernel`](crate::kernel::Kernel).
#[derive(Debug)]
pub struct KernelMetrics {
    tasks_created: AtomicUsize,
    create_failures: AtomicUsize,
    start_rejections: AtomicUsize,
    tasks_deleted: AtomicUsize,
    ticks_dispatched: AtomicUsize,
    hook_invocations: AtomicUsize,
}

/// Point-in-time copy of [`KernelMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Successful task creations.
    pub tasks_created: usize,
    /// Task creations the kernel refused.
    pub create_failures: usize,
    /// `start()` calls rejected because the thread was already started.
    pub start_rejections: usize,
    /// Task deletions requested, from drop or from a returning body.
    pub tasks_deleted: usize,
    /// Tick interrupts that reached the hook dispatcher.
    pub ticks_dispatched: usize,
    /// Individual tick callbacks run.
    pub hook_invocations: usize,
}

impl Default for KernelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelMetrics {
    pub const fn new() -> Self {
        Self {
            tasks_created: AtomicUsize::new(0),
            create_failures: AtomicUsize::new(0),
            start_rejections: AtomicUsize::new(0),
            tasks_deleted: AtomicUsize::new(0),
            ticks_dispatched: AtomicUsize::new(0),
            hook_invocations: AtomicUsize::new(0),
        }
    }

    pub(crate) fn record_task_created(&self) {
        self.tasks_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_create_failure(&self) {
        self.create_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_start_rejection(&self) {
        self.start_rejections.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(feature = "task-delete")]
    pub(crate) fn record_task_deleted(&self) {
        self.tasks_deleted.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(feature = "tick-hook")]
    pub(crate) fn record_tick(&self, invocations: usize) {
        self.ticks_dispatched.fetch_add(1, Ordering::Relaxed);
        self.hook_invocations.fetch_add(invocations, Ordering::Relaxed);
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_created: self.tasks_created.load(Ordering::Relaxed),
            create_failures: self.create_failures.load(Ordering::Relaxed),
            start_rejections: self.start_rejections.load(Ordering::Relaxed),
            tasks_deleted: self.tasks_deleted.load(Ordering::Relaxed),
            ticks_dispatched: self.ticks_dispatched.load(Ordering::Relaxed),
            hook_invocations: self.hook_invocations.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.tasks_created.store(0, Ordering::Relaxed);
        self.create_failures.store(0, Ordering::Relaxed);
        self.start_rejections.store(0, Ordering::Relaxed);
        self.tasks_deleted.store(0, Ordering::Relaxed);
        self.ticks_dispatched.store(0, Ordering::Relaxed);
        self.hook_invocations.store(0, Ordering::Relaxed);
    }
}
