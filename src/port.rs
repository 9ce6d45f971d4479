//! Kernel call boundary.
//!
//! Everything this crate needs from the underlying real-time kernel goes
//! through the [`Port`] trait. A port is a thin adapter over the kernel's
//! C API: task creation pinned to a core, task deletion, tick queries,
//! delay-until, critical sections and tick-interrupt hook registration.
//! The crate never schedules anything itself.

use core::ffi::c_void;
use core::fmt::Debug;

use crate::trace::TraceEvent;

/// Kernel tick counter type.
pub type TickType = u32;

/// Task priority as understood by the kernel (higher is more urgent).
pub type Priority = u32;

/// Block-forever sentinel for every tick-bounded wait.
pub const MAX_DELAY: TickType = TickType::MAX;

/// Task entry point signature expected by the kernel.
pub type TaskFunction = extern "C" fn(*mut c_void);

/// Which core a task may run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoreAffinity {
    /// Let the kernel pick any core.
    #[default]
    Any,
    /// Pin the task to one core.
    Pinned(u8),
}

/// Object the tick interrupt calls into once per kernel tick.
pub trait TickDispatcher: Sync {
    /// Run every enabled tick callback. Interrupt context.
    fn run_all_callbacks(&self);
}

/// Binary semaphore used to park a thread inside a condition-variable wait.
#[cfg(feature = "condition-variables")]
pub trait BinarySemaphore: Send + Sync + Sized {
    /// Create an empty (taken) semaphore.
    fn new() -> Self;

    /// Block for at most `timeout` ticks. Returns `true` if the semaphore
    /// was obtained, `false` on timeout.
    fn take(&self, timeout: TickType) -> bool;

    /// Release the semaphore, waking one blocked taker.
    fn give(&self);
}

/// Adapter over the wrapped kernel.
///
/// Implementations must be usable from every core; `enter_critical` /
/// `exit_critical` must also be callable from the tick interrupt.
pub trait Port: Send + Sync + 'static {
    /// Opaque kernel task handle.
    type TaskHandle: Copy + Send + Sync + PartialEq + Eq + Debug;

    /// Per-thread wait semaphore.
    #[cfg(feature = "condition-variables")]
    type Semaphore: BinarySemaphore;

    /// Create a task pinned to `core`.
    ///
    /// Returns the new handle, or the kernel's status code on failure.
    ///
    /// # Safety
    ///
    /// `param` is handed to `entry` verbatim. The caller must keep whatever
    /// it points to alive until the task has been deleted.
    unsafe fn create_task_pinned(
        &self,
        entry: TaskFunction,
        name: &str,
        stack_depth: u16,
        param: *mut c_void,
        priority: Priority,
        core: CoreAffinity,
    ) -> Result<Self::TaskHandle, i32>;

    /// Delete a task. `None` deletes the calling task.
    #[cfg(feature = "task-delete")]
    fn delete_task(&self, handle: Option<Self::TaskHandle>);

    /// Current kernel tick count.
    fn tick_count(&self) -> TickType;

    /// Advance `previous_wake` by `period` and block until that tick.
    #[cfg(feature = "delay-until")]
    fn delay_until(&self, previous_wake: &mut TickType, period: TickType);

    /// Enter the process-wide short critical section (masks the local
    /// tick interrupt).
    fn enter_critical(&self);

    /// Leave the critical section entered by [`Port::enter_critical`].
    fn exit_critical(&self);

    /// Ask the kernel to call `dispatcher` on every tick interrupt.
    #[cfg(all(feature = "tick-hook", not(feature = "legacy-hooks")))]
    fn register_tick_hook(&self, dispatcher: &'static dyn TickDispatcher);

    /// Receive a trace event. Only called with the `trace` feature.
    fn trace(&self, _event: &TraceEvent<'_>) {}
}
