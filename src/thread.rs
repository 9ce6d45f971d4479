//! Kernel task wrapper.
//!
//! A [`Thread`] owns one kernel task. Its body is any [`Runnable`]; the
//! kernel is handed a generic `extern "C"` trampoline plus the address of
//! the thread's boxed state, and the trampoline calls back into the body.

extern crate alloc;

use alloc::boxed::Box;
#[cfg(feature = "condition-variables")]
use alloc::sync::Arc;
use core::cell::UnsafeCell;
use core::ffi::c_void;
use core::fmt;

use portable_atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::config::MAX_TASK_NAME_LEN;
#[cfg(feature = "condition-variables")]
use crate::condvar::ConditionVariable;
#[cfg(feature = "delay-until")]
use crate::delay::DelayUntil;
use crate::error::{ThreadError, ThreadResult};
use crate::kernel::Kernel;
#[cfg(feature = "condition-variables")]
use crate::port::{BinarySemaphore, MAX_DELAY};
use crate::port::{CoreAffinity, Port, Priority, TickType};
#[cfg(feature = "condition-variables")]
use crate::sync::Lockable;
use crate::trace::TraceEvent;
use crate::trace_event;

/// Task name bounded to what the kernel stores, NUL excluded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskName {
    buf: [u8; MAX_TASK_NAME_LEN - 1],
    len: u8,
}

impl TaskName {
    /// Copy `name`, truncating on a character boundary if it is too long.
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(MAX_TASK_NAME_LEN - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }

        let mut buf = [0u8; MAX_TASK_NAME_LEN - 1];
        buf[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            buf,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }
}

impl fmt::Debug for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The body of a thread.
pub trait Runnable<P: Port>: Send + 'static {
    /// Task body. May loop forever or return once.
    fn run(&mut self, cx: &mut ThreadContext<'_, P>);

    /// Called after [`run`](Self::run) returns, before the task deletes
    /// itself.
    fn cleanup(&mut self) {}
}

/// What the running task can do to itself.
pub struct ThreadContext<'a, P: Port> {
    kernel: &'static Kernel<P>,
    name: &'a TaskName,
    #[cfg(feature = "delay-until")]
    delay: DelayUntil,
    #[cfg(feature = "condition-variables")]
    wait_sem: &'a Arc<P::Semaphore>,
}

impl<'a, P: Port> ThreadContext<'a, P> {
    pub fn kernel(&self) -> &'static Kernel<P> {
        self.kernel
    }

    pub fn port(&self) -> &'static P {
        self.kernel.port()
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn tick_count(&self) -> TickType {
        self.kernel.port().tick_count()
    }

    /// Block until `period` ticks after the previous wake, anchoring to the
    /// current tick on the first call (or the first call after a reset).
    #[cfg(feature = "delay-until")]
    pub fn delay_until(&mut self, period: TickType) {
        self.delay.delay_until(self.kernel.port(), period);
    }

    /// Drop the current cadence. The next
    /// [`delay_until`](Self::delay_until) re-anchors to the tick it is
    /// called on.
    #[cfg(feature = "delay-until")]
    pub fn reset_delay_until(&mut self) {
        self.delay.reset();
    }

    /// Condition-variable wait.
    ///
    /// Joins `cv`'s wait list, releases `lock`, blocks for at most `timeout`
    /// ticks ([`MAX_DELAY`] waits forever), then takes `lock` again. Returns
    /// `true` if the wait timed out.
    ///
    /// Like any condition variable this may wake spuriously; re-check the
    /// predicate.
    #[cfg(feature = "condition-variables")]
    pub fn wait<L: Lockable + ?Sized>(
        &self,
        cv: &ConditionVariable<P>,
        lock: &L,
        timeout: TickType,
    ) -> bool {
        cv.add_to_wait_list(self.wait_sem.clone());
        lock.unlock();

        let mut signalled = self.wait_sem.take(timeout);
        if !signalled && !cv.remove_from_wait_list(self.wait_sem) {
            // A signal popped us between the timeout and the removal. Its
            // give is in flight; consume it so the next wait starts empty.
            self.wait_sem.take(MAX_DELAY);
            signalled = true;
        }

        lock.lock();
        !signalled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskSlot<H> {
    Empty,
    Running(H),
    Exited,
}

struct ThreadInner<P: Port, R> {
    kernel: &'static Kernel<P>,
    name: TaskName,
    stack_depth: u16,
    priority: Priority,
    core: CoreAffinity,
    started: AtomicBool,
    slot: Mutex<TaskSlot<P::TaskHandle>>,
    body: UnsafeCell<R>,
    #[cfg(feature = "condition-variables")]
    wait_sem: Arc<P::Semaphore>,
}

impl<P: Port, R: Runnable<P>> ThreadInner<P, R> {
    /// Check-and-set of the one-shot start flag. Callers serialize.
    fn claim_start(&self) -> bool {
        if self.started.load(Ordering::Acquire) {
            false
        } else {
            self.started.store(true, Ordering::Release);
            true
        }
    }

    #[cfg(feature = "task-delete")]
    fn finish(&self, body: &mut R) {
        body.cleanup();

        let kernel = self.kernel;
        let port = kernel.port();
        trace_event!(port, TraceEvent::TaskReturned { name: self.name.as_str() });

        // Once the slot says Exited, a concurrent drop may free `self`.
        // Everything that reads it happens under the slot lock.
        let handle = {
            let mut slot = self.slot.lock();
            let handle = match core::mem::replace(&mut *slot, TaskSlot::Exited) {
                TaskSlot::Running(handle) => Some(handle),
                // start() has not stored the handle yet; delete ourselves.
                TaskSlot::Empty => None,
                // Dropped first: the drop already deleted this task.
                TaskSlot::Exited => return,
            };
            kernel.metrics().record_task_deleted();
            trace_event!(port, TraceEvent::TaskDeleted { name: self.name.as_str() });
            handle
        };

        port.delete_task(handle);
    }

    #[cfg(not(feature = "task-delete"))]
    fn finish(&self, _body: &mut R) {
        panic!("a thread body must not return when task deletion is not available");
    }
}

extern "C" fn task_entry<P: Port, R: Runnable<P>>(param: *mut c_void) {
    // Safety: `param` is the boxed ThreadInner passed by `Thread::start`.
    // The box is freed only after `Thread::drop` has deleted this task, or
    // after `finish` has marked the slot Exited and stopped reading it.
    let inner = unsafe { &*(param as *const ThreadInner<P, R>) };
    // Safety: only this task touches the body once it has been started.
    let body = unsafe { &mut *inner.body.get() };

    let mut cx = ThreadContext {
        kernel: inner.kernel,
        name: &inner.name,
        #[cfg(feature = "delay-until")]
        delay: DelayUntil::new(),
        #[cfg(feature = "condition-variables")]
        wait_sem: &inner.wait_sem,
    };

    body.run(&mut cx);
    inner.finish(body);
}

/// A kernel task with a one-shot start.
///
/// # Type Parameters
///
/// * `P` - Port of the kernel that runs the task
/// * `R` - Task body
pub struct Thread<P: Port, R: Runnable<P>> {
    inner: Box<ThreadInner<P, R>>,
}

impl<P: Port, R: Runnable<P>> Thread<P, R> {
    /// Store the configuration. The kernel is not touched until
    /// [`start`](Self::start).
    pub fn new(
        kernel: &'static Kernel<P>,
        name: &str,
        stack_depth: u16,
        priority: Priority,
        core: CoreAffinity,
        body: R,
    ) -> Self {
        Self {
            inner: Box::new(ThreadInner {
                kernel,
                name: TaskName::new(name),
                stack_depth,
                priority,
                core,
                started: AtomicBool::new(false),
                slot: Mutex::new(TaskSlot::Empty),
                body: UnsafeCell::new(body),
                #[cfg(feature = "condition-variables")]
                wait_sem: Arc::new(P::Semaphore::new()),
            }),
        }
    }

    /// Create the kernel task.
    ///
    /// Only the first call on a thread may create a task; later calls fail
    /// with [`ThreadError::AlreadyStarted`]. The thread counts as started
    /// even when the kernel refuses the task, so a failed start cannot be
    /// retried.
    pub fn start(&self) -> ThreadResult<()> {
        let inner = &*self.inner;
        let kernel = inner.kernel;
        let port = kernel.port();

        {
            let _guard = kernel.start_guard();
            if !inner.claim_start() {
                kernel.metrics().record_start_rejection();
                trace_event!(port, TraceEvent::StartRejected { name: inner.name.as_str() });
                return Err(ThreadError::AlreadyStarted);
            }
        }

        let param = inner as *const ThreadInner<P, R> as *mut c_void;
        // Safety: the box behind `param` lives until drop, which deletes
        // the task first.
        let created = unsafe {
            port.create_task_pinned(
                task_entry::<P, R>,
                inner.name.as_str(),
                inner.stack_depth,
                param,
                inner.priority,
                inner.core,
            )
        };

        match created {
            Ok(handle) => {
                let mut slot = inner.slot.lock();
                if *slot == TaskSlot::Empty {
                    *slot = TaskSlot::Running(handle);
                }
                drop(slot);

                kernel.metrics().record_task_created();
                trace_event!(
                    port,
                    TraceEvent::TaskCreated {
                        name: inner.name.as_str(),
                        priority: inner.priority,
                        core: inner.core,
                    }
                );
                Ok(())
            }
            Err(code) => {
                kernel.metrics().record_create_failure();
                trace_event!(
                    port,
                    TraceEvent::TaskCreateFailed {
                        name: inner.name.as_str(),
                        code,
                    }
                );
                Err(ThreadError::TaskCreateFailed(code))
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Handle of the live kernel task, if any.
    pub fn handle(&self) -> Option<P::TaskHandle> {
        match *self.inner.slot.lock() {
            TaskSlot::Running(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name.as_str()
    }

    pub fn stack_depth(&self) -> u16 {
        self.inner.stack_depth
    }

    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    pub fn core(&self) -> CoreAffinity {
        self.inner.core
    }

    pub fn kernel(&self) -> &'static Kernel<P> {
        self.inner.kernel
    }
}

// Safety: `&Thread` only reaches the atomics, the slot mutex and immutable
// configuration. The body is touched solely by the task through the raw
// pointer handed to the kernel.
unsafe impl<P: Port, R: Runnable<P>> Sync for Thread<P, R> {}

impl<P: Port, R: Runnable<P>> fmt::Debug for Thread<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.inner.name)
            .field("stack_depth", &self.inner.stack_depth)
            .field("priority", &self.inner.priority)
            .field("core", &self.inner.core)
            .field("started", &self.is_started())
            .field("handle", &self.handle())
            .finish()
    }
}

impl<P: Port, R: Runnable<P>> Drop for Thread<P, R> {
    #[cfg(feature = "task-delete")]
    fn drop(&mut self) {
        let inner = &*self.inner;
        let handle = match core::mem::replace(&mut *inner.slot.lock(), TaskSlot::Exited) {
            TaskSlot::Running(handle) => handle,
            _ => return,
        };

        let port = inner.kernel.port();
        port.delete_task(Some(handle));
        inner.kernel.metrics().record_task_deleted();
        trace_event!(port, TraceEvent::TaskDeleted { name: inner.name.as_str() });
    }

    #[cfg(not(feature = "task-delete"))]
    fn drop(&mut self) {
        panic!("a thread object cannot be destroyed when task deletion is not available");
    }
}
