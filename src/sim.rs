//! Host simulation port.
//!
//! [`SimPort`] stands in for a real kernel on a development machine. It
//! records task creation and deletion instead of scheduling anything,
//! keeps a tick counter that only moves when told to, and fires the tick
//! hook dispatcher on every simulated tick. Tasks run when a test calls
//! [`SimPort::run_task`] (on the calling thread) or [`SimPort::spawn_task`]
//! (on a fresh std thread).

extern crate alloc;

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;
use core::ffi::c_void;

use portable_atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use spin::Mutex;

use crate::config::KernelConfig;
use crate::kernel::Kernel;
#[cfg(feature = "condition-variables")]
use crate::port::BinarySemaphore;
use crate::port::{CoreAffinity, Port, Priority, TaskFunction, TickDispatcher, TickType};
#[cfg(feature = "condition-variables")]
use crate::port::MAX_DELAY;
use crate::trace::TraceEvent;

/// Handle of a simulated task. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimTaskHandle(pub usize);

/// Record of one simulated task.
#[derive(Debug, Clone)]
pub struct SimTask {
    pub handle: SimTaskHandle,
    pub name: String,
    pub stack_depth: u16,
    pub priority: Priority,
    pub core: CoreAffinity,
    pub deleted: bool,
    entry: TaskFunction,
    param: usize,
}

std::thread_local! {
    static CURRENT_TASK: Cell<Option<SimTaskHandle>> = const { Cell::new(None) };
    #[cfg(feature = "condition-variables")]
    static ON_TIMEOUT: core::cell::RefCell<Option<Box<dyn FnOnce()>>> =
        const { core::cell::RefCell::new(None) };
}

/// Run `f` on this std thread right after its next semaphore take times
/// out, before the take returns.
#[cfg(feature = "condition-variables")]
pub fn on_next_timeout(f: impl FnOnce() + 'static) {
    ON_TIMEOUT.with(|hook| *hook.borrow_mut() = Some(Box::new(f)));
}

pub struct SimPort {
    ticks: AtomicU32,
    next_handle: AtomicUsize,
    tasks: Mutex<Vec<SimTask>>,
    fail_next_create: Mutex<Option<i32>>,
    delete_calls: AtomicUsize,
    hold_deletes: AtomicBool,
    held_deletes: AtomicUsize,
    critical_depth: AtomicUsize,
    critical_entries: AtomicUsize,
    dispatchers: Mutex<Vec<&'static dyn TickDispatcher>>,
    events: Mutex<Vec<String>>,
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPort {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
            next_handle: AtomicUsize::new(1),
            tasks: Mutex::new(Vec::new()),
            fail_next_create: Mutex::new(None),
            delete_calls: AtomicUsize::new(0),
            hold_deletes: AtomicBool::new(false),
            held_deletes: AtomicUsize::new(0),
            critical_depth: AtomicUsize::new(0),
            critical_entries: AtomicUsize::new(0),
            dispatchers: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Jump the tick counter without firing any hooks.
    pub fn set_tick_count(&self, ticks: TickType) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }

    /// Simulate `n` tick interrupts.
    pub fn advance_ticks(&self, n: TickType) {
        for _ in 0..n {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.fire_tick();
        }
    }

    #[cfg(not(feature = "legacy-hooks"))]
    fn fire_tick(&self) {
        let dispatchers: Vec<_> = self.dispatchers.lock().clone();
        for dispatcher in dispatchers {
            dispatcher.run_all_callbacks();
        }
    }

    #[cfg(feature = "legacy-hooks")]
    fn fire_tick(&self) {
        crate::tick_hook::vApplicationTickHook();
    }

    /// Make the next task creation fail with `code`.
    pub fn fail_next_create(&self, code: i32) {
        *self.fail_next_create.lock() = Some(code);
    }

    pub fn tasks(&self) -> Vec<SimTask> {
        self.tasks.lock().clone()
    }

    pub fn task(&self, handle: SimTaskHandle) -> Option<SimTask> {
        self.tasks.lock().iter().find(|t| t.handle == handle).cloned()
    }

    /// Tasks ever created, deleted or not.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn live_task_count(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.deleted).count()
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// While set, `delete_task` parks its caller before deleting anything.
    pub fn hold_deletes(&self, hold: bool) {
        self.hold_deletes.store(hold, Ordering::SeqCst);
    }

    /// Callers currently parked in `delete_task`.
    pub fn held_deletes(&self) -> usize {
        self.held_deletes.load(Ordering::SeqCst)
    }

    pub fn critical_depth(&self) -> usize {
        self.critical_depth.load(Ordering::SeqCst)
    }

    pub fn critical_entries(&self) -> usize {
        self.critical_entries.load(Ordering::SeqCst)
    }

    pub fn tick_hook_registrations(&self) -> usize {
        self.dispatchers.lock().len()
    }

    /// Trace events received so far, debug-formatted.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn entry_of(&self, handle: SimTaskHandle) -> Option<(TaskFunction, usize)> {
        self.tasks
            .lock()
            .iter()
            .find(|t| t.handle == handle && !t.deleted)
            .map(|t| (t.entry, t.param))
    }

    /// Run a live task's entry on the calling thread. Returns `false` if
    /// the task does not exist or was deleted.
    pub fn run_task(&self, handle: SimTaskHandle) -> bool {
        let Some((entry, param)) = self.entry_of(handle) else {
            return false;
        };
        run_entry(handle, entry, param);
        true
    }

    /// Run a live task's entry on a new std thread.
    pub fn spawn_task(&self, handle: SimTaskHandle) -> Option<std::thread::JoinHandle<()>> {
        let (entry, param) = self.entry_of(handle)?;
        Some(std::thread::spawn(move || run_entry(handle, entry, param)))
    }
}

fn run_entry(handle: SimTaskHandle, entry: TaskFunction, param: usize) {
    let previous = CURRENT_TASK.with(|c| c.replace(Some(handle)));
    entry(param as *mut c_void);
    CURRENT_TASK.with(|c| c.set(previous));
}

impl Port for SimPort {
    type TaskHandle = SimTaskHandle;

    #[cfg(feature = "condition-variables")]
    type Semaphore = SimSemaphore;

    unsafe fn create_task_pinned(
        &self,
        entry: TaskFunction,
        name: &str,
        stack_depth: u16,
        param: *mut c_void,
        priority: Priority,
        core: CoreAffinity,
    ) -> Result<SimTaskHandle, i32> {
        if let Some(code) = self.fail_next_create.lock().take() {
            return Err(code);
        }

        let handle = SimTaskHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.tasks.lock().push(SimTask {
            handle,
            name: String::from(name),
            stack_depth,
            priority,
            core,
            deleted: false,
            entry,
            param: param as usize,
        });
        Ok(handle)
    }

    #[cfg(feature = "task-delete")]
    fn delete_task(&self, handle: Option<SimTaskHandle>) {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_deletes.load(Ordering::SeqCst) {
            self.held_deletes.fetch_add(1, Ordering::SeqCst);
            while self.hold_deletes.load(Ordering::SeqCst) {
                std::thread::yield_now();
            }
            self.held_deletes.fetch_sub(1, Ordering::SeqCst);
        }
        let Some(handle) = handle.or_else(|| CURRENT_TASK.with(|c| c.get())) else {
            return;
        };
        if let Some(task) = self.tasks.lock().iter_mut().find(|t| t.handle == handle) {
            task.deleted = true;
        }
    }

    fn tick_count(&self) -> TickType {
        self.ticks.load(Ordering::SeqCst)
    }

    #[cfg(feature = "delay-until")]
    fn delay_until(&self, previous_wake: &mut TickType, period: TickType) {
        *previous_wake = previous_wake.wrapping_add(period);
        let remaining = previous_wake.wrapping_sub(self.tick_count());
        // A deadline more than one period away means it already passed.
        if remaining != 0 && remaining <= period {
            self.advance_ticks(remaining);
        }
    }

    fn enter_critical(&self) {
        self.critical_entries.fetch_add(1, Ordering::SeqCst);
        self.critical_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn exit_critical(&self) {
        self.critical_depth.fetch_sub(1, Ordering::SeqCst);
    }

    #[cfg(all(feature = "tick-hook", not(feature = "legacy-hooks")))]
    fn register_tick_hook(&self, dispatcher: &'static dyn TickDispatcher) {
        self.dispatchers.lock().push(dispatcher);
    }

    fn trace(&self, event: &TraceEvent<'_>) {
        self.events.lock().push(format!("{:?}", event));
    }
}

/// Binary semaphore on std primitives. One tick is one millisecond.
#[cfg(feature = "condition-variables")]
pub struct SimSemaphore {
    available: std::sync::Mutex<bool>,
    cond: std::sync::Condvar,
}

#[cfg(feature = "condition-variables")]
impl BinarySemaphore for SimSemaphore {
    fn new() -> Self {
        Self {
            available: std::sync::Mutex::new(false),
            cond: std::sync::Condvar::new(),
        }
    }

    fn take(&self, timeout: TickType) -> bool {
        let Ok(mut available) = self.available.lock() else {
            return false;
        };

        if timeout == MAX_DELAY {
            while !*available {
                available = match self.cond.wait(available) {
                    Ok(guard) => guard,
                    Err(_) => return false,
                };
            }
        } else {
            let limit = std::time::Duration::from_millis(u64::from(timeout));
            available = match self.cond.wait_timeout_while(available, limit, |a| !*a) {
                Ok((guard, _)) => guard,
                Err(_) => return false,
            };
        }

        let taken = *available;
        *available = false;
        drop(available);

        if !taken {
            if let Some(hook) = ON_TIMEOUT.with(|hook| hook.borrow_mut().take()) {
                hook();
            }
        }
        taken
    }

    fn give(&self) {
        if let Ok(mut available) = self.available.lock() {
            *available = true;
            self.cond.notify_one();
        }
    }
}

/// Build a kernel over a fresh [`SimPort`] with a `'static` lifetime, as
/// threads and tick hooks require.
pub fn leak_kernel(config: KernelConfig) -> &'static Kernel<SimPort> {
    Box::leak(Box::new(Kernel::new(SimPort::new(), config)))
}
