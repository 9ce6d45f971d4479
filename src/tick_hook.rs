//! Tick hooks: callback objects run once per kernel tick.
//!
//! A [`TickHook`] wraps a [`TickCallback`] and, once registered, is called
//! from the tick interrupt on every tick while it is enabled. Registration
//! prepends, so the newest hook runs first.
//!
//! The registry list is walked while holding the same critical section
//! that guards registration and removal. A hook being dropped on another
//! core therefore waits for an in-flight dispatch to finish and is never
//! called after its drop returns. The cost is that callbacks must not
//! register, enable, disable or drop hooks themselves: they would spin on
//! the lock their own dispatch holds.

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use portable_atomic::{AtomicBool, Ordering};
use spin::Mutex;

use crate::kernel::Kernel;
use crate::port::Port;
use crate::sync::CriticalSection;
use crate::trace::TraceEvent;
use crate::trace_event;

/// Body of a tick hook.
///
/// `run` executes in interrupt context: it must not block, should be short,
/// and may race with task-level code touching the same state.
pub trait TickCallback: Send + Sync + 'static {
    fn run(&self);
}

pub(crate) trait HookEntry: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn fire(&self);
}

struct HookNode<H> {
    enabled: AtomicBool,
    callback: H,
}

impl<H: TickCallback> HookEntry for HookNode<H> {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn fire(&self) {
        self.callback.run();
    }
}

fn same_entry(a: &Arc<dyn HookEntry>, b: &Arc<dyn HookEntry>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Process-wide list of registered hooks, owned by a [`Kernel`].
pub struct TickHookRegistry {
    callbacks: Mutex<VecDeque<Arc<dyn HookEntry>>>,
    installed: AtomicBool,
}

impl Default for TickHookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TickHookRegistry {
    pub const fn new() -> Self {
        Self {
            callbacks: Mutex::new(VecDeque::new()),
            installed: AtomicBool::new(false),
        }
    }

    /// Prepend `entry` unless it is already present.
    pub(crate) fn register<P: Port>(&self, port: &P, entry: Arc<dyn HookEntry>) -> bool {
        let mut list = CriticalSection::enter(port, &self.callbacks);
        if list.iter().any(|e| same_entry(e, &entry)) {
            return false;
        }
        list.push_front(entry);
        true
    }

    pub(crate) fn remove<P: Port>(&self, port: &P, entry: &Arc<dyn HookEntry>) -> bool {
        let mut list = CriticalSection::enter(port, &self.callbacks);
        let before = list.len();
        list.retain(|e| !same_entry(e, entry));
        list.len() != before
    }

    pub(crate) fn contains<P: Port>(&self, port: &P, entry: &Arc<dyn HookEntry>) -> bool {
        let list = CriticalSection::enter(port, &self.callbacks);
        let found = list.iter().any(|e| same_entry(e, entry));
        found
    }

    pub(crate) fn set_enabled<P: Port>(&self, port: &P, flag: &AtomicBool, enabled: bool) {
        let _cs = CriticalSection::enter(port, &self.callbacks);
        flag.store(enabled, Ordering::Relaxed);
    }

    /// Run every enabled entry in list order. Returns how many ran.
    pub(crate) fn run_all<P: Port>(&self, port: &P) -> usize {
        let list = CriticalSection::enter(port, &self.callbacks);
        let mut ran = 0;
        for entry in list.iter() {
            if entry.is_enabled() {
                entry.fire();
                ran += 1;
            }
        }
        ran
    }

    pub(crate) fn len<P: Port>(&self, port: &P) -> usize {
        let list = CriticalSection::enter(port, &self.callbacks);
        let len = list.len();
        len
    }

    /// Mark the dispatcher installed. Returns `true` only for the first
    /// caller.
    pub(crate) fn claim_install(&self) -> bool {
        !self.installed.swap(true, Ordering::AcqRel)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }
}

/// A tick callback object bound to a kernel's registry.
///
/// Constructing one installs the kernel's dispatcher with the tick
/// interrupt (once per kernel). The hook does nothing until
/// [`register`](Self::register) is called. Dropping it unregisters it.
pub struct TickHook<P: Port, H: TickCallback> {
    kernel: &'static Kernel<P>,
    node: Arc<HookNode<H>>,
}

impl<P: Port, H: TickCallback> TickHook<P, H> {
    pub fn new(kernel: &'static Kernel<P>, callback: H) -> Self {
        kernel.install_tick_dispatcher();
        Self {
            kernel,
            node: Arc::new(HookNode {
                enabled: AtomicBool::new(true),
                callback,
            }),
        }
    }

    fn entry(&self) -> Arc<dyn HookEntry> {
        self.node.clone()
    }

    /// Add this hook to the front of the dispatch list. Registering an
    /// already registered hook does nothing.
    pub fn register(&self) {
        let port = self.kernel.port();
        if self.kernel.tick_hooks().register(port, self.entry()) {
            trace_event!(port, TraceEvent::HookRegistered);
        }
    }

    pub fn enable(&self) {
        self.kernel
            .tick_hooks()
            .set_enabled(self.kernel.port(), &self.node.enabled, true);
    }

    pub fn disable(&self) {
        self.kernel
            .tick_hooks()
            .set_enabled(self.kernel.port(), &self.node.enabled, false);
    }

    pub fn is_enabled(&self) -> bool {
        self.node.enabled.load(Ordering::Relaxed)
    }

    pub fn is_registered(&self) -> bool {
        self.kernel
            .tick_hooks()
            .contains(self.kernel.port(), &self.entry())
    }

    pub fn callback(&self) -> &H {
        &self.node.callback
    }
}

impl<P: Port, H: TickCallback> Drop for TickHook<P, H> {
    fn drop(&mut self) {
        let port = self.kernel.port();
        if self.kernel.tick_hooks().remove(port, &self.entry()) {
            trace_event!(port, TraceEvent::HookRemoved);
        }
    }
}

#[cfg(feature = "legacy-hooks")]
pub(crate) static LEGACY_DISPATCHER: spin::Once<&'static dyn crate::port::TickDispatcher> =
    spin::Once::new();

/// Fixed-name tick hook the kernel calls on every tick in legacy hook
/// builds. Forwards to the installed kernel's dispatcher.
#[cfg(feature = "legacy-hooks")]
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn vApplicationTickHook() {
    if let Some(dispatcher) = LEGACY_DISPATCHER.get() {
        dispatcher.run_all_callbacks();
    }
}
