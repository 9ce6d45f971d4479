//! Process-wide context shared by every thread and tick hook.
//!
//! A [`Kernel`] bundles the port, the scheduler-active flag, the start-guard
//! lock, the tick-hook registry and the metrics counters. It is meant to live
//! in a `static` so threads and hooks can hold `&'static` references to it.

use portable_atomic::{AtomicBool, Ordering};
use spin::{Mutex, MutexGuard};

use crate::config::KernelConfig;
use crate::observability::KernelMetrics;
use crate::port::{Port, TickDispatcher};
#[cfg(feature = "tick-hook")]
use crate::tick_hook::TickHookRegistry;
#[cfg(feature = "tick-hook")]
use crate::trace::TraceEvent;
#[cfg(feature = "tick-hook")]
use crate::trace_event;

/// Main handle over the wrapped kernel.
///
/// # Type Parameters
///
/// * `P` - Port adapting the real kernel
pub struct Kernel<P: Port> {
    port: P,
    config: KernelConfig,
    /// Single writer: set once when the scheduler starts. Before that only
    /// one thread of execution exists.
    scheduler_active: AtomicBool,
    /// Serializes the one-shot start check across all threads.
    start_guard: Mutex<()>,
    #[cfg(feature = "tick-hook")]
    tick_hooks: TickHookRegistry,
    metrics: KernelMetrics,
}

impl<P: Port> Kernel<P> {
    pub const fn new(port: P, config: KernelConfig) -> Self {
        Self {
            port,
            scheduler_active: AtomicBool::new(config.scheduler_active),
            config,
            start_guard: Mutex::new(()),
            #[cfg(feature = "tick-hook")]
            tick_hooks: TickHookRegistry::new(),
            metrics: KernelMetrics::new(),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn metrics(&self) -> &KernelMetrics {
        &self.metrics
    }

    pub fn scheduler_active(&self) -> bool {
        self.scheduler_active.load(Ordering::Acquire)
    }

    /// Record that the kernel scheduler is now running. Call once, right
    /// before or after handing control to the scheduler.
    pub fn mark_scheduler_active(&self) {
        self.scheduler_active.store(true, Ordering::Release);
    }

    /// Take the start guard, but only once other tasks can exist.
    pub(crate) fn start_guard(&self) -> Option<MutexGuard<'_, ()>> {
        if self.scheduler_active() {
            Some(self.start_guard.lock())
        } else {
            None
        }
    }

    #[cfg(feature = "tick-hook")]
    pub fn tick_hooks(&self) -> &TickHookRegistry {
        &self.tick_hooks
    }

    /// Number of currently registered tick hooks.
    #[cfg(feature = "tick-hook")]
    pub fn tick_hook_count(&self) -> usize {
        self.tick_hooks.len(&self.port)
    }

    /// Hook this kernel's dispatcher into the tick interrupt. Only the first
    /// call per kernel reaches the port.
    #[cfg(feature = "tick-hook")]
    pub fn install_tick_dispatcher(&'static self) {
        if !self.tick_hooks.claim_install() {
            return;
        }

        #[cfg(not(feature = "legacy-hooks"))]
        self.port.register_tick_hook(self);

        #[cfg(feature = "legacy-hooks")]
        crate::tick_hook::LEGACY_DISPATCHER.call_once(|| self as &'static dyn TickDispatcher);

        trace_event!(&self.port, TraceEvent::DispatcherInstalled);
    }
}

impl<P: Port> TickDispatcher for Kernel<P> {
    fn run_all_callbacks(&self) {
        #[cfg(feature = "tick-hook")]
        {
            let ran = self.tick_hooks.run_all(&self.port);
            self.metrics.record_tick(ran);
        }
    }
}
