//! Smoke tests against the public API on the host simulation port

#![cfg(all(feature = "std", feature = "task-delete"))]

extern crate std;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use rtos_addons::sim::{leak_kernel, SimPort};
use rtos_addons::{KernelConfig, Runnable, ThreadBuilder, ThreadContext, ThreadError};
#[cfg(feature = "tick-hook")]
use rtos_addons::{TickCallback, TickHook};
#[cfg(feature = "delay-until")]
use rtos_addons::{CoreAffinity, TickType};

/// Fixed-rate sampler: five samples, 10 ticks apart.
#[cfg(feature = "delay-until")]
struct Sampler {
    samples: Arc<Mutex<Vec<TickType>>>,
}

#[cfg(feature = "delay-until")]
impl Runnable<SimPort> for Sampler {
    fn run(&mut self, cx: &mut ThreadContext<'_, SimPort>) {
        for i in 0..5 {
            // Uneven work inside the loop must not skew the cadence.
            cx.port().advance_ticks(i % 3);
            cx.delay_until(10);
            self.samples.lock().unwrap().push(cx.tick_count());
        }
    }
}

#[cfg(feature = "tick-hook")]
struct TickCounter(Arc<AtomicUsize>);

#[cfg(feature = "tick-hook")]
impl TickCallback for TickCounter {
    fn run(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(all(
    feature = "delay-until",
    feature = "tick-hook",
    not(feature = "legacy-hooks")
))]
#[test]
fn test_periodic_thread_with_tick_hook() {
    let kernel = leak_kernel(KernelConfig::new());
    let ticks_seen = Arc::new(AtomicUsize::new(0));
    let hook = TickHook::new(kernel, TickCounter(ticks_seen.clone()));
    hook.register();

    let samples = Arc::new(Mutex::new(Vec::new()));
    let thread = ThreadBuilder::new()
        .name("sampler")
        .priority(3)
        .affinity(CoreAffinity::Pinned(0))
        .spawn(kernel, Sampler { samples: samples.clone() })
        .expect("sampler should start");

    assert!(kernel.port().run_task(thread.handle().unwrap()));

    assert_eq!(*samples.lock().unwrap(), [10, 20, 30, 40, 50]);
    // Every simulated tick went through the hook.
    assert_eq!(ticks_seen.load(Ordering::Relaxed), 50);
    assert!(thread.handle().is_none());
    assert_eq!(kernel.port().live_task_count(), 0);
}

#[test]
fn test_start_is_one_shot() {
    struct Idle;

    impl Runnable<SimPort> for Idle {
        fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
    }

    let kernel = leak_kernel(KernelConfig::before_scheduler());
    let thread = ThreadBuilder::new().name("boot").build(kernel, Idle);

    assert_eq!(thread.start(), Ok(()));
    kernel.mark_scheduler_active();
    assert_eq!(thread.start(), Err(ThreadError::AlreadyStarted));
    assert_eq!(kernel.port().task_count(), 1);
}

#[cfg(all(feature = "tick-hook", not(feature = "legacy-hooks")))]
#[test]
fn test_hook_lifecycle() {
    let kernel = leak_kernel(KernelConfig::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let hook = TickHook::new(kernel, TickCounter(hits.clone()));

    kernel.port().advance_ticks(2);
    hook.register();
    kernel.port().advance_ticks(3);
    hook.disable();
    kernel.port().advance_ticks(3);
    hook.enable();
    kernel.port().advance_ticks(1);
    drop(hook);
    kernel.port().advance_ticks(5);

    assert_eq!(hits.load(Ordering::Relaxed), 4);
    assert_eq!(kernel.tick_hook_count(), 0);
}
