#[cfg(test)]
mod tests {
    use crate::builder::ThreadBuilder;
    use crate::config::KernelConfig;
    use crate::sim::{leak_kernel, SimPort};
    use crate::thread::{Runnable, ThreadContext};
    use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::vec::Vec;

    struct Blinker;
    struct Logger;
    struct Monitor;

    impl Runnable<SimPort> for Blinker {
        fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
    }

    impl Runnable<SimPort> for Logger {
        fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
    }

    impl Runnable<SimPort> for Monitor {
        fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
    }

    #[test]
    fn test_three_threads_independent_tasks() {
        let kernel = leak_kernel(KernelConfig::new());
        let blinker = ThreadBuilder::new().name("blink").priority(1).build(kernel, Blinker);
        let logger = ThreadBuilder::new().name("log").priority(2).build(kernel, Logger);
        let monitor = ThreadBuilder::new().name("mon").priority(5).build(kernel, Monitor);

        blinker.start().unwrap();
        logger.start().unwrap();
        monitor.start().unwrap();

        let tasks = kernel.port().tasks();
        assert_eq!(tasks.len(), 3);
        let priorities: Vec<_> = tasks.iter().map(|t| (t.name.as_str(), t.priority)).collect();
        assert_eq!(priorities, [("blink", 1), ("log", 2), ("mon", 5)]);

        let logger_handle = logger.handle().unwrap();
        drop(logger);

        assert_eq!(kernel.port().live_task_count(), 2);
        for task in kernel.port().tasks() {
            assert_eq!(task.deleted, task.handle == logger_handle);
        }
        assert!(blinker.handle().is_some());
        assert!(monitor.handle().is_some());
    }

    #[test]
    fn test_concurrent_start_creates_one_task() {
        struct Idle;

        impl Runnable<SimPort> for Idle {
            fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
        }

        let kernel = leak_kernel(KernelConfig::new());
        let thread = Arc::new(ThreadBuilder::new().name("racy").build(kernel, Idle));
        let wins = Arc::new(AtomicUsize::new(0));

        let starters: Vec<_> = (0..8)
            .map(|_| {
                let thread = thread.clone();
                let wins = wins.clone();
                std::thread::spawn(move || {
                    if thread.start().is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for starter in starters {
            starter.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(kernel.port().task_count(), 1);
        assert_eq!(kernel.metrics().snapshot().start_rejections, 7);
    }

    #[cfg(feature = "task-delete")]
    #[test]
    fn test_drop_while_task_deletes_itself() {
        struct Idle;

        impl Runnable<SimPort> for Idle {
            fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
        }

        let kernel = leak_kernel(KernelConfig::new());
        let thread = ThreadBuilder::new().name("exiting").build(kernel, Idle);
        thread.start().unwrap();
        let handle = thread.handle().unwrap();

        kernel.port().hold_deletes(true);
        let task = kernel.port().spawn_task(handle).unwrap();
        while kernel.port().held_deletes() == 0 {
            std::thread::yield_now();
        }

        // The task owns its deletion now; bookkeeping is already done.
        assert!(thread.handle().is_none());
        assert_eq!(kernel.metrics().snapshot().tasks_deleted, 1);
        drop(thread);
        assert_eq!(kernel.port().delete_calls(), 1);

        kernel.port().hold_deletes(false);
        task.join().unwrap();
        assert!(kernel.port().task(handle).unwrap().deleted);
        assert_eq!(kernel.port().delete_calls(), 1);
        assert_eq!(kernel.metrics().snapshot().tasks_deleted, 1);
    }

    #[cfg(feature = "task-delete")]
    #[test]
    fn test_task_returning_after_drop_does_not_delete_again() {
        struct Idle;

        impl Runnable<SimPort> for Idle {
            fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
        }

        let kernel = leak_kernel(KernelConfig::new());
        let thread = ThreadBuilder::new().name("dropped").build(kernel, Idle);
        thread.start().unwrap();
        let handle = thread.handle().unwrap();

        kernel.port().hold_deletes(true);
        let dropper = std::thread::spawn(move || drop(thread));
        while kernel.port().held_deletes() == 0 {
            std::thread::yield_now();
        }

        // The drop is parked inside delete_task, so the thread state is
        // still alive while the body returns.
        assert!(kernel.port().run_task(handle));
        assert_eq!(kernel.port().delete_calls(), 1);

        kernel.port().hold_deletes(false);
        dropper.join().unwrap();
        assert_eq!(kernel.port().delete_calls(), 1);
        assert_eq!(kernel.metrics().snapshot().tasks_deleted, 1);
        assert_eq!(kernel.port().live_task_count(), 0);
    }

    #[cfg(feature = "condition-variables")]
    mod wait {
        use super::*;
        use crate::condvar::ConditionVariable;
        use crate::port::{TickType, MAX_DELAY};
        use crate::sync::{Lockable, SpinLock};

        struct Waiter {
            cv: Arc<ConditionVariable<SimPort>>,
            lock: Arc<SpinLock>,
            timeout: TickType,
            timed_out: Arc<AtomicBool>,
            relocked: Arc<AtomicBool>,
        }

        impl Runnable<SimPort> for Waiter {
            fn run(&mut self, cx: &mut ThreadContext<'_, SimPort>) {
                self.lock.lock();
                let timed_out = cx.wait(&self.cv, &*self.lock, self.timeout);
                self.timed_out.store(timed_out, Ordering::SeqCst);
                self.relocked.store(self.lock.is_locked(), Ordering::SeqCst);
                self.lock.unlock();
            }
        }

        fn waiter(
            timeout: TickType,
        ) -> (
            Waiter,
            Arc<ConditionVariable<SimPort>>,
            Arc<SpinLock>,
            Arc<AtomicBool>,
            Arc<AtomicBool>,
        ) {
            let cv = Arc::new(ConditionVariable::new());
            let lock = Arc::new(SpinLock::new());
            let timed_out = Arc::new(AtomicBool::new(false));
            let relocked = Arc::new(AtomicBool::new(false));
            let body = Waiter {
                cv: cv.clone(),
                lock: lock.clone(),
                timeout,
                timed_out: timed_out.clone(),
                relocked: relocked.clone(),
            };
            (body, cv, lock, timed_out, relocked)
        }

        #[test]
        fn test_wait_releases_lock_and_wakes_on_signal() {
            let kernel = leak_kernel(KernelConfig::new());
            let (body, cv, lock, timed_out, relocked) = waiter(MAX_DELAY);
            let thread = ThreadBuilder::new().name("waiter").build(kernel, body);
            thread.start().unwrap();

            let task = kernel.port().spawn_task(thread.handle().unwrap()).unwrap();

            // Registered means it holds the lock; acquiring it here proves
            // the wait released it.
            while cv.waiters() == 0 {
                std::thread::yield_now();
            }
            while !lock.try_lock() {
                std::thread::yield_now();
            }
            assert_eq!(cv.waiters(), 1);
            assert!(cv.signal());
            lock.unlock();

            task.join().unwrap();
            assert!(!timed_out.load(Ordering::SeqCst));
            assert!(relocked.load(Ordering::SeqCst));
            assert!(!lock.is_locked());
            assert!(thread.handle().is_none());
        }

        #[test]
        fn test_wait_times_out_without_signal() {
            let kernel = leak_kernel(KernelConfig::new());
            let (body, cv, lock, timed_out, relocked) = waiter(20);
            let thread = ThreadBuilder::new().name("waiter").build(kernel, body);
            thread.start().unwrap();

            kernel.port().run_task(thread.handle().unwrap());

            assert!(timed_out.load(Ordering::SeqCst));
            assert!(relocked.load(Ordering::SeqCst));
            assert!(!lock.is_locked());
            assert_eq!(cv.waiters(), 0);
        }

        struct TwoWaits {
            cv: Arc<ConditionVariable<SimPort>>,
            lock: Arc<SpinLock>,
            results: Arc<spin::Mutex<Vec<bool>>>,
        }

        impl Runnable<SimPort> for TwoWaits {
            fn run(&mut self, cx: &mut ThreadContext<'_, SimPort>) {
                self.lock.lock();
                let first = cx.wait(&self.cv, &*self.lock, 5);
                let second = cx.wait(&self.cv, &*self.lock, 5);
                self.lock.unlock();
                self.results.lock().extend([first, second]);
            }
        }

        #[test]
        fn test_signal_racing_timeout_is_consumed() {
            let kernel = leak_kernel(KernelConfig::new());
            let cv = Arc::new(ConditionVariable::new());
            let lock = Arc::new(SpinLock::new());
            let results = Arc::new(spin::Mutex::new(Vec::new()));
            let thread = ThreadBuilder::new().name("racer").build(
                kernel,
                TwoWaits {
                    cv: cv.clone(),
                    lock: lock.clone(),
                    results: results.clone(),
                },
            );
            thread.start().unwrap();

            // Signal lands after the first take timed out but before the
            // waiter has left the list.
            let late = cv.clone();
            let popped = Arc::new(AtomicBool::new(false));
            let popped_in_hook = popped.clone();
            crate::sim::on_next_timeout(move || {
                popped_in_hook.store(late.signal(), Ordering::SeqCst);
            });
            kernel.port().run_task(thread.handle().unwrap());

            assert!(popped.load(Ordering::SeqCst));
            // First wait counts as signalled; the second sees no stale give.
            assert_eq!(*results.lock(), [false, true]);
            assert_eq!(cv.waiters(), 0);
        }

        #[test]
        fn test_broadcast_wakes_every_waiter() {
            let kernel = leak_kernel(KernelConfig::new());
            let cv = Arc::new(ConditionVariable::new());
            let lock = Arc::new(SpinLock::new());
            let mut threads = Vec::new();
            let mut flags = Vec::new();

            for _ in 0..3 {
                let timed_out = Arc::new(AtomicBool::new(true));
                let body = Waiter {
                    cv: cv.clone(),
                    lock: lock.clone(),
                    timeout: MAX_DELAY,
                    timed_out: timed_out.clone(),
                    relocked: Arc::new(AtomicBool::new(false)),
                };
                let thread = ThreadBuilder::new().name("bcast").build(kernel, body);
                thread.start().unwrap();
                flags.push(timed_out);
                threads.push(thread);
            }

            let tasks: Vec<_> = threads
                .iter()
                .map(|t| kernel.port().spawn_task(t.handle().unwrap()).unwrap())
                .collect();

            while cv.waiters() < 3 {
                std::thread::yield_now();
            }
            lock.lock();
            assert_eq!(cv.broadcast(), 3);
            lock.unlock();

            for task in tasks {
                task.join().unwrap();
            }
            assert!(flags.iter().all(|f| !f.load(Ordering::SeqCst)));
        }
    }

    #[cfg(feature = "tick-hook")]
    mod hooks {
        use super::*;
        use crate::tick_hook::{TickCallback, TickHook};

        struct Count(Arc<AtomicUsize>);

        impl TickCallback for Count {
            fn run(&self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        #[cfg(not(feature = "legacy-hooks"))]
        #[test]
        fn test_hook_churn_during_ticks() {
            let kernel = leak_kernel(KernelConfig::new());
            let steady_hits = Arc::new(AtomicUsize::new(0));
            let steady = TickHook::new(kernel, Count(steady_hits.clone()));
            steady.register();

            let stop = Arc::new(AtomicBool::new(false));
            let churners: Vec<_> = (0..4)
                .map(|_| {
                    let stop = stop.clone();
                    std::thread::spawn(move || {
                        while !stop.load(Ordering::Relaxed) {
                            let hits = Arc::new(AtomicUsize::new(0));
                            let hook = TickHook::new(kernel, Count(hits));
                            hook.register();
                            hook.disable();
                            hook.enable();
                            drop(hook);
                        }
                    })
                })
                .collect();

            kernel.port().advance_ticks(500);
            stop.store(true, Ordering::Relaxed);
            for churner in churners {
                churner.join().unwrap();
            }

            assert_eq!(steady_hits.load(Ordering::Relaxed), 500);
            assert_eq!(kernel.tick_hook_count(), 1);
            assert_eq!(kernel.metrics().snapshot().ticks_dispatched, 500);
        }

        #[cfg(feature = "legacy-hooks")]
        #[test]
        fn test_legacy_entry_point_forwards() {
            let kernel = leak_kernel(KernelConfig::new());
            let hits = Arc::new(AtomicUsize::new(0));
            let hook = TickHook::new(kernel, Count(hits.clone()));
            hook.register();

            crate::tick_hook::vApplicationTickHook();
            crate::tick_hook::vApplicationTickHook();
            // Other tests' simulated ticks land here too.
            assert!(hits.load(Ordering::Relaxed) >= 2);
            assert!(kernel.tick_hooks().is_installed());
        }
    }

    #[cfg(feature = "trace")]
    #[test]
    fn test_trace_events_reach_port() {
        struct Idle;

        impl Runnable<SimPort> for Idle {
            fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
        }

        let kernel = leak_kernel(KernelConfig::new());
        let thread = ThreadBuilder::new().name("traced").build(kernel, Idle);
        thread.start().unwrap();
        let _ = thread.start();
        drop(thread);

        let events = kernel.port().events();
        assert!(events[0].starts_with("TaskCreated"));
        assert!(events[1].starts_with("StartRejected"));
        assert!(events[2].starts_with("TaskDeleted"));
    }
}
