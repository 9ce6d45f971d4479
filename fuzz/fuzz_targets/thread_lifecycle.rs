#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use rtos_addons::sim::{leak_kernel, SimPort};
use rtos_addons::{KernelConfig, Runnable, Thread, ThreadBuilder, ThreadContext};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Arbitrary)]
struct ThreadConfig {
    name: String,
    stack_depth: u16,
    priority: u32,
    core: Option<u8>,
    delays: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum ThreadOperation {
    Build(ThreadConfig),
    Start(usize),
    Run(usize),
    Drop(usize),
    FailNextCreate(i32),
    MarkSchedulerActive,
    Tick(u8),
}

struct Body {
    delays: Vec<u8>,
    runs: Arc<AtomicU64>,
}

impl Runnable<SimPort> for Body {
    fn run(&mut self, cx: &mut ThreadContext<'_, SimPort>) {
        for &period in &self.delays {
            let before = cx.tick_count();
            cx.delay_until(u32::from(period));
            assert!(cx.tick_count() >= before);
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);

    let operations: Result<Vec<ThreadOperation>, _> = (0..64)
        .map(|_| ThreadOperation::arbitrary(&mut u))
        .collect();

    if let Ok(ops) = operations {
        fuzz_thread_lifecycle(ops);
    }
});

fn fuzz_thread_lifecycle(operations: Vec<ThreadOperation>) {
    let kernel = leak_kernel(KernelConfig::before_scheduler());
    let runs = Arc::new(AtomicU64::new(0));
    let mut threads: Vec<Option<Thread<SimPort, Body>>> = Vec::new();
    let mut successful_starts = 0usize;

    for op in operations {
        match op {
            ThreadOperation::Build(config) => {
                let mut builder = ThreadBuilder::new()
                    .name(&config.name)
                    .stack_depth(config.stack_depth)
                    .priority(config.priority);
                if let Some(core) = config.core {
                    builder = builder.core(core);
                }
                let body = Body {
                    delays: config.delays.into_iter().take(8).collect(),
                    runs: runs.clone(),
                };
                let thread = builder.build(kernel, body);
                assert!(thread.name().len() < rtos_addons::MAX_TASK_NAME_LEN);
                threads.push(Some(thread));
            }
            ThreadOperation::Start(idx) => {
                if let Some(Some(thread)) = threads.get(idx % threads.len().max(1)) {
                    let was_started = thread.is_started();
                    let result = thread.start();
                    if was_started {
                        assert!(result.is_err());
                    } else if result.is_ok() {
                        successful_starts += 1;
                    }
                    assert!(thread.is_started());
                }
            }
            ThreadOperation::Run(idx) => {
                if let Some(Some(thread)) = threads.get(idx % threads.len().max(1)) {
                    if let Some(handle) = thread.handle() {
                        assert!(kernel.port().run_task(handle));
                        assert!(thread.handle().is_none());
                    }
                }
            }
            ThreadOperation::Drop(idx) => {
                if let Some(slot) = threads.get_mut(idx % threads.len().max(1)) {
                    slot.take();
                }
            }
            ThreadOperation::FailNextCreate(code) => kernel.port().fail_next_create(code),
            ThreadOperation::MarkSchedulerActive => kernel.mark_scheduler_active(),
            ThreadOperation::Tick(n) => kernel.port().advance_ticks(u32::from(n)),
        }
    }

    // Never more than one task per thread object.
    assert_eq!(kernel.port().task_count(), successful_starts);
    drop(threads);
    assert_eq!(kernel.port().live_task_count(), 0);
}
