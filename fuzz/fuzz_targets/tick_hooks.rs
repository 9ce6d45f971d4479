#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use rtos_addons::sim::{leak_kernel, SimPort};
use rtos_addons::{KernelConfig, TickCallback, TickHook};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

#[derive(Debug, Arbitrary)]
enum HookOperation {
    Create,
    Register(usize),
    Enable(usize),
    Disable(usize),
    Drop(usize),
    Tick(u8),
}

struct Counter(Arc<AtomicUsize>);

impl TickCallback for Counter {
    fn run(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

struct Model {
    hook: TickHook<SimPort, Counter>,
    hits: Arc<AtomicUsize>,
    expected: usize,
    registered: bool,
    enabled: bool,
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let operations: Result<Vec<HookOperation>, _> = (0..64)
        .map(|_| HookOperation::arbitrary(&mut u))
        .collect();

    if let Ok(ops) = operations {
        fuzz_tick_hooks(ops);
    }
});

fn fuzz_tick_hooks(operations: Vec<HookOperation>) {
    let kernel = leak_kernel(KernelConfig::new());
    let mut hooks: Vec<Option<Model>> = Vec::new();

    for op in operations {
        let len = hooks.len().max(1);
        match op {
            HookOperation::Create => {
                let hits = Arc::new(AtomicUsize::new(0));
                hooks.push(Some(Model {
                    hook: TickHook::new(kernel, Counter(hits.clone())),
                    hits,
                    expected: 0,
                    registered: false,
                    enabled: true,
                }));
            }
            HookOperation::Register(i) => {
                if let Some(Some(m)) = hooks.get_mut(i % len) {
                    m.hook.register();
                    m.registered = true;
                }
            }
            HookOperation::Enable(i) => {
                if let Some(Some(m)) = hooks.get_mut(i % len) {
                    m.hook.enable();
                    m.enabled = true;
                }
            }
            HookOperation::Disable(i) => {
                if let Some(Some(m)) = hooks.get_mut(i % len) {
                    m.hook.disable();
                    m.enabled = false;
                }
            }
            HookOperation::Drop(i) => {
                if let Some(slot) = hooks.get_mut(i % len) {
                    slot.take();
                }
            }
            HookOperation::Tick(n) => {
                kernel.port().advance_ticks(u32::from(n));
                for m in hooks.iter_mut().flatten() {
                    if m.registered && m.enabled {
                        m.expected += usize::from(n);
                    }
                }
            }
        }

        for m in hooks.iter().flatten() {
            assert_eq!(m.hits.load(Ordering::Relaxed), m.expected);
            assert_eq!(m.hook.is_registered(), m.registered);
        }
    }

    let live = hooks.iter().flatten().filter(|m| m.registered).count();
    assert_eq!(kernel.tick_hook_count(), live);
}
