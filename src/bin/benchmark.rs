use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rtos_addons::sim::{leak_kernel, SimPort};
use rtos_addons::{Kernel, KernelConfig, Runnable, ThreadBuilder, ThreadContext, TickCallback, TickHook};

const TICKS: u32 = 100_000;
const THREADS: usize = 10_000;

struct Count(Arc<AtomicUsize>);

impl TickCallback for Count {
    fn run(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

struct Idle;

impl Runnable<SimPort> for Idle {
    fn run(&mut self, _cx: &mut ThreadContext<'_, SimPort>) {}
}

fn tick_dispatch(kernel: &'static Kernel<SimPort>, hooks: usize) {
    let hits = Arc::new(AtomicUsize::new(0));
    let registered: Vec<_> = (0..hooks)
        .map(|_| {
            let hook = TickHook::new(kernel, Count(hits.clone()));
            hook.register();
            hook
        })
        .collect();

    let start = Instant::now();
    kernel.port().advance_ticks(TICKS);
    let elapsed = start.elapsed();

    println!(
        "{:>3} hooks: {:?} for {} ticks ({:?}/tick, {} callbacks)",
        hooks,
        elapsed,
        TICKS,
        elapsed / TICKS,
        hits.load(Ordering::Relaxed)
    );
    drop(registered);
}

fn thread_start(kernel: &'static Kernel<SimPort>) {

    let start = Instant::now();
    for _ in 0..THREADS {
        let thread = ThreadBuilder::new().name("bench").build(kernel, Idle);
        if thread.start().is_err() {
            println!("start failed");
            return;
        }
    }
    let elapsed = start.elapsed();

    println!(
        "start+drop: {:?} for {} threads ({:?}/thread)",
        elapsed,
        THREADS,
        elapsed / THREADS as u32
    );
    println!("{:?}", kernel.metrics().snapshot());
}

fn main() {
    println!("\n=== rtos-addons host benchmarks ===\n");

    println!("Tick hook dispatch");
    println!("------------------");
    let kernel = leak_kernel(KernelConfig::new());
    for hooks in [1, 8, 64] {
        tick_dispatch(kernel, hooks);
    }

    println!("\nThread lifecycle");
    println!("----------------");
    thread_start(kernel);
}
