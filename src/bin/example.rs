use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rtos_addons::sim::SimPort;
use rtos_addons::{
    Kernel, KernelConfig, Runnable, ThreadBuilder, ThreadContext, TickCallback, TickHook,
};

static KERNEL: Kernel<SimPort> = Kernel::new(SimPort::new(), KernelConfig::before_scheduler());

struct Blink {
    toggles: usize,
}

impl Runnable<SimPort> for Blink {
    fn run(&mut self, cx: &mut ThreadContext<'_, SimPort>) {
        for _ in 0..4 {
            cx.delay_until(25);
            self.toggles += 1;
            println!("[{:>4}] {} toggled ({})", cx.tick_count(), cx.name(), self.toggles);
        }
    }

    fn cleanup(&mut self) {
        println!("blink finished after {} toggles", self.toggles);
    }
}

struct Heartbeat(Arc<AtomicUsize>);

impl TickCallback for Heartbeat {
    fn run(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() {
    let beats = Arc::new(AtomicUsize::new(0));
    let heartbeat = TickHook::new(&KERNEL, Heartbeat(beats.clone()));
    heartbeat.register();

    let blink = ThreadBuilder::new()
        .name("blink")
        .priority(2)
        .core(0)
        .build(&KERNEL, Blink { toggles: 0 });

    // Before the scheduler runs there is only this thread of execution.
    blink.start().expect("blink should start");
    KERNEL.mark_scheduler_active();

    if let Err(e) = blink.start() {
        println!("second start rejected: {}", e);
    }

    let handle = blink.handle().expect("blink has a task");
    KERNEL.port().run_task(handle);

    println!("heartbeat saw {} ticks", beats.load(Ordering::Relaxed));
    println!("{:?}", KERNEL.metrics().snapshot());
}
