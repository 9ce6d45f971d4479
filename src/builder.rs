//! Thread builder for configuring thread creation.

use crate::config::DEFAULT_THREAD_NAME;
use crate::kernel::Kernel;
use crate::port::{CoreAffinity, Port, Priority};
use crate::thread::{Runnable, Thread};

/// Builder for configuring a [`Thread`] before it is created.
///
/// Unset fields fall back to the kernel's
/// [`KernelConfig`](crate::config::KernelConfig) defaults, and the name to
/// `"Default"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadBuilder<'a> {
    name: Option<&'a str>,
    stack_depth: Option<u16>,
    priority: Option<Priority>,
    core: Option<CoreAffinity>,
}

impl<'a> ThreadBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task name. Names longer than the kernel allows are
    /// truncated.
    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Set the stack depth, in kernel stack words.
    pub fn stack_depth(mut self, depth: u16) -> Self {
        self.stack_depth = Some(depth);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Pin the task to `core`.
    pub fn core(mut self, core: u8) -> Self {
        self.core = Some(CoreAffinity::Pinned(core));
        self
    }

    pub fn affinity(mut self, core: CoreAffinity) -> Self {
        self.core = Some(core);
        self
    }

    /// Create the thread. Nothing is started.
    pub fn build<P: Port, R: Runnable<P>>(self, kernel: &'static Kernel<P>, body: R) -> Thread<P, R> {
        let config = kernel.config();
        Thread::new(
            kernel,
            self.name.unwrap_or(DEFAULT_THREAD_NAME),
            self.stack_depth.unwrap_or(config.default_stack_depth),
            self.priority.unwrap_or(config.default_priority),
            self.core.unwrap_or(config.default_core),
            body,
        )
    }

    /// Create the thread and start it.
    ///
    /// Only available with task deletion: a thread whose start failed is
    /// dropped here, and dropping needs to be able to delete.
    #[cfg(feature = "task-delete")]
    pub fn spawn<P: Port, R: Runnable<P>>(
        self,
        kernel: &'static Kernel<P>,
        body: R,
    ) -> crate::error::ThreadResult<Thread<P, R>> {
        let thread = self.build(kernel, body);
        thread.start()?;
        Ok(thread)
    }
}
