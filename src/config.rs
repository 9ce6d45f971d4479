//! Runtime configuration and compile-time limits.

use crate::port::{CoreAffinity, Priority};

/// Task name capacity including the kernel's terminating NUL.
pub const MAX_TASK_NAME_LEN: usize = 16;

/// Name given to threads built without one.
pub const DEFAULT_THREAD_NAME: &str = "Default";

/// Process-wide settings for a [`Kernel`](crate::kernel::Kernel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Whether the kernel scheduler is already running when the
    /// [`Kernel`](crate::kernel::Kernel) is created. Some kernel
    /// distributions start the scheduler before application entry.
    pub scheduler_active: bool,
    /// Stack depth, in words, for threads built without one.
    pub default_stack_depth: u16,
    /// Priority for threads built without one.
    pub default_priority: Priority,
    /// Affinity for threads built without one.
    pub default_core: CoreAffinity,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            scheduler_active: true,
            default_stack_depth: 2048,
            default_priority: 1,
            default_core: CoreAffinity::Any,
        }
    }

    /// Configuration for a kernel whose scheduler is started later by the
    /// application.
    pub const fn before_scheduler() -> Self {
        Self {
            scheduler_active: false,
            ..Self::new()
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
