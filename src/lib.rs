//! Object-style wrappers over a real-time kernel's task and tick-hook APIs.
//!
//! The kernel itself stays external and is reached through [`Port`]. On top
//! of it this crate offers:
//!
//! - [`Thread`]: one kernel task with a one-shot start, a [`Runnable`] body,
//!   drift-free periodic delays and condition-variable waits.
//! - [`TickHook`]: callback objects dispatched from the tick interrupt.
//!
//! Process-wide state (scheduler flag, start guard, hook list) lives in a
//! [`Kernel`] value rather than in hidden statics.

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod builder;
#[cfg(feature = "condition-variables")]
pub mod condvar;
pub mod config;
#[cfg(feature = "delay-until")]
pub mod delay;
pub mod error;
pub mod kernel;
pub mod observability;
pub mod port;
#[cfg(any(test, feature = "std"))]
pub mod sim;
pub mod sync;
pub mod thread;
#[cfg(feature = "tick-hook")]
pub mod tick_hook;
pub mod trace;

// Every scenario here drops started threads.
#[cfg(all(test, feature = "task-delete"))]
mod tests;

pub use builder::ThreadBuilder;
#[cfg(feature = "condition-variables")]
pub use condvar::ConditionVariable;
pub use config::{KernelConfig, MAX_TASK_NAME_LEN};
#[cfg(feature = "delay-until")]
pub use delay::DelayUntil;
pub use error::{ThreadError, ThreadResult};
pub use kernel::Kernel;
pub use observability::{KernelMetrics, MetricsSnapshot};
#[cfg(feature = "condition-variables")]
pub use port::BinarySemaphore;
pub use port::{CoreAffinity, Port, Priority, TaskFunction, TickDispatcher, TickType, MAX_DELAY};
pub use sync::{CriticalSection, Lockable, SpinLock};
pub use thread::{Runnable, TaskName, Thread, ThreadContext};
#[cfg(feature = "tick-hook")]
pub use tick_hook::{TickCallback, TickHook};
pub use trace::TraceEvent;
