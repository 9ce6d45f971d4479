//! Trace events emitted by the wrappers.
//!
//! Events go to [`Port::trace`](crate::port::Port::trace). Without the
//! `trace` feature the [`trace_event!`](crate::trace_event) macro compiles to
//! no code.

use crate::port::{CoreAffinity, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent<'a> {
    TaskCreated {
        name: &'a str,
        priority: Priority,
        core: CoreAffinity,
    },
    TaskCreateFailed {
        name: &'a str,
        code: i32,
    },
    StartRejected {
        name: &'a str,
    },
    TaskDeleted {
        name: &'a str,
    },
    TaskReturned {
        name: &'a str,
    },
    HookRegistered,
    HookRemoved,
    DispatcherInstalled,
}

#[cfg(feature = "trace")]
#[macro_export]
macro_rules! trace_event {
    ($port:expr, $event:expr) => {{
        $crate::port::Port::trace($port, &$event);
    }};
}

// Type-checked but never evaluated, so arguments stay "used".
#[cfg(not(feature = "trace"))]
#[macro_export]
macro_rules! trace_event {
    ($port:expr, $event:expr) => {{
        if false {
            let _ = ($port, $event);
        }
    }};
}
