//! Condition variable built on the per-thread wait semaphores.
//!
//! Waiting is done through
//! [`ThreadContext::wait`](crate::thread::ThreadContext::wait); this type only
//! keeps the wait list and releases waiters.

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use spin::Mutex;

use crate::port::{BinarySemaphore, Port};

pub struct ConditionVariable<P: Port> {
    waiters: Mutex<VecDeque<Arc<P::Semaphore>>>,
}

impl<P: Port> Default for ConditionVariable<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Port> ConditionVariable<P> {
    pub const fn new() -> Self {
        Self {
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn add_to_wait_list(&self, waiter: Arc<P::Semaphore>) {
        self.waiters.lock().push_back(waiter);
    }

    pub(crate) fn remove_from_wait_list(&self, waiter: &Arc<P::Semaphore>) -> bool {
        let mut waiters = self.waiters.lock();
        let before = waiters.len();
        waiters.retain(|w| !Arc::ptr_eq(w, waiter));
        waiters.len() != before
    }

    /// Wake the longest-waiting thread. Returns `false` if nobody waits.
    pub fn signal(&self) -> bool {
        let waiter = self.waiters.lock().pop_front();
        match waiter {
            Some(sem) => {
                sem.give();
                true
            }
            None => false,
        }
    }

    /// Wake every waiting thread. Returns how many were woken.
    pub fn broadcast(&self) -> usize {
        let mut waiters = self.waiters.lock();
        let woken = waiters.len();
        for sem in waiters.drain(..) {
            sem.give();
        }
        woken
    }

    pub fn waiters(&self) -> usize {
        self.waiters.lock().len()
    }
}
