//! Locking primitives shared by threads and tick hooks.
//!
//! [`CriticalSection`] pairs the port's interrupt-masking critical section
//! with a spinlock so state touched from the tick interrupt stays consistent
//! across cores. [`Lockable`] is the external lock handed to a
//! condition-variable wait, with [`SpinLock`] as a ready-made one.

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use portable_atomic::{AtomicBool, Ordering};
use spin::{Mutex, MutexGuard};

use crate::port::Port;

/// Port critical section plus a spinlock, released in reverse order.
///
/// Masking the local tick interrupt first means the tick handler on this
/// core can never spin on a lock held by the code it interrupted; the
/// spinlock then excludes the other cores.
pub struct CriticalSection<'a, P: Port, T> {
    port: &'a P,
    guard: ManuallyDrop<MutexGuard<'a, T>>,
}

impl<'a, P: Port, T> CriticalSection<'a, P, T> {
    pub fn enter(port: &'a P, lock: &'a Mutex<T>) -> Self {
        port.enter_critical();
        let guard = lock.lock();
        Self {
            port,
            guard: ManuallyDrop::new(guard),
        }
    }
}

impl<P: Port, T> Deref for CriticalSection<'_, P, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<P: Port, T> DerefMut for CriticalSection<'_, P, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<P: Port, T> Drop for CriticalSection<'_, P, T> {
    fn drop(&mut self) {
        // Safety: the guard is dropped exactly once, here.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.port.exit_critical();
    }
}

/// An external lock with explicit lock/unlock calls, as handed to
/// [`ThreadContext::wait`](crate::thread::ThreadContext::wait).
pub trait Lockable {
    fn lock(&self);
    fn unlock(&self);
}

/// Minimal test-and-set lock implementing [`Lockable`].
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Lockable for SpinLock {
    fn lock(&self) {
        while !self.try_lock() {
            core::hint::spin_loop();
        }
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}
