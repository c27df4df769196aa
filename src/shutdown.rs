//! Shutdown coordinator.
//!
//! A sticky latch: once raised, by SIGINT/SIGTERM or a direct call, it stays
//! raised, and every waiter, past or future, observes it.
//! Uses `parking_lot::{Mutex, Condvar}`, matching the rest of the crate's
//! synchronization primitives.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Shared, cloneable handle to the latch. Installing the OS signal handler
/// more than once per process is a logic error `ctrlc` itself rejects, so
/// `install` is only ever meant to be called once (typically from `main`);
/// `handle()` can be cloned freely to hand the same latch to multiple
/// waiters.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Installs SIGINT/SIGTERM handlers that raise this coordinator's latch.
    /// Returns an error if a handler is already installed for this process
    /// (ctrlc only allows one).
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let handle = self.clone();
        ctrlc::set_handler(move || handle.raise())
    }

    /// Raises the latch and wakes every current and future waiter. Safe to
    /// call more than once; the second and subsequent calls are no-ops.
    pub fn raise(&self) {
        let (lock, cvar) = &*self.inner;
        let mut raised = lock.lock();
        if !*raised {
            *raised = true;
            cvar.notify_all();
        }
    }

    pub fn is_raised(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Blocks the calling thread until the latch is raised. Returns
    /// immediately if it already was. The latch is sticky, never reset.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut raised = lock.lock();
        while !*raised {
            cvar.wait(&mut raised);
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_immediately_once_already_raised() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.raise();
        coordinator.wait();
        assert!(coordinator.is_raised());
    }

    #[test]
    fn wait_unblocks_when_raised_from_another_thread() {
        let coordinator = ShutdownCoordinator::new();
        let raiser = coordinator.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            raiser.raise();
        });
        coordinator.wait();
        handle.join().unwrap();
        assert!(coordinator.is_raised());
    }

    #[test]
    fn raise_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.raise();
        coordinator.raise();
        assert!(coordinator.is_raised());
    }
}
