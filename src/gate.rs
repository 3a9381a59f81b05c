use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// One-shot shutdown signal shared by the sender and receiver loops.
///
/// The gate starts open and can be closed exactly once. Closing wakes every waiter;
/// closing again has no effect.
#[derive(Clone, Debug, Default)]
pub(crate) struct Gate {
    condition: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Closes the gate. Returns `true` only for the call that actually closed it.
    pub(crate) fn close(&self) -> bool {
        let (_, cvar) = &*self.condition;
        let mut closed = self.lock();
        if *closed {
            return false;
        }
        *closed = true;
        cvar.notify_all();
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.lock()
    }

    /// Blocks until `deadline` or until the gate is closed, whichever is first.
    /// Returns whether the gate is closed.
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        let (_, cvar) = &*self.condition;
        let mut closed = self.lock();
        while !*closed {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            closed = cvar.wait_timeout(closed, deadline - now).unwrap_or_else(PoisonError::into_inner).0;
        }
        *closed
    }

    // A panicking loop must not keep the others from shutting down.
    fn lock(&self) -> MutexGuard<'_, bool> {
        let (lock, _) = &*self.condition;
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
