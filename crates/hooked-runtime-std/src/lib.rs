//! Thread-safe force-update flag for hosts that poll.
//!
//! A host without its own re-render primitive gives each instance a
//! [`StdUpdateScheduler`] through [`hooked_core::HookedClass::create`] and
//! checks [`take_update_request`](StdUpdateScheduler::take_update_request)
//! whenever it runs an update cycle. An optional waker lets an event loop on
//! another thread learn that a cycle is due.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use hooked_core::UpdateScheduler;

type UpdateWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Records force updates as a flag plus a running total.
pub struct StdUpdateScheduler {
    update_requested: AtomicBool,
    requests: AtomicUsize,
    update_waker: RwLock<Option<UpdateWaker>>,
}

impl StdUpdateScheduler {
    pub fn new() -> Self {
        Self {
            update_requested: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            update_waker: RwLock::new(None),
        }
    }

    /// Clears the pending flag, returning whether it was set.
    pub fn take_update_request(&self) -> bool {
        self.update_requested.swap(false, Ordering::SeqCst)
    }

    /// Peeks at the pending flag.
    pub fn has_update_request(&self) -> bool {
        self.update_requested.load(Ordering::SeqCst)
    }

    /// `force_update` calls since construction. Never reset.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Called after every `force_update`, on the calling thread. Replaces any
    /// previous waker.
    pub fn set_update_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .update_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_update_waker(&self) {
        *self
            .update_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .update_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdUpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdUpdateScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdUpdateScheduler")
            .field(
                "update_requested",
                &self.update_requested.load(Ordering::SeqCst),
            )
            .field("requests", &self.request_count())
            .finish()
    }
}

impl UpdateScheduler for StdUpdateScheduler {
    fn force_update(&self) {
        let previous = self.requests.fetch_add(1, Ordering::SeqCst);
        log::trace!("force update requested ({} so far)", previous + 1);
        self.update_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_taken_once() {
        let scheduler = StdUpdateScheduler::new();
        assert!(!scheduler.take_update_request());

        scheduler.force_update();
        scheduler.force_update();
        assert!(scheduler.has_update_request());
        assert!(scheduler.take_update_request());
        assert!(!scheduler.take_update_request());
        assert_eq!(scheduler.request_count(), 2);
    }

    #[test]
    fn waker_fires_until_cleared() {
        let scheduler = Arc::new(StdUpdateScheduler::default());
        let woken = Arc::new(AtomicUsize::new(0));
        {
            let woken = Arc::clone(&woken);
            scheduler.set_update_waker(move || {
                woken.fetch_add(1, Ordering::SeqCst);
            });
        }

        scheduler.force_update();
        assert_eq!(woken.load(Ordering::SeqCst), 1);

        scheduler.clear_update_waker();
        scheduler.force_update();
        assert_eq!(woken.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.request_count(), 2);
    }

    #[test]
    fn shared_handles_forward_to_the_scheduler() {
        let scheduler = Arc::new(StdUpdateScheduler::new());
        let handle: Box<dyn UpdateScheduler> = Box::new(Arc::clone(&scheduler));
        handle.force_update();
        assert!(scheduler.take_update_request());
    }
}
