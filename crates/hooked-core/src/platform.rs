//! Host abstraction traits for the hooks runtime.
//!
//! The class-based host owns scheduling. Hooked components only need a way to
//! ask the host to re-render a particular instance, which is what
//! [`UpdateScheduler`] models.

use std::rc::Rc;
use std::sync::Arc;

/// Force-update primitive of a host component instance.
///
/// Implementations must not re-render the component synchronously from inside
/// `force_update`; the request is honoured on the host's next update cycle.
pub trait UpdateScheduler {
    /// Request that the host re-render the owning component.
    fn force_update(&self);
}

impl<S: UpdateScheduler + ?Sized> UpdateScheduler for Rc<S> {
    fn force_update(&self) {
        (**self).force_update();
    }
}

impl<S: UpdateScheduler + ?Sized> UpdateScheduler for Arc<S> {
    fn force_update(&self) {
        (**self).force_update();
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct TestScheduler {
    requests: std::cell::Cell<usize>,
}

#[cfg(test)]
impl TestScheduler {
    pub(crate) fn requests(&self) -> usize {
        self.requests.get()
    }
}

#[cfg(test)]
impl UpdateScheduler for TestScheduler {
    fn force_update(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}
