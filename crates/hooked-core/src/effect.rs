use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::context::with_current_context;
use crate::slots::HookSlot;
use crate::{HookError, HookKind};

/// Cleanup returned from an effect's begin callback.
///
/// `()` converts into an empty cleanup, so effects that have nothing to undo
/// can simply return nothing.
#[derive(Default)]
pub struct EffectCleanup {
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl EffectCleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cleanup.is_none()
    }

    fn into_callback(self) -> Option<Box<dyn FnOnce()>> {
        self.cleanup
    }
}

impl From<()> for EffectCleanup {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl<F: FnOnce() + 'static> From<Option<F>> for EffectCleanup {
    fn from(cleanup: Option<F>) -> Self {
        match cleanup {
            Some(cleanup) => Self::new(cleanup),
            None => Self::none(),
        }
    }
}

impl fmt::Debug for EffectCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectCleanup")
            .field("empty", &self.is_empty())
            .finish()
    }
}

trait DepValue: Any {
    fn dep_eq(&self, other: &dyn DepValue) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + 'static> DepValue for T {
    fn dep_eq(&self, other: &dyn DepValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ordered dependency list of an effect.
///
/// Elements compare by their own `PartialEq`; elements of different types are
/// never equal. Wrap shared values in [`ByPtr`] to compare by identity.
#[derive(Default)]
pub struct Deps {
    values: Vec<Box<dyn DepValue>>,
}

impl Deps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: PartialEq + 'static>(&mut self, value: T) {
        self.values.push(Box::new(value));
    }

    pub fn with<T: PartialEq + 'static>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Equal length and pairwise equal, checked from the last element.
    pub fn same_as(&self, other: &Deps) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .rev()
                .zip(other.values.iter().rev())
                .all(|(current, next)| current.dep_eq(next.as_ref()))
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deps").field("len", &self.len()).finish()
    }
}

/// Builds a [`Deps`] list: `deps![]`, `deps![count, ByPtr::new(list)]`.
#[macro_export]
macro_rules! deps {
    () => {
        $crate::Deps::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Deps::new()$(.with($value))+
    };
}

/// Shared value compared by pointer identity instead of by content.
pub struct ByPtr<T: ?Sized>(pub Rc<T>);

impl<T> ByPtr<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(value))
    }
}

impl<T: ?Sized> ByPtr<T> {
    pub fn from_rc(rc: &Rc<T>) -> Self {
        Self(Rc::clone(rc))
    }
}

impl<T: ?Sized> Clone for ByPtr<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ByPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for ByPtr<T> {}

impl<T: ?Sized> Deref for ByPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for ByPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByPtr").field(&&*self.0).finish()
    }
}

type Begin = Box<dyn FnOnce() -> EffectCleanup>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EffectPhase {
    Mount,
    Update,
    Unmount,
}

pub(crate) struct EffectSlot {
    begin: Option<Begin>,
    cleanup: Option<Box<dyn FnOnce()>>,
    deps: Option<Deps>,
    pending: bool,
}

impl EffectSlot {
    fn new(begin: Begin, deps: Option<Deps>) -> Self {
        Self {
            begin: Some(begin),
            cleanup: None,
            deps,
            pending: true,
        }
    }

    fn should_run(&self, deps: Option<&Deps>) -> bool {
        match (self.deps.as_ref(), deps) {
            (Some(current), Some(next)) => !current.same_as(next),
            _ => true,
        }
    }

    /// Records a later render's call. Returns whether the effect is pending.
    fn schedule(&mut self, begin: Begin, deps: Option<Deps>) -> bool {
        if self.should_run(deps.as_ref()) {
            self.begin = Some(begin);
            self.deps = deps;
            self.pending = true;
        }
        self.pending
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending
    }

    /// Takes the work `phase` requires of this slot, if any.
    pub(crate) fn take_run(&mut self, phase: EffectPhase) -> Option<EffectRun> {
        let run = match phase {
            EffectPhase::Mount => EffectRun {
                cleanup: None,
                begin: self.begin.take(),
            },
            EffectPhase::Update if self.pending => EffectRun {
                cleanup: self.cleanup.take(),
                begin: self.begin.take(),
            },
            EffectPhase::Update => return None,
            EffectPhase::Unmount => EffectRun {
                cleanup: self.cleanup.take(),
                begin: None,
            },
        };
        self.pending = false;
        if phase == EffectPhase::Unmount {
            self.begin = None;
        }
        Some(run).filter(|run| run.cleanup.is_some() || run.begin.is_some())
    }

    pub(crate) fn store_cleanup(&mut self, cleanup: Option<Box<dyn FnOnce()>>) {
        self.cleanup = cleanup;
    }
}

impl Drop for EffectSlot {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

/// Cleanup and begin callbacks taken out of a slot so they run unborrowed.
pub(crate) struct EffectRun {
    cleanup: Option<Box<dyn FnOnce()>>,
    begin: Option<Begin>,
}

impl EffectRun {
    /// Runs the previous cleanup, then begin. Returns the new cleanup.
    pub(crate) fn run(self) -> Option<Box<dyn FnOnce()>> {
        if let Some(cleanup) = self.cleanup {
            cleanup();
        }
        self.begin.and_then(|begin| begin().into_callback())
    }

    pub(crate) fn has_begin(&self) -> bool {
        self.begin.is_some()
    }
}

/// Registers a side effect that runs after the host commits this render.
///
/// With `deps: None` the effect re-runs after every update. With
/// `Some(deps)` it re-runs only when the list differs from the one passed on
/// the previous render; `Some(deps![])` therefore runs once, after mount.
/// Before re-running, the cleanup returned by the previous run is invoked.
pub fn use_effect<F, R>(begin: F, deps: Option<Deps>) -> Result<(), HookError>
where
    F: FnOnce() -> R + 'static,
    R: Into<EffectCleanup>,
{
    with_current_context(HookKind::Effect, |context| {
        let ordinal = context.allocate_hook_index();
        let begin: Begin = Box::new(move || begin().into());
        let mut slots = context.slots().borrow_mut();
        let pending = match slots.effect_mut(ordinal)? {
            Some(effect) => effect.schedule(begin, deps),
            None => {
                slots.insert(ordinal, HookSlot::Effect(EffectSlot::new(begin, deps)));
                true
            }
        };
        log::trace!("effect {ordinal} of {} pending={pending}", context.component());
        Ok(())
    })
}
