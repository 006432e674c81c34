//! Render context: the per-render replacement for a process-wide render
//! manager.
//!
//! A [`RenderContext`] is created for every lifecycle render of a hooked
//! component and installed in a thread-local slot for exactly the duration of
//! the render loop. Hook functions find their component through it; state
//! updaters use it to tell "update during my own render" apart from an update
//! coming from anywhere else.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread_local;

use crate::component::InstanceCore;
use crate::slots::SlotTable;
use crate::{HookError, HookKind, InstanceId};

thread_local! {
    static ACTIVE_RENDER: RefCell<Option<Rc<RenderContext>>> = RefCell::new(None);
}

pub struct RenderContext {
    owner: Rc<InstanceCore>,
    slots: Rc<RefCell<SlotTable>>,
    cursor: Cell<usize>,
    slots_at_pass_start: Cell<usize>,
    stable: Cell<bool>,
}

impl RenderContext {
    pub(crate) fn new(owner: Rc<InstanceCore>, slots: Rc<RefCell<SlotTable>>) -> Self {
        Self {
            owner,
            slots,
            cursor: Cell::new(0),
            slots_at_pass_start: Cell::new(0),
            stable: Cell::new(true),
        }
    }

    /// Instance this context renders.
    pub fn target(&self) -> InstanceId {
        self.owner.id()
    }

    pub fn component(&self) -> &'static str {
        self.owner.name()
    }

    pub fn is_rendering_target(&self, target: InstanceId) -> bool {
        self.target() == target
    }

    /// Next hook ordinal of the current pass.
    pub fn allocate_hook_index(&self) -> usize {
        let ordinal = self.cursor.get();
        self.cursor.set(ordinal + 1);
        ordinal
    }

    pub fn request_rerender(&self) {
        self.stable.set(false);
    }

    /// Returns whether another pass was requested and marks the render stable.
    pub fn consume_rerender_request(&self) -> bool {
        !self.stable.replace(true)
    }

    pub(crate) fn owner(&self) -> &Rc<InstanceCore> {
        &self.owner
    }

    pub(crate) fn slots(&self) -> &Rc<RefCell<SlotTable>> {
        &self.slots
    }

    fn begin_pass(&self) {
        self.cursor.set(0);
        self.slots_at_pass_start.set(self.slots.borrow().len());
    }

    /// Once an instance has completed a pass, every later pass must call
    /// exactly as many hooks as there are slots, zero included.
    fn finish_pass(&self) -> Result<(), HookError> {
        let mut slots = self.slots.borrow_mut();
        let expected = self.slots_at_pass_start.get();
        let found = self.cursor.get();
        if slots.is_settled() && expected != found {
            return Err(HookError::HookCountMismatch {
                component: self.component(),
                expected,
                found,
            });
        }
        slots.settle();
        Ok(())
    }

    /// Drops the slots a failed pass allocated, so the next render sees the
    /// table as it was before that pass.
    fn rollback_pass(&self) {
        let start = self.slots_at_pass_start.get();
        let detached = self.slots.borrow_mut().truncate(start);
        if !detached.is_empty() {
            log::debug!(
                "discarding {} hook slots allocated by a failed pass of {} ({})",
                detached.len(),
                self.component(),
                self.target()
            );
        }
    }

    fn run_pass<V>(
        &self,
        render_pass: &mut impl FnMut() -> Result<V, HookError>,
    ) -> Result<V, HookError> {
        self.begin_pass();
        let outcome = render_pass().and_then(|output| self.finish_pass().map(|()| output));
        if outcome.is_err() {
            self.rollback_pass();
        }
        outcome
    }
}

/// Binding of a [`RenderContext`] to the current thread.
///
/// Dropping an armed binding unbinds, so a panic unwinding out of user render
/// code never leaves a stale context behind.
struct RenderBinding {
    context: Rc<RenderContext>,
    armed: bool,
}

impl RenderBinding {
    fn setup(context: RenderContext) -> Result<Self, HookError> {
        ACTIVE_RENDER.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(current) = active.as_ref() {
                return Err(HookError::NestedRender {
                    active: current.target(),
                    requested: context.target(),
                });
            }
            let context = Rc::new(context);
            *active = Some(Rc::clone(&context));
            Ok(Self {
                context,
                armed: true,
            })
        })
    }

    fn context(&self) -> &RenderContext {
        &self.context
    }

    fn teardown(mut self) -> Result<(), HookError> {
        self.armed = false;
        unbind(self.context.target())
    }
}

impl Drop for RenderBinding {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = unbind(self.context.target()) {
            log::error!("{err}");
        }
    }
}

fn unbind(target: InstanceId) -> Result<(), HookError> {
    let bound = ACTIVE_RENDER.with(|active| active.borrow_mut().take());
    match bound {
        Some(context) if context.target() == target => Ok(()),
        other => Err(HookError::TeardownMismatch {
            bound: other.map(|context| context.target()),
            requested: target,
        }),
    }
}

/// Runs `render_pass` until no pass requests another one.
///
/// The context is bound for the whole loop and unbound on every exit path.
/// More than `max_passes` passes is reported as [`HookError::RenderLoopLimit`].
pub(crate) fn render_until_stable<V>(
    context: RenderContext,
    max_passes: usize,
    mut render_pass: impl FnMut() -> Result<V, HookError>,
) -> Result<V, HookError> {
    let binding = RenderBinding::setup(context)?;
    let outcome = run_passes(binding.context(), max_passes, &mut render_pass);
    let unbound = binding.teardown();
    let output = outcome?;
    unbound?;
    Ok(output)
}

fn run_passes<V>(
    context: &RenderContext,
    max_passes: usize,
    render_pass: &mut impl FnMut() -> Result<V, HookError>,
) -> Result<V, HookError> {
    let mut passes = 0;
    loop {
        if passes == max_passes {
            return Err(HookError::RenderLoopLimit {
                component: context.component(),
                passes,
            });
        }
        passes += 1;
        log::trace!(
            "render pass {passes} of {} ({})",
            context.component(),
            context.target()
        );
        let output = context.run_pass(render_pass)?;
        if !context.consume_rerender_request() {
            return Ok(output);
        }
    }
}

/// Runs `f` against the bound render context.
///
/// Fails with [`HookError::OutsideRender`] naming `hook` when no render is
/// bound on this thread.
pub fn with_current_context<R>(
    hook: HookKind,
    f: impl FnOnce(&RenderContext) -> Result<R, HookError>,
) -> Result<R, HookError> {
    let context = ACTIVE_RENDER
        .with(|active| active.borrow().clone())
        .ok_or(HookError::OutsideRender { hook })?;
    f(&context)
}

/// Whether any render is bound on this thread.
pub fn is_rendering() -> bool {
    ACTIVE_RENDER.with(|active| active.borrow().is_some())
}

pub fn is_rendering_target(target: InstanceId) -> bool {
    ACTIVE_RENDER.with(|active| {
        active
            .borrow()
            .as_ref()
            .map_or(false, |context| context.is_rendering_target(target))
    })
}

/// Requests another pass if `target` is the component being rendered.
///
/// Returns `false`, doing nothing, otherwise.
pub(crate) fn request_rerender_of(target: InstanceId) -> bool {
    ACTIVE_RENDER.with(|active| match active.borrow().as_ref() {
        Some(context) if context.is_rendering_target(target) => {
            context.request_rerender();
            true
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TestScheduler;
    use crate::slots::HookSlot;

    fn context(name: &'static str) -> RenderContext {
        let core = InstanceCore::new(name, Box::new(Rc::new(TestScheduler::default())));
        RenderContext::new(Rc::new(core), Rc::new(RefCell::new(SlotTable::new())))
    }

    #[test]
    fn hooks_outside_render_fail() {
        let err = with_current_context(HookKind::Ref, |_| Ok(())).unwrap_err();
        assert_eq!(err, HookError::OutsideRender { hook: HookKind::Ref });
        assert!(!is_rendering());
    }

    #[test]
    fn ordinals_restart_on_every_pass() {
        let mut seen = Vec::new();
        let mut passes = 0;
        render_until_stable(context("Counter"), 8, || {
            passes += 1;
            with_current_context(HookKind::Ref, |context| {
                let ordinal = context.allocate_hook_index();
                if context.slots().borrow().len() == ordinal {
                    context
                        .slots()
                        .borrow_mut()
                        .insert(ordinal, HookSlot::Ref(Rc::new(())));
                }
                seen.push(ordinal);
                if passes == 1 {
                    context.request_rerender();
                }
                Ok(())
            })
        })
        .unwrap();

        assert_eq!(passes, 2);
        assert_eq!(seen, vec![0, 0]);
        assert!(!is_rendering());
    }

    #[test]
    fn consuming_a_request_marks_render_stable() {
        let context = context("Stable");
        assert!(!context.consume_rerender_request());
        context.request_rerender();
        assert!(context.consume_rerender_request());
        assert!(!context.consume_rerender_request());
    }

    #[test]
    fn only_the_bound_target_is_rendering() {
        let outer = context("Outer");
        let target = outer.target();
        let other = context("Other").target();

        render_until_stable(outer, 1, || {
            assert!(is_rendering_target(target));
            assert!(!is_rendering_target(other));
            assert!(!request_rerender_of(other));
            Ok(())
        })
        .unwrap();
        assert!(!is_rendering_target(target));
    }

    #[test]
    fn nested_render_is_rejected_and_outer_binding_survives() {
        let outer = context("Outer");
        let outer_id = outer.target();

        render_until_stable(outer, 1, || {
            let inner = context("Inner");
            let inner_id = inner.target();
            let err = render_until_stable(inner, 1, || Ok(())).unwrap_err();
            assert_eq!(
                err,
                HookError::NestedRender {
                    active: outer_id,
                    requested: inner_id,
                }
            );
            assert!(is_rendering_target(outer_id));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn errors_unbind_before_propagating() {
        let err = render_until_stable(context("Broken"), 4, || -> Result<(), HookError> {
            Err(HookError::OutsideRender {
                hook: HookKind::Effect,
            })
        })
        .unwrap_err();

        assert!(matches!(err, HookError::OutsideRender { .. }));
        assert!(!is_rendering());
    }

    #[test]
    fn panics_unbind_through_the_guard() {
        let result = std::panic::catch_unwind(|| {
            render_until_stable(context("Panicky"), 4, || -> Result<(), HookError> {
                panic!("render blew up")
            })
        });

        assert!(result.is_err());
        assert!(!is_rendering());
    }

    #[test]
    fn runaway_rerender_hits_the_pass_limit() {
        let mut passes = 0;
        let err = render_until_stable(context("Runaway"), 3, || {
            passes += 1;
            with_current_context(HookKind::State, |context| {
                context.request_rerender();
                Ok(())
            })
        })
        .unwrap_err();

        assert_eq!(passes, 3);
        assert_eq!(
            err,
            HookError::RenderLoopLimit {
                component: "Runaway",
                passes: 3,
            }
        );
    }

    #[test]
    fn teardown_of_a_foreign_target_is_reported() {
        let bound = context("Bound");
        let stranger = context("Stranger").target();
        let bound_id = bound.target();
        let binding = RenderBinding::setup(bound).unwrap();

        let err = unbind(stranger).unwrap_err();
        assert_eq!(
            err,
            HookError::TeardownMismatch {
                bound: Some(bound_id),
                requested: stranger,
            }
        );
        assert!(!is_rendering());

        let err = binding.teardown().unwrap_err();
        assert_eq!(
            err,
            HookError::TeardownMismatch {
                bound: None,
                requested: bound_id,
            }
        );
    }
}
