use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::{self, RenderContext};
use crate::effect::EffectPhase;
use crate::platform::UpdateScheduler;
use crate::slots::SlotTable;
use crate::HookError;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

/// Identity of one component instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle contract of a class-style host component.
///
/// The host calls `render` whenever it needs output, then exactly one of
/// `did_mount` (first commit) or `did_update` (later commits), and finally
/// `will_unmount` before discarding the instance.
pub trait ClassComponent {
    type Props;
    type Output;

    fn render(&mut self, props: &Self::Props) -> Result<Self::Output, HookError>;
    fn did_mount(&mut self) {}
    fn did_update(&mut self) {}
    fn will_unmount(&mut self) {}
}

/// Tuning for hooked components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookedOptions {
    /// Upper bound on render passes inside one lifecycle render.
    pub max_render_passes: usize,
}

impl HookedOptions {
    pub const DEFAULT_MAX_RENDER_PASSES: usize = 25;

    pub fn with_max_render_passes(mut self, passes: usize) -> Self {
        self.max_render_passes = passes.max(1);
        self
    }
}

impl Default for HookedOptions {
    fn default() -> Self {
        Self {
            max_render_passes: Self::DEFAULT_MAX_RENDER_PASSES,
        }
    }
}

type RenderFn<P, V> = Rc<dyn Fn(&P) -> Result<V, HookError>>;

/// A hooks-style render function wrapped as a class component "class".
///
/// Cloning is cheap; every [`create`](Self::create) call yields an
/// independent instance with its own hook slots.
pub struct HookedClass<P, V> {
    name: &'static str,
    render: RenderFn<P, V>,
    options: HookedOptions,
}

impl<P: 'static, V: 'static> HookedClass<P, V> {
    pub fn new(name: &'static str, render: impl Fn(&P) -> Result<V, HookError> + 'static) -> Self {
        Self {
            name,
            render: Rc::new(render),
            options: HookedOptions::default(),
        }
    }
}

impl<P, V> HookedClass<P, V> {
    pub fn with_options(mut self, options: HookedOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn options(&self) -> HookedOptions {
        self.options
    }

    /// Instantiates the class for one host component. `scheduler` is that
    /// instance's force-update primitive.
    pub fn create(&self, scheduler: impl UpdateScheduler + 'static) -> Hooked<P, V> {
        let core = InstanceCore::new(self.name, Box::new(scheduler));
        log::trace!("created {} ({})", self.name, core.id());
        Hooked {
            class: self.clone(),
            core: Rc::new(core),
            slots: Rc::new(RefCell::new(SlotTable::new())),
        }
    }
}

impl<P, V> Clone for HookedClass<P, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            render: Rc::clone(&self.render),
            options: self.options,
        }
    }
}

impl<P, V> fmt::Debug for HookedClass<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedClass")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

/// Wraps `render` as a class component. Shorthand for [`HookedClass::new`].
pub fn hooked<P: 'static, V: 'static>(
    name: &'static str,
    render: impl Fn(&P) -> Result<V, HookError> + 'static,
) -> HookedClass<P, V> {
    HookedClass::new(name, render)
}

/// Instance state shared with the updaters handed out by `use_state`.
pub(crate) struct InstanceCore {
    id: InstanceId,
    name: &'static str,
    scheduler: Box<dyn UpdateScheduler>,
    unmounted: Cell<bool>,
}

impl InstanceCore {
    pub(crate) fn new(name: &'static str, scheduler: Box<dyn UpdateScheduler>) -> Self {
        Self {
            id: InstanceId::next(),
            name,
            scheduler,
            unmounted: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Reacts to an accepted state change: another pass if the instance is
    /// rendering right now, a host force-update otherwise.
    pub(crate) fn invalidate(&self) {
        if context::request_rerender_of(self.id) {
            log::trace!("{} ({}) requested another render pass", self.name, self.id);
            return;
        }
        if self.unmounted.get() {
            log::debug!(
                "ignoring state update on unmounted {} ({})",
                self.name,
                self.id
            );
            return;
        }
        self.scheduler.force_update();
    }
}

/// Mounted instance of a [`HookedClass`].
pub struct Hooked<P, V> {
    class: HookedClass<P, V>,
    core: Rc<InstanceCore>,
    slots: Rc<RefCell<SlotTable>>,
}

impl<P, V> Hooked<P, V> {
    pub fn id(&self) -> InstanceId {
        self.core.id()
    }

    pub fn name(&self) -> &'static str {
        self.class.name
    }

    /// Number of hook slots allocated so far.
    pub fn hook_count(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_unmounted(&self) -> bool {
        self.core.unmounted.get()
    }

    /// Whether an effect is waiting for the next `did_update`.
    pub fn has_pending_effects(&self) -> bool {
        self.slots.borrow().has_pending_effects()
    }

    fn run_effects(&self, phase: EffectPhase) {
        let count = self.slots.borrow().len();
        for ordinal in 0..count {
            // Callbacks run with the table unborrowed; they may update state.
            let run = self
                .slots
                .borrow_mut()
                .effect_at(ordinal)
                .and_then(|effect| effect.take_run(phase));
            let Some(run) = run else {
                continue;
            };
            log::trace!("{phase:?} effect {ordinal} of {} ({})", self.name(), self.id());
            let begins = run.has_begin();
            let cleanup = run.run();
            if begins {
                if let Some(effect) = self.slots.borrow_mut().effect_at(ordinal) {
                    effect.store_cleanup(cleanup);
                }
            }
        }
    }
}

impl<P, V> ClassComponent for Hooked<P, V> {
    type Props = P;
    type Output = V;

    fn render(&mut self, props: &P) -> Result<V, HookError> {
        let context = RenderContext::new(Rc::clone(&self.core), Rc::clone(&self.slots));
        let render = Rc::clone(&self.class.render);
        context::render_until_stable(context, self.class.options.max_render_passes, || {
            render(props)
        })
    }

    fn did_mount(&mut self) {
        self.run_effects(EffectPhase::Mount);
    }

    fn did_update(&mut self) {
        self.run_effects(EffectPhase::Update);
    }

    fn will_unmount(&mut self) {
        // Updates issued by the cleanups below must not reach the host.
        self.core.unmounted.set(true);
        self.run_effects(EffectPhase::Unmount);
        log::trace!("unmounted {} ({})", self.name(), self.id());
    }
}

impl<P, V> Drop for Hooked<P, V> {
    fn drop(&mut self) {
        // Cleanups still stored run when the slot table drops; updates they
        // issue must not reach the host.
        self.core.unmounted.set(true);
    }
}

impl<P, V> fmt::Debug for Hooked<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooked")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("hooks", &self.hook_count())
            .finish()
    }
}
