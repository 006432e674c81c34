use std::sync::Arc;

use hooked_core::{ClassComponent, HookError, Hooked, HookedClass};
use hooked_runtime_std::StdUpdateScheduler;

/// Upper bound on host update cycles driven by one
/// [`pump_until_idle`](HostTestRule::pump_until_idle) call.
pub const MAX_PUMP_CYCLES: usize = 100;

/// Headless class-component host for exercising hooked components in tests.
///
/// `HostTestRule` plays the part of the class-based framework: it renders the
/// component, calls `did_mount`/`did_update`/`will_unmount` in lifecycle
/// order, and services force-update requests recorded by a
/// [`StdUpdateScheduler`] whenever the test pumps it.
pub struct HostTestRule<C: ClassComponent> {
    component: C,
    scheduler: Arc<StdUpdateScheduler>,
    props: C::Props,
    output: Option<C::Output>,
    mounted: bool,
    unmounted: bool,
    renders: usize,
}

impl<P: 'static, V: 'static> HostTestRule<Hooked<P, V>> {
    /// Create an instance of `class` wired to a fresh scheduler. Nothing is
    /// rendered until [`mount`](Self::mount).
    pub fn new(class: &HookedClass<P, V>, props: P) -> Self {
        let scheduler = Arc::new(StdUpdateScheduler::new());
        let component = class.create(Arc::clone(&scheduler));
        Self::with_component(component, scheduler, props)
    }
}

impl<C: ClassComponent> HostTestRule<C> {
    /// Host an already constructed component. `scheduler` must be the one the
    /// component reports force updates to.
    pub fn with_component(component: C, scheduler: Arc<StdUpdateScheduler>, props: C::Props) -> Self {
        Self {
            component,
            scheduler,
            props,
            output: None,
            mounted: false,
            unmounted: false,
            renders: 0,
        }
    }

    /// Initial render followed by `did_mount`.
    pub fn mount(&mut self) -> Result<(), HookError> {
        assert!(!self.mounted, "component is already mounted");
        self.render()?;
        self.mounted = true;
        self.component.did_mount();
        Ok(())
    }

    /// Replace the props and run an update cycle.
    pub fn set_props(&mut self, props: C::Props) -> Result<(), HookError> {
        self.props = props;
        self.update()
    }

    /// Render followed by `did_update`, as the host does on a force update.
    pub fn update(&mut self) -> Result<(), HookError> {
        assert!(self.mounted, "update before mount");
        assert!(!self.unmounted, "update after unmount");
        self.render()?;
        self.component.did_update();
        Ok(())
    }

    /// Service force-update requests until none remain. Returns the number of
    /// update cycles run.
    pub fn pump_until_idle(&mut self) -> Result<usize, HookError> {
        let mut cycles = 0;
        while self.scheduler.take_update_request() {
            if self.unmounted {
                log::debug!("dropping force update requested after unmount");
                continue;
            }
            cycles += 1;
            if cycles > MAX_PUMP_CYCLES {
                panic!("pump_until_idle ran more than {MAX_PUMP_CYCLES} update cycles");
            }
            self.update()?;
        }
        Ok(cycles)
    }

    /// `will_unmount`, after which the host never touches the component again.
    pub fn unmount(&mut self) {
        if self.mounted && !self.unmounted {
            self.component.will_unmount();
        }
        self.unmounted = true;
    }

    /// Output of the last successful render.
    pub fn output(&self) -> Option<&C::Output> {
        self.output.as_ref()
    }

    pub fn props(&self) -> &C::Props {
        &self.props
    }

    /// Number of lifecycle renders the host has issued.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// Number of force updates the component has requested so far.
    pub fn force_update_requests(&self) -> usize {
        self.scheduler.request_count()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted && !self.unmounted
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }

    pub fn scheduler(&self) -> Arc<StdUpdateScheduler> {
        Arc::clone(&self.scheduler)
    }

    fn render(&mut self) -> Result<(), HookError> {
        self.renders += 1;
        let output = self.component.render(&self.props)?;
        self.output = Some(output);
        Ok(())
    }
}

/// Convenience helper for tests that only need temporary access to a mounted
/// `HostTestRule`. The component is unmounted when `f` returns.
pub fn run_test_host<P: 'static, V: 'static, R>(
    class: &HookedClass<P, V>,
    props: P,
    f: impl FnOnce(&mut HostTestRule<Hooked<P, V>>) -> R,
) -> Result<R, HookError> {
    let mut rule = HostTestRule::new(class, props);
    rule.mount()?;
    let result = f(&mut rule);
    rule.unmount();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hooked_core::{deps, hooked, use_effect, use_state, EffectCleanup, SetState};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn host_rule_services_force_updates() {
        let setter: Rc<RefCell<Option<SetState<i32>>>> = Rc::default();
        let class = hooked("Counter", {
            let setter = Rc::clone(&setter);
            move |step: &i32| {
                let (count, set_count) = use_state(|| 0)?;
                *setter.borrow_mut() = Some(set_count);
                Ok(count * step)
            }
        });

        run_test_host(&class, 2, |rule| {
            assert_eq!(rule.output(), Some(&0));
            assert_eq!(rule.render_count(), 1);

            let set_count = setter.borrow().clone().expect("setter installed");
            set_count.set(3);
            assert_eq!(rule.force_update_requests(), 1);
            assert_eq!(rule.pump_until_idle().expect("update"), 1);
            assert_eq!(rule.output(), Some(&6));

            rule.set_props(10).expect("new props");
            assert_eq!(rule.output(), Some(&30));
            assert_eq!(rule.render_count(), 3);
            assert_eq!(rule.pump_until_idle().expect("idle"), 0);
        })
        .expect("mount");
    }

    #[test]
    fn effect_updates_after_mount_are_pumped() {
        let renders = Rc::new(Cell::new(0));
        let class = hooked("Loader", {
            let renders = Rc::clone(&renders);
            move |_: &()| {
                renders.set(renders.get() + 1);
                let (loaded, set_loaded) = use_state(|| false)?;
                use_effect(
                    move || {
                        set_loaded.set(true);
                        EffectCleanup::none()
                    },
                    Some(deps![]),
                )?;
                Ok(loaded)
            }
        });

        let mut rule = HostTestRule::new(&class, ());
        rule.mount().expect("mount");
        assert_eq!(rule.output(), Some(&false));

        assert_eq!(rule.pump_until_idle().expect("update"), 1);
        assert_eq!(rule.output(), Some(&true));
        assert_eq!(renders.get(), 2);

        rule.unmount();
        assert!(!rule.is_mounted());
        assert!(rule.component().is_unmounted());
    }
}
