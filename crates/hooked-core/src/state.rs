use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::InstanceCore;
use crate::context::with_current_context;
use crate::slots::HookSlot;
use crate::{HookError, HookKind};

/// Updater returned by [`use_state`].
///
/// Cheap to clone and valid for the lifetime of the component: it may be
/// called during render, from effects, or from outside event handlers.
pub struct SetState<T> {
    cell: Rc<RefCell<T>>,
    owner: Rc<InstanceCore>,
}

impl<T: PartialEq + 'static> SetState<T> {
    /// Replaces the value. A value equal to the current one is ignored.
    pub fn set(&self, value: T) {
        self.update(move |_| value);
    }

    /// Computes the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let current = self.cell.borrow();
            let next = f(&current);
            if next == *current {
                return;
            }
            next
        };
        *self.cell.borrow_mut() = next;
        self.owner.invalidate();
    }
}

impl<T: Clone> SetState<T> {
    /// Current value, as the next render would see it.
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            owner: Rc::clone(&self.owner),
        }
    }
}

impl<T> PartialEq for SetState<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Eq for SetState<T> {}

impl<T: fmt::Debug> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState")
            .field("value", &*self.cell.borrow())
            .field("component", &self.owner.name())
            .finish()
    }
}

/// State local to the rendering component.
///
/// `init` runs once, on the first render of the instance. Returns the current
/// value and its updater. Setting a new value from inside this component's
/// own render schedules another render pass before the host sees any output;
/// from anywhere else it asks the host for an update.
pub fn use_state<T, F>(init: F) -> Result<(T, SetState<T>), HookError>
where
    T: Clone + PartialEq + 'static,
    F: FnOnce() -> T,
{
    with_current_context(HookKind::State, |context| {
        let ordinal = context.allocate_hook_index();
        let existing = context
            .slots()
            .borrow()
            .shared::<RefCell<T>>(ordinal, HookKind::State)?;
        let cell = match existing {
            Some(cell) => cell,
            None => {
                let cell = Rc::new(RefCell::new(init()));
                context
                    .slots()
                    .borrow_mut()
                    .insert(ordinal, HookSlot::State(Rc::clone(&cell) as _));
                cell
            }
        };
        let value = cell.borrow().clone();
        let setter = SetState {
            cell,
            owner: Rc::clone(context.owner()),
        };
        Ok((value, setter))
    })
}

/// [`use_state`] with an eagerly evaluated initial value.
pub fn use_state_value<T>(initial: T) -> Result<(T, SetState<T>), HookError>
where
    T: Clone + PartialEq + 'static,
{
    use_state(move || initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TestScheduler;
    use crate::{hooked, ClassComponent};
    use std::cell::Cell;

    #[test]
    fn initializer_runs_once() {
        let inits = Rc::new(Cell::new(0));
        let mut component = hooked("Lazy", {
            let inits = Rc::clone(&inits);
            move |_: &()| {
                let inits = Rc::clone(&inits);
                let (value, _) = use_state(move || {
                    inits.set(inits.get() + 1);
                    "ready".to_string()
                })?;
                Ok(value)
            }
        })
        .create(Rc::new(TestScheduler::default()));

        for _ in 0..3 {
            assert_eq!(component.render(&()).unwrap(), "ready");
        }
        assert_eq!(inits.get(), 1);
    }

    #[test]
    fn outside_updates_force_the_host_to_update() {
        let scheduler = Rc::new(TestScheduler::default());
        let captured: Rc<RefCell<Option<SetState<i32>>>> = Rc::default();
        let mut component = hooked("Clicker", {
            let captured = Rc::clone(&captured);
            move |_: &()| {
                let (clicks, set_clicks) = use_state_value(0)?;
                *captured.borrow_mut() = Some(set_clicks);
                Ok(clicks)
            }
        })
        .create(Rc::clone(&scheduler));

        assert_eq!(component.render(&()).unwrap(), 0);
        let set_clicks = captured.borrow().clone().expect("setter captured");

        set_clicks.set(0);
        assert_eq!(scheduler.requests(), 0);

        set_clicks.update(|clicks| clicks + 1);
        assert_eq!(scheduler.requests(), 1);
        assert_eq!(set_clicks.get(), 1);
        assert_eq!(component.render(&()).unwrap(), 1);
    }

    #[test]
    fn setters_from_one_slot_compare_equal() {
        let captured: Rc<RefCell<Vec<SetState<u8>>>> = Rc::default();
        let mut component = hooked("Stable", {
            let captured = Rc::clone(&captured);
            move |_: &()| {
                let (_, set) = use_state_value(1u8)?;
                captured.borrow_mut().push(set);
                Ok(())
            }
        })
        .create(Rc::new(TestScheduler::default()));

        component.render(&()).unwrap();
        component.render(&()).unwrap();
        let captured = captured.borrow();
        assert_eq!(captured[0], captured[1]);
    }

    #[test]
    fn use_state_outside_render_fails() {
        let err = use_state_value(1).unwrap_err();
        assert_eq!(
            err,
            HookError::OutsideRender {
                hook: HookKind::State
            }
        );
    }
}
