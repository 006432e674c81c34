use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::context::with_current_context;
use crate::slots::HookSlot;
use crate::{HookError, HookKind};

/// Mutable box that survives renders without triggering them.
///
/// Every render of the same instance gets a handle to the same box.
pub struct HookRef<T> {
    cell: Rc<RefCell<T>>,
}

impl<T> HookRef<T> {
    pub fn set(&self, value: T) {
        *self.cell.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.cell.replace(value)
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.cell.borrow_mut())
    }

    /// Whether both handles point at the same box.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone> HookRef<T> {
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }
}

impl<T> Clone for HookRef<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> PartialEq for HookRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for HookRef<T> {}

impl<T: fmt::Debug> fmt::Debug for HookRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookRef").field(&*self.cell.borrow()).finish()
    }
}

/// A [`HookRef`] holding `initial` on first render.
///
/// Later renders ignore `initial` and return the same box. Writing to it never
/// schedules a render.
pub fn use_ref<T: 'static>(initial: T) -> Result<HookRef<T>, HookError> {
    with_current_context(HookKind::Ref, |context| {
        let ordinal = context.allocate_hook_index();
        let mut slots = context.slots().borrow_mut();
        let cell = match slots.shared::<RefCell<T>>(ordinal, HookKind::Ref)? {
            Some(cell) => cell,
            None => {
                let cell = Rc::new(RefCell::new(initial));
                slots.insert(ordinal, HookSlot::Ref(Rc::clone(&cell) as _));
                cell
            }
        };
        Ok(HookRef { cell })
    })
}
