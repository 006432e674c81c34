use std::any::{type_name, Any};
use std::rc::Rc;

use crate::effect::EffectSlot;
use crate::{HookError, HookKind};

pub(crate) enum HookSlot {
    State(Rc<dyn Any>),
    Ref(Rc<dyn Any>),
    Effect(EffectSlot),
}

impl HookSlot {
    fn kind(&self) -> HookKind {
        match self {
            HookSlot::State(_) => HookKind::State,
            HookSlot::Ref(_) => HookKind::Ref,
            HookSlot::Effect(_) => HookKind::Effect,
        }
    }
}

/// Per-instance hook storage. The slot for ordinal `n` lives at index `n`.
///
/// The table is settled once a render pass over it has completed; from then
/// on every pass must call exactly `len()` hooks.
#[derive(Default)]
pub(crate) struct SlotTable {
    slots: Vec<HookSlot>,
    settled: bool,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.settled
    }

    pub(crate) fn settle(&mut self) {
        self.settled = true;
    }

    /// Detaches the slots allocated past `len`. The caller drops them once
    /// the table is no longer borrowed.
    pub(crate) fn truncate(&mut self, len: usize) -> Vec<HookSlot> {
        if len >= self.slots.len() {
            return Vec::new();
        }
        self.slots.split_off(len)
    }

    fn checked(&self, ordinal: usize, kind: HookKind) -> Result<Option<&HookSlot>, HookError> {
        match self.slots.get(ordinal) {
            Some(slot) if slot.kind() != kind => Err(HookError::OrderViolation {
                ordinal,
                expected: slot.kind(),
                found: kind,
            }),
            other => Ok(other),
        }
    }

    /// Looks up the shared payload of a state or ref slot.
    ///
    /// `Ok(None)` means the ordinal has not been allocated yet.
    pub(crate) fn shared<T: 'static>(
        &self,
        ordinal: usize,
        kind: HookKind,
    ) -> Result<Option<Rc<T>>, HookError> {
        let payload = match self.checked(ordinal, kind)? {
            Some(HookSlot::State(payload)) | Some(HookSlot::Ref(payload)) => payload,
            Some(HookSlot::Effect(_)) | None => return Ok(None),
        };
        Rc::clone(payload)
            .downcast::<T>()
            .map(Some)
            .map_err(|_| HookError::SlotTypeMismatch {
                ordinal,
                kind,
                requested: type_name::<T>(),
            })
    }

    pub(crate) fn insert(&mut self, ordinal: usize, slot: HookSlot) {
        // Ordinals are handed out sequentially from zero on every pass.
        debug_assert_eq!(ordinal, self.slots.len());
        self.slots.push(slot);
    }

    /// Returns the effect slot at `ordinal`, or `Ok(None)` if it is unallocated.
    pub(crate) fn effect_mut(&mut self, ordinal: usize) -> Result<Option<&mut EffectSlot>, HookError> {
        self.checked(ordinal, HookKind::Effect)?;
        Ok(self.effect_at(ordinal))
    }

    pub(crate) fn has_pending_effects(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| matches!(slot, HookSlot::Effect(effect) if effect.is_pending()))
    }

    /// Effect slot at `ordinal`, ignoring slots of any other kind.
    pub(crate) fn effect_at(&mut self, ordinal: usize) -> Option<&mut EffectSlot> {
        match self.slots.get_mut(ordinal) {
            Some(HookSlot::Effect(effect)) => Some(effect),
            _ => None,
        }
    }
}
