use std::fmt;

use thiserror::Error;

use crate::InstanceId;

/// Discriminant of a hook slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    State,
    Ref,
    Effect,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::State => "use_state",
            HookKind::Ref => "use_ref",
            HookKind::Effect => "use_effect",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fatal misuse of the hooks runtime.
///
/// None of these are recoverable inside the runtime: they are returned to the
/// host after the render context has been unbound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("{hook} called outside of a hooked component render")]
    OutsideRender { hook: HookKind },

    #[error("hook called out of order: slot {ordinal} holds {expected}, got {found}")]
    OrderViolation {
        ordinal: usize,
        expected: HookKind,
        found: HookKind,
    },

    #[error("hook called out of order: slot {ordinal} ({kind}) does not hold a `{requested}`")]
    SlotTypeMismatch {
        ordinal: usize,
        kind: HookKind,
        requested: &'static str,
    },

    #[error("{component} rendered {found} hooks, expected {expected}")]
    HookCountMismatch {
        component: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("cannot render component {requested} while component {active} is rendering")]
    NestedRender {
        active: InstanceId,
        requested: InstanceId,
    },

    #[error("render context for component {requested} was torn down while bound to {}", DisplayBound(.bound))]
    TeardownMismatch {
        bound: Option<InstanceId>,
        requested: InstanceId,
    },

    #[error("{component} did not settle after {passes} render passes")]
    RenderLoopLimit {
        component: &'static str,
        passes: usize,
    },
}

struct DisplayBound<'a>(&'a Option<InstanceId>);

impl fmt::Display for DisplayBound<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str("nothing"),
        }
    }
}
