#![doc = r"Hooks runtime for class-based component hosts: per-instance state, refs and effects addressed by call order."]

mod component;
pub mod context;
mod effect;
mod error;
mod hook_ref;
pub mod platform;
mod slots;
mod state;

pub use component::{hooked, ClassComponent, Hooked, HookedClass, HookedOptions, InstanceId};
pub use context::{is_rendering, is_rendering_target, with_current_context, RenderContext};
pub use effect::{use_effect, ByPtr, Deps, EffectCleanup};
pub use error::{HookError, HookKind};
pub use hook_ref::{use_ref, HookRef};
pub use platform::UpdateScheduler;
pub use state::{use_state, use_state_value, SetState};
