//! `nodes` crate — the closed set of step kinds and node lifecycle states.
//!
//! Every node on a canvas is one of the [`StepType`] variants.  Styling is a
//! table lookup on the variant ([`StepType::style`]); nothing downstream
//! inspects type names at runtime.

pub mod kind;
pub mod status;

pub use kind::{StepStyle, StepType};
pub use status::NodeStatus;
