//! Effect stack evaluation.
//!
//! An [`EffectStack`] is an ordered list of [`EffectSpec`]s. Evaluation looks every enabled spec
//! up in an [`EffectRegistry`] and applies the registered pure transform to the output of the
//! previous one.

pub(crate) mod blur;
pub(crate) mod color;
pub(crate) mod edges;
pub(crate) mod geometry;
pub(crate) mod overlay;
/// Typed parameter access.
pub mod params;
/// Effect kind table.
pub mod registry;
/// Effect specs and stacks.
pub mod spec;

pub use params::EffectParams;
pub use registry::{EffectOp, EffectRegistry};
pub use spec::{EffectKind, EffectSpec, EffectStack, Evaluated, ParamValue};
