//! modularizer: manifests and offline planning on top of the engine.

pub mod manifest;
pub mod plan;

pub use manifest::{InstantiationLog, Manifest, ModuleSpec, ResourceSpec};
pub use plan::{check, plan, Plan};
