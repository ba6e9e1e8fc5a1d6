//! Modularizer Engine - lazy module resolution and load orchestration
//!
//! Components, leaves first:
//! - events: one-shot `<name>:<event>` publish/subscribe
//! - registry: definitions table, instance cache, cycle-checked instantiation
//! - resource: files that define modules, with cross-file prerequisites
//! - orchestrator: `define` / `load` / `require` and countdown gates
//! - watchdog: stall detection with root-cause narrowing

pub mod config;
pub mod engine;
pub mod events;
pub mod loader;
pub mod orchestrator;
pub mod registry;
pub mod resource;
pub mod watchdog;

pub use config::LoaderConfig;
pub use engine::{Listener, Modularizer};
pub use events::{EventBus, EventKey, EventName, PACKAGE_LOADED, READY_EVENT};
pub use loader::{Completion, FileLoader, QueuedLoader};
pub use orchestrator::Continuation;
pub use registry::{Factory, ModuleDefinition, SlotKind, SELF_MODULE};
pub use resource::{Resource, ResourceId, ResourceState};
pub use watchdog::Watchdog;

pub use modularizer_core::{Error, ErrorKind, Instance, IntoModuleNames, ModuleName, Result};
