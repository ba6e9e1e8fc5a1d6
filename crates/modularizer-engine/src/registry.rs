//! Module registry: definitions, instances, and lazy instantiation
//!
//! A name occupies exactly one slot of the definitions table at a time,
//! either bound to a [`Resource`](crate::resource::Resource) that has not
//! defined it yet or to a [`ModuleDefinition`]. Instantiation moves the
//! value into the instance cache and drops the slot, so no factory runs twice.

use crate::engine::Modularizer;
use crate::resource::{ResourceEntry, ResourceId};
use modularizer_core::{Error, Instance, IntoModuleNames, ModuleName, Result};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Built-in provider that resolves to the engine itself.
pub const SELF_MODULE: &str = "~";

pub(crate) fn is_builtin(name: &str) -> bool {
    name == SELF_MODULE
}

type FactoryFn = dyn Fn(&Modularizer, &[Instance]) -> Result<Instance>;

/// Builds a module's value from its resolved dependencies, in declared order.
#[derive(Clone)]
pub struct Factory(Rc<FactoryFn>);

impl Factory {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Modularizer, &[Instance]) -> Result<Instance> + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, engine: &Modularizer, deps: &[Instance]) -> Result<Instance> {
        (self.0)(engine, deps)
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Factory")
    }
}

/// How to build a module, prior to realization.
#[derive(Debug)]
pub struct ModuleDefinition {
    factory: Factory,
    dependencies: Vec<ModuleName>,
    ready: Cell<bool>,
}

impl ModuleDefinition {
    pub(crate) fn new(factory: Factory, dependencies: Vec<ModuleName>) -> Self {
        Self {
            factory,
            dependencies,
            ready: Cell::new(false),
        }
    }

    pub fn dependencies(&self) -> &[ModuleName] {
        &self.dependencies
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    pub(crate) fn mark_ready(&self) {
        self.ready.set(true);
    }
}

pub(crate) enum DefinitionSlot {
    Resource(ResourceId),
    Definition(Rc<ModuleDefinition>),
}

/// Public view of what currently occupies a name's slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Resource(ResourceId),
    Definition { ready: bool },
}

#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) definitions: HashMap<ModuleName, DefinitionSlot>,
    pub(crate) instances: HashMap<ModuleName, Instance>,
    pub(crate) resources: Vec<ResourceEntry>,
}

impl Registry {
    /// Known: instantiated, defined and ready, or built in; never while the
    /// slot is still bound to a resource or holds an unready definition.
    pub(crate) fn is_known(&self, name: &str) -> bool {
        let present = self.instances.contains_key(name)
            || self.definitions.contains_key(name)
            || is_builtin(name);
        if !present {
            return false;
        }
        match self.definitions.get(name) {
            Some(DefinitionSlot::Resource(_)) => false,
            Some(DefinitionSlot::Definition(def)) => def.is_ready(),
            None => true,
        }
    }

    /// First registered resource that declares `name`.
    pub(crate) fn resource_for_module(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .position(|r| r.modules.iter().any(|m| m.as_str() == name))
            .map(ResourceId)
    }

    pub(crate) fn resource(&self, id: ResourceId) -> Option<&ResourceEntry> {
        self.resources.get(id.0)
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> Option<&mut ResourceEntry> {
        self.resources.get_mut(id.0)
    }
}

impl Modularizer {
    /// True iff every name is known. Empty or invalid input is never known.
    pub fn knows(&self, names: impl IntoModuleNames) -> bool {
        match names.into_module_names() {
            Ok(names) => self.knows_all(&names),
            Err(_) => false,
        }
    }

    pub(crate) fn knows_all(&self, names: &[ModuleName]) -> bool {
        let registry = self.inner.registry.borrow();
        !names.is_empty() && names.iter().all(|n| registry.is_known(n.as_str()))
    }

    /// Realize `name`, instantiating it and its dependencies on first use.
    ///
    /// Names without a definition or instance yield [`Instance::unresolved`].
    /// A factory that reenters the engine and asks for a module already on
    /// the current resolution path fails with `CircularDependency`.
    pub fn fetch_resource(&self, name: &str) -> Result<Instance> {
        let name = ModuleName::new(name)?;
        let path = self.inner.resolving.borrow().clone();
        self.resolve(&name, &path)
    }

    pub(crate) fn resolve(&self, name: &ModuleName, path: &[ModuleName]) -> Result<Instance> {
        if path.contains(name) {
            return Err(Error::circular(
                path.iter().chain(std::iter::once(name)).map(ModuleName::to_string),
            ));
        }
        let mut chain = path.to_vec();
        chain.push(name.clone());

        let definition = match self.inner.registry.borrow().definitions.get(name) {
            Some(DefinitionSlot::Definition(def)) => Some(def.clone()),
            _ => None,
        };

        if let Some(definition) = definition {
            debug!("instantiating {}", name);
            let mut deps = Vec::with_capacity(definition.dependencies.len());
            for dep in &definition.dependencies {
                deps.push(self.resolve(dep, &chain)?);
            }

            let previous = self.inner.resolving.replace(chain);
            let value = definition.factory.call(self, &deps);
            *self.inner.resolving.borrow_mut() = previous;
            let value = value?;

            let mut registry = self.inner.registry.borrow_mut();
            registry.instances.insert(name.clone(), value);
            registry.definitions.remove(name);
        }

        if let Some(instance) = self.inner.registry.borrow().instances.get(name) {
            return Ok(instance.clone());
        }
        if is_builtin(name.as_str()) {
            return Ok(Instance::new(self.clone()));
        }
        debug!("{} requested but never defined", name);
        Ok(Instance::unresolved())
    }

    /// Whether `name` has been instantiated.
    pub fn has_instance(&self, name: &str) -> bool {
        self.inner.registry.borrow().instances.contains_key(name)
    }

    /// What currently occupies `name`'s slot in the definitions table.
    pub fn slot(&self, name: &str) -> Option<SlotKind> {
        match self.inner.registry.borrow().definitions.get(name)? {
            DefinitionSlot::Resource(id) => Some(SlotKind::Resource(*id)),
            DefinitionSlot::Definition(def) => Some(SlotKind::Definition {
                ready: def.is_ready(),
            }),
        }
    }
}
