//! Resources: loadable files that define one or more modules
//!
//! A resource moves `Registered → Loading → Loaded`. Before its own file is
//! fetched, every module it needs from other resources must be known. Factories
//! declared with `defines_*` are held back and replayed through `define` once
//! the file completes.

use crate::engine::Modularizer;
use crate::events::PACKAGE_LOADED;
use crate::loader::Completion;
use crate::orchestrator::Continuation;
use crate::registry::{DefinitionSlot, Factory};
use modularizer_core::{Error, Instance, ModuleName, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Index of a resource within the engine that registered it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(pub(crate) usize);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Registered,
    Loading,
    Loaded,
}

pub(crate) struct Deferred {
    prerequisites: Vec<ModuleName>,
    factory: Factory,
}

pub(crate) struct ResourceEntry {
    pub(crate) file_path: String,
    /// Declared modules, in declaration order.
    pub(crate) modules: Vec<ModuleName>,
    /// Modules this file needs from other resources.
    pub(crate) prerequisites: Vec<ModuleName>,
    pub(crate) state: ResourceState,
    deferred: HashMap<ModuleName, Deferred>,
}

impl ResourceEntry {
    fn new(file_path: String) -> Self {
        Self {
            file_path,
            modules: Vec::new(),
            prerequisites: Vec::new(),
            state: ResourceState::Registered,
            deferred: HashMap::new(),
        }
    }

    /// Deferred factories in declaration order, removed from the entry.
    fn take_deferred(&mut self) -> Vec<(ModuleName, Deferred)> {
        let mut out = Vec::with_capacity(self.deferred.len());
        for name in &self.modules {
            if let Some(d) = self.deferred.remove(name) {
                out.push((name.clone(), d));
            }
        }
        out
    }
}

/// Chainable handle to a registered resource.
#[derive(Clone)]
pub struct Resource {
    engine: Modularizer,
    id: ResourceId,
}

impl Resource {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn file_path(&self) -> String {
        self.with_entry(|e| e.file_path.clone())
    }

    pub fn modules(&self) -> Vec<ModuleName> {
        self.with_entry(|e| e.modules.clone())
    }

    /// Cross-file prerequisites accumulated so far.
    pub fn prerequisites(&self) -> Vec<ModuleName> {
        self.with_entry(|e| e.prerequisites.clone())
    }

    pub fn state(&self) -> ResourceState {
        self.with_entry(|e| e.state)
    }

    pub fn is_loading(&self) -> bool {
        self.state() == ResourceState::Loading
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == ResourceState::Loaded
    }

    /// Whether `name` was declared in this resource.
    pub fn should_define(&self, name: &str) -> bool {
        self.with_entry(|e| e.modules.iter().any(|m| m.as_str() == name))
    }

    /// Declare that the file defines `name` itself when it runs.
    pub fn defines(&self, name: &str) -> Result<&Self> {
        self.defines_with(name, &[], None)
    }

    /// Declare `name` with a factory that takes no prerequisites.
    pub fn defines_fn<F>(&self, name: &str, factory: F) -> Result<&Self>
    where
        F: Fn(&Modularizer, &[Instance]) -> Result<Instance> + 'static,
    {
        self.defines_with(name, &[], Some(Factory::new(factory)))
    }

    /// Declare `name` with prerequisites and a factory replayed once the
    /// file has loaded. Prerequisites without a factory are rejected, and so
    /// is any prerequisite that no registered resource declares.
    pub fn defines_with(
        &self,
        name: &str,
        prerequisites: &[&str],
        factory: Option<Factory>,
    ) -> Result<&Self> {
        let name = ModuleName::new(name)?;
        if !prerequisites.is_empty() && factory.is_none() {
            return Err(Error::invalid_definition(format!(
                "module '{}' lists prerequisites but no factory",
                name
            )));
        }
        let prerequisites = prerequisites
            .iter()
            .map(|p| ModuleName::new(*p))
            .collect::<Result<Vec<_>>>()?;

        let mut registry = self.engine.inner.registry.borrow_mut();
        let own = registry
            .resource(self.id)
            .map(|e| e.modules.clone())
            .unwrap_or_default();
        let cross: Vec<ModuleName> = prerequisites
            .iter()
            .filter(|p| !own.contains(p))
            .cloned()
            .collect();
        for p in &cross {
            if registry.resource_for_module(p.as_str()).is_none() {
                return Err(Error::invalid_definition(format!(
                    "prerequisite specified for an unknown module: '{}' (required by '{}')",
                    p, name
                )));
            }
        }

        let Some(entry) = registry.resource_mut(self.id) else {
            return Err(Error::invalid_state(format!("resource {} is gone", self.id)));
        };
        if !entry.modules.contains(&name) {
            entry.modules.push(name.clone());
        }
        for p in cross {
            if !entry.prerequisites.contains(&p) {
                entry.prerequisites.push(p);
            }
        }
        if let Some(factory) = factory {
            entry.deferred.insert(
                name.clone(),
                Deferred {
                    prerequisites,
                    factory,
                },
            );
        }
        debug!("{} declared in {}", name, entry.file_path);
        registry
            .definitions
            .insert(name, DefinitionSlot::Resource(self.id));
        drop(registry);
        Ok(self)
    }

    /// Start loading this resource. Idempotent.
    pub fn load(&self) -> Result<()> {
        self.engine.load_resource(self.id)
    }

    fn with_entry<T>(&self, f: impl FnOnce(&ResourceEntry) -> T) -> T {
        let registry = self.engine.inner.registry.borrow();
        match registry.resource(self.id) {
            Some(entry) => f(entry),
            None => unreachable!("resource handles are only created for registered resources"),
        }
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("id", &self.id).finish()
    }
}

impl Modularizer {
    /// Register a file that will define one or more modules.
    pub fn register(&self, file_path: impl Into<String>) -> Resource {
        let file_path = file_path.into();
        let mut registry = self.inner.registry.borrow_mut();
        let id = ResourceId(registry.resources.len());
        debug!("registered {} as {}", file_path, id);
        registry.resources.push(ResourceEntry::new(file_path));
        Resource {
            engine: self.clone(),
            id,
        }
    }

    /// Handle for the first registered resource declaring `name`.
    pub fn resource_for_module(&self, name: &str) -> Option<Resource> {
        let id = self.inner.registry.borrow().resource_for_module(name)?;
        Some(Resource {
            engine: self.clone(),
            id,
        })
    }

    pub fn resources(&self) -> Vec<Resource> {
        let count = self.inner.registry.borrow().resources.len();
        (0..count)
            .map(|i| Resource {
                engine: self.clone(),
                id: ResourceId(i),
            })
            .collect()
    }

    pub(crate) fn load_resource(&self, id: ResourceId) -> Result<()> {
        let prerequisites = {
            let mut registry = self.inner.registry.borrow_mut();
            let Some(entry) = registry.resource_mut(id) else {
                return Err(Error::invalid_state(format!("unknown resource {}", id)));
            };
            if entry.state != ResourceState::Registered {
                return Ok(());
            }
            entry.state = ResourceState::Loading;
            entry.prerequisites.clone()
        };

        if !prerequisites.is_empty() && !self.knows_all(&prerequisites) {
            debug!("resource {} waiting on {} prerequisites", id, prerequisites.len());
            self.load_names(prerequisites, Continuation::Fetch(id))?;
            return Ok(());
        }
        self.fetch_file(id)
    }

    pub(crate) fn fetch_file(&self, id: ResourceId) -> Result<()> {
        let Some(loader) = self.loader() else {
            warn!("no loader configured, resource {} not fetched", id);
            return Ok(());
        };
        let file_path = match self.inner.registry.borrow().resource(id) {
            Some(entry) => entry.file_path.clone(),
            None => return Err(Error::invalid_state(format!("unknown resource {}", id))),
        };
        let path = self.inner.config.resolve_path(&file_path);
        info!("fetching {}", path);
        loader.fetch(&path, Completion::new(self.clone(), id, path.clone()))
    }

    pub(crate) fn finish_resource(&self, id: ResourceId) -> Result<()> {
        let (file_path, deferred) = {
            let mut registry = self.inner.registry.borrow_mut();
            let Some(entry) = registry.resource_mut(id) else {
                return Err(Error::invalid_state(format!("unknown resource {}", id)));
            };
            entry.state = ResourceState::Loaded;
            (entry.file_path.clone(), entry.take_deferred())
        };
        info!("loaded {} ({} deferred definitions)", file_path, deferred.len());
        let mut first_err = None;
        for (name, d) in deferred {
            if let Err(e) = self.define_module(name.clone(), d.prerequisites, d.factory) {
                warn!("defining {} from {} failed: {}", name, file_path, e);
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.trigger(PACKAGE_LOADED) {
            first_err.get_or_insert(e);
        }
        first_err.map_or(Ok(()), Err)
    }
}
