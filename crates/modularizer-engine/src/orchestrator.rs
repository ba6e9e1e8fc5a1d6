//! Load orchestration: `define`, `load`, `require`
//!
//! `load` sorts requested names into known (skipped), waiting, and waiting
//! plus fetch. One countdown gate per call listens on `<name>:ready` for each
//! waited name and releases its [`Continuation`] when the count hits zero.

use crate::engine::Modularizer;
use crate::events::EventKey;
use crate::registry::{DefinitionSlot, Factory, ModuleDefinition};
use crate::resource::{ResourceId, ResourceState};
use modularizer_core::{Error, Instance, IntoModuleNames, ModuleName, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};

pub type LoadCallback = Box<dyn FnOnce(&Modularizer) -> Result<()>>;
pub type RequireCallback = Box<dyn FnOnce(&Modularizer, &[Instance]) -> Result<()>>;

/// What to do once a gate opens.
pub enum Continuation {
    /// All dependencies of `name` are known: mark the definition ready.
    Ready {
        name: ModuleName,
        definition: Rc<ModuleDefinition>,
    },
    /// Resolve `names` in order and hand them to `callback`.
    Deliver {
        names: Vec<ModuleName>,
        callback: RequireCallback,
    },
    /// Cross-file prerequisites are known: fetch the resource's own file.
    Fetch(ResourceId),
    Callback(LoadCallback),
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready { name, .. } => write!(f, "Ready({})", name),
            Self::Deliver { names, .. } => write!(f, "Deliver({} names)", names.len()),
            Self::Fetch(id) => write!(f, "Fetch({})", id),
            Self::Callback(_) => write!(f, "Callback"),
        }
    }
}

struct Gate {
    remaining: Cell<usize>,
    continuation: RefCell<Option<Continuation>>,
}

impl Gate {
    fn release(&self, engine: &Modularizer) -> Result<()> {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        if left > 0 {
            return Ok(());
        }
        let cont = self.continuation.borrow_mut().take();
        match cont {
            Some(cont) => engine.resume(cont),
            None => Ok(()),
        }
    }
}

impl Modularizer {
    /// Define `name` with no dependencies. Ready immediately.
    pub fn define<F>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&Modularizer, &[Instance]) -> Result<Instance> + 'static,
    {
        self.define_with(name, &[], factory)
    }

    /// Define `name`. Its factory receives the dependency instances in the
    /// order given. Unknown dependencies are loaded; `<name>:ready` fires once
    /// all of them are known.
    pub fn define_with<F>(&self, name: &str, dependencies: &[&str], factory: F) -> Result<()>
    where
        F: Fn(&Modularizer, &[Instance]) -> Result<Instance> + 'static,
    {
        let name = ModuleName::new(name)?;
        let dependencies = dependencies
            .iter()
            .map(|d| ModuleName::new(*d))
            .collect::<Result<Vec<_>>>()?;
        self.define_module(name, dependencies, Factory::new(factory))
    }

    pub(crate) fn define_module(
        &self,
        name: ModuleName,
        dependencies: Vec<ModuleName>,
        factory: Factory,
    ) -> Result<()> {
        let definition = Rc::new(ModuleDefinition::new(factory, dependencies.clone()));
        self.inner
            .registry
            .borrow_mut()
            .definitions
            .insert(name.clone(), DefinitionSlot::Definition(definition.clone()));
        debug!("defined {} ({} dependencies)", name, dependencies.len());

        if !dependencies.is_empty() && !self.knows_all(&dependencies) {
            self.load_names(dependencies, Continuation::Ready { name, definition })?;
            return Ok(());
        }
        definition.mark_ready();
        self.inner.watchdog.borrow_mut().mark(&name);
        self.trigger_key(&EventKey::ready(&name))
    }

    /// Make `names` known, then run `callback`. Runs synchronously when
    /// nothing needs waiting for. `Ok(false)` when no loader is configured.
    pub fn load<F>(&self, names: impl IntoModuleNames, callback: F) -> Result<bool>
    where
        F: FnOnce(&Modularizer) -> Result<()> + 'static,
    {
        let names = names.into_module_names()?;
        self.load_names(names, Continuation::Callback(Box::new(callback)))
    }

    pub(crate) fn load_names(&self, names: Vec<ModuleName>, cont: Continuation) -> Result<bool> {
        if !self.has_loader() {
            warn!(
                "Modularizer.load: no loader specified, can't load {}",
                join(&names)
            );
            return Ok(false);
        }

        let mut waiting: Vec<ModuleName> = Vec::new();
        let mut fetch: Vec<ResourceId> = Vec::new();
        {
            let registry = self.inner.registry.borrow();
            for name in &names {
                if registry.is_known(name.as_str()) {
                    continue;
                }
                match registry.definitions.get(name) {
                    None => {
                        if self.inner.config.strict && !self.is_exception(name.as_str()) {
                            return Err(Error::invalid_state(format!(
                                "no resource defined for module {}",
                                name
                            )));
                        }
                        if self.inner.config.timeout().is_none() {
                            warn!("waiting on undefined module {} with no watchdog armed", name);
                        }
                    }
                    Some(DefinitionSlot::Resource(id)) => {
                        let registered = registry
                            .resource(*id)
                            .is_some_and(|r| r.state == ResourceState::Registered);
                        if registered && !fetch.contains(id) {
                            fetch.push(*id);
                        }
                    }
                    Some(DefinitionSlot::Definition(_)) => {}
                }
                waiting.push(name.clone());
            }
        }

        if waiting.is_empty() {
            self.resume(cont)?;
            return Ok(true);
        }

        debug!("{:?} waiting on {}", cont, join(&waiting));
        let gate = Rc::new(Gate {
            remaining: Cell::new(waiting.len()),
            continuation: RefCell::new(Some(cont)),
        });
        for name in &waiting {
            let gate = gate.clone();
            self.on_key(
                EventKey::ready(name),
                Box::new(move |engine: &Modularizer| gate.release(engine)),
            );
        }
        {
            let mut watchdog = self.inner.watchdog.borrow_mut();
            for name in &waiting {
                watchdog.start(name);
            }
        }
        for id in fetch {
            self.load_resource(id)?;
        }
        Ok(true)
    }

    /// Resolve `names` and pass the instances to `callback`, in order.
    ///
    /// Returns `Some(instances)` when everything was already known and the
    /// callback ran synchronously, `None` when delivery waits on a load.
    pub fn require<F>(&self, names: impl IntoModuleNames, callback: F) -> Result<Option<Vec<Instance>>>
    where
        F: FnOnce(&Modularizer, &[Instance]) -> Result<()> + 'static,
    {
        self.require_with(names, callback, false)
    }

    /// Like [`require`](Self::require) but fails with `InvalidState` instead
    /// of waiting.
    pub fn require_sync<F>(&self, names: impl IntoModuleNames, callback: F) -> Result<Vec<Instance>>
    where
        F: FnOnce(&Modularizer, &[Instance]) -> Result<()> + 'static,
    {
        match self.require_with(names, callback, true)? {
            Some(instances) => Ok(instances),
            None => Err(Error::invalid_state("synchronous require did not deliver")),
        }
    }

    pub fn require_with<F>(
        &self,
        names: impl IntoModuleNames,
        callback: F,
        synchronous: bool,
    ) -> Result<Option<Vec<Instance>>>
    where
        F: FnOnce(&Modularizer, &[Instance]) -> Result<()> + 'static,
    {
        let names = names.into_module_names()?;
        debug!("require {}", join(&names));
        if self.knows_all(&names) {
            return self.deliver(&names, Box::new(callback)).map(Some);
        }
        if synchronous {
            return Err(Error::invalid_state(format!(
                "{} requested synchronously but not yet loaded",
                join(&names)
            )));
        }
        let callback: RequireCallback = Box::new(callback);
        self.load_names(names.clone(), Continuation::Deliver { names, callback })?;
        Ok(None)
    }

    fn deliver(&self, names: &[ModuleName], callback: RequireCallback) -> Result<Vec<Instance>> {
        let path = self.inner.resolving.borrow().clone();
        let instances = names
            .iter()
            .map(|n| self.resolve(n, &path))
            .collect::<Result<Vec<_>>>()?;
        callback(self, &instances)?;
        Ok(instances)
    }

    pub(crate) fn resume(&self, cont: Continuation) -> Result<()> {
        match cont {
            Continuation::Ready { name, definition } => {
                definition.mark_ready();
                self.inner.watchdog.borrow_mut().mark(&name);
                self.trigger_key(&EventKey::ready(&name))
            }
            Continuation::Deliver { names, callback } => self.deliver(&names, callback).map(|_| ()),
            Continuation::Fetch(id) => self.fetch_file(id),
            Continuation::Callback(callback) => callback(self),
        }
    }
}

fn join(names: &[ModuleName]) -> String {
    names
        .iter()
        .map(ModuleName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
