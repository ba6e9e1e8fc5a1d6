//! The engine handle
//!
//! `Modularizer` owns the definitions table, the instance cache, the event
//! bus and the watchdog. It is a cheap `Rc` handle: clones share state, and
//! independent engines never see each other. Single-threaded by construction.
//!
//! No `RefCell` borrow is held across a call into user code (factories,
//! listeners, continuations, the file loader), so all of them may reenter.

use crate::config::LoaderConfig;
use crate::events::{EventBus, EventKey};
use crate::loader::FileLoader;
use crate::registry::Registry;
use crate::watchdog::Watchdog;
use modularizer_core::{Error, ModuleName, Result};
use regex::Regex;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// A one-shot event listener. Receives the engine that fired it.
pub type Listener = Box<dyn FnOnce(&Modularizer) -> Result<()>>;

pub(crate) struct Inner {
    pub(crate) config: LoaderConfig,
    exceptions: Vec<Regex>,
    loader: RefCell<Option<Rc<dyn FileLoader>>>,
    pub(crate) registry: RefCell<Registry>,
    pub(crate) events: RefCell<EventBus<Listener>>,
    pub(crate) watchdog: RefCell<Watchdog>,
    /// Resolution path of the innermost factory currently executing.
    pub(crate) resolving: RefCell<Vec<ModuleName>>,
}

#[derive(Clone)]
pub struct Modularizer {
    pub(crate) inner: Rc<Inner>,
}

impl Modularizer {
    /// Build an engine. Fails with `InvalidArgument` on a malformed
    /// exception pattern.
    pub fn new(config: LoaderConfig) -> Result<Self> {
        let exceptions = config
            .exceptions
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    Error::invalid_argument(format!("invalid exception pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let watchdog = Watchdog::new(config.timeout());
        Ok(Self {
            inner: Rc::new(Inner {
                config,
                exceptions,
                loader: RefCell::new(None),
                registry: RefCell::new(Registry::default()),
                events: RefCell::new(EventBus::new()),
                watchdog: RefCell::new(watchdog),
                resolving: RefCell::new(Vec::new()),
            }),
        })
    }

    pub fn with_loader<L: FileLoader + 'static>(self, loader: L) -> Self {
        self.set_loader(loader);
        self
    }

    /// Install or replace the file loader.
    pub fn set_loader<L: FileLoader + 'static>(&self, loader: L) {
        *self.inner.loader.borrow_mut() = Some(Rc::new(loader));
    }

    pub fn has_loader(&self) -> bool {
        self.inner.loader.borrow().is_some()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Whether two handles point at the same engine.
    pub fn ptr_eq(a: &Modularizer, b: &Modularizer) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn loader(&self) -> Option<Rc<dyn FileLoader>> {
        self.inner.loader.borrow().clone()
    }

    /// Names matching a configured exception stay lenient in strict mode.
    pub(crate) fn is_exception(&self, name: &str) -> bool {
        self.inner.exceptions.iter().any(|re| re.is_match(name))
    }

    /// Register a one-shot listener on `<namespace>:<event>` (or a bare
    /// namespace for every event in it). Empty event names are ignored.
    pub fn on<F>(&self, event: &str, listener: F)
    where
        F: FnOnce(&Modularizer) -> Result<()> + 'static,
    {
        match EventKey::parse(event) {
            Some(key) => self.on_key(key, Box::new(listener)),
            None => warn!("Modularizer.on: invalid event name '{}' ignored", event),
        }
    }

    /// Fire `event`. Every drained listener runs; the first error is returned.
    pub fn trigger(&self, event: &str) -> Result<()> {
        match EventKey::parse(event) {
            Some(key) => self.trigger_key(&key),
            None => {
                warn!("Modularizer.trigger: invalid event name '{}' ignored", event);
                Ok(())
            }
        }
    }

    pub(crate) fn on_key(&self, key: EventKey, listener: Listener) {
        debug!("listening on {}", key);
        self.inner.events.borrow_mut().on(key, listener);
    }

    pub(crate) fn trigger_key(&self, key: &EventKey) -> Result<()> {
        let listeners = self.inner.events.borrow_mut().drain(key);
        if listeners.is_empty() {
            return Ok(());
        }
        debug!("{} fired ({} listeners)", key, listeners.len());
        let mut first_err = None;
        for listener in listeners {
            if let Err(e) = listener(self) {
                if first_err.is_none() {
                    first_err = Some(e);
                } else {
                    warn!("additional listener error on {}: {}", key, e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Namespaces with listeners still waiting on `event`.
    pub fn pending(&self, event: &str) -> Vec<String> {
        self.inner.events.borrow().pending(event)
    }
}

impl std::fmt::Debug for Modularizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Modularizer");
        if let Ok(registry) = self.inner.registry.try_borrow() {
            s.field("definitions", &registry.definitions.len())
                .field("instances", &registry.instances.len())
                .field("resources", &registry.resources.len());
        }
        s.field("has_loader", &self.has_loader()).finish()
    }
}
