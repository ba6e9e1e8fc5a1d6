//! Stall watchdog
//!
//! Every wait registered by `load` (re)arms a single deadline; progress on a
//! module pushes it out again, so only one stalled step is ever timed, never
//! the length of a whole chain. When the deadline passes with `ready`
//! listeners still pending, the engine fails with `Timeout`, optionally
//! narrowing the report down to the modules and resources actually blocking.

use crate::engine::Modularizer;
use crate::events::READY_EVENT;
use crate::registry::{DefinitionSlot, Registry};
use crate::resource::ResourceState;
use modularizer_core::{Error, ModuleName, Result};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

#[derive(Debug)]
pub struct Watchdog {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    timed: HashSet<ModuleName>,
}

impl Watchdog {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            deadline: None,
            timed: HashSet::new(),
        }
    }

    /// Arm for a full timeout on behalf of `name`.
    pub fn start(&mut self, name: &ModuleName) {
        let Some(timeout) = self.timeout else {
            return;
        };
        self.deadline = Some(Instant::now() + timeout);
        if self.timed.remove(name) {
            debug!("watchdog: {} already timed", name);
        } else {
            debug!("watchdog: timing {}", name);
            self.timed.insert(name.clone());
        }
    }

    /// `name` made progress; restart an armed timer if `name` is being timed.
    pub fn mark(&mut self, name: &ModuleName) {
        let (Some(timeout), Some(_)) = (self.timeout, self.deadline) else {
            return;
        };
        if self.timed.contains(name) {
            debug!("watchdog: {} progressed, extending", name);
            self.deadline = Some(Instant::now() + timeout);
        }
    }

    pub fn is_timed(&self, name: &ModuleName) -> bool {
        self.timed.contains(name)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
        self.timed.clear();
    }
}

impl Modularizer {
    /// Check the watchdog. A no-op until the deadline has passed; then the
    /// watchdog disarms and any pending `ready` wait that is not a strict-mode
    /// exception becomes a `Timeout` error.
    pub fn check_timeout(&self) -> Result<()> {
        if !self.inner.watchdog.borrow().expired(Instant::now()) {
            return Ok(());
        }
        self.inner.watchdog.borrow_mut().disarm();

        let strict = self.inner.config.strict;
        let invalid: Vec<ModuleName> = self
            .pending(READY_EVENT)
            .into_iter()
            .filter(|ns| !(strict && self.is_exception(ns)))
            .filter_map(|ns| ModuleName::new(ns).ok())
            .collect();
        if invalid.is_empty() {
            debug!("watchdog expired with nothing pending");
            return Ok(());
        }

        let message = if self.inner.config.diagnose {
            self.diagnose(&invalid)
        } else {
            format!(
                "modules never became ready: {}",
                invalid
                    .iter()
                    .map(ModuleName::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        error!("Modularizer timeout: {}", message);
        Err(Error::timeout(message))
    }

    /// Drive the watchdog on the tokio timer. Returns `Ok(())` once nothing
    /// is armed, or the `Timeout` error.
    pub async fn watch(&self) -> Result<()> {
        loop {
            let deadline = self.inner.watchdog.borrow().deadline();
            let Some(deadline) = deadline else {
                return Ok(());
            };
            tokio::time::sleep_until(deadline).await;
            self.check_timeout()?;
        }
    }

    pub fn watchdog_armed(&self) -> bool {
        self.inner.watchdog.borrow().is_armed()
    }

    /// Root causes for the given stuck names, deduplicated, joined by `; `.
    pub fn diagnose(&self, suspects: &[ModuleName]) -> String {
        let registry = self.inner.registry.borrow();
        let mut findings = Findings::default();
        for name in suspects {
            narrow(&registry, name, &[], &mut findings);
        }
        if findings.messages.is_empty() {
            return format!(
                "modules never became ready: {}",
                suspects
                    .iter()
                    .map(ModuleName::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        findings.messages.join("; ")
    }
}

#[derive(Default)]
struct Findings {
    seen: HashSet<String>,
    messages: Vec<String>,
}

impl Findings {
    fn add(&mut self, key: String, message: String) {
        if self.seen.insert(key) {
            self.messages.push(message);
        }
    }
}

fn narrow(registry: &Registry, name: &ModuleName, path: &[ModuleName], out: &mut Findings) {
    match registry.definitions.get(name) {
        Some(DefinitionSlot::Definition(def)) if !def.is_ready() => {
            let mut chain = path.to_vec();
            chain.push(name.clone());
            let mut blocked = false;
            for dep in def.dependencies() {
                if registry.is_known(dep.as_str()) {
                    continue;
                }
                blocked = true;
                if chain.contains(dep) {
                    let mut pair = [name.as_str(), dep.as_str()];
                    pair.sort_unstable();
                    out.add(
                        format!("cycle:{}:{}", pair[0], pair[1]),
                        format!("circular dependency between {} and {}", name, dep),
                    );
                } else {
                    narrow(registry, dep, &chain, out);
                }
            }
            if !blocked {
                out.add(
                    name.to_string(),
                    format!(
                        "{} is stalled: dependencies resolved but no completion signal",
                        name
                    ),
                );
            }
        }
        Some(DefinitionSlot::Definition(_)) => {}
        Some(DefinitionSlot::Resource(id)) => {
            let Some(resource) = registry.resource(*id) else {
                return;
            };
            let message = if resource.state == ResourceState::Loaded {
                format!(
                    "resource {} loaded but did not define {}",
                    resource.file_path, name
                )
            } else {
                format!(
                    "resource {} never loaded (needed for {})",
                    resource.file_path, name
                )
            };
            out.add(resource.file_path.clone(), message);
        }
        None => {
            if !registry.is_known(name.as_str()) {
                out.add(name.to_string(), format!("{} was never defined", name));
            }
        }
    }
}
