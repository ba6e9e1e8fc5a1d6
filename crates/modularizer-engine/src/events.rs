//! One-shot namespaced event bus
//!
//! Events are addressed as `<namespace>:<event>` on the wire. A bare namespace
//! addresses the wildcard slot `*`, which fires on any event in that namespace.
//! Listeners are removed the moment they fire.

use modularizer_core::{ModuleName, EVENT_SEPARATOR};
use std::collections::BTreeMap;

/// Event fired when a module definition has all of its dependencies.
pub const READY_EVENT: &str = "ready";

/// Fired after every resource file completes.
pub const PACKAGE_LOADED: &str = "PACKAGE:loaded";

pub const WILDCARD: &str = "*";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    Named(String),
    Any,
}

impl EventName {
    fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s == WILDCARD {
            Self::Any
        } else {
            Self::Named(s.to_string())
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Any => f.write_str(WILDCARD),
        }
    }
}

/// Structured form of `<namespace>:<event>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub namespace: String,
    pub event: EventName,
}

impl EventKey {
    /// Parse the wire form. `None` for an empty namespace.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (namespace, event) = match s.split_once(EVENT_SEPARATOR) {
            Some((ns, ev)) => (ns.trim(), EventName::parse(ev)),
            None => (s, EventName::Any),
        };
        if namespace.is_empty() {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            event,
        })
    }

    pub fn ready(name: &ModuleName) -> Self {
        Self {
            namespace: name.as_str().to_string(),
            event: EventName::Named(READY_EVENT.to_string()),
        }
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.namespace, EVENT_SEPARATOR, self.event)
    }
}

/// Registration table. Generic over the listener so the engine can store
/// closures that take it as an argument.
pub struct EventBus<L> {
    namespaces: BTreeMap<String, BTreeMap<EventName, Vec<L>>>,
}

impl<L> Default for EventBus<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> EventBus<L> {
    pub fn new() -> Self {
        Self {
            namespaces: BTreeMap::new(),
        }
    }

    /// Append a listener to the slot addressed by `key`.
    pub fn on(&mut self, key: EventKey, listener: L) {
        self.namespaces
            .entry(key.namespace)
            .or_default()
            .entry(key.event)
            .or_default()
            .push(listener);
    }

    /// Remove and return the listeners that a trigger of `key` fires:
    /// the exact slot first, then the namespace wildcard, each in
    /// registration order. Prunes the namespace when nothing remains.
    pub fn drain(&mut self, key: &EventKey) -> Vec<L> {
        let Some(slots) = self.namespaces.get_mut(&key.namespace) else {
            return Vec::new();
        };
        let mut fired = slots.remove(&key.event).unwrap_or_default();
        if key.event != EventName::Any {
            fired.extend(slots.remove(&EventName::Any).unwrap_or_default());
        }
        if slots.is_empty() {
            self.namespaces.remove(&key.namespace);
        }
        fired
    }

    /// Namespaces that still have listeners waiting on `event`.
    pub fn pending(&self, event: &str) -> Vec<String> {
        let event = EventName::parse(event);
        self.namespaces
            .iter()
            .filter(|(_, slots)| slots.get(&event).is_some_and(|l| !l.is_empty()))
            .map(|(ns, _)| ns.clone())
            .collect()
    }

    #[cfg(test)]
    fn listener_count(&self, key: &EventKey) -> usize {
        self.namespaces
            .get(&key.namespace)
            .and_then(|slots| slots.get(&key.event))
            .map_or(0, Vec::len)
    }

    #[cfg(test)]
    fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}
