//! Core types for Modularizer

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::borrow::Borrow;
use std::rc::Rc;
use std::sync::Arc;

/// Separates a module name from an event name in the event bus wire form.
pub const EVENT_SEPARATOR: char = ':';

/// Module identifier - cheaply cloneable, never empty, never contains `:`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ModuleName(Arc<str>);

impl ModuleName {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_argument("module name must not be empty"));
        }
        if trimmed.contains(EVENT_SEPARATOR) {
            return Err(Error::invalid_argument(format!(
                "module name '{}' must not contain '{}'",
                trimmed, EVENT_SEPARATOR
            )));
        }
        Ok(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for ModuleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ModuleName {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ModuleName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl Serialize for ModuleName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Anything a caller may pass where "a name or a list of names" is expected.
///
/// Normalisation rejects empty lists and invalid names with `InvalidArgument`.
pub trait IntoModuleNames {
    fn into_module_names(self) -> Result<Vec<ModuleName>>;
}

fn collect_names<I, S>(items: I) -> Result<Vec<ModuleName>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names = items
        .into_iter()
        .map(|s| ModuleName::new(s.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    if names.is_empty() {
        return Err(Error::invalid_argument(
            "expected a module name or a non-empty list of module names",
        ));
    }
    Ok(names)
}

impl IntoModuleNames for &str {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names([self])
    }
}

impl IntoModuleNames for String {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names([self])
    }
}

impl IntoModuleNames for &String {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names([self])
    }
}

impl IntoModuleNames for ModuleName {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        Ok(vec![self])
    }
}

impl IntoModuleNames for &ModuleName {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        Ok(vec![self.clone()])
    }
}

impl IntoModuleNames for Vec<ModuleName> {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        if self.is_empty() {
            return collect_names(Vec::<&str>::new());
        }
        Ok(self)
    }
}

impl IntoModuleNames for &[ModuleName] {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        self.to_vec().into_module_names()
    }
}

impl IntoModuleNames for &[&str] {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names(self)
    }
}

impl IntoModuleNames for &[String] {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names(self)
    }
}

impl IntoModuleNames for Vec<&str> {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names(self)
    }
}

impl IntoModuleNames for Vec<String> {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names(self)
    }
}

impl<const N: usize> IntoModuleNames for [&str; N] {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names(self)
    }
}

impl<const N: usize> IntoModuleNames for &[&str; N] {
    fn into_module_names(self) -> Result<Vec<ModuleName>> {
        collect_names(self)
    }
}

/// A realized module value, or the unresolved sentinel.
///
/// Clones share the underlying value; use [`Instance::ptr_eq`] to check identity.
#[derive(Clone, Default)]
pub struct Instance(Option<Rc<dyn Any>>);

impl Instance {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Some(Rc::new(value)))
    }

    /// Returned for names that have neither a definition nor an instance.
    pub fn unresolved() -> Self {
        Self(None)
    }

    pub fn is_resolved(&self) -> bool {
        self.0.is_some()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.0.clone().and_then(|v| v.downcast::<T>().ok())
    }

    /// Both resolved and pointing at the same allocation.
    pub fn ptr_eq(a: &Instance, b: &Instance) -> bool {
        match (&a.0, &b.0) {
            (Some(x), Some(y)) => std::ptr::eq(
                Rc::as_ptr(x) as *const (),
                Rc::as_ptr(y) as *const (),
            ),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "Instance(resolved)"),
            None => write!(f, "Instance(unresolved)"),
        }
    }
}
