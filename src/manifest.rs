//! Resource manifests
//!
//! A TOML description of which files define which modules, so a dependency
//! graph can be validated and planned without running any of the files.

use anyhow::Context;
use modularizer_core::{Instance, ModuleName};
use modularizer_engine::{Factory, Modularizer, Resource};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub path: String,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    /// Modules that must be known before this one is defined.
    #[serde(default)]
    pub requires: Vec<String>,
}

/// Shared record of factory invocations, in call order.
pub type InstantiationLog = Rc<RefCell<Vec<String>>>;

impl Manifest {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let manifest: Manifest = toml::from_str(s).context("invalid manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Names and paths must be well formed, and no module may be declared twice.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashMap::new();
        for resource in &self.resources {
            if resource.path.trim().is_empty() {
                anyhow::bail!("resource with an empty path");
            }
            for module in &resource.modules {
                let name = ModuleName::new(module.name.as_str())?;
                for dep in &module.requires {
                    ModuleName::new(dep.as_str())?;
                }
                if let Some(first) = seen.insert(name.clone(), resource.path.clone()) {
                    anyhow::bail!(
                        "module {} declared by both {} and {}",
                        name,
                        first,
                        resource.path
                    );
                }
            }
        }
        Ok(())
    }

    pub fn module_count(&self) -> usize {
        self.resources.iter().map(|r| r.modules.len()).sum()
    }

    /// Register every resource with `engine` and declare its modules.
    ///
    /// Each module gets a factory that yields its own name as a `String` and
    /// appends it to `log`. All resources are registered before any
    /// prerequisites are attached, so declaration order across files does
    /// not matter.
    pub fn install(&self, engine: &Modularizer, log: &InstantiationLog) -> anyhow::Result<Vec<Resource>> {
        let handles: Vec<Resource> = self
            .resources
            .iter()
            .map(|spec| engine.register(spec.path.as_str()))
            .collect();

        for (spec, resource) in self.resources.iter().zip(&handles) {
            for module in &spec.modules {
                resource.defines(&module.name)?;
            }
        }

        for (spec, resource) in self.resources.iter().zip(&handles) {
            for module in &spec.modules {
                let requires: Vec<&str> = module.requires.iter().map(String::as_str).collect();
                resource
                    .defines_with(&module.name, &requires, Some(recording_factory(&module.name, log)))
                    .with_context(|| format!("declaring {} in {}", module.name, spec.path))?;
            }
        }
        tracing::debug!(
            "installed {} resources, {} modules",
            handles.len(),
            self.module_count()
        );
        Ok(handles)
    }
}

fn recording_factory(name: &str, log: &InstantiationLog) -> Factory {
    let name = name.to_string();
    let log = log.clone();
    Factory::new(move |_, _| {
        log.borrow_mut().push(name.clone());
        Ok(Instance::new(name.clone()))
    })
}
