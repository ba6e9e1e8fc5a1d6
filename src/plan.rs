//! Offline load planning
//!
//! Runs a real engine over a manifest with an in-memory loader and reports
//! the order in which files would be fetched and modules instantiated.

use crate::manifest::{InstantiationLog, Manifest};
use modularizer_core::{Error, ModuleName};
use modularizer_engine::{LoaderConfig, Modularizer, QueuedLoader, READY_EVENT};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub targets: Vec<String>,
    /// Resolved paths, in fetch order.
    pub fetched: Vec<String>,
    /// Module names, in factory invocation order.
    pub instantiated: Vec<String>,
}

/// Plan loading `targets` from `manifest`.
///
/// The loader completes files one at a time, oldest fetch first. When the
/// queue drains and the targets were still not delivered, the load can never
/// finish; the error carries the watchdog's root-cause report.
pub fn plan(manifest: &Manifest, targets: &[String], config: LoaderConfig) -> anyhow::Result<Plan> {
    let loader = QueuedLoader::new();
    let engine = Modularizer::new(config)?.with_loader(loader.clone());
    let log: InstantiationLog = Rc::new(RefCell::new(Vec::new()));
    manifest.install(&engine, &log)?;

    let delivered = Rc::new(RefCell::new(false));
    let flag = delivered.clone();
    engine.require(targets, move |_, _| {
        *flag.borrow_mut() = true;
        Ok(())
    })?;
    let completed = loader.flush()?;
    tracing::debug!("planner completed {} fetches", completed);

    if !*delivered.borrow() {
        let stuck: Vec<ModuleName> = engine
            .pending(READY_EVENT)
            .into_iter()
            .filter_map(|ns| ModuleName::new(ns).ok())
            .collect();
        return Err(Error::timeout(engine.diagnose(&stuck)).into());
    }

    let instantiated = log.borrow().clone();
    Ok(Plan {
        targets: targets.to_vec(),
        fetched: loader.fetched(),
        instantiated,
    })
}

/// Declare every resource in a fresh engine. Reports the first invalid
/// declaration, such as a prerequisite that no resource provides.
pub fn check(manifest: &Manifest, config: LoaderConfig) -> anyhow::Result<usize> {
    let engine = Modularizer::new(config)?;
    let log: InstantiationLog = Rc::new(RefCell::new(Vec::new()));
    let resources = manifest.install(&engine, &log)?;
    Ok(resources.len())
}
