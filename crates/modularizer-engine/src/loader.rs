//! File loader seam
//!
//! The engine never fetches bytes itself. A [`FileLoader`] is handed a path
//! and a [`Completion`]; it must call [`Completion::complete`] once the file's
//! top-level code has run, synchronously or at any later point.

use crate::engine::Modularizer;
use crate::resource::ResourceId;
use modularizer_core::Result;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

pub trait FileLoader {
    /// Start fetching `path`. Loaders that complete synchronously should
    /// return the result of `done.complete()`.
    fn fetch(&self, path: &str, done: Completion) -> Result<()>;
}

impl<F> FileLoader for F
where
    F: Fn(&str, Completion) -> Result<()>,
{
    fn fetch(&self, path: &str, done: Completion) -> Result<()> {
        self(path, done)
    }
}

/// One-shot completion handle for a single resource fetch.
pub struct Completion {
    engine: Modularizer,
    resource: ResourceId,
    path: String,
}

impl Completion {
    pub(crate) fn new(engine: Modularizer, resource: ResourceId, path: String) -> Self {
        Self {
            engine,
            resource,
            path,
        }
    }

    /// The resolved path that was fetched.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The engine that asked for the file; fetched code defines its modules here.
    pub fn engine(&self) -> &Modularizer {
        &self.engine
    }

    /// Report the file as executed. Returns whatever the unblocked work raised.
    pub fn complete(self) -> Result<()> {
        self.engine.finish_resource(self.resource)
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("resource", &self.resource)
            .field("path", &self.path)
            .finish()
    }
}

type Script = Rc<dyn Fn(&Modularizer) -> Result<()>>;

#[derive(Default)]
struct QueueState {
    immediate: bool,
    fetched: Vec<String>,
    pending: VecDeque<Completion>,
    scripts: HashMap<String, Script>,
}

/// In-memory loader that records fetch order.
///
/// By default completions queue up until the caller drives them with
/// [`QueuedLoader::complete_next`] or [`QueuedLoader::flush`]; an
/// [`immediate`](QueuedLoader::immediate) loader completes inside `fetch`.
/// Scripts registered per path run right before the completion, standing in
/// for the file's top-level code.
#[derive(Clone, Default)]
pub struct QueuedLoader {
    state: Rc<RefCell<QueueState>>,
}

impl QueuedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn immediate() -> Self {
        let loader = Self::default();
        loader.state.borrow_mut().immediate = true;
        loader
    }

    /// Run `script` against the engine when `path` finishes loading.
    pub fn with_script<F>(self, path: impl Into<String>, script: F) -> Self
    where
        F: Fn(&Modularizer) -> Result<()> + 'static,
    {
        self.state
            .borrow_mut()
            .scripts
            .insert(path.into(), Rc::new(script));
        self
    }

    /// Every path passed to `fetch`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.state.borrow().fetched.clone()
    }

    /// Paths fetched but not yet completed, oldest first.
    pub fn pending(&self) -> Vec<String> {
        self.state
            .borrow()
            .pending
            .iter()
            .map(|c| c.path().to_string())
            .collect()
    }

    /// Complete the oldest pending fetch. `Ok(false)` when nothing is pending.
    pub fn complete_next(&self) -> Result<bool> {
        let next = self.state.borrow_mut().pending.pop_front();
        match next {
            Some(done) => self.run(done).map(|_| true),
            None => Ok(false),
        }
    }

    /// Complete the pending fetch for `path`, if any.
    pub fn complete(&self, path: &str) -> Result<bool> {
        let next = {
            let mut state = self.state.borrow_mut();
            let idx = state.pending.iter().position(|c| c.path() == path);
            idx.and_then(|i| state.pending.remove(i))
        };
        match next {
            Some(done) => self.run(done).map(|_| true),
            None => Ok(false),
        }
    }

    /// Complete pending fetches until none remain, including fetches that
    /// completions trigger along the way. Returns how many were completed.
    pub fn flush(&self) -> Result<usize> {
        let mut completed = 0;
        while self.complete_next()? {
            completed += 1;
        }
        Ok(completed)
    }

    fn run(&self, done: Completion) -> Result<()> {
        let script = self.state.borrow().scripts.get(done.path()).cloned();
        if let Some(script) = script {
            script(done.engine())?;
        }
        done.complete()
    }
}

impl FileLoader for QueuedLoader {
    fn fetch(&self, path: &str, done: Completion) -> Result<()> {
        let immediate = {
            let mut state = self.state.borrow_mut();
            state.fetched.push(path.to_string());
            state.immediate
        };
        if immediate {
            return self.run(done);
        }
        self.state.borrow_mut().pending.push_back(done);
        Ok(())
    }
}
