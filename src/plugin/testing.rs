//! Instrumented plugin used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::plugin::{BoxError, LoadContext, Plugin};

/// Shared, ordered record of lifecycle calls across probes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct Probe {
    name: String,
    weight: i32,
    journal: Journal,
    fail_load: bool,
    fail_unload: bool,
    loads: AtomicUsize,
    unloads: AtomicUsize,
    saw_config: AtomicBool,
}

impl Probe {
    pub fn new(name: &str, weight: i32) -> Self {
        Self {
            name: name.to_string(),
            weight,
            journal: Journal::default(),
            fail_load: false,
            fail_unload: false,
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            saw_config: AtomicBool::new(false),
        }
    }

    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_unload(mut self) -> Self {
        self.fail_unload = true;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    pub fn saw_config(&self) -> bool {
        self.saw_config.load(Ordering::SeqCst)
    }
}

impl Plugin for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> i32 {
        self.weight
    }

    fn load(&self, ctx: &LoadContext<'_>) -> Result<(), BoxError> {
        self.journal.push(format!("load:{}", self.name));
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.saw_config.store(ctx.config().is_present(), Ordering::SeqCst);
        if self.fail_load {
            return Err(format!("{} refused to load", self.name).into());
        }
        Ok(())
    }

    fn unload(&self) -> Result<(), BoxError> {
        self.journal.push(format!("unload:{}", self.name));
        self.unloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_unload {
            return Err(format!("{} refused to unload", self.name).into());
        }
        Ok(())
    }
}
