//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plughost::plugin::{BoxError, LoadContext, Plugin};

/// Ordered record of lifecycle calls shared by recording plugins.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Only `load:` events, without the prefix.
    pub fn loads(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("load:").map(str::to_string))
            .collect()
    }

    /// Only `unload:` events, without the prefix.
    pub fn unloads(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("unload:").map(str::to_string))
            .collect()
    }

    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

/// Plugin that records every call and can be told to fail.
pub struct Recording {
    name: String,
    weight: i32,
    recorder: Recorder,
    fail_load: bool,
    fail_unload: bool,
    loaded: AtomicBool,
}

impl Recording {
    pub fn new(name: &str, weight: i32, recorder: &Recorder) -> Self {
        Self {
            name: name.to_string(),
            weight,
            recorder: recorder.clone(),
            fail_load: false,
            fail_unload: false,
            loaded: AtomicBool::new(false),
        }
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_unload(mut self) -> Self {
        self.fail_unload = true;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

impl Plugin for Recording {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> i32 {
        self.weight
    }

    fn load(&self, _ctx: &LoadContext<'_>) -> Result<(), BoxError> {
        self.recorder.push(format!("load:{}", self.name));
        if self.fail_load {
            return Err(format!("{} could not start", self.name).into());
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unload(&self) -> Result<(), BoxError> {
        self.recorder.push(format!("unload:{}", self.name));
        self.loaded.store(false, Ordering::SeqCst);
        if self.fail_unload {
            return Err(format!("{} could not stop", self.name).into());
        }
        Ok(())
    }
}

/// Write `contents` to a fresh config file and return its path.
pub fn write_config(contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("plughost-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("plughost.toml");
    std::fs::write(&file, contents).unwrap();
    file
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
