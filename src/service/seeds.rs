//! Seeds: JSON responses recorded to disk and replayed instead of the network.

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::runtime::Runtime;

pub struct SeedStore {
    runtime: Arc<dyn Runtime>,
    directory: PathBuf,
}

impl SeedStore {
    pub fn new(runtime: Arc<dyn Runtime>, directory: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            directory: directory.into(),
        }
    }

    /// `<directory>/<name>.json`, with anything but `[A-Za-z0-9._-]` in the
    /// name replaced by `_` so a seed can never escape the directory.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory
            .join(format!("{}.json", file_name.trim_start_matches('.')))
    }

    pub fn load(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path_for(name);
        if !self.runtime.exists(&path) {
            return Ok(None);
        }

        debug!("Replaying seed {:?}", path);
        let json = self.runtime.read_to_string(&path)?;
        let value = serde_json::from_str(&json)
            .with_context(|| format!("Seed {:?} is not valid JSON", path))?;
        Ok(Some(value))
    }

    pub fn record(&self, name: &str, body: &Value) -> Result<()> {
        let path = self.path_for(name);
        debug!("Recording seed {:?}", path);
        self.runtime.create_dir_all(&self.directory)?;
        let json = serde_json::to_vec_pretty(body).context("Failed to serialize seed")?;
        self.runtime.write(&path, &json)
    }
}
