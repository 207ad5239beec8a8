use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::adapter::AdapterKind;
use crate::runtime::Runtime;

/// Top-level key under which the service settings may be nested.
pub const CONFIG_SECTION: &str = "reqcomposer";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeedsConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

impl Default for SeedsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("data/seeds/"),
        }
    }
}

/// Settings of a [`ComposerService`](super::ComposerService).
///
/// Keys other than the known ones end up in `extra` and are handed to the
/// service untouched (see [`ComposerService::flag`](super::ComposerService::flag)).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub adapter: AdapterKind,
    /// Name of a cache registered in the factory's registry.
    pub cache: Option<String>,
    pub seeds: SeedsConfig,
    pub default_headers: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceConfig {
    /// Parses a JSON document, either the bare settings or nested under
    /// [`CONFIG_SECTION`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut document: Value =
            serde_json::from_str(json).context("Configuration is not valid JSON")?;

        if let Some(section) = document
            .as_object_mut()
            .and_then(|root| root.remove(CONFIG_SECTION))
        {
            document = section;
        }

        serde_json::from_value(document).context("Invalid service configuration")
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let json = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        Self::from_json_str(&json).with_context(|| format!("Failed to parse {:?}", path))
    }
}
