use serde::Deserialize;
use std::time::Duration;

use crate::transport::DEFAULT_CONNECT_TIMEOUT;

/// 20 MiB, the body ceiling of the strict preset.
pub const STRICT_MAX_BODY_BYTES: u64 = 20 * 1024 * 1024;

/// Tunables of a [`RequestAdapter`](super::RequestAdapter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Total attempts including the first one; never below 1.
    pub max_attempts: u32,
    pub connect_timeout: Duration,
    pub max_body_bytes: Option<u64>,
    /// `Accept-Language` value sent when the caller did not set one.
    pub auto_language_header: Option<String>,
}

impl AdapterOptions {
    /// Two attempts, no body ceiling.
    pub fn standard() -> Self {
        Self {
            max_attempts: 2,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_body_bytes: None,
            auto_language_header: None,
        }
    }

    /// Three attempts, 20 MiB body ceiling, Italian `Accept-Language` default.
    pub fn strict() -> Self {
        Self {
            max_attempts: 3,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_body_bytes: Some(STRICT_MAX_BODY_BYTES),
            auto_language_header: Some("it".to_string()),
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_body_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn auto_language_header(mut self, language: Option<String>) -> Self {
        self.auto_language_header = language;
        self
    }
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self::standard()
    }
}

/// Adapter preset selected by name in the service configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Standard,
    Strict,
}

impl AdapterKind {
    pub fn options(self) -> AdapterOptions {
        match self {
            AdapterKind::Standard => AdapterOptions::standard(),
            AdapterKind::Strict => AdapterOptions::strict(),
        }
    }
}
