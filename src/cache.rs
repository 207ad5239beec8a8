//! Response cache capability.
//!
//! The crate only defines what a cache must do. Deriving keys from a
//! request and storing values is entirely up to the implementation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::transport::TransportRequest;

#[cfg_attr(test, mockall::automock)]
pub trait ResponseCache: Send + Sync {
    fn lookup(&self, request: &TransportRequest) -> Option<Value>;
    fn store(&self, request: &TransportRequest, body: &Value);
}

/// Named caches the factory may resolve a configured cache name against.
#[derive(Default, Clone)]
pub struct CacheRegistry {
    caches: HashMap<String, Arc<dyn ResponseCache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, cache: Arc<dyn ResponseCache>) -> &mut Self {
        self.caches.insert(name.into(), cache);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ResponseCache>> {
        self.caches.get(name).cloned()
    }
}
