//! Builds a [`ComposerService`] from its configuration.

use anyhow::Result;
use log::debug;
use std::sync::Arc;

use super::{ComposerService, ServiceConfig};
use crate::adapter::RequestAdapter;
use crate::cache::{CacheRegistry, ResponseCache};
use crate::error::FactoryError;
use crate::runtime::{RealRuntime, Runtime};
use crate::transport::{HttpTransport, Transport};

/// Wires adapter, transport, cache and file access into a service.
///
/// The cache is resolved here, by name, from an explicit [`CacheRegistry`];
/// the service itself only ever receives an already resolved cache.
pub struct ServiceFactory {
    registry: CacheRegistry,
    transport: Arc<dyn Transport>,
    runtime: Arc<dyn Runtime>,
}

impl ServiceFactory {
    pub fn new(registry: CacheRegistry) -> Self {
        Self {
            registry,
            transport: Arc::new(HttpTransport::default()),
            runtime: Arc::new(RealRuntime),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn create(&self, config: ServiceConfig) -> Result<ComposerService> {
        let cache = self.resolve_cache(&config)?;
        Ok(self.create_with_cache(config, cache))
    }

    /// Same as [`create`](Self::create) with a cache instance supplied directly;
    /// `config.cache` is ignored.
    pub fn create_with_cache(
        &self,
        config: ServiceConfig,
        cache: Option<Arc<dyn ResponseCache>>,
    ) -> ComposerService {
        debug!(
            "Creating service with {:?} adapter, cache: {}",
            config.adapter,
            cache.is_some()
        );
        let adapter = RequestAdapter::new(self.transport.clone(), config.adapter.options());
        ComposerService::new(config, adapter, cache, self.runtime.clone())
    }

    fn resolve_cache(&self, config: &ServiceConfig) -> Result<Option<Arc<dyn ResponseCache>>, FactoryError> {
        match &config.cache {
            None => Ok(None),
            Some(name) => self
                .registry
                .get(name)
                .map(Some)
                .ok_or_else(|| FactoryError::UnknownCache(name.clone())),
        }
    }
}
