//! Blocking facade over [`RequestAdapter`] for callers without an executor.
//!
//! Owns a current-thread tokio runtime. Do not use it from inside another
//! runtime; `block_on` panics there.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

use super::{AdapterOptions, RequestAdapter};
use crate::transport::Transport;

pub struct BlockingAdapter {
    inner: RequestAdapter,
    runtime: Runtime,
}

impl BlockingAdapter {
    pub fn new(transport: Arc<dyn Transport>, options: AdapterOptions) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start the blocking adapter runtime")?;
        Ok(Self {
            inner: RequestAdapter::new(transport, options),
            runtime,
        })
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.inner.set_uri(uri);
        self
    }

    pub fn set_method(&mut self, method: impl Into<String>) -> &mut Self {
        self.inner.set_method(method);
        self
    }

    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.set_headers(headers);
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.inner.set_header(name, value);
        self
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.inner.set_body(body);
        self
    }

    pub fn clear_body(&mut self) -> &mut Self {
        self.inner.clear_body();
        self
    }

    pub fn attempts(&self) -> u32 {
        self.inner.attempts()
    }

    pub fn do_request(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.do_request())
    }

    pub fn response_status_code(&self) -> Result<u16> {
        self.inner.response_status_code()
    }

    pub fn response_body(&mut self) -> Result<Value> {
        self.runtime.block_on(self.inner.response_body())
    }

    pub fn response_text(&mut self) -> Result<String> {
        self.runtime.block_on(self.inner.response_text())
    }

    pub fn has_response_header(&self, name: &str) -> Result<bool> {
        self.inner.has_response_header(name)
    }

    pub fn response_header(&self, name: &str) -> Result<Option<String>> {
        self.inner.response_header(name)
    }
}
