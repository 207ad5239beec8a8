//! Request adapter: stateful request builder with retrying execution.
//!
//! A [`RequestAdapter`] holds the URI, method, headers and body of the next
//! request, executes it through a [`Transport`] and keeps the last
//! successful response for the accessors. A failed [`do_request`] leaves
//! the previous response in place.
//!
//! [`do_request`]: RequestAdapter::do_request

pub mod blocking;
mod options;
mod retry;

use anyhow::Result;
use log::debug;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{AdapterError, TransportError};
use crate::transport::{ResponseBody, Transport, TransportRequest, TransportResponse};

pub use options::{AdapterKind, AdapterOptions, STRICT_MAX_BODY_BYTES};
pub use retry::RetryPolicy;

const ACCEPT_LANGUAGE: &str = "accept-language";

#[derive(Debug, Default, Clone)]
struct RequestState {
    uri: String,
    method: String,
    headers: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
}

#[derive(Debug)]
enum BodyState {
    Pending(ResponseBody),
    Ready(Vec<u8>),
    Failed(TransportError),
}

impl BodyState {
    /// Drains a pending body once; later calls see the same bytes or error.
    async fn materialize(&mut self, limit: Option<u64>) -> Result<&[u8], TransportError> {
        if matches!(self, BodyState::Pending(_)) {
            if let BodyState::Pending(body) = std::mem::replace(self, BodyState::Ready(Vec::new())) {
                *self = match body.drain(limit).await {
                    Ok(bytes) => BodyState::Ready(bytes),
                    Err(e) => BodyState::Failed(e),
                };
            }
        }

        match self {
            BodyState::Ready(bytes) => Ok(bytes.as_slice()),
            BodyState::Failed(err) => Err(err.clone()),
            BodyState::Pending(_) => Err(TransportError::other("response body was not read")),
        }
    }
}

#[derive(Debug)]
struct ResponseState {
    status: u16,
    headers: HeaderMap,
    body: BodyState,
}

impl From<TransportResponse> for ResponseState {
    fn from(response: TransportResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: BodyState::Pending(response.body),
        }
    }
}

pub struct RequestAdapter {
    transport: Arc<dyn Transport>,
    options: AdapterOptions,
    retry: RetryPolicy,
    request: RequestState,
    response: Option<ResponseState>,
    attempts: u32,
    last_attempt_at: Option<SystemTime>,
}

impl RequestAdapter {
    pub fn new(transport: Arc<dyn Transport>, options: AdapterOptions) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(options.max_attempts),
            options,
            request: RequestState::default(),
            response: None,
            attempts: 0,
            last_attempt_at: None,
        }
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.request.uri = uri.into();
        self
    }

    pub fn set_method(&mut self, method: impl Into<String>) -> &mut Self {
        self.request.method = method.into();
        self
    }

    /// Replaces all request headers. Names are matched case-insensitively.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.request.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
            .collect();
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.request
            .headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.request.body = Some(body.into());
        self
    }

    pub fn clear_body(&mut self) -> &mut Self {
        self.request.body = None;
        self
    }

    /// Attempts made by the most recent [`do_request`](Self::do_request).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_attempt_at(&self) -> Option<SystemTime> {
        self.last_attempt_at
    }

    /// Executes the stored request, retrying DNS and socket failures.
    ///
    /// Transport errors are returned unchanged as [`TransportError`]; an empty
    /// URI or method fails with [`AdapterError::NotProvided`] before the
    /// transport is touched.
    #[tracing::instrument(skip(self), fields(method = %self.request.method, uri = %self.request.uri))]
    pub async fn do_request(&mut self) -> Result<()> {
        self.attempts = 0;

        if self.request.uri.is_empty() {
            return Err(AdapterError::NotProvided("URI").into());
        }
        if self.request.method.is_empty() {
            return Err(AdapterError::NotProvided("Method").into());
        }

        let mut attempt = 1;
        loop {
            let request = self.transport_request();
            self.attempts = attempt;
            self.last_attempt_at = Some(SystemTime::now());

            match self.transport.execute(&request).await {
                Ok(response) => {
                    debug!(
                        "{} {} completed with {} after {} attempt(s)",
                        request.method, request.uri, response.status, attempt
                    );
                    self.response = Some(ResponseState::from(response));
                    return Ok(());
                }
                Err(e) => {
                    if self.retry.should_retry(&e, attempt) {
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// The request `do_request` would send for the current state, including
    /// the preset's `Accept-Language` default when none is set.
    pub fn transport_request(&self) -> TransportRequest {
        let mut headers = self.request.headers.clone();
        if let Some(language) = &self.options.auto_language_header {
            let value = headers.entry(ACCEPT_LANGUAGE.to_string()).or_default();
            if value.is_empty() {
                *value = language.clone();
            }
        }

        TransportRequest {
            uri: self.request.uri.clone(),
            method: self.request.method.clone(),
            headers: headers.into_iter().collect(),
            body: self.request.body.clone(),
            connect_timeout: self.options.connect_timeout,
            max_body_bytes: self.options.max_body_bytes,
        }
    }

    fn response(&self, purpose: &str) -> Result<&ResponseState> {
        self.response.as_ref().ok_or_else(|| {
            AdapterError::Flow(format!(
                "You have to call the request in order to {}",
                purpose
            ))
            .into()
        })
    }

    pub fn response_status_code(&self) -> Result<u16> {
        Ok(self.response("obtain a status code of the response")?.status)
    }

    /// Raw body bytes, draining a streamed body on first access.
    pub async fn response_bytes(&mut self) -> Result<&[u8]> {
        let limit = self.options.max_body_bytes;
        let response = self.response.as_mut().ok_or_else(|| {
            AdapterError::Flow(
                "You have to call the request in order to obtain the body of the response"
                    .to_string(),
            )
        })?;
        Ok(response.body.materialize(limit).await?)
    }

    /// The body decoded as JSON. An empty body decodes to `Value::Null`.
    pub async fn response_body(&mut self) -> Result<Value> {
        let bytes = self.response_bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes).map_err(|e| AdapterError::Decode(e.to_string()).into())
    }

    pub async fn response_text(&mut self) -> Result<String> {
        let bytes = self.response_bytes().await?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn has_response_header(&self, name: &str) -> Result<bool> {
        let response = self.response("check the headers of the response")?;
        Ok(response.headers.contains_key(name))
    }

    /// First value of the header, `None` when absent.
    pub fn response_header(&self, name: &str) -> Result<Option<String>> {
        let response = self.response("obtain a header of the response")?;
        Ok(response
            .headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()))
    }
}
