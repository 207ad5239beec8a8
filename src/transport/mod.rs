//! The transport collaborator: the only thing that touches the network.
//!
//! The adapter builds a [`TransportRequest`] and hands it to a [`Transport`].
//! The production implementation is [`HttpTransport`] on top of `reqwest`;
//! tests use the generated `MockTransport`.

mod http;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::HeaderMap;
use std::time::Duration;

use crate::error::{TransportError, TransportErrorKind};

pub use http::{HttpTransport, classify_error};

/// Default ceiling for establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(15000);

/// Lazily produced response body chunks.
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// A fully described request, ready to be executed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub uri: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub connect_timeout: Duration,
    pub max_body_bytes: Option<u64>,
}

/// Response body as handed back by a transport.
pub enum ResponseBody {
    Buffered(Vec<u8>),
    Streaming(BodyStream),
}

impl ResponseBody {
    /// Reads the body to completion, failing once more than `limit` bytes arrive.
    pub async fn drain(self, limit: Option<u64>) -> Result<Vec<u8>, TransportError> {
        match self {
            ResponseBody::Buffered(bytes) => {
                check_limit(bytes.len() as u64, limit)?;
                Ok(bytes)
            }
            ResponseBody::Streaming(mut stream) => {
                let mut buffer = Vec::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    check_limit((buffer.len() + chunk.len()) as u64, limit)?;
                    buffer.extend_from_slice(&chunk);
                }
                Ok(buffer)
            }
        }
    }
}

fn check_limit(size: u64, limit: Option<u64>) -> Result<(), TransportError> {
    match limit {
        Some(limit) if size > limit => Err(TransportError::new(
            TransportErrorKind::BodyTooLarge,
            format!("response body exceeds {} bytes", limit),
        )),
        _ => Ok(()),
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            ResponseBody::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl TransportResponse {
    /// A response whose body is already in memory.
    pub fn buffered(status: u16, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Buffered(body.into()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &TransportRequest,
    ) -> Result<TransportResponse, TransportError>;
}
