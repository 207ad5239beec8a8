//! `reqwest`-backed transport with error classification.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use log::debug;
use reqwest::{Client, Method};
use std::error::Error as StdError;
use std::sync::Mutex;
use std::time::Duration;

use super::{ResponseBody, Transport, TransportRequest, TransportResponse};
use crate::error::{TransportError, TransportErrorKind};

/// Executes requests with `reqwest`.
///
/// `reqwest` fixes the connect timeout per `Client`, so the client for the
/// most recently requested timeout is kept and rebuilt only when it changes.
pub struct HttpTransport {
    user_agent: String,
    client: Mutex<Option<(Duration, Client)>>,
}

impl HttpTransport {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            client: Mutex::new(None),
        }
    }

    fn client_for(&self, connect_timeout: Duration) -> Result<Client, TransportError> {
        let mut cached = self
            .client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((timeout, client)) = cached.as_ref() {
            if *timeout == connect_timeout {
                return Ok(client.clone());
            }
        }

        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(connect_timeout)
            .build()
            .map_err(classify_error)?;
        *cached = Some((connect_timeout, client.clone()));
        Ok(client)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(concat!("reqcomposer/", env!("REQCOMPOSER_VERSION")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, uri = %request.uri))]
    async fn execute(
        &self,
        request: &TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            TransportError::other(format!("Invalid HTTP method '{}': {}", request.method, e))
        })?;

        let client = self.client_for(request.connect_timeout)?;
        let mut builder = client.request(method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status().as_u16();
        debug!("{} {} -> {}", request.method, request.uri, status);

        if let (Some(limit), Some(length)) = (request.max_body_bytes, response.content_length()) {
            if length > limit {
                return Err(TransportError::new(
                    TransportErrorKind::BodyTooLarge,
                    format!("response declares {} bytes, limit is {}", length, limit),
                ));
            }
        }

        let headers = response.headers().clone();
        let chunks = stream::unfold(Some(response), |state| async move {
            let mut response = state?;
            match response.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk.to_vec()), Some(response))),
                Ok(None) => None,
                Err(e) => Some((Err(classify_error(e)), None)),
            }
        });

        Ok(TransportResponse {
            status,
            headers,
            body: ResponseBody::Streaming(chunks.boxed()),
        })
    }
}

/// Maps a `reqwest` error onto the transport taxonomy.
///
/// Name resolution failures surface from hyper as connect errors whose
/// source chain mentions "dns error"; other connect errors and broken
/// connections mid-response count as socket failures.
pub fn classify_error(error: reqwest::Error) -> TransportError {
    let message = error_chain(&error);

    let kind = if error.is_connect() {
        let lowered = message.to_lowercase();
        if lowered.contains("dns error") || lowered.contains("lookup address") {
            TransportErrorKind::DnsResolution
        } else {
            TransportErrorKind::Socket
        }
    } else if is_broken_connection(&error, &message) {
        TransportErrorKind::Socket
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, message)
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Markers hyper puts in the chain when the peer closed the connection
/// without an `io::Error` underneath.
const CLOSED_CONNECTION_MARKERS: &[&str] = &[
    "connection closed before message completed",
    "incomplete message",
];

fn is_broken_connection(error: &reqwest::Error, message: &str) -> bool {
    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = inner.source();
    }

    let lowered = message.to_lowercase();
    (error.is_request() || error.is_body())
        && CLOSED_CONNECTION_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
}
