//! Error types shared by the adapter, the transport and the service layer.
//!
//! Everything is carried through `anyhow::Result` and inspected by callers
//! with `downcast_ref`, so each type here only needs `Display` and `Error`.

/// Misuse of the adapter or an undecodable response.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// A required request field (uri, method) was empty at execution time.
    NotProvided(&'static str),
    /// An accessor was called before any request completed.
    Flow(String),
    /// The response body is not valid JSON.
    Decode(String),
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::NotProvided(field) => {
                write!(
                    f,
                    "{} must be provided in order to execute the request",
                    field
                )
            }
            AdapterError::Flow(msg) => write!(f, "{}", msg),
            AdapterError::Decode(msg) => {
                write!(f, "Failed to decode response body as JSON: {}", msg)
            }
        }
    }
}

impl std::error::Error for AdapterError {}

/// Classification of a failed transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The host name could not be resolved.
    DnsResolution,
    /// Connecting to or talking over the socket failed.
    Socket,
    /// The response body exceeded the configured ceiling.
    BodyTooLarge,
    /// Anything else (timeouts, protocol errors, invalid requests).
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransportErrorKind::DnsResolution => "dns resolution failure",
            TransportErrorKind::Socket => "socket failure",
            TransportErrorKind::BodyTooLarge => "body size limit exceeded",
            TransportErrorKind::Other => "transport failure",
        };
        f.write_str(name)
    }
}

/// Error reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn dns(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::DnsResolution, message)
    }

    pub fn socket(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Socket, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// DNS and socket failures are worth another attempt; nothing else is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::DnsResolution | TransportErrorKind::Socket
        )
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportError {}

/// Failures of the service layer on top of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The server answered with a non-2xx status.
    UnexpectedStatus { status: u16, body: String },
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::UnexpectedStatus { status, body } => {
                write!(f, "Unexpected HTTP status {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for ServiceError {}

#[derive(Debug, Clone, PartialEq)]
pub enum FactoryError {
    /// The configured cache name is not in the registry.
    UnknownCache(String),
}

impl std::fmt::Display for FactoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactoryError::UnknownCache(name) => {
                write!(f, "Cache '{}' is not registered", name)
            }
        }
    }
}

impl std::error::Error for FactoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_provided_display() {
        let err = AdapterError::NotProvided("URI");
        assert_eq!(
            err.to_string(),
            "URI must be provided in order to execute the request"
        );
    }

    #[test]
    fn test_transient_kinds() {
        assert!(TransportError::dns("no such host").is_transient());
        assert!(TransportError::socket("connection refused").is_transient());
        assert!(!TransportError::other("timed out").is_transient());
        assert!(!TransportError::new(TransportErrorKind::BodyTooLarge, "too big").is_transient());
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::socket("connection reset by peer");
        assert_eq!(err.to_string(), "socket failure: connection reset by peer");
    }

    #[test]
    fn test_transport_error_survives_anyhow() {
        let err = anyhow::Error::from(TransportError::dns("lookup failed"));
        let inner = err.downcast_ref::<TransportError>().unwrap();
        assert_eq!(inner.kind, TransportErrorKind::DnsResolution);
    }
}
