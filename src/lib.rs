//! Retrying HTTP request adapter and the request-composing service built on it.
//!
//! - [`adapter::RequestAdapter`]: set URI, method, headers and body, run
//!   `do_request`, read status, JSON body and headers of the last response.
//! - [`transport::Transport`]: the network collaborator, implemented with
//!   `reqwest` by [`transport::HttpTransport`].
//! - [`service::ComposerService`] and [`service::ServiceFactory`]: default
//!   headers, seeds and an optional [`cache::ResponseCache`] on top.

pub mod adapter;
pub mod cache;
pub mod error;
pub mod runtime;
pub mod service;
pub mod transport;

pub use adapter::{AdapterKind, AdapterOptions, RequestAdapter, blocking::BlockingAdapter};
pub use error::{AdapterError, FactoryError, ServiceError, TransportError, TransportErrorKind};
pub use service::{ComposerService, ServiceConfig, ServiceFactory};
pub use transport::{HttpTransport, Transport};
