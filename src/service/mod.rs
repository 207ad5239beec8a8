//! Request-composing service on top of the adapter.
//!
//! A [`ComposerService`] collects the URI, headers, JSON body and optional
//! seed name of one request, merges in the configured default headers and
//! sends it with one of the verb helpers. Seeds and the response cache are
//! consulted before the network.

mod config;
mod factory;
mod seeds;

use anyhow::Result;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::RequestAdapter;
use crate::cache::ResponseCache;
use crate::error::{AdapterError, ServiceError};
use crate::runtime::Runtime;

pub use config::{CONFIG_SECTION, SeedsConfig, ServiceConfig};
pub use factory::ServiceFactory;
pub use seeds::SeedStore;

#[derive(Debug, Default)]
struct PendingRequest {
    uri: String,
    headers: BTreeMap<String, String>,
    body: Option<Value>,
    seed: Option<String>,
}

pub struct ComposerService {
    config: ServiceConfig,
    adapter: RequestAdapter,
    cache: Option<Arc<dyn ResponseCache>>,
    seeds: Option<SeedStore>,
    pending: PendingRequest,
}

impl ComposerService {
    pub fn new(
        config: ServiceConfig,
        adapter: RequestAdapter,
        cache: Option<Arc<dyn ResponseCache>>,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        let seeds = config
            .seeds
            .enabled
            .then(|| SeedStore::new(runtime, config.seeds.directory.clone()));

        Self {
            config,
            adapter,
            cache,
            seeds,
            pending: PendingRequest::default(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn adapter(&self) -> &RequestAdapter {
        &self.adapter
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// A configuration value the service does not interpret itself.
    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.config.extra.get(name)
    }

    /// Status of the last response that came from the network.
    pub fn last_status(&self) -> Option<u16> {
        self.adapter.response_status_code().ok()
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) -> &mut Self {
        self.pending.uri = uri.into();
        self
    }

    /// Replaces the per-request headers; defaults from the config still apply.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.pending.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
            .collect();
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pending
            .headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn set_body(&mut self, body: Value) -> &mut Self {
        self.pending.body = Some(body);
        self
    }

    /// Names the seed this request is replayed from or recorded to.
    pub fn use_seed(&mut self, name: impl Into<String>) -> &mut Self {
        self.pending.seed = Some(name.into());
        self
    }

    pub async fn get(&mut self) -> Result<Value> {
        self.request("GET").await
    }

    pub async fn post(&mut self) -> Result<Value> {
        self.request("POST").await
    }

    pub async fn put(&mut self) -> Result<Value> {
        self.request("PUT").await
    }

    pub async fn patch(&mut self) -> Result<Value> {
        self.request("PATCH").await
    }

    pub async fn delete(&mut self) -> Result<Value> {
        self.request("DELETE").await
    }

    /// Sends the pending request with `method` and returns the JSON body.
    ///
    /// The pending request is consumed whether or not the call succeeds.
    #[tracing::instrument(skip(self), fields(uri = %self.pending.uri))]
    pub async fn request(&mut self, method: &str) -> Result<Value> {
        let pending = std::mem::take(&mut self.pending);

        if pending.uri.is_empty() {
            return Err(AdapterError::NotProvided("URI").into());
        }

        if let (Some(store), Some(name)) = (&self.seeds, &pending.seed) {
            if let Some(body) = store.load(name)? {
                return Ok(body);
            }
        }

        let mut headers: BTreeMap<String, String> = self
            .config
            .default_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        headers.extend(pending.headers);

        self.adapter
            .set_uri(pending.uri)
            .set_method(method)
            .set_headers(headers);
        match &pending.body {
            Some(body) => self.adapter.set_body(serde_json::to_vec(body)?),
            None => self.adapter.clear_body(),
        };

        let cache_key = match &self.cache {
            Some(_) if method.eq_ignore_ascii_case("GET") => Some(self.adapter.transport_request()),
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(body) = cache.lookup(key) {
                debug!("Cache hit for {}", key.uri);
                return Ok(body);
            }
        }

        self.adapter.do_request().await?;

        let status = self.adapter.response_status_code()?;
        if !(200..300).contains(&status) {
            let body = self.adapter.response_text().await?;
            return Err(ServiceError::UnexpectedStatus { status, body }.into());
        }

        let body = self.adapter.response_body().await?;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            cache.store(key, &body);
        }
        if let (Some(store), Some(name)) = (&self.seeds, &pending.seed) {
            store.record(name, &body)?;
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterOptions;
    use crate::adapter::tests::ok_response;
    use crate::cache::MockResponseCache;
    use crate::error::TransportError;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::transport::{HttpTransport, MockTransport};
    use crate::transport::TransportRequest;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Keys entries on the whole request, headers included.
    #[derive(Default)]
    struct ExactCache {
        entries: Mutex<Vec<(TransportRequest, Value)>>,
    }

    impl ResponseCache for ExactCache {
        fn lookup(&self, request: &TransportRequest) -> Option<Value> {
            let entries = self.entries.lock().unwrap();
            entries
                .iter()
                .find(|(key, _)| key == request)
                .map(|(_, body)| body.clone())
        }

        fn store(&self, request: &TransportRequest, body: &Value) {
            self.entries
                .lock()
                .unwrap()
                .push((request.clone(), body.clone()));
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig::from_json_str(
            r#"{
                "adapter": "standard",
                "default_headers": {
                    "Accept": "application/json",
                    "X-Client-Auth": "12345678abcd"
                },
                "newrelic": true
            }"#,
        )
        .unwrap()
    }

    fn service(
        config: ServiceConfig,
        transport: MockTransport,
        cache: Option<Arc<dyn ResponseCache>>,
    ) -> ComposerService {
        let adapter = RequestAdapter::new(Arc::new(transport), AdapterOptions::standard());
        ComposerService::new(config, adapter, cache, Arc::new(MockRuntime::new()))
    }

    #[tokio::test]
    async fn test_get_merges_default_headers() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.method == "GET"
                    && req.uri == "https://example.com/posts/42"
                    && req.headers
                        == vec![
                            ("accept".to_string(), "text/plain".to_string()),
                            ("x-client-auth".to_string(), "12345678abcd".to_string()),
                        ]
                    && req.body.is_none()
            })
            .times(1)
            .returning(|_| Ok(ok_response(200, r#"{"id":42}"#)));

        let mut service = service(config(), transport, None);
        let body = service
            .set_uri("https://example.com/posts/42")
            .set_header("ACCEPT", "text/plain")
            .get()
            .await
            .unwrap();

        assert_eq!(body, json!({"id": 42}));
        assert_eq!(service.last_status(), Some(200));
    }

    #[tokio::test]
    async fn test_post_serializes_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.method == "POST" && req.body.as_deref() == Some(br#"{"title":"x"}"#.as_slice()))
            .times(1)
            .returning(|_| Ok(ok_response(201, r#"{"id":101,"title":"x"}"#)));

        let mut service = service(config(), transport, None);
        let body = service
            .set_uri("https://example.com/posts")
            .set_body(json!({"title": "x"}))
            .post()
            .await
            .unwrap();
        assert_eq!(body["id"], 101);
    }

    #[tokio::test]
    async fn test_pending_request_is_reset() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(ok_response(200, "{}")));

        let mut service = service(config(), transport, None);
        service.set_uri("https://example.com/").get().await.unwrap();

        let err = service.get().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<AdapterError>(),
            Some(&AdapterError::NotProvided("URI"))
        );
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .returning(|_| Ok(ok_response(404, "not here")));

        let mut service = service(config(), transport, None);
        let err = service
            .set_uri("https://example.com/missing")
            .delete()
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<ServiceError>(),
            Some(&ServiceError::UnexpectedStatus {
                status: 404,
                body: "not here".to_string()
            })
        );
        assert_eq!(service.last_status(), Some(404));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(2)
            .returning(|_| Err(TransportError::socket("connection refused")));

        let mut service = service(config(), transport, None);
        let err = service.set_uri("https://example.com/").get().await.unwrap_err();
        assert!(err.downcast_ref::<TransportError>().is_some());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();

        let mut cache = MockResponseCache::new();
        cache
            .expect_lookup()
            .withf(|req| req.uri == "https://example.com/posts/1")
            .returning(|_| Some(json!({"cached": true})));
        cache.expect_store().never();

        let mut service = service(config(), transport, Some(Arc::new(cache)));
        let body = service.set_uri("https://example.com/posts/1").get().await.unwrap();
        assert_eq!(body, json!({"cached": true}));
    }

    #[tokio::test]
    async fn test_cache_miss_stores_response() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(ok_response(200, r#"{"id":1}"#)));

        let mut cache = MockResponseCache::new();
        cache.expect_lookup().times(1).returning(|_| None);
        cache
            .expect_store()
            .withf(|_, body| body == &json!({"id": 1}))
            .times(1)
            .return_const(());

        let mut service = service(config(), transport, Some(Arc::new(cache)));
        service.set_uri("https://example.com/posts/1").get().await.unwrap();
    }

    #[tokio::test]
    async fn test_strict_preset_cache_hits_on_repeated_get() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.headers
                    .contains(&("accept-language".to_string(), "it".to_string()))
            })
            .times(1)
            .returning(|_| Ok(ok_response(200, r#"{"id":1}"#)));

        let cache = Arc::new(ExactCache::default());
        let adapter = RequestAdapter::new(Arc::new(transport), AdapterOptions::strict());
        let mut service = ComposerService::new(
            config(),
            adapter,
            Some(cache.clone() as Arc<dyn ResponseCache>),
            Arc::new(MockRuntime::new()),
        );

        for _ in 0..2 {
            let body = service
                .set_uri("https://example.com/posts/1")
                .get()
                .await
                .unwrap();
            assert_eq!(body, json!({"id": 1}));
        }
        assert_eq!(cache.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_ignored_for_writes() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(ok_response(200, "{}")));

        let mut cache = MockResponseCache::new();
        cache.expect_lookup().never();
        cache.expect_store().never();

        let mut service = service(config(), transport, Some(Arc::new(cache)));
        service.set_uri("https://example.com/posts/1").put().await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_recorded_then_replayed() {
        let dir = tempdir().unwrap();
        let mut config = config();
        config.seeds = SeedsConfig {
            enabled: true,
            directory: dir.path().join("seeds"),
        };

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(ok_response(200, r#"{"id":42,"title":"x"}"#)));

        let adapter = RequestAdapter::new(Arc::new(transport), AdapterOptions::standard());
        let mut service = ComposerService::new(config, adapter, None, Arc::new(RealRuntime));

        let first = service
            .set_uri("https://example.com/posts/42")
            .use_seed("posts-42")
            .get()
            .await
            .unwrap();
        assert!(dir.path().join("seeds/posts-42.json").exists());

        // second call is served from the seed; the mock allows one execute only
        let second = service
            .set_uri("https://example.com/posts/42")
            .use_seed("posts-42")
            .get()
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_seeds_disabled_ignore_seed_name() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(ok_response(200, "{}")));

        let adapter = RequestAdapter::new(Arc::new(transport), AdapterOptions::standard());
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().never();
        runtime.expect_write().never();
        let mut service = ComposerService::new(config(), adapter, None, Arc::new(runtime));

        service
            .set_uri("https://example.com/")
            .use_seed("root")
            .get()
            .await
            .unwrap();
    }

    #[test]
    fn test_passthrough_flags() {
        let service = service(config(), MockTransport::new(), None);
        assert_eq!(service.flag("newrelic"), Some(&Value::Bool(true)));
        assert_eq!(service.flag("missing"), None);
        assert_eq!(service.last_status(), None);
    }

    #[tokio::test]
    async fn test_get_against_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/posts/42")
            .match_header("x-client-auth", "12345678abcd")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"userId":5,"id":42,"title":"x"}"#)
            .create_async()
            .await;

        let adapter = RequestAdapter::new(Arc::new(HttpTransport::default()), AdapterOptions::standard());
        let mut service = ComposerService::new(config(), adapter, None, Arc::new(RealRuntime));
        let body = service
            .set_uri(format!("{}/posts/42", server.url()))
            .get()
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(body.is_object());
        assert_eq!(body["id"], 42);
    }
}
