//! Rate-limited, cached, retrying access to the catalog API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::cache::ResponseCache;
use super::rate_limiter::RateLimiter;
use super::retry::{self, RetryPolicy};
use super::transport::{HttpRequest, Transport};
use crate::error::{CatalogError, Result};

/// Query parameters. A sorted map gives every parameter set one canonical
/// rendering, which doubles as the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn set_opt<V: ToString>(&mut self, key: &str, value: Option<V>) {
        if let Some(v) = value {
            self.set(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn canonical(&self) -> String {
        super::transport::encode_query(&self.pairs())
    }
}

/// Single "GET JSON from endpoint" primitive composed from the shared
/// limiter, cache and a retrying transport.
///
/// Cache and limiter are owned here and shared by every clone of the
/// client, so one instance serves a whole process.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: Option<String>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl CatalogClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            cache,
            limiter,
            retry,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn cache_key(endpoint: &str, params: &Params) -> String {
        format!("{}?{}", endpoint.trim_start_matches('/'), params.canonical())
    }

    /// Fetch `endpoint` as JSON.
    ///
    /// With a `ttl`, a fresh cached body is returned without any network
    /// call, and a successful response is stored for `ttl`.
    ///
    /// # Errors
    /// - `CatalogError::Config` - no API key configured
    /// - `CatalogError::Upstream` - non-2xx after the retry budget
    /// - `CatalogError::Transport` - no response after the retry budget
    /// - `CatalogError::Decode` - body is not JSON
    pub async fn get_json(
        &self,
        endpoint: &str,
        params: &Params,
        ttl: Option<Duration>,
    ) -> Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CatalogError::Config("TMDB API key not configured".into()))?;

        let endpoint = endpoint.trim_start_matches('/');
        let cache_key = Self::cache_key(endpoint, params);
        if ttl.is_some() {
            if let Some(hit) = self.cache.get(&cache_key) {
                debug!("cache hit: {cache_key}");
                return Ok(hit);
            }
        }

        self.limiter.acquire().await;

        let mut query = params.pairs();
        query.push(("api_key".to_string(), api_key.to_string()));
        let request = HttpRequest::get(format!("{}/{}", self.base_url, endpoint), query);

        let response = retry::execute(
            &self.retry,
            endpoint,
            |_| {
                let request = request.clone();
                async move {
                    let resp = self.transport.send(request).await?;
                    if resp.is_success() {
                        Ok(resp)
                    } else {
                        Err(CatalogError::Upstream {
                            status: resp.status,
                            status_text: resp.status_text,
                            body: resp.body,
                        })
                    }
                }
            },
            CatalogError::is_transient,
        )
        .await?;

        let data = response.json()?;
        if let Some(ttl) = ttl {
            self.cache.insert(cache_key, data.clone(), ttl);
        }
        Ok(data)
    }

    /// [`get_json`](Self::get_json) decoded into `T`.
    ///
    /// # Errors
    /// Same as `get_json`, plus `CatalogError::Decode` when the JSON does
    /// not fit `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Params,
        ttl: Option<Duration>,
    ) -> Result<T> {
        let value = self.get_json(endpoint, params, ttl).await?;
        Ok(serde_json::from_value(value)?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{client, client_with};
    use super::*;
    use crate::core::transport::fake::{ok, status, FakeTransport};
    use crate::core::transport::ReqwestTransport;
    use serde_json::json;

    fn popular() -> Params {
        Params::new().with("language", "en-US").with("page", 1)
    }

    #[test]
    fn test_params_canonical_order() {
        let a = Params::new().with("page", 2).with("language", "en-US");
        let b = Params::new().with("language", "en-US").with("page", 2);
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical(), "language=en-US&page=2");
        assert_eq!(
            CatalogClient::cache_key("/movie/popular", &a),
            "movie/popular?language=en-US&page=2"
        );
    }

    #[tokio::test]
    async fn test_appends_credential_last() {
        let transport = FakeTransport::sequence(vec![ok(json!({"results": []}))]);
        client(&transport)
            .get_json("movie/popular", &popular(), None)
            .await
            .unwrap();

        let req = &transport.requests()[0];
        assert_eq!(req.url, "https://api.test/3/movie/popular");
        assert_eq!(
            req.full_url(),
            "https://api.test/3/movie/popular?language=en-US&page=1&api_key=test_key"
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let transport = FakeTransport::sequence(vec![ok(json!({"value": 0.42}))]);
        let client = client(&transport);
        let ttl = Some(Duration::from_secs(10));

        let first = client.get_json("movie/top_rated", &popular(), ttl).await.unwrap();
        let second = client.get_json("movie/top_rated", &popular(), ttl).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn test_no_ttl_never_caches() {
        let transport = FakeTransport::sequence(vec![ok(json!({}))]);
        let client = client(&transport);
        client.get_json("movie/popular", &popular(), None).await.unwrap();
        client.get_json("movie/popular", &popular(), None).await.unwrap();
        assert_eq!(transport.count(), 2);
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_retry_429_then_success() {
        let transport = FakeTransport::sequence(vec![
            status(429, "Too Many Requests"),
            ok(json!({"ok": true})),
        ]);
        let data = client(&transport)
            .get_json("movie/popular", &popular(), None)
            .await
            .unwrap();
        assert_eq!(data["ok"], true);
        assert_eq!(transport.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_surfaces_upstream_error() {
        let transport = FakeTransport::sequence(vec![status(500, "Internal Server Error")]);
        let err = client_with(&transport, RetryPolicy::default())
            .get_json("movie/popular", &popular(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Upstream { status: 500, .. }));
        assert_eq!(transport.count(), 3);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let transport = FakeTransport::sequence(vec![status(404, "Not Found")]);
        let err = client(&transport)
            .get_json("movie/0", &Params::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Upstream { status: 404, .. }));
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_retried() {
        let calls = Arc::new(parking_lot::Mutex::new(0));
        let counter = calls.clone();
        let transport = FakeTransport::new(move |_| {
            let mut n = counter.lock();
            *n += 1;
            if *n == 1 {
                Err(CatalogError::Transport("connection reset".into()))
            } else {
                Ok(ok(json!({"page": 1})))
            }
        });
        let data = client(&transport)
            .get_json("movie/popular", &popular(), None)
            .await
            .unwrap();
        assert_eq!(data["page"], 1);
        assert_eq!(*calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let transport = FakeTransport::sequence(vec![ok(json!({}))]);
        let client = CatalogClient::new(
            Arc::new(transport.clone()),
            "https://api.test/3",
            Some("  ".into()),
            Arc::new(ResponseCache::new(10)),
            Arc::new(RateLimiter::new(10, Duration::from_secs(1))),
            RetryPolicy::none(),
        );
        let err = client
            .get_json("movie/popular", &popular(), Some(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn test_typed_get_decode_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Page {
            #[allow(dead_code)]
            page: u32,
        }
        let transport = FakeTransport::sequence(vec![ok(json!({"page": "one"}))]);
        let err = client(&transport)
            .get::<Page>("movie/popular", &popular(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Decode(_)));
    }

    #[tokio::test]
    async fn test_over_http_with_wiremock() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/movie/popular"))
            .and(query_param("api_key", "test_key"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{"id": 7}]})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let client = CatalogClient::new(
            Arc::new(transport),
            format!("{}/3", server.uri()),
            Some("test_key".into()),
            Arc::new(ResponseCache::new(10)),
            Arc::new(RateLimiter::new(10, Duration::from_secs(1))),
            RetryPolicy::none(),
        );

        let ttl = Some(Duration::from_secs(60));
        let first = client.get_json("movie/popular", &popular(), ttl).await.unwrap();
        let second = client.get_json("movie/popular", &popular(), ttl).await.unwrap();
        assert_eq!(first["results"][0]["id"], 7);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_truncated_body_is_retried() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            for attempt in 0..2 {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await.unwrap();
                let reply = if attempt == 0 {
                    // Promises 100 bytes, sends 5, hangs up
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"pag".to_string()
                } else {
                    let body = r#"{"page":1}"#;
                    format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    )
                };
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let client = CatalogClient::new(
            Arc::new(transport),
            format!("http://{addr}/3"),
            Some("test_key".into()),
            Arc::new(ResponseCache::new(10)),
            Arc::new(RateLimiter::new(10, Duration::from_secs(1))),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                max_jitter: Duration::ZERO,
            },
        );

        let value = client.get_json("movie/popular", &popular(), None).await.unwrap();
        assert_eq!(value["page"], 1);
        server.await.unwrap();
    }
}
