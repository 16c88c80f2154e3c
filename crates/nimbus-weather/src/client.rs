//! HTTP client for the weather API with two-tier caching.
//!
//! Reads go through the memory cache first. A successful network response
//! refreshes both tiers. Server and transport failures fall back to the
//! persisted copy when one is still fresh; client errors never do.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::cache::{CacheEntry, MemoryCache, PersistentCache, MEMORY_TTL};
use crate::clock::{fetch_label, Clock, SystemClock};
use crate::error::{ApiError, ErrorPayload, REQUEST_FAILED};
use crate::store::KeyValueStore;

/// Default weather API endpoint.
pub const DEFAULT_API_BASE: &str = "https://pgsnmpymej.execute-api.us-east-1.amazonaws.com/prod";
const REQUEST_TIMEOUT_SECS: u64 = 10;

const FETCH_NETWORK_ERROR: &str = "Network error. Please check your connection.";
const POST_NETWORK_ERROR: &str = "Network error. Please try again.";

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    memory_ttl: Duration,
    persistent: PersistentCache,
    clock: Arc<dyn Clock>,
}

impl ApiClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    /// Replace the persistent tier (prefix, TTL, or backend).
    pub fn persistent_cache(mut self, cache: PersistentCache) -> Self {
        self.persistent = cache;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<ApiClient, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(ApiClient {
            client,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            memory: MemoryCache::new(self.memory_ttl),
            persistent: self.persistent,
            clock: self.clock,
            last_fetch_label: RwLock::new(None),
        })
    }
}

/// Weather API client owning both cache tiers and the last-fetch label.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    memory: MemoryCache,
    persistent: PersistentCache,
    clock: Arc<dyn Clock>,
    last_fetch_label: RwLock<Option<String>>,
}

impl ApiClient {
    /// Start building a client for `base_url`, persisting responses in `store`.
    pub fn builder(base_url: &str, store: Arc<dyn KeyValueStore>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            memory_ttl: MEMORY_TTL,
            persistent: PersistentCache::new(store),
            clock: Arc::new(SystemClock),
        }
    }

    /// Client with default timeout, TTLs and wall clock.
    pub fn new(base_url: &str, store: Arc<dyn KeyValueStore>) -> Result<Self, reqwest::Error> {
        Self::builder(base_url, store).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `HH:MM` label of whichever source produced the latest successful read.
    pub fn last_fetch_label(&self) -> Option<String> {
        self.last_fetch_label.read().clone()
    }

    fn set_label(&self, label: String) {
        *self.last_fetch_label.write() = Some(label);
    }

    /// GET `path` as JSON, through the memory cache and persisted fallback.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_json(&self, path: &str) -> Result<Value, ApiError> {
        let now = self.clock.now_millis();

        if let Some(entry) = self.memory.get(path, now) {
            tracing::debug!("Memory cache hit for {}", path);
            self.set_label(entry.fetched_at_label);
            return Ok(entry.payload);
        }

        let url = format!("{}{}", self.base_url, path);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return self.fallback_or_network_error(path, e),
        };

        let status = response.status();

        if status.is_success() {
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => return self.fallback_or_network_error(path, e),
            };
            let data: Value = match serde_json::from_slice(&body) {
                Ok(data) => data,
                Err(e) => return self.fallback_or_network_error(path, e),
            };

            let fetched_at = self.clock.now_millis();
            let label = fetch_label(fetched_at);

            self.memory.set(
                path,
                CacheEntry {
                    stored_at_ms: now,
                    payload: data.clone(),
                    fetched_at_label: label.clone(),
                },
            );
            self.persistent.save(path, &data, fetched_at);
            self.set_label(label);

            tracing::info!("Fetched {} ({})", path, status);
            return Ok(data);
        }

        let (message, payload) = parse_error_body(response).await;
        let error = ApiError::from_status(status.as_u16(), message, payload);

        if !error.kind.allows_fallback() {
            tracing::debug!("Client error for {}: {}", path, error);
            return Err(error);
        }

        tracing::error!("Server error for {}: {} {}", path, status, error.message);

        match self.load_fallback(path) {
            Some(data) => Ok(data),
            None => Err(error),
        }
    }

    /// POST `body` as JSON to `path`. Never cached, never served from cache.
    #[instrument(skip(self, body), level = "info")]
    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::network(POST_NETWORK_ERROR, e))?;

        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::network(POST_NETWORK_ERROR, e));
        }

        let (message, payload) = parse_error_body(response).await;
        Err(ApiError::from_status(status.as_u16(), message, payload))
    }

    fn load_fallback(&self, path: &str) -> Option<Value> {
        let entry = self.persistent.load(path, self.clock.now_millis())?;
        tracing::info!("Serving persisted copy of {} saved at {}", path, entry.saved_at);
        self.set_label(fetch_label(entry.saved_at));
        Some(entry.data)
    }

    fn fallback_or_network_error<E>(&self, path: &str, error: E) -> Result<Value, ApiError>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        tracing::error!("Network or unexpected error for GET {}: {}", path, error);

        match self.load_fallback(path) {
            Some(data) => Ok(data),
            None => Err(ApiError::network(FETCH_NETWORK_ERROR, error)),
        }
    }
}

/// Extract a message and payload from a non-success response body.
async fn parse_error_body(response: reqwest::Response) -> (String, ErrorPayload) {
    let fallback_message = response
        .status()
        .canonical_reason()
        .unwrap_or(REQUEST_FAILED)
        .to_string();

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Failed to read error body: {}", e);
            return (fallback_message, ErrorPayload::Empty);
        }
    };

    if text.is_empty() {
        return (fallback_message, ErrorPayload::Empty);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            let message = ["message", "error", "detail"]
                .iter()
                .find_map(|key| message_field(&json, key))
                .unwrap_or(fallback_message);
            (message, ErrorPayload::Json(json))
        }
        Err(_) => (text.clone(), ErrorPayload::Text(text)),
    }
}

fn message_field(json: &Value, key: &str) -> Option<String> {
    match json.get(key)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MINUTE: i64 = 60_000;
    const START: i64 = 1_760_000_000_000;

    struct Harness {
        client: ApiClient,
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
    }

    fn harness(base_url: &str) -> Harness {
        let clock = Arc::new(ManualClock::new(START));
        let store = Arc::new(MemoryStore::new());
        let client = ApiClient::builder(base_url, store.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        Harness {
            client,
            clock,
            store,
        }
    }

    /// Base URL of a port nothing listens on.
    fn unreachable_base_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    fn seed_persisted(store: &MemoryStore, path: &str, saved_at: i64, data: Value) {
        let raw = json!({"savedAt": saved_at, "data": data}).to_string();
        store.set(&format!("weather_cache:{}", path), &raw).unwrap();
    }

    #[tokio::test]
    async fn test_success_populates_both_tiers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        assert!(h.client.last_fetch_label().is_none());

        let data = h.client.fetch_json("/weather/Paris").await.unwrap();
        assert_eq!(data, json!({"ok": true}));
        assert_eq!(h.client.last_fetch_label(), Some(fetch_label(START)));

        let raw = h.store.get("weather_cache:/weather/Paris").unwrap().unwrap();
        let persisted: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted["savedAt"], json!(START));
        assert_eq!(persisted["data"], json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_memory_hit_skips_network() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"temp": 18})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        let first = h.client.fetch_json("/weather/Paris").await.unwrap();

        h.clock.advance(5 * MINUTE - 1);
        let second = h.client.fetch_json("/weather/Paris").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.client.last_fetch_label(), Some(fetch_label(START)));
    }

    #[tokio::test]
    async fn test_memory_expiry_refetches() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"temp": 18})))
            .expect(2)
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        h.client.fetch_json("/weather/Paris").await.unwrap();

        h.clock.advance(5 * MINUTE + 1);
        h.client.fetch_json("/weather/Paris").await.unwrap();
    }

    #[tokio::test]
    async fn test_client_error_never_reads_persisted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Atlantis"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "city not found"})),
            )
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        seed_persisted(&h.store, "/weather/Atlantis", START, json!({"stale": true}));

        let err = h.client.fetch_json("/weather/Atlantis").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Client);
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "city not found");
        assert_eq!(err.payload.as_json(), Some(&json!({"message": "city not found"})));
        assert!(h.client.last_fetch_label().is_none());
    }

    #[tokio::test]
    async fn test_server_error_serves_fresh_persisted_copy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Paris"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        let saved_at = START - 30 * MINUTE;
        seed_persisted(&h.store, "/weather/Paris", saved_at, json!({"stale": true}));

        let data = h.client.fetch_json("/weather/Paris").await.unwrap();
        assert_eq!(data, json!({"stale": true}));
        assert_eq!(h.client.last_fetch_label(), Some(fetch_label(saved_at)));
    }

    #[tokio::test]
    async fn test_server_error_without_persisted_copy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Paris"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "upstream down"})))
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        let err = h.client.fetch_json("/weather/Paris").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "upstream down");
    }

    #[tokio::test]
    async fn test_server_error_with_expired_persisted_copy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Paris"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        seed_persisted(&h.store, "/weather/Paris", START - 61 * MINUTE, json!({"old": true}));

        let err = h.client.fetch_json("/weather/Paris").await.unwrap_err();
        assert_eq!(err.status, 502);
        assert_eq!(err.message, "Bad Gateway");
        assert!(matches!(err.payload, ErrorPayload::Empty));
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back() {
        let h = harness(&unreachable_base_url());
        seed_persisted(&h.store, "/weather/Paris", START - MINUTE, json!({"offline": true}));

        let data = h.client.fetch_json("/weather/Paris").await.unwrap();
        assert_eq!(data, json!({"offline": true}));
        assert_eq!(h.client.last_fetch_label(), Some(fetch_label(START - MINUTE)));

        let err = h.client.fetch_json("/weather/Oslo").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.status, 0);
        assert!(matches!(err.payload, ErrorPayload::Transport(_)));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather/Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        let err = h.client.fetch_json("/weather/Paris").await.unwrap_err();
        assert_eq!(err.status, 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_error_body_text_and_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/text"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad city"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/detail"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "", "detail": "too short"})),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zero"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": 0, "error": "bad city"})),
            )
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());

        let err = h.client.fetch_json("/zero").await.unwrap_err();
        assert_eq!(err.message, "bad city");

        let err = h.client.fetch_json("/text").await.unwrap_err();
        assert_eq!(err.message, "bad city");
        assert!(matches!(err.payload, ErrorPayload::Text(ref t) if t == "bad city"));

        let err = h.client.fetch_json("/empty").await.unwrap_err();
        assert_eq!(err.message, "Unprocessable Entity");
        assert!(matches!(err.payload, ErrorPayload::Empty));

        let err = h.client.fetch_json("/detail").await.unwrap_err();
        assert_eq!(err.message, "too short");
    }

    #[tokio::test]
    async fn test_post_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/favorites"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({"city": "Paris"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .expect(2)
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        let body = json!({"city": "Paris"});
        assert_eq!(h.client.post_json("/favorites", &body).await.unwrap(), json!({"id": 7}));
        // Writes are never cached
        assert_eq!(h.client.post_json("/favorites", &body).await.unwrap(), json!({"id": 7}));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_post_json_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/favorites"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db down"})))
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri());
        seed_persisted(&h.store, "/favorites", START, json!({"stale": true}));

        let err = h
            .client
            .post_json("/favorites", &json!({"city": "Paris"}))
            .await
            .unwrap_err();
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "db down");

        let h = harness(&unreachable_base_url());
        let err = h.client.post_json("/favorites", &json!({})).await.unwrap_err();
        assert_eq!(err.status, 0);
        assert_eq!(err.message, "Network error. Please try again.");
    }
}
