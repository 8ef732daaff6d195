//! Mock transport for testing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{ApiRequest, BoxFuture, Fetcher, Transport};
use crate::rate_limit::DbQueryError;

/// A canned reply for [`MockTransport`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// A successful response with this JSON body.
    Json(serde_json::Value),
    /// A failed call.
    Error(DbQueryError),
}

/// Responses popped one per call, repeating the last when exhausted.
struct Script {
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
}

impl Script {
    fn new(mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        responses.reverse();
        let fallback = responses[0].clone();
        Self {
            responses: Mutex::new(responses),
            fallback,
        }
    }

    fn next(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

/// A hand-rolled [`Transport`] for tests.
///
/// Supports:
/// - A fixed response, or a sequence (one per call, last one repeated).
/// - Per-URL routes, so one transport can stand in for several sources.
/// - Optional per-call latency.
/// - Request capture via [`requests()`](MockTransport::requests).
pub struct MockTransport {
    default: Script,
    routes: Vec<(String, Script)>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self::with_sequence(vec![response])
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(responses: Vec<MockResponse>) -> Self {
        Self {
            default: Script::new(responses),
            routes: Vec::new(),
            delay: None,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve requests whose URL contains `pattern` from `responses`.
    /// Routes are checked in insertion order before the default script.
    pub fn route(mut self, pattern: &str, responses: Vec<MockResponse>) -> Self {
        self.routes.push((pattern.to_string(), Script::new(responses)));
        self
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `get_json()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, url: &str) -> MockResponse {
        self.routes
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, script)| script.next())
            .unwrap_or_else(|| self.default.next())
    }
}

impl Transport for MockTransport {
    fn get_json<'a>(
        &'a self,
        request: &'a ApiRequest,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<serde_json::Value, DbQueryError>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let response = self.next_response(&request.url);
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match response {
                MockResponse::Json(value) => Ok(value),
                MockResponse::Error(e) => Err(e),
            }
        })
    }
}

/// A [`Fetcher`] that hits a transport exactly once, with no gate or retry.
/// Lets backend tests exercise request building and parsing in isolation.
pub struct PassthroughFetcher<'t> {
    transport: &'t dyn Transport,
}

impl<'t> PassthroughFetcher<'t> {
    pub fn new(transport: &'t dyn Transport) -> Self {
        Self { transport }
    }
}

impl Fetcher for PassthroughFetcher<'_> {
    fn fetch(&self, request: ApiRequest) -> BoxFuture<'_, Result<serde_json::Value, DbQueryError>> {
        Box::pin(async move {
            self.transport
                .get_json(&request, Duration::from_secs(15))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sequence_repeats_last() {
        let mock = MockTransport::with_sequence(vec![
            MockResponse::Error(DbQueryError::Http(503)),
            MockResponse::Json(json!({"ok": true})),
        ]);
        let req = ApiRequest::get("https://example.org");
        let t = Duration::from_secs(1);
        assert!(mock.get_json(&req, t).await.is_err());
        assert_eq!(mock.get_json(&req, t).await.unwrap(), json!({"ok": true}));
        assert_eq!(mock.get_json(&req, t).await.unwrap(), json!({"ok": true}));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn routes_take_precedence() {
        let mock = MockTransport::new(MockResponse::Json(json!("default")))
            .route("crossref", vec![MockResponse::Json(json!("crossref"))]);
        let t = Duration::from_secs(1);
        let routed = mock
            .get_json(&ApiRequest::get("https://api.crossref.org/works"), t)
            .await
            .unwrap();
        let other = mock
            .get_json(&ApiRequest::get("https://example.org"), t)
            .await
            .unwrap();
        assert_eq!(routed, json!("crossref"));
        assert_eq!(other, json!("default"));
    }
}
