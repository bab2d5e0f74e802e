use crate::metadata::{MetadataError, Result};
use rand::Rng;
use reqwest::{Client, Method, header};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Retry budget used when a request does not set its own
pub const DEFAULT_MAX_RETRIES: u32 = 6;

/// Build the shared connection pool every provider issues requests through
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| MetadataError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Exponential backoff with jitter.
///
/// After failed attempt `k` (1-indexed) the caller sleeps
/// `base * 2^(k-1) + random[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub jitter: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// No sleeping at all
    #[must_use]
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Delay before the attempt that follows failed attempt `attempt`
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self.base.saturating_mul(1u32 << exponent);

        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };

        backoff.saturating_add(jitter)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(1000))
    }
}

/// Run `op` until it succeeds, fails with an error `retryable` rejects, or
/// the budget of `max_retries + 1` attempts is spent. Returns the last error.
pub async fn retry<T, F, Fut, R>(
    caller: &str,
    url: &str,
    max_retries: u32,
    backoff: &Backoff,
    retryable: R,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    R: Fn(&MetadataError) -> bool,
{
    let max_attempts = max_retries.saturating_add(1);
    let mut attempt = 1;

    loop {
        info!(caller, url, attempt, max_attempts, "Calling upstream endpoint");

        let err = match op(attempt).await {
            Ok(value) => {
                debug!(caller, url, attempt, "Upstream call succeeded");
                return Ok(value);
            }
            Err(err) => err,
        };

        if !retryable(&err) {
            debug!(caller, url, attempt, error = %err, "Upstream call failed, not retryable");
            return Err(err);
        }

        if attempt >= max_attempts {
            error!(caller, url, attempt, max_attempts, error = %err, "Upstream call failed, retries exhausted");
            return Err(err);
        }

        let delay = backoff.delay(attempt);
        warn!(caller, url, attempt, max_attempts, status = ?err.status(), error = %err, "Upstream call failed");
        debug!(caller, delay_ms = delay.as_millis() as u64, "Backing off before next attempt");
        tokio::time::sleep(delay).await;

        attempt += 1;
    }
}

/// Pull a human-readable message out of a provider error payload
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    for key in ["Error", "error", "status_message", "message"] {
        if let Some(message) = value.get(key).and_then(serde_json::Value::as_str) {
            return Some(message.to_string());
        }
    }

    match value.get("errors")? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items.iter().filter_map(serde_json::Value::as_str).collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

/// One outbound request, described independently of the client sending it
#[derive(Debug, Clone)]
pub struct CallRequest {
    method: Method,
    endpoint: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    caller: String,
    max_retries: Option<u32>,
    fail_fast: Vec<u16>,
}

impl CallRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            caller: "upstream".to_string(),
            max_retries: None,
            fail_fast: Vec::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// Diagnostic label for log lines
    pub fn caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = caller.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION.as_str(), format!("Bearer {token}"))
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Hand `status` straight back to the caller instead of retrying it
    pub fn fail_fast_on(mut self, status: u16) -> Self {
        self.fail_fast.push(status);
        self
    }

    fn is_retryable(&self, err: &MetadataError) -> bool {
        err.is_retryable() && !err.status().is_some_and(|s| self.fail_fast.contains(&s))
    }
}

/// Resilient Caller: a stateless wrapper over the shared connection pool
/// adding bounded retries, backoff and error classification
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff: Backoff,
}

impl HttpClient {
    /// Wrap a shared client; relative endpoints are resolved against `base_url`
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff: Backoff) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Build full URL from endpoint; absolute URLs pass through untouched
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.base_url, endpoint)
        }
    }

    /// Execute a request and decode the JSON body
    pub async fn call_json<T: DeserializeOwned>(&self, request: &CallRequest) -> Result<T> {
        self.call_with(request, |body| serde_json::from_str(body).map_err(Into::into))
            .await
    }

    /// Execute a request and decode the body with `decode`.
    ///
    /// Decode failures spend the same retry budget as transport and status errors.
    pub async fn call_with<T, D>(&self, request: &CallRequest, decode: D) -> Result<T>
    where
        D: Fn(&str) -> Result<T>,
    {
        let url = self.url(&request.endpoint);
        let max_retries = request.max_retries.unwrap_or(self.max_retries);

        retry(
            &request.caller,
            &url,
            max_retries,
            &self.backoff,
            |err| request.is_retryable(err),
            |_| self.attempt(&url, request, &decode),
        )
        .await
    }

    async fn attempt<T, D>(&self, url: &str, request: &CallRequest, decode: &D) -> Result<T>
    where
        D: Fn(&str) -> Result<T>,
    {
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(header::ACCEPT, "application/json");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(MetadataError::UpstreamStatus {
                status: status.as_u16(),
                message: extract_message(&body),
            });
        }

        decode(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(failures: u32, calls: &Arc<AtomicU32>) -> impl FnMut(u32) -> std::future::Ready<Result<u32>> {
        let calls = Arc::clone(calls);
        move |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if attempt <= failures {
                Err(MetadataError::Transport("connection reset".to_string()))
            } else {
                Ok(attempt)
            })
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = retry(
            "test",
            "http://stub",
            6,
            &Backoff::none(),
            MetadataError::is_retryable,
            flaky(4, &calls),
        )
        .await;

        assert_eq!(result.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_retry_budget_exactly_met() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = retry(
            "test",
            "http://stub",
            3,
            &Backoff::none(),
            MetadataError::is_retryable,
            flaky(3, &calls),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_exhausted_surfaces_last_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = retry(
            "test",
            "http://stub",
            2,
            &Backoff::none(),
            MetadataError::is_retryable,
            flaky(5, &calls),
        )
        .await;

        assert!(matches!(result, Err(MetadataError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<()> = retry(
            "test",
            "http://stub",
            6,
            &Backoff::none(),
            MetadataError::is_retryable,
            |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(MetadataError::Validation("bad kind".to_string())))
            },
        )
        .await;

        assert!(matches!(result, Err(MetadataError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_without_trailing_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let backoff = Backoff::new(Duration::from_secs(1), Duration::ZERO);
        let started = tokio::time::Instant::now();

        let result = retry(
            "test",
            "http://stub",
            3,
            &backoff,
            MetadataError::is_retryable,
            flaky(10, &calls),
        )
        .await;

        assert!(result.is_err());
        // 1s + 2s + 4s between four attempts, nothing after the last one.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[test]
    fn test_backoff_delay_bounds() {
        let backoff = Backoff::default();

        for attempt in 1..=4 {
            let floor = Duration::from_millis(1000 * (1 << (attempt - 1)));
            let delay = backoff.delay(attempt);
            assert!(delay >= floor, "attempt {attempt}: {delay:?}");
            assert!(delay < floor + Duration::from_millis(1000), "attempt {attempt}: {delay:?}");
        }
    }

    #[test]
    fn test_extract_message_variants() {
        assert_eq!(
            extract_message(r#"{"Error": "Resource not found"}"#).as_deref(),
            Some("Resource not found")
        );
        assert_eq!(
            extract_message(r#"{"status_code": 7, "status_message": "Invalid API key"}"#).as_deref(),
            Some("Invalid API key")
        );
        assert_eq!(
            extract_message(r#"{"errors": ["query must be provided", "page too large"]}"#)
                .as_deref(),
            Some("query must be provided; page too large")
        );
        assert_eq!(extract_message("<html>Bad Gateway</html>"), None);
    }

    #[test]
    fn test_url_resolution() {
        let client = HttpClient::new(Client::new(), "https://api.themoviedb.org/3/");

        assert_eq!(
            client.url("/movie/603"),
            "https://api.themoviedb.org/3/movie/603"
        );
        assert_eq!(
            client.url("https://image.tmdb.org/t/p/original"),
            "https://image.tmdb.org/t/p/original"
        );
    }
}
