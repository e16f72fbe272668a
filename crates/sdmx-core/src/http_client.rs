use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// GET request envelope used by web clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL, query string included.
    pub url: String,
    /// Header values keyed by lower-case name.
    pub headers: BTreeMap<String, String>,
    /// Whole-exchange timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HttpRequest {
    /// GET request with no headers and a 30 s timeout.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: 30_000,
        }
    }

    /// Sets a header; the name is stored lower-cased and replaces any
    /// previous value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Header value looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Response status and fully read body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

impl HttpResponse {
    /// 200 response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    retryable: bool,
}

impl HttpError {
    /// Transient failure, eligible for retry.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Failure that repeating the request cannot fix.
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether [`RetryConfig`](crate::RetryConfig) may repeat the request.
    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Blocking transport contract; the calling thread waits for the exchange.
pub trait HttpClient: Send + Sync {
    /// Performs one exchange. Non-2xx statuses are responses, not errors.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Production HTTP client backed by reqwest's blocking API.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::blocking::Client>,
}

impl ReqwestHttpClient {
    /// Create a client with the crate user agent and a cookie store.
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::blocking::Client::builder()
                    .user_agent(concat!("sdmx-core/", env!("CARGO_PKG_VERSION")))
                    .cookie_store(true)
                    .build()
                    .unwrap_or_else(|_| reqwest::blocking::Client::new()),
            ),
        }
    }

    /// Create a client around a preconfigured `reqwest::blocking::Client`.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .client
            .get(&request.url)
            .timeout(Duration::from_millis(request.timeout_ms));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                HttpError::new(format!("request timeout: {e}"))
            } else if e.is_connect() {
                HttpError::new(format!("connection failed: {e}"))
            } else if e.is_builder() {
                HttpError::non_retryable(format!("invalid request: {e}"))
            } else {
                HttpError::new(format!("request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse { status, body })
    }
}

type Scripted = Result<HttpResponse, HttpError>;

/// In-process transport serving canned responses per URL.
///
/// Each URL keeps a queue; the last queued answer is repeated once the others
/// are consumed. Unknown URLs answer 404.
#[derive(Debug, Default, Clone)]
pub struct StaticHttpClient {
    routes: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `url`.
    pub fn respond(self, url: impl Into<String>, response: HttpResponse) -> Self {
        self.push(url.into(), Ok(response));
        self
    }

    /// Queues a transport error for `url`.
    pub fn fail(self, url: impl Into<String>, error: HttpError) -> Self {
        self.push(url.into(), Err(error));
        self
    }

    fn push(&self, url: String, answer: Scripted) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url)
            .or_default()
            .push_back(answer);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received for exactly `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|request| request.url == url)
            .count()
    }
}

impl HttpClient for StaticHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        match routes.get_mut(&url) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::with_status(404, ""))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(HttpResponse::with_status(404, ""))),
            None => Ok(HttpResponse::with_status(404, "")),
        }
    }
}
