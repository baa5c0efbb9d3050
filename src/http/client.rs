//! HTTP client wrapper shared by parsers, adapters and the token manager.
//!
//! All outbound traffic goes through [`HttpClient::send`], which applies the
//! browser-like default headers, a per-request timeout and the retry policy.

use std::time::Duration;

use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::HttpError;
use crate::user_agent;

/// Default HTTP connect timeout.
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default whole-request timeout.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Timeout and retry settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
enum Auth {
    Bearer(String),
    Basic { user: String, password: String },
}

/// An outbound request description.
///
/// Requests are plain data so they can be replayed by the retry loop.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: RequestBody,
    auth: Option<Auth>,
    timeout: Option<Duration>,
}

impl HttpRequest {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            auth: None,
            timeout: None,
        }
    }

    /// A GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// A POST request with a JSON body.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.body = RequestBody::Json(body);
        request
    }

    /// A POST request with a url-encoded form body.
    #[must_use]
    pub fn post_form<K, V>(url: impl Into<String>, fields: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::new(Method::POST, url);
        request.body = RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .collect(),
        );
        request
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds bearer authentication.
    #[must_use]
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::Bearer(token.into()));
        self
    }

    /// Adds HTTP basic authentication.
    #[must_use]
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Auth::Basic {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Overrides the client-wide request timeout for this request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Decode`] when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(|e| HttpError::decode(&self.url, e))
    }

    /// Returns the value of a cookie set by this response, if any.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|raw| {
                let pair = raw.split(';').next()?;
                let (key, value) = pair.split_once('=')?;
                (key.trim() == name).then(|| value.trim().to_string())
            })
    }
}

/// HTTP client with retry and default browser-like headers.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Creates a client with default timeouts and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] when the underlying client cannot be built.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_settings(&HttpSettings::default())
    }

    /// Creates a client with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] when the underlying client cannot be built.
    #[instrument(level = "debug", skip_all, fields(
        connect_ms = settings.connect_timeout.as_millis(),
        request_ms = settings.request_timeout.as_millis(),
    ))]
    pub fn with_settings(settings: &HttpSettings) -> Result<Self, HttpError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .default_headers(user_agent::browser_headers())
            .gzip(true)
            .build()
            .map_err(HttpError::Build)?;
        Ok(Self {
            client,
            retry: settings.retry.clone(),
        })
    }

    /// Sends a request, retrying transient failures per the retry policy.
    ///
    /// # Errors
    ///
    /// Returns the last [`HttpError`] once retries are exhausted or the failure
    /// is permanent.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut attempt: u32 = 1;
        loop {
            match self.execute(request).await {
                Ok(response) => return Ok(response),
                Err(error) => match self.retry.should_retry(classify_error(&error), attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next,
                    } => {
                        warn!(
                            url = %request.url,
                            error = %error,
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url = %request.url, %reason, "giving up on request");
                        return Err(error);
                    }
                },
            }
        }
    }

    /// GET a URL and return the body as text.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::send`].
    pub async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        Ok(self.send(&HttpRequest::get(url)).await?.body)
    }

    /// Sends a request and decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::send`]; also [`HttpError::Decode`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T, HttpError> {
        self.send(request).await?.json()
    }

    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let parsed = Url::parse(&request.url).map_err(|_| HttpError::InvalidUrl {
            url: request.url.clone(),
        })?;

        let mut builder = self.client.request(request.method.clone(), parsed);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.auth {
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            Some(Auth::Basic { user, password }) => builder.basic_auth(user, Some(password)),
            None => builder,
        };
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::network(&request.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::status(&request.url, status.as_u16()));
        }

        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::network(&request.url, e))?;

        Ok(HttpResponse {
            url: request.url.clone(),
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{body_json, header, header_exists, header_regex, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn fast_client(max_retries: u32) -> HttpClient {
        HttpClient::with_settings(&HttpSettings {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            retry: RetryPolicy::new(max_retries, Duration::from_millis(10)).without_jitter(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_returns_body_on_success() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let client = fast_client(0);
        let body = client.get_text(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_send_retries_5xx_then_succeeds() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(2);
        let body = client.get_text(&format!("{}/flaky", server.uri())).await.unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_send_gives_up_after_max_retries() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = fast_client(2);
        let err = client.get_text(&format!("{}/down", server.uri())).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test]
    async fn test_send_does_not_retry_4xx() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(2);
        let err = client.get_text(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_send_times_out_slow_response() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = fast_client(0);
        let request =
            HttpRequest::get(format!("{}/slow", server.uri())).timeout(Duration::from_millis(50));
        let err = client.send(&request).await.unwrap_err();
        assert!(matches!(err, HttpError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_post_json_sends_body_and_headers() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("x-custom", "1"))
            .and(body_json(serde_json::json!({"q": "song"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = fast_client(0);
        let request = HttpRequest::post_json(
            format!("{}/search", server.uri()),
            serde_json::json!({"q": "song"}),
        )
        .header("x-custom", "1");
        let value: serde_json::Value = client.send_json(&request).await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_default_headers_are_browser_like() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(header_regex("user-agent", r"^Mozilla/5\.0"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(0);
        client.get_text(&format!("{}/ua", server.uri())).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_without_request() {
        let client = fast_client(2);
        let err = client.get_text("not a url").await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl { .. }));
    }

    #[test]
    fn test_cookie_reads_named_set_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, "session=abc; Path=/".parse().unwrap());
        headers.append(SET_COOKIE, "csrftoken=xyz123; Path=/; Secure".parse().unwrap());
        let response = HttpResponse {
            url: "https://www.pandora.com".to_string(),
            status: 200,
            headers,
            body: String::new(),
        };
        assert_eq!(response.cookie("csrftoken").as_deref(), Some("xyz123"));
        assert_eq!(response.cookie("missing"), None);
    }
}
