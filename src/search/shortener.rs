//! Universal link shortening.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::ShortenError;
use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};

/// Turns a long universal link into a short one.
#[async_trait]
pub trait LinkShortener: Send + Sync {
    async fn shorten(&self, link: &str) -> Result<String, ShortenError>;
}

/// Leaves links unchanged. Used when no shortener is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopShortener;

#[async_trait]
impl LinkShortener for NoopShortener {
    async fn shorten(&self, link: &str) -> Result<String, ShortenError> {
        Ok(link.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ShortenData {
    refer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShortenResponse {
    data: Option<ShortenData>,
}

/// Client for an HTTP shortening API: `POST {url}` with an `x-api-key`
/// header, answering `{"data": {"refer": "<short link>"}}`.
pub struct ApiShortener {
    http: HttpClient,
    cache: Cache,
    api_url: String,
    api_key: String,
}

impl std::fmt::Debug for ApiShortener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiShortener")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl ApiShortener {
    #[must_use]
    pub fn new(
        http: HttpClient,
        cache: Cache,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            cache,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl LinkShortener for ApiShortener {
    #[instrument(skip(self), fields(api = %self.api_url))]
    async fn shorten(&self, link: &str) -> Result<String, ShortenError> {
        if let Some(short) = self.cache.short_link(link).await {
            debug!(%short, "short link cache hit");
            return Ok(short);
        }
        let request = HttpRequest::post_json(&self.api_url, serde_json::json!({ "url": link }))
            .header("x-api-key", self.api_key.as_str());
        let response: ShortenResponse = self.http.send_json(&request).await?;
        let short = response
            .data
            .and_then(|data| data.refer)
            .ok_or_else(|| ShortenError::MissingLink {
                link: link.to_string(),
            })?;
        self.cache.put_short_link(link, &short).await;
        Ok(short)
    }
}
