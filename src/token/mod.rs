//! OAuth client-credential tokens with proactive background refresh.
//!
//! [`AccessTokenManager::get_token`] never blocks on the network while a
//! cached token is still valid. Tokens close to expiry are handed out as-is
//! while a single detached task fetches their replacement.

mod error;

pub use error::TokenError;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::cache::Cache;
use crate::http::{HttpClient, HttpRequest};
use crate::model::{AccessToken, ServiceKind, epoch_seconds_now};

/// Tokens with less than this much lifetime left are refreshed in the background.
pub const REFRESH_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);

/// Upper bound on the lifetime accepted from a token endpoint.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Spotify client-credentials endpoint.
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tidal client-credentials endpoint.
pub const TIDAL_TOKEN_URL: &str = "https://auth.tidal.com/v1/oauth2/token";

/// A freshly issued token and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedToken {
    pub token: String,
    pub expires_in: Duration,
}

/// Something that can mint a new access token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<FetchedToken, TokenError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// OAuth2 client-credentials grant against a token endpoint.
#[derive(Clone)]
pub struct ClientCredentialsSource {
    service: ServiceKind,
    http: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for ClientCredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsSource")
            .field("service", &self.service)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsSource {
    #[must_use]
    pub fn new(
        service: ServiceKind,
        http: HttpClient,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            service,
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsSource {
    #[instrument(skip(self), fields(service = %self.service, url = %self.token_url))]
    async fn fetch_token(&self) -> Result<FetchedToken, TokenError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(TokenError::MissingCredentials {
                service: self.service,
            });
        }

        let request =
            HttpRequest::post_form(&self.token_url, &[("grant_type", "client_credentials")])
                .basic_auth(&self.client_id, &self.client_secret);
        let response: TokenResponse = self
            .http
            .send_json(&request)
            .await
            .map_err(|e| TokenError::fetch(self.service, e))?;

        if response.access_token.is_empty() {
            return Err(TokenError::invalid(self.service, "empty access_token"));
        }
        Ok(FetchedToken {
            token: response.access_token,
            expires_in: Duration::from_secs(response.expires_in),
        })
    }
}

/// Hands out a valid access token for one service, refreshing ahead of expiry.
#[derive(Clone)]
pub struct AccessTokenManager {
    service: ServiceKind,
    cache: Cache,
    source: Arc<dyn TokenSource>,
    refreshing: Arc<AtomicBool>,
}

impl fmt::Debug for AccessTokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenManager")
            .field("service", &self.service)
            .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AccessTokenManager {
    #[must_use]
    pub fn new(service: ServiceKind, cache: Cache, source: Arc<dyn TokenSource>) -> Self {
        Self {
            service,
            cache,
            source,
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn service(&self) -> ServiceKind {
        self.service
    }

    /// Returns a usable bearer token.
    ///
    /// - more than [`REFRESH_WINDOW`] left: cached token
    /// - inside the window but unexpired: cached token, plus one background refresh
    /// - missing or expired: fetched synchronously and cached
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] only when no valid cached token exists and the
    /// synchronous fetch fails.
    #[instrument(skip(self), fields(service = %self.service))]
    pub async fn get_token(&self) -> Result<String, TokenError> {
        if let Some(cached) = self.cache.access_token(self.service).await {
            let remaining = cached.seconds_remaining(epoch_seconds_now());
            if remaining > window_secs() {
                return Ok(cached.token);
            }
            if remaining > 0 {
                debug!(remaining, "access token near expiry, refreshing in background");
                self.spawn_refresh();
                return Ok(cached.token);
            }
        }

        let token = fetch_and_store(self.service, &self.cache, self.source.as_ref()).await?;
        Ok(token.token)
    }

    fn spawn_refresh(&self) {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            return;
        }
        let service = self.service;
        let cache = self.cache.clone();
        let source = Arc::clone(&self.source);
        let guard = RefreshGuard(Arc::clone(&self.refreshing));
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(error) = fetch_and_store(service, &cache, source.as_ref()).await {
                warn!(service = %service, error = %error, "background token refresh failed");
            }
        });
    }
}

/// Clears the in-flight flag when the refresh task ends, even by panic.
struct RefreshGuard(Arc<AtomicBool>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn window_secs() -> i64 {
    i64::try_from(REFRESH_WINDOW.as_secs()).unwrap_or(i64::MAX)
}

async fn fetch_and_store(
    service: ServiceKind,
    cache: &Cache,
    source: &dyn TokenSource,
) -> Result<AccessToken, TokenError> {
    let fetched = source.fetch_token().await?;
    let expires_in = fetched.expires_in.min(MAX_TOKEN_LIFETIME);
    let lifetime = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);
    let token = AccessToken {
        token: fetched.token,
        expires_at_epoch_seconds: epoch_seconds_now().saturating_add(lifetime),
    };
    cache.put_access_token(service, &token, expires_in).await;
    info!(service = %service, expires_in = lifetime, "access token refreshed");
    Ok(token)
}
