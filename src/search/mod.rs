//! Resolution of one link into links on every requested service.
//!
//! [`SearchOrchestrator`] runs the whole pipeline for one request:
//!
//! 1. identify the link and read its metadata (the only fatal steps)
//! 2. return the source link alone when it is the only service requested
//! 3. search the hub service first and adopt the links its cross-reference
//!    page lists, skipping those adapters
//! 4. search every other requested service concurrently
//! 5. rank: verified links first, then by service tag
//! 6. upgrade metadata from the metadata-rich service, shorten the universal
//!    link and bump the request counter
//!
//! # Example
//!
//! ```no_run
//! use songbridge_core::config::Config;
//! use songbridge_core::search::{SearchOrchestrator, SearchRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = SearchOrchestrator::from_config(&Config::load(None)?).await?;
//! let result = orchestrator
//!     .search(&SearchRequest::link("https://open.spotify.com/track/2Foc5Q5nqNiosCNqttzHof"))
//!     .await?;
//! for link in &result.links {
//!     println!("{}: {}", link.target_service, link.url);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod id;
mod shortener;
mod universal;

pub use error::{SearchError, ShortenError};
pub use shortener::{ApiShortener, LinkShortener, NoopShortener};
pub use universal::{CrossReference, UniversalLinkPage, extract_links, page_url};

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{AdapterQuery, AdapterSet};
use crate::cache::{Cache, CacheStore, MemoryCache, SqliteCache};
use crate::config::{Config, DEFAULT_APP_URL};
use crate::http::HttpClient;
use crate::model::{ContentMetadata, ResultLink, SearchResult, ServiceKind, SourceDescriptor};
use crate::parser::ParserSet;

/// What to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    Link(String),
    /// An id from an earlier [`SearchResult`].
    SearchId(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub target: SearchTarget,
    /// Services to resolve on; empty means every supported service.
    pub adapters: Vec<ServiceKind>,
}

impl SearchRequest {
    #[must_use]
    pub fn link(link: impl Into<String>) -> Self {
        Self {
            target: SearchTarget::Link(link.into()),
            adapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn search_id(id: impl Into<String>) -> Self {
        Self {
            target: SearchTarget::SearchId(id.into()),
            adapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_adapters(mut self, adapters: impl IntoIterator<Item = ServiceKind>) -> Self {
        self.adapters = adapters.into_iter().collect();
        self
    }
}

/// Service roles and the public app URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Searched first; its cross-reference page can stand in for other adapters.
    pub hub: ServiceKind,
    /// Metadata from this service replaces the source's when a verified link exists.
    pub metadata_rich: ServiceKind,
    pub app_url: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            hub: ServiceKind::Tidal,
            metadata_rich: ServiceKind::Spotify,
            app_url: DEFAULT_APP_URL.to_string(),
        }
    }
}

/// Source side of a resolution plus the ranked links.
struct Resolution {
    source: SourceDescriptor,
    metadata: ContentMetadata,
    links: Vec<ResultLink>,
    source_only: bool,
}

pub struct SearchOrchestrator {
    parsers: ParserSet,
    adapters: AdapterSet,
    cache: Cache,
    cross_reference: Box<dyn CrossReference>,
    shortener: Box<dyn LinkShortener>,
    options: SearchOptions,
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("parsers", &self.parsers)
            .field("adapters", &self.adapters)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SearchOrchestrator {
    /// An orchestrator that does not shorten universal links.
    #[must_use]
    pub fn new(
        parsers: ParserSet,
        adapters: AdapterSet,
        cache: Cache,
        cross_reference: Box<dyn CrossReference>,
        options: SearchOptions,
    ) -> Self {
        Self {
            parsers,
            adapters,
            cache,
            cross_reference,
            shortener: Box::new(NoopShortener),
            options,
        }
    }

    #[must_use]
    pub fn with_shortener(mut self, shortener: Box<dyn LinkShortener>) -> Self {
        self.shortener = shortener;
        self
    }

    /// Wires every built-in parser and adapter against the live services.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] when the HTTP client cannot be built and
    /// [`SearchError::Cache`] when the SQLite cache cannot be opened.
    #[instrument(skip(config), fields(cache = ?config.cache_path))]
    pub async fn from_config(config: &Config) -> Result<Self, SearchError> {
        let http = HttpClient::with_settings(&config.http_settings())?;
        let store: Arc<dyn CacheStore> = match &config.cache_path {
            Some(path) => Arc::new(SqliteCache::open(path).await?),
            None => Arc::new(MemoryCache::new()),
        };
        let cache = Cache::new(store, config.cache_ttl());
        let options = SearchOptions {
            app_url: config.app_url.clone(),
            ..SearchOptions::default()
        };

        let orchestrator = Self::new(
            ParserSet::with_defaults(http.clone(), cache.clone()),
            AdapterSet::with_defaults(http.clone(), cache.clone(), &config.credentials),
            cache.clone(),
            Box::new(UniversalLinkPage::new(http.clone(), cache.clone(), options.hub)),
            options,
        );
        Ok(match (&config.shortener_url, &config.shortener_api_key) {
            (Some(url), Some(key)) => {
                orchestrator.with_shortener(Box::new(ApiShortener::new(http, cache, url, key)))
            }
            _ => orchestrator,
        })
    }

    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Resolves `request` into a full [`SearchResult`].
    ///
    /// # Errors
    ///
    /// Fails only on the source side: [`SearchError::Parse`] for an
    /// unrecognized link or missing metadata, [`SearchError::InvalidSearchId`]
    /// for an undecodable id.
    #[instrument(skip(self, request), fields(target = ?request.target))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let resolution = self.resolve(request).await?;
        let result = self.finalize(resolution).await?;
        info!(
            source = %result.source_url,
            links = result.links.len(),
            "resolved link"
        );
        Ok(result)
    }

    /// Resolves `request` and returns only the ranked link URLs.
    ///
    /// Skips the metadata upgrade, shortening and the request counter.
    ///
    /// # Errors
    ///
    /// See [`SearchOrchestrator::search`].
    #[instrument(skip(self, request), fields(target = ?request.target))]
    pub async fn search_headless(&self, request: &SearchRequest) -> Result<Vec<String>, SearchError> {
        let resolution = self.resolve(request).await?;
        Ok(resolution.links.into_iter().map(|link| link.url).collect())
    }

    async fn resolve(&self, request: &SearchRequest) -> Result<Resolution, SearchError> {
        let link = match &request.target {
            SearchTarget::Link(link) => link.trim().to_string(),
            SearchTarget::SearchId(search_id) => id::decode(search_id)?,
        };
        if link.is_empty() {
            return Err(SearchError::MissingTarget);
        }

        let source = self.parsers.identify(&link)?;
        let metadata = self.parsers.metadata(&source).await?;
        let requested = requested_services(&request.adapters);
        let source_link = ResultLink::verified(source.source_type, source.source_url.clone());

        if requested == [source.source_type] {
            debug!(service = %source.source_type, "only the source service requested");
            return Ok(Resolution {
                source,
                metadata,
                links: vec![source_link],
                source_only: true,
            });
        }

        let query = AdapterQuery::new(
            self.parsers.derive_query(&source, &metadata),
            metadata.clone(),
            Some(source.clone()),
        );
        debug!(query = %query.query, ?requested, "searching target services");

        let mut links = Vec::new();
        if requested.contains(&source.source_type) {
            links.push(source_link);
        }
        let mut settled: HashSet<ServiceKind> = HashSet::from([source.source_type]);

        let hub = self.options.hub;
        if requested.contains(&hub) && settled.insert(hub) {
            links.extend(self.hub_links(&query, &requested, &mut settled).await);
        }

        let remaining: Vec<ServiceKind> = requested
            .iter()
            .copied()
            .filter(|service| !settled.contains(service))
            .collect();
        let found = join_all(
            remaining
                .iter()
                .map(|&service| self.adapters.search(service, &query)),
        )
        .await;
        links.extend(found.into_iter().flatten());

        Ok(Resolution {
            source,
            metadata,
            links: rank(links, &requested),
            source_only: false,
        })
    }

    /// The hub's own link plus whatever its cross-reference page lists for
    /// other requested services, all carrying the hub's verification status.
    async fn hub_links(
        &self,
        query: &AdapterQuery,
        requested: &[ServiceKind],
        settled: &mut HashSet<ServiceKind>,
    ) -> Vec<ResultLink> {
        let hub = self.options.hub;
        let Some(hub_link) = self.adapters.search(hub, query).await else {
            return Vec::new();
        };
        let mut links = Vec::new();
        for mut link in self.cross_reference.links(&hub_link).await {
            let service = link.target_service;
            if requested.contains(&service) && settled.insert(service) {
                link.is_verified = hub_link.is_verified;
                link.is_unavailable = hub_link.is_unavailable;
                links.push(link);
            }
        }
        debug!(hub = %hub, adopted = links.len(), "hub cross-reference links adopted");
        links.push(hub_link);
        links
    }

    async fn finalize(&self, resolution: Resolution) -> Result<SearchResult, SearchError> {
        let Resolution {
            source,
            metadata,
            links,
            source_only,
        } = resolution;
        let search_id = id::encode(&source.source_url)?;
        let long_link = universal_link(&self.options.app_url, &search_id);

        let (metadata, universal_link) = if source_only {
            (metadata, long_link)
        } else {
            tokio::join!(
                self.upgrade_metadata(&source, metadata, &links),
                self.shorten(long_link)
            )
        };

        let result = SearchResult {
            id: search_id,
            content_type: metadata.content_type,
            title: metadata.title,
            description: metadata.description,
            image_url: metadata.image_url,
            audio_preview_url: metadata.audio_preview_url,
            source_url: source.source_url,
            universal_link,
            links,
        };
        if let Some(count) = self.cache.increment_search_count().await {
            debug!(count, "search counter incremented");
        }
        Ok(result)
    }

    async fn upgrade_metadata(
        &self,
        source: &SourceDescriptor,
        metadata: ContentMetadata,
        links: &[ResultLink],
    ) -> ContentMetadata {
        let rich = self.options.metadata_rich;
        if source.source_type == rich {
            return metadata;
        }
        let Some(link) = links
            .iter()
            .find(|link| link.target_service == rich && link.is_verified && !link.unavailable())
        else {
            return metadata;
        };

        let upgraded = match self.parsers.identify(&link.url) {
            Ok(descriptor) => self.parsers.metadata(&descriptor).await,
            Err(error) => Err(error),
        };
        match upgraded {
            Ok(rich_metadata) => {
                debug!(service = %rich, "metadata upgraded");
                ContentMetadata {
                    title: rich_metadata.title,
                    description: rich_metadata.description,
                    audio_preview_url: rich_metadata
                        .audio_preview_url
                        .or(metadata.audio_preview_url),
                    ..metadata
                }
            }
            Err(error) => {
                warn!(service = %rich, url = %link.url, error = %error, "metadata upgrade failed");
                metadata
            }
        }
    }

    async fn shorten(&self, long_link: String) -> String {
        match self.shortener.shorten(&long_link).await {
            Ok(short) => short,
            Err(error) => {
                warn!(url = %long_link, error = %error, "link shortening failed, using long link");
                long_link
            }
        }
    }
}

/// `{app_url}?id={search_id}`.
#[must_use]
pub fn universal_link(app_url: &str, search_id: &str) -> String {
    format!("{}?id={search_id}", app_url.trim_end_matches('/'))
}

/// The requested services in request order without repeats; every
/// service when none are named.
fn requested_services(adapters: &[ServiceKind]) -> Vec<ServiceKind> {
    if adapters.is_empty() {
        return ServiceKind::ALL.to_vec();
    }
    let mut seen = HashSet::new();
    adapters
        .iter()
        .copied()
        .filter(|service| seen.insert(*service))
        .collect()
}

/// Keeps the first link per requested service, then orders verified links
/// first and by service tag within each group.
fn rank(links: Vec<ResultLink>, requested: &[ServiceKind]) -> Vec<ResultLink> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<ResultLink> = links
        .into_iter()
        .filter(|link| requested.contains(&link.target_service))
        .filter(|link| seen.insert(link.target_service))
        .collect();
    ranked.sort_by(|a, b| {
        b.is_verified
            .cmp(&a.is_verified)
            .then_with(|| a.target_service.as_str().cmp(b.target_service.as_str()))
    });
    ranked
}
