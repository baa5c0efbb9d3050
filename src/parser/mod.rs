//! Link identification and source metadata extraction.
//!
//! Every supported service has a [`Parser`] that recognizes its links by
//! shape alone, fetches the page behind a link, and derives the search query
//! adapters use on other services. [`ParserSet`] dispatches to the right one
//! and caches metadata by `(service, canonical id)`.
//!
//! # Example
//!
//! ```no_run
//! use songbridge_core::cache::Cache;
//! use songbridge_core::http::HttpClient;
//! use songbridge_core::parser::ParserSet;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let parsers = ParserSet::with_defaults(HttpClient::new()?, Cache::in_memory());
//! let source = parsers.identify("https://open.spotify.com/track/7tFiyTwD0nx5a1eklYtX2J")?;
//! let metadata = parsers.metadata(&source).await?;
//! println!("query: {}", parsers.derive_query(&source, &metadata));
//! # Ok(())
//! # }
//! ```

mod apple_music;
mod bandcamp;
mod deezer;
mod error;
mod page;
mod pandora;
mod qobuz;
pub mod query;
mod soundcloud;
mod spotify;
mod tidal;
mod youtube;

pub use apple_music::AppleMusicParser;
pub use bandcamp::BandcampParser;
pub use deezer::DeezerParser;
pub use error::ParseError;
pub use page::{OpenGraph, PageFetcher, decode_html_entities};
pub use pandora::PandoraParser;
pub use qobuz::QobuzParser;
pub use soundcloud::SoundCloudParser;
pub use spotify::SpotifyParser;
pub use tidal::TidalParser;
pub(crate) use tidal::browse_url as tidal_browse_url;
pub use youtube::YouTubeParser;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use crate::cache::Cache;
use crate::http::HttpClient;
use crate::model::{ContentMetadata, ServiceKind, SourceDescriptor};

/// Per-service link recognition and metadata extraction.
#[async_trait]
pub trait Parser: Send + Sync {
    /// The service whose links this parser understands.
    fn service(&self) -> ServiceKind;

    /// Recognizes a link by shape. Performs no I/O.
    fn identify(&self, url: &Url) -> Option<SourceDescriptor>;

    /// Fetches the page behind `source` and extracts its metadata.
    async fn fetch_metadata(&self, source: &SourceDescriptor)
    -> Result<ContentMetadata, ParseError>;

    /// Builds the search query other services are searched with.
    fn derive_query(&self, metadata: &ContentMetadata) -> String {
        query::derive_query(metadata)
    }
}

/// Registry of parsers, tried in registration order.
pub struct ParserSet {
    parsers: Vec<Box<dyn Parser>>,
    cache: Cache,
}

impl std::fmt::Debug for ParserSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserSet")
            .field(
                "parsers",
                &self.parsers.iter().map(|p| p.service()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ParserSet {
    /// An empty set. Register parsers with [`ParserSet::register`].
    #[must_use]
    pub fn new(cache: Cache) -> Self {
        Self {
            parsers: Vec::new(),
            cache,
        }
    }

    /// A set with every built-in parser fetching pages from the live services.
    #[must_use]
    pub fn with_defaults(http: HttpClient, cache: Cache) -> Self {
        Self::with_page_fetcher(PageFetcher::new(http), cache)
    }

    /// A set with every built-in parser sharing `pages`.
    #[must_use]
    pub fn with_page_fetcher(pages: PageFetcher, cache: Cache) -> Self {
        let mut set = Self::new(cache);
        set.register(Box::new(SpotifyParser::new(pages.clone())));
        set.register(Box::new(YouTubeParser::new(pages.clone())));
        set.register(Box::new(AppleMusicParser::new(pages.clone())));
        set.register(Box::new(DeezerParser::new(pages.clone())));
        set.register(Box::new(SoundCloudParser::new(pages.clone())));
        set.register(Box::new(TidalParser::new(pages.clone())));
        set.register(Box::new(QobuzParser::new(pages.clone())));
        set.register(Box::new(BandcampParser::new(pages.clone())));
        set.register(Box::new(PandoraParser::new(pages)));
        set
    }

    pub fn register(&mut self, parser: Box<dyn Parser>) {
        debug!(service = %parser.service(), "registering parser");
        self.parsers.push(parser);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// The parser registered for `service`, if any.
    #[must_use]
    pub fn parser_for(&self, service: ServiceKind) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.service() == service)
            .map(AsRef::as_ref)
    }

    /// Recognizes `link`, trying each parser in order.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnrecognizedLink`] when the link is not an
    /// http(s) URL or no parser claims it.
    #[instrument(skip(self))]
    pub fn identify(&self, link: &str) -> Result<SourceDescriptor, ParseError> {
        let url = Url::parse(link.trim()).map_err(|_| ParseError::unrecognized(link))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ParseError::unrecognized(link));
        }
        self.parsers
            .iter()
            .find_map(|parser| parser.identify(&url))
            .inspect(|source| {
                debug!(
                    service = %source.source_type,
                    id = %source.canonical_id,
                    content_type = %source.content_type,
                    "identified link"
                );
            })
            .ok_or_else(|| ParseError::unrecognized(link))
    }

    /// Metadata for `source`, served from cache when present.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnrecognizedLink`] when no parser handles the
    /// source service, or whatever the parser's fetch returns.
    #[instrument(skip(self, source), fields(service = %source.source_type, id = %source.canonical_id))]
    pub async fn metadata(&self, source: &SourceDescriptor) -> Result<ContentMetadata, ParseError> {
        if let Some(cached) = self
            .cache
            .metadata(source.source_type, &source.canonical_id)
            .await
        {
            debug!("metadata cache hit");
            return Ok(cached);
        }

        let parser = self
            .parser_for(source.source_type)
            .ok_or_else(|| ParseError::unrecognized(&source.source_url))?;
        let metadata = parser.fetch_metadata(source).await?;
        self.cache
            .put_metadata(source.source_type, &source.canonical_id, &metadata)
            .await;
        Ok(metadata)
    }

    /// The search query for `metadata` as its source parser derives it.
    #[must_use]
    pub fn derive_query(&self, source: &SourceDescriptor, metadata: &ContentMetadata) -> String {
        self.parser_for(source.source_type)
            .map_or_else(|| query::derive_query(metadata), |p| p.derive_query(metadata))
    }
}

/// Lowercased host without a leading `www.`.
pub(crate) fn bare_host(url: &Url) -> String {
    url.host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .to_ascii_lowercase()
}

/// First value of query parameter `name`.
pub(crate) fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
