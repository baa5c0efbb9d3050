//! Tidal links: `tidal.com/{browse/}{kind}/{id}`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

#[allow(clippy::expect_used)]
static TIDAL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:browse/)?(track|album|playlist|artist|video)/([A-Za-z0-9-]+)(?:/u)?/?$")
        .expect("tidal path regex is valid") // Static pattern, safe to panic
});

/// Canonical browse URL for a Tidal item.
#[must_use]
pub(crate) fn browse_url(kind: &str, id: &str) -> String {
    format!("https://tidal.com/browse/{kind}/{id}")
}

/// Parser for Tidal tracks, videos, albums, playlists and artists.
#[derive(Debug, Clone)]
pub struct TidalParser {
    pages: PageFetcher,
}

impl TidalParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for TidalParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::Tidal
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        if !matches!(bare_host(url).as_str(), "tidal.com" | "listen.tidal.com") {
            return None;
        }
        let caps = TIDAL_PATH.captures(url.path())?;
        let kind = caps.get(1)?.as_str();
        let id = caps.get(2)?.as_str();
        let content_type = match kind {
            "album" => ContentType::Album,
            "playlist" => ContentType::Playlist,
            "artist" => ContentType::Artist,
            _ => ContentType::Song,
        };
        Some(SourceDescriptor::new(
            ServiceKind::Tidal,
            id,
            browse_url(kind, id),
            content_type,
        ))
    }

    async fn fetch_metadata(
        &self,
        source: &SourceDescriptor,
    ) -> Result<ContentMetadata, ParseError> {
        self.pages.metadata(source).await
    }
}
