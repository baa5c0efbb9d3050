//! Deezer links: `www.deezer.com/{locale/}{kind}/{id}`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

#[allow(clippy::expect_used)]
static DEEZER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:[a-z]{2}(?:-[a-z]{2})?/)?(track|album|playlist|artist|episode|show)/(\d+)/?$")
        .expect("deezer path regex is valid") // Static pattern, safe to panic
});

/// Parser for Deezer tracks, albums, playlists, artists and podcasts.
#[derive(Debug, Clone)]
pub struct DeezerParser {
    pages: PageFetcher,
}

impl DeezerParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for DeezerParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::Deezer
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        if bare_host(url) != "deezer.com" {
            return None;
        }
        let caps = DEEZER_PATH.captures(url.path())?;
        let kind = caps.get(1)?.as_str();
        let id = caps.get(2)?.as_str();
        let content_type = match kind {
            "track" => ContentType::Song,
            "album" => ContentType::Album,
            "playlist" => ContentType::Playlist,
            "artist" => ContentType::Artist,
            "episode" => ContentType::Podcast,
            _ => ContentType::Show,
        };
        Some(SourceDescriptor::new(
            ServiceKind::Deezer,
            id,
            format!("https://www.deezer.com/{kind}/{id}"),
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
