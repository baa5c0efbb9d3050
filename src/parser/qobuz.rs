//! Qobuz links from the player (`open.qobuz.com`) and the store (`www.qobuz.com`).

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

#[allow(clippy::expect_used)]
static PLAYER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(track|album|playlist|artist)/([A-Za-z0-9]+)/?$")
        .expect("qobuz player path regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static STORE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/[a-z]{2}-[a-z]{2}/(album|interpreter)/[^/]+/([A-Za-z0-9]+)/?$")
        .expect("qobuz store path regex is valid") // Static pattern, safe to panic
});

fn descriptor(kind: &str, id: &str) -> SourceDescriptor {
    let content_type = match kind {
        "track" => ContentType::Song,
        "playlist" => ContentType::Playlist,
        "artist" => ContentType::Artist,
        _ => ContentType::Album,
    };
    SourceDescriptor::new(
        ServiceKind::Qobuz,
        id,
        format!("https://open.qobuz.com/{kind}/{id}"),
        content_type,
    )
}

/// Parser for Qobuz tracks, albums, playlists and artists.
#[derive(Debug, Clone)]
pub struct QobuzParser {
    pages: PageFetcher,
}

impl QobuzParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for QobuzParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::Qobuz
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        match bare_host(url).as_str() {
            "open.qobuz.com" | "play.qobuz.com" => {
                let caps = PLAYER_PATH.captures(url.path())?;
                Some(descriptor(caps.get(1)?.as_str(), caps.get(2)?.as_str()))
            }
            "qobuz.com" => {
                let caps = STORE_PATH.captures(url.path())?;
                let kind = match caps.get(1)?.as_str() {
                    "interpreter" => "artist",
                    other => other,
                };
                Some(descriptor(kind, caps.get(2)?.as_str()))
            }
            _ => None,
        }
    }

    async fn fetch_metadata(
        &self,
        source: &SourceDescriptor,
    ) -> Result<ContentMetadata, ParseError> {
        self.pages.metadata(source).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::HttpClient;

    fn identify(link: &str) -> Option<SourceDescriptor> {
        QobuzParser::new(PageFetcher::new(HttpClient::new().unwrap()))
            .identify(&Url::parse(link).unwrap())
    }

    #[test]
    fn test_identify_player_links() {
        let track = identify("https://open.qobuz.com/track/59954869").unwrap();
        assert_eq!(track.content_type, ContentType::Song);
        let album = identify("https://play.qobuz.com/album/0060254735180").unwrap();
        assert_eq!(album.source_url, "https://open.qobuz.com/album/0060254735180");
    }

    #[test]
    fn test_identify_store_links_map_to_player_urls() {
        let album =
            identify("https://www.qobuz.com/us-en/album/abbey-road-the-beatles/0060254735180")
                .unwrap();
        assert_eq!(album.content_type, ContentType::Album);
        assert_eq!(album.source_url, "https://open.qobuz.com/album/0060254735180");

        let artist = identify("https://www.qobuz.com/fr-fr/interpreter/the-beatles/26390").unwrap();
        assert_eq!(artist.content_type, ContentType::Artist);
        assert_eq!(artist.source_url, "https://open.qobuz.com/artist/26390");
    }

    #[test]
    fn test_identify_rejects_store_pages() {
        assert!(identify("https://www.qobuz.com/us-en/discover").is_none());
    }
}
