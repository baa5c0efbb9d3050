//! Apple Music and Apple Podcasts links.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host, query, query_param};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

#[allow(clippy::expect_used)]
static MUSIC_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-z]{2})/(album|playlist|artist|song|music-video)/(?:([^/]+)/)?([^/]+)/?$")
        .expect("apple music path regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static PODCAST_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-z]{2})/podcast/(?:([^/]+)/)?id(\d+)/?$")
        .expect("apple podcast path regex is valid") // Static pattern, safe to panic
});

/// Apple page titles read "Work by Artist on Apple Music".
#[allow(clippy::expect_used)]
static APPLE_BYLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s(?:on|en|sur|bei|su|no|op|på)\s+apple music\s*$")
        .expect("apple byline regex is valid") // Static pattern, safe to panic
});

/// Parser for Apple Music albums, songs, playlists, artists and podcasts.
#[derive(Debug, Clone)]
pub struct AppleMusicParser {
    pages: PageFetcher,
}

impl AppleMusicParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }

    fn identify_music(url: &Url) -> Option<SourceDescriptor> {
        let caps = MUSIC_PATH.captures(url.path())?;
        let country = caps.get(1)?.as_str();
        let kind = caps.get(2)?.as_str();
        let slug = caps.get(3).map(|m| m.as_str());
        let id = caps.get(4)?.as_str();
        let path = match slug {
            Some(slug) => format!("{kind}/{slug}/{id}"),
            None => format!("{kind}/{id}"),
        };

        // An album link with `?i=` points at one track on that album.
        if kind == "album" {
            if let Some(track) = query_param(url, "i") {
                return Some(SourceDescriptor::new(
                    ServiceKind::AppleMusic,
                    &track,
                    format!("https://music.apple.com/{country}/{path}?i={track}"),
                    ContentType::Song,
                ));
            }
        }

        let content_type = match kind {
            "album" => ContentType::Album,
            "playlist" => ContentType::Playlist,
            "artist" => ContentType::Artist,
            _ => ContentType::Song,
        };
        Some(SourceDescriptor::new(
            ServiceKind::AppleMusic,
            id,
            format!("https://music.apple.com/{country}/{path}"),
            content_type,
        ))
    }

    fn identify_podcast(url: &Url) -> Option<SourceDescriptor> {
        let caps = PODCAST_PATH.captures(url.path())?;
        let country = caps.get(1)?.as_str();
        let slug = caps.get(2).map_or("", |m| m.as_str());
        let show = caps.get(3)?.as_str();
        let base = if slug.is_empty() {
            format!("https://podcasts.apple.com/{country}/podcast/id{show}")
        } else {
            format!("https://podcasts.apple.com/{country}/podcast/{slug}/id{show}")
        };
        Some(match query_param(url, "i") {
            Some(episode) => SourceDescriptor::new(
                ServiceKind::AppleMusic,
                &episode,
                format!("{base}?i={episode}"),
                ContentType::Podcast,
            ),
            None => SourceDescriptor::new(ServiceKind::AppleMusic, show, base, ContentType::Show),
        })
    }
}

#[async_trait]
impl Parser for AppleMusicParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::AppleMusic
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        match bare_host(url).as_str() {
            "music.apple.com" | "geo.music.apple.com" => Self::identify_music(url),
            "podcasts.apple.com" => Self::identify_podcast(url),
            _ => None,
        }
    }

    async fn fetch_metadata(
        &self,
        source: &SourceDescriptor,
    ) -> Result<ContentMetadata, ParseError> {
        self.pages.metadata(source).await
    }

    fn derive_query(&self, metadata: &ContentMetadata) -> String {
        query::derive_byline_query(metadata, APPLE_BYLINE.is_match(&metadata.title))
    }
}
