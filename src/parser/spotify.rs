//! Spotify links: `open.spotify.com/{intl-xx/}{kind}/{id}`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::page::PageFetcher;
use super::query::{clean, with_type_hint};
use super::{ParseError, Parser, bare_host};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

#[allow(clippy::expect_used)]
static SPOTIFY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/(?:intl-[a-z]{2}(?:-[a-zA-Z]{2})?/)?(?:embed/)?(track|album|playlist|artist|episode|show)/([A-Za-z0-9]{8,})/?$",
    )
    .expect("spotify path regex is valid") // Static pattern, safe to panic
});

fn content_type(kind: &str) -> Option<ContentType> {
    match kind {
        "track" => Some(ContentType::Song),
        "album" => Some(ContentType::Album),
        "playlist" => Some(ContentType::Playlist),
        "artist" => Some(ContentType::Artist),
        "episode" => Some(ContentType::Podcast),
        "show" => Some(ContentType::Show),
        _ => None,
    }
}

/// Pulls the artist out of a Spotify page description.
///
/// Descriptions are `·`-separated: `"Artist · Album · Song · 2020"`, or
/// `"Listen to X on Spotify. Song · Artist · 2020"` on newer pages.
fn artist_from_description(description: &str) -> Option<String> {
    let segments: Vec<&str> = description.split('\u{b7}').map(str::trim).collect();
    let first = segments.first()?;
    let artist = if first.starts_with("Listen to") {
        segments.get(1)?
    } else {
        first
    };
    (!artist.is_empty() && segments.len() > 1).then(|| (*artist).to_string())
}

/// Parser for Spotify track, album, playlist, artist, episode and show links.
#[derive(Debug, Clone)]
pub struct SpotifyParser {
    pages: PageFetcher,
}

impl SpotifyParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for SpotifyParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::Spotify
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        let host = bare_host(url);
        if host != "open.spotify.com" && host != "play.spotify.com" {
            return None;
        }
        let caps = SPOTIFY_PATH.captures(url.path())?;
        let kind = caps.get(1)?.as_str();
        let id = caps.get(2)?.as_str();
        Some(SourceDescriptor::new(
            ServiceKind::Spotify,
            id,
            format!("https://open.spotify.com/{kind}/{id}"),
            content_type(kind)?,
        ))
    }

    async fn fetch_metadata(
        &self,
        source: &SourceDescriptor,
    ) -> Result<ContentMetadata, ParseError> {
        self.pages.metadata(source).await
    }

    fn derive_query(&self, metadata: &ContentMetadata) -> String {
        let (title, has_artist) = clean(&metadata.title);
        let artist = match metadata.content_type {
            ContentType::Song | ContentType::Album => {
                artist_from_description(&metadata.description)
            }
            _ => None,
        };
        match artist {
            Some(artist) if !title.contains(&artist) => {
                with_type_hint(format!("{title} {artist}"), metadata.content_type, true)
            }
            _ => with_type_hint(title, metadata.content_type, has_artist),
        }
    }
}
