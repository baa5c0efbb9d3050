//! SoundCloud links, classified by path shape.
//!
//! `/{user}` is an artist, `/{user}/sets/{slug}` a playlist (albums are sets
//! too) and `/{user}/{track}` a song.

use async_trait::async_trait;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

/// First path segments that are site pages, not users.
const RESERVED_ROOTS: [&str; 12] = [
    "discover",
    "search",
    "stream",
    "you",
    "charts",
    "upload",
    "pages",
    "settings",
    "messages",
    "notifications",
    "terms-of-use",
    "signin",
];

/// Second path segments that are user sub-pages, not tracks.
const RESERVED_USER_PAGES: [&str; 9] = [
    "tracks",
    "albums",
    "sets",
    "reposts",
    "likes",
    "followers",
    "following",
    "popular-tracks",
    "comments",
];

/// Parser for SoundCloud tracks, sets and user pages.
#[derive(Debug, Clone)]
pub struct SoundCloudParser {
    pages: PageFetcher,
}

impl SoundCloudParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for SoundCloudParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::SoundCloud
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        let host = bare_host(url);
        if host != "soundcloud.com" && host != "m.soundcloud.com" {
            return None;
        }
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        let content_type = match segments.as_slice() {
            [user] if !RESERVED_ROOTS.contains(user) => ContentType::Artist,
            [user, "sets", _] if !RESERVED_ROOTS.contains(user) => ContentType::Playlist,
            [user, track]
                if !RESERVED_ROOTS.contains(user) && !RESERVED_USER_PAGES.contains(track) =>
            {
                ContentType::Song
            }
            _ => return None,
        };

        let id = segments.join("/").to_ascii_lowercase();
        Some(SourceDescriptor::new(
            ServiceKind::SoundCloud,
            &id,
            format!("https://soundcloud.com/{id}"),
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::HttpClient;

    fn identify(link: &str) -> Option<SourceDescriptor> {
        SoundCloudParser::new(PageFetcher::new(HttpClient::new().unwrap()))
            .identify(&Url::parse(link).unwrap())
    }

    #[test]
    fn test_identify_track_set_and_user() {
        let track = identify("https://soundcloud.com/m83/midnight-city?in=x/sets/y").unwrap();
        assert_eq!(track.content_type, ContentType::Song);
        assert_eq!(track.canonical_id, "m83/midnight-city");
        assert_eq!(track.source_url, "https://soundcloud.com/m83/midnight-city");

        let set = identify("https://soundcloud.com/m83/sets/hurry-up-were-dreaming").unwrap();
        assert_eq!(set.content_type, ContentType::Playlist);

        let user = identify("https://m.soundcloud.com/m83/").unwrap();
        assert_eq!(user.content_type, ContentType::Artist);
        assert_eq!(user.source_url, "https://soundcloud.com/m83");
    }

    #[test]
    fn test_identify_rejects_site_pages() {
        assert!(identify("https://soundcloud.com/discover").is_none());
        assert!(identify("https://soundcloud.com/m83/likes").is_none());
        assert!(identify("https://soundcloud.com/").is_none());
        assert!(identify("https://soundcloud.com/a/b/c/d").is_none());
    }
}
