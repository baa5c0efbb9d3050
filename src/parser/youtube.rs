//! YouTube and YouTube Music links.

use async_trait::async_trait;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host, query_param};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

const YOUTUBE_HOSTS: [&str; 3] = ["youtube.com", "m.youtube.com", "music.youtube.com"];

fn is_video_id(id: &str) -> bool {
    id.len() >= 6
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn video(id: &str) -> SourceDescriptor {
    SourceDescriptor::new(
        ServiceKind::YouTube,
        id,
        format!("https://www.youtube.com/watch?v={id}"),
        ContentType::Song,
    )
}

/// Parser for videos, playlists and channels on YouTube.
#[derive(Debug, Clone)]
pub struct YouTubeParser {
    pages: PageFetcher,
}

impl YouTubeParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for YouTubeParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::YouTube
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        let host = bare_host(url);
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        if host == "youtu.be" {
            let id = segments.first()?;
            return is_video_id(id).then(|| video(id));
        }
        if !YOUTUBE_HOSTS.contains(&host.as_str()) {
            return None;
        }

        match segments.as_slice() {
            ["watch"] => query_param(url, "v")
                .filter(|id| is_video_id(id))
                .map(|id| video(&id)),
            ["shorts" | "embed" | "live", id] if is_video_id(id) => Some(video(id)),
            ["playlist"] => query_param(url, "list").map(|list| {
                SourceDescriptor::new(
                    ServiceKind::YouTube,
                    &list,
                    format!("https://www.youtube.com/playlist?list={list}"),
                    ContentType::Playlist,
                )
            }),
            ["channel", id, ..] => Some(SourceDescriptor::new(
                ServiceKind::YouTube,
                *id,
                format!("https://www.youtube.com/channel/{id}"),
                ContentType::Artist,
            )),
            [handle, ..] if handle.starts_with('@') && handle.len() > 1 => {
                Some(SourceDescriptor::new(
                    ServiceKind::YouTube,
                    *handle,
                    format!("https://www.youtube.com/{handle}"),
                    ContentType::Artist,
                ))
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
