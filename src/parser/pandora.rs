//! Pandora links, identified by the typed id in their last path segment.
//!
//! `TR…` tracks, `AL…` albums and `AR…` artists live under `/artist/`,
//! `PL:…` playlists under `/playlist/`, `PC:…`/`PE:…` podcasts under
//! `/podcast/`.

use async_trait::async_trait;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

fn content_type(section: &str, id: &str) -> Option<ContentType> {
    match section {
        "artist" if id.starts_with("TR") => Some(ContentType::Song),
        "artist" if id.starts_with("AL") => Some(ContentType::Album),
        "artist" if id.starts_with("AR") => Some(ContentType::Artist),
        "playlist" if id.starts_with("PL:") => Some(ContentType::Playlist),
        "podcast" if id.starts_with("PE:") => Some(ContentType::Podcast),
        "podcast" if id.starts_with("PC:") => Some(ContentType::Show),
        _ => None,
    }
}

/// Parser for Pandora tracks, albums, artists, playlists and podcasts.
#[derive(Debug, Clone)]
pub struct PandoraParser {
    pages: PageFetcher,
}

impl PandoraParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for PandoraParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::Pandora
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        if bare_host(url) != "pandora.com" {
            return None;
        }
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            return None;
        }
        let section = *segments.first()?;
        let id = *segments.last()?;
        let content_type = content_type(section, id)?;
        Some(SourceDescriptor::new(
            ServiceKind::Pandora,
            id,
            format!("https://www.pandora.com/{}", segments.join("/")),
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
