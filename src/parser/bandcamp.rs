//! Bandcamp links: `{artist}.bandcamp.com/{track|album}/{slug}`.

use async_trait::async_trait;
use url::Url;

use super::page::PageFetcher;
use super::{ParseError, Parser, bare_host};
use crate::model::{ContentMetadata, ContentType, ServiceKind, SourceDescriptor};

/// Parser for Bandcamp tracks, albums and artist pages.
#[derive(Debug, Clone)]
pub struct BandcampParser {
    pages: PageFetcher,
}

impl BandcampParser {
    #[must_use]
    pub fn new(pages: PageFetcher) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Parser for BandcampParser {
    fn service(&self) -> ServiceKind {
        ServiceKind::Bandcamp
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        let host = bare_host(url);
        let artist = host.strip_suffix(".bandcamp.com")?;
        if artist.is_empty() || artist.contains('.') || artist == "daily" {
            return None;
        }
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        let (id, path, content_type) = match segments.as_slice() {
            [kind @ ("track" | "album"), slug] => {
                let content_type = if *kind == "track" {
                    ContentType::Song
                } else {
                    ContentType::Album
                };
                (
                    format!("{artist}/{kind}/{slug}"),
                    format!("/{kind}/{slug}"),
                    content_type,
                )
            }
            [] | ["music"] => (artist.to_string(), String::new(), ContentType::Artist),
            _ => return None,
        };

        Some(SourceDescriptor::new(
            ServiceKind::Bandcamp,
            id,
            format!("https://{artist}.bandcamp.com{path}"),
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
