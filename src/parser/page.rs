//! Open Graph extraction from fetched source pages.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

use super::ParseError;
use crate::http::HttpClient;
use crate::model::{ContentMetadata, ServiceKind, SourceDescriptor};

#[allow(clippy::expect_used)]
static META_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<meta\s[^>]*>").expect("meta tag regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static META_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\b(property|name|content)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("meta attribute regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static TITLE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("entity regex is valid") // Static pattern, safe to panic
});

/// The handful of named fields parsers read from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenGraph {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub audio: Option<String>,
    /// `music:musician` / `og:site_name` style extras, keyed by property name.
    pub extra: HashMap<String, String>,
}

impl OpenGraph {
    /// Parses every `<meta property|name=... content=...>` tag in `html`.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let mut tags: HashMap<String, String> = HashMap::new();
        for tag in META_TAG.find_iter(html) {
            let mut property = None;
            let mut name = None;
            let mut content = None;
            for attr in META_ATTR.captures_iter(tag.as_str()) {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .map_or("", |m| m.as_str());
                match attr[1].to_ascii_lowercase().as_str() {
                    "content" => content = Some(decode_html_entities(value.trim())),
                    "property" => property = Some(value.trim().to_ascii_lowercase()),
                    _ => name = Some(value.trim().to_ascii_lowercase()),
                }
            }
            if let (Some(key), Some(content)) = (property.or(name), content) {
                if !content.is_empty() {
                    tags.entry(key).or_insert(content);
                }
            }
        }

        let title_tag = TITLE_TAG
            .captures(html)
            .map(|c| decode_html_entities(c[1].trim()))
            .filter(|t| !t.is_empty());

        Self {
            title: tags
                .remove("og:title")
                .or_else(|| tags.remove("twitter:title"))
                .or(title_tag),
            description: tags
                .remove("og:description")
                .or_else(|| tags.remove("twitter:description"))
                .or_else(|| tags.remove("description")),
            image: tags
                .remove("og:image")
                .or_else(|| tags.remove("og:image:url"))
                .or_else(|| tags.remove("twitter:image")),
            audio: tags
                .remove("og:audio")
                .or_else(|| tags.remove("og:audio:url"))
                .or_else(|| tags.remove("og:audio:secure_url")),
            extra: tags,
        }
    }

    /// Builds [`ContentMetadata`]; title and image are required.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MetadataNotFound`] naming the first missing field.
    pub fn into_metadata(self, source: &SourceDescriptor) -> Result<ContentMetadata, ParseError> {
        let title = self
            .title
            .ok_or_else(|| ParseError::missing(source.source_type, &source.source_url, "title"))?;
        let image_url = self
            .image
            .ok_or_else(|| ParseError::missing(source.source_type, &source.source_url, "image"))?;
        Ok(ContentMetadata {
            title,
            description: self.description.unwrap_or_default(),
            content_type: source.content_type,
            image_url,
            audio_preview_url: self.audio,
        })
    }
}

/// Fetches source pages and extracts their Open Graph fields.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    http: HttpClient,
    base_url: Option<String>,
}

impl PageFetcher {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: None,
        }
    }

    /// Serves every page from `base_url` instead of the service's own host.
    ///
    /// The path and query of the source link are kept.
    #[must_use]
    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
        }
    }

    /// The URL actually fetched for `source_url`.
    #[must_use]
    pub fn page_url(&self, source_url: &str) -> String {
        let Some(base) = &self.base_url else {
            return source_url.to_string();
        };
        match Url::parse(source_url) {
            Ok(url) => match url.query() {
                Some(query) => format!("{base}{}?{query}", url.path()),
                None => format!("{base}{}", url.path()),
            },
            Err(_) => source_url.to_string(),
        }
    }

    /// GETs the page for `source_url` and parses its meta tags.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Fetch`] when the page cannot be retrieved.
    #[instrument(skip(self), fields(service = %service))]
    pub async fn open_graph(
        &self,
        service: ServiceKind,
        source_url: &str,
    ) -> Result<OpenGraph, ParseError> {
        let html = self
            .http
            .get_text(&self.page_url(source_url))
            .await
            .map_err(|e| ParseError::fetch(service, e))?;
        let og = OpenGraph::parse(&html);
        debug!(
            has_title = og.title.is_some(),
            has_image = og.image.is_some(),
            "parsed page metadata"
        );
        Ok(og)
    }

    /// Fetches the descriptor's page and builds its metadata.
    ///
    /// # Errors
    ///
    /// See [`PageFetcher::open_graph`] and [`OpenGraph::into_metadata`].
    pub async fn metadata(&self, source: &SourceDescriptor) -> Result<ContentMetadata, ParseError> {
        self.open_graph(source.source_type, &source.source_url)
            .await?
            .into_metadata(source)
    }
}

/// Decodes the named and numeric HTML entities that show up in meta tags.
#[must_use]
pub fn decode_html_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let numeric = NUMERIC_ENTITY.replace_all(input, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = match raw.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });
    numeric
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&middot;", "\u{b7}")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ContentType;

    const SPOTIFY_PAGE: &str = r#"<html><head>
        <title>Ignored title</title>
        <meta property="og:title" content="Bohemian Rhapsody - Remastered 2011"/>
        <meta property="og:description" content="Queen &middot; A Night at the Opera &#183; Song &#xB7; 1975"/>
        <meta content="https://i.scdn.co/image/abc" property="og:image"/>
        <meta property="og:audio" content="https://p.scdn.co/mp3-preview/xyz">
        <meta name="music:musician" content="https://open.spotify.com/artist/1dfeR4HaWDbWqFHLkxsg1d">
    </head></html>"#;

    fn spotify_source() -> SourceDescriptor {
        SourceDescriptor::new(
            ServiceKind::Spotify,
            "7tFiyTwD0nx5a1eklYtX2J",
            "https://open.spotify.com/track/7tFiyTwD0nx5a1eklYtX2J",
            ContentType::Song,
        )
    }

    #[test]
    fn test_parse_reads_og_fields_in_any_attribute_order() {
        let og = OpenGraph::parse(SPOTIFY_PAGE);
        assert_eq!(og.title.as_deref(), Some("Bohemian Rhapsody - Remastered 2011"));
        assert_eq!(og.image.as_deref(), Some("https://i.scdn.co/image/abc"));
        assert_eq!(og.audio.as_deref(), Some("https://p.scdn.co/mp3-preview/xyz"));
        assert!(og.extra.contains_key("music:musician"));
    }

    #[test]
    fn test_property_attribute_wins_over_name() {
        let og = OpenGraph::parse(
            r#"<meta property="og:title" name="description" content="Get Lucky">
               <meta name="twitter:image" property="og:image" content="https://img">"#,
        );
        assert_eq!(og.title.as_deref(), Some("Get Lucky"));
        assert_eq!(og.image.as_deref(), Some("https://img"));
        assert_eq!(og.description, None);
    }

    #[test]
    fn test_parse_decodes_numeric_entities() {
        let og = OpenGraph::parse(SPOTIFY_PAGE);
        let description = og.description.unwrap();
        assert!(description.contains("A Night at the Opera · Song · 1975"));
    }

    #[test]
    fn test_title_tag_is_fallback() {
        let og = OpenGraph::parse(
            "<title>Song by Artist</title><meta property='og:image' content='https://img'>",
        );
        assert_eq!(og.title.as_deref(), Some("Song by Artist"));
    }

    #[test]
    fn test_into_metadata_requires_title_and_image() {
        let og = OpenGraph::parse(r#"<meta property="og:title" content="Only title">"#);
        let err = og.into_metadata(&spotify_source()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MetadataNotFound { field: "image", .. }
        ));

        let err = OpenGraph::default().into_metadata(&spotify_source()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MetadataNotFound { field: "title", .. }
        ));
    }

    #[test]
    fn test_into_metadata_carries_content_type_from_source() {
        let metadata = OpenGraph::parse(SPOTIFY_PAGE)
            .into_metadata(&spotify_source())
            .unwrap();
        assert_eq!(metadata.content_type, ContentType::Song);
        assert_eq!(
            metadata.audio_preview_url.as_deref(),
            Some("https://p.scdn.co/mp3-preview/xyz")
        );
    }

    #[test]
    fn test_page_url_rebases_onto_base_url() {
        let http = HttpClient::new().unwrap();
        let live = PageFetcher::new(http.clone());
        assert_eq!(
            live.page_url("https://www.youtube.com/watch?v=abc"),
            "https://www.youtube.com/watch?v=abc"
        );
        let mocked = PageFetcher::with_base_url(http, "http://127.0.0.1:9999/");
        assert_eq!(
            mocked.page_url("https://www.youtube.com/watch?v=abc"),
            "http://127.0.0.1:9999/watch?v=abc"
        );
        assert_eq!(
            mocked.page_url("https://tidal.com/browse/track/1/u"),
            "http://127.0.0.1:9999/browse/track/1/u"
        );
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(decode_html_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_html_entities("&quot;Hi&quot; &#39;there&#x27;"), "\"Hi\" 'there'");
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_html_entities("plain"), "plain");
    }
}
