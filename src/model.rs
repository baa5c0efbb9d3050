//! Shared data model for link resolution.
//!
//! Every value here is produced once and never mutated afterwards; re-resolving
//! a link builds fresh values instead of patching cached ones.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A streaming service the engine can parse links from or search on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceKind {
    Spotify,
    #[serde(rename = "youTube")]
    YouTube,
    AppleMusic,
    Deezer,
    #[serde(rename = "soundCloud")]
    SoundCloud,
    Tidal,
    Qobuz,
    Bandcamp,
    Pandora,
}

impl ServiceKind {
    /// All supported services, in registration order.
    pub const ALL: [ServiceKind; 9] = [
        ServiceKind::Spotify,
        ServiceKind::YouTube,
        ServiceKind::AppleMusic,
        ServiceKind::Deezer,
        ServiceKind::SoundCloud,
        ServiceKind::Tidal,
        ServiceKind::Qobuz,
        ServiceKind::Bandcamp,
        ServiceKind::Pandora,
    ];

    /// Stable service tag used in cache keys, logs and ranking.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::YouTube => "youTube",
            Self::AppleMusic => "appleMusic",
            Self::Deezer => "deezer",
            Self::SoundCloud => "soundCloud",
            Self::Tidal => "tidal",
            Self::Qobuz => "qobuz",
            Self::Bandcamp => "bandcamp",
            Self::Pandora => "pandora",
        }
    }

    /// Maps a link host to the service that owns it.
    ///
    /// Used when classifying links scraped from a cross-reference page.
    #[must_use]
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.trim().trim_start_matches("www.").to_ascii_lowercase();
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if matches("spotify.com") {
            Some(Self::Spotify)
        } else if matches("youtube.com") || host == "youtu.be" {
            Some(Self::YouTube)
        } else if host == "music.apple.com" || host == "podcasts.apple.com" {
            Some(Self::AppleMusic)
        } else if matches("deezer.com") {
            Some(Self::Deezer)
        } else if matches("soundcloud.com") {
            Some(Self::SoundCloud)
        } else if matches("tidal.com") {
            Some(Self::Tidal)
        } else if matches("qobuz.com") {
            Some(Self::Qobuz)
        } else if matches("bandcamp.com") {
            Some(Self::Bandcamp)
        } else if matches("pandora.com") {
            Some(Self::Pandora)
        } else {
            None
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a service tag is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service '{0}'\n  Suggestion: Use one of spotify, youTube, appleMusic, deezer, soundCloud, tidal, qobuz, bandcamp, pandora")]
pub struct UnknownService(pub String);

impl FromStr for ServiceKind {
    type Err = UnknownService;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        Self::ALL
            .into_iter()
            .find(|service| service.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| UnknownService(value.to_string()))
    }
}

/// Kind of content a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    Song,
    Album,
    Playlist,
    Artist,
    Podcast,
    Show,
}

impl ContentType {
    /// Lowercase tag used in synthetic cache keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Album => "album",
            Self::Playlist => "playlist",
            Self::Artist => "artist",
            Self::Podcast => "podcast",
            Self::Show => "show",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical identity of an input link, produced by pattern matching only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub source_type: ServiceKind,
    pub canonical_id: String,
    pub source_url: String,
    pub content_type: ContentType,
}

impl SourceDescriptor {
    #[must_use]
    pub fn new(
        source_type: ServiceKind,
        canonical_id: impl Into<String>,
        source_url: impl Into<String>,
        content_type: ContentType,
    ) -> Self {
        Self {
            source_type,
            canonical_id: canonical_id.into(),
            source_url: source_url.into(),
            content_type,
        }
    }
}

/// Normalized metadata extracted from a source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub title: String,
    pub description: String,
    pub content_type: ContentType,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_preview_url: Option<String>,
}

/// One resolved link on a target service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultLink {
    pub target_service: ServiceKind,
    pub url: String,
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_unavailable: Option<bool>,
}

impl ResultLink {
    /// A link that cleared the verification threshold.
    #[must_use]
    pub fn verified(target_service: ServiceKind, url: impl Into<String>) -> Self {
        Self {
            target_service,
            url: url.into(),
            is_verified: true,
            is_unavailable: None,
        }
    }

    /// True when the best candidate scored below the inclusion threshold.
    #[must_use]
    pub fn unavailable(&self) -> bool {
        self.is_unavailable.unwrap_or(false)
    }
}

/// The externally visible aggregate returned for one resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub content_type: ContentType,
    pub title: String,
    pub description: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_preview_url: Option<String>,
    pub source_url: String,
    pub universal_link: String,
    pub links: Vec<ResultLink>,
}

/// OAuth client-credential token with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub token: String,
    pub expires_at_epoch_seconds: i64,
}

impl AccessToken {
    /// Seconds left before expiry at `now`; negative once expired.
    #[must_use]
    pub fn seconds_remaining(&self, now: i64) -> i64 {
        self.expires_at_epoch_seconds - now
    }
}

/// Current unix time in whole seconds.
pub(crate) fn epoch_seconds_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Error body surfaced to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}
