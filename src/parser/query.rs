//! Search query derivation from page titles.
//!
//! Titles scraped from service pages carry platform decoration ("on Apple
//! Music", "| Listen online for free on SoundCloud", "(Official Video)").
//! Adapters score candidates against the query, so the decoration has to go.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{ContentMetadata, ContentType};

#[allow(clippy::expect_used)]
static PLATFORM_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*(?:\|\s*listen online for free on soundcloud|[-|]\s*youtube(?: music)?|\b(?:on|en|sur|bei|su|no|op|på)\s+(?:apple music|spotify|tidal|deezer|pandora|qobuz|soundcloud|youtube music))\s*$",
    )
    .expect("platform suffix regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static STREAM_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:stream|listen to)\s+").expect("stream prefix regex is valid") // Static pattern, safe to panic
});

/// "Work - Album by Artist" as Apple Music style pages title their content,
/// including the localized type words and connectors.
#[allow(clippy::expect_used)]
static TYPE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(.+?)\s+[-\x{2013}\x{2014}]\s+(?:single|ep|album|álbum|song|canción|chanson|lied|playlist|podcast)\s+(?:by|von|de|par|di|door|av|przez)\s+(.+)$",
    )
    .expect("type clause regex is valid") // Static pattern, safe to panic
});

/// A trailing " - Single" style type word with no artist clause.
#[allow(clippy::expect_used)]
static TYPE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s+[-\x{2013}\x{2014}]\s+(?:single|ep|album|álbum|song|canción|chanson|lied|playlist|podcast)\s*$",
    )
    .expect("type suffix regex is valid") // Static pattern, safe to panic
});

/// Bandcamp's "Work, by Artist".
#[allow(clippy::expect_used)]
static COMMA_BY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?),\s+by\s+(.+)$").expect("comma-by regex is valid") // Static pattern, safe to panic
});

/// "Title by Artist" in the languages service pages are localized to.
#[allow(clippy::expect_used)]
static BY_ARTIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+)\s+(?:by|von|de|par|di|door|av|przez)\s+(.+)$")
        .expect("by-artist regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static VIDEO_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*[\(\[](?:official\s+)?(?:music\s+|lyric\s+|audio\s+|hd\s+|4k\s+)?(?:video|audio|lyrics?|visualizer|mv|hd|4k)(?:\s+video)?[\)\]]",
    )
    .expect("video noise regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("whitespace regex is valid") // Static pattern, safe to panic
});

/// Removes zero-width and bidi control characters.
#[must_use]
pub fn strip_invisible(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            )
        })
        .collect()
}

/// Drops trailing "on Apple Music" style platform decoration.
#[must_use]
pub fn strip_platform_suffix(title: &str) -> String {
    let mut current = title.trim().to_string();
    loop {
        let next = PLATFORM_SUFFIX.replace(&current, "").trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Drops "(Official Video)" style decoration from video titles.
#[must_use]
pub fn strip_video_noise(title: &str) -> String {
    VIDEO_NOISE.replace_all(title, "").trim().to_string()
}

/// Splits "Album by Artist" (and its localized forms) at the last "by".
///
/// Returns `None` when no artist clause is present.
#[must_use]
pub fn split_by_artist(title: &str) -> Option<(String, String)> {
    let caps = BY_ARTIST.captures(title)?;
    let work = caps[1].trim().trim_end_matches(',').trim_end().to_string();
    let artist = caps[2].trim().to_string();
    (!work.is_empty() && !artist.is_empty()).then_some((work, artist))
}

fn collapse_whitespace(input: &str) -> String {
    WHITESPACE.replace_all(input.trim(), " ").into_owned()
}

/// Cleans a raw page title into "{title} {artist}" form.
///
/// The artist clause is only split off where the page title format marks
/// one: "Work - Album by Artist" and SoundCloud's "Stream Work by Artist".
/// Any other title is kept whole, so "Stand by Me" stays intact.
#[must_use]
pub fn clean_title(raw: &str) -> String {
    clean(raw).0
}

/// The cleaned title and whether an artist clause was found in it.
pub(crate) fn clean(raw: &str) -> (String, bool) {
    clean_with_byline(raw, false)
}

/// Like [`clean`], for pages whose whole title reads "Work by Artist" when
/// `byline` is set.
pub(crate) fn clean_with_byline(raw: &str, byline: bool) -> (String, bool) {
    let title = strip_invisible(raw);
    let title = strip_platform_suffix(&title);
    let streamed = STREAM_PREFIX.is_match(&title);
    let title = STREAM_PREFIX.replace(&title, "");
    let title = strip_video_noise(&title);

    let marked = TYPE_CLAUSE
        .captures(&title)
        .or_else(|| COMMA_BY.captures(&title))
        .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()));
    let split = match marked {
        Some(parts) => Some(parts),
        None if streamed || byline => split_by_artist(&title),
        None => None,
    };
    match split {
        Some((work, artist)) => (collapse_whitespace(&format!("{work} {artist}")), true),
        None => (collapse_whitespace(&TYPE_SUFFIX.replace(&title, "")), false),
    }
}

/// Derives the search query for `metadata`.
///
/// Playlists always get a "playlist" hint. Albums get an "album" hint only
/// when the title carries no artist to disambiguate them.
#[must_use]
pub fn derive_query(metadata: &ContentMetadata) -> String {
    let (query, has_artist) = clean(&metadata.title);
    with_type_hint(query, metadata.content_type, has_artist)
}

/// [`derive_query`] for pages whose title is a "Work by Artist" byline.
pub(crate) fn derive_byline_query(metadata: &ContentMetadata, byline: bool) -> String {
    let (query, has_artist) = clean_with_byline(&metadata.title, byline);
    with_type_hint(query, metadata.content_type, has_artist)
}

/// Appends the content-type hint to an already cleaned query.
#[must_use]
pub fn with_type_hint(query: String, content_type: ContentType, has_artist: bool) -> String {
    match content_type {
        ContentType::Playlist if !query.to_lowercase().contains("playlist") => {
            format!("{query} playlist")
        }
        ContentType::Album if !has_artist && !query.to_lowercase().contains("album") => {
            format!("{query} album")
        }
        _ => query,
    }
}
