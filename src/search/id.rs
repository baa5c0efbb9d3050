//! Reversible search ids.
//!
//! An id is the URL-safe base64 of `host + path`, plus the first query
//! parameter when the link has one (YouTube keeps its video id there).
//! Decoding restores an `https://` link that identifies the same content.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use url::Url;

use super::SearchError;

/// Encodes `link` as a search id.
///
/// # Errors
///
/// Returns [`SearchError::InvalidSearchId`] when `link` is not an absolute URL.
pub fn encode(link: &str) -> Result<String, SearchError> {
    let url = Url::parse(link).map_err(|_| SearchError::invalid_search_id(link))?;
    let host = url
        .host_str()
        .ok_or_else(|| SearchError::invalid_search_id(link))?;
    let mut raw = format!("{host}{}", url.path());
    if let Some((key, value)) = url.query_pairs().next() {
        let first: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&key, &value)
            .finish();
        raw.push('?');
        raw.push_str(&first);
    }
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Decodes a search id back into a link.
///
/// # Errors
///
/// Returns [`SearchError::InvalidSearchId`] when `id` is not valid base64 of a
/// UTF-8 URL.
pub fn decode(id: &str) -> Result<String, SearchError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(id.trim())
        .map_err(|_| SearchError::invalid_search_id(id))?;
    let raw = String::from_utf8(bytes).map_err(|_| SearchError::invalid_search_id(id))?;
    let link = format!("https://{raw}");
    Url::parse(&link).map_err(|_| SearchError::invalid_search_id(id))?;
    Ok(link)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_drops_scheme_and_extra_params() {
        let id = encode("https://open.spotify.com/track/2Foc5Q5nqNiosCNqttzHof?si=abc&utm=x").unwrap();
        assert_eq!(
            decode(&id).unwrap(),
            "https://open.spotify.com/track/2Foc5Q5nqNiosCNqttzHof?si=abc"
        );
    }

    #[test]
    fn test_youtube_video_id_survives() {
        let id = encode("https://www.youtube.com/watch?v=5NV6Rdv1a3I").unwrap();
        assert_eq!(decode(&id).unwrap(), "https://www.youtube.com/watch?v=5NV6Rdv1a3I");
        assert!(!id.contains('='), "ids are unpadded");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let link = "https://www.deezer.com/track/67238735";
        assert_eq!(encode(link).unwrap(), encode(link).unwrap());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode("!!not base64!!"),
            Err(SearchError::InvalidSearchId { .. })
        ));
        let not_utf8 = URL_SAFE_NO_PAD.encode([0xff, 0xfe]);
        assert!(decode(&not_utf8).is_err());
    }

    #[test]
    fn test_encode_rejects_relative_links() {
        assert!(encode("/track/1").is_err());
    }
}
