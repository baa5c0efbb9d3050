//! Integration tests for the search orchestrator with in-process parsers and adapters.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use songbridge_core::adapter::{Adapter, AdapterError, AdapterQuery, AdapterSet};
use songbridge_core::cache::{Cache, SEARCH_COUNT_KEY};
use songbridge_core::model::{
    ContentMetadata, ContentType, ResultLink, ServiceKind, SourceDescriptor,
};
use songbridge_core::parser::{ParseError, Parser, ParserSet};
use songbridge_core::search::{
    CrossReference, LinkShortener, SearchError, SearchOptions, SearchOrchestrator, SearchRequest,
    ShortenError, universal_link,
};
use url::Url;

const SPOTIFY_TRACK: &str = "https://open.spotify.com/track/2Foc5Q5nqNiosCNqttzHof";
const DEEZER_TRACK: &str = "https://www.deezer.com/track/3135556";

/// Recognizes `https://{host}/track/{id}` and serves fixed metadata.
struct StaticParser {
    service: ServiceKind,
    host: &'static str,
    title: &'static str,
    fetches: Arc<AtomicUsize>,
}

impl StaticParser {
    fn new(service: ServiceKind, host: &'static str, title: &'static str) -> Self {
        Self {
            service,
            host,
            title,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Parser for StaticParser {
    fn service(&self) -> ServiceKind {
        self.service
    }

    fn identify(&self, url: &Url) -> Option<SourceDescriptor> {
        if url.host_str()? != self.host {
            return None;
        }
        let id = url.path().strip_prefix("/track/")?;
        Some(SourceDescriptor::new(
            self.service,
            id,
            format!("https://{}/track/{id}", self.host),
            ContentType::Song,
        ))
    }

    async fn fetch_metadata(
        &self,
        _source: &SourceDescriptor,
    ) -> Result<ContentMetadata, ParseError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(ContentMetadata {
            title: self.title.to_string(),
            description: format!("{} description", self.title),
            content_type: ContentType::Song,
            image_url: format!("https://{}/cover.jpg", self.host),
            audio_preview_url: None,
        })
    }
}

enum Outcome {
    Found(ResultLink),
    Nothing,
    Fails,
}

struct ScriptedAdapter {
    service: ServiceKind,
    outcome: Outcome,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn service(&self) -> ServiceKind {
        self.service
    }

    async fn search(&self, _query: &AdapterQuery) -> Result<Option<ResultLink>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Found(link) => Ok(Some(link.clone())),
            Outcome::Nothing => Ok(None),
            Outcome::Fails => Err(AdapterError::Decode {
                service: self.service,
                reason: "scripted failure".to_string(),
            }),
        }
    }
}

struct StaticCrossReference {
    links: Vec<ResultLink>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CrossReference for StaticCrossReference {
    async fn links(&self, _hub_link: &ResultLink) -> Vec<ResultLink> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.links.clone()
    }
}

struct FixedShortener;

#[async_trait]
impl LinkShortener for FixedShortener {
    async fn shorten(&self, _link: &str) -> Result<String, ShortenError> {
        Ok("https://sbr.link/abc".to_string())
    }
}

fn verified(service: ServiceKind) -> ResultLink {
    ResultLink::verified(service, format!("https://{}.test/match", service.as_str()))
}

fn unverified(service: ServiceKind) -> ResultLink {
    ResultLink {
        is_verified: false,
        ..verified(service)
    }
}

fn unavailable(service: ServiceKind) -> ResultLink {
    ResultLink {
        is_unavailable: Some(true),
        ..unverified(service)
    }
}

/// Test fixture: orchestrator plus the call counters of its collaborators.
struct Harness {
    adapters: AdapterSet,
    adapter_calls: Vec<(ServiceKind, Arc<AtomicUsize>)>,
    cross_links: Vec<ResultLink>,
    cross_calls: Arc<AtomicUsize>,
    source_fetches: Arc<AtomicUsize>,
    cache: Cache,
}

impl Harness {
    fn new() -> Self {
        Self {
            adapters: AdapterSet::new(),
            adapter_calls: Vec::new(),
            cross_links: Vec::new(),
            cross_calls: Arc::new(AtomicUsize::new(0)),
            source_fetches: Arc::new(AtomicUsize::new(0)),
            cache: Cache::in_memory(),
        }
    }

    fn adapter(mut self, service: ServiceKind, outcome: Outcome) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        self.adapter_calls.push((service, Arc::clone(&calls)));
        self.adapters.register(Box::new(ScriptedAdapter {
            service,
            outcome,
            calls,
        }));
        self
    }

    fn cross_links(mut self, links: Vec<ResultLink>) -> Self {
        self.cross_links = links;
        self
    }

    fn calls(&self, service: ServiceKind) -> usize {
        self.adapter_calls
            .iter()
            .find(|(s, _)| *s == service)
            .map_or(0, |(_, calls)| calls.load(Ordering::SeqCst))
    }

    fn build(&mut self) -> SearchOrchestrator {
        let mut parsers = ParserSet::new(self.cache.clone());
        let spotify = StaticParser::new(ServiceKind::Spotify, "open.spotify.com", "Get Lucky");
        self.source_fetches = Arc::clone(&spotify.fetches);
        parsers.register(Box::new(spotify));
        parsers.register(Box::new(StaticParser::new(
            ServiceKind::Deezer,
            "www.deezer.com",
            "Get Lucky (Radio Edit)",
        )));
        parsers.register(Box::new(StaticParser::new(
            ServiceKind::Tidal,
            "tidal.test",
            "Get Lucky",
        )));

        SearchOrchestrator::new(
            parsers,
            std::mem::take(&mut self.adapters),
            self.cache.clone(),
            Box::new(StaticCrossReference {
                links: self.cross_links.clone(),
                calls: Arc::clone(&self.cross_calls),
            }),
            SearchOptions::default(),
        )
    }
}

fn services(links: &[ResultLink]) -> Vec<ServiceKind> {
    links.iter().map(|l| l.target_service).collect()
}

#[tokio::test]
async fn test_resolution_ranks_verified_links_first() {
    let mut harness = Harness::new()
        .adapter(ServiceKind::YouTube, Outcome::Found(unavailable(ServiceKind::YouTube)))
        .adapter(ServiceKind::Deezer, Outcome::Found(verified(ServiceKind::Deezer)))
        .adapter(ServiceKind::Qobuz, Outcome::Found(unverified(ServiceKind::Qobuz)));
    let orchestrator = harness.build();

    let request = SearchRequest::link(SPOTIFY_TRACK).with_adapters([
        ServiceKind::Spotify,
        ServiceKind::YouTube,
        ServiceKind::Deezer,
        ServiceKind::Qobuz,
    ]);
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(
        services(&result.links),
        vec![
            ServiceKind::Deezer,
            ServiceKind::Spotify,
            ServiceKind::Qobuz,
            ServiceKind::YouTube,
        ]
    );
    let youtube = result.links.last().unwrap();
    assert!(!youtube.is_verified);
    assert!(youtube.unavailable());
    assert_eq!(result.source_url, SPOTIFY_TRACK);
    assert_eq!(result.title, "Get Lucky");
    assert_eq!(result.content_type, ContentType::Song);
    assert_eq!(
        result.universal_link,
        universal_link(&SearchOptions::default().app_url, &result.id)
    );
    assert_eq!(harness.cross_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hub_cross_reference_skips_covered_adapters() {
    let mut harness = Harness::new()
        .adapter(ServiceKind::Tidal, Outcome::Found(verified(ServiceKind::Tidal)))
        .adapter(ServiceKind::Deezer, Outcome::Found(verified(ServiceKind::Deezer)))
        .adapter(ServiceKind::AppleMusic, Outcome::Nothing)
        .adapter(ServiceKind::Qobuz, Outcome::Found(verified(ServiceKind::Qobuz)))
        .cross_links(vec![
            unverified(ServiceKind::Deezer),
            unverified(ServiceKind::AppleMusic),
            unverified(ServiceKind::Pandora),
        ]);
    let orchestrator = harness.build();

    let request = SearchRequest::link(SPOTIFY_TRACK).with_adapters([
        ServiceKind::Tidal,
        ServiceKind::Deezer,
        ServiceKind::AppleMusic,
        ServiceKind::Qobuz,
    ]);
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(harness.cross_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.calls(ServiceKind::Tidal), 1);
    assert_eq!(harness.calls(ServiceKind::Deezer), 0);
    assert_eq!(harness.calls(ServiceKind::AppleMusic), 0);
    assert_eq!(harness.calls(ServiceKind::Qobuz), 1);

    // Source service not requested, Pandora not requested.
    assert_eq!(
        services(&result.links),
        vec![
            ServiceKind::AppleMusic,
            ServiceKind::Deezer,
            ServiceKind::Qobuz,
            ServiceKind::Tidal,
        ]
    );
    assert!(
        result.links.iter().all(|l| l.is_verified),
        "cross-referenced links carry the hub's verification"
    );
}

#[tokio::test]
async fn test_unverified_hub_link_propagates_to_adopted_links() {
    let mut harness = Harness::new()
        .adapter(ServiceKind::Tidal, Outcome::Found(unavailable(ServiceKind::Tidal)))
        .cross_links(vec![verified(ServiceKind::Deezer)]);
    let orchestrator = harness.build();

    let request = SearchRequest::link(SPOTIFY_TRACK)
        .with_adapters([ServiceKind::Tidal, ServiceKind::Deezer]);
    let result = orchestrator.search(&request).await.unwrap();

    let deezer = result
        .links
        .iter()
        .find(|l| l.target_service == ServiceKind::Deezer)
        .unwrap();
    assert!(!deezer.is_verified);
    assert!(deezer.unavailable());
}

#[tokio::test]
async fn test_hub_without_match_falls_back_to_adapters() {
    let mut harness = Harness::new()
        .adapter(ServiceKind::Tidal, Outcome::Nothing)
        .adapter(ServiceKind::Deezer, Outcome::Found(verified(ServiceKind::Deezer)))
        .cross_links(vec![verified(ServiceKind::Deezer)]);
    let orchestrator = harness.build();

    let request = SearchRequest::link(SPOTIFY_TRACK)
        .with_adapters([ServiceKind::Tidal, ServiceKind::Deezer]);
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(harness.cross_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.calls(ServiceKind::Deezer), 1);
    assert_eq!(services(&result.links), vec![ServiceKind::Deezer]);
}

#[tokio::test]
async fn test_failing_adapter_is_omitted() {
    let mut harness = Harness::new()
        .adapter(ServiceKind::Deezer, Outcome::Fails)
        .adapter(ServiceKind::AppleMusic, Outcome::Found(verified(ServiceKind::AppleMusic)));
    let orchestrator = harness.build();

    let request = SearchRequest::link(SPOTIFY_TRACK)
        .with_adapters([ServiceKind::Deezer, ServiceKind::AppleMusic]);
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(harness.calls(ServiceKind::Deezer), 1);
    assert_eq!(services(&result.links), vec![ServiceKind::AppleMusic]);
}

#[tokio::test]
async fn test_only_source_service_requested_returns_source_link() {
    let mut harness =
        Harness::new().adapter(ServiceKind::Spotify, Outcome::Found(verified(ServiceKind::Spotify)));
    let orchestrator = harness.build();
    let orchestrator = orchestrator.with_shortener(Box::new(FixedShortener));

    let request = SearchRequest::link(SPOTIFY_TRACK).with_adapters([ServiceKind::Spotify]);
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(harness.calls(ServiceKind::Spotify), 0);
    assert_eq!(
        result.links,
        vec![ResultLink::verified(ServiceKind::Spotify, SPOTIFY_TRACK)]
    );
    assert_eq!(
        result.universal_link,
        universal_link(&SearchOptions::default().app_url, &result.id),
        "the short link is only produced for full resolutions"
    );
    assert_eq!(
        harness.cache.value(SEARCH_COUNT_KEY).await.as_deref(),
        Some("1")
    );
}

#[tokio::test]
async fn test_shortener_replaces_universal_link_and_counter_increments() {
    let mut harness =
        Harness::new().adapter(ServiceKind::Deezer, Outcome::Found(verified(ServiceKind::Deezer)));
    let orchestrator = harness.build().with_shortener(Box::new(FixedShortener));
    let request = SearchRequest::link(SPOTIFY_TRACK).with_adapters([ServiceKind::Deezer]);

    let first = orchestrator.search(&request).await.unwrap();
    let second = orchestrator.search(&request).await.unwrap();

    assert_eq!(first.universal_link, "https://sbr.link/abc");
    assert_eq!(first, second);
    assert_eq!(
        harness.cache.value(SEARCH_COUNT_KEY).await.as_deref(),
        Some("2")
    );
}

#[tokio::test]
async fn test_search_id_resolves_like_the_link() {
    let mut harness =
        Harness::new().adapter(ServiceKind::Deezer, Outcome::Found(verified(ServiceKind::Deezer)));
    let orchestrator = harness.build();

    let by_link = orchestrator
        .search(&SearchRequest::link(SPOTIFY_TRACK).with_adapters([ServiceKind::Deezer]))
        .await
        .unwrap();
    let by_id = orchestrator
        .search(&SearchRequest::search_id(&by_link.id).with_adapters([ServiceKind::Deezer]))
        .await
        .unwrap();

    assert_eq!(by_id.source_url, by_link.source_url);
    assert_eq!(by_id.id, by_link.id);
    assert_eq!(by_id.links, by_link.links);
}

#[tokio::test]
async fn test_unrecognized_link_fails_without_searching() {
    let mut harness =
        Harness::new().adapter(ServiceKind::Deezer, Outcome::Found(verified(ServiceKind::Deezer)));
    let orchestrator = harness.build();

    let err = orchestrator
        .search(&SearchRequest::link("https://example.com/song/1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Parse(ParseError::UnrecognizedLink { .. })));
    assert_eq!(harness.calls(ServiceKind::Deezer), 0);
}

#[tokio::test]
async fn test_invalid_search_id_is_rejected() {
    let orchestrator = Harness::new().build();
    let err = orchestrator
        .search(&SearchRequest::search_id("%%%"))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidSearchId { .. }));
}

#[tokio::test]
async fn test_metadata_upgraded_from_verified_spotify_link() {
    let mut harness = Harness::new().adapter(
        ServiceKind::Spotify,
        Outcome::Found(ResultLink::verified(ServiceKind::Spotify, SPOTIFY_TRACK)),
    );
    let orchestrator = harness.build();

    let request = SearchRequest::link(DEEZER_TRACK)
        .with_adapters([ServiceKind::Spotify, ServiceKind::Deezer]);
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(result.title, "Get Lucky");
    assert_eq!(result.description, "Get Lucky description");
    assert_eq!(result.image_url, "https://www.deezer.com/cover.jpg");
    assert_eq!(result.source_url, DEEZER_TRACK);
    assert_eq!(harness.source_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unverified_spotify_link_keeps_source_metadata() {
    let mut harness = Harness::new().adapter(
        ServiceKind::Spotify,
        Outcome::Found(ResultLink {
            is_verified: false,
            ..ResultLink::verified(ServiceKind::Spotify, SPOTIFY_TRACK)
        }),
    );
    let orchestrator = harness.build();

    let request = SearchRequest::link(DEEZER_TRACK).with_adapters([ServiceKind::Spotify]);
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(result.title, "Get Lucky (Radio Edit)");
    assert_eq!(harness.source_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_headless_returns_ranked_urls_without_counting() {
    let mut harness = Harness::new()
        .adapter(ServiceKind::Deezer, Outcome::Found(unverified(ServiceKind::Deezer)))
        .adapter(ServiceKind::AppleMusic, Outcome::Found(verified(ServiceKind::AppleMusic)));
    let orchestrator = harness.build();

    let urls = orchestrator
        .search_headless(
            &SearchRequest::link(SPOTIFY_TRACK)
                .with_adapters([ServiceKind::Deezer, ServiceKind::AppleMusic]),
        )
        .await
        .unwrap();

    assert_eq!(
        urls,
        vec![
            "https://appleMusic.test/match".to_string(),
            "https://deezer.test/match".to_string(),
        ]
    );
    assert_eq!(harness.cache.value(SEARCH_COUNT_KEY).await, None);
}

#[tokio::test]
async fn test_at_most_one_link_per_service() {
    let mut harness = Harness::new()
        .adapter(ServiceKind::Tidal, Outcome::Found(verified(ServiceKind::Tidal)))
        .adapter(ServiceKind::Spotify, Outcome::Found(verified(ServiceKind::Spotify)))
        .cross_links(vec![
            verified(ServiceKind::Deezer),
            unverified(ServiceKind::Deezer),
            verified(ServiceKind::Spotify),
            verified(ServiceKind::Tidal),
        ]);
    let orchestrator = harness.build();

    let result = orchestrator
        .search(&SearchRequest::link(SPOTIFY_TRACK))
        .await
        .unwrap();

    let mut seen = services(&result.links);
    let total = seen.len();
    seen.sort_by_key(|s| s.as_str());
    seen.dedup();
    assert_eq!(seen.len(), total);
    let spotify = result
        .links
        .iter()
        .find(|l| l.target_service == ServiceKind::Spotify)
        .unwrap();
    assert_eq!(spotify.url, SPOTIFY_TRACK, "the source link wins for its service");
}
