//! Google Custom Search JSON API client.
//!
//! Issues one GET per fetch against the configured endpoint, adding the
//! `key` and `cx` credentials to the canonical parameters, and maps the
//! JSON body onto [`SearchResponse`]. Non-2xx answers are classified into
//! [`RejectionReason`]s, with out-of-range `num`/`start` errors surfaced
//! separately because they are the most common operator mistake.

use std::time::Instant;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::{
    SearchConfig, PROVIDER_MAX_NUM_RESULTS, PROVIDER_MAX_RESULT_INDEX, PROVIDER_MAX_START_INDEX,
};
use crate::error::{RejectionReason, SearchError, UpstreamError};
use crate::http;
use crate::normalize::NormalizedQuery;
use crate::types::{
    ImageMetadata, ItemMetadata, NewsMetadata, Pagination, Provenance, SearchInfo, SearchItem,
    SearchKind, SearchResponse, Spelling, WebMetadata,
};
use crate::upstream::UpstreamClient;

/// Longest slice of a non-JSON error body kept in an error detail.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Largest response body read from the provider. A full page of ten
/// results with page maps is a few tens of kilobytes.
pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Custom Search JSON API client.
///
/// Holds one pooled [`reqwest::Client`] shared by every fetch.
pub struct GoogleCseClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    engine_id: String,
    max_start_index: u32,
}

impl std::fmt::Debug for GoogleCseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCseClient")
            .field("base_url", &self.base_url.as_str())
            .field("engine_id", &self.engine_id)
            .finish_non_exhaustive()
    }
}

impl GoogleCseClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the API key or engine id is
    /// missing, the base URL is invalid, or the HTTP client cannot be built.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        if config.api_key.trim().is_empty() {
            return Err(SearchError::Config("api_key is required".into()));
        }
        if config.engine_id.trim().is_empty() {
            return Err(SearchError::Config("engine_id is required".into()));
        }
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SearchError::Config(format!("base_url is not a valid URL: {e}")))?;

        Ok(Self {
            client: http::build_client(config)?,
            base_url,
            api_key: config.api_key.trim().to_owned(),
            engine_id: config.engine_id.trim().to_owned(),
            max_start_index: config.max_start_index,
        })
    }
}

impl UpstreamClient for GoogleCseClient {
    async fn fetch(&self, query: &NormalizedQuery) -> Result<SearchResponse, UpstreamError> {
        tracing::trace!(query = query.query_text(), "custom search request");
        tracing::debug!(
            kind = %query.kind(),
            start = query.start_index(),
            num = query.num_results(),
            "upstream fetch start"
        );
        let started = Instant::now();

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("key", self.api_key.as_str()), ("cx", self.engine_id.as_str())])
            .query(query.params())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = read_body(response, MAX_RESPONSE_BYTES).await?;

        if !status.is_success() {
            let err = classify_rejection(status.as_u16(), &body);
            tracing::debug!(status = status.as_u16(), error = %err, "upstream rejected request");
            return Err(err);
        }

        let parsed = parse_response(&body, query, self.max_start_index)?;
        tracing::info!(
            kind = %query.kind(),
            items = parsed.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream fetch finished"
        );
        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "google-cse"
    }
}

fn transport_error(e: reqwest::Error) -> UpstreamError {
    // The request URL carries the API key, so it never reaches the message.
    let timed_out = e.is_timeout();
    UpstreamError::Transport {
        timed_out,
        detail: e.without_url().to_string(),
    }
}

/// Read the body, failing as soon as it is known to exceed `limit` bytes.
async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<String, UpstreamError> {
    let too_large = || {
        UpstreamError::InvalidResponse(format!("response body exceeds {limit} bytes"))
    };
    if response
        .content_length()
        .is_some_and(|declared| declared > limit as u64)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

// --- Wire format -----------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
    search_information: Option<CseSearchInformation>,
    spelling: Option<CseSpelling>,
    queries: Option<CseQueries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CseItem {
    #[serde(default)]
    title: String,
    link: Option<String>,
    snippet: Option<String>,
    display_link: Option<String>,
    formatted_url: Option<String>,
    html_title: Option<String>,
    html_snippet: Option<String>,
    mime: Option<String>,
    file_format: Option<String>,
    cache_id: Option<String>,
    pagemap: Option<Value>,
    image: Option<CseImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CseImage {
    context_link: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    byte_size: Option<u64>,
    thumbnail_link: Option<String>,
    thumbnail_width: Option<u32>,
    thumbnail_height: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CseSearchInformation {
    #[serde(default)]
    search_time: f64,
    // The API encodes this count as a string.
    total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CseSpelling {
    corrected_query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CseQueries {
    #[serde(default)]
    next_page: Vec<CsePageRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsePageRef {
    start_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CseErrorEnvelope {
    error: CseErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct CseErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<CseErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct CseErrorDetail {
    #[serde(default)]
    reason: String,
}

// --- Parsing ---------------------------------------------------------------

/// Parse a 2xx body into a [`SearchResponse`].
///
/// Items without a link are skipped. The next-page offset is dropped when
/// the provider would refuse it.
pub(crate) fn parse_response(
    body: &str,
    query: &NormalizedQuery,
    max_start_index: u32,
) -> Result<SearchResponse, UpstreamError> {
    let raw: CseResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::InvalidResponse(format!("malformed search body: {e}")))?;

    let kind = query.kind();
    let total_results = raw
        .search_information
        .as_ref()
        .and_then(|info| info.total_results.as_deref())
        .and_then(|total| total.parse::<u64>().ok());

    let info = raw.search_information.map(|info| SearchInfo {
        search_time: info.search_time,
        total_results: total_results.unwrap_or(0),
    });

    let spelling = raw
        .spelling
        .and_then(|s| s.corrected_query)
        .filter(|corrected| !corrected.is_empty())
        .map(|corrected_query| Spelling { corrected_query });

    let next_start_index = raw
        .queries
        .and_then(|q| q.next_page.into_iter().next())
        .and_then(|page| page.start_index)
        .filter(|start| *start <= max_start_index.min(PROVIDER_MAX_START_INDEX));

    let items = raw
        .items
        .into_iter()
        .filter_map(|item| convert_item(kind, item))
        .collect();

    Ok(SearchResponse {
        kind,
        items,
        pagination: Pagination {
            start_index: query.start_index(),
            requested: query.num_results(),
            total_results,
            next_start_index,
        },
        info,
        spelling,
        provenance: Provenance::Fresh,
    })
}

fn convert_item(kind: SearchKind, item: CseItem) -> Option<SearchItem> {
    let Some(link) = item.link.filter(|l| !l.is_empty()) else {
        tracing::debug!("skipping result item without link");
        return None;
    };

    let metadata = match kind {
        SearchKind::Web => ItemMetadata::Web(WebMetadata {
            formatted_url: item.formatted_url,
            html_title: item.html_title,
            html_snippet: item.html_snippet,
            mime_type: item.mime,
            file_format: item.file_format,
            cache_id: item.cache_id,
            page_map: item.pagemap,
        }),
        SearchKind::Image => {
            let image = item.image;
            ItemMetadata::Image(match image {
                Some(img) => ImageMetadata {
                    context_link: img.context_link,
                    width: img.width,
                    height: img.height,
                    byte_size: img.byte_size,
                    thumbnail_link: img.thumbnail_link,
                    thumbnail_width: img.thumbnail_width,
                    thumbnail_height: img.thumbnail_height,
                },
                None => ImageMetadata::default(),
            })
        }
        SearchKind::News => ItemMetadata::News(NewsMetadata {
            published_at: item.pagemap.as_ref().and_then(published_at),
            source: item.display_link.clone(),
            author: item.pagemap.as_ref().and_then(author),
        }),
    };

    Some(SearchItem {
        title: item.title,
        link,
        snippet: item.snippet,
        display_link: item.display_link,
        metadata,
    })
}

/// First object of a page-map section such as `newsarticle` or `metatags`.
fn pagemap_first<'a>(pagemap: &'a Value, section: &str) -> Option<&'a Value> {
    pagemap.get(section)?.as_array()?.first()
}

fn pagemap_str<'a>(pagemap: &'a Value, section: &str, field: &str) -> Option<&'a str> {
    pagemap_first(pagemap, section)?
        .get(field)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn published_at(pagemap: &Value) -> Option<DateTime<FixedOffset>> {
    pagemap_str(pagemap, "newsarticle", "datepublished")
        .or_else(|| pagemap_str(pagemap, "metatags", "article:published_time"))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
}

fn author(pagemap: &Value) -> Option<String> {
    pagemap_str(pagemap, "newsarticle", "author")
        .or_else(|| pagemap_str(pagemap, "metatags", "author"))
        .map(str::to_owned)
}

// --- Error classification --------------------------------------------------

/// Classify a non-2xx answer.
///
/// The structured status code is the primary signal. For 400s, the body is
/// inspected for an invalid-argument marker to single out range errors;
/// that text match is a best-effort hint only.
pub(crate) fn classify_rejection(status: u16, body: &str) -> UpstreamError {
    let parsed = serde_json::from_str::<CseErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .ok();
    let message = match &parsed {
        Some(err) if !err.message.is_empty() => err.message.clone(),
        _ => truncate(body.trim(), MAX_ERROR_BODY_CHARS),
    };
    let has_reason = |wanted: &[&str]| {
        parsed
            .as_ref()
            .is_some_and(|err| err.errors.iter().any(|d| wanted.contains(&d.reason.as_str())))
    };

    let reason = match status {
        400 if is_invalid_argument(parsed.as_ref(), &message) => RejectionReason::InvalidRange,
        400 => RejectionReason::BadRequest,
        403 if has_reason(&["rateLimitExceeded", "dailyLimitExceeded", "userRateLimitExceeded"]) => {
            RejectionReason::QuotaExceeded
        }
        401 | 403 => RejectionReason::Unauthorized,
        429 => RejectionReason::QuotaExceeded,
        500..=599 => RejectionReason::ServerError,
        _ => RejectionReason::Other,
    };

    let detail = if reason == RejectionReason::InvalidRange {
        format!(
            "{message}; the provider accepts num 1-{PROVIDER_MAX_NUM_RESULTS} and start \
             1-{PROVIDER_MAX_START_INDEX}, with start + num - 1 <= {PROVIDER_MAX_RESULT_INDEX}"
        )
    } else if message.is_empty() {
        format!("HTTP {status}")
    } else {
        message
    };

    UpstreamError::ProviderRejected {
        status,
        reason,
        detail,
    }
}

fn is_invalid_argument(parsed: Option<&CseErrorBody>, message: &str) -> bool {
    if parsed.is_some_and(|err| err.status == "INVALID_ARGUMENT") {
        return true;
    }
    let lower = message.to_lowercase();
    lower.contains("invalid argument") || lower.contains("invalid value")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::QueryNormalizer;
    use crate::types::{
        ImageSearchRequest, NewsSearchRequest, SearchRequest, WebSearchRequest,
    };

    fn normalize(request: impl Into<SearchRequest>) -> NormalizedQuery {
        QueryNormalizer::new(&SearchConfig::default())
            .normalize(&request.into())
            .expect("valid request")
    }

    const WEB_BODY: &str = r#"{
        "kind": "customsearch#search",
        "queries": { "nextPage": [{ "startIndex": 11, "count": 10 }] },
        "searchInformation": { "searchTime": 0.31, "totalResults": "12300" },
        "spelling": { "correctedQuery": "rust programming" },
        "items": [
            {
                "title": "The Rust Programming Language",
                "link": "https://www.rust-lang.org/",
                "displayLink": "www.rust-lang.org",
                "snippet": "A language empowering everyone.",
                "htmlTitle": "The <b>Rust</b> Programming Language",
                "formattedUrl": "https://www.rust-lang.org/",
                "mime": "text/html",
                "cacheId": "abc123",
                "pagemap": { "metatags": [{ "og:title": "Rust" }] }
            },
            { "title": "No link here" }
        ]
    }"#;

    #[test]
    fn parses_web_response() {
        let query = normalize(WebSearchRequest::new("rust programing"));
        let response = parse_response(WEB_BODY, &query, 91).expect("parse");

        assert_eq!(response.kind, SearchKind::Web);
        assert_eq!(response.items.len(), 1, "item without link is skipped");
        let item = &response.items[0];
        assert_eq!(item.link, "https://www.rust-lang.org/");
        assert_eq!(item.display_link.as_deref(), Some("www.rust-lang.org"));
        match &item.metadata {
            ItemMetadata::Web(web) => {
                assert_eq!(web.mime_type.as_deref(), Some("text/html"));
                assert_eq!(web.cache_id.as_deref(), Some("abc123"));
                assert!(web.page_map.is_some());
            }
            other => panic!("expected web metadata, got {other:?}"),
        }

        assert_eq!(response.pagination.total_results, Some(12300));
        assert_eq!(response.pagination.next_start_index, Some(11));
        assert_eq!(response.pagination.requested, 10);
        assert_eq!(
            response.spelling.map(|s| s.corrected_query).as_deref(),
            Some("rust programming")
        );
        let info = response.info.expect("search information");
        assert_eq!(info.total_results, 12300);
        assert_eq!(response.provenance, Provenance::Fresh);
    }

    #[test]
    fn next_page_beyond_start_ceiling_is_dropped() {
        let body = r#"{ "queries": { "nextPage": [{ "startIndex": 101 }] } }"#;
        let query = normalize(WebSearchRequest::new("rust").with_start_index(91));
        let response = parse_response(body, &query, 91).expect("parse");
        assert_eq!(response.pagination.next_start_index, None);
        assert!(response.items.is_empty());
        assert!(response.info.is_none());
    }

    #[test]
    fn parses_image_metadata() {
        let body = r#"{ "items": [{
            "title": "Ferris",
            "link": "https://example.com/ferris.png",
            "image": {
                "contextLink": "https://example.com/",
                "height": 400, "width": 600, "byteSize": 12345,
                "thumbnailLink": "https://thumbs.example.com/f.png",
                "thumbnailHeight": 80, "thumbnailWidth": 120
            }
        }] }"#;
        let query = normalize(ImageSearchRequest::new("ferris"));
        let response = parse_response(body, &query, 91).expect("parse");
        match &response.items[0].metadata {
            ItemMetadata::Image(image) => {
                assert_eq!(image.width, Some(600));
                assert_eq!(image.byte_size, Some(12345));
                assert_eq!(image.context_link.as_deref(), Some("https://example.com/"));
                assert_eq!(image.thumbnail_height, Some(80));
            }
            other => panic!("expected image metadata, got {other:?}"),
        }
    }

    #[test]
    fn parses_news_published_date_and_author() {
        let body = r#"{ "items": [
            {
                "title": "Rust 2.0",
                "link": "https://news.example.com/a",
                "displayLink": "news.example.com",
                "pagemap": { "newsarticle": [{
                    "datepublished": "2024-05-01T10:00:00Z",
                    "author": "Jane Doe"
                }] }
            },
            {
                "title": "Other",
                "link": "https://news.example.com/b",
                "pagemap": { "metatags": [{
                    "article:published_time": "2024-05-02T08:30:00+02:00"
                }] }
            },
            {
                "title": "Undated",
                "link": "https://news.example.com/c",
                "pagemap": { "newsarticle": [{ "datepublished": "yesterday" }] }
            }
        ] }"#;
        let query = normalize(NewsSearchRequest::new("rust"));
        let response = parse_response(body, &query, 91).expect("parse");

        let news: Vec<&NewsMetadata> = response
            .items
            .iter()
            .map(|item| match &item.metadata {
                ItemMetadata::News(news) => news,
                other => panic!("expected news metadata, got {other:?}"),
            })
            .collect();

        let first = news[0].published_at.expect("dated");
        assert_eq!(first.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(news[0].author.as_deref(), Some("Jane Doe"));
        assert_eq!(news[0].source.as_deref(), Some("news.example.com"));
        assert!(news[1].published_at.is_some());
        assert!(news[2].published_at.is_none());
    }

    #[test]
    fn malformed_body_is_invalid_response() {
        let query = normalize(WebSearchRequest::new("rust"));
        let err = parse_response("<html>", &query, 91).unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse(_)));
    }

    fn reason_of(err: &UpstreamError) -> RejectionReason {
        match err {
            UpstreamError::ProviderRejected { reason, .. } => *reason,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn invalid_argument_is_range_error() {
        let body = r#"{ "error": {
            "code": 400,
            "message": "Request contains an invalid argument.",
            "status": "INVALID_ARGUMENT",
            "errors": [{ "reason": "badRequest" }]
        } }"#;
        let err = classify_rejection(400, body);
        assert_eq!(reason_of(&err), RejectionReason::InvalidRange);
        let text = err.to_string();
        assert!(text.contains("num 1-10"));
        assert!(text.contains("start 1-91"));
    }

    #[test]
    fn free_text_invalid_value_is_range_error() {
        let err = classify_rejection(400, "Invalid Value");
        assert_eq!(reason_of(&err), RejectionReason::InvalidRange);
    }

    #[test]
    fn other_400_is_bad_request() {
        let body = r#"{ "error": { "code": 400, "message": "Missing cx", "status": "FAILED_PRECONDITION" } }"#;
        let err = classify_rejection(400, body);
        assert_eq!(reason_of(&err), RejectionReason::BadRequest);
        assert!(err.to_string().contains("Missing cx"));
    }

    #[test]
    fn status_classes() {
        assert_eq!(reason_of(&classify_rejection(401, "")), RejectionReason::Unauthorized);
        assert_eq!(reason_of(&classify_rejection(403, "{}")), RejectionReason::Unauthorized);
        assert_eq!(reason_of(&classify_rejection(429, "")), RejectionReason::QuotaExceeded);
        assert_eq!(reason_of(&classify_rejection(503, "")), RejectionReason::ServerError);
        assert_eq!(reason_of(&classify_rejection(404, "")), RejectionReason::Other);
    }

    #[test]
    fn forbidden_quota_reason_is_quota_exceeded() {
        let body = r#"{ "error": {
            "code": 403,
            "message": "Quota exceeded for quota metric 'Queries'",
            "errors": [{ "reason": "rateLimitExceeded" }]
        } }"#;
        assert_eq!(
            reason_of(&classify_rejection(403, body)),
            RejectionReason::QuotaExceeded
        );
    }

    #[test]
    fn empty_body_detail_names_status() {
        let err = classify_rejection(502, "");
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        match classify_rejection(500, &body) {
            UpstreamError::ProviderRejected { detail, .. } => {
                assert_eq!(detail.len(), MAX_ERROR_BODY_CHARS + 3);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn new_requires_credentials() {
        let err = GoogleCseClient::new(&SearchConfig::default()).unwrap_err();
        assert!(err.to_string().contains("api_key"));

        let config = SearchConfig {
            api_key: "key".into(),
            ..Default::default()
        };
        let err = GoogleCseClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("engine_id"));
    }

    #[test]
    fn debug_omits_api_key() {
        let config = SearchConfig {
            api_key: "AIza-secret".into(),
            engine_id: "cx-1".into(),
            ..Default::default()
        };
        let client = GoogleCseClient::new(&config).expect("client");
        let debug = format!("{client:?}");
        assert!(!debug.contains("AIza-secret"));
        assert!(debug.contains("cx-1"));
    }
}
