//! Core types: search kinds, request shapes, filter enums, and responses.
//!
//! Request structs arrive fully deserialized but unvalidated. Enumerated
//! filters are carried as raw strings and only parsed by the normalizer, so
//! that an unknown value surfaces as a [`SearchError::Validation`] naming the
//! field instead of a deserialization failure in the adapter.
//!
//! [`SearchError::Validation`]: crate::error::SearchError::Validation

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The three search kinds the provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// General web results.
    Web,
    /// Image results.
    Image,
    /// News articles.
    News,
}

impl SearchKind {
    /// Lower-case name used in fingerprints and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Image => "image",
            Self::News => "news",
        }
    }

    /// Returns all kinds.
    pub fn all() -> &'static [SearchKind] {
        &[Self::Web, Self::Image, Self::News]
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "image" | "images" => Ok(Self::Image),
            "news" => Ok(Self::News),
            other => Err(format!("unknown search kind `{other}`")),
        }
    }
}

/// Declares a filter enum with a case-insensitive parser, an allowed-values
/// list for error messages, and the provider's wire value.
macro_rules! filter_enum {
    (@first $first:literal $(, $rest:literal)*) => { $first };
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal : [$($alias:literal),+] ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Value sent to the provider.
            pub fn upstream_value(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }

            /// Canonical accepted spellings, for error messages.
            pub fn allowed() -> &'static [&'static str] {
                &[$( filter_enum!(@first $($alias),+) ),+]
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.trim().to_ascii_lowercase();
                match lowered.as_str() {
                    $( $($alias)|+ => Ok(Self::$variant), )+
                    _ => Err(format!(
                        "must be one of {}",
                        Self::allowed().join(", ")
                    )),
                }
            }
        }
    };
}

filter_enum! {
    /// Safe-search filtering level.
    SafeSearch {
        /// No filtering.
        Off => "off": ["off"],
        /// Moderate filtering (provider "active").
        Medium => "active": ["medium", "moderate", "active"],
        /// Strict filtering (provider "active").
        High => "active": ["high", "strict"],
    }
}

filter_enum! {
    /// Restrict results to a recent period.
    TimeFilter {
        /// Past day.
        PastDay => "d1": ["d", "day", "past_day"],
        /// Past week.
        PastWeek => "w1": ["w", "week", "past_week"],
        /// Past month.
        PastMonth => "m1": ["m", "month", "past_month"],
        /// Past year.
        PastYear => "y1": ["y", "year", "past_year"],
    }
}

filter_enum! {
    /// Image size filter.
    ImageSize {
        /// Small images.
        Small => "small": ["small"],
        /// Medium images.
        Medium => "medium": ["medium"],
        /// Large images.
        Large => "large": ["large"],
        /// Extra large images.
        XLarge => "xlarge": ["xlarge"],
        /// Extra extra large images.
        XxLarge => "xxlarge": ["xxlarge"],
        /// Huge images.
        Huge => "huge": ["huge"],
    }
}

filter_enum! {
    /// Image type filter.
    ImageType {
        /// Clip art.
        Clipart => "clipart": ["clipart"],
        /// Faces.
        Face => "face": ["face"],
        /// Line drawings.
        Lineart => "lineart": ["lineart"],
        /// Stock photography.
        Stock => "stock": ["stock"],
        /// Photographs.
        Photo => "photo": ["photo"],
        /// Animated images.
        Animated => "animated": ["animated"],
    }
}

filter_enum! {
    /// Dominant image colour.
    ImageColor {
        /// Black.
        Black => "black": ["black"],
        /// Blue.
        Blue => "blue": ["blue"],
        /// Brown.
        Brown => "brown": ["brown"],
        /// Gray.
        Gray => "gray": ["gray", "grey"],
        /// Green.
        Green => "green": ["green"],
        /// Orange.
        Orange => "orange": ["orange"],
        /// Pink.
        Pink => "pink": ["pink"],
        /// Purple.
        Purple => "purple": ["purple"],
        /// Red.
        Red => "red": ["red"],
        /// Teal.
        Teal => "teal": ["teal"],
        /// White.
        White => "white": ["white"],
        /// Yellow.
        Yellow => "yellow": ["yellow"],
    }
}

filter_enum! {
    /// News result ordering.
    NewsSort {
        /// Newest first.
        Date => "date": ["date"],
        /// Provider relevance order (no sort parameter sent).
        Relevance => "": ["relevance"],
    }
}

/// Parameters shared by every search kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseSearchParams {
    /// Search query text. Required, non-empty after trimming.
    pub query: String,
    /// Results per call, 1..=10. Defaults to the configured value.
    pub num_results: Option<u32>,
    /// 1-based offset of the first result, 1..=91. Defaults to 1.
    pub start_index: Option<u32>,
    /// `off`, `medium`, or `high`.
    pub safe_search: Option<String>,
    /// ISO 639-1 language code, e.g. `en`.
    pub language: Option<String>,
    /// ISO 3166-1 alpha-2 country code, e.g. `us`.
    pub country: Option<String>,
}

impl BaseSearchParams {
    fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// A web search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchRequest {
    /// Shared parameters.
    #[serde(flatten)]
    pub base: BaseSearchParams,
    /// Restrict results to a site, e.g. `reddit.com`.
    pub site: Option<String>,
    /// Restrict results to a file type, e.g. `pdf`.
    pub file_type: Option<String>,
    /// Restrict results to a recent period.
    pub time_filter: Option<String>,
    /// Phrase that must appear in every result.
    pub exact_terms: Option<String>,
    /// Terms that must not appear in any result.
    pub exclude_terms: Option<String>,
}

/// An image search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSearchRequest {
    /// Shared parameters.
    #[serde(flatten)]
    pub base: BaseSearchParams,
    /// Image size filter.
    pub image_size: Option<String>,
    /// Image type filter.
    pub image_type: Option<String>,
    /// Dominant colour filter.
    pub color: Option<String>,
    /// Licensing filter, e.g. `cc_publicdomain`.
    pub usage_rights: Option<String>,
}

/// A news search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSearchRequest {
    /// Shared parameters.
    #[serde(flatten)]
    pub base: BaseSearchParams,
    /// `date` (default) or `relevance`.
    pub sort_by: Option<String>,
    /// Restrict articles to a recent period.
    pub time_filter: Option<String>,
}

macro_rules! request_builders {
    ($($ty:ident),+) => {
        $(
            impl $ty {
                /// Create a request for `query` with every optional field unset.
                pub fn new(query: impl Into<String>) -> Self {
                    Self {
                        base: BaseSearchParams::new(query),
                        ..Default::default()
                    }
                }

                /// Set the number of results.
                pub fn with_num_results(mut self, num: u32) -> Self {
                    self.base.num_results = Some(num);
                    self
                }

                /// Set the 1-based start offset.
                pub fn with_start_index(mut self, start: u32) -> Self {
                    self.base.start_index = Some(start);
                    self
                }

                /// Set the safe-search level.
                pub fn with_safe_search(mut self, level: impl Into<String>) -> Self {
                    self.base.safe_search = Some(level.into());
                    self
                }

                /// Set the language code.
                pub fn with_language(mut self, language: impl Into<String>) -> Self {
                    self.base.language = Some(language.into());
                    self
                }

                /// Set the country code.
                pub fn with_country(mut self, country: impl Into<String>) -> Self {
                    self.base.country = Some(country.into());
                    self
                }
            }
        )+
    };
}

request_builders!(WebSearchRequest, ImageSearchRequest, NewsSearchRequest);

/// A search request of any kind, as handed over by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SearchRequest {
    /// Web search.
    Web(WebSearchRequest),
    /// Image search.
    Image(ImageSearchRequest),
    /// News search.
    News(NewsSearchRequest),
}

impl SearchRequest {
    /// The kind of this request.
    pub fn kind(&self) -> SearchKind {
        match self {
            Self::Web(_) => SearchKind::Web,
            Self::Image(_) => SearchKind::Image,
            Self::News(_) => SearchKind::News,
        }
    }

    /// The parameters shared by all kinds.
    pub fn base(&self) -> &BaseSearchParams {
        match self {
            Self::Web(r) => &r.base,
            Self::Image(r) => &r.base,
            Self::News(r) => &r.base,
        }
    }
}

impl From<WebSearchRequest> for SearchRequest {
    fn from(value: WebSearchRequest) -> Self {
        Self::Web(value)
    }
}

impl From<ImageSearchRequest> for SearchRequest {
    fn from(value: ImageSearchRequest) -> Self {
        Self::Image(value)
    }
}

impl From<NewsSearchRequest> for SearchRequest {
    fn from(value: NewsSearchRequest) -> Self {
        Self::News(value)
    }
}

/// Whether a response was served from the cache or freshly fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Fetched from the provider for this call.
    Fresh,
    /// Served from the result cache without contacting the provider.
    Cached,
}

/// A single result item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub link: String,
    /// Plain-text snippet.
    pub snippet: Option<String>,
    /// Display form of the host.
    pub display_link: Option<String>,
    /// Kind-specific metadata.
    pub metadata: ItemMetadata,
}

/// Kind-specific metadata attached to a [`SearchItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemMetadata {
    /// Web result metadata.
    Web(WebMetadata),
    /// Image result metadata.
    Image(ImageMetadata),
    /// News result metadata.
    News(NewsMetadata),
}

/// Extra fields for web results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebMetadata {
    /// Formatted URL.
    pub formatted_url: Option<String>,
    /// Title with HTML highlighting.
    pub html_title: Option<String>,
    /// Snippet with HTML highlighting.
    pub html_snippet: Option<String>,
    /// MIME type of the document.
    pub mime_type: Option<String>,
    /// File format label.
    pub file_format: Option<String>,
    /// Provider cache id.
    pub cache_id: Option<String>,
    /// Structured page metadata, passed through as-is.
    pub page_map: Option<serde_json::Value>,
}

/// Extra fields for image results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Page that contains the image.
    pub context_link: Option<String>,
    /// Image width in pixels.
    pub width: Option<u32>,
    /// Image height in pixels.
    pub height: Option<u32>,
    /// Image size in bytes.
    pub byte_size: Option<u64>,
    /// Thumbnail URL.
    pub thumbnail_link: Option<String>,
    /// Thumbnail width in pixels.
    pub thumbnail_width: Option<u32>,
    /// Thumbnail height in pixels.
    pub thumbnail_height: Option<u32>,
}

/// Extra fields for news results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsMetadata {
    /// Publication timestamp, when the page declares one.
    pub published_at: Option<DateTime<FixedOffset>>,
    /// Publishing source (display host).
    pub source: Option<String>,
    /// Article author.
    pub author: Option<String>,
}

/// Provider timing and total-count information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchInfo {
    /// Provider-side search time in seconds.
    pub search_time: f64,
    /// Estimated total number of matches.
    pub total_results: u64,
}

/// Spelling correction suggested by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spelling {
    /// Corrected query.
    pub corrected_query: String,
}

/// Pagination metadata for a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based offset of the first returned item.
    pub start_index: u32,
    /// Number of items requested.
    pub requested: u32,
    /// Estimated total matches, if reported.
    pub total_results: Option<u64>,
    /// Offset of the next page, or `None` if there is none the provider
    /// will serve.
    pub next_start_index: Option<u32>,
}

/// The result of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Which kind of search produced this response.
    pub kind: SearchKind,
    /// Result items, in provider order.
    pub items: Vec<SearchItem>,
    /// Pagination metadata.
    pub pagination: Pagination,
    /// Provider timing and counts.
    pub info: Option<SearchInfo>,
    /// Spelling suggestion.
    pub spelling: Option<Spelling>,
    /// Cache hit vs fresh fetch.
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_kind_display_and_parse() {
        assert_eq!(SearchKind::Web.to_string(), "web");
        assert_eq!("IMAGES".parse::<SearchKind>(), Ok(SearchKind::Image));
        assert_eq!(" news ".parse::<SearchKind>(), Ok(SearchKind::News));
        assert!("video".parse::<SearchKind>().is_err());
        assert_eq!(SearchKind::all().len(), 3);
    }

    #[test]
    fn filter_enums_parse_case_insensitively() {
        assert_eq!("HIGH".parse::<SafeSearch>(), Ok(SafeSearch::High));
        assert_eq!("Week".parse::<TimeFilter>(), Ok(TimeFilter::PastWeek));
        assert_eq!("d".parse::<TimeFilter>(), Ok(TimeFilter::PastDay));
        assert_eq!("XLarge".parse::<ImageSize>(), Ok(ImageSize::XLarge));
        assert_eq!("grey".parse::<ImageColor>(), Ok(ImageColor::Gray));
        assert_eq!("Relevance".parse::<NewsSort>(), Ok(NewsSort::Relevance));
    }

    #[test]
    fn filter_enum_error_lists_allowed_values() {
        let err = "extreme".parse::<SafeSearch>().unwrap_err();
        assert_eq!(err, "must be one of off, medium, high");
        let err = "tiny".parse::<ImageSize>().unwrap_err();
        assert!(err.contains("small"));
        assert!(err.contains("huge"));
    }

    #[test]
    fn upstream_values() {
        assert_eq!(SafeSearch::Off.upstream_value(), "off");
        assert_eq!(SafeSearch::Medium.upstream_value(), "active");
        assert_eq!(TimeFilter::PastMonth.upstream_value(), "m1");
        assert_eq!(ImageType::Lineart.upstream_value(), "lineart");
        assert_eq!(NewsSort::Relevance.upstream_value(), "");
    }

    #[test]
    fn request_builder_sets_fields() {
        let req = WebSearchRequest::new("rust")
            .with_num_results(5)
            .with_start_index(11)
            .with_language("de");
        assert_eq!(req.base.query, "rust");
        assert_eq!(req.base.num_results, Some(5));
        assert_eq!(req.base.start_index, Some(11));
        assert_eq!(req.base.language.as_deref(), Some("de"));
        assert!(req.site.is_none());
    }

    #[test]
    fn search_request_deserializes_with_kind_tag() {
        let json = r#"{"kind":"image","query":"cats","num_results":3,"image_size":"large"}"#;
        let req: SearchRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(req.kind(), SearchKind::Image);
        assert_eq!(req.base().query, "cats");
        assert_eq!(req.base().num_results, Some(3));
        match req {
            SearchRequest::Image(image) => {
                assert_eq!(image.image_size.as_deref(), Some("large"))
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn provenance_serializes_lowercase() {
        let json = serde_json::to_string(&Provenance::Cached).expect("serialize");
        assert_eq!(json, "\"cached\"");
    }

    #[test]
    fn item_metadata_is_tagged() {
        let item = SearchItem {
            title: "Example".into(),
            link: "https://example.com".into(),
            snippet: None,
            display_link: Some("example.com".into()),
            metadata: ItemMetadata::News(NewsMetadata {
                source: Some("example.com".into()),
                ..Default::default()
            }),
        };
        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(value["metadata"]["type"], "news");
        assert_eq!(value["metadata"]["source"], "example.com");
    }
}
