//! Query normalisation and fingerprinting.
//!
//! [`QueryNormalizer`] turns an unvalidated [`SearchRequest`] into a
//! [`NormalizedQuery`]: defaults applied, every constraint the provider
//! enforces checked locally, enum values canonicalised, and parameters held
//! in a sorted map so that field order and omitted-vs-default values never
//! change the result. [`NormalizedQuery::fingerprint`] digests that map into
//! the cache key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{
    is_two_letter_code, SearchConfig, PROVIDER_MAX_NUM_RESULTS, PROVIDER_MAX_RESULT_INDEX,
};
use crate::error::{Result, SearchError};
use crate::types::{
    BaseSearchParams, ImageColor, ImageSearchRequest, ImageSize, ImageType, NewsSearchRequest,
    NewsSort, SafeSearch, SearchKind, SearchRequest, TimeFilter, WebSearchRequest,
};

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 1000;

/// Licence filters the provider understands.
const USAGE_RIGHTS: &[&str] = &[
    "cc_attribute",
    "cc_noncommercial",
    "cc_nonderived",
    "cc_publicdomain",
    "cc_sharealike",
];

/// Canonical upstream parameter names.
pub mod params {
    /// Query text.
    pub const QUERY: &str = "q";
    /// Result count.
    pub const NUM: &str = "num";
    /// 1-based start offset.
    pub const START: &str = "start";
    /// Safe-search level.
    pub const SAFE: &str = "safe";
    /// Language restriction (`lang_xx`).
    pub const LANGUAGE: &str = "lr";
    /// Country boost.
    pub const COUNTRY: &str = "gl";
    /// Site restriction.
    pub const SITE: &str = "siteSearch";
    /// File type restriction.
    pub const FILE_TYPE: &str = "fileType";
    /// Exact phrase.
    pub const EXACT_TERMS: &str = "exactTerms";
    /// Excluded terms.
    pub const EXCLUDE_TERMS: &str = "excludeTerms";
    /// Recency restriction.
    pub const DATE_RESTRICT: &str = "dateRestrict";
    /// `image` for image searches.
    pub const SEARCH_TYPE: &str = "searchType";
    /// Image size.
    pub const IMAGE_SIZE: &str = "imgSize";
    /// Image type.
    pub const IMAGE_TYPE: &str = "imgType";
    /// Dominant image colour.
    pub const IMAGE_COLOR: &str = "imgDominantColor";
    /// Licence filter.
    pub const RIGHTS: &str = "rights";
    /// Sort order.
    pub const SORT: &str = "sort";
}

/// A validated, canonical, upstream-ready query.
///
/// Credentials are deliberately absent; the provider client adds them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    kind: SearchKind,
    num_results: u32,
    start_index: u32,
    params: BTreeMap<String, String>,
}

impl NormalizedQuery {
    /// The search kind.
    pub fn kind(&self) -> SearchKind {
        self.kind
    }

    /// Canonical query text.
    pub fn query_text(&self) -> &str {
        self.get(params::QUERY).unwrap_or_default()
    }

    /// Validated result count.
    pub fn num_results(&self) -> u32 {
        self.num_results
    }

    /// Validated 1-based start offset.
    pub fn start_index(&self) -> u32 {
        self.start_index
    }

    /// Look up a canonical parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All parameters, sorted by name.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Deterministic digest of kind and parameters, used as the cache key.
    ///
    /// Every component is length-prefixed so no two distinct queries can
    /// serialise to the same byte stream.
    pub fn fingerprint(&self) -> QueryFingerprint {
        let mut hasher = Sha256::new();
        update_framed(&mut hasher, self.kind.as_str());
        for (name, value) in &self.params {
            update_framed(&mut hasher, name);
            update_framed(&mut hasher, value);
        }
        QueryFingerprint(format!("{:x}", hasher.finalize()))
    }
}

fn update_framed(hasher: &mut Sha256, part: &str) {
    hasher.update((part.len() as u64).to_le_bytes());
    hasher.update(part.as_bytes());
}

/// Cache key derived from a [`NormalizedQuery`]: a lower-case hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// The full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve hex characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates requests and builds [`NormalizedQuery`] values.
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    default_num_results: u32,
    max_num_results: u32,
    max_start_index: u32,
    default_safe_search: SafeSearch,
    default_language: String,
    default_country: String,
}

impl QueryNormalizer {
    /// Create a normalizer using the defaults and ceilings from `config`.
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            default_num_results: config.default_num_results,
            max_num_results: config.max_num_results,
            max_start_index: config.max_start_index,
            default_safe_search: config.default_safe_search,
            default_language: config.default_language.clone(),
            default_country: config.default_country.clone(),
        }
    }

    /// Validate `request` and produce its canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] naming the first offending field.
    pub fn normalize(&self, request: &SearchRequest) -> Result<NormalizedQuery> {
        let mut query = self.normalize_base(request.kind(), request.base())?;
        match request {
            SearchRequest::Web(web) => normalize_web(web, &mut query.params)?,
            SearchRequest::Image(image) => normalize_image(image, &mut query.params)?,
            SearchRequest::News(news) => normalize_news(news, &mut query.params)?,
        }
        Ok(query)
    }

    fn normalize_base(&self, kind: SearchKind, base: &BaseSearchParams) -> Result<NormalizedQuery> {
        // Case is preserved: the provider treats upper-case OR as an operator.
        let text = collapse_whitespace(&base.query);
        if text.is_empty() {
            return Err(SearchError::validation("query", "must not be empty"));
        }
        if text.chars().count() > MAX_QUERY_CHARS {
            return Err(SearchError::validation(
                "query",
                format!("must be at most {MAX_QUERY_CHARS} characters"),
            ));
        }

        let num = base.num_results.unwrap_or(self.default_num_results);
        if num == 0 || num > self.max_num_results {
            return Err(SearchError::validation(
                "num_results",
                format!(
                    "must be between 1 and {} (the provider returns at most {PROVIDER_MAX_NUM_RESULTS} results per call; page with start_index instead)",
                    self.max_num_results
                ),
            ));
        }

        let start = base.start_index.unwrap_or(1);
        if start == 0 || start > self.max_start_index {
            return Err(SearchError::validation(
                "start_index",
                format!("must be between 1 and {}", self.max_start_index),
            ));
        }

        if start + num - 1 > PROVIDER_MAX_RESULT_INDEX {
            return Err(SearchError::validation(
                "start_index",
                format!(
                    "start_index + num_results - 1 must not exceed {PROVIDER_MAX_RESULT_INDEX} (got {})",
                    start + num - 1
                ),
            ));
        }

        let safe = match clean(&base.safe_search) {
            Some(raw) => parse_field::<SafeSearch>("safe_search", &raw)?,
            None => self.default_safe_search,
        };
        let language = two_letter_field("language", &base.language, &self.default_language)?;
        let country = two_letter_field("country", &base.country, &self.default_country)?;

        let mut map = BTreeMap::new();
        map.insert(params::QUERY.to_owned(), text);
        map.insert(params::NUM.to_owned(), num.to_string());
        map.insert(params::START.to_owned(), start.to_string());
        map.insert(params::SAFE.to_owned(), safe.upstream_value().to_owned());
        map.insert(params::LANGUAGE.to_owned(), format!("lang_{language}"));
        map.insert(params::COUNTRY.to_owned(), country);

        Ok(NormalizedQuery {
            kind,
            num_results: num,
            start_index: start,
            params: map,
        })
    }
}

fn normalize_web(request: &WebSearchRequest, map: &mut BTreeMap<String, String>) -> Result<()> {
    if let Some(site) = clean(&request.site) {
        map.insert(params::SITE.to_owned(), site.to_ascii_lowercase());
    }
    if let Some(file_type) = clean(&request.file_type) {
        let file_type = file_type.trim_start_matches('.').to_ascii_lowercase();
        if file_type.is_empty() || !file_type.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(SearchError::validation(
                "file_type",
                "must be a file extension such as pdf or docx",
            ));
        }
        map.insert(params::FILE_TYPE.to_owned(), file_type);
    }
    if let Some(raw) = clean(&request.time_filter) {
        let filter = parse_field::<TimeFilter>("time_filter", &raw)?;
        map.insert(params::DATE_RESTRICT.to_owned(), filter.upstream_value().to_owned());
    }
    if let Some(exact) = clean(&request.exact_terms) {
        map.insert(params::EXACT_TERMS.to_owned(), exact);
    }
    if let Some(exclude) = clean(&request.exclude_terms) {
        map.insert(params::EXCLUDE_TERMS.to_owned(), exclude);
    }
    Ok(())
}

fn normalize_image(request: &ImageSearchRequest, map: &mut BTreeMap<String, String>) -> Result<()> {
    map.insert(params::SEARCH_TYPE.to_owned(), "image".to_owned());
    if let Some(raw) = clean(&request.image_size) {
        let size = parse_field::<ImageSize>("image_size", &raw)?;
        map.insert(params::IMAGE_SIZE.to_owned(), size.upstream_value().to_owned());
    }
    if let Some(raw) = clean(&request.image_type) {
        let kind = parse_field::<ImageType>("image_type", &raw)?;
        map.insert(params::IMAGE_TYPE.to_owned(), kind.upstream_value().to_owned());
    }
    if let Some(raw) = clean(&request.color) {
        let color = parse_field::<ImageColor>("color", &raw)?;
        map.insert(params::IMAGE_COLOR.to_owned(), color.upstream_value().to_owned());
    }
    if let Some(raw) = clean(&request.usage_rights) {
        map.insert(params::RIGHTS.to_owned(), normalize_rights(&raw)?);
    }
    Ok(())
}

fn normalize_news(request: &NewsSearchRequest, map: &mut BTreeMap<String, String>) -> Result<()> {
    let sort = match clean(&request.sort_by) {
        Some(raw) => parse_field::<NewsSort>("sort_by", &raw)?,
        None => NewsSort::Date,
    };
    if sort == NewsSort::Date {
        map.insert(params::SORT.to_owned(), sort.upstream_value().to_owned());
    }
    if let Some(raw) = clean(&request.time_filter) {
        let filter = parse_field::<TimeFilter>("time_filter", &raw)?;
        map.insert(params::DATE_RESTRICT.to_owned(), filter.upstream_value().to_owned());
    }
    Ok(())
}

/// Licences may be combined with `|` or `,`; the canonical form is sorted,
/// de-duplicated and `|`-joined.
fn normalize_rights(raw: &str) -> Result<String> {
    let mut rights: Vec<String> = raw
        .split(['|', ','])
        .map(|part| part.trim().to_ascii_lowercase())
        .filter(|part| !part.is_empty())
        .collect();
    if rights.is_empty() {
        return Err(SearchError::validation(
            "usage_rights",
            format!("must be one or more of {}", USAGE_RIGHTS.join(", ")),
        ));
    }
    if let Some(unknown) = rights.iter().find(|r| !USAGE_RIGHTS.contains(&r.as_str())) {
        return Err(SearchError::validation(
            "usage_rights",
            format!(
                "unknown licence `{unknown}`; must be one or more of {}",
                USAGE_RIGHTS.join(", ")
            ),
        ));
    }
    rights.sort();
    rights.dedup();
    Ok(rights.join("|"))
}

fn parse_field<T>(field: &'static str, raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|constraint| SearchError::validation(field, constraint))
}

fn two_letter_field(field: &'static str, value: &Option<String>, default: &str) -> Result<String> {
    match clean(value) {
        Some(raw) => {
            let code = raw.to_ascii_lowercase();
            if is_two_letter_code(&code) {
                Ok(code)
            } else {
                Err(SearchError::validation(
                    field,
                    "must be a two-letter code such as en or us",
                ))
            }
        }
        None => Ok(default.to_owned()),
    }
}

/// Trim and collapse internal whitespace; empty becomes `None` so an empty
/// string and an omitted field normalise identically.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(collapse_whitespace)
        .filter(|v| !v.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageSearchRequest, NewsSearchRequest, WebSearchRequest};

    fn normalizer() -> QueryNormalizer {
        QueryNormalizer::new(&SearchConfig::default())
    }

    fn field_of(err: SearchError) -> &'static str {
        match err {
            SearchError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let query = normalizer()
            .normalize(&WebSearchRequest::new("rust").into())
            .expect("valid");
        assert_eq!(query.kind(), SearchKind::Web);
        assert_eq!(query.num_results(), 10);
        assert_eq!(query.start_index(), 1);
        assert_eq!(query.get(params::SAFE), Some("active"));
        assert_eq!(query.get(params::LANGUAGE), Some("lang_en"));
        assert_eq!(query.get(params::COUNTRY), Some("us"));
    }

    #[test]
    fn omitted_and_explicit_defaults_share_a_fingerprint() {
        let n = normalizer();
        let implicit = n
            .normalize(&WebSearchRequest::new("test").into())
            .expect("valid");
        let explicit = n
            .normalize(
                &WebSearchRequest::new("test")
                    .with_num_results(10)
                    .with_start_index(1)
                    .with_safe_search("medium")
                    .with_language("en")
                    .with_country("us")
                    .into(),
            )
            .expect("valid");
        assert_eq!(implicit, explicit);
        assert_eq!(implicit.fingerprint(), explicit.fingerprint());
    }

    #[test]
    fn whitespace_and_enum_case_do_not_change_fingerprint() {
        let n = normalizer();
        let mut a = WebSearchRequest::new("  rust   async ");
        a.time_filter = Some("WEEK".into());
        a.site = Some(" Docs.RS ".into());
        let mut b = WebSearchRequest::new("rust async");
        b.time_filter = Some("w".into());
        b.site = Some("docs.rs".into());
        let fa = n.normalize(&a.into()).expect("valid").fingerprint();
        let fb = n.normalize(&b.into()).expect("valid").fingerprint();
        assert_eq!(fa, fb);
    }

    #[test]
    fn empty_optional_string_equals_omitted() {
        let n = normalizer();
        let mut with_empty = WebSearchRequest::new("rust");
        with_empty.site = Some("   ".into());
        with_empty.exact_terms = Some(String::new());
        let plain = WebSearchRequest::new("rust");
        assert_eq!(
            n.normalize(&with_empty.into()).expect("valid").fingerprint(),
            n.normalize(&plain.into()).expect("valid").fingerprint()
        );
    }

    #[test]
    fn kind_is_part_of_fingerprint() {
        let n = normalizer();
        let news = NewsSearchRequest {
            sort_by: Some("relevance".into()),
            ..NewsSearchRequest::new("rust")
        };
        let web = n.normalize(&WebSearchRequest::new("rust").into()).expect("valid");
        let news = n.normalize(&news.into()).expect("valid");
        assert_eq!(web.params(), news.params());
        assert_ne!(web.fingerprint(), news.fingerprint());
    }

    #[test]
    fn query_case_is_preserved() {
        let n = normalizer();
        let upper = n
            .normalize(&WebSearchRequest::new("cats OR dogs").into())
            .expect("valid");
        let lower = n
            .normalize(&WebSearchRequest::new("cats or dogs").into())
            .expect("valid");
        assert_eq!(upper.query_text(), "cats OR dogs");
        assert_ne!(upper.fingerprint(), lower.fingerprint());
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = normalizer()
            .normalize(&WebSearchRequest::new("rust").into())
            .expect("valid")
            .fingerprint();
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(fp.short().len(), 12);
    }

    #[test]
    fn empty_query_rejected() {
        let err = normalizer()
            .normalize(&WebSearchRequest::new(" \t\n ").into())
            .unwrap_err();
        assert_eq!(field_of(err), "query");
    }

    #[test]
    fn overlong_query_rejected() {
        let err = normalizer()
            .normalize(&WebSearchRequest::new("a".repeat(MAX_QUERY_CHARS + 1)).into())
            .unwrap_err();
        assert_eq!(field_of(err), "query");
    }

    #[test]
    fn num_results_above_ten_rejected() {
        let err = normalizer()
            .normalize(&WebSearchRequest::new("test").with_num_results(15).into())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("num_results"));
        assert!(message.contains("between 1 and 10"));
    }

    #[test]
    fn zero_num_results_rejected() {
        let err = normalizer()
            .normalize(&WebSearchRequest::new("test").with_num_results(0).into())
            .unwrap_err();
        assert_eq!(field_of(err), "num_results");
    }

    #[test]
    fn start_index_bounds() {
        let n = normalizer();
        let err = n
            .normalize(&WebSearchRequest::new("test").with_start_index(0).into())
            .unwrap_err();
        assert_eq!(field_of(err), "start_index");
        let err = n
            .normalize(&WebSearchRequest::new("test").with_start_index(92).into())
            .unwrap_err();
        assert_eq!(field_of(err), "start_index");
    }

    #[test]
    fn absolute_ceiling_enforced() {
        let n = normalizer();
        let q = n
            .normalize(
                &WebSearchRequest::new("test")
                    .with_start_index(91)
                    .with_num_results(10)
                    .into(),
            )
            .expect("results 91..=100 are servable");
        assert_eq!(q.start_index() + q.num_results() - 1, 100);

        // A normalizer built from an unvalidated config still refuses to
        // address results past the provider's absolute ceiling.
        let loose = QueryNormalizer {
            max_num_results: 20,
            ..normalizer()
        };
        let err = loose
            .normalize(
                &WebSearchRequest::new("test")
                    .with_start_index(91)
                    .with_num_results(20)
                    .into(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("must not exceed 100"));
    }

    #[test]
    fn configured_ceilings_are_respected() {
        let config = SearchConfig {
            max_num_results: 5,
            default_num_results: 5,
            max_start_index: 21,
            ..Default::default()
        };
        let n = QueryNormalizer::new(&config);
        let err = n
            .normalize(&WebSearchRequest::new("test").with_num_results(6).into())
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and 5"));
        let err = n
            .normalize(&WebSearchRequest::new("test").with_start_index(31).into())
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and 21"));
    }

    #[test]
    fn unknown_enum_values_name_the_field() {
        let n = normalizer();
        let err = n
            .normalize(&WebSearchRequest::new("t").with_safe_search("extreme").into())
            .unwrap_err();
        assert_eq!(field_of(err), "safe_search");

        let mut web = WebSearchRequest::new("t");
        web.time_filter = Some("decade".into());
        assert_eq!(field_of(n.normalize(&web.into()).unwrap_err()), "time_filter");

        let mut image = ImageSearchRequest::new("t");
        image.image_size = Some("gigantic".into());
        assert_eq!(field_of(n.normalize(&image.into()).unwrap_err()), "image_size");

        let mut image = ImageSearchRequest::new("t");
        image.color = Some("magenta".into());
        assert_eq!(field_of(n.normalize(&image.into()).unwrap_err()), "color");

        let news = NewsSearchRequest {
            sort_by: Some("popularity".into()),
            ..NewsSearchRequest::new("t")
        };
        assert_eq!(field_of(n.normalize(&news.into()).unwrap_err()), "sort_by");
    }

    #[test]
    fn language_and_country_validated() {
        let n = normalizer();
        let err = n
            .normalize(&WebSearchRequest::new("t").with_language("english").into())
            .unwrap_err();
        assert_eq!(field_of(err), "language");
        let q = n
            .normalize(&WebSearchRequest::new("t").with_language("DE").with_country("AT").into())
            .expect("valid");
        assert_eq!(q.get(params::LANGUAGE), Some("lang_de"));
        assert_eq!(q.get(params::COUNTRY), Some("at"));
    }

    #[test]
    fn web_filters_map_to_upstream_params() {
        let mut web = WebSearchRequest::new("report");
        web.file_type = Some(".PDF".into());
        web.exact_terms = Some("annual  review".into());
        web.exclude_terms = Some("draft".into());
        web.time_filter = Some("y".into());
        let q = normalizer().normalize(&web.into()).expect("valid");
        assert_eq!(q.get(params::FILE_TYPE), Some("pdf"));
        assert_eq!(q.get(params::EXACT_TERMS), Some("annual review"));
        assert_eq!(q.get(params::EXCLUDE_TERMS), Some("draft"));
        assert_eq!(q.get(params::DATE_RESTRICT), Some("y1"));
        assert!(q.get(params::SEARCH_TYPE).is_none());
    }

    #[test]
    fn bad_file_type_rejected() {
        let mut web = WebSearchRequest::new("report");
        web.file_type = Some("p d/f".into());
        assert_eq!(
            field_of(normalizer().normalize(&web.into()).unwrap_err()),
            "file_type"
        );
    }

    #[test]
    fn image_filters_map_to_upstream_params() {
        let mut image = ImageSearchRequest::new("sunset");
        image.image_size = Some("HUGE".into());
        image.image_type = Some("photo".into());
        image.color = Some("Orange".into());
        image.usage_rights = Some("cc_sharealike, cc_attribute".into());
        let q = normalizer().normalize(&image.into()).expect("valid");
        assert_eq!(q.get(params::SEARCH_TYPE), Some("image"));
        assert_eq!(q.get(params::IMAGE_SIZE), Some("huge"));
        assert_eq!(q.get(params::IMAGE_TYPE), Some("photo"));
        assert_eq!(q.get(params::IMAGE_COLOR), Some("orange"));
        assert_eq!(q.get(params::RIGHTS), Some("cc_attribute|cc_sharealike"));
    }

    #[test]
    fn unknown_usage_rights_rejected() {
        let mut image = ImageSearchRequest::new("sunset");
        image.usage_rights = Some("cc_attribute|all_rights".into());
        let err = normalizer().normalize(&image.into()).unwrap_err();
        assert!(err.to_string().contains("all_rights"));
    }

    #[test]
    fn news_sorts_by_date_by_default() {
        let n = normalizer();
        let q = n
            .normalize(&NewsSearchRequest::new("election").into())
            .expect("valid");
        assert_eq!(q.get(params::SORT), Some("date"));

        let relevance = NewsSearchRequest {
            sort_by: Some("RELEVANCE".into()),
            time_filter: Some("d".into()),
            ..NewsSearchRequest::new("election")
        };
        let q = n.normalize(&relevance.into()).expect("valid");
        assert!(q.get(params::SORT).is_none());
        assert_eq!(q.get(params::DATE_RESTRICT), Some("d1"));
    }
}
