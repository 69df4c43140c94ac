//! Continuation adapters
//!
//! Each adapter turns one vendor's continuation convention into a
//! `(next_state, has_more)` pair for `FetchedPage`. The driver in `gs-engine`
//! treats them all the same way.

use async_trait::async_trait;
use gs_config::PaginationConfig;
use gs_engine::{FetchedPage, ItemKey, PageFetch};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::http::RecordedHttpClient;
use crate::link_header::Links;
use crate::{ConnectorError, ConnectorResult};

/// Response header carrying the range of the following page.
pub const NEXT_RANGE_HEADER: &str = "next-range";

// ============================================================================
// Header-based continuation
// ============================================================================

/// Follow `Link: <uri>; rel="next"`. No next link ends the listing.
pub fn next_link_from_headers(headers: &HeaderMap) -> (Option<String>, bool) {
    let next = Links::from_headers(headers)
        .find_rel("next")
        .map(|l| l.uri.clone());
    let has_more = next.is_some();
    (next, has_more)
}

/// Follow a `Next-Range` header. More pages exist only while the source
/// answers with 206 Partial Content and names the next range.
pub fn next_range_from_headers(status: u16, headers: &HeaderMap) -> (Option<String>, bool) {
    if status != StatusCode::PARTIAL_CONTENT.as_u16() {
        return (None, false);
    }
    let next = headers
        .get(NEXT_RANGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let has_more = next.is_some();
    (next, has_more)
}

// ============================================================================
// Body-based continuation
// ============================================================================

/// 1-based page index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(pub u32);

impl Default for PageNumber {
    fn default() -> Self {
        Self(1)
    }
}

impl PageNumber {
    pub fn number(&self) -> u32 {
        self.0
    }

    /// `page=N&per_page=M` query fragment.
    pub fn query(&self, per_page: u32) -> String {
        format!("page={}&per_page={}", self.0, per_page)
    }

    /// Continuation after this page returned `returned` items.
    ///
    /// With a known page count the listing ends on the last page; without one
    /// it ends on the first empty page.
    pub fn continuation(self, returned: usize, total_pages: Option<u32>) -> (PageNumber, bool) {
        let next = PageNumber(self.0.saturating_add(1));
        let has_more = match total_pages {
            Some(total) => self.0 < total,
            None => returned > 0,
        };
        (next, has_more)
    }
}

/// Truncation flag plus marker, as returned by marker-paged list APIs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marker(pub Option<String>);

impl Marker {
    pub fn as_param(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn continuation(is_truncated: bool, marker: Option<String>) -> (Marker, bool) {
        let marker = marker.filter(|m| !m.is_empty());
        let has_more = is_truncated && marker.is_some();
        (Marker(marker), has_more)
    }
}

/// Opaque cursor token. An absent or empty token ends the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor(pub Option<String>);

impl Cursor {
    pub fn as_param(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn continuation(next: Option<String>) -> (Cursor, bool) {
        let next = next.filter(|c| !c.is_empty());
        let has_more = next.is_some();
        (Cursor(next), has_more)
    }
}

// ============================================================================
// Link-header fetcher
// ============================================================================

/// [`PageFetch`] over a JSON array endpoint paged by `Link` headers.
///
/// The first request goes to `base_url`; later requests follow `rel="next"`.
/// `key` identifies an item across pages.
pub struct LinkHeaderFetch<T> {
    client: RecordedHttpClient,
    base_url: String,
    key: ItemKey<T>,
}

impl<T> LinkHeaderFetch<T> {
    pub fn new<K>(client: RecordedHttpClient, base_url: impl Into<String>, key: K) -> Self
    where
        K: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            client,
            base_url: base_url.into(),
            key: Box::new(key),
        }
    }
}

#[async_trait]
impl<T> PageFetch for LinkHeaderFetch<T>
where
    T: DeserializeOwned + Send,
{
    type Item = T;
    type State = Option<String>;
    type Error = ConnectorError;

    async fn fetch(&self, next: &Option<String>) -> ConnectorResult<FetchedPage<T, Option<String>>> {
        let url = next.as_deref().unwrap_or(&self.base_url);
        let response = self.client.get(url).await?;
        let items: Vec<T> = response.json()?;
        let (next_state, has_more) = next_link_from_headers(&response.headers);

        Ok(FetchedPage::new(items, next_state, has_more, response.record))
    }

    fn unique_key(&self, item: &T) -> Option<String> {
        Some((self.key)(item))
    }
}

// ============================================================================
// Page-number fetcher
// ============================================================================

/// [`PageFetch`] over a JSON array endpoint taking `page` and `per_page`
/// query parameters. The listing ends on the first empty page.
pub struct PageNumberFetch<T> {
    client: RecordedHttpClient,
    base_url: String,
    per_page: u32,
    key: ItemKey<T>,
}

impl<T> PageNumberFetch<T> {
    pub fn new<K>(
        client: RecordedHttpClient,
        base_url: impl Into<String>,
        pagination: &PaginationConfig,
        key: K,
    ) -> Self
    where
        K: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            client,
            base_url: base_url.into(),
            per_page: pagination.page_size,
            key: Box::new(key),
        }
    }

    fn page_url(&self, page: PageNumber) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.base_url, separator, page.query(self.per_page))
    }
}

#[async_trait]
impl<T> PageFetch for PageNumberFetch<T>
where
    T: DeserializeOwned + Send,
{
    type Item = T;
    type State = PageNumber;
    type Error = ConnectorError;

    async fn fetch(&self, page: &PageNumber) -> ConnectorResult<FetchedPage<T, PageNumber>> {
        let response = self.client.get(&self.page_url(*page)).await?;
        let items: Vec<T> = response.json()?;
        let (next_state, has_more) = page.continuation(items.len(), None);

        Ok(FetchedPage::new(items, next_state, has_more, response.record))
    }

    fn unique_key(&self, item: &T) -> Option<String> {
        Some((self.key)(item))
    }
}
