//! Paginator Tests
//!
//! Tests for:
//! - Cursor and page-index continuation
//! - Termination on an empty page or a cleared "more" flag
//! - Termination when a source keeps claiming more pages it doesn't have
//! - Item keys from the adapter or the driver
//! - Error handling mid-listing

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gs_common::CommandRecord;
use gs_engine::{page_fn, FetchedPage, Page, PageFetch, Paginator};

/// Scripted source: page `n` returns `sizes[n]` items and `more[n]` as its flag.
/// Requests past the script repeat the last page.
struct ScriptedSource {
    sizes: Vec<usize>,
    more: Vec<bool>,
    fail_at: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(sizes: &[usize], more: &[bool]) -> Self {
        Self {
            sizes: sizes.to_vec(),
            more: more.to_vec(),
            fail_at: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_at(mut self, page: usize) -> Self {
        self.fail_at = Some(page);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetch for ScriptedSource {
    type Item = String;
    type State = usize;
    type Error = String;

    async fn fetch(&self, page: &usize) -> Result<FetchedPage<String, usize>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(*page) {
            return Err(format!("page {} unavailable", page));
        }

        let index = (*page).min(self.sizes.len() - 1);
        let items = (0..self.sizes[index])
            .map(|i| format!("user-{}-{}", index, i))
            .collect();
        let record = CommandRecord::new(format!("GET /users?page={}", page)).with_raw_data("[]");

        Ok(FetchedPage::new(items, page + 1, self.more[index], record))
    }

    fn unique_key(&self, item: &String) -> Option<String> {
        Some(item.clone())
    }
}

#[tokio::test]
async fn test_stops_on_empty_page() {
    let source = ScriptedSource::new(&[3, 3, 0], &[true, true, false]);
    let paged = Paginator::new(source).run().await.unwrap();

    assert_eq!(paged.items.len(), 6);
    assert_eq!(paged.pages, 3);
    assert_eq!(paged.ledger.len(), 3);

    let commands: Vec<_> = paged.ledger.iter().map(|c| c.command()).collect();
    assert_eq!(
        commands,
        vec!["GET /users?page=0", "GET /users?page=1", "GET /users?page=2"]
    );
}

#[tokio::test]
async fn test_stops_when_more_flag_clears() {
    let source = ScriptedSource::new(&[2, 2], &[true, false]);
    let paginator = Paginator::new(source);
    let paged = paginator.run().await.unwrap();

    assert_eq!(paged.items.len(), 4);
    assert_eq!(paged.pages, 2);
    assert_eq!(paginator.fetcher().calls(), 2);
}

#[tokio::test]
async fn test_stale_more_flag_on_empty_page() {
    let source = ScriptedSource::new(&[3, 3, 0], &[true, true, true]);
    let paginator = Paginator::new(source);
    let paged = paginator.run().await.unwrap();

    assert_eq!(paged.items.len(), 6);
    assert_eq!(paged.pages, 3);
    assert_eq!(paged.ledger.len(), 3);
    assert_eq!(paginator.fetcher().calls(), 3);
}

#[tokio::test]
async fn test_stale_more_flag_terminates_on_repeated_page() {
    // The last page is served again with the flag still set; the adapter's
    // own item key detects it.
    let source = ScriptedSource::new(&[3, 3], &[true, true]);
    let paginator = Paginator::new(source);
    let paged = paginator.run().await.unwrap();

    assert_eq!(paged.items.len(), 6);
    assert_eq!(paged.pages, 3);
    assert_eq!(paged.ledger.len(), 3);
}

#[tokio::test]
async fn test_driver_key_overrides_keyless_adapter() {
    // Distinct requests, same items every time.
    let paginator = Paginator::new(page_fn(|page: u32| async move {
        Ok::<_, String>(FetchedPage::new(
            vec!["alice".to_string(), "bob".to_string()],
            page + 1,
            true,
            CommandRecord::new("ListUsers").with_parameter("page", page),
        ))
    }))
    .unique_by(|user: &String| user.clone());

    let paged = paginator.run().await.unwrap();
    assert_eq!(paged.items, vec!["alice", "bob"]);
    assert_eq!(paged.pages, 2);
}

#[tokio::test]
async fn test_keyless_source_repeating_request_terminates() {
    let calls = std::sync::Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let paginator = Paginator::new(page_fn(move |_state: u32| {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
            Ok::<_, String>(FetchedPage::new(
                vec!["user-1", "user-2"],
                0,
                true,
                CommandRecord::new("GET /users"),
            ))
        }
    }));

    let paged = paginator.run().await.unwrap();
    assert_eq!(paged.items, vec!["user-1", "user-2"]);
    assert_eq!(paged.ledger.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_error_aborts_listing() {
    let source = ScriptedSource::new(&[3, 3, 3, 0], &[true, true, true, false]).failing_at(2);
    let paginator = Paginator::new(source);

    let err = paginator.run().await.unwrap_err();
    assert_eq!(err, "page 2 unavailable");
    assert_eq!(paginator.fetcher().calls(), 3);
}

#[tokio::test]
async fn test_cursor_continuation_through_closure() {
    // Opaque cursor: empty on the first call, absent after the last page.
    let paginator = Paginator::new(page_fn(|cursor: Option<String>| async move {
        let (items, next) = match cursor.as_deref() {
            None => (vec!["a", "b"], Some("c1".to_string())),
            Some("c1") => (vec!["c"], Some("c2".to_string())),
            Some(_) => (vec!["d"], None),
        };
        let has_more = next.is_some();
        Ok::<_, String>(FetchedPage::new(
            items,
            next,
            has_more,
            CommandRecord::new("ListUsers").with_parameter("cursor", cursor.unwrap_or_default()),
        ))
    }));

    let paged = paginator.run().await.unwrap();

    assert_eq!(paged.items, vec!["a", "b", "c", "d"]);
    assert_eq!(paged.pages, 3);
    let cursors: Vec<_> = paged
        .ledger
        .iter()
        .map(|c| c.parameters().unwrap()["cursor"].clone())
        .collect();
    assert_eq!(cursors, vec!["", "c1", "c2"]);
}

struct TruncatedResponse {
    users: Vec<String>,
    is_truncated: bool,
    marker: Option<String>,
}

impl Page for TruncatedResponse {
    type Item = String;
    type State = Option<String>;

    fn has_more(&self) -> bool {
        self.is_truncated
    }

    fn cursor(&self) -> Option<String> {
        self.marker.clone()
    }

    fn into_items(self) -> Vec<String> {
        self.users
    }
}

#[tokio::test]
async fn test_page_trait_adapter() {
    let paginator = Paginator::new(page_fn(|marker: Option<String>| async move {
        let response = match marker.as_deref() {
            None => TruncatedResponse {
                users: vec!["alice".into(), "bob".into()],
                is_truncated: true,
                marker: Some("m1".into()),
            },
            Some(_) => TruncatedResponse {
                users: vec!["carol".into()],
                is_truncated: false,
                marker: None,
            },
        };
        let record = CommandRecord::new("ListUsers").with_parameter("marker", marker.unwrap_or_default());
        Ok::<_, String>(FetchedPage::from_page(response, record))
    }));

    let paged = paginator.run().await.unwrap();
    assert_eq!(paged.items, vec!["alice", "bob", "carol"]);
    assert_eq!(paged.pages, 2);
}
