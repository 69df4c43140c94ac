//! Paginator - exhausts any page-oriented API or query cursor
//!
//! Vendors differ in how they continue (truncation marker, opaque cursor,
//! next link, page index, range header, empty page). An adapter hides that
//! behind [`PageFetch`]; the driver loop is the same for all of them:
//!
//! 1. fetch the page for the current state
//! 2. record the request and keep the items that are new
//! 3. stop when the page added nothing new, or the server reports no more pages
//!
//! The "nothing new" check wins over the server's flag so that a source
//! repeating its last page cannot loop forever. Items are deduplicated by
//! the adapter's [`PageFetch::unique_key`] (or a key set on the driver). When
//! neither supplies a key, a page whose request repeats an earlier request
//! counts as adding nothing.

use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use gs_common::{CommandRecord, ProvenanceLedger};
use tracing::debug;

/// One fetched page, as the driver sees it.
#[derive(Debug, Clone)]
pub struct FetchedPage<T, S> {
    pub items: Vec<T>,
    /// Continuation passed to the next fetch.
    pub next_state: S,
    /// Server-side claim that more pages exist.
    pub has_more: bool,
    pub record: CommandRecord,
}

impl<T, S> FetchedPage<T, S> {
    pub fn new(items: Vec<T>, next_state: S, has_more: bool, record: CommandRecord) -> Self {
        Self {
            items,
            next_state,
            has_more,
            record,
        }
    }

    /// The final page of a listing.
    pub fn last(items: Vec<T>, record: CommandRecord) -> Self
    where
        S: Default,
    {
        Self::new(items, S::default(), false, record)
    }

    /// Bridge a typed vendor response into the driver.
    pub fn from_page<P>(page: P, record: CommandRecord) -> Self
    where
        P: Page<Item = T, State = S>,
    {
        let has_more = page.has_more();
        let next_state = page.cursor();
        let items = page.into_items();
        Self::new(items, next_state, has_more, record)
    }
}

/// Paging capability of a vendor response body.
pub trait Page {
    type Item;
    type State;

    fn has_more(&self) -> bool;

    /// Continuation for the following request.
    fn cursor(&self) -> Self::State;

    fn into_items(self) -> Vec<Self::Item>;
}

/// Fetches one page for a given continuation state.
///
/// The first call receives `State::default()`.
#[async_trait]
pub trait PageFetch: Send + Sync {
    type Item: Send;
    type State: Default + Send + Sync;
    type Error: Send;

    async fn fetch(
        &self,
        state: &Self::State,
    ) -> Result<FetchedPage<Self::Item, Self::State>, Self::Error>;

    /// Stable identity of an item across pages, used to detect repeats.
    fn unique_key(&self, _item: &Self::Item) -> Option<String> {
        None
    }
}

/// Adapts an async closure taking the current state into a [`PageFetch`].
pub struct PageFn<F, S> {
    f: F,
    _state: PhantomData<fn() -> S>,
}

pub fn page_fn<F, S>(f: F) -> PageFn<F, S> {
    PageFn {
        f,
        _state: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T, S, E> PageFetch for PageFn<F, S>
where
    F: Fn(S) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchedPage<T, S>, E>> + Send + 'static,
    T: Send,
    S: Default + Clone + Send + Sync,
    E: Send,
{
    type Item = T;
    type State = S;
    type Error = E;

    async fn fetch(&self, state: &S) -> Result<FetchedPage<T, S>, E> {
        (self.f)(state.clone()).await
    }
}

/// Every item of a paged listing plus one record per page fetched.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub ledger: ProvenanceLedger,
    pub pages: usize,
}

/// Boxed item identity function.
pub type ItemKey<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Request identity: the command plus its parameters.
fn request_signature(record: &CommandRecord) -> String {
    format!("{} {:?}", record.command(), record.parameters())
}

/// Drives a [`PageFetch`] adapter until the listing is exhausted.
pub struct Paginator<F: PageFetch> {
    fetcher: F,
    unique_key: Option<ItemKey<F::Item>>,
}

impl<F: PageFetch> Paginator<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            unique_key: None,
        }
    }

    /// Deduplicate items by a caller-supplied key, overriding the adapter's.
    /// Items whose key was already seen are dropped and do not count as new.
    pub fn unique_by<K>(mut self, key: K) -> Self
    where
        K: Fn(&F::Item) -> String + Send + Sync + 'static,
    {
        self.unique_key = Some(Box::new(key));
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn key_of(&self, item: &F::Item) -> Option<String> {
        match &self.unique_key {
            Some(key) => Some(key(item)),
            None => self.fetcher.unique_key(item),
        }
    }

    /// Fetch pages strictly in sequence until exhausted.
    ///
    /// On error nothing is returned; pages accumulated so far are discarded.
    pub async fn run(&self) -> Result<Paged<F::Item>, F::Error> {
        let mut state = F::State::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut issued: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        let mut ledger = ProvenanceLedger::new();
        let mut pages = 0usize;

        loop {
            let page = self.fetcher.fetch(&state).await?;
            pages += 1;
            let repeated = !issued.insert(request_signature(&page.record));
            ledger.push(page.record);

            let mut added = 0usize;
            for item in page.items {
                let fresh = match self.key_of(&item) {
                    Some(key) => seen.insert(key),
                    None => !repeated,
                };
                if fresh {
                    items.push(item);
                    added += 1;
                }
            }

            debug!(page = pages, added, has_more = page.has_more, "Fetched page");

            if added == 0 || !page.has_more {
                break;
            }
            state = page.next_state;
        }

        Ok(Paged {
            items,
            ledger,
            pages,
        })
    }
}
