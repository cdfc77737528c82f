//! Cursor-based pagination controller
//!
//! A `PaginationController` incrementally loads one logical list (a feed, a
//! search result, a follower list) from a [`PageSource`] and publishes the
//! merged items as an `AsyncResult<Vec<Item>>`.
//!
//! # State machine
//!
//! ```text
//!            load_next_page                 k == page_size
//!   HasMore ───────────────► Loading ───────────────────────► HasMore
//!      ▲                        │  │        k <  page_size
//!      │        fetch failed    │  └──────────────────────► Exhausted
//!      └────────────────────────┘
//!   reset(): any phase ─► HasMore (new generation, nothing loaded)
//! ```
//!
//! A fresh controller is `HasMore` with nothing loaded and publishes
//! `Pending`, so an unfetched list never reads as "no more items".
//!
//! # Guarantees
//!
//! - At most one fetch per controller is in flight. Calling
//!   `load_next_page` while `Loading` or `Exhausted` is a no-op.
//! - A failed fetch leaves the accumulated items untouched and the list
//!   retryable. Nothing retries automatically.
//! - Every fetch is tagged with the generation it started in. `reset`
//!   bumps the generation, and a completion from an older generation is
//!   dropped instead of merged.
//! - Items are appended in arrival order and never de-duplicated here; use
//!   [`dedup_by_key`] when pages may overlap.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use libfeedstate::pagination::{PagePhase, PaginationController};
//! use libfeedstate::source::mock::MockPageSource;
//!
//! # async fn example() -> libfeedstate::Result<()> {
//! let source = Arc::new(MockPageSource::from_items("posts", vec!["a", "b", "c"]));
//! let feed = PaginationController::new(source, 2)?;
//!
//! feed.load_next_page().await;
//! feed.load_next_page().await;
//!
//! assert_eq!(feed.items(), vec!["a", "b", "c"]);
//! assert_eq!(feed.phase(), PagePhase::Exhausted);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{SingleValueCache, Subscription};
use crate::error::{ErrorInfo, FeedStateError, Result};
use crate::result::AsyncResult;
use crate::service::events::{EventBus, StateEvent};
use crate::source::PageSource;
use crate::types::Cursor;

/// Where a list stands with respect to its next page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePhase {
    /// More pages may exist and no fetch is running
    HasMore,
    /// A fetch is in flight
    Loading,
    /// The source confirmed there is nothing more to load
    Exhausted,
}

/// What a call to `load_next_page` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was merged
    Loaded {
        /// Items in this page
        received: usize,
        /// Items accumulated after merging
        total: usize,
    },
    /// The fetch failed; the list is retryable
    Failed(ErrorInfo),
    /// Nothing was requested: already loading or exhausted
    Skipped,
    /// The fetch finished after a reset and its page was dropped
    Discarded,
}

struct PagerInner<T> {
    phase: PagePhase,
    accumulated: Vec<T>,
    cursor: Option<Cursor>,
    generation: u64,
    pages_loaded: usize,
}

/// Incremental loader for one logical list
pub struct PaginationController<S: PageSource> {
    id: Uuid,
    label: String,
    source: Arc<S>,
    page_size: usize,
    inner: Mutex<PagerInner<S::Item>>,
    state: SingleValueCache<AsyncResult<Vec<S::Item>>>,
    events: Option<EventBus>,
}

impl<S: PageSource> PaginationController<S> {
    /// Create a controller requesting `page_size` items per fetch
    ///
    /// # Errors
    ///
    /// Returns `FeedStateError::InvalidInput` if `page_size` is zero.
    pub fn new(source: Arc<S>, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(FeedStateError::InvalidInput(
                "Page size must be greater than zero".to_string(),
            ));
        }

        let label = source.name().to_string();
        Ok(Self {
            id: Uuid::new_v4(),
            label,
            source,
            page_size,
            inner: Mutex::new(PagerInner {
                phase: PagePhase::HasMore,
                accumulated: Vec::new(),
                cursor: None,
                generation: 0,
                pages_loaded: 0,
            }),
            state: SingleValueCache::new(AsyncResult::Pending),
            events: None,
        })
    }

    /// Name the list in logs and events (defaults to the source name)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Announce loads, failures and resets on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Fetch and merge the next page
    ///
    /// Returns immediately with [`LoadOutcome::Skipped`] if a fetch is
    /// already in flight or the list is exhausted.
    ///
    /// If the returned future is dropped before the page arrives, the list
    /// goes back to `HasMore` and republishes what it held before the call:
    /// `Ready(items)` once a page has loaded, `Pending` otherwise.
    pub async fn load_next_page(&self) -> LoadOutcome {
        let (generation, cursor) = {
            let mut inner = self.lock();
            if inner.phase != PagePhase::HasMore {
                debug!(list = %self.label, phase = ?inner.phase, "load request ignored");
                return LoadOutcome::Skipped;
            }
            inner.phase = PagePhase::Loading;
            self.state.write(AsyncResult::Pending);
            (inner.generation, inner.cursor.clone())
        };

        debug!(
            list = %self.label,
            generation,
            cursor = ?cursor,
            page_size = self.page_size,
            "requesting page"
        );

        let mut flight = InFlight {
            controller: self,
            generation,
            settled: false,
        };
        let result = self.source.fetch_page(cursor, self.page_size).await;
        flight.settled = true;

        let mut inner = self.lock();
        if inner.generation != generation {
            warn!(
                list = %self.label,
                stale_generation = generation,
                current_generation = inner.generation,
                "discarding page from superseded generation"
            );
            return LoadOutcome::Discarded;
        }

        match result {
            Ok(page) => {
                let received = page.items.len();
                let next_cursor = page.next_cursor.or_else(|| {
                    page.items
                        .last()
                        .and_then(|item| self.source.cursor_for(item))
                });

                inner.accumulated.extend(page.items);
                inner.pages_loaded += 1;
                inner.phase = if received < self.page_size {
                    PagePhase::Exhausted
                } else if next_cursor.is_none() {
                    warn!(
                        list = %self.label,
                        "full page without a resume cursor, treating list as exhausted"
                    );
                    PagePhase::Exhausted
                } else {
                    PagePhase::HasMore
                };
                if next_cursor.is_some() {
                    inner.cursor = next_cursor;
                }

                let total = inner.accumulated.len();
                let exhausted = inner.phase == PagePhase::Exhausted;
                self.state
                    .write(AsyncResult::ready(inner.accumulated.clone()));

                debug!(list = %self.label, generation, received, total, exhausted, "page merged");
                self.emit(StateEvent::PageLoaded {
                    list_id: self.id,
                    list: self.label.clone(),
                    generation,
                    received,
                    total,
                    exhausted,
                });

                LoadOutcome::Loaded { received, total }
            }
            Err(error) => {
                inner.phase = PagePhase::HasMore;
                self.state.write(AsyncResult::Failed(error.clone()));

                warn!(list = %self.label, generation, error = %error, "page fetch failed");
                self.emit(StateEvent::PageFailed {
                    list_id: self.id,
                    list: self.label.clone(),
                    generation,
                    error: error.clone(),
                });

                LoadOutcome::Failed(error)
            }
        }
    }

    /// Clear the list and start a new generation
    ///
    /// Any fetch still in flight will have its result discarded.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.phase = PagePhase::HasMore;
        inner.accumulated.clear();
        inner.cursor = None;
        inner.pages_loaded = 0;
        self.state.write(AsyncResult::Pending);

        info!(list = %self.label, generation = inner.generation, "list reset");
        self.emit(StateEvent::ListReset {
            list_id: self.id,
            list: self.label.clone(),
            generation: inner.generation,
        });
    }

    /// Reset, then load the first page of the new generation
    pub async fn refresh(&self) -> LoadOutcome {
        self.reset();
        self.load_next_page().await
    }

    /// Current observable state
    pub fn state(&self) -> AsyncResult<Vec<S::Item>> {
        self.state.read()
    }

    /// Follow the observable state; yields the current value first
    pub fn subscribe(&self) -> Subscription<AsyncResult<Vec<S::Item>>> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> PagePhase {
        self.lock().phase
    }

    /// Copy of every item accumulated in the current generation
    ///
    /// Unlike [`state`](Self::state) this stays available while a fetch is
    /// pending or after one failed.
    pub fn items(&self) -> Vec<S::Item> {
        self.lock().accumulated.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().accumulated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().accumulated.is_empty()
    }

    /// Pages merged since the last reset
    pub fn pages_loaded(&self) -> usize {
        self.lock().pages_loaded
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn emit(&self, event: StateEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, PagerInner<S::Item>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns a `Loading` list to `HasMore` if its fetch future is dropped early
struct InFlight<'a, S: PageSource> {
    controller: &'a PaginationController<S>,
    generation: u64,
    settled: bool,
}

impl<S: PageSource> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut inner = self.controller.lock();
        if inner.generation == self.generation && inner.phase == PagePhase::Loading {
            inner.phase = PagePhase::HasMore;
            let restored = if inner.pages_loaded == 0 {
                AsyncResult::Pending
            } else {
                AsyncResult::ready(inner.accumulated.clone())
            };
            self.controller.state.write(restored);
            debug!(list = %self.controller.label, "page fetch abandoned");
        }
    }
}

/// Drop later items whose key was already seen, keeping arrival order
pub fn dedup_by_key<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}
