//! Mock repository implementations for testing
//!
//! These sources simulate a backend without any network access. They can
//! serve a fixed dataset or a scripted sequence of responses, inject
//! failures, add latency, and hold fetches open until the test releases
//! them, which is how in-flight and stale-response behavior gets exercised.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::error::{ErrorInfo, FetchResult};
use crate::source::{EntitySource, PageSource};
use crate::types::{Cursor, Page};

type ItemCursorFn<T> = Arc<dyn Fn(&T) -> Cursor + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum MockPages<T> {
    /// Slices of a fixed list, addressed by offset tokens
    Dataset(Vec<T>),
    /// One queued response per call; an empty page once the queue runs dry
    Scripted {
        responses: Mutex<VecDeque<FetchResult<Vec<T>>>>,
        served: Mutex<usize>,
    },
}

/// A fetch recorded by a mock source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub limit: usize,
}

/// Mock page source for testing
pub struct MockPageSource<T> {
    name: String,
    pages: MockPages<T>,
    delay: Duration,
    item_cursor: Option<ItemCursorFn<T>>,
    gate: watch::Sender<bool>,
    failure: Mutex<Option<ErrorInfo>>,
    call_count: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<PageRequest>>>,
}

impl<T> MockPageSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn with_pages(name: &str, pages: MockPages<T>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            name: name.to_string(),
            pages,
            delay: Duration::from_millis(0),
            item_cursor: None,
            gate,
            failure: Mutex::new(None),
            call_count: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve consecutive slices of `items`
    pub fn from_items(name: &str, items: Vec<T>) -> Self {
        Self::with_pages(name, MockPages::Dataset(items))
    }

    /// Return `responses` in order, one per fetch
    ///
    /// Successful responses carry a `page-N` token unless
    /// [`with_item_cursor`](Self::with_item_cursor) is configured.
    pub fn scripted(name: &str, responses: Vec<FetchResult<Vec<T>>>) -> Self {
        Self::with_pages(
            name,
            MockPages::Scripted {
                responses: Mutex::new(responses.into()),
                served: Mutex::new(0),
            },
        )
    }

    /// Simulate network latency on every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Omit backend tokens and let the caller derive cursors from items
    pub fn with_item_cursor<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Cursor + Send + Sync + 'static,
    {
        self.item_cursor = Some(Arc::new(f));
        self
    }

    /// Queue another scripted response (no effect on dataset sources)
    pub fn push_response(&self, response: FetchResult<Vec<T>>) {
        if let MockPages::Scripted { responses, .. } = &self.pages {
            lock(responses).push_back(response);
        }
    }

    /// Make the next fetch fail with `error`
    pub fn fail_next(&self, error: ErrorInfo) {
        *lock(&self.failure) = Some(error);
    }

    /// Block fetches until [`release`](Self::release) is called
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held and future fetches complete
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Number of times `fetch_page` was called
    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }

    /// Every fetch in call order
    pub fn requests(&self) -> Vec<PageRequest> {
        lock(&self.requests).clone()
    }

    fn serve(&self, cursor: Option<&Cursor>, limit: usize) -> FetchResult<Page<T>> {
        match &self.pages {
            MockPages::Dataset(items) => {
                let offset = match cursor {
                    Some(cursor) => cursor.as_str().parse::<usize>().map_err(|_| {
                        ErrorInfo::unknown(format!("Malformed cursor: {}", cursor))
                    })?,
                    None => 0,
                };
                let start = offset.min(items.len());
                let end = start.saturating_add(limit).min(items.len());
                Ok(Page::with_cursor(
                    items[start..end].to_vec(),
                    Cursor::new(end.to_string()),
                ))
            }
            MockPages::Scripted { responses, served } => {
                let Some(response) = lock(responses).pop_front() else {
                    return Ok(Page::new(Vec::new()));
                };
                let items = response?;

                let mut served = lock(served);
                *served += 1;
                if self.item_cursor.is_some() {
                    Ok(Page::new(items))
                } else {
                    Ok(Page::with_cursor(items, Cursor::new(format!("page-{}", *served))))
                }
            }
        }
    }
}

#[async_trait]
impl<T> PageSource for MockPageSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    async fn fetch_page(&self, cursor: Option<Cursor>, limit: usize) -> FetchResult<Page<T>> {
        *lock(&self.call_count) += 1;
        lock(&self.requests).push(PageRequest {
            cursor: cursor.clone(),
            limit,
        });

        let mut gate = self.gate.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = gate.wait_for(|open| *open).await;

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if let Some(error) = lock(&self.failure).take() {
            return Err(error);
        }

        self.serve(cursor.as_ref(), limit)
    }

    fn cursor_for(&self, item: &T) -> Option<Cursor> {
        self.item_cursor.as_ref().map(|f| f(item))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Mock entity source for testing
pub struct MockEntitySource<E> {
    entities: Mutex<HashMap<String, E>>,
    delay: Duration,
    failure: Mutex<Option<ErrorInfo>>,
    call_count: Arc<Mutex<usize>>,
}

impl<E> MockEntitySource<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(0),
            failure: Mutex::new(None),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Store or replace the entity returned for `id`
    pub fn insert(&self, id: &str, entity: E) {
        lock(&self.entities).insert(id.to_string(), entity);
    }

    pub fn remove(&self, id: &str) {
        lock(&self.entities).remove(id);
    }

    /// Make the next fetch fail with `error`
    pub fn fail_next(&self, error: ErrorInfo) {
        *lock(&self.failure) = Some(error);
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }
}

impl<E> Default for MockEntitySource<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E> EntitySource for MockEntitySource<E>
where
    E: Clone + Send + Sync + 'static,
{
    type Entity = E;

    async fn fetch_entity(&self, id: &str) -> FetchResult<E> {
        *lock(&self.call_count) += 1;

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if let Some(error) = lock(&self.failure).take() {
            return Err(error);
        }

        lock(&self.entities)
            .get(id)
            .cloned()
            .ok_or_else(|| ErrorInfo::not_found(format!("Entity not found: {}", id)))
    }
}
