//! Single-value cache with change notification
//!
//! `SingleValueCache` holds the latest known value of a singleton entity (the
//! signed-in user's profile) and notifies any number of subscribers when it
//! changes.
//!
//! # Concurrency
//!
//! All mutation goes through one `std::sync::Mutex`. `write`, `update` and
//! `update_with` each run as a single critical section, so a partial update
//! always merges against the value that is current at the moment it commits
//! and two concurrent partial updates cannot lose each other's fields.
//! Nothing inside the critical section suspends.
//!
//! # Subscribers
//!
//! Each subscriber owns a private `tokio::sync::watch` channel registered in
//! the cache. Publishing happens inside the write lock, so every subscriber
//! sees values in write order. A watch channel only ever holds the newest
//! value, so a subscriber that falls behind skips intermediate values instead
//! of building up a backlog, and a writer never waits on a reader. Channels
//! whose subscription was dropped are pruned on the next write or subscribe.
//!
//! # Example
//!
//! ```
//! use libfeedstate::{ProfilePatch, SingleValueCache, UserProfile};
//!
//! # async fn example() {
//! let cache = SingleValueCache::new(UserProfile::empty());
//! let mut updates = cache.subscribe();
//!
//! cache.update(&ProfilePatch::username("alice"));
//!
//! let latest = updates.next().await.unwrap();
//! assert_eq!(latest.username, "alice");
//! # }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::stream::{self, Stream};
use tokio::sync::watch;
use tracing::trace;

/// Compute a new value from the current one plus a partial edit
pub trait Merge<P> {
    fn merge(&self, patch: &P) -> Self;
}

/// Thread-safe holder of the latest value of a singleton entity
pub struct SingleValueCache<T> {
    inner: Mutex<CacheInner<T>>,
}

struct CacheInner<T> {
    current: T,
    version: u64,
    subscribers: Vec<watch::Sender<T>>,
}

impl<T> SingleValueCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cache seeded with `initial` (usually an empty sentinel)
    pub fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                current: initial,
                version: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Return a copy of the current value
    pub fn read(&self) -> T {
        self.lock().current.clone()
    }

    /// Replace the current value and notify subscribers
    ///
    /// Returns the version this write produced.
    pub fn write(&self, value: T) -> u64 {
        let mut inner = self.lock();
        Self::publish(&mut inner, value)
    }

    /// Merge `patch` into the current value and publish the result
    ///
    /// The read, merge, and write happen under one lock acquisition.
    /// Returns the value that was written.
    pub fn update<P>(&self, patch: &P) -> T
    where
        T: Merge<P>,
    {
        self.update_with(|current| current.merge(patch))
    }

    /// Like [`update`](Self::update), also returning the version it produced
    pub fn update_versioned<P>(&self, patch: &P) -> (T, u64)
    where
        T: Merge<P>,
    {
        let mut inner = self.lock();
        let next = inner.current.merge(patch);
        let version = Self::publish(&mut inner, next.clone());
        (next, version)
    }

    /// Atomically replace the current value with `f(current)`
    ///
    /// Returns the value that was written.
    pub fn update_with<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let mut inner = self.lock();
        let next = f(&inner.current);
        Self::publish(&mut inner, next.clone());
        next
    }

    /// Subscribe to changes
    ///
    /// The first call to [`Subscription::next`] yields the current value
    /// without waiting; later calls yield each newer value.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut inner = self.lock();
        inner.subscribers.retain(|sender| !sender.is_closed());
        let (sender, receiver) = watch::channel(inner.current.clone());
        inner.subscribers.push(sender);
        trace!(subscribers = inner.subscribers.len(), "cache subscriber registered");

        Subscription {
            receiver,
            primed: true,
        }
    }

    /// Number of registered subscriber channels
    ///
    /// Dropped subscriptions are pruned on the next write or subscribe, so
    /// this may briefly over-count.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Number of writes applied since construction
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    fn publish(inner: &mut CacheInner<T>, value: T) -> u64 {
        let CacheInner {
            current,
            version,
            subscribers,
        } = inner;

        *current = value;
        *version += 1;
        // A send error means the subscription was dropped.
        subscribers.retain(|sender| sender.send(current.clone()).is_ok());

        trace!(
            version = *version,
            subscribers = subscribers.len(),
            "cache value published"
        );
        *version
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<T>> {
        // Every critical section leaves the value consistent before anything
        // that could panic, so a poisoned lock is still safe to use.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for SingleValueCache<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for SingleValueCache<T>
where
    T: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SingleValueCache")
            .field("current", &inner.current)
            .field("version", &inner.version)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

/// Live, conflating feed of a cache's value
pub struct Subscription<T> {
    receiver: watch::Receiver<T>,
    primed: bool,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wait for the next value
    ///
    /// Returns the current value immediately on the first call. Returns
    /// `None` once the cache has been dropped.
    pub async fn next(&mut self) -> Option<T> {
        if self.primed {
            self.primed = false;
            return Some(self.receiver.borrow_and_update().clone());
        }

        match self.receiver.changed().await {
            Ok(()) => Some(self.receiver.borrow_and_update().clone()),
            Err(_) => None,
        }
    }

    /// Peek at the newest value without marking it as seen
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Whether `next` would return without waiting
    pub fn has_changed(&self) -> bool {
        self.primed || self.receiver.has_changed().unwrap_or(false)
    }

    /// Adapt into a `Stream` that ends when the cache is dropped
    pub fn into_stream(self) -> impl Stream<Item = T> {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|value| (value, subscription))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProfilePatch, UserProfile};
    use futures::StreamExt;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_read_returns_initial_value() {
        let cache = SingleValueCache::new(UserProfile::empty());
        assert!(cache.read().is_empty());
        assert_eq!(cache.version(), 0);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = SingleValueCache::new(0u32);
        for value in 1..=50 {
            cache.write(value);
        }
        assert_eq!(cache.read(), 50);
        assert_eq!(cache.version(), 50);
    }

    #[test]
    fn test_sequential_partial_updates() {
        let cache = SingleValueCache::new(UserProfile::empty());

        cache.update(&ProfilePatch::username("alice"));
        let written = cache.update(&ProfilePatch::profession("dev"));

        let expected = UserProfile {
            username: "alice".to_string(),
            profession: "dev".to_string(),
            ..UserProfile::empty()
        };
        assert_eq!(written, expected);
        assert_eq!(cache.read(), expected);
    }

    #[test]
    fn test_concurrent_partial_updates_do_not_lose_fields() {
        // Repeat to give the scheduler plenty of interleavings.
        for _ in 0..200 {
            let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [ProfilePatch::username("alice"), ProfilePatch::profession("dev")]
                .into_iter()
                .map(|patch| {
                    let cache = Arc::clone(&cache);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        cache.update(&patch);
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            let profile = cache.read();
            assert_eq!(profile.username, "alice");
            assert_eq!(profile.profession, "dev");
        }
    }

    #[test]
    fn test_update_with_counter_is_atomic() {
        let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.update_with(|profile| UserProfile {
                            post_count: profile.post_count + 1,
                            ..profile.clone()
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.read().post_count, 800);
    }

    #[tokio::test]
    async fn test_subscribe_replays_current_value() {
        let cache = SingleValueCache::new("seed".to_string());
        cache.write("current".to_string());

        let mut subscription = cache.subscribe();
        assert!(subscription.has_changed());
        assert_eq!(subscription.next().await, Some("current".to_string()));
        assert!(!subscription.has_changed());
    }

    #[tokio::test]
    async fn test_subscriber_receives_subsequent_writes() {
        let cache = SingleValueCache::new(0u32);
        let mut subscription = cache.subscribe();
        assert_eq!(subscription.next().await, Some(0));

        cache.write(1);
        assert_eq!(subscription.next().await, Some(1));

        cache.write(2);
        assert_eq!(subscription.next().await, Some(2));
    }

    #[tokio::test]
    async fn test_slow_subscriber_sees_only_latest() {
        let cache = SingleValueCache::new(0u32);
        let mut subscription = cache.subscribe();

        for value in 1..=100 {
            cache.write(value);
        }

        assert_eq!(subscription.next().await, Some(100));
        assert!(!subscription.has_changed());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_are_independent() {
        let cache = SingleValueCache::new(0u32);
        let mut fast = cache.subscribe();
        let mut slow = cache.subscribe();

        assert_eq!(fast.next().await, Some(0));
        cache.write(1);
        assert_eq!(fast.next().await, Some(1));
        cache.write(2);
        assert_eq!(fast.next().await, Some(2));

        // The slow subscriber never drained, so it jumps straight to the newest value.
        assert_eq!(slow.next().await, Some(2));
        assert_eq!(slow.latest(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_sees_values_in_write_order() {
        let cache = Arc::new(SingleValueCache::new(0u32));
        let mut subscription = cache.subscribe();

        let writer = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                for value in 1..=500 {
                    cache.write(value);
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut last = 0;
        while last < 500 {
            let value = subscription.next().await.unwrap();
            assert!(value >= last, "went backwards: {} after {}", value, last);
            last = value;
        }

        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_pruned() {
        let cache = SingleValueCache::new(0u32);
        let keep = cache.subscribe();
        let dropped = cache.subscribe();
        assert_eq!(cache.subscriber_count(), 2);

        drop(dropped);
        cache.write(1);

        assert_eq!(cache.subscriber_count(), 1);
        assert_eq!(keep.latest(), 1);
    }

    #[test]
    fn test_resubscribing_without_writes_does_not_grow_registry() {
        let cache = SingleValueCache::new(UserProfile::empty());
        for _ in 0..10_000 {
            let subscription = cache.subscribe();
            drop(subscription);
        }

        assert!(cache.subscriber_count() <= 1);

        let live = cache.subscribe();
        assert_eq!(cache.subscriber_count(), 1);
        drop(live);
    }

    #[test]
    fn test_writes_report_their_version() {
        let cache = SingleValueCache::new(UserProfile::empty());

        assert_eq!(cache.write(UserProfile::empty()), 1);
        let (profile, version) = cache.update_versioned(&ProfilePatch::username("alice"));

        assert_eq!(profile.username, "alice");
        assert_eq!(version, 2);
        assert_eq!(cache.version(), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_when_cache_dropped() {
        let cache = SingleValueCache::new(0u32);
        let stream = cache.subscribe().into_stream();
        cache.write(7);
        drop(cache);

        let values: Vec<u32> = stream.collect().await;
        assert_eq!(values, vec![7]);
    }
}
