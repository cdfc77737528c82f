//! Profile service for the signed-in user
//!
//! Owns the flow between an [`EntitySource`] and the process-wide profile
//! cache: fetch, wrap the outcome as an `AsyncResult`, write the cache.
//! Local edits go through the cache's atomic merge.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::cache::{SingleValueCache, Subscription};
use crate::result::AsyncResult;
use crate::service::events::{EventBus, StateEvent};
use crate::source::EntitySource;
use crate::types::{ProfilePatch, UserProfile};

/// Ordering state for refreshes, edits and sign-outs
#[derive(Debug, Default)]
struct Tickets {
    /// Bumped on sign-out
    session: u64,
    /// Bumped by every refresh and local edit; a fetch issued before it is stale
    latest: u64,
    /// Ticket of the newest refresh, the only one allowed to settle `status`
    status_owner: u64,
}

/// Profile service
///
/// Every `ProfileService` built from the same `StateService` shares one
/// profile cache, so all observers see the same user.
pub struct ProfileService<R> {
    cache: Arc<SingleValueCache<UserProfile>>,
    status: SingleValueCache<AsyncResult<UserProfile>>,
    source: Arc<R>,
    events: EventBus,
    tickets: Mutex<Tickets>,
}

impl<R> ProfileService<R>
where
    R: EntitySource<Entity = UserProfile>,
{
    /// Create a profile service over a shared cache
    pub fn new(cache: Arc<SingleValueCache<UserProfile>>, source: Arc<R>, events: EventBus) -> Self {
        Self {
            cache,
            status: SingleValueCache::new(AsyncResult::empty()),
            source,
            events,
            tickets: Mutex::new(Tickets::default()),
        }
    }

    /// Fetch the profile for `user_id` and write it into the cache
    ///
    /// On failure the cache keeps its previous value. A fetch that completes
    /// after a sign-out, a newer refresh, or a local edit is not cached: it
    /// returns `Ready(None)`, or the settled status if this was the newest
    /// refresh and only local edits overtook it.
    pub async fn refresh(&self, user_id: &str) -> AsyncResult<UserProfile> {
        let (session, ticket) = {
            let mut tickets = self.tickets();
            tickets.latest += 1;
            tickets.status_owner = tickets.latest;
            self.status.write(AsyncResult::Pending);
            (tickets.session, tickets.latest)
        };
        debug!(user_id, ticket, "refreshing profile");

        let result = self.source.fetch_entity(user_id).await;

        let tickets = self.tickets();
        if tickets.session != session {
            // sign_out already settled the status
            warn!(user_id, "discarding profile fetched before sign-out");
            return AsyncResult::empty();
        }

        if tickets.latest != ticket {
            debug!(
                user_id,
                ticket,
                latest = tickets.latest,
                "discarding profile overtaken by a newer change"
            );
            if tickets.status_owner != ticket {
                return AsyncResult::empty();
            }
            let settled = match result {
                Ok(_) => AsyncResult::ready(self.cache.read()),
                Err(error) => AsyncResult::Failed(error),
            };
            self.status.write(settled.clone());
            return settled;
        }

        let outcome = match result {
            Ok(profile) => {
                let version = self.cache.write(profile.clone());
                self.announce(&profile.id, version);
                AsyncResult::ready(profile)
            }
            Err(error) => {
                warn!(user_id, error = %error, "profile refresh failed");
                AsyncResult::Failed(error)
            }
        };
        self.status.write(outcome.clone());
        outcome
    }

    /// Merge a local edit into the cached profile
    ///
    /// Use after the backend accepted the change. Returns the new profile.
    /// A refresh still in flight will not overwrite the edit.
    pub fn apply(&self, patch: &ProfilePatch) -> UserProfile {
        let mut tickets = self.tickets();
        tickets.latest += 1;
        let (profile, version) = self.cache.update_versioned(patch);
        debug!(user_id = %profile.id, version, "profile patch applied");
        self.announce(&profile.id, version);
        profile
    }

    /// Return the cache to the empty sentinel
    pub fn sign_out(&self) {
        let mut tickets = self.tickets();
        tickets.session += 1;
        let version = self.cache.write(UserProfile::empty());
        self.status.write(AsyncResult::empty());
        info!("profile cleared on sign-out");
        self.announce("", version);
    }

    /// The cached profile (the sentinel before the first refresh)
    pub fn current(&self) -> UserProfile {
        self.cache.read()
    }

    pub fn is_signed_in(&self) -> bool {
        !self.cache.read().is_empty()
    }

    /// Follow profile changes; yields the current profile first
    pub fn subscribe(&self) -> Subscription<UserProfile> {
        self.cache.subscribe()
    }

    /// Outcome of the most recent refresh
    pub fn status(&self) -> AsyncResult<UserProfile> {
        self.status.read()
    }

    /// Follow refresh outcomes
    pub fn subscribe_status(&self) -> Subscription<AsyncResult<UserProfile>> {
        self.status.subscribe()
    }

    fn announce(&self, user_id: &str, version: u64) {
        self.events.emit(StateEvent::ProfileChanged {
            user_id: user_id.to_string(),
            version,
        });
    }

    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorInfo, ErrorKind, FetchResult};
    use crate::source::mock::MockEntitySource;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Answers each fetch with the next scripted (delay, profile) pair
    struct StaggeredSource {
        responses: Mutex<VecDeque<(Duration, UserProfile)>>,
    }

    impl StaggeredSource {
        fn new(responses: Vec<(Duration, UserProfile)>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }

        fn remaining(&self) -> usize {
            self.responses.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl EntitySource for StaggeredSource {
        type Entity = UserProfile;

        async fn fetch_entity(&self, id: &str) -> FetchResult<UserProfile> {
            let next = self.responses.lock().unwrap().pop_front();
            let (delay, profile) =
                next.ok_or_else(|| ErrorInfo::not_found(format!("no response for {}", id)))?;
            tokio::time::sleep(delay).await;
            Ok(profile)
        }
    }

    fn alice_as(username: &str) -> UserProfile {
        UserProfile {
            username: username.to_string(),
            ..alice()
        }
    }

    fn alice() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            username: "alice".to_string(),
            display_name: "Alice".to_string(),
            ..UserProfile::empty()
        }
    }

    fn setup() -> (ProfileService<MockEntitySource<UserProfile>>, Arc<MockEntitySource<UserProfile>>) {
        let source = Arc::new(MockEntitySource::new());
        source.insert("u1", alice());
        let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));
        let service = ProfileService::new(cache, Arc::clone(&source), EventBus::new(16));
        (service, source)
    }

    #[tokio::test]
    async fn test_refresh_writes_cache() {
        let (service, source) = setup();
        assert!(!service.is_signed_in());

        let outcome = service.refresh("u1").await;

        assert_eq!(outcome, AsyncResult::ready(alice()));
        assert_eq!(service.current(), alice());
        assert!(service.is_signed_in());
        assert_eq!(service.status(), AsyncResult::ready(alice()));
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_profile() {
        let (service, source) = setup();
        service.refresh("u1").await;

        source.fail_next(ErrorInfo::network("offline"));
        let outcome = service.refresh("u1").await;

        assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Network));
        assert_eq!(service.current(), alice());
        assert!(service.status().is_failed());
    }

    #[tokio::test]
    async fn test_refresh_unknown_user_is_not_found() {
        let (service, _source) = setup();

        let outcome = service.refresh("ghost").await;

        assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::NotFound));
        assert!(service.current().is_empty());
    }

    #[tokio::test]
    async fn test_apply_merges_into_cached_profile() {
        let (service, _source) = setup();
        service.refresh("u1").await;

        let updated = service.apply(&ProfilePatch::bio("rustacean"));

        assert_eq!(updated.bio, "rustacean");
        assert_eq!(updated.username, "alice");
        assert_eq!(service.current(), updated);
    }

    #[tokio::test]
    async fn test_sign_out_restores_sentinel() {
        let (service, _source) = setup();
        let mut updates = service.subscribe();
        service.refresh("u1").await;
        assert_eq!(updates.next().await, Some(alice()));

        service.sign_out();

        assert_eq!(updates.next().await, Some(UserProfile::empty()));
        assert!(!service.is_signed_in());
        assert_eq!(service.status(), AsyncResult::empty());
    }

    #[tokio::test]
    async fn test_refresh_started_before_sign_out_is_dropped() {
        let source = Arc::new(MockEntitySource::new().with_delay(Duration::from_millis(30)));
        source.insert("u1", alice());
        let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));
        let service = Arc::new(ProfileService::new(cache, source, EventBus::new(16)));

        let refresh = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.refresh("u1").await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        service.sign_out();

        assert_eq!(refresh.await.unwrap(), AsyncResult::empty());
        assert!(service.current().is_empty());
    }

    #[tokio::test]
    async fn test_profile_changes_are_announced() {
        let source = Arc::new(MockEntitySource::new());
        source.insert("u1", alice());
        let events = EventBus::new(16);
        let mut receiver = events.subscribe();
        let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));
        let service = ProfileService::new(cache, source, events);

        service.refresh("u1").await;
        service.sign_out();

        assert_eq!(
            receiver.recv().await.unwrap(),
            StateEvent::ProfileChanged {
                user_id: "u1".to_string(),
                version: 1
            }
        );
        assert_eq!(
            receiver.recv().await.unwrap(),
            StateEvent::ProfileChanged {
                user_id: String::new(),
                version: 2
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sign_out_racing_refresh_always_settles_status() {
        for _ in 0..2_000 {
            let (service, _source) = setup();
            let service = Arc::new(service);

            let refresh = {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.refresh("u1").await })
            };
            let sign_out = {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.sign_out() })
            };

            sign_out.await.unwrap();
            let outcome = refresh.await.unwrap();

            assert!(!service.status().is_pending());
            if outcome == AsyncResult::empty() {
                assert_eq!(service.status(), AsyncResult::empty());
            }
        }
    }

    #[tokio::test]
    async fn test_older_refresh_finishing_last_is_dropped() {
        let source = Arc::new(StaggeredSource::new(vec![
            (Duration::from_millis(60), alice_as("stale")),
            (Duration::ZERO, alice_as("fresh")),
        ]));
        let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));
        let service = Arc::new(ProfileService::new(cache, Arc::clone(&source), EventBus::new(16)));

        let older = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.refresh("u1").await })
        };
        while source.remaining() == 2 {
            tokio::task::yield_now().await;
        }

        let newer = service.refresh("u1").await;

        assert_eq!(newer, AsyncResult::ready(alice_as("fresh")));
        assert_eq!(older.await.unwrap(), AsyncResult::empty());
        assert_eq!(service.current().username, "fresh");
        assert_eq!(service.status(), AsyncResult::ready(alice_as("fresh")));
    }

    #[tokio::test]
    async fn test_edit_during_refresh_is_not_overwritten() {
        let source = Arc::new(MockEntitySource::new().with_delay(Duration::from_millis(30)));
        source.insert("u1", alice());
        let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));
        let service = Arc::new(ProfileService::new(cache, Arc::clone(&source), EventBus::new(16)));
        service.refresh("u1").await;

        let refresh = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.refresh("u1").await })
        };
        while source.call_count() < 2 {
            tokio::task::yield_now().await;
        }
        let edited = service.apply(&ProfilePatch::bio("edited while loading"));

        assert_eq!(refresh.await.unwrap(), AsyncResult::ready(edited.clone()));
        assert_eq!(service.current(), edited);
        assert_eq!(service.current().username, "alice");
        assert_eq!(service.status(), AsyncResult::ready(edited));
    }

    #[test]
    fn test_announced_versions_match_each_write() {
        let source = Arc::new(MockEntitySource::new());
        let events = EventBus::new(512);
        let mut receiver = events.subscribe();
        let cache = Arc::new(SingleValueCache::new(UserProfile::empty()));
        let service = ProfileService::new(cache, source, events);

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let service = &service;
                scope.spawn(move || {
                    for edit in 0..50 {
                        service.apply(&ProfilePatch::bio(format!("{}-{}", writer, edit)));
                    }
                });
            }
        });

        let mut versions = Vec::new();
        while let Ok(StateEvent::ProfileChanged { version, .. }) = receiver.try_recv() {
            versions.push(version);
        }
        assert_eq!(versions, (1..=200).collect::<Vec<u64>>());
    }
}
