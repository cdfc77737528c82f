//! Service layer for feedstate
//!
//! This module provides the entry point a client application constructs once
//! at startup and hands to its UI-facing state owners.
//!
//! # Architecture
//!
//! `StateService` owns the process-wide resources and builds the pieces that
//! use them:
//!
//! - the profile cache, shared by every `ProfileService` it creates
//! - the `EventBus`, wired into every controller and service it creates
//! - the `Config`, which decides page sizes per list
//!
//! There is no ambient global. Whoever owns the `StateService` decides its
//! lifetime and passes it (or the `Arc`s it hands out) by reference.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libfeedstate::service::StateService;
//! use libfeedstate::source::mock::{MockEntitySource, MockPageSource};
//! use libfeedstate::{Config, UserProfile};
//!
//! # async fn example() -> libfeedstate::Result<()> {
//! let service = StateService::from_config(Config::default())?;
//!
//! let users = Arc::new(MockEntitySource::<UserProfile>::new());
//! let profile = service.profile(users);
//! profile.refresh("u1").await;
//!
//! let posts = Arc::new(MockPageSource::from_items("posts", vec![1, 2, 3]));
//! let feed = service.pager("home-feed", posts)?;
//! feed.load_next_page().await;
//!
//! let mut events = service.subscribe();
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod profile;

use std::sync::Arc;

use tracing::debug;

use self::events::{EventBus, EventReceiver};
use self::profile::ProfileService;
use crate::cache::SingleValueCache;
use crate::pagination::PaginationController;
use crate::source::{EntitySource, PageSource};
use crate::types::UserProfile;
use crate::{Config, Result};

/// Main service facade that owns the shared state
pub struct StateService {
    config: Arc<Config>,
    profile_cache: Arc<SingleValueCache<UserProfile>>,
    event_bus: EventBus,
}

impl StateService {
    /// Create a service with configuration from the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read,
    /// parsed, or validated.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    /// Create a service with a pre-built configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.events.capacity);
        debug!(
            default_page_size = config.pagination.default_page_size,
            event_capacity = config.events.capacity,
            "state service initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            profile_cache: Arc::new(SingleValueCache::new(UserProfile::empty())),
            event_bus,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The process-wide profile cache
    pub fn profile_cache(&self) -> Arc<SingleValueCache<UserProfile>> {
        Arc::clone(&self.profile_cache)
    }

    /// Build a profile service over the shared cache
    pub fn profile<R>(&self, source: Arc<R>) -> ProfileService<R>
    where
        R: EntitySource<Entity = UserProfile>,
    {
        ProfileService::new(self.profile_cache(), source, self.event_bus.clone())
    }

    /// Build a pagination controller for `list` using its configured page size
    ///
    /// # Errors
    ///
    /// Returns an error if the configured page size is zero, which
    /// `Config::validate` already rules out.
    pub fn pager<S>(&self, list: &str, source: Arc<S>) -> Result<PaginationController<S>>
    where
        S: PageSource,
    {
        let page_size = self.config.pagination.page_size_for(list);
        Ok(PaginationController::new(source, page_size)?
            .with_label(list)
            .with_events(self.event_bus.clone()))
    }

    /// Subscribe to state events
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }
}
