//! feedstate - reactive client-side state for feed-style applications
//!
//! This library provides the state layer that sits between a client's UI and
//! its backend: a tri-state `AsyncResult`, an observable single-value cache
//! for the signed-in user's profile, and a cursor-based pagination controller
//! for feeds, search results, and follow lists.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod pagination;
pub mod result;
pub mod service;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use cache::{Merge, SingleValueCache, Subscription};
pub use config::Config;
pub use error::{ErrorInfo, ErrorKind, FeedStateError, FetchResult, Result};
pub use pagination::{LoadOutcome, PagePhase, PaginationController};
pub use result::AsyncResult;
pub use service::StateService;
pub use types::{Cursor, Page, ProfilePatch, UserProfile};
