//! Repository contracts consumed by the state layer
//!
//! The state layer never talks to a backend directly. Whatever sits behind
//! these traits (a REST client, a hosted database SDK, an in-memory fixture)
//! is responsible for transport, authentication, and for translating its own
//! errors into an [`ErrorInfo`](crate::error::ErrorInfo) before returning.
//!
//! # Examples
//!
//! ```no_run
//! use libfeedstate::source::{PageSource, mock::MockPageSource};
//!
//! # async fn example() -> libfeedstate::Result<()> {
//! let source = MockPageSource::from_items("posts", vec!["a", "b", "c"]);
//!
//! let first = source.fetch_page(None, 2).await?;
//! assert_eq!(first.items, vec!["a", "b"]);
//!
//! let rest = source.fetch_page(first.next_cursor, 2).await?;
//! assert_eq!(rest.items, vec!["c"]);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::{Cursor, Page};

// Mock sources are built for every profile so integration tests in other crates can use them
pub mod mock;

/// Ordered, cursor-addressable list data (posts, search hits, follow lists)
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Element type of the list
    type Item: Clone + Send + Sync + 'static;

    /// Fetch up to `limit` items that come after `cursor`
    ///
    /// `None` requests the first page. Returning fewer than `limit` items
    /// (including none) signals that the list is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an `ErrorInfo` describing why the page could not be fetched.
    /// Timeouts are the implementation's concern; the caller applies none.
    async fn fetch_page(&self, cursor: Option<Cursor>, limit: usize)
        -> FetchResult<Page<Self::Item>>;

    /// Derive a resume cursor from an item
    ///
    /// Used when a page carries no backend token. The default derives
    /// nothing, so sources without tokens must override it.
    fn cursor_for(&self, _item: &Self::Item) -> Option<Cursor> {
        None
    }

    /// Short identifier used in logs and events
    fn name(&self) -> &str {
        "page-source"
    }
}

/// Single entities addressed by id (user profiles)
#[async_trait]
pub trait EntitySource: Send + Sync {
    type Entity: Clone + Send + Sync + 'static;

    /// Fetch the entity with the given id
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::NotFound` when no such entity exists and another
    /// kind for transport or permission failures.
    async fn fetch_entity(&self, id: &str) -> FetchResult<Self::Entity>;
}
