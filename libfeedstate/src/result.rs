//! Tri-state outcome of an asynchronous operation
//!
//! Every operation in the state layer reports through `AsyncResult`: it
//! starts out `Pending` and settles into exactly one of `Ready` or `Failed`.
//! There is no cancelled variant; a cancelled operation simply never settles.
//!
//! `Ready` carries an `Option` because "succeeded with nothing to show" is a
//! legitimate outcome. Consumers must match on it rather than assume a
//! payload is present.
//!
//! # Example
//!
//! ```
//! use libfeedstate::{AsyncResult, ErrorInfo};
//!
//! let loaded: AsyncResult<Vec<u32>> = AsyncResult::ready(vec![1, 2, 3]);
//! let count = loaded.map(|items| items.len());
//! assert_eq!(count.value(), Some(&3));
//!
//! let failed: AsyncResult<Vec<u32>> = AsyncResult::Failed(ErrorInfo::network("offline"));
//! assert!(failed.map(|items| items.len()).is_failed());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ErrorInfo, FetchResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum AsyncResult<T> {
    /// Operation started, no outcome yet
    Pending,
    /// Operation succeeded; `None` means it succeeded without content
    Ready(Option<T>),
    /// Operation failed with a structured cause
    Failed(ErrorInfo),
}

impl<T> Default for AsyncResult<T> {
    fn default() -> Self {
        AsyncResult::Pending
    }
}

impl<T> AsyncResult<T> {
    /// Ready with a payload
    pub fn ready(value: T) -> Self {
        AsyncResult::Ready(Some(value))
    }

    /// Ready without a payload
    pub fn empty() -> Self {
        AsyncResult::Ready(None)
    }

    pub fn failed(error: ErrorInfo) -> Self {
        AsyncResult::Failed(error)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AsyncResult::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AsyncResult::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AsyncResult::Failed(_))
    }

    /// Settled means either `Ready` or `Failed`
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// The payload, if this is `Ready` with content
    pub fn value(&self) -> Option<&T> {
        match self {
            AsyncResult::Ready(value) => value.as_ref(),
            _ => None,
        }
    }

    /// Consume and return the payload, if this is `Ready` with content
    pub fn into_value(self) -> Option<T> {
        match self {
            AsyncResult::Ready(value) => value,
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            AsyncResult::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> AsyncResult<&T> {
        match self {
            AsyncResult::Pending => AsyncResult::Pending,
            AsyncResult::Ready(value) => AsyncResult::Ready(value.as_ref()),
            AsyncResult::Failed(error) => AsyncResult::Failed(error.clone()),
        }
    }

    /// Transform a present `Ready` payload
    ///
    /// `Pending`, `Failed`, and `Ready(None)` pass through and `f` is not
    /// called for them.
    pub fn map<U, F>(self, f: F) -> AsyncResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            AsyncResult::Pending => AsyncResult::Pending,
            AsyncResult::Ready(value) => AsyncResult::Ready(value.map(f)),
            AsyncResult::Failed(error) => AsyncResult::Failed(error),
        }
    }

    /// Wrap an optional value from a repository that may legitimately return nothing
    pub fn from_option(result: FetchResult<Option<T>>) -> Self {
        match result {
            Ok(value) => AsyncResult::Ready(value),
            Err(error) => AsyncResult::Failed(error),
        }
    }
}

impl<T> From<FetchResult<T>> for AsyncResult<T> {
    fn from(result: FetchResult<T>) -> Self {
        match result {
            Ok(value) => AsyncResult::Ready(Some(value)),
            Err(error) => AsyncResult::Failed(error),
        }
    }
}
