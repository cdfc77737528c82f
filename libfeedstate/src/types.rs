//! Core types for feedstate

use serde::{Deserialize, Serialize};

use crate::cache::Merge;

/// Profile of the signed-in user
///
/// `UserProfile::empty()` is the sentinel the profile cache starts from
/// before the first fetch lands and returns to on sign-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub profession: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
}

impl UserProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True while the cache still holds the sentinel
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Partial profile edit; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profession: Option<String>,
    pub bio: Option<String>,
    /// `Some(None)` clears the avatar
    pub avatar_url: Option<Option<String>>,
    pub follower_count: Option<u64>,
    pub following_count: Option<u64>,
    pub post_count: Option<u64>,
}

impl ProfilePatch {
    pub fn username(value: impl Into<String>) -> Self {
        Self {
            username: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn display_name(value: impl Into<String>) -> Self {
        Self {
            display_name: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn profession(value: impl Into<String>) -> Self {
        Self {
            profession: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn bio(value: impl Into<String>) -> Self {
        Self {
            bio: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Merge<ProfilePatch> for UserProfile {
    fn merge(&self, patch: &ProfilePatch) -> Self {
        let mut next = self.clone();
        if let Some(username) = &patch.username {
            next.username = username.clone();
        }
        if let Some(display_name) = &patch.display_name {
            next.display_name = display_name.clone();
        }
        if let Some(profession) = &patch.profession {
            next.profession = profession.clone();
        }
        if let Some(bio) = &patch.bio {
            next.bio = bio.clone();
        }
        if let Some(avatar_url) = &patch.avatar_url {
            next.avatar_url = avatar_url.clone();
        }
        if let Some(count) = patch.follower_count {
            next.follower_count = count;
        }
        if let Some(count) = patch.following_count {
            next.following_count = count;
        }
        if let Some(count) = patch.post_count {
            next.post_count = count;
        }
        next
    }
}

/// Opaque resume marker for cursor pagination
///
/// The state layer never interprets the contents; it only hands the value
/// back to the repository that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// One page returned by a `PageSource`
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Backend-provided continuation token, if the backend issues one
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// A page without a backend token; the cursor is derived from the last item
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    pub fn with_cursor(items: Vec<T>, next_cursor: Cursor) -> Self {
        Self {
            items,
            next_cursor: Some(next_cursor),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
