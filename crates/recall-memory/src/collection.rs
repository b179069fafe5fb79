//! Collection schema and lifecycle states.

use std::fmt;

/// Lifecycle of a collection as observed by this process.
///
/// States are totally ordered; a transition never moves backwards except through
/// [`VectorStore::close`](crate::VectorStore::close).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionState {
    Uninitialized,
    Created,
    IndexAttached,
    Loaded,
}

impl CollectionState {
    /// Move forward to `next`, or stay put if already at or past it.
    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        self.max(next)
    }

    #[must_use]
    pub fn is_queryable(self) -> bool {
        self == Self::Loaded
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Created => "created",
            Self::IndexAttached => "index_attached",
            Self::Loaded => "loaded",
        }
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed shape of a memory collection.
///
/// Fields: `id` (string primary key, at most `max_id_chars`), `text` (at most
/// `max_text_chars`), `embedding` (`dimension` x f32, exact L2 index), and
/// `created_at` / `updated_at` (i64 seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: u64,
    pub max_id_chars: usize,
    pub max_text_chars: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let s = CollectionState::Uninitialized.advance(CollectionState::Created);
        assert_eq!(s, CollectionState::Created);
        let s = CollectionState::Loaded.advance(CollectionState::IndexAttached);
        assert_eq!(s, CollectionState::Loaded);
    }

    #[test]
    fn only_loaded_is_queryable() {
        assert!(CollectionState::Loaded.is_queryable());
        assert!(!CollectionState::IndexAttached.is_queryable());
        assert!(!CollectionState::Created.is_queryable());
        assert!(!CollectionState::Uninitialized.is_queryable());
    }

    #[test]
    fn display_names() {
        assert_eq!(CollectionState::IndexAttached.to_string(), "index_attached");
    }
}
