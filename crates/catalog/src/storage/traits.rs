//! Storage trait definitions

use chrono::{DateTime, Utc};

use crate::models::{Item, ItemId, ListIdentity};

/// Errors raised by a list store
///
/// Every write method is all-or-nothing: when one of these is returned,
/// the cached rows for the identity are exactly what they were before the call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to migrate cache schema: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("item {item} already cached for list {identity}")]
    Conflict { identity: ListIdentity, item: ItemId },

    #[error("failed to encode or decode cached payload: {0}")]
    Codec(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Trait for the local list cache
///
/// Rows are scoped by [`ListIdentity`] and kept in fetch order. Writers for
/// the same identity never interleave; identities are independent of each other.
pub trait ListStore: Send + Sync {
    /// Atomically replace every cached row for `identity` with `items`
    ///
    /// Also records the refresh time returned by [`ListStore::last_refreshed_at`].
    fn replace_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError>;

    /// Atomically add `items` after the last cached row
    fn append_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError>;

    /// Atomically add `items` before the first cached row, keeping their order
    fn prepend_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError>;

    /// Read up to `limit` rows starting at `offset`, in fetch order
    fn read_page(
        &self,
        identity: &ListIdentity,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError>;

    /// Count cached rows for `identity`
    fn count(&self, identity: &ListIdentity) -> Result<usize, StoreError>;

    /// When `identity` was last replaced by a refresh
    fn last_refreshed_at(&self, identity: &ListIdentity)
    -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Drop every cached row for `identity` (explicit eviction, e.g. logout)
    fn evict(&self, identity: &ListIdentity) -> Result<(), StoreError>;

    /// Drop every cached row for every identity
    fn evict_all(&self) -> Result<(), StoreError>;

    /// First cached row for `identity`
    fn first_item(&self, identity: &ListIdentity) -> Result<Option<Item>, StoreError> {
        Ok(self.read_page(identity, 0, 1)?.into_iter().next())
    }

    /// Last cached row for `identity`
    fn last_item(&self, identity: &ListIdentity) -> Result<Option<Item>, StoreError> {
        let count = self.count(identity)?;
        if count == 0 {
            return Ok(None);
        }
        Ok(self.read_page(identity, count - 1, 1)?.into_iter().next())
    }

    /// Every cached row for `identity`, in fetch order
    fn read_all(&self, identity: &ListIdentity) -> Result<Vec<Item>, StoreError> {
        let count = self.count(identity)?;
        self.read_page(identity, 0, count)
    }
}

/// Reject a batch that repeats an identifier, either within itself or against `existing`
pub(crate) fn check_unique(
    identity: &ListIdentity,
    items: &[Item],
    existing: impl Fn(&ItemId) -> bool,
) -> Result<(), StoreError> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(&item.id) || existing(&item.id) {
            return Err(StoreError::Conflict {
                identity: identity.clone(),
                item: item.id.clone(),
            });
        }
    }
    Ok(())
}
