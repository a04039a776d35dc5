//! In-memory list store
//!
//! Used by tests and for lists that do not need to survive a restart.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::traits::{ListStore, StoreError, check_unique};
use crate::models::{Item, ItemId, ListIdentity};

/// Cached rows of one list
#[derive(Default)]
struct ListRows {
    items: Vec<Item>,
    ids: HashSet<ItemId>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// In-memory implementation of [`ListStore`]
///
/// A single `RwLock` guards all lists; each write validates the whole batch
/// before touching the rows, so a rejected batch leaves nothing behind.
pub struct InMemoryListStore {
    lists: RwLock<HashMap<ListIdentity, ListRows>>,
}

impl InMemoryListStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryListStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListStore for InMemoryListStore {
    fn replace_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        check_unique(identity, items, |_| false)?;

        let rows = ListRows {
            items: items.to_vec(),
            ids: items.iter().map(|item| item.id.clone()).collect(),
            refreshed_at: Some(Utc::now()),
        };

        let mut lists = self.lists.write().map_err(|_| StoreError::Poisoned)?;
        lists.insert(identity.clone(), rows);
        Ok(())
    }

    fn append_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        let mut lists = self.lists.write().map_err(|_| StoreError::Poisoned)?;
        let rows = lists.entry(identity.clone()).or_default();
        check_unique(identity, items, |id| rows.ids.contains(id))?;

        rows.ids.extend(items.iter().map(|item| item.id.clone()));
        rows.items.extend_from_slice(items);
        Ok(())
    }

    fn prepend_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        let mut lists = self.lists.write().map_err(|_| StoreError::Poisoned)?;
        let rows = lists.entry(identity.clone()).or_default();
        check_unique(identity, items, |id| rows.ids.contains(id))?;

        rows.ids.extend(items.iter().map(|item| item.id.clone()));
        rows.items.splice(0..0, items.iter().cloned());
        Ok(())
    }

    fn read_page(
        &self,
        identity: &ListIdentity,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        let lists = self.lists.read().map_err(|_| StoreError::Poisoned)?;
        let Some(rows) = lists.get(identity) else {
            return Ok(Vec::new());
        };
        Ok(rows.items.iter().skip(offset).take(limit).cloned().collect())
    }

    fn count(&self, identity: &ListIdentity) -> Result<usize, StoreError> {
        let lists = self.lists.read().map_err(|_| StoreError::Poisoned)?;
        Ok(lists.get(identity).map_or(0, |rows| rows.items.len()))
    }

    fn last_refreshed_at(
        &self,
        identity: &ListIdentity,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let lists = self.lists.read().map_err(|_| StoreError::Poisoned)?;
        Ok(lists.get(identity).and_then(|rows| rows.refreshed_at))
    }

    fn evict(&self, identity: &ListIdentity) -> Result<(), StoreError> {
        let mut lists = self.lists.write().map_err(|_| StoreError::Poisoned)?;
        lists.remove(identity);
        Ok(())
    }

    fn evict_all(&self) -> Result<(), StoreError> {
        let mut lists = self.lists.write().map_err(|_| StoreError::Poisoned)?;
        lists.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str) -> Item {
        Item::new(id, json!({ "id": id }))
    }

    fn ids(store: &InMemoryListStore, identity: &ListIdentity) -> Vec<String> {
        store
            .read_all(identity)
            .unwrap()
            .into_iter()
            .map(|item| item.id.0)
            .collect()
    }

    #[test]
    fn test_replace_then_append() {
        let store = InMemoryListStore::new();
        let reco = ListIdentity::new("reco");

        store.replace_all(&reco, &[item("a"), item("b")]).unwrap();
        store.append_all(&reco, &[item("c")]).unwrap();

        assert_eq!(ids(&store, &reco), vec!["a", "b", "c"]);
        assert!(store.last_refreshed_at(&reco).unwrap().is_some());
    }

    #[test]
    fn test_prepend_keeps_batch_order() {
        let store = InMemoryListStore::new();
        let reco = ListIdentity::new("reco");

        store.replace_all(&reco, &[item("c")]).unwrap();
        store.prepend_all(&reco, &[item("a"), item("b")]).unwrap();

        assert_eq!(ids(&store, &reco), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_append_conflict_leaves_rows_untouched() {
        let store = InMemoryListStore::new();
        let reco = ListIdentity::new("reco");
        store.replace_all(&reco, &[item("a"), item("b")]).unwrap();

        let err = store.append_all(&reco, &[item("c"), item("a")]).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(ids(&store, &reco), vec!["a", "b"]);
    }

    #[test]
    fn test_identities_are_isolated() {
        let store = InMemoryListStore::new();
        let reco = ListIdentity::new("reco");
        let playlist = ListIdentity::new("playlist:42");

        store.replace_all(&reco, &[item("a")]).unwrap();
        store.replace_all(&playlist, &[item("a"), item("z")]).unwrap();
        store.evict(&reco).unwrap();

        assert_eq!(store.count(&reco).unwrap(), 0);
        assert_eq!(ids(&store, &playlist), vec!["a", "z"]);
    }

    #[test]
    fn test_first_and_last_item() {
        let store = InMemoryListStore::new();
        let reco = ListIdentity::new("reco");
        assert!(store.last_item(&reco).unwrap().is_none());

        store.replace_all(&reco, &[item("a"), item("b"), item("c")]).unwrap();
        assert_eq!(store.first_item(&reco).unwrap().unwrap().id.as_str(), "a");
        assert_eq!(store.last_item(&reco).unwrap().unwrap().id.as_str(), "c");
    }
}
