//! Paging state passed between the page store and the sync mediator

use serde::{Deserialize, Serialize};

use super::{ItemId, ListIdentity};
use crate::storage::{ListStore, StoreError};

/// Direction and destructiveness of a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadDirective {
    /// Discard the cached list and refetch from the start
    Refresh,
    /// Extend the loaded window before the first item
    Prepend,
    /// Extend the loaded window after the last item
    Append,
}

impl LoadDirective {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadDirective::Refresh => "refresh",
            LoadDirective::Prepend => "prepend",
            LoadDirective::Append => "append",
        }
    }
}

/// Position marker sent to the remote source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// First page
    Start,
    /// Page following the given item
    After(ItemId),
    /// Page preceding the given item
    Before(ItemId),
}

/// What the caller currently knows about the loaded window of a list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    /// First loaded item (prepend anchor)
    pub first: Option<ItemId>,
    /// Last loaded item (append anchor)
    pub last: Option<ItemId>,
    /// Number of loaded items
    pub loaded: usize,
    /// Whether a prior load in the requested direction already reached the end
    ///
    /// When set, the mediator answers Append and Prepend with
    /// `Success { end_reached: true }` without fetching. Refresh ignores it.
    pub end_reached: bool,
}

impl PageState {
    /// State for a list with nothing loaded yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derive the state from what is currently cached for `identity`
    pub fn from_store(
        store: &dyn ListStore,
        identity: &ListIdentity,
        end_reached: bool,
    ) -> Result<Self, StoreError> {
        let loaded = store.count(identity)?;
        if loaded == 0 {
            return Ok(Self {
                end_reached,
                ..Self::default()
            });
        }
        Ok(Self {
            first: store.first_item(identity)?.map(|item| item.id),
            last: store.last_item(identity)?.map(|item| item.id),
            loaded,
            end_reached,
        })
    }

    /// Resolve the remote cursor for a directive
    ///
    /// Returns `None` when an append/prepend has no anchor item to page from.
    pub fn cursor_for(&self, directive: LoadDirective) -> Option<Cursor> {
        match directive {
            LoadDirective::Refresh => Some(Cursor::Start),
            LoadDirective::Append => self.last.clone().map(Cursor::After),
            LoadDirective::Prepend => self.first.clone().map(Cursor::Before),
        }
    }
}
