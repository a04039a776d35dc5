//! Lazy, restartable view over a cached list

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::{Item, ListIdentity};
use crate::storage::{ListStore, StoreError};

/// Iterator over the cached items of one list, read from the store a page at a time
///
/// Nothing is read until the iterator is advanced, and new rows appended
/// while iterating are picked up by later pages. After a refresh or eviction
/// of the list, [`PagedItems::is_stale`] turns true and the consumer should
/// [`PagedItems::restart`].
pub struct PagedItems {
    store: Arc<dyn ListStore>,
    identity: ListIdentity,
    page_size: usize,
    generation: Arc<AtomicU64>,
    seen_generation: u64,
    offset: usize,
    buffer: VecDeque<Item>,
    failed: bool,
}

impl PagedItems {
    pub(crate) fn new(
        store: Arc<dyn ListStore>,
        identity: ListIdentity,
        page_size: usize,
        generation: Arc<AtomicU64>,
    ) -> Self {
        let seen_generation = generation.load(Ordering::SeqCst);
        Self {
            store,
            identity,
            page_size: page_size.max(1),
            generation,
            seen_generation,
            offset: 0,
            buffer: VecDeque::new(),
            failed: false,
        }
    }

    pub fn identity(&self) -> &ListIdentity {
        &self.identity
    }

    /// Whether the list was refreshed or evicted since this view started
    pub fn is_stale(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.seen_generation
    }

    /// Rewind to the start of the current cached sequence
    pub fn restart(&mut self) {
        self.seen_generation = self.generation.load(Ordering::SeqCst);
        self.offset = 0;
        self.buffer.clear();
        self.failed = false;
    }

    /// Number of items handed out since the last (re)start
    pub fn position(&self) -> usize {
        self.offset - self.buffer.len()
    }

    fn fill(&mut self) -> Result<(), StoreError> {
        let page = self
            .store
            .read_page(&self.identity, self.offset, self.page_size)?;
        self.offset += page.len();
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for PagedItems {
    type Item = Result<Item, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.buffer.is_empty()
            && let Err(e) = self.fill()
        {
            self.failed = true;
            return Some(Err(e));
        }
        self.buffer.pop_front().map(Ok)
    }
}
