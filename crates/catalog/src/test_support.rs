//! Test doubles shared by the unit tests

use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::models::{Cursor, Item, ListIdentity};
use crate::remote::{FetchError, Page, Paging, RemoteSource, RequestMetadata};
use crate::storage::{InMemoryListStore, ListStore, StoreError};

type Hook = Box<dyn Fn() + Send + Sync>;

pub fn item(id: &str) -> Item {
    Item::new(id, json!({ "id": id, "album_title": format!("Album {}", id) }))
}

pub fn items(ids: &[&str]) -> Vec<Item> {
    ids.iter().map(|id| item(id)).collect()
}

pub fn page(ids: &[&str]) -> Page {
    Page::new(items(ids))
}

pub fn ids(store: &dyn ListStore, identity: &ListIdentity) -> Vec<String> {
    store
        .read_all(identity)
        .unwrap()
        .into_iter()
        .map(|item| item.id.0)
        .collect()
}

/// Remote source that replays queued responses and records every fetch
///
/// An exhausted queue answers with an empty page.
pub struct ScriptedRemote {
    responses: Mutex<VecDeque<Result<Page, FetchError>>>,
    calls: Mutex<Vec<(ListIdentity, Cursor)>>,
    paging: Paging,
    delay: Duration,
    on_fetch: Mutex<Option<Hook>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            paging: Paging::Cursor,
            delay: Duration::ZERO,
            on_fetch: Mutex::new(None),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn respond(self, response: Result<Page, FetchError>) -> Self {
        self.push(response);
        self
    }

    pub fn fixed(mut self) -> Self {
        self.paging = Paging::Fixed;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, response: Result<Page, FetchError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Run `hook` after each fetch, before its result is returned
    pub fn on_fetch(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_fetch.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn cursors(&self) -> Vec<Cursor> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cursor)| cursor.clone())
            .collect()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl RemoteSource for ScriptedRemote {
    fn fetch(
        &self,
        identity: &ListIdentity,
        cursor: &Cursor,
        _metadata: &RequestMetadata,
    ) -> Result<Page, FetchError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((identity.clone(), cursor.clone()));

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()));
        if let Some(hook) = self.on_fetch.lock().unwrap().as_ref() {
            hook();
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        response
    }

    fn paging(&self, _identity: &ListIdentity) -> Paging {
        self.paging
    }
}

/// In-memory store that runs a hook as each write begins
pub struct HookedStore {
    inner: InMemoryListStore,
    before_write: Hook,
}

impl HookedStore {
    pub fn new(before_write: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: InMemoryListStore::new(),
            before_write: Box::new(before_write),
        }
    }
}

impl ListStore for HookedStore {
    fn replace_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        (self.before_write)();
        self.inner.replace_all(identity, items)
    }

    fn append_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        (self.before_write)();
        self.inner.append_all(identity, items)
    }

    fn prepend_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        (self.before_write)();
        self.inner.prepend_all(identity, items)
    }

    fn read_page(
        &self,
        identity: &ListIdentity,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        self.inner.read_page(identity, offset, limit)
    }

    fn count(&self, identity: &ListIdentity) -> Result<usize, StoreError> {
        self.inner.count(identity)
    }

    fn last_refreshed_at(
        &self,
        identity: &ListIdentity,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.last_refreshed_at(identity)
    }

    fn evict(&self, identity: &ListIdentity) -> Result<(), StoreError> {
        self.inner.evict(identity)
    }

    fn evict_all(&self) -> Result<(), StoreError> {
        self.inner.evict_all()
    }
}
