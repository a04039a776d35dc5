//! Sync mediator: one load cycle per call, serialized per list

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{CancelToken, SyncOutcome};
use crate::connectivity::Connectivity;
use crate::models::{Cursor, ListIdentity, LoadDirective, PageState};
use crate::remote::{Page, Paging, RemoteSource, RequestMetadata};
use crate::storage::{ListStore, StoreError};

/// One lock per list identity
///
/// Held for a whole load cycle so that loads for the same list queue behind
/// each other while other lists proceed.
#[derive(Default)]
struct IdentityLocks {
    locks: Mutex<HashMap<ListIdentity, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    fn lock_for(&self, identity: &ListIdentity) -> Arc<Mutex<()>> {
        // The map only holds lock handles, so a poisoned guard is still consistent
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(identity.clone()).or_default().clone()
    }
}

/// Orchestrates fetch, connectivity check and cache write for list loads
///
/// Failures never escape: every error is wrapped into [`SyncOutcome::Failure`]
/// and leaves the cache untouched. No retries happen here.
pub struct SyncMediator {
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn ListStore>,
    connectivity: Arc<dyn Connectivity>,
    locks: IdentityLocks,
}

impl SyncMediator {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn ListStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            remote,
            store,
            connectivity,
            locks: IdentityLocks::default(),
        }
    }

    /// The store this mediator writes into
    pub fn store(&self) -> &Arc<dyn ListStore> {
        &self.store
    }

    /// Drop the cached rows of `identity`, waiting for any load in flight
    pub fn evict(&self, identity: &ListIdentity) -> Result<(), StoreError> {
        let lock = self.locks.lock_for(identity);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.evict(identity)
    }

    /// Run one load cycle for `identity`
    ///
    /// Blocks while another load for the same identity is running.
    pub fn load(
        &self,
        identity: &ListIdentity,
        directive: LoadDirective,
        state: &PageState,
        metadata: &RequestMetadata,
    ) -> SyncOutcome {
        let lock = self.locks.lock_for(identity);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Without a cancel token every cycle delivers an outcome
        self.run(identity, directive, state, metadata, None)
            .unwrap_or(SyncOutcome::Success { end_reached: true })
    }

    /// Run one load cycle that `cancel` may abort
    ///
    /// Returns `None` when the outcome is suppressed by cancellation. A cycle
    /// cancelled before its write leaves the cache untouched; a write that
    /// already started is always committed.
    pub fn load_cancellable(
        &self,
        identity: &ListIdentity,
        directive: LoadDirective,
        state: &PageState,
        metadata: &RequestMetadata,
        cancel: &CancelToken,
    ) -> Option<SyncOutcome> {
        if cancel.is_cancelled() {
            return None;
        }
        let lock = self.locks.lock_for(identity);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.run(identity, directive, state, metadata, Some(cancel))
    }

    /// Resolve the cursor for a directive, or `None` when there is nothing to fetch
    fn resolve_cursor(
        &self,
        identity: &ListIdentity,
        directive: LoadDirective,
        state: &PageState,
    ) -> Option<Cursor> {
        if directive != LoadDirective::Refresh && state.end_reached {
            // An earlier load in this direction already hit the end
            return None;
        }
        if directive != LoadDirective::Refresh && self.remote.paging(identity) == Paging::Fixed {
            // A fixed source returns the same page for any cursor: only Refresh can load it
            return None;
        }
        state.cursor_for(directive)
    }

    fn run(
        &self,
        identity: &ListIdentity,
        directive: LoadDirective,
        state: &PageState,
        metadata: &RequestMetadata,
        cancel: Option<&CancelToken>,
    ) -> Option<SyncOutcome> {
        let cancelled = || cancel.is_some_and(CancelToken::is_cancelled);

        // Queued behind another load counts as "before fetch"
        if cancelled() {
            return None;
        }

        let Some(cursor) = self.resolve_cursor(identity, directive, state) else {
            debug!("[SYNC] {} {}: nothing to page from", identity, directive.as_str());
            return Some(SyncOutcome::Success { end_reached: true });
        };

        let page = match self.remote.fetch(identity, &cursor, metadata) {
            Ok(page) => page,
            Err(e) => {
                debug!("[SYNC] {} {}: fetch failed: {}", identity, directive.as_str(), e);
                return Some(SyncOutcome::Failure(e.into()));
            }
        };

        if !self.connectivity.is_reachable() {
            debug!(
                "[SYNC] {} {}: connectivity lost, discarding {} items",
                identity,
                directive.as_str(),
                page.items.len()
            );
            return Some(SyncOutcome::Success { end_reached: true });
        }

        if cancelled() {
            return None;
        }

        let written = match directive {
            LoadDirective::Refresh => self.store.replace_all(identity, &page.items),
            LoadDirective::Append => self.store.append_all(identity, &page.items),
            LoadDirective::Prepend => self.store.prepend_all(identity, &page.items),
        };

        // The write has finished either way; cancellation only suppresses delivery now
        if cancelled() {
            return None;
        }

        let outcome = match written {
            Ok(()) => SyncOutcome::Success {
                end_reached: end_reached(directive, &page),
            },
            Err(e) => SyncOutcome::Failure(e.into()),
        };
        debug!(
            "[SYNC] {} {}: {} items, {:?}",
            identity,
            directive.as_str(),
            page.items.len(),
            outcome
        );
        Some(outcome)
    }
}

fn end_reached(directive: LoadDirective, page: &Page) -> bool {
    match directive {
        LoadDirective::Refresh => false,
        LoadDirective::Prepend => true,
        LoadDirective::Append => page.is_empty(),
    }
}
