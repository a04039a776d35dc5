//! Page store: load triggers and coalescing per list

use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::PagedItems;
use crate::config::PagingConfig;
use crate::models::{ListIdentity, LoadDirective, PageState};
use crate::remote::RequestMetadata;
use crate::storage::{ListStore, StoreError};
use crate::sync::{CancelToken, SyncMediator, SyncOutcome, cooldown_elapsed};

/// What happened to a load request
#[derive(Debug)]
pub enum LoadRequest {
    /// The mediator ran and returned this outcome
    Completed(SyncOutcome),
    /// A load for the same list was already in flight; that one wins
    Coalesced,
    /// Nothing to do (already subscribed, end reached, not near the end, cooldown)
    Skipped,
    /// The caller cancelled and the outcome was suppressed
    Cancelled,
}

impl LoadRequest {
    pub fn outcome(&self) -> Option<&SyncOutcome> {
        match self {
            LoadRequest::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Paging state tracked per list
#[derive(Default)]
struct ListState {
    subscribed: bool,
    append_end_reached: bool,
    prepend_end_reached: bool,
    /// Bumped on every refresh, prepend or eviction so open views can tell they are stale
    generation: Arc<AtomicU64>,
}

/// Removes a list from the in-flight set when the load finishes (or unwinds)
struct InFlight<'a> {
    set: &'a Mutex<HashSet<ListIdentity>>,
    identity: &'a ListIdentity,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(self.identity);
    }
}

/// Read path and load trigger for the UI
///
/// At most one load per list is dispatched at a time; a request for a list
/// that is already loading is coalesced into a no-op.
pub struct PageStore {
    mediator: Arc<SyncMediator>,
    store: Arc<dyn ListStore>,
    config: PagingConfig,
    metadata: RwLock<RequestMetadata>,
    in_flight: Mutex<HashSet<ListIdentity>>,
    lists: Mutex<HashMap<ListIdentity, ListState>>,
}

impl PageStore {
    pub fn new(mediator: Arc<SyncMediator>, config: PagingConfig) -> Self {
        let store = mediator.store().clone();
        Self {
            mediator,
            store,
            config,
            metadata: RwLock::new(RequestMetadata::anonymous()),
            in_flight: Mutex::new(HashSet::new()),
            lists: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the session metadata attached to later loads
    pub fn set_metadata(&self, metadata: RequestMetadata) {
        *self.metadata.write().unwrap_or_else(PoisonError::into_inner) = metadata;
    }

    fn lists(&self) -> MutexGuard<'_, HashMap<ListIdentity, ListState>> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start observing a list; the first subscription refreshes it
    pub fn subscribe(&self, identity: &ListIdentity) -> LoadRequest {
        let first = {
            let mut lists = self.lists();
            let state = lists.entry(identity.clone()).or_default();
            !std::mem::replace(&mut state.subscribed, true)
        };
        if !first {
            return LoadRequest::Skipped;
        }
        self.load(identity, LoadDirective::Refresh, None)
    }

    /// Pull-to-refresh, subject to the configured cooldown
    pub fn refresh(&self, identity: &ListIdentity) -> LoadRequest {
        if self.config.refresh_cooldown_secs > 0 {
            let last = match self.store.last_refreshed_at(identity) {
                Ok(last) => last,
                Err(e) => return LoadRequest::Completed(SyncOutcome::Failure(e.into())),
            };
            if !cooldown_elapsed(last, self.config.refresh_cooldown_secs) {
                debug!("[PAGING] {}: refresh within cooldown, skipped", identity);
                return LoadRequest::Skipped;
            }
        }
        self.load(identity, LoadDirective::Refresh, None)
    }

    /// Report the last visible index; appends when the UI nears the end of loaded items
    pub fn on_visible(&self, identity: &ListIdentity, last_visible_index: usize) -> LoadRequest {
        self.on_visible_cancellable(identity, last_visible_index, None)
    }

    /// Like [`PageStore::on_visible`], abortable through `cancel`
    pub fn on_visible_cancellable(
        &self,
        identity: &ListIdentity,
        last_visible_index: usize,
        cancel: Option<&CancelToken>,
    ) -> LoadRequest {
        if self.end_reached(identity) {
            return LoadRequest::Skipped;
        }
        let loaded = match self.store.count(identity) {
            Ok(loaded) => loaded,
            Err(e) => return LoadRequest::Completed(SyncOutcome::Failure(e.into())),
        };
        if last_visible_index.saturating_add(self.config.prefetch_distance) < loaded {
            return LoadRequest::Skipped;
        }
        self.load(identity, LoadDirective::Append, cancel)
    }

    /// Dispatch one load unless another is in flight for the same list
    pub fn load(
        &self,
        identity: &ListIdentity,
        directive: LoadDirective,
        cancel: Option<&CancelToken>,
    ) -> LoadRequest {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(identity.clone()) {
                debug!(
                    "[PAGING] {} {}: coalesced into load in flight",
                    identity,
                    directive.as_str()
                );
                return LoadRequest::Coalesced;
            }
        }
        let _in_flight = InFlight {
            set: &self.in_flight,
            identity,
        };

        let end_reached = {
            let mut lists = self.lists();
            let state = lists.entry(identity.clone()).or_default();
            match directive {
                LoadDirective::Append => state.append_end_reached,
                LoadDirective::Prepend => state.prepend_end_reached,
                LoadDirective::Refresh => false,
            }
        };
        let page_state = match PageState::from_store(self.store.as_ref(), identity, end_reached) {
            Ok(state) => state,
            Err(e) => return LoadRequest::Completed(SyncOutcome::Failure(e.into())),
        };
        let metadata = self
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let outcome = match cancel {
            Some(cancel) => self.mediator.load_cancellable(
                identity,
                directive,
                &page_state,
                &metadata,
                cancel,
            ),
            None => Some(self.mediator.load(identity, directive, &page_state, &metadata)),
        };

        if directive != LoadDirective::Append {
            // Refresh and prepend shift row offsets, even when the outcome was suppressed
            self.bump_generation(identity);
        }

        match outcome {
            Some(outcome) => {
                self.record(identity, directive, &outcome);
                LoadRequest::Completed(outcome)
            }
            None => LoadRequest::Cancelled,
        }
    }

    fn record(&self, identity: &ListIdentity, directive: LoadDirective, outcome: &SyncOutcome) {
        if let SyncOutcome::Failure(e) = outcome {
            warn!("[PAGING] {} {} failed: {}", identity, directive.as_str(), e);
            return;
        }

        let mut lists = self.lists();
        let state = lists.entry(identity.clone()).or_default();
        match directive {
            LoadDirective::Refresh => {
                state.append_end_reached = outcome.end_reached();
                state.prepend_end_reached = false;
            }
            LoadDirective::Append => state.append_end_reached = outcome.end_reached(),
            LoadDirective::Prepend => state.prepend_end_reached = outcome.end_reached(),
        }
    }

    fn bump_generation(&self, identity: &ListIdentity) {
        let mut lists = self.lists();
        let state = lists.entry(identity.clone()).or_default();
        state.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether the last append for `identity` reported the end of the list
    pub fn end_reached(&self, identity: &ListIdentity) -> bool {
        self.lists()
            .get(identity)
            .is_some_and(|state| state.append_end_reached)
    }

    /// Whether a load for `identity` is currently running
    pub fn is_loading(&self, identity: &ListIdentity) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity)
    }

    /// Lazy view over what is currently cached for `identity`
    pub fn items(&self, identity: &ListIdentity) -> PagedItems {
        let generation = {
            let mut lists = self.lists();
            lists.entry(identity.clone()).or_default().generation.clone()
        };
        PagedItems::new(
            self.store.clone(),
            identity.clone(),
            self.config.page_size,
            generation,
        )
    }

    /// Drop the cache for `identity` and forget its paging state
    pub fn evict(&self, identity: &ListIdentity) -> Result<(), StoreError> {
        self.mediator.evict(identity)?;

        let mut lists = self.lists();
        if let Some(state) = lists.get_mut(identity) {
            state.subscribed = false;
            state.append_end_reached = false;
            state.prepend_end_reached = false;
            state.generation.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ManualConnectivity;
    use crate::remote::FetchError;
    use crate::storage::InMemoryListStore;
    use crate::test_support::{ScriptedRemote, page};
    use std::sync::mpsc;
    use std::time::Duration;

    fn page_store(remote: ScriptedRemote, config: PagingConfig) -> (PageStore, Arc<ScriptedRemote>) {
        let remote = Arc::new(remote);
        let mediator = SyncMediator::new(
            remote.clone(),
            Arc::new(InMemoryListStore::new()),
            Arc::new(ManualConnectivity::new(true)),
        );
        (PageStore::new(Arc::new(mediator), config), remote)
    }

    fn config() -> PagingConfig {
        PagingConfig {
            page_size: 2,
            prefetch_distance: 1,
            refresh_cooldown_secs: 0,
        }
    }

    fn reco() -> ListIdentity {
        ListIdentity::new("reco")
    }

    fn collect(items: PagedItems) -> Vec<String> {
        items.map(|item| item.unwrap().id.0).collect()
    }

    #[test]
    fn test_first_subscription_refreshes_once() {
        let (pages, remote) = page_store(
            ScriptedRemote::new().respond(Ok(page(&["a", "b", "c"]))),
            config(),
        );

        let first = pages.subscribe(&reco());
        let second = pages.subscribe(&reco());

        assert!(matches!(
            first,
            LoadRequest::Completed(SyncOutcome::Success { end_reached: false })
        ));
        assert!(matches!(second, LoadRequest::Skipped));
        assert_eq!(remote.cursors().len(), 1);
        assert_eq!(collect(pages.items(&reco())), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_append_only_near_end() {
        let (pages, remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a", "b", "c", "d"])))
                .respond(Ok(page(&["e"]))),
            config(),
        );
        pages.subscribe(&reco());

        // index 1 + distance 1 < 4 loaded: far from the end
        assert!(matches!(pages.on_visible(&reco(), 1), LoadRequest::Skipped));
        assert_eq!(remote.cursors().len(), 1);

        let near_end = pages.on_visible(&reco(), 3);
        assert!(matches!(
            near_end,
            LoadRequest::Completed(SyncOutcome::Success { end_reached: false })
        ));
        assert_eq!(collect(pages.items(&reco())), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_no_append_after_end_reached() {
        let (pages, remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a"])))
                .respond(Ok(page(&[]))),
            config(),
        );
        pages.subscribe(&reco());

        assert!(pages.on_visible(&reco(), 0).outcome().unwrap().end_reached());
        assert!(pages.end_reached(&reco()));
        assert!(matches!(pages.on_visible(&reco(), 0), LoadRequest::Skipped));
        assert_eq!(remote.cursors().len(), 2);

        // A refresh reopens the list for appends
        remote.push(Ok(page(&["a"])));
        pages.refresh(&reco());
        assert!(!pages.end_reached(&reco()));
    }

    #[test]
    fn test_failed_append_can_be_retried() {
        let (pages, _remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a"])))
                .respond(Err(FetchError::Status { code: 503 }))
                .respond(Ok(page(&["b"]))),
            config(),
        );
        pages.subscribe(&reco());

        let failed = pages.on_visible(&reco(), 0);
        assert!(failed.outcome().unwrap().error().is_some());
        assert!(!pages.end_reached(&reco()));

        let retried = pages.on_visible(&reco(), 0);
        assert!(retried.outcome().unwrap().is_success());
        assert_eq!(collect(pages.items(&reco())), vec!["a", "b"]);
    }

    #[test]
    fn test_concurrent_request_is_coalesced() {
        let (pages, remote) = page_store(ScriptedRemote::new(), config());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        remote.push(Ok(page(&["a"])));
        remote.on_fetch(move || {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
        });

        std::thread::scope(|s| {
            let refresh = s.spawn(|| pages.refresh(&reco()));

            entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert!(pages.is_loading(&reco()));
            assert!(matches!(pages.refresh(&reco()), LoadRequest::Coalesced));
            assert!(matches!(pages.on_visible(&reco(), 0), LoadRequest::Coalesced));

            release_tx.send(()).unwrap();
            assert!(refresh.join().unwrap().outcome().unwrap().is_success());
        });

        assert!(!pages.is_loading(&reco()));
        assert_eq!(remote.cursors().len(), 1);
    }

    #[test]
    fn test_refresh_marks_open_views_stale() {
        let (pages, remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a", "b", "c"])))
                .respond(Ok(page(&["x"]))),
            config(),
        );
        pages.subscribe(&reco());

        let mut view = pages.items(&reco());
        assert_eq!(view.next().unwrap().unwrap().id.as_str(), "a");
        assert!(!view.is_stale());

        pages.refresh(&reco());
        assert!(view.is_stale());

        view.restart();
        assert!(!view.is_stale());
        assert_eq!(collect(view), vec!["x"]);
        assert_eq!(remote.cursors().len(), 2);
    }

    #[test]
    fn test_view_reads_lazily_and_sees_appends() {
        let (pages, _remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a", "b"])))
                .respond(Ok(page(&["c"]))),
            config(),
        );
        pages.subscribe(&reco());

        let mut view = pages.items(&reco());
        assert_eq!(view.position(), 0);
        view.next();
        view.next();
        assert_eq!(view.position(), 2);

        pages.on_visible(&reco(), 1);
        assert_eq!(view.next().unwrap().unwrap().id.as_str(), "c");
        assert!(view.next().is_none());
    }

    #[test]
    fn test_refresh_cooldown() {
        let mut config = config();
        config.refresh_cooldown_secs = 3600;
        let (pages, remote) = page_store(
            ScriptedRemote::new().respond(Ok(page(&["a"]))),
            config,
        );

        assert!(pages.refresh(&reco()).outcome().is_some());
        assert!(matches!(pages.refresh(&reco()), LoadRequest::Skipped));
        assert_eq!(remote.cursors().len(), 1);
    }

    #[test]
    fn test_cancelled_append() {
        let (pages, remote) = page_store(
            ScriptedRemote::new().respond(Ok(page(&["a"]))),
            config(),
        );
        pages.subscribe(&reco());

        let cancel = CancelToken::new();
        cancel.cancel();
        let request = pages.on_visible_cancellable(&reco(), 0, Some(&cancel));

        assert!(matches!(request, LoadRequest::Cancelled));
        assert_eq!(remote.cursors().len(), 1);
        assert!(!pages.is_loading(&reco()));
    }

    #[test]
    fn test_prepend_marks_open_views_stale() {
        let (pages, _remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a", "b"])))
                .respond(Ok(page(&["x", "y"]))),
            PagingConfig {
                page_size: 1,
                ..config()
            },
        );
        pages.subscribe(&reco());

        let mut view = pages.items(&reco());
        assert_eq!(view.next().unwrap().unwrap().id.as_str(), "a");

        let prepended = pages.load(&reco(), LoadDirective::Prepend, None);
        assert!(prepended.outcome().unwrap().end_reached());
        assert!(view.is_stale());

        view.restart();
        assert_eq!(collect(view), vec!["x", "y", "a", "b"]);
    }

    #[test]
    fn test_append_keeps_open_views_fresh() {
        let (pages, _remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a"])))
                .respond(Ok(page(&["b"]))),
            config(),
        );
        pages.subscribe(&reco());
        let view = pages.items(&reco());

        pages.on_visible(&reco(), 0);

        assert!(!view.is_stale());
        assert_eq!(collect(view), vec!["a", "b"]);
    }

    #[test]
    fn test_huge_visible_index_does_not_overflow() {
        let (pages, remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a"])))
                .respond(Ok(page(&["b"]))),
            config(),
        );
        pages.subscribe(&reco());

        let request = pages.on_visible(&reco(), usize::MAX);

        assert!(request.outcome().unwrap().is_success());
        assert_eq!(remote.cursors().len(), 2);
    }

    #[test]
    fn test_evict_resets_subscription() {
        let (pages, remote) = page_store(
            ScriptedRemote::new()
                .respond(Ok(page(&["a"])))
                .respond(Ok(page(&["b"]))),
            config(),
        );
        pages.subscribe(&reco());
        let view = pages.items(&reco());

        pages.evict(&reco()).unwrap();
        assert!(view.is_stale());
        assert_eq!(collect(pages.items(&reco())), Vec::<String>::new());

        assert!(pages.subscribe(&reco()).outcome().is_some());
        assert_eq!(collect(pages.items(&reco())), vec!["b"]);
        assert_eq!(remote.cursors().len(), 2);
    }
}
