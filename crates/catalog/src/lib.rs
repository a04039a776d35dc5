//! Catalog crate - offline-first paging for remote content lists
//!
//! This crate keeps a local cache of remote lists (recommendation feeds,
//! album track lists, playlists) and pages them in on demand:
//! - Domain models (ListIdentity, Item, PageState)
//! - Remote list source over HTTP and its request metadata
//! - List store abstraction with SQLite and in-memory backends
//! - Sync mediator that fetches, checks connectivity and writes the cache
//! - Page store that turns scroll position into loads and serves lazy views
//!
//! All APIs are blocking and executor-agnostic.

pub mod config;
pub mod connectivity;
pub mod models;
pub mod paging;
pub mod remote;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use crate::config::{CatalogConfig, PagingConfig, Route};
pub use connectivity::{Connectivity, ManualConnectivity, TcpProbe};
pub use models::{Cursor, Item, ItemId, ListIdentity, LoadDirective, PageState};
pub use paging::{LoadRequest, PageStore, PagedItems};
pub use remote::{FetchError, HttpRemoteSource, Page, Paging, RemoteSource, RequestMetadata};
pub use storage::{InMemoryListStore, ListStore, SqliteListStore, StoreError};
pub use sync::{CancelToken, SyncError, SyncMediator, SyncOutcome, cooldown_elapsed};
