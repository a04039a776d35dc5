//! Page store adapter
//!
//! Bridges the UI's scroll-driven demand to sync mediator loads and serves
//! the cached lists back as lazy item sequences.

mod items;
mod store;

pub use items::PagedItems;
pub use store::{LoadRequest, PageStore};
