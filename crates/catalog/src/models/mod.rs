//! Domain models for cached catalog lists

mod item;
mod list;
mod page;

pub use item::{Item, ItemId};
pub use list::ListIdentity;
pub use page::{Cursor, LoadDirective, PageState};
