//! Cache synchronization
//!
//! The [`SyncMediator`] runs one load cycle at a time per list: fetch a page,
//! confirm connectivity, write the page into the local store atomically and
//! report whether more pages may be requested.

mod cancel;
mod mediator;
mod outcome;
mod timing;

pub use cancel::CancelToken;
pub use mediator::SyncMediator;
pub use outcome::{SyncError, SyncOutcome};
pub use timing::cooldown_elapsed;
