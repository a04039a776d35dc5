//! Load cycle outcomes

use crate::remote::FetchError;
use crate::storage::StoreError;

/// Why a load cycle failed
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("cache write failed: {0}")]
    Store(#[from] StoreError),
}

/// Result of one load cycle, consumed by the paging layer
#[derive(Debug)]
pub enum SyncOutcome {
    /// The cycle finished; `end_reached` means no further pages in that direction
    Success { end_reached: bool },
    /// The cycle failed and the cache is exactly as it was before
    Failure(SyncError),
}

impl SyncOutcome {
    pub fn success(end_reached: bool) -> Self {
        SyncOutcome::Success { end_reached }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success { .. })
    }

    /// Whether the caller should stop requesting pages in this direction
    ///
    /// Failures report `false`: the caller may retry.
    pub fn end_reached(&self) -> bool {
        matches!(self, SyncOutcome::Success { end_reached: true })
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            SyncOutcome::Success { .. } => None,
            SyncOutcome::Failure(e) => Some(e),
        }
    }
}
