//! Refresh cooldown helper
//!
//! Pure function so it can be tested without a store or a clock source.

use chrono::{DateTime, Utc};

/// Check if enough time has passed since the last refresh to allow another one.
///
/// # Arguments
/// * `last_refreshed_at` - When the list was last refreshed (None if never)
/// * `cooldown_secs` - Minimum seconds between refreshes
///
/// # Returns
/// `true` if the cooldown has elapsed (or the list was never refreshed)
pub fn cooldown_elapsed(last_refreshed_at: Option<DateTime<Utc>>, cooldown_secs: u64) -> bool {
    match last_refreshed_at {
        Some(last) => {
            let elapsed = Utc::now() - last;
            elapsed.num_seconds() >= cooldown_secs as i64
        }
        None => true,
    }
}
