//! List identity model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key identifying one logical scrollable list (e.g. "recommendations", "playlist:42")
///
/// Every cached row and every remote fetch is scoped by this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListIdentity(pub String);

impl ListIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The list kind, i.e. the text before the first `:`
    ///
    /// `"playlist:42"` has kind `"playlist"`; `"recommendations"` is its own kind.
    pub fn kind(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(kind, _)| kind)
    }

    /// The parent key, i.e. the text after the first `:` if any
    pub fn key(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, key)| key)
    }
}

impl From<String> for ListIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ListIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ListIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
