//! Remote catalog source
//!
//! This module provides:
//! - The [`RemoteSource`] trait the sync mediator fetches pages through
//! - Opaque request metadata supplied by the session layer
//! - A blocking HTTP implementation for the catalog API

mod client;

pub use client::HttpRemoteSource;

use sha2::{Digest, Sha256};

use crate::models::{Cursor, Item, ListIdentity};

/// Errors raised while fetching a page
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("server responded with status {code}")]
    Status { code: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no route configured for list kind '{0}'")]
    UnknownList(String),

    #[error("route cannot be resolved against the base URL: {0}")]
    InvalidRoute(String),
}

/// One page of items, in server order
///
/// An empty page means the source has nothing more in the requested direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
}

impl Page {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// How a source interprets cursors for a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// Cursors select the page to return
    Cursor,
    /// Cursors are ignored and the same logical page always comes back
    Fixed,
}

/// Session data attached to every fetch
///
/// Produced by the session layer; the sync mediator only passes it through.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    access_token: String,
    signature: Option<String>,
}

impl RequestMetadata {
    /// Metadata carrying an access token and an externally computed signature
    pub fn new(access_token: impl Into<String>, signature: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            signature,
        }
    }

    /// Metadata signed for `scope_key`: hex SHA-256 of `access_token=<token>&<scope_key>`
    pub fn signed(access_token: impl Into<String>, scope_key: &str) -> Self {
        let access_token = access_token.into();
        let digest = Sha256::digest(format!("access_token={}&{}", access_token, scope_key));
        Self {
            access_token,
            signature: Some(hex::encode(digest)),
        }
    }

    /// Metadata for endpoints that need no session
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }
}

impl std::fmt::Debug for RequestMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token
        f.debug_struct("RequestMetadata")
            .field("has_token", &!self.access_token.is_empty())
            .field("signed", &self.signature.is_some())
            .finish()
    }
}

/// Stateless page fetcher for catalog lists
pub trait RemoteSource: Send + Sync {
    /// Fetch one page of `identity` at `cursor`
    fn fetch(
        &self,
        identity: &ListIdentity,
        cursor: &Cursor,
        metadata: &RequestMetadata,
    ) -> Result<Page, FetchError>;

    /// How this source pages `identity`
    fn paging(&self, identity: &ListIdentity) -> Paging {
        let _ = identity;
        Paging::Cursor
    }
}

/// Catalog API response shapes
pub mod api {
    use super::{FetchError, Page};
    use crate::models::Item;

    /// Keys under which list endpoints return their records
    const LIST_KEYS: [&str; 5] = ["items", "albums", "tracks", "playlists", "songs"];

    /// Parse a list response body into a page
    ///
    /// Accepts a bare JSON array or an object holding the array under one of
    /// the known list keys. Every record must carry an `id`.
    pub fn parse_page(body: serde_json::Value) -> Result<Page, FetchError> {
        let records = match body {
            serde_json::Value::Array(records) => records,
            serde_json::Value::Object(mut map) => LIST_KEYS
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(serde_json::Value::Array(records)) => Some(records),
                    _ => None,
                })
                .ok_or_else(|| FetchError::Malformed("response has no item list".to_string()))?,
            other => {
                return Err(FetchError::Malformed(format!(
                    "expected object or array, got {}",
                    kind_name(&other)
                )));
            }
        };

        let items = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                Item::from_record(record)
                    .ok_or_else(|| FetchError::Malformed(format!("record {} has no id", i)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items))
    }

    fn kind_name(value: &serde_json::Value) -> &'static str {
        match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }
}
