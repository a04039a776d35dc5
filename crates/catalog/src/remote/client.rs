//! Catalog API HTTP client
//!
//! Uses synchronous HTTP (ureq) to stay executor-agnostic. Retries are left
//! to the caller; a failed request is reported once.

use anyhow::{Context, Result};
use log::debug;
use url::Url;

use super::{FetchError, Page, Paging, RemoteSource, RequestMetadata, api};
use crate::config::{CatalogConfig, Route};
use crate::models::{Cursor, ListIdentity};

/// Blocking [`RemoteSource`] for the catalog API
pub struct HttpRemoteSource {
    agent: ureq::Agent,
    base_url: Url,
    config: CatalogConfig,
}

impl HttpRemoteSource {
    /// Create a client for the API described by `config`
    ///
    /// Routes resolve below the base URL's path, so a base of
    /// `https://gw.example.com/openapi` keeps its `/openapi/` prefix.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid catalog base URL: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Catalog base URL cannot hold routes: {}", config.base_url);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(config.connect_timeout()))
            .timeout_recv_response(Some(config.read_timeout()))
            .timeout_recv_body(Some(config.read_timeout()))
            .build()
            .into();

        Ok(Self {
            agent,
            base_url,
            config,
        })
    }

    fn route(&self, identity: &ListIdentity) -> Result<&Route, FetchError> {
        self.config
            .routes
            .get(identity.kind())
            .ok_or_else(|| FetchError::UnknownList(identity.kind().to_string()))
    }

    /// Build the request URL for one page
    fn request_url(
        &self,
        identity: &ListIdentity,
        cursor: &Cursor,
        metadata: &RequestMetadata,
    ) -> Result<Url, FetchError> {
        let route = self.route(identity)?;
        let path = route.path.replace("{key}", identity.key().unwrap_or_default());

        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::InvalidRoute(format!("'{}': {}", path, e)))?;

        {
            let mut query = url.query_pairs_mut();
            if !metadata.access_token().is_empty() {
                query.append_pair("access_token", metadata.access_token());
            }
            if let Some(sig) = metadata.signature() {
                query.append_pair("sig", sig);
            }
            query.append_pair("count", &self.config.paging.page_size.to_string());

            if route.cursor_aware {
                match cursor {
                    Cursor::Start => {}
                    Cursor::After(id) => {
                        query.append_pair("after", id.as_str());
                    }
                    Cursor::Before(id) => {
                        query.append_pair("before", id.as_str());
                    }
                }
            }
        }

        Ok(url)
    }
}

impl RemoteSource for HttpRemoteSource {
    fn fetch(
        &self,
        identity: &ListIdentity,
        cursor: &Cursor,
        metadata: &RequestMetadata,
    ) -> Result<Page, FetchError> {
        let url = self.request_url(identity, cursor, metadata)?;
        debug!("[REMOTE] GET {} ({:?})", url.path(), cursor);

        let mut response = self.agent.get(url.as_str()).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => FetchError::Status { code },
            other => FetchError::Transport(other.to_string()),
        })?;

        let body: serde_json::Value = response
            .body_mut()
            .read_json()
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        api::parse_page(body)
    }

    fn paging(&self, identity: &ListIdentity) -> Paging {
        match self.route(identity) {
            Ok(route) if !route.cursor_aware => Paging::Fixed,
            _ => Paging::Cursor,
        }
    }
}
