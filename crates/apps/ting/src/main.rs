//! Ting - offline-first catalog browser
//!
//! Loads one remote list into the local cache and prints it.
//!
//! Usage: `ting [list] [pages]`, where `list` is a list identity such as
//! `recommendations` or `album:123` and `pages` is how many extra pages to
//! scroll through after the first refresh.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use catalog::{
    CatalogConfig, HttpRemoteSource, Item, ListIdentity, LoadRequest, PageStore, RequestMetadata,
    SqliteListStore, SyncMediator, SyncOutcome, TcpProbe,
};
use log::{error, info, warn};

/// Environment variable carrying the session's access token
const ACCESS_TOKEN_ENV: &str = "TING_ACCESS_TOKEN";

const DEFAULT_LIST: &str = "recommendations";

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let identity = ListIdentity::new(args.next().unwrap_or_else(|| DEFAULT_LIST.to_string()));
    let extra_pages: usize = match args.next() {
        Some(n) => n.parse().context("page count must be a number")?,
        None => 0,
    };

    let config_dir = config::init().context("Failed to initialize config directory")?;
    let catalog_config = CatalogConfig::load().unwrap_or_else(|e| {
        warn!("Using default catalog config: {}", e);
        CatalogConfig::from_env()
    });

    let store = SqliteListStore::new(config_dir.join("catalog.sqlite"))
        .context("Failed to open catalog cache")?;
    let connectivity = TcpProbe::new(
        catalog_config.probe_addr.clone(),
        catalog_config.connect_timeout(),
    );
    let paging = catalog_config.paging.clone();
    let metadata = session_metadata(&catalog_config.scope_key);
    let remote = HttpRemoteSource::new(catalog_config).context("Failed to build HTTP client")?;

    let mediator = SyncMediator::new(Arc::new(remote), Arc::new(store), Arc::new(connectivity));
    let pages = PageStore::new(Arc::new(mediator), paging);
    pages.set_metadata(metadata);

    report(&identity, "refresh", pages.subscribe(&identity));
    for _ in 0..extra_pages {
        if pages.end_reached(&identity) {
            info!("{}: end of list reached", identity);
            break;
        }
        let last_visible = pages.items(&identity).count().saturating_sub(1);
        report(&identity, "append", pages.on_visible(&identity, last_visible));
    }

    for (index, item) in pages.items(&identity).enumerate() {
        let item = item.context("Failed to read cached list")?;
        println!("{:4}  {:>12}  {}", index + 1, item.id.as_str(), title(&item));
    }
    Ok(())
}

fn session_metadata(scope_key: &str) -> RequestMetadata {
    match env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => RequestMetadata::signed(token, scope_key),
        _ => {
            warn!("{} not set, requests are unsigned", ACCESS_TOKEN_ENV);
            RequestMetadata::anonymous()
        }
    }
}

fn report(identity: &ListIdentity, action: &str, request: LoadRequest) {
    match request {
        LoadRequest::Completed(SyncOutcome::Success { end_reached }) => {
            info!("{} {}: ok (end reached: {})", identity, action, end_reached);
        }
        LoadRequest::Completed(SyncOutcome::Failure(e)) => {
            // The cached rows are still served below
            warn!("{} {} failed: {}", identity, action, e);
        }
        other => info!("{} {}: {:?}", identity, action, other),
    }
}

fn title(item: &Item) -> &str {
    ["album_title", "track_title", "title"]
        .into_iter()
        .find_map(|field| item.field_str(field))
        .unwrap_or("")
}
