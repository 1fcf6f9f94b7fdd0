//! DeviantArt Favourites Downloader - download a favourites collection
//! through the official DeviantArt API.
//!
//! # Features
//!
//! - OAuth 2.0 authorization-code flow with PKCE
//! - Persisted credential with refresh before expiry
//! - Paginated collection traversal with retry and backoff
//! - Best-quality asset selection per deviation
//! - Rate-limited, atomic file downloads
//! - Per-item outcome accounting and run summary
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use deviantart_favorites::{run, Config, FileTokenStore, ManualCodeReceiver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let store = FileTokenStore::open(config.credentials_path())?;
//!
//!     let summary = run(&config, &config.download_directory(), store, &ManualCodeReceiver).await?;
//!     println!("{} downloaded, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod media;
pub mod output;

// Re-exports for convenience
pub use api::DeviantArtApi;
pub use auth::{
    CodeReceiver, Credential, FileTokenStore, LocalCallbackReceiver, ManualCodeReceiver,
    MemoryTokenStore, StaticCodeReceiver, TokenManager, TokenStore,
};
pub use config::Config;
pub use download::{run, run_with, DownloadOutcome, RunSummary};
pub use error::{Error, Result};
pub use media::{AssetReference, CollectionItem, MediaType};
