//! Authfetch - browser-mediated OAuth2 token fetcher
//!
//! This library resolves an opaque OAuth2 access token through a
//! host-provided, browser-controlled web auth flow (the browser-extension
//! `launchWebAuthFlow` model). It supports both the implicit flow, where the
//! access token arrives directly in the redirect, and the authorization code
//! flow, where a short-lived code is exchanged at the token endpoint.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `fetcher`: The [`TokenFetcher`] itself -- caching, flow orchestration,
//!   redirect parsing, and code exchange
//! - `launcher`: The [`WebAuthLauncher`] host abstraction and a scriptable
//!   fake for tests
//! - `store`: The [`TokenStore`] persistence contract with keyring-backed
//!   and in-memory implementations
//! - `error`: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use authfetch::launcher::fake::FakeLauncher;
//! use authfetch::{FetcherConfig, MemoryTokenStore, TokenFetcher};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let launcher = Arc::new(FakeLauncher::new("https://ext.example"));
//!     let store = Arc::new(MemoryTokenStore::new());
//!
//!     let fetcher = TokenFetcher::new(
//!         FetcherConfig {
//!             client_id: "my-client".to_string(),
//!             client_secret: "my-secret".to_string(),
//!             base_url: "https://provider.example".to_string(),
//!         },
//!         launcher,
//!         store,
//!         reqwest::Client::new(),
//!     );
//!
//!     let token = fetcher.get_token(true).await?;
//!     println!("access token: {token}");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fetcher;
pub mod launcher;
pub mod store;

// Re-export commonly used types
pub use error::{AuthFetchError, Result};
pub use fetcher::{FetcherConfig, TokenFetcher, REDIRECT_PATH};
pub use launcher::{FlowOptions, WebAuthLauncher};
pub use store::{KeyringTokenStore, MemoryTokenStore, TokenStore};
