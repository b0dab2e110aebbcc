//! Host-provided web auth flow abstraction
//!
//! A browser-extension host exposes two identity capabilities the token
//! fetcher depends on: computing the extension's fixed callback URL, and
//! launching a browser-controlled authorization UI that eventually resolves
//! with the redirect URI the authorization server sent the user to.
//!
//! Both capabilities live behind the [`WebAuthLauncher`] trait so that the
//! fetcher can be driven by a real host binding in production and by
//! [`fake::FakeLauncher`] in tests.

use async_trait::async_trait;

use crate::error::Result;

pub mod fake;

/// Options passed to a single web auth flow launch.
///
/// Mirrors the host identity API's options object: the fully built
/// authorization URL and whether the host may show interactive UI.
///
/// # Examples
///
/// ```
/// use authfetch::launcher::FlowOptions;
///
/// let options = FlowOptions {
///     url: "https://provider.example/oauth/authorize?client_id=abc".to_string(),
///     interactive: true,
/// };
/// assert!(options.interactive);
/// ```
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Fully built authorization URL to open.
    pub url: String,

    /// Whether the host is allowed to present interactive UI. When `false`,
    /// the flow only succeeds if the provider can complete it silently.
    pub interactive: bool,
}

/// Browser-mediated authorization flow launcher.
///
/// Implementations wrap a host identity API. The launcher owns the entire
/// user-facing part of the flow: the fetcher hands it an authorization URL
/// and suspends until the host resolves with a redirect URI or an error.
///
/// No cancellation is exposed; once launched, a flow runs until the host
/// completes or abandons it.
#[async_trait]
pub trait WebAuthLauncher: Send + Sync {
    /// Returns the host-issued callback URL for the given path suffix.
    ///
    /// This is the fixed redirect endpoint the authorization server must
    /// send the user back to, e.g. `https://<app-id>.chromiumapp.org/<path>`
    /// for a Chromium extension host.
    fn redirect_url(&self, path: &str) -> String;

    /// Opens the authorization UI and resolves with the final redirect URI.
    ///
    /// # Errors
    ///
    /// Returns an error when the host reports a failure, including the user
    /// closing the authorization window.
    async fn launch(&self, options: &FlowOptions) -> Result<String>;
}
