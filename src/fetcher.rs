//! OAuth2 token fetcher over a browser-mediated web auth flow
//!
//! [`TokenFetcher`] is the single entry point of this crate. Given a client
//! identifier and secret, an authorization server base URL, a
//! [`WebAuthLauncher`] host binding, and a [`TokenStore`], it resolves an
//! opaque access token:
//!
//! 1. A cached token (in memory, or primed once from the store) is returned
//!    immediately with no flow and no network activity.
//! 2. Otherwise the authorization URL is built and handed to the launcher.
//! 3. The redirect URI the flow resolves with is matched against the fixed
//!    callback endpoint and its `#`/`?` trailer is parsed as `key=value`
//!    pairs.
//! 4. An `access_token` parameter is the final token (implicit flow); a
//!    `code` parameter is exchanged at the token endpoint (authorization
//!    code flow); anything else is an error.
//!
//! Only one flow may be in flight per fetcher; a second `get_token` call
//! while a flow is running fails with
//! [`AuthFetchError::FlowInProgress`](crate::AuthFetchError::FlowInProgress)
//! instead of orphaning the first caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthFetchError, Result};
use crate::launcher::{FlowOptions, WebAuthLauncher};
use crate::store::TokenStore;

/// Path suffix of the host-issued callback endpoint.
pub const REDIRECT_PATH: &str = "provider_cb";

// ---------------------------------------------------------------------------
// FetcherConfig
// ---------------------------------------------------------------------------

/// Static configuration for a [`TokenFetcher`].
///
/// # Examples
///
/// ```
/// use authfetch::FetcherConfig;
///
/// let config = FetcherConfig {
///     client_id: "my-client".to_string(),
///     client_secret: "my-secret".to_string(),
///     base_url: "https://provider.example".to_string(),
/// };
/// assert_eq!(config.client_id, "my-client");
/// ```
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// OAuth2 client identifier.
    pub client_id: String,

    /// OAuth2 client secret, sent only in the code-exchange POST body.
    pub client_secret: String,

    /// Authorization server base URL; `/oauth/authorize` and `/oauth/token`
    /// are appended to it.
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// Token endpoint response (raw deserialization)
// ---------------------------------------------------------------------------

/// Raw JSON response from the token endpoint.
///
/// Only `access_token` matters to the fetcher; a response without it is a
/// failed exchange regardless of what else it carries.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

// ---------------------------------------------------------------------------
// TokenFetcher
// ---------------------------------------------------------------------------

/// Single-account OAuth2 token fetcher.
///
/// The fetcher owns an instance-scoped token cache and a single in-flight
/// guard. It is `Send + Sync`; share it behind an `Arc` and call
/// [`get_token`](Self::get_token) from the event loop.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use authfetch::launcher::fake::FakeLauncher;
/// use authfetch::{FetcherConfig, MemoryTokenStore, TokenFetcher};
///
/// # async fn example() -> authfetch::Result<()> {
/// let launcher = Arc::new(FakeLauncher::new("https://ext.example"));
/// let store = Arc::new(MemoryTokenStore::new());
/// let fetcher = TokenFetcher::new(
///     FetcherConfig {
///         client_id: "my-client".to_string(),
///         client_secret: "my-secret".to_string(),
///         base_url: "https://provider.example".to_string(),
///     },
///     launcher,
///     store,
///     reqwest::Client::new(),
/// );
///
/// let token = fetcher.get_token(true).await?;
/// println!("access token: {token}");
/// # Ok(())
/// # }
/// ```
pub struct TokenFetcher {
    config: FetcherConfig,

    /// Host identity binding used to compute the callback URL and run flows.
    launcher: Arc<dyn WebAuthLauncher>,

    /// Persistence collaborator; consulted once to prime the cache, written
    /// on every successful acquisition.
    store: Arc<dyn TokenStore>,

    /// Shared HTTP client for the code-exchange POST.
    http: reqwest::Client,

    /// Fixed callback endpoint, computed once at construction. Successful
    /// redirects are this URI followed by `#` or `?` and the parameters.
    redirect_uri: String,

    /// Instance-scoped token cache.
    cached: tokio::sync::Mutex<Option<String>>,

    /// Held for the duration of one flow; `try_lock` failure means another
    /// request is in flight.
    in_flight: tokio::sync::Mutex<()>,
}

impl TokenFetcher {
    /// Creates a fetcher for one client/account.
    ///
    /// The callback endpoint is derived from the launcher immediately so
    /// that redirect matching and URL building agree on the same value.
    pub fn new(
        config: FetcherConfig,
        launcher: Arc<dyn WebAuthLauncher>,
        store: Arc<dyn TokenStore>,
        http: reqwest::Client,
    ) -> Self {
        let redirect_uri = launcher.redirect_url(REDIRECT_PATH);
        Self {
            config,
            launcher,
            store,
            http,
            redirect_uri,
            cached: tokio::sync::Mutex::new(None),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the fixed callback endpoint this fetcher expects redirects on.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Resolves an access token, running the web auth flow when necessary.
    ///
    /// A cached or stored token is returned without launching a flow or
    /// touching the network. Otherwise a single flow runs to completion and
    /// the resulting token is cached and persisted before being returned.
    ///
    /// # Arguments
    ///
    /// * `interactive` - Whether the host may show interactive UI.
    ///
    /// # Errors
    ///
    /// - [`AuthFetchError::FlowInProgress`] when another `get_token` call is
    ///   still running its flow.
    /// - [`AuthFetchError::HostFlow`] when the host reports a flow failure.
    /// - [`AuthFetchError::RedirectMismatch`] when the redirect URI does not
    ///   match the expected callback endpoint.
    /// - [`AuthFetchError::MissingCredentials`] when the redirect carries
    ///   neither `access_token` nor `code`, or the exchange response lacks
    ///   `access_token`.
    /// - [`AuthFetchError::Exchange`] when the code-exchange POST fails.
    pub async fn get_token(&self, interactive: bool) -> Result<String> {
        if let Some(token) = self.cached_or_stored().await {
            return Ok(token);
        }

        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| AuthFetchError::FlowInProgress)?;

        // A flow that finished between the cache check and the guard may
        // have filled the cache already.
        if let Some(token) = self.cached.lock().await.clone() {
            return Ok(token);
        }

        let options = FlowOptions {
            url: self.auth_url()?,
            interactive,
        };
        debug!(url = %options.url, interactive = options.interactive, "launching web auth flow");

        let redirect = self
            .launcher
            .launch(&options)
            .await
            .map_err(|e| AuthFetchError::HostFlow(e.to_string()))?;
        debug!(%redirect, "web auth flow completed");

        let trailer = self.match_redirect(&redirect)?;
        let values = parse_redirect_params(trailer);
        self.handle_provider_response(values).await
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Returns the cached token, priming the cache from the store on first
    /// use. Store failures are logged and treated as an absent token.
    async fn cached_or_stored(&self) -> Option<String> {
        let mut cached = self.cached.lock().await;
        if cached.is_some() {
            return cached.clone();
        }

        match self.store.load_token().await {
            Ok(Some(token)) => {
                *cached = Some(token.clone());
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to load stored token");
                None
            }
        }
    }

    /// Dispatches on the parsed redirect parameters.
    async fn handle_provider_response(&self, values: HashMap<String, String>) -> Result<String> {
        debug!(?values, "handling provider response");

        if let Some(token) = values.get("access_token") {
            return self.set_access_token(token).await;
        }
        if let Some(code) = values.get("code") {
            return self.exchange_code(code).await;
        }
        Err(AuthFetchError::MissingCredentials(
            "neither access_token nor code available".to_string(),
        )
        .into())
    }

    /// Caches the token, persists it, and returns it.
    ///
    /// Persistence is fire-and-forget: a failed save is logged and the token
    /// is still delivered to the caller.
    async fn set_access_token(&self, token: &str) -> Result<String> {
        *self.cached.lock().await = Some(token.to_string());
        info!("access token acquired");

        if let Err(e) = self.store.save_token(token).await {
            warn!(error = %e, "failed to persist access token");
        }
        Ok(token.to_string())
    }

    /// Exchanges an authorization code for a token at the token endpoint.
    async fn exchange_code(&self, code: &str) -> Result<String> {
        let params = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let resp = self
            .http
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthFetchError::Exchange(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(
                AuthFetchError::Exchange(format!("token endpoint returned {status}: {body}"))
                    .into(),
            );
        }

        let raw: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthFetchError::Exchange(format!("cannot parse token response: {e}")))?;

        match raw.access_token {
            Some(ref token) => self.set_access_token(token).await,
            None => Err(AuthFetchError::MissingCredentials(
                "cannot obtain access_token from code".to_string(),
            )
            .into()),
        }
    }

    /// Builds the authorization URL with the callback URI encoded into it.
    fn auth_url(&self) -> Result<String> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/oauth/authorize"))
            .map_err(|e| AuthFetchError::Config(format!("invalid base URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code");

        Ok(url.to_string())
    }

    /// Builds the token endpoint URL.
    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.config.base_url.trim_end_matches('/'))
    }

    /// Validates a redirect URI against the expected callback endpoint and
    /// returns the parameter trailer after the `#` or `?` separator.
    fn match_redirect<'a>(&self, redirect: &'a str) -> Result<&'a str> {
        let rest = redirect.strip_prefix(&self.redirect_uri).ok_or_else(|| {
            AuthFetchError::RedirectMismatch(redirect.to_string())
        })?;

        let mut chars = rest.chars();
        match chars.next() {
            Some('#') | Some('?') => Ok(chars.as_str()),
            _ => Err(AuthFetchError::RedirectMismatch(redirect.to_string()).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Utility functions
// ---------------------------------------------------------------------------

/// Parses a redirect parameter trailer into a key-value map.
///
/// Pairs are `&`-separated; a pair without `=` maps to an empty value.
/// Values are percent-decoded; `+` is left verbatim because fragment values
/// are not form-encoded and opaque tokens may legitimately contain it.
fn parse_redirect_params(trailer: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for pair in trailer.split('&') {
        let mut iter = pair.splitn(2, '=');
        let key = iter.next().unwrap_or("").to_string();
        let value = iter.next().unwrap_or("").to_string();
        if !key.is_empty() {
            values.insert(key, percent_decode(&value));
        }
    }
    values
}

/// Performs minimal percent-decoding of a redirect parameter value.
///
/// Converts `%XX` sequences to the corresponding byte; everything else,
/// including `+`, passes through unchanged.
fn percent_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte as char);
                    i += 3;
                    continue;
                }
            }
            out.push(bytes[i] as char);
            i += 1;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::fake::FakeLauncher;
    use crate::store::MemoryTokenStore;

    fn make_fetcher() -> TokenFetcher {
        TokenFetcher::new(
            FetcherConfig {
                client_id: "test-client".to_string(),
                client_secret: "test-secret".to_string(),
                base_url: "https://provider.example".to_string(),
            },
            Arc::new(FakeLauncher::new("https://ext.example")),
            Arc::new(MemoryTokenStore::new()),
            reqwest::Client::new(),
        )
    }

    // -----------------------------------------------------------------------
    // parse_redirect_params
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_redirect_params_access_token() {
        let values = parse_redirect_params("access_token=ABC123&token_type=bearer");
        assert_eq!(values.get("access_token"), Some(&"ABC123".to_string()));
        assert_eq!(values.get("token_type"), Some(&"bearer".to_string()));
    }

    #[test]
    fn test_parse_redirect_params_empty_returns_empty_map() {
        assert!(parse_redirect_params("").is_empty());
    }

    #[test]
    fn test_parse_redirect_params_pair_without_value() {
        let values = parse_redirect_params("error");
        assert_eq!(values.get("error"), Some(&String::new()));
    }

    #[test]
    fn test_parse_redirect_params_decodes_percent_encoding() {
        let values = parse_redirect_params("scope=read%20write");
        assert_eq!(values.get("scope"), Some(&"read write".to_string()));
    }

    #[test]
    fn test_parse_redirect_params_preserves_plus() {
        // Opaque tokens may contain '+'; the trailer is not form-encoded.
        let values = parse_redirect_params("access_token=a+b");
        assert_eq!(values.get("access_token"), Some(&"a+b".to_string()));
    }

    #[test]
    fn test_parse_redirect_params_value_with_equals_sign() {
        // Only the first '=' separates key from value.
        let values = parse_redirect_params("code=abc=def");
        assert_eq!(values.get("code"), Some(&"abc=def".to_string()));
    }

    // -----------------------------------------------------------------------
    // percent_decode
    // -----------------------------------------------------------------------

    #[test]
    fn test_percent_decode_plain_string_unchanged() {
        assert_eq!(percent_decode("hello"), "hello");
    }

    #[test]
    fn test_percent_decode_hex_sequence() {
        assert_eq!(percent_decode("a%20b"), "a b");
    }

    #[test]
    fn test_percent_decode_leaves_plus_alone() {
        assert_eq!(percent_decode("a+b"), "a+b");
    }

    #[test]
    fn test_percent_decode_incomplete_percent_passes_through() {
        assert_eq!(percent_decode("abc%2"), "abc%2");
    }

    #[test]
    fn test_percent_decode_invalid_hex_passes_through() {
        assert_eq!(percent_decode("%zz!"), "%zz!");
    }

    // -----------------------------------------------------------------------
    // match_redirect
    // -----------------------------------------------------------------------

    #[test]
    fn test_match_redirect_extracts_fragment_trailer() {
        let fetcher = make_fetcher();
        let trailer = fetcher
            .match_redirect("https://ext.example/provider_cb#access_token=tok")
            .unwrap();
        assert_eq!(trailer, "access_token=tok");
    }

    #[test]
    fn test_match_redirect_extracts_query_trailer() {
        let fetcher = make_fetcher();
        let trailer = fetcher
            .match_redirect("https://ext.example/provider_cb?code=xyz")
            .unwrap();
        assert_eq!(trailer, "code=xyz");
    }

    #[test]
    fn test_match_redirect_rejects_foreign_host() {
        let fetcher = make_fetcher();
        let err = fetcher
            .match_redirect("https://evil.example/provider_cb#access_token=tok")
            .unwrap_err();
        assert!(err.to_string().contains("Invalid redirect URI"));
    }

    #[test]
    fn test_match_redirect_rejects_bare_callback() {
        // No '#' or '?' trailer at all.
        let fetcher = make_fetcher();
        let err = fetcher
            .match_redirect("https://ext.example/provider_cb")
            .unwrap_err();
        assert!(err.to_string().contains("Invalid redirect URI"));
    }

    #[test]
    fn test_match_redirect_rejects_other_separator() {
        let fetcher = make_fetcher();
        assert!(fetcher
            .match_redirect("https://ext.example/provider_cb/extra")
            .is_err());
    }

    // -----------------------------------------------------------------------
    // auth_url / token_url
    // -----------------------------------------------------------------------

    #[test]
    fn test_auth_url_contains_required_params() {
        let fetcher = make_fetcher();
        let url = fetcher.auth_url().unwrap();

        assert!(url.starts_with("https://provider.example/oauth/authorize?"));
        assert!(url.contains("client_id=test-client"), "missing client_id: {url}");
        assert!(url.contains("response_type=code"), "missing response_type: {url}");
        assert!(
            url.contains("redirect_uri=https%3A%2F%2Fext.example%2Fprovider_cb"),
            "redirect_uri not encoded: {url}"
        );
    }

    #[test]
    fn test_auth_url_does_not_leak_client_secret() {
        let fetcher = make_fetcher();
        let url = fetcher.auth_url().unwrap();
        assert!(!url.contains("test-secret"));
    }

    #[test]
    fn test_auth_url_rejects_invalid_base() {
        let fetcher = TokenFetcher::new(
            FetcherConfig {
                client_id: "c".to_string(),
                client_secret: "s".to_string(),
                base_url: "not a url".to_string(),
            },
            Arc::new(FakeLauncher::new("https://ext.example")),
            Arc::new(MemoryTokenStore::new()),
            reqwest::Client::new(),
        );
        let err = fetcher.auth_url().unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_token_url_appends_oauth_token_path() {
        let fetcher = make_fetcher();
        assert_eq!(fetcher.token_url(), "https://provider.example/oauth/token");
    }

    #[test]
    fn test_token_url_tolerates_trailing_slash() {
        let fetcher = TokenFetcher::new(
            FetcherConfig {
                client_id: "c".to_string(),
                client_secret: "s".to_string(),
                base_url: "https://provider.example/".to_string(),
            },
            Arc::new(FakeLauncher::new("https://ext.example")),
            Arc::new(MemoryTokenStore::new()),
            reqwest::Client::new(),
        );
        assert_eq!(fetcher.token_url(), "https://provider.example/oauth/token");
    }

    // -----------------------------------------------------------------------
    // redirect_uri derivation
    // -----------------------------------------------------------------------

    #[test]
    fn test_redirect_uri_uses_fixed_path() {
        let fetcher = make_fetcher();
        assert_eq!(fetcher.redirect_uri(), "https://ext.example/provider_cb");
    }

    // -----------------------------------------------------------------------
    // TokenResponse deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn test_token_response_with_access_token() {
        let raw: TokenResponse =
            serde_json::from_str(r#"{"access_token":"T1","token_type":"Bearer"}"#).unwrap();
        assert_eq!(raw.access_token.as_deref(), Some("T1"));
    }

    #[test]
    fn test_token_response_without_access_token() {
        let raw: TokenResponse = serde_json::from_str(r#"{"error":"invalid_grant"}"#).unwrap();
        assert!(raw.access_token.is_none());
    }
}
