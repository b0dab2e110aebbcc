//! Error types for authfetch
//!
//! This module defines all error types used by the token fetcher, using
//! `thiserror` for ergonomic error handling. Every failure mode surfaces to
//! the caller exactly once per `get_token` call; nothing is retried and
//! nothing is fatal to the process.

use thiserror::Error;

/// Main error type for token fetch operations
///
/// The variants map one-to-one onto the failure modes of a single token
/// request: the host flow itself, redirect validation, the parsed redirect
/// parameters, and the code-exchange POST.
#[derive(Error, Debug)]
pub enum AuthFetchError {
    /// Configuration-related errors (invalid base URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The host web auth flow reported an error or the user cancelled
    #[error("Web auth flow failed: {0}")]
    HostFlow(String),

    /// The redirect URI did not match the expected callback endpoint
    #[error("Invalid redirect URI: {0}")]
    RedirectMismatch(String),

    /// Neither an access token nor an authorization code was delivered
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The code-exchange POST failed at the transport level or returned a
    /// non-success status
    #[error("Code exchange failed: {0}")]
    Exchange(String),

    /// A token request was made while another flow is still in flight
    #[error("Token request already in progress")]
    FlowInProgress,

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for authfetch operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
