//! Token persistence collaborators
//!
//! The fetcher treats the token as an opaque string credential and persists
//! it through the [`TokenStore`] trait on every successful acquisition.
//! Loading happens once, lazily, to prime the in-memory cache.
//!
//! Two implementations are provided:
//!
//! - [`KeyringTokenStore`] -- stores the token in the OS native credential
//!   store (Keychain on macOS, Secret Service on Linux, Windows Credential
//!   Manager on Windows).
//! - [`MemoryTokenStore`] -- in-memory store for tests and doc examples.

use async_trait::async_trait;

use crate::error::{AuthFetchError, Result};

/// Asynchronous token persistence contract.
///
/// `load_token` distinguishes "no token saved yet" (`Ok(None)`) from a
/// genuine storage failure. `save_token` is fire-and-forget from the
/// fetcher's perspective: a failed save is logged but never fails the token
/// request that produced the token.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the previously saved token, or `None` when absent.
    async fn load_token(&self) -> Result<Option<String>>;

    /// Persists the token, overwriting any previous value.
    async fn save_token(&self, token: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// KeyringTokenStore
// ---------------------------------------------------------------------------

/// Token store backed by the OS native keyring.
///
/// The token is stored under a service name derived from a caller-supplied
/// account identifier, so multiple fetcher instances with distinct accounts
/// do not collide.
///
/// # Examples
///
/// ```no_run
/// use authfetch::store::{KeyringTokenStore, TokenStore};
///
/// # async fn example() -> authfetch::Result<()> {
/// let store = KeyringTokenStore::new("my_provider");
/// store.save_token("opaque_token").await?;
/// let loaded = store.load_token().await?;
/// assert_eq!(loaded.as_deref(), Some("opaque_token"));
/// # Ok(())
/// # }
/// ```
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    /// Creates a store scoped to the given account identifier.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    /// Builds the keyring service name for this account.
    ///
    /// The name is prefixed with `authfetch-` to avoid collisions with other
    /// applications that use the same keyring.
    fn service_name(&self) -> String {
        format!("authfetch-{}", self.account)
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn load_token(&self) -> Result<Option<String>> {
        let service = self.service_name();
        let entry = keyring::Entry::new(&service, &self.account).map_err(AuthFetchError::Keyring)?;

        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthFetchError::Keyring(e).into()),
        }
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        let service = self.service_name();
        let entry = keyring::Entry::new(&service, &self.account).map_err(AuthFetchError::Keyring)?;
        entry.set_password(token).map_err(AuthFetchError::Keyring)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-memory [`TokenStore`] for tests and doc examples.
///
/// # Examples
///
/// ```
/// use authfetch::store::{MemoryTokenStore, TokenStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryTokenStore::new();
/// assert!(store.load_token().await.unwrap().is_none());
///
/// store.save_token("tok").await.unwrap();
/// assert_eq!(store.load_token().await.unwrap().as_deref(), Some("tok"));
/// # }
/// ```
#[derive(Default)]
pub struct MemoryTokenStore {
    token: tokio::sync::Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a token, for cache-priming tests.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: tokio::sync::Mutex::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load_token(&self) -> Result<Option<String>> {
        Ok(self.token.lock().await.clone())
    }

    async fn save_token(&self, token: &str) -> Result<()> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // MemoryTokenStore
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_memory_store_starts_empty() {
        let store = MemoryTokenStore::new();
        assert!(store.load_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_save_then_load() {
        let store = MemoryTokenStore::new();
        store.save_token("abc").await.unwrap();
        assert_eq!(store.load_token().await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_memory_store_save_overwrites() {
        let store = MemoryTokenStore::with_token("old");
        store.save_token("new").await.unwrap();
        assert_eq!(store.load_token().await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_memory_store_with_token_preseeds() {
        let store = MemoryTokenStore::with_token("seeded");
        assert_eq!(store.load_token().await.unwrap().as_deref(), Some("seeded"));
    }

    // -----------------------------------------------------------------------
    // service_name helper
    // -----------------------------------------------------------------------

    #[test]
    fn test_service_name_has_correct_prefix() {
        let store = KeyringTokenStore::new("my_provider");
        assert_eq!(store.service_name(), "authfetch-my_provider");
    }

    #[test]
    fn test_service_name_is_unique_per_account() {
        let a = KeyringTokenStore::new("account_a");
        let b = KeyringTokenStore::new("account_b");
        assert_ne!(a.service_name(), b.service_name());
    }

    // -----------------------------------------------------------------------
    // Keyring integration tests  (require system keyring; skipped in CI)
    // -----------------------------------------------------------------------

    #[tokio::test]
    #[ignore = "requires system keyring"]
    async fn test_keyring_save_and_load_roundtrip() {
        let store = KeyringTokenStore::new("authfetch_integration_test");

        store.save_token("integration_token").await.expect("save");
        let loaded = store.load_token().await.expect("load");
        assert_eq!(loaded.as_deref(), Some("integration_token"));
    }

    #[tokio::test]
    #[ignore = "requires system keyring"]
    async fn test_keyring_load_returns_none_when_absent() {
        let store = KeyringTokenStore::new("definitely_nonexistent_authfetch_account");
        let result = store.load_token().await.expect("should not error");
        assert!(result.is_none());
    }
}
