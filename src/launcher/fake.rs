//! In-process fake launcher for unit and integration tests
//!
//! [`FakeLauncher`] replaces a real host identity binding in tests. It
//! records every [`FlowOptions`] it is launched with and serves queued
//! responses, so tests can both assert on the authorization URL the fetcher
//! built and script the redirect URI (or host error) the flow resolves with.
//!
//! # Usage
//!
//! Queue a response with [`FakeLauncher::push_response`], wire the launcher
//! into the code under test, then inspect [`FakeLauncher::launch_count`] and
//! [`FakeLauncher::last_options`]:
//!
//! ```
//! use std::sync::Arc;
//! use authfetch::launcher::{FlowOptions, WebAuthLauncher};
//! use authfetch::launcher::fake::FakeLauncher;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let launcher = Arc::new(FakeLauncher::new("https://ext.example"));
//! assert_eq!(launcher.redirect_url("provider_cb"), "https://ext.example/provider_cb");
//!
//! launcher
//!     .push_response(Ok("https://ext.example/provider_cb#access_token=tok".to_string()))
//!     .await;
//!
//! let options = FlowOptions {
//!     url: "https://provider.example/oauth/authorize".to_string(),
//!     interactive: true,
//! };
//! let redirect = launcher.launch(&options).await.unwrap();
//! assert!(redirect.contains("access_token"));
//! assert_eq!(launcher.launch_count().await, 1);
//! # }
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::error::Result;
use crate::launcher::{FlowOptions, WebAuthLauncher};

/// Scriptable [`WebAuthLauncher`] for use in tests.
///
/// `launch` pops the next queued response; when the queue is empty it waits
/// until one is pushed, which lets tests hold a flow open while asserting on
/// in-flight behavior.
pub struct FakeLauncher {
    /// Base URL used to derive callback URLs, standing in for the host's
    /// extension origin.
    base: String,

    /// Responses served to `launch` calls, oldest first.
    responses: Mutex<VecDeque<Result<String>>>,

    /// Every options value `launch` was called with, in order.
    launches: Mutex<Vec<FlowOptions>>,

    /// Wakes a waiting `launch` when a response is pushed.
    notify: Notify,
}

impl FakeLauncher {
    /// Creates a fake launcher whose callback URLs are rooted at `base`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            responses: Mutex::new(VecDeque::new()),
            launches: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    /// Queues the result the next `launch` call will resolve with.
    pub async fn push_response(&self, response: Result<String>) {
        self.responses.lock().await.push_back(response);
        self.notify.notify_one();
    }

    /// Returns how many times `launch` has been called.
    pub async fn launch_count(&self) -> usize {
        self.launches.lock().await.len()
    }

    /// Returns the options of the most recent `launch` call, if any.
    pub async fn last_options(&self) -> Option<FlowOptions> {
        self.launches.lock().await.last().cloned()
    }
}

#[async_trait]
impl WebAuthLauncher for FakeLauncher {
    fn redirect_url(&self, path: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), path)
    }

    async fn launch(&self, options: &FlowOptions) -> Result<String> {
        self.launches.lock().await.push(options.clone());
        loop {
            if let Some(response) = self.responses.lock().await.pop_front() {
                return response;
            }
            // Notify stores a permit, so a push racing with this wait still
            // wakes us immediately.
            self.notify.notified().await;
        }
    }
}
