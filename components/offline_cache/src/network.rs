//! Network access supplied by the hosting runtime

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::request::{FetchRequest, FetchResponse};

/// Transport-level fetch failures. HTTP error statuses are not errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// No connectivity at all
    #[error("Network error: offline")]
    Offline,
    /// The request could not be completed (DNS, connection reset, ...)
    #[error("Network error: request to '{url}' failed: {reason}")]
    Failed { url: String, reason: String },
}

/// The default network path of the host.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Perform a request against the network, bypassing the controller
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError>;
}

/// A scripted network with fixed routes.
///
/// Unknown URLs answer 404. The network can be switched offline, individual
/// URLs can be made to fail at the transport level, and every fetch attempt
/// is counted, including attempts made while offline.
#[derive(Debug, Default)]
pub struct StaticNetwork {
    routes: RwLock<HashMap<String, FetchResponse>>,
    failing: RwLock<HashSet<String>>,
    offline: AtomicBool,
    delay: RwLock<Option<Duration>>,
    calls: RwLock<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl StaticNetwork {
    /// Create an online network with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `url`
    pub fn route(&self, url: impl Into<String>, response: FetchResponse) {
        self.routes.write().insert(url.into(), response);
    }

    /// Builder form of [`StaticNetwork::route`]
    pub fn with_route(self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.route(url, response);
        self
    }

    /// Make requests to `url` fail at the transport level
    pub fn fail(&self, url: impl Into<String>) {
        self.failing.write().insert(url.into());
    }

    /// Switch connectivity
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Delay every response by `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Total fetch attempts
    pub fn call_count(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Fetch attempts for a single URL
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.read().get(url).copied().unwrap_or(0)
    }

    /// Forget recorded fetch attempts
    pub fn reset_calls(&self) {
        self.calls.write().clear();
        self.total_calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.write().entry(request.url.clone()).or_insert(0) += 1;

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }
        if self.failing.read().contains(&request.url) {
            return Err(NetworkError::Failed {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            });
        }

        let response = self
            .routes
            .read()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::new(404, Vec::new()));
        Ok(response.with_url(request.url.clone()))
    }
}
