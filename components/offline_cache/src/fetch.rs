//! Fetch interception
//!
//! Dispatch policy of an activated controller:
//!
//! - cross-origin requests pass through untouched
//! - navigations are network-first; a live response refreshes the stored
//!   shell document and the stored shell is the offline fallback
//! - GET subresources are cache-first; successful network responses are
//!   cached in the background
//! - other methods always go to the network and are never cached
//!
//! When neither the network nor the cache can answer, the page receives a
//! network error response.

use async_trait::async_trait;

use crate::controller::{CacheController, ControllerState};
use crate::request::{FetchRequest, FetchResponse, RequestKey, RequestMethod};

/// What the controller did with an intercepted request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Answer the page with this response
    Respond(FetchResponse),
    /// Not handled; the host performs its default network fetch
    Passthrough,
}

impl FetchOutcome {
    /// The response, if the request was handled
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            FetchOutcome::Respond(response) => Some(response),
            FetchOutcome::Passthrough => None,
        }
    }

    /// Whether the request was left to the host
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchOutcome::Passthrough)
    }
}

/// Something that can intercept fetches issued by a page
#[async_trait]
pub trait FetchHandler: Send + Sync {
    /// Handle one intercepted request
    async fn handle(&self, request: FetchRequest) -> FetchOutcome;
}

#[async_trait]
impl FetchHandler for CacheController {
    async fn handle(&self, request: FetchRequest) -> FetchOutcome {
        if !self.state().can_intercept_fetch() {
            return FetchOutcome::Passthrough;
        }
        if !self.is_current() {
            // A newer generation was activated by another controller
            self.set_state(ControllerState::Redundant);
            return FetchOutcome::Passthrough;
        }
        if !self.scope.is_same_origin_url(&request.url) {
            return FetchOutcome::Passthrough;
        }

        if request.is_navigation() {
            self.network_first(request).await
        } else if request.method == RequestMethod::Get {
            self.cache_first(request).await
        } else {
            self.network_only(request).await
        }
    }
}

impl CacheController {
    fn request_key(&self, request: &FetchRequest) -> RequestKey {
        match self.scope.resolve(&request.url) {
            Ok(url) => RequestKey::new(request.method, &url),
            Err(_) => request.key(),
        }
    }

    async fn lookup(&self, key: &RequestKey) -> Option<FetchResponse> {
        match self.registry.lookup(key).await {
            Ok(found) => found,
            Err(err) => {
                log::warn!("Cache lookup of {} failed: {}", key, err);
                None
            }
        }
    }

    async fn network_first(&self, request: FetchRequest) -> FetchOutcome {
        match self.network.fetch(&request).await {
            Ok(response) => {
                self.spawn_write(self.shell_key.clone(), response.clone());
                FetchOutcome::Respond(response)
            }
            Err(err) => {
                log::debug!("Navigation to {} failed ({}), serving shell", request.url, err);
                let shell = self.lookup(&self.shell_key).await;
                FetchOutcome::Respond(shell.unwrap_or_else(FetchResponse::error))
            }
        }
    }

    async fn cache_first(&self, request: FetchRequest) -> FetchOutcome {
        let key = self.request_key(&request);
        if let Some(cached) = self.lookup(&key).await {
            log::debug!("Cache hit: {}", key);
            return FetchOutcome::Respond(cached);
        }

        log::debug!("Cache miss: {}", key);
        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.ok() {
                    self.spawn_write(key, response.clone());
                }
                FetchOutcome::Respond(response)
            }
            Err(err) => {
                log::debug!("Fetch of {} failed: {}", key, err);
                FetchOutcome::Respond(FetchResponse::error())
            }
        }
    }

    async fn network_only(&self, request: FetchRequest) -> FetchOutcome {
        match self.network.fetch(&request).await {
            Ok(response) => FetchOutcome::Respond(response),
            Err(err) => {
                log::debug!("{} {} failed: {}", request.method, request.url, err);
                FetchOutcome::Respond(FetchResponse::error())
            }
        }
    }
}
