//! The offline cache controller and its lifecycle
//!
//! A controller owns one cache generation, named after its configured
//! version identifier. Its lifecycle is linear:
//!
//! 1. **install** fetches every core asset and stores them in the generation.
//!    Any failure discards the attempt and leaves the current generation alone.
//! 2. **activate** deletes every other generation, publishes this one as
//!    current and claims the open pages.
//! 3. **serving**: fetches are dispatched by [`crate::fetch::FetchHandler`].

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::clients::Clients;
use crate::config::ControllerConfig;
use crate::error::{CacheError, CacheResult};
use crate::network::Network;
use crate::origin::Scope;
use crate::registry::GenerationRegistry;
use crate::request::{FetchRequest, FetchResponse, RequestKey};

/// Controller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// Created, nothing installed yet
    Parsed,
    /// Core assets are being fetched
    Installing,
    /// Generation populated, ready to activate
    Installed,
    /// Stale generations are being removed
    Activating,
    /// Serving fetches from the current generation
    Activated,
    /// Install or activation failed, or a newer generation took over
    Redundant,
}

impl ControllerState {
    /// Check if this state allows fetch interception
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, ControllerState::Activated)
    }

    /// Check if the controller is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Redundant)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Parsed => write!(f, "parsed"),
            ControllerState::Installing => write!(f, "installing"),
            ControllerState::Installed => write!(f, "installed"),
            ControllerState::Activating => write!(f, "activating"),
            ControllerState::Activated => write!(f, "activated"),
            ControllerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Result of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Generation that was populated
    pub version_id: String,
    /// Number of core assets stored
    pub cached: usize,
    /// Activation may proceed without waiting for open pages to close
    pub skip_waiting: bool,
}

/// Result of a successful activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateOutcome {
    /// Generation that became current
    pub version_id: String,
    /// Stale generations that were deleted
    pub deleted: Vec<String>,
    /// Open pages that were claimed
    pub claimed: usize,
}

/// The offline cache controller
pub struct CacheController {
    pub(crate) config: ControllerConfig,
    pub(crate) scope: Scope,
    pub(crate) shell_key: RequestKey,
    pub(crate) registry: Arc<GenerationRegistry>,
    pub(crate) network: Arc<dyn Network>,
    clients: Arc<Clients>,
    state: RwLock<ControllerState>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheController {
    /// Create a controller for `config`.
    ///
    /// Several controllers (one per deployment) may share a registry; only the
    /// one whose generation is current serves fetches.
    pub fn new(
        config: ControllerConfig,
        registry: Arc<GenerationRegistry>,
        network: Arc<dyn Network>,
    ) -> CacheResult<Self> {
        let scope = config.validate()?;
        let shell_key = RequestKey::get(&scope.resolve(&config.shell_document_path)?);
        Ok(Self {
            config,
            scope,
            shell_key,
            registry,
            network,
            clients: Arc::new(Clients::new()),
            state: RwLock::new(ControllerState::Parsed),
            background: Mutex::new(Vec::new()),
        })
    }

    /// Share a client set with other controllers of the same scope
    pub fn with_clients(mut self, clients: Arc<Clients>) -> Self {
        self.clients = clients;
        self
    }

    /// The configured version identifier
    pub fn version_id(&self) -> &str {
        &self.config.version_id
    }

    /// The configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The controller's scope
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Cache key of the shell document
    pub fn shell_key(&self) -> &RequestKey {
        &self.shell_key
    }

    /// The generation registry
    pub fn registry(&self) -> &Arc<GenerationRegistry> {
        &self.registry
    }

    /// The open pages
    pub fn clients(&self) -> &Arc<Clients> {
        &self.clients
    }

    /// Get the current state
    pub fn state(&self) -> ControllerState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, new_state: ControllerState) {
        let mut state = self.state.write();
        if *state != new_state {
            log::debug!(
                "Controller {}: {} -> {}",
                self.config.version_id,
                *state,
                new_state
            );
            *state = new_state;
        }
    }

    /// Install the generation: fetch and store every core asset.
    ///
    /// Installing an already active generation repopulates it in place and
    /// keeps serving. Any other failed install leaves the controller
    /// redundant; a later `install` may retry.
    pub async fn install(&self) -> CacheResult<InstallOutcome> {
        let state = self.state();
        if matches!(state, ControllerState::Installing | ControllerState::Activating) {
            return Err(CacheError::InvalidState {
                expected: "not installing or activating",
                actual: state,
            });
        }

        let serving = state == ControllerState::Activated;
        if !serving {
            self.set_state(ControllerState::Installing);
        }

        match self.populate().await {
            Ok(cached) => {
                if !serving {
                    self.set_state(ControllerState::Installed);
                }
                log::info!(
                    "Installed cache generation {} ({} core assets)",
                    self.config.version_id,
                    cached
                );
                Ok(InstallOutcome {
                    version_id: self.config.version_id.clone(),
                    cached,
                    skip_waiting: true,
                })
            }
            Err(err) => {
                if !serving {
                    self.set_state(ControllerState::Redundant);
                }
                log::warn!(
                    "Install of cache generation {} failed: {}",
                    self.config.version_id,
                    err
                );
                Err(err)
            }
        }
    }

    async fn populate(&self) -> CacheResult<usize> {
        let mut entries = Vec::with_capacity(self.config.core_assets.len());
        for path in &self.config.core_assets {
            let url = self.scope.resolve(path)?;
            let response = self.fetch_core_asset(&url).await?;
            entries.push((RequestKey::get(&url), response));
        }

        let storage = self.registry.storage();
        let name = self.config.version_id.as_str();
        let existed = storage.has(name).await?;
        storage.open(name).await?;

        let cached = entries.len();
        if let Err(err) = storage.put_all(name, entries).await {
            if !existed {
                if let Err(cleanup) = storage.delete(name).await {
                    log::warn!("Could not discard cache generation {}: {}", name, cleanup);
                }
            }
            return Err(err);
        }
        Ok(cached)
    }

    async fn fetch_core_asset(&self, url: &str) -> CacheResult<FetchResponse> {
        let request = FetchRequest::get(url);
        let fetch = self.network.fetch(&request);
        let result = match self.config.install_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, fetch)
                .await
                .map_err(|_| CacheError::InstallTimeout {
                    url: url.to_string(),
                })?,
            None => fetch.await,
        };

        let response = result.map_err(|err| CacheError::InstallFailed {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !response.ok() {
            return Err(CacheError::InstallFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status),
            });
        }
        Ok(response)
    }

    /// Activate the installed generation.
    ///
    /// Stale generations are deleted before the generation is published as
    /// current and before any page is claimed.
    pub async fn activate(&self) -> CacheResult<ActivateOutcome> {
        let state = self.state();
        if !matches!(state, ControllerState::Installed | ControllerState::Activated) {
            return Err(CacheError::InvalidState {
                expected: "installed",
                actual: state,
            });
        }

        self.set_state(ControllerState::Activating);
        let version_id = self.config.version_id.as_str();

        let deleted = match self.registry.retain_only(version_id).await {
            Ok(deleted) => deleted,
            Err(err) => {
                self.set_state(ControllerState::Redundant);
                log::warn!("Activation of cache generation {} failed: {}", version_id, err);
                return Err(err);
            }
        };

        self.registry.publish(version_id);
        let claimed = self.clients.claim(version_id);
        self.set_state(ControllerState::Activated);

        log::info!(
            "Activated cache generation {} (deleted {} stale, claimed {} clients)",
            version_id,
            deleted.len(),
            claimed
        );
        Ok(ActivateOutcome {
            version_id: version_id.to_string(),
            deleted,
            claimed,
        })
    }

    /// Install and activate immediately
    pub async fn start(&self) -> CacheResult<ActivateOutcome> {
        self.install().await?;
        self.activate().await
    }

    /// Resume serving a generation installed by an earlier run.
    ///
    /// Succeeds only if the generation exists in storage and holds every core
    /// asset; returns `Ok(false)` otherwise, in which case [`Self::start`]
    /// must be used.
    pub async fn resume(&self) -> CacheResult<bool> {
        let storage = self.registry.storage();
        let name = self.config.version_id.as_str();
        if !storage.has(name).await? {
            return Ok(false);
        }

        let stored = storage.entries(name).await?;
        for path in &self.config.core_assets {
            let key = RequestKey::get(&self.scope.resolve(path)?);
            if !stored.contains(&key) {
                log::debug!("Cache generation {} is missing {}", name, key);
                return Ok(false);
            }
        }

        self.set_state(ControllerState::Installed);
        self.activate().await?;
        Ok(true)
    }

    /// Whether this controller's generation is the current one
    pub fn is_current(&self) -> bool {
        self.registry.is_current(&self.config.version_id)
    }

    /// Store a response in the background. The caller never waits for the
    /// write; failures are logged and dropped.
    ///
    /// The write is a detached task: it completes even if the controller is
    /// dropped first. Handles are kept only so [`Self::settle`] can wait.
    pub(crate) fn spawn_write(&self, key: RequestKey, response: FetchResponse) {
        let registry = Arc::clone(&self.registry);
        let generation = self.config.version_id.clone();

        let handle = tokio::spawn(async move {
            match registry.storage().put(&generation, key.clone(), response).await {
                Ok(()) => log::debug!("Cached {} in {}", key, generation),
                Err(err) => log::warn!("Background cache write of {} failed: {}", key, err),
            }
        });

        let mut background = self.background.lock();
        background.retain(|pending| !pending.is_finished());
        background.push(handle);
    }

    /// Wait for every background cache write issued so far
    pub async fn settle(&self) {
        let pending = std::mem::take(&mut *self.background.lock());
        for handle in pending {
            if let Err(err) = handle.await {
                log::warn!("Background cache write task failed: {}", err);
            }
        }
    }
}

impl fmt::Debug for CacheController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheController")
            .field("version_id", &self.config.version_id)
            .field("scope", &self.scope.base())
            .field("state", &self.state())
            .finish()
    }
}
