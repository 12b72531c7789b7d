//! Deploy-time configuration of the cache controller

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CacheError, CacheResult};
use crate::origin::Scope;

/// Version identifier of the shipped cache generation
pub const DEFAULT_VERSION_ID: &str = "arslan-hub-v1.0.0";

/// Base URL used when none is configured
pub const DEFAULT_SCOPE: &str = "https://localhost/";

/// Entry document served for offline navigations
pub const DEFAULT_SHELL_DOCUMENT: &str = "./index.html";

/// Files needed to render the shell offline
pub const DEFAULT_CORE_ASSETS: &[&str] = &[
    "./",
    "./index.html",
    "./manifest.webmanifest",
    "./icon-192.png",
    "./icon-512.png",
];

const DEFAULT_INSTALL_TIMEOUT_MS: u64 = 30_000;

/// Controller configuration.
///
/// `version_id` must change with every deployment that changes a core asset
/// or caching behaviour, otherwise clients keep serving the old generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Name of the cache generation owned by this deployment
    pub version_id: String,
    /// Absolute base URL of the application
    pub scope: String,
    /// Paths fetched and cached at install time, in order
    pub core_assets: Vec<String>,
    /// Key under which the navigation fallback document is stored
    pub shell_document_path: String,
    /// Per-asset fetch timeout during install; `None` waits forever
    pub install_timeout_ms: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            version_id: DEFAULT_VERSION_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            core_assets: DEFAULT_CORE_ASSETS.iter().map(|s| s.to_string()).collect(),
            shell_document_path: DEFAULT_SHELL_DOCUMENT.to_string(),
            install_timeout_ms: Some(DEFAULT_INSTALL_TIMEOUT_MS),
        }
    }
}

impl ControllerConfig {
    /// Default configuration for a given version and scope
    pub fn new(version_id: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Replace the core asset list
    pub fn with_core_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Set the shell document path
    pub fn with_shell_document(mut self, path: impl Into<String>) -> Self {
        self.shell_document_path = path.into();
        self
    }

    /// Set the install timeout
    pub fn with_install_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.install_timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Install timeout as a duration
    pub fn install_timeout(&self) -> Option<Duration> {
        self.install_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> CacheResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that the configuration is usable and return the parsed scope
    pub fn validate(&self) -> CacheResult<Scope> {
        if self.version_id.trim().is_empty() {
            return Err(CacheError::InvalidConfig(
                "version_id must not be empty".to_string(),
            ));
        }

        let scope = Scope::new(&self.scope)?;

        let paths = self
            .core_assets
            .iter()
            .chain(std::iter::once(&self.shell_document_path));
        for path in paths {
            let url = scope.resolve(path)?;
            if !scope.is_same_origin_url(&url) {
                return Err(CacheError::InvalidConfig(format!(
                    "'{}' is not same-origin with '{}'",
                    path,
                    scope.origin()
                )));
            }
        }

        if self.install_timeout_ms == Some(0) {
            return Err(CacheError::InvalidConfig(
                "install_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(scope)
    }
}
