//! Offline cache controller for an application shell
//!
//! Serves the shell document and its static assets while the network is
//! unavailable, using one versioned cache generation per deployment.
//! Navigations are network-first with the stored shell as fallback, static
//! assets are cache-first, and activating a new generation deletes every
//! older one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use offline_cache::{
//!     CacheController, ControllerConfig, FetchHandler, FetchRequest, GenerationRegistry,
//!     StaticNetwork,
//! };
//!
//! # async fn run() -> offline_cache::CacheResult<()> {
//! let registry = Arc::new(GenerationRegistry::in_memory());
//! let network = Arc::new(StaticNetwork::new());
//! let config = ControllerConfig::new("v2.0.0", "https://hub.example/");
//!
//! let controller = CacheController::new(config, registry, network)?;
//! controller.start().await?;
//! let outcome = controller.handle(FetchRequest::navigate("https://hub.example/")).await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod clients;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod file_storage;
pub mod network;
pub mod origin;
pub mod registry;
pub mod request;
pub mod storage;

pub use clients::Clients;
pub use config::ControllerConfig;
pub use controller::{ActivateOutcome, CacheController, ControllerState, InstallOutcome};
pub use error::{CacheError, CacheResult};
pub use fetch::{FetchHandler, FetchOutcome};
pub use file_storage::FileCacheStorage;
pub use network::{Network, NetworkError, StaticNetwork};
pub use origin::{OriginError, Scope};
pub use registry::GenerationRegistry;
pub use request::{
    FetchRequest, FetchResponse, RequestKey, RequestMethod, RequestMode, ResponseType,
};
pub use storage::{CacheStorage, MemoryCacheStorage};
