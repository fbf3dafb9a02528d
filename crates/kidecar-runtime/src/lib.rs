//! # Kidecar Runtime
//!
//! The plugin host that runs inside the kidecar sidecar container.
//!
//! ## Features
//!
//! - **Registry**: plugins are bound to their configuration entry and
//!   initialized before being registered
//! - **Lifecycle**: all plugins start concurrently; the first runtime error
//!   stops the host
//! - **Status polling**: each plugin is polled periodically and the latest
//!   status is cached
//! - **Liveness**: optional `/healthz` endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use kidecar_plugin_api::Capabilities;
//! use kidecar_runtime::{SidecarHost, SignalHandler};
//! use kidecar_store::{KubeClusterClient, StorageFactory, StoreContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> kidecar_runtime::Result<()> {
//! let ctx = StoreContext::new(Arc::new(KubeClusterClient::new()));
//! let caps = Capabilities::new(Arc::new(StorageFactory::new(ctx)));
//! let host = SidecarHost::load("/opt/kidecar/config.yaml", caps)?;
//!
//! // host.register(MyPlugin::default()).await?;
//!
//! tokio::spawn(SignalHandler::new(host.shutdown_token()).run());
//! let result = host.start().await;
//! host.stop_all().await?;
//! host.shutdown().await;
//! result
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod host;
mod registry;
pub mod server;
pub mod shutdown;

pub use error::{HostError, Result};
pub use host::SidecarHost;
pub use server::{healthz_router, HEALTHZ_BODY, HEALTHZ_PATH};
pub use shutdown::SignalHandler;

// Re-export plugin API types for convenience
pub use kidecar_plugin_api::{
    Capabilities, DynPlugin, Plugin, PluginContext, PluginError, PluginState, PluginStatus,
    TypedPlugin,
};

/// Host version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
