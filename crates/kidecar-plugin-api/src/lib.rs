//! # Kidecar Plugin API
//!
//! SDK for writing plugins hosted by the kidecar sidecar.
//!
//! A plugin declares its configuration shape through [`Plugin::Config`]; the
//! host binds the plugin's entry from the sidecar configuration into that
//! type before calling [`Plugin::init`]. [`Plugin::start`] runs as its own
//! task until the [`PluginContext`] is cancelled, and results are persisted
//! through the [`StorageFactory`](kidecar_store::StorageFactory) in
//! [`Capabilities`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use kidecar_plugin_api::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct EchoConfig {
//!     message: String,
//! }
//!
//! #[derive(Debug, Default)]
//! struct EchoPlugin {
//!     message: String,
//! }
//!
//! #[async_trait]
//! impl Plugin for EchoPlugin {
//!     type Config = EchoConfig;
//!
//!     fn name(&self) -> &str { "echo" }
//!     fn version(&self) -> &str { "0.1.0" }
//!
//!     async fn init(&mut self, config: EchoConfig, _caps: Capabilities) -> Result<(), PluginError> {
//!         self.message = config.message;
//!         Ok(())
//!     }
//!
//!     async fn start(&self, ctx: PluginContext) -> Result<(), PluginError> {
//!         ctx.cancelled().await;
//!         Ok(())
//!     }
//!
//!     async fn stop(&self) -> Result<(), PluginError> {
//!         Ok(())
//!     }
//!
//!     async fn status(&self) -> Result<PluginStatus, PluginError> {
//!         Ok(PluginStatus::new(self.name(), self.version()).running(true))
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod capabilities;
pub mod context;
pub mod error;
pub mod plugin;
pub mod status;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export commonly used types
pub use capabilities::{Capabilities, Persistence};
pub use context::{PluginContext, PluginFailure};
pub use error::PluginError;
pub use plugin::{DynPlugin, Plugin, PluginState, TypedPlugin};
pub use status::PluginStatus;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::capabilities::Capabilities;
    pub use crate::context::PluginContext;
    pub use crate::error::PluginError;
    pub use crate::plugin::Plugin;
    pub use crate::status::PluginStatus;
    pub use async_trait::async_trait;
    pub use kidecar_store::{StorageConfig, StorageFactory};
}
