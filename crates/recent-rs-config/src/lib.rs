//! Attachment configuration models and layered config loading.
//!
//! This crate owns the JSON5 config schema for recency attachments, its
//! validation and the layer-merging logic used by applications and the demo.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
