//! Layered configuration loader.
//!
//! Reads JSON5 layers from disk, validates each against the schema, merges
//! them low to high precedence and produces the final `RecentConfig`.

mod layer_io;
mod merge;
mod schema;


use crate::{ConfigError, RecentConfig};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: RecentConfig,
    /// Metadata for each layer that contributed to the config.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Optional file, skipped when missing.
    File,
    /// Runtime override that must exist (highest precedence).
    Runtime,
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Options controlling which layers are loaded.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfigOptions {
    /// Optional layers, lowest precedence first.
    pub paths: Vec<PathBuf>,
    /// Required override layers applied last.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an optional layer above the ones already added.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Add a runtime override layer that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl RecentConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load optional layers in order; later paths override earlier ones.
    pub fn load_layered<I, P>(paths: I) -> Result<LayeredConfig, ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let options = paths
            .into_iter()
            .fold(LayeredConfigOptions::new(), |options, path| {
                options.with_path(path)
            });
        Self::load_layered_with_options(options)
    }

    /// Load a layered config stack.
    ///
    /// Layer precedence (low -> high): optional paths in order, then runtime
    /// overrides in order. Attachment options merge field by field across
    /// layers; a `concurrency` block is replaced as a whole.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let mut layers = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());

        for path in &options.paths {
            if let Some(layer) = layer_io::load_optional_layer(ConfigLayerSource::File, path)? {
                merge::merge_json_values(&mut merged, &layer.value);
                layers.push(layer.meta);
            }
        }
        for path in &options.runtime_paths {
            let layer = layer_io::load_required_layer(ConfigLayerSource::Runtime, path)?;
            debug!("loaded runtime layer (path={})", path.display());
            merge::merge_json_values(&mut merged, &layer.value);
            layers.push(layer.meta);
        }

        let config = config_from_value(merged, "effective")?;
        info!(
            "layered config loaded (layers={}, attachments={})",
            layers.len(),
            config.attachments.len()
        );
        Ok(LayeredConfig { config, layers })
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<RecentConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: RecentConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
