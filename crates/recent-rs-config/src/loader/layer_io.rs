//! IO helpers for reading config layers from disk.

use super::{ConfigLayer, ConfigLayerSource, LoadedLayer, schema};
use crate::ConfigError;
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load an optional layer if the provided path exists.
pub(super) fn load_optional_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<Option<LoadedLayer>, ConfigError> {
    if !path.exists() {
        debug!(
            "optional layer missing (source={:?}, path={})",
            source,
            path.display()
        );
        return Ok(None);
    }
    Ok(Some(load_required_layer(source, path)?))
}

/// Load and validate a required layer from disk.
pub(super) fn load_required_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    debug!(
        "loading config layer (source={:?}, path={})",
        source,
        path.display()
    );
    let contents = fs::read_to_string(path)?;
    let value: Value = json5::from_str(&contents)?;
    schema::validate_layer_schema(&value, &layer_label(source, path))?;
    Ok(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: path.to_path_buf(),
        },
        value,
    })
}

/// Build a user-friendly label for schema validation errors.
fn layer_label(source: ConfigLayerSource, path: &Path) -> String {
    let name = match source {
        ConfigLayerSource::File => "file",
        ConfigLayerSource::Runtime => "runtime",
    };
    format!("{name}({})", path.display())
}
