//! Schema validation helpers for recency JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

const OPTION_KEYS: &[&str] = &[
    "name",
    "timestamp_field",
    "capacity",
    "allow_duplicates",
    "list_field",
    "operation_name",
    "naming",
    "concurrency",
];

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(map, &["$schema", "defaults", "attachments"], layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("defaults") {
        validate_options(value, layer, "defaults")?;
    }
    if let Some(value) = map.get("attachments") {
        let attachments = expect_object(value, layer, "attachments")?;
        for (key, options) in attachments {
            validate_options(options, layer, &join_path("attachments", key))?;
        }
    }
    Ok(())
}

/// Validate one sparse options block.
fn validate_options(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, OPTION_KEYS, layer, path)?;

    for key in ["name", "timestamp_field", "list_field", "operation_name"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("capacity") {
        expect_integer(value, layer, &join_path(path, "capacity"))?;
    }
    if let Some(value) = map.get("allow_duplicates") {
        expect_bool(value, layer, &join_path(path, "allow_duplicates"))?;
    }
    if let Some(value) = map.get("naming") {
        expect_one_of(value, &["camel", "snake"], layer, &join_path(path, "naming"))?;
    }
    if let Some(value) = map.get("concurrency") {
        validate_concurrency(value, layer, &join_path(path, "concurrency"))?;
    }
    Ok(())
}

/// Validate a concurrency guard block.
fn validate_concurrency(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["mode", "max_retries"], layer, path)?;

    let mode_path = join_path(path, "mode");
    let mode = map
        .get("mode")
        .ok_or_else(|| invalid_field(layer, &mode_path, "missing required field"))?;
    expect_one_of(mode, &["none", "optimistic", "serialized"], layer, &mode_path)?;

    if let Some(value) = map.get("max_retries") {
        let retries_path = join_path(path, "max_retries");
        if mode.as_str() != Some("optimistic") {
            return Err(invalid_field(
                layer,
                &retries_path,
                "only valid with optimistic mode",
            ));
        }
        if value.as_u64().is_none() {
            return Err(invalid_field(
                layer,
                &retries_path,
                "expected non-negative integer",
            ));
        }
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a JSON boolean or return a typed error.
fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a JSON integer or return a typed error.
fn expect_integer(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_i64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected integer"))
    }
}

/// Expect one of a fixed set of strings.
fn expect_one_of(
    value: &Value,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match value.as_str() {
        Some(value) if allowed.contains(&value) => Ok(()),
        _ => Err(invalid_field(
            layer,
            path,
            &format!("expected one of {}", allowed.join(", ")),
        )),
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
