//! JSON merge helpers for layered configuration.

use serde_json::Value;

/// Keys whose object values are replaced as a whole instead of merged.
const ATOMIC_KEYS: &[&str] = &["concurrency"];

/// Merge overlay values into the base, recursively overriding objects.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if ATOMIC_KEYS.contains(&key.as_str()) {
                    base_map.insert(key.clone(), value.clone());
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => merge_json_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
