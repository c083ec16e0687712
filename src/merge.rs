//! Merging of JSON-shaped option trees.

use serde_json::{Map, Value};

/// Recursively fills `target` with everything from `defaults` it lacks.
///
/// A key counts as missing when it is absent or `null`.  Where both sides
/// hold objects the merge descends; any other value already present in
/// `target` wins.  Keys of `target` keep their order, missing defaults are
/// appended in the order they appear in `defaults`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let mut options = json!({ "config": { "dsn": "x" } });
/// sentry_log_transport::defaults_deep(
///     &mut options,
///     &json!({ "silent": false, "config": { "dsn": "", "logger": "app" } }),
/// );
/// assert_eq!(
///     options,
///     json!({ "config": { "dsn": "x", "logger": "app" }, "silent": false })
/// );
/// ```
pub fn defaults_deep(target: &mut Value, defaults: &Value) {
    if target.is_null() {
        *target = defaults.clone();
        return;
    }
    if let (Value::Object(target), Value::Object(defaults)) = (target, defaults) {
        for (key, default) in defaults {
            match target.get_mut(key) {
                Some(existing) if !existing.is_null() => defaults_deep(existing, default),
                _ => {
                    target.insert(key.clone(), default.clone());
                }
            }
        }
    }
}

/// Copies entries of `source` into `target` for keys `target` does not have.
pub fn fill_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}
