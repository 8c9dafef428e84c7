//! Layering of a primary configuration tree over its fallback.
//!
//! Only mappings are combined. Any other value in the primary tree shadows the
//! fallback's value at the same path, so arrays are never concatenated.

use serde_json::Value;

/// Layer `primary` over `fallback`.
///
/// Keys present in both mappings are layered again one level down. A null in
/// `primary` means "unset" and leaves the fallback's value visible.
///
/// # Example
/// ```
/// use serde_json::json;
/// use confwatch::tree::deep_merge;
///
/// let shipped = json!({"log": {"level": "info", "file": "app.log"}, "workers": 4});
/// let site = json!({"log": {"level": "debug"}, "workers": null});
/// assert_eq!(
///     deep_merge(shipped, site),
///     json!({"log": {"level": "debug", "file": "app.log"}, "workers": 4})
/// );
/// ```
pub fn deep_merge(fallback: Value, primary: Value) -> Value {
    match (fallback, primary) {
        (Value::Object(mut layered), Value::Object(primary)) => {
            for (key, value) in primary {
                let slot = layered.entry(key).or_insert(Value::Null);
                *slot = deep_merge(std::mem::take(slot), value);
            }
            Value::Object(layered)
        }
        (fallback, Value::Null) => fallback,
        (_, primary) => primary,
    }
}
