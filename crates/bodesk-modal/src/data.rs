#![forbid(unsafe_code)]

//! Modal data bags.
//!
//! The store never interprets a modal's data; it only merges patches into it
//! and compares the result for change detection. Any type that can do both
//! can be a data bag.

/// Loosely typed key-value payload: a JSON object.
pub type JsonBag = serde_json::Map<String, serde_json::Value>;

/// A payload the store can merge partial updates into.
pub trait MergeData: Clone + PartialEq + 'static {
    /// Partial update accepted by [`merge`](Self::merge).
    type Patch;

    /// Apply `patch` on top of the current value.
    fn merge(&mut self, patch: Self::Patch);
}

impl MergeData for JsonBag {
    type Patch = JsonBag;

    /// Shallow merge: top-level keys in `patch` overwrite, nothing recurses.
    fn merge(&mut self, patch: Self::Patch) {
        for (key, value) in patch {
            self.insert(key, value);
        }
    }
}

impl MergeData for () {
    type Patch = ();

    fn merge(&mut self, _patch: Self::Patch) {}
}

/// Build a [`JsonBag`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty bag.
#[must_use]
pub fn json_bag(value: serde_json::Value) -> JsonBag {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonBag::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shallow_merge_overwrites_top_level() {
        let mut bag = json_bag(json!({ "name": "Main St", "address": { "city": "Lyon" } }));
        bag.merge(json_bag(json!({ "address": { "zip": "69001" }, "open": true })));

        assert_eq!(
            serde_json::Value::Object(bag),
            json!({ "name": "Main St", "address": { "zip": "69001" }, "open": true })
        );
    }

    #[test]
    fn non_object_is_empty() {
        assert!(json_bag(json!([1, 2])).is_empty());
    }
}
