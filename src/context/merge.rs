//! Context merge logic
//!
//! Implements the layered merge with:
//! - Mappings: deep-merge by key
//! - Sequences: CONCATENATE (base items first, overlay appended)
//! - Scalars: override (overlay wins)

use serde_yaml_ng::Value;

/// Deep merge two YAML values.
///
/// Merge semantics:
/// - Mappings: deep-merge by key (recursive); base-only keys are preserved
/// - Sequences: concatenation, base first (no deduplication)
/// - Scalars and any other case: overlay wins
///
/// The operation is not commutative: order encodes precedence.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both mappings: deep merge
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }

        // Both sequences: concatenate, preserving order
        (Value::Sequence(mut base_seq), Value::Sequence(overlay_seq)) => {
            base_seq.extend(overlay_seq);
            Value::Sequence(base_seq)
        }

        // Scalars and mixed cases: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge config layers in order (first is base, last has highest precedence).
///
/// An empty YAML section parses as null; a null layer is skipped rather than
/// nulling out everything merged so far.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers
        .into_iter()
        .filter(|layer| !layer.is_null())
        .fold(Value::Mapping(Default::default()), deep_merge)
}
