//! # Canonical JSON Encoding
//!
//! Explanation payloads are round-tripped through their serialized JSON form
//! before being returned, so response bodies contain only JSON-primitive
//! values: numeric arrays become nested sequences of numbers, never opaque
//! objects.

use serde_json::Value;

use super::errors::{ArtifactError, ArtifactResult};

/// Round-trip a payload through its canonical JSON encoding
pub fn canonical(value: &Value) -> ArtifactResult<Value> {
    let text = serde_json::to_string(value)
        .map_err(|e| ArtifactError::Serialization(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| ArtifactError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_is_identity_for_primitives() {
        let value = json!({
            "values": [[0.25, -1.5], [3.0, 0.0]],
            "expected": 0.125,
            "label": "class 1"
        });
        assert_eq!(canonical(&value).unwrap(), value);
    }

    #[test]
    fn test_round_trip_preserves_float_text() {
        let value = json!([0.1, 0.2, 0.30000000000000004]);
        assert_eq!(canonical(&value).unwrap(), value);
    }
}
