// Copyright 2025 Finstore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Document representation, field conventions, and the increment marker

use serde_json::{Map, Number, Value};

use crate::error::{Result, StoreError};

/// A single record: a field-name to value mapping. Every application-visible
/// document carries its identity under [`ID_FIELD`].
pub type Document = Map<String, Value>;

/// Identity field, backend-assigned by `add`, caller-assigned by `set`.
pub const ID_FIELD: &str = "id";

/// Owner stamp used by owner-scoped collections on local backends and as the
/// REST query parameter name.
pub const OWNER_FIELD: &str = "userId";

/// Creation timestamp stamped by local backends on `add`.
pub const CREATED_AT_FIELD: &str = "createdAt";

const INCREMENT_KEY: &str = "$increment";

/// Build the tagged marker standing for an atomic numeric increment.
///
/// The marker rides inside an otherwise-plain payload and is recognized by
/// each backend's write path. Backends without an interpretation refuse the
/// write rather than persist the marker verbatim.
pub fn increment(delta: f64) -> Value {
    let mut marker = Map::new();
    marker.insert(
        INCREMENT_KEY.to_string(),
        Value::Number(number_from_f64(delta)),
    );
    Value::Object(marker)
}

/// Recognize an increment marker, returning its delta.
pub fn as_increment(value: &Value) -> Option<f64> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(INCREMENT_KEY).and_then(Value::as_f64)
}

/// Whether any top-level field of `data` is an increment marker.
pub fn contains_increment(data: &Document) -> bool {
    data.values().any(|v| as_increment(v).is_some())
}

/// Replace increment markers in `data` with concrete numbers computed against
/// `existing`. A missing or non-numeric base counts as zero.
pub fn resolve_increments(existing: Option<&Document>, data: &mut Document) {
    for (field, value) in data.iter_mut() {
        if let Some(delta) = as_increment(value) {
            let base = existing
                .and_then(|doc| doc.get(field))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            *value = Value::Number(number_from_f64(base + delta));
        }
    }
}

/// Shallow field-level merge of `src` into `target`.
pub fn merge_into(target: &mut Document, src: Document) {
    for (field, value) in src {
        target.insert(field, value);
    }
}

/// Interpret a JSON value as a document.
pub fn from_value(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Stamp [`CREATED_AT_FIELD`] with the current time unless the caller already
/// provided one.
pub fn stamp_created_at(doc: &mut Document) {
    if !doc.contains_key(CREATED_AT_FIELD) {
        doc.insert(
            CREATED_AT_FIELD.to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
}

// Integral results stay JSON integers so round-trips compare cleanly.
fn number_from_f64(value: f64) -> Number {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Number::from(value as i64)
    } else {
        Number::from_f64(value).unwrap_or_else(|| Number::from(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_increment_marker_round_trip() {
        let marker = increment(5.0);
        assert_eq!(as_increment(&marker), Some(5.0));
        assert_eq!(as_increment(&json!(5)), None);
        assert_eq!(as_increment(&json!({"other": 1})), None);
        assert_eq!(as_increment(&json!({"$increment": 1, "x": 2})), None);
    }

    #[test]
    fn test_contains_increment() {
        let mut doc = Document::new();
        doc.insert("balance".into(), increment(2.5));
        assert!(contains_increment(&doc));
        doc.insert("balance".into(), json!(2.5));
        assert!(!contains_increment(&doc));
    }

    #[test]
    fn test_resolve_increments_against_existing() {
        let mut existing = Document::new();
        existing.insert("balance".into(), json!(10));

        let mut data = Document::new();
        data.insert("balance".into(), increment(5.0));
        resolve_increments(Some(&existing), &mut data);
        assert_eq!(data.get("balance"), Some(&json!(15)));
    }

    #[test]
    fn test_resolve_increments_missing_base() {
        let mut data = Document::new();
        data.insert("balance".into(), increment(-3.0));
        resolve_increments(None, &mut data);
        assert_eq!(data.get("balance"), Some(&json!(-3)));
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut target = from_value(json!({"a": 1, "nested": {"x": 1}})).unwrap();
        let src = from_value(json!({"nested": {"y": 2}, "b": 2})).unwrap();
        merge_into(&mut target, src);
        assert_eq!(target.get("a"), Some(&json!(1)));
        assert_eq!(target.get("b"), Some(&json!(2)));
        assert_eq!(target.get("nested"), Some(&json!({"y": 2})));
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(from_value(json!([1, 2])).is_err());
    }
}
