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

// Query constraints applied uniformly to snapshots on every backend

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;

/// Constraint attached to a subscription. All backends apply constraints to
/// the materialized snapshot, so a caller never special-cases the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryConstraint {
    Where {
        field: String,
        op: WhereOp,
        value: Value,
    },
    OrderBy {
        field: String,
        #[serde(default)]
        direction: SortDirection,
    },
    Limit {
        count: usize,
    },
}

impl QueryConstraint {
    pub fn where_eq(field: impl Into<String>, value: Value) -> Self {
        Self::Where {
            field: field.into(),
            op: WhereOp::Eq,
            value,
        }
    }

    pub fn order_by(field: impl Into<String>, direction: SortDirection) -> Self {
        Self::OrderBy {
            field: field.into(),
            direction,
        }
    }

    pub fn limit(count: usize) -> Self {
        Self::Limit { count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhereOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Filter, sort, and truncate a snapshot in constraint order.
pub fn apply_constraints(docs: &mut Vec<Document>, constraints: &[QueryConstraint]) {
    for constraint in constraints {
        match constraint {
            QueryConstraint::Where { field, op, value } => {
                docs.retain(|doc| matches_where(doc.get(field), *op, value));
            }
            QueryConstraint::OrderBy { field, direction } => {
                docs.sort_by(|a, b| {
                    let ord = compare_values(a.get(field), b.get(field));
                    match direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                });
            }
            QueryConstraint::Limit { count } => {
                docs.truncate(*count);
            }
        }
    }
}

fn matches_where(actual: Option<&Value>, op: WhereOp, expected: &Value) -> bool {
    match op {
        WhereOp::Eq => actual == Some(expected),
        WhereOp::Ne => actual != Some(expected),
        WhereOp::Lt => compare_values(actual, Some(expected)) == Ordering::Less,
        WhereOp::Le => compare_values(actual, Some(expected)) != Ordering::Greater,
        WhereOp::Gt => compare_values(actual, Some(expected)) == Ordering::Greater,
        WhereOp::Ge => compare_values(actual, Some(expected)) != Ordering::Less,
    }
}

// Missing fields sort first; ISO-8601 strings order chronologically under the
// plain string comparison.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::from_value;
    use serde_json::json;

    fn sample() -> Vec<Document> {
        vec![
            from_value(json!({"id": "a", "amount": 30, "category": "food"})).unwrap(),
            from_value(json!({"id": "b", "amount": 10, "category": "rent"})).unwrap(),
            from_value(json!({"id": "c", "amount": 20, "category": "food"})).unwrap(),
        ]
    }

    #[test]
    fn test_where_eq_filters() {
        let mut docs = sample();
        apply_constraints(
            &mut docs,
            &[QueryConstraint::where_eq("category", json!("food"))],
        );
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_order_by_desc_and_limit() {
        let mut docs = sample();
        apply_constraints(
            &mut docs,
            &[
                QueryConstraint::order_by("amount", SortDirection::Desc),
                QueryConstraint::limit(2),
            ],
        );
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get("id"), Some(&json!("a")));
        assert_eq!(docs[1].get("id"), Some(&json!("c")));
    }

    #[test]
    fn test_range_operator() {
        let mut docs = sample();
        apply_constraints(
            &mut docs,
            &[QueryConstraint::Where {
                field: "amount".into(),
                op: WhereOp::Ge,
                value: json!(20),
            }],
        );
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_iso_dates_sort_chronologically() {
        let mut docs = vec![
            from_value(json!({"id": "x", "createdAt": "2026-02-01T00:00:00Z"})).unwrap(),
            from_value(json!({"id": "y", "createdAt": "2026-01-01T00:00:00Z"})).unwrap(),
        ];
        apply_constraints(
            &mut docs,
            &[QueryConstraint::order_by("createdAt", SortDirection::Asc)],
        );
        assert_eq!(docs[0].get("id"), Some(&json!("y")));
    }
}
