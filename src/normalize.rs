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

// Conversion between the realtime backend's native timestamp representation
// and the wire-neutral ISO-8601 strings every caller sees

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::document::{as_increment, Document};

const NATIVE_TS_KEY: &str = "$ts";
const SECS_KEY: &str = "secs";
const NANOS_KEY: &str = "nanos";

/// Prepare a document for the realtime backend's native value space.
///
/// Top-level RFC 3339 strings become native timestamps, null-valued fields are
/// dropped rather than written, everything else (increment markers included)
/// passes through untouched.
pub fn to_native(data: Document) -> Document {
    let mut native = Document::new();
    for (field, value) in data {
        if value.is_null() {
            continue;
        }
        if as_increment(&value).is_some() {
            native.insert(field, value);
            continue;
        }
        match &value {
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(ts) => {
                    native.insert(field, native_timestamp(&ts.with_timezone(&Utc)));
                }
                Err(_) => {
                    native.insert(field, value);
                }
            },
            _ => {
                native.insert(field, value);
            }
        }
    }
    native
}

/// Materialize a stored document for callers: native timestamps come back as
/// ISO-8601 strings, field by field.
pub fn from_native(data: Document) -> Document {
    let mut plain = Document::new();
    for (field, value) in data {
        match parse_native_timestamp(&value) {
            Some(ts) => {
                plain.insert(
                    field,
                    Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
                );
            }
            None => {
                plain.insert(field, value);
            }
        }
    }
    plain
}

fn native_timestamp(ts: &DateTime<Utc>) -> Value {
    let mut tagged = Map::new();
    let mut body = Map::new();
    body.insert(SECS_KEY.to_string(), Value::from(ts.timestamp()));
    body.insert(
        NANOS_KEY.to_string(),
        Value::from(ts.timestamp_subsec_nanos()),
    );
    tagged.insert(NATIVE_TS_KEY.to_string(), Value::Object(body));
    Value::Object(tagged)
}

fn parse_native_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    let body = obj.get(NATIVE_TS_KEY)?.as_object()?;
    let secs = body.get(SECS_KEY)?.as_i64()?;
    let nanos = body.get(NANOS_KEY)?.as_u64()? as u32;
    Utc.timestamp_opt(secs, nanos).single()
}
