//! Conversion between plain JSON field values and the document store's
//! typed REST value encoding (`{"stringValue": "..."}` and friends).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::models::{Fields, RecordId};
use crate::store::Document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireValue {
    NullValue(()),
    BooleanValue(bool),
    /// Integers travel as decimal strings.
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<WireValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

/// A document as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

impl WireDocument {
    /// The document id is the last segment of its resource name.
    pub fn into_document(self) -> Document {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or(self.name.as_str())
            .to_string();
        Document {
            id: RecordId::new(id),
            fields: decode_fields(self.fields),
        }
    }
}

pub fn encode(value: &Value) -> WireValue {
    match value {
        Value::Null => WireValue::NullValue(()),
        Value::Bool(b) => WireValue::BooleanValue(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => WireValue::IntegerValue(i.to_string()),
            (None, Some(u)) => WireValue::IntegerValue(u.to_string()),
            _ => WireValue::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => WireValue::StringValue(s.clone()),
        Value::Array(items) => WireValue::ArrayValue(ArrayValue {
            values: items.iter().map(encode).collect(),
        }),
        Value::Object(map) => WireValue::MapValue(MapValue {
            fields: map.iter().map(|(k, v)| (k.clone(), encode(v))).collect(),
        }),
    }
}

pub fn encode_fields(fields: &Fields) -> BTreeMap<String, WireValue> {
    fields.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Decode a wire value. Timestamps, bytes and references become strings.
pub fn decode(value: WireValue) -> Value {
    match value {
        WireValue::NullValue(()) => Value::Null,
        WireValue::BooleanValue(b) => Value::Bool(b),
        WireValue::IntegerValue(s) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(s)),
        WireValue::DoubleValue(d) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        WireValue::TimestampValue(s)
        | WireValue::StringValue(s)
        | WireValue::BytesValue(s)
        | WireValue::ReferenceValue(s) => Value::String(s),
        WireValue::GeoPointValue(point) => serde_json::json!({
            "latitude": point.latitude,
            "longitude": point.longitude,
        }),
        WireValue::ArrayValue(array) => Value::Array(array.values.into_iter().map(decode).collect()),
        WireValue::MapValue(map) => Value::Object(decode_fields(map.fields)),
    }
}

pub fn decode_fields(fields: BTreeMap<String, WireValue>) -> Fields {
    fields.into_iter().map(|(k, v)| (k, decode(v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_realistic_document() {
        let raw = json!({
            "name": "projects/alithia/databases/(default)/documents/characters/abc123",
            "fields": {
                "title": { "stringValue": "Thorne" },
                "createdAt": { "timestampValue": "2026-03-01T10:00:00.123456Z" },
                "edited": { "booleanValue": false },
                "reactions": { "mapValue": { "fields": { "fire": { "integerValue": "3" } } } },
                "aliases": { "arrayValue": { "values": [ { "stringValue": "The Grey" } ] } },
                "sigil": { "nullValue": null }
            },
            "createTime": "2026-03-01T10:00:00.123456Z",
            "updateTime": "2026-03-01T10:00:00.123456Z"
        });

        let wire: WireDocument = serde_json::from_value(raw).unwrap();
        let doc = wire.into_document();

        assert_eq!(doc.id.as_str(), "abc123");
        assert_eq!(doc.fields["title"], "Thorne");
        assert_eq!(doc.fields["createdAt"], "2026-03-01T10:00:00.123456Z");
        assert_eq!(doc.fields["edited"], false);
        assert_eq!(doc.fields["reactions"]["fire"], 3);
        assert_eq!(doc.fields["aliases"][0], "The Grey");
        assert!(doc.fields["sigil"].is_null());
    }

    #[test]
    fn test_encode_uses_integer_strings() {
        let wire = serde_json::to_value(encode(&json!(42))).unwrap();
        assert_eq!(wire, json!({ "integerValue": "42" }));

        let wire = serde_json::to_value(encode(&json!(1.5))).unwrap();
        assert_eq!(wire, json!({ "doubleValue": 1.5 }));
    }

    #[test]
    fn test_encode_null_and_nested_map() {
        let wire = serde_json::to_value(encode(&json!({ "a": null }))).unwrap();
        assert_eq!(
            wire,
            json!({ "mapValue": { "fields": { "a": { "nullValue": null } } } })
        );
    }

    #[test]
    fn test_empty_map_value_decodes_to_empty_object() {
        let wire: WireValue = serde_json::from_value(json!({ "mapValue": {} })).unwrap();
        assert_eq!(decode(wire), json!({}));
    }
}
