use juniper::graphql_object;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    api::{Context, err::{ApiResult, invalid_input}},
    prelude::*,
};


#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FirstLayer {
    pub(crate) name: String,
    pub(crate) address: String,
    pub(crate) location: String,
    pub(crate) second_layer: SecondLayer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SecondLayer {
    pub(crate) uid: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
}

// All fields are nullable in the API, so that clients are not affected by
// stricter typing on our side.

/// first layer.
#[graphql_object(context = Context, rename_all = "none")]
impl FirstLayer {
    /// name
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    /// address.
    fn address(&self) -> Option<&str> {
        Some(&self.address)
    }

    /// location.
    fn location(&self) -> Option<&str> {
        Some(&self.location)
    }

    /// second_layer.
    fn second_layer(&self) -> Option<&SecondLayer> {
        Some(&self.second_layer)
    }
}

/// second layer.
#[graphql_object(context = Context, rename_all = "none")]
impl SecondLayer {
    /// uid
    fn uid(&self) -> Option<&str> {
        Some(&self.uid)
    }

    /// type.
    #[graphql(name = "type")]
    fn kind(&self) -> Option<&str> {
        Some(&self.kind)
    }
}

impl FirstLayer {
    /// The record served by `get_struct`, built field by field.
    pub(crate) fn from_struct_literal() -> Self {
        let second_layer = SecondLayer {
            uid: "Struct UID".into(),
            kind: "Struct Type".into(),
        };

        Self {
            name: "Struct Name".into(),
            address: "Struct Address".into(),
            location: "Struct Location".into(),
            second_layer,
        }
    }

    /// The untyped map that `get_map` decodes its record from.
    pub(crate) fn map_literal() -> Value {
        json!({
            "name": "Map Name",
            "address": "Map Address",
            "location": "Map Location",
            "second_layer": {
                "uid": "Map UID",
                "type": "Map Type",
            },
        })
    }

    /// Decodes a record from an untyped JSON map by serializing it and reading
    /// it back as `FirstLayer`. Keys missing from the map become empty strings.
    ///
    /// If `lenient` is set, decode failures are only logged and the zero-valued
    /// record is returned instead.
    pub(crate) fn decode(map: Value, lenient: bool) -> ApiResult<Self> {
        match Self::decode_strict(map) {
            Ok(record) => Ok(record),
            Err(e) if lenient => {
                warn!(
                    "Ignoring failure to decode record ({}), returning empty record instead",
                    e.msg,
                );
                Ok(Self::default())
            }
            Err(e) => {
                error!("Failed to decode record: {}", e.msg);
                Err(e)
            }
        }
    }

    fn decode_strict(map: Value) -> ApiResult<Self> {
        if !map.is_object() {
            return Err(invalid_input!(
                key = "record.shape",
                "expected a map to decode the record from, got {}",
                json_type_name(&map),
            ));
        }

        let encoded = serde_json::to_vec(&map)?;
        let record = serde_json::from_slice(&encoded)?;
        Ok(record)
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing::Level;

    use crate::{api::err::ApiErrorKind, logger::capture};
    use super::{FirstLayer, SecondLayer};

    fn map_record() -> FirstLayer {
        FirstLayer {
            name: "Map Name".into(),
            address: "Map Address".into(),
            location: "Map Location".into(),
            second_layer: SecondLayer {
                uid: "Map UID".into(),
                kind: "Map Type".into(),
            },
        }
    }

    #[test]
    fn map_literal_decodes_like_direct_construction() {
        let record = FirstLayer::decode(FirstLayer::map_literal(), false).unwrap();
        assert_eq!(record, map_record());
    }

    #[test]
    fn struct_literal() {
        let record = FirstLayer::from_struct_literal();
        assert_eq!(record.name, "Struct Name");
        assert_eq!(record.address, "Struct Address");
        assert_eq!(record.location, "Struct Location");
        assert_eq!(record.second_layer.uid, "Struct UID");
        assert_eq!(record.second_layer.kind, "Struct Type");
    }

    #[test]
    fn missing_keys_become_empty() {
        let record = FirstLayer::decode(json!({ "name": "only a name" }), false).unwrap();
        assert_eq!(record.name, "only a name");
        assert_eq!(record.address, "");
        assert_eq!(record.second_layer, SecondLayer::default());
    }

    #[test]
    fn wrong_field_type_is_an_error() {
        let map = json!({ "name": 17, "second_layer": { "uid": "x" } });
        let err = FirstLayer::decode(map, false).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InternalServerError);
    }

    #[test]
    fn non_map_is_invalid_input() {
        let err = FirstLayer::decode(json!(["Map Name"]), false).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);
        assert!(err.msg.contains("an array"), "unexpected message: {}", err.msg);
    }

    #[test]
    fn lenient_decoding_swallows_errors() {
        let map = json!({ "name": "Map Name", "second_layer": "not a map" });
        let record = FirstLayer::decode(map, true).unwrap();
        assert_eq!(record, FirstLayer::default());

        let record = FirstLayer::decode(json!(null), true).unwrap();
        assert_eq!(record, FirstLayer::default());
    }

    #[test]
    fn type_key_is_renamed() {
        let out = serde_json::to_value(map_record()).unwrap();
        assert_eq!(out["second_layer"]["type"], "Map Type");
        assert!(out["second_layer"].get("kind").is_none());
    }

    #[test]
    fn lenient_failure_is_only_a_warning() {
        let map = json!({ "name": "Map Name", "second_layer": 3 });
        let (record, events) = capture::events(|| FirstLayer::decode(map, true));

        assert_eq!(record.unwrap(), FirstLayer::default());
        assert_eq!(events.len(), 1, "unexpected events: {events:?}");
        assert_eq!(events[0].0, Level::WARN);
        assert!(events[0].1.contains("returning empty record"));
    }

    #[test]
    fn strict_failure_is_logged_as_error() {
        let map = json!({ "name": "Map Name", "second_layer": 3 });
        let (record, events) = capture::events(|| FirstLayer::decode(map, false));

        record.unwrap_err();
        assert_eq!(events.len(), 1, "unexpected events: {events:?}");
        assert_eq!(events[0].0, Level::ERROR);
        assert!(events[0].1.starts_with("Failed to decode record"));
    }
}
