//! Conversion between [`Value`] and JSON, for command-line arguments and
//! human-readable output.
//!
//! Objects carry their runtime type in a `"$type"` member. When it is absent
//! on input the declared type is used.

use serde_json::{Map, Number};
use uuid::Uuid;

use crate::error::{Result, SchemaError};
use crate::registry::TypeRegistry;
use crate::types::TypeDesc;
use crate::value::{Object, Value};

/// Member holding an object's runtime type name.
pub const TYPE_KEY: &str = "$type";

/// Render a value as JSON.
///
/// Non-finite floats become `null`.
pub fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Char(c) => Json::String(c.to_string()),
        Value::U8(v) => Json::from(*v),
        Value::I8(v) => Json::from(*v),
        Value::U16(v) => Json::from(*v),
        Value::I16(v) => Json::from(*v),
        Value::U32(v) => Json::from(*v),
        Value::I32(v) => Json::from(*v),
        Value::U64(v) => Json::from(*v),
        Value::I64(v) | Value::Enum(v) | Value::Timestamp(v) => Json::from(*v),
        Value::Single(v) => Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number),
        Value::Guid(id) => Json::String(id.to_string()),
        Value::String(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Object(obj) => {
            let mut map = Map::new();
            map.insert(TYPE_KEY.to_string(), Json::String(obj.type_name().to_string()));
            for (name, field) in obj.fields() {
                map.insert(name.to_string(), to_json(field));
            }
            Json::Object(map)
        }
    }
}

/// Build a value of type `ty` from JSON.
///
/// `null` is accepted for any type; whether the field may hold it is checked
/// when the value is encoded. Object members not declared on the runtime
/// type are rejected, and missing members are left unset.
pub fn from_json(json: &serde_json::Value, ty: &TypeDesc, registry: &TypeRegistry) -> Result<Value> {
    convert(json, ty, registry, "$")
}

fn convert(
    json: &serde_json::Value,
    ty: &TypeDesc,
    registry: &TypeRegistry,
    path: &str,
) -> Result<Value> {
    use serde_json::Value as Json;

    let mismatch = || SchemaError::TypeMismatch {
        field: path.to_string(),
        expected: ty.to_string(),
        found: json_kind(json).to_string(),
    };

    if json.is_null() {
        return Ok(Value::Null);
    }

    match ty {
        TypeDesc::Bool => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
        TypeDesc::Char => {
            let s = json.as_str().ok_or_else(mismatch)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(mismatch()),
            }
        }
        TypeDesc::Int(kind) => {
            let n = json_int(json).ok_or_else(mismatch)?;
            Value::from_int(*kind, n).ok_or_else(|| SchemaError::OutOfRange {
                field: path.to_string(),
                value: n,
                min: kind.min(),
                max: kind.max(),
            })
        }
        TypeDesc::Enum { repr, .. } => {
            let n = json_int(json).ok_or_else(mismatch)?;
            if !repr.contains(n) {
                return Err(SchemaError::OutOfRange {
                    field: path.to_string(),
                    value: n,
                    min: repr.min(),
                    max: repr.max(),
                });
            }
            i64::try_from(n).map(Value::Enum).map_err(|_| mismatch())
        }
        TypeDesc::Single => json.as_f64().map(|v| Value::Single(v as f32)).ok_or_else(mismatch),
        TypeDesc::Timestamp => json.as_i64().map(Value::Timestamp).ok_or_else(mismatch),
        TypeDesc::Double => Err(SchemaError::Unsupported {
            field: path.to_string(),
            kind: "double",
        }),
        TypeDesc::Decimal => Err(SchemaError::Unsupported {
            field: path.to_string(),
            kind: "decimal",
        }),
        TypeDesc::Guid => json
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Value::Guid)
            .ok_or_else(mismatch),
        TypeDesc::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        TypeDesc::Array(element) => {
            let items = json.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| convert(item, element, registry, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        TypeDesc::Compound(declared) => {
            let Json::Object(map) = json else {
                return Err(mismatch());
            };
            let runtime = match map.get(TYPE_KEY) {
                Some(Json::String(name)) => name.as_str(),
                Some(_) => return Err(mismatch()),
                None => declared.as_str(),
            };
            if !registry.is_assignable(declared, runtime) {
                return Err(SchemaError::TypeMismatch {
                    field: path.to_string(),
                    expected: declared.clone(),
                    found: runtime.to_string(),
                });
            }

            let fields = registry.ordered_fields(runtime)?;
            let mut obj = Object::new(runtime);
            for (name, member) in map.iter().filter(|(name, _)| name.as_str() != TYPE_KEY) {
                let field = fields
                    .iter()
                    .find(|f| &f.name == name)
                    .ok_or_else(|| {
                        SchemaError::InvalidSchema(format!(
                            "{path}: type \"{runtime}\" has no field \"{name}\""
                        ))
                    })?;
                let value = convert(member, &field.ty, registry, &format!("{path}.{name}"))?;
                obj.set(name.clone(), value);
            }
            Ok(Value::Object(obj))
        }
    }
}

fn json_int(json: &serde_json::Value) -> Option<i128> {
    json.as_i64()
        .map(i128::from)
        .or_else(|| json.as_u64().map(i128::from))
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    use serde_json::Value as Json;

    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::{CompoundType, FieldDef};
    use crate::types::IntKind;

    fn shapes() -> TypeRegistry {
        TypeRegistry::new()
            .with(CompoundType::new("Shape").abstract_type())
            .unwrap()
            .with(
                CompoundType::new("Rect")
                    .extends("Shape")
                    .field(FieldDef::new("w", TypeDesc::Int(IntKind::U16)))
                    .field(FieldDef::new("tags", TypeDesc::array(TypeDesc::String))),
            )
            .unwrap()
    }

    #[test]
    fn scalars() {
        let registry = TypeRegistry::new();
        let cases = [
            (json!(true), TypeDesc::Bool, Value::Bool(true)),
            (json!("x"), TypeDesc::Char, Value::Char('x')),
            (json!(-7), TypeDesc::Int(IntKind::I8), Value::I8(-7)),
            (json!(u64::MAX), TypeDesc::Int(IntKind::U64), Value::U64(u64::MAX)),
            (json!(3), TypeDesc::enumeration("Color", IntKind::U8), Value::Enum(3)),
            (json!(1.5), TypeDesc::Single, Value::Single(1.5)),
            (json!(null), TypeDesc::String, Value::Null),
        ];
        for (input, ty, expected) in cases {
            assert_eq!(from_json(&input, &ty, &registry).unwrap(), expected, "{ty}");
        }
    }

    #[test]
    fn integers_must_fit() {
        let err = from_json(&json!(300), &TypeDesc::Int(IntKind::U8), &TypeRegistry::new())
            .unwrap_err();
        assert!(matches!(err, SchemaError::OutOfRange { value: 300, .. }));
    }

    #[test]
    fn objects_use_type_member() {
        let registry = shapes();
        let input = json!({ "$type": "Rect", "w": 4, "tags": ["a", "b"] });
        let value = from_json(&input, &TypeDesc::compound("Shape"), &registry).unwrap();

        let expected = Object::new("Rect")
            .with("w", Value::U16(4))
            .with("tags", Value::Array(vec!["a".into(), "b".into()]));
        assert_eq!(value, Value::Object(expected));
        assert_eq!(to_json(&value), input);
    }

    #[test]
    fn unknown_members_are_rejected() {
        let registry = shapes();
        let input = json!({ "$type": "Rect", "height": 1 });
        let err = from_json(&input, &TypeDesc::compound("Shape"), &registry).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }

    #[test]
    fn mismatches_name_the_path() {
        let registry = shapes();
        let input = json!({ "$type": "Rect", "tags": ["a", 2] });
        let err = from_json(&input, &TypeDesc::compound("Rect"), &registry).unwrap_err();
        match err {
            SchemaError::TypeMismatch { field, found, .. } => {
                assert_eq!(field, "$.tags[1]");
                assert_eq!(found, "number");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn guids_render_hyphenated() {
        let id = Uuid::from_u128(0x2835079a_6259_4dfa_9826_99b6acdbc02e);
        let json = to_json(&Value::Guid(id));
        assert_eq!(json, json!("2835079a-6259-4dfa-9826-99b6acdbc02e"));
        assert_eq!(
            from_json(&json, &TypeDesc::Guid, &TypeRegistry::new()).unwrap(),
            Value::Guid(id)
        );
    }
}
