use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use bitrpc_bits::{BitReader, BitWriter};
use tracing::trace;
use uuid::Uuid;

use crate::attr::Attribute;
use crate::descriptor::FieldDescriptor;
use crate::error::{Result, SchemaError};
use crate::options::SerializerOptions;
use crate::registry::TypeRegistry;
use crate::types::TypeDesc;
use crate::value::{Object, Value};

/// Encodes and decodes [`Value`]s against resolved field descriptors.
///
/// Construction validates the registry and resolves the wire layout of every
/// compound type once. A serializer is immutable afterwards and can be shared
/// between threads; each encode or decode session brings its own bit stream.
#[derive(Debug)]
pub struct BitSerializer {
    registry: TypeRegistry,
    options: SerializerOptions,
    layouts: HashMap<String, Vec<FieldDescriptor>>,
}

impl BitSerializer {
    pub fn new(registry: TypeRegistry, options: SerializerOptions) -> Result<Self> {
        registry.validate()?;

        let mut layouts = HashMap::new();
        for name in registry.names() {
            let fields = registry
                .ordered_fields(name)?
                .into_iter()
                .map(|def| FieldDescriptor::for_field(def, &options, &registry))
                .collect::<Result<Vec<_>>>()?;
            layouts.insert(name.to_string(), fields);
        }

        let serializer = Self {
            registry,
            options,
            layouts,
        };
        for fields in serializer.layouts.values() {
            for field in fields {
                serializer.check_elements(field)?;
            }
        }
        Ok(serializer)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    /// Resolve a descriptor for a top-level value, parameter or return value.
    pub fn descriptor(
        &self,
        name: &str,
        ty: &TypeDesc,
        attrs: &[Attribute],
    ) -> Result<FieldDescriptor> {
        let field = FieldDescriptor::resolve(name, ty, attrs, &self.options, &self.registry)?;
        self.check_elements(&field)?;
        Ok(field)
    }

    /// Wire-ordered field descriptors of a compound type.
    pub fn layout(&self, type_name: &str) -> Result<&[FieldDescriptor]> {
        self.layouts
            .get(type_name)
            .map(Vec::as_slice)
            .ok_or_else(|| SchemaError::UnknownType(type_name.to_string()))
    }

    /// Write `value` as described by `field`. Nothing is flushed.
    pub fn encode<W: Write>(
        &self,
        writer: &mut BitWriter<W>,
        value: &Value,
        field: &FieldDescriptor,
    ) -> Result<()> {
        self.encode_at(writer, value, field, 0)
    }

    fn encode_at<W: Write>(
        &self,
        writer: &mut BitWriter<W>,
        value: &Value,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<()> {
        if field.is_ignored() {
            return Ok(());
        }

        if field.ty().is_reference() {
            if value.is_null() {
                if !field.is_nullable() {
                    return Err(null_value(field));
                }
                writer.write_bool(false)?;
                return Ok(());
            }
            if field.is_nullable() {
                writer.write_bool(true)?;
            }
        } else if value.is_null() {
            return Err(null_value(field));
        }

        match (field.ty(), value) {
            (TypeDesc::Bool, Value::Bool(v)) => writer.write_bool(*v)?,
            (TypeDesc::Char, Value::Char(c)) => {
                let units = c.len_utf16();
                if units > 1 {
                    return Err(length_exceeded(field, units, 1));
                }
                writer.write_char(*c)?;
            }
            (TypeDesc::Int(kind), v) if v.int_kind() == Some(*kind) => {
                self.encode_int(writer, v, field)?;
            }
            (TypeDesc::Enum { .. }, v @ Value::Enum(_)) => self.encode_int(writer, v, field)?,
            (TypeDesc::Single, Value::Single(v)) => writer.write_f32(*v)?,
            (TypeDesc::Timestamp, Value::Timestamp(ticks)) => writer.write(*ticks as u64, 64)?,
            (TypeDesc::Double, _) => return Err(unsupported(field, "double")),
            (TypeDesc::Decimal, _) => return Err(unsupported(field, "decimal")),
            (TypeDesc::Guid, Value::Guid(id)) => writer.write_bytes(id.as_bytes())?,
            (TypeDesc::String, Value::String(s)) => {
                let units = s.encode_utf16().count();
                if units > field.max_length() {
                    return Err(length_exceeded(field, units, field.max_length()));
                }
                writer.write_string(s, field.max_length())?;
            }
            (TypeDesc::Array(_), Value::Array(items)) => {
                if items.len() > field.max_length() {
                    return Err(length_exceeded(field, items.len(), field.max_length()));
                }
                let depth = self.nested(depth, field)?;
                let element = element_of(field)?;
                writer.write(items.len() as u64, field.length_bits())?;
                for item in items {
                    self.encode_at(writer, item, element, depth)?;
                }
            }
            (TypeDesc::Compound(declared), Value::Object(obj)) => {
                let depth = self.nested(depth, field)?;
                self.encode_object(writer, obj, declared, field, depth)?;
            }
            (ty, value) => {
                return Err(SchemaError::TypeMismatch {
                    field: field.name().to_string(),
                    expected: ty.to_string(),
                    found: value.kind_name().to_string(),
                })
            }
        }
        Ok(())
    }

    /// Read a value written by [`encode`](Self::encode) with the same descriptor.
    pub fn decode<R: Read>(
        &self,
        reader: &mut BitReader<R>,
        field: &FieldDescriptor,
    ) -> Result<Value> {
        self.decode_at(reader, field, 0)
    }

    fn decode_at<R: Read>(
        &self,
        reader: &mut BitReader<R>,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<Value> {
        if field.is_ignored() {
            return Ok(Value::Null);
        }
        if field.is_nullable() && !reader.read_bool()? {
            return Ok(Value::Null);
        }

        Ok(match field.ty() {
            TypeDesc::Bool => Value::Bool(reader.read_bool()?),
            TypeDesc::Char => Value::Char(reader.read_char()?),
            TypeDesc::Int(kind) => {
                let value = self.decode_int(reader, field)?;
                Value::from_int(*kind, value).ok_or_else(|| SchemaError::OutOfRange {
                    field: field.name().to_string(),
                    value,
                    min: kind.min(),
                    max: kind.max(),
                })?
            }
            TypeDesc::Enum { .. } => {
                let value = self.decode_int(reader, field)?;
                Value::Enum(i64::try_from(value).map_err(|_| SchemaError::OutOfRange {
                    field: field.name().to_string(),
                    value,
                    min: i128::from(i64::MIN),
                    max: i128::from(i64::MAX),
                })?)
            }
            TypeDesc::Single => Value::Single(reader.read_f32()?),
            TypeDesc::Timestamp => Value::Timestamp(reader.read_u64(64)? as i64),
            TypeDesc::Double => return Err(unsupported(field, "double")),
            TypeDesc::Decimal => return Err(unsupported(field, "decimal")),
            TypeDesc::Guid => {
                let bytes = reader.read_bytes(16)?;
                let id = Uuid::from_slice(&bytes).map_err(|_| SchemaError::TypeMismatch {
                    field: field.name().to_string(),
                    expected: "16 guid bytes".to_string(),
                    found: format!("{} bytes", bytes.len()),
                })?;
                Value::Guid(id)
            }
            TypeDesc::String => Value::String(reader.read_string(field.max_length())?),
            TypeDesc::Array(_) => {
                let len = reader.read(field.length_bits())? as usize;
                if len > field.max_length() {
                    return Err(length_exceeded(field, len, field.max_length()));
                }
                let depth = self.nested(depth, field)?;
                let element = element_of(field)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode_at(reader, element, depth)?);
                }
                Value::Array(items)
            }
            TypeDesc::Compound(declared) => {
                let depth = self.nested(depth, field)?;
                Value::Object(self.decode_object(reader, declared, field, depth)?)
            }
        })
    }

    /// Encode one value into a standalone, flushed byte vector.
    pub fn to_bytes(&self, value: &Value, field: &FieldDescriptor) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(Vec::new());
        self.encode(&mut writer, value, field)?;
        Ok(writer.finish()?)
    }

    /// Decode one value from bytes produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(&self, bytes: &[u8], field: &FieldDescriptor) -> Result<Value> {
        let mut reader = BitReader::new(bytes);
        self.decode(&mut reader, field)
    }

    fn encode_int<W: Write>(
        &self,
        writer: &mut BitWriter<W>,
        value: &Value,
        field: &FieldDescriptor,
    ) -> Result<()> {
        let (map, raw) = match (field.range_map(), value.as_int()) {
            (Some(map), Some(raw)) => (map, raw),
            _ => {
                return Err(SchemaError::TypeMismatch {
                    field: field.name().to_string(),
                    expected: field.ty().to_string(),
                    found: value.kind_name().to_string(),
                })
            }
        };
        writer.write(map.encode(raw, field.name())?, map.bits())?;
        Ok(())
    }

    fn decode_int<R: Read>(
        &self,
        reader: &mut BitReader<R>,
        field: &FieldDescriptor,
    ) -> Result<i128> {
        let map = field.range_map().ok_or_else(|| {
            SchemaError::InvalidSchema(format!("field {} has no integer mapping", field.name()))
        })?;
        let raw = reader.read(map.bits())?;
        map.decode(raw, field.name())
    }

    fn encode_object<W: Write>(
        &self,
        writer: &mut BitWriter<W>,
        obj: &Object,
        declared: &str,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<()> {
        let runtime = obj.type_name();
        let concrete = match field.derived() {
            Some(table) => {
                let entry = table.select(&self.registry, runtime).ok_or_else(|| {
                    SchemaError::UnknownDerivedType {
                        field: field.name().to_string(),
                        type_name: runtime.to_string(),
                    }
                })?;
                writer.write(u64::from(entry.code), table.bits())?;
                entry.type_name.as_str()
            }
            None => {
                if !self.registry.is_assignable(declared, runtime) {
                    return Err(SchemaError::TypeMismatch {
                        field: field.name().to_string(),
                        expected: declared.to_string(),
                        found: runtime.to_string(),
                    });
                }
                declared
            }
        };
        self.check_concrete(concrete, field)?;
        trace!(field = field.name(), concrete, "encoding object");

        for member in self.layout(concrete)? {
            if member.is_ignored() {
                continue;
            }
            let value = obj.get(member.name()).unwrap_or(&Value::Null);
            self.encode_at(writer, value, member, depth)?;
        }
        Ok(())
    }

    fn decode_object<R: Read>(
        &self,
        reader: &mut BitReader<R>,
        declared: &str,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<Object> {
        let mut code = None;
        let concrete = match field.derived() {
            Some(table) => {
                let raw = reader.read(table.bits())?;
                let entry = table
                    .by_code(raw)
                    .ok_or_else(|| SchemaError::NoSuchTypeCode {
                        field: field.name().to_string(),
                        code: raw,
                    })?;
                code = Some(raw);
                entry.type_name.as_str()
            }
            None => declared,
        };
        self.check_concrete(concrete, field)?;

        let mut obj = Object::new(concrete);
        if let (Some(code), Some((target, kind))) = (code, field.store_type_code()) {
            if let Some(value) = Value::from_int(kind, i128::from(code)) {
                obj.set(target, value);
            }
        }
        for member in self.layout(concrete)? {
            if member.is_ignored() {
                continue;
            }
            let value = self.decode_at(reader, member, depth)?;
            obj.set(member.name(), value);
        }
        Ok(obj)
    }

    /// Depth of the values nested inside `field`, or an error past the limit.
    fn nested(&self, depth: usize, field: &FieldDescriptor) -> Result<usize> {
        if depth >= self.options.max_depth {
            return Err(SchemaError::DepthExceeded {
                field: field.name().to_string(),
                max: self.options.max_depth,
            });
        }
        Ok(depth + 1)
    }

    /// Array elements must occupy at least one bit; otherwise the wire count
    /// alone decides how many values a few bytes of input turn into.
    fn check_elements(&self, field: &FieldDescriptor) -> Result<()> {
        let Some(element) = field.element() else {
            return Ok(());
        };
        if self.is_zero_width(element, &mut HashSet::new()) {
            return Err(SchemaError::InvalidSchema(format!(
                "field {}: array elements must occupy at least one bit",
                field.name()
            )));
        }
        self.check_elements(element)
    }

    fn is_zero_width(&self, field: &FieldDescriptor, visiting: &mut HashSet<String>) -> bool {
        if field.is_ignored() {
            return true;
        }
        if field.is_nullable() {
            return false;
        }
        match field.ty() {
            TypeDesc::Int(_) | TypeDesc::Enum { .. } => {
                field.range_map().is_some_and(|map| map.bits() == 0)
            }
            TypeDesc::Array(_) => field.length_bits() == 0,
            TypeDesc::Compound(declared) => {
                let candidates: Vec<&str> = match field.derived() {
                    Some(table) if table.bits() > 0 => return false,
                    Some(table) => table
                        .entries()
                        .iter()
                        .map(|entry| entry.type_name.as_str())
                        .collect(),
                    None => vec![declared.as_str()],
                };
                candidates.into_iter().all(|name| {
                    // A required cycle never terminates, so it is not zero width.
                    if !visiting.insert(name.to_string()) {
                        return false;
                    }
                    let zero = self.layouts.get(name).is_some_and(|fields| {
                        fields.iter().all(|member| self.is_zero_width(member, visiting))
                    });
                    visiting.remove(name);
                    zero
                })
            }
            _ => false,
        }
    }

    fn check_concrete(&self, concrete: &str, field: &FieldDescriptor) -> Result<()> {
        if self.registry.get(concrete)?.is_abstract {
            return Err(SchemaError::AbstractType {
                field: field.name().to_string(),
                type_name: concrete.to_string(),
            });
        }
        Ok(())
    }
}

fn element_of(field: &FieldDescriptor) -> Result<&FieldDescriptor> {
    field.element().ok_or_else(|| {
        SchemaError::InvalidSchema(format!("array field {} has no element descriptor", field.name()))
    })
}

fn null_value(field: &FieldDescriptor) -> SchemaError {
    SchemaError::NullValue {
        field: field.name().to_string(),
    }
}

fn length_exceeded(field: &FieldDescriptor, len: usize, max: usize) -> SchemaError {
    SchemaError::LengthExceeded {
        field: field.name().to_string(),
        len,
        max,
    }
}

fn unsupported(field: &FieldDescriptor, kind: &'static str) -> SchemaError {
    SchemaError::Unsupported {
        field: field.name().to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use bitrpc_bits::{max_utf8_bytes, precision_for_span};

    use super::*;
    use crate::registry::{CompoundType, FieldDef};
    use crate::types::IntKind;

    fn person_registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                CompoundType::new("Person")
                    .field(
                        FieldDef::new("name", TypeDesc::String).with(Attribute::MaxLength(16)),
                    )
                    .field(
                        FieldDef::new("age", TypeDesc::Int(IntKind::U16))
                            .with(Attribute::range(0, 150)),
                    ),
            )
            .unwrap()
    }

    fn shapes_registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                CompoundType::new("Shape")
                    .abstract_type()
                    .field(
                        FieldDef::new("code", TypeDesc::Int(IntKind::U8)).with(Attribute::Ignore),
                    )
                    .field(FieldDef::new("id", TypeDesc::Int(IntKind::U8))),
            )
            .unwrap()
            .with(
                CompoundType::new("Circle")
                    .extends("Shape")
                    .field(
                        FieldDef::new("radius", TypeDesc::Int(IntKind::U16))
                            .with(Attribute::range(0, 1000)),
                    ),
            )
            .unwrap()
            .with(
                CompoundType::new("Rect")
                    .extends("Shape")
                    .field(FieldDef::new("h", TypeDesc::Int(IntKind::U8)))
                    .field(FieldDef::new("w", TypeDesc::Int(IntKind::U8))),
            )
            .unwrap()
    }

    fn shape_field(serializer: &BitSerializer) -> FieldDescriptor {
        serializer
            .descriptor(
                "shape",
                &TypeDesc::compound("Shape"),
                &[
                    Attribute::derived(1, "Circle"),
                    Attribute::derived(2, "Rect"),
                    Attribute::store_type_code("code"),
                ],
            )
            .unwrap()
    }

    #[test]
    fn person_layout_matches_predicted_bits() {
        let serializer = BitSerializer::new(person_registry(), SerializerOptions::default()).unwrap();
        let field = serializer
            .descriptor("person", &TypeDesc::compound("Person"), &[Attribute::Required])
            .unwrap();
        let person = Value::Object(Object::new("Person").with("name", "Ada").with("age", 37u16));

        let mut writer = BitWriter::new(Vec::new());
        serializer.encode(&mut writer, &person, &field).unwrap();
        let name_prefix = precision_for_span(max_utf8_bytes(16));
        assert_eq!(name_prefix, 6);
        // age (8) + name null bit (1) + prefix (6) + "Ada" (24)
        assert_eq!(writer.bits_written(), 8 + 1 + 6 + 24);
        let bytes = writer.finish().unwrap();

        let mut expected = BitWriter::new(Vec::new());
        expected.write(37, 8).unwrap();
        expected.write_bool(true).unwrap();
        expected.write(3, 6).unwrap();
        expected.write_bytes(b"Ada").unwrap();
        assert_eq!(bytes, expected.finish().unwrap());
        assert_eq!(bytes.len(), 5);

        assert_eq!(serializer.from_bytes(&bytes, &field).unwrap(), person);
    }

    #[test]
    fn required_reference_has_no_null_bit_and_rejects_null() {
        let serializer = BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap();
        let required = serializer
            .descriptor("s", &TypeDesc::String, &[Attribute::Required, Attribute::MaxLength(1)])
            .unwrap();
        let optional = serializer
            .descriptor("s", &TypeDesc::String, &[Attribute::MaxLength(1)])
            .unwrap();

        let mut writer = BitWriter::new(Vec::new());
        serializer.encode(&mut writer, &Value::from(""), &required).unwrap();
        assert_eq!(writer.bits_written(), 3);

        assert!(matches!(
            serializer.to_bytes(&Value::Null, &required),
            Err(SchemaError::NullValue { .. })
        ));

        let mut writer = BitWriter::new(Vec::new());
        serializer.encode(&mut writer, &Value::Null, &optional).unwrap();
        assert_eq!(writer.bits_written(), 1);
        let bytes = writer.finish().unwrap();
        assert_eq!(serializer.from_bytes(&bytes, &optional).unwrap(), Value::Null);
    }

    #[test]
    fn clamp_and_reject() {
        let serializer = BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap();
        let ty = TypeDesc::Int(IntKind::U16);
        let clamped = serializer.descriptor("age", &ty, &[Attribute::clamped(0, 150)]).unwrap();
        let strict = serializer.descriptor("age", &ty, &[Attribute::range(0, 150)]).unwrap();

        assert_eq!(
            serializer.to_bytes(&Value::U16(400), &clamped).unwrap(),
            serializer.to_bytes(&Value::U16(150), &clamped).unwrap()
        );
        assert!(matches!(
            serializer.to_bytes(&Value::U16(400), &strict),
            Err(SchemaError::OutOfRange { value: 400, .. })
        ));
    }

    #[test]
    fn polymorphic_field_roundtrips_exact_subtype() {
        let serializer = BitSerializer::new(shapes_registry(), SerializerOptions::default()).unwrap();
        let field = shape_field(&serializer);
        let rect = Value::Object(
            Object::new("Rect")
                .with("id", 9u8)
                .with("w", 4u8)
                .with("h", 3u8),
        );

        let mut writer = BitWriter::new(Vec::new());
        serializer.encode(&mut writer, &rect, &field).unwrap();
        // null bit + 2-bit code + id + h + w
        assert_eq!(writer.bits_written(), 1 + 2 + 8 * 3);
        let bytes = writer.finish().unwrap();

        let decoded = serializer.from_bytes(&bytes, &field).unwrap();
        let obj = decoded.as_object().unwrap();
        assert_eq!(obj.type_name(), "Rect");
        assert_eq!(obj.get("w"), Some(&Value::U8(4)));
        assert_eq!(obj.get("h"), Some(&Value::U8(3)));
        assert_eq!(obj.get("radius"), None);
        assert_eq!(obj.get("code"), Some(&Value::U8(2)), "type code is stored");
    }

    #[test]
    fn unknown_type_code_is_a_decode_error() {
        let serializer = BitSerializer::new(shapes_registry(), SerializerOptions::default()).unwrap();
        let field = shape_field(&serializer);

        let mut writer = BitWriter::new(Vec::new());
        writer.write_bool(true).unwrap();
        writer.write(3, 2).unwrap();
        let bytes = writer.finish().unwrap();

        assert!(matches!(
            serializer.from_bytes(&bytes, &field),
            Err(SchemaError::NoSuchTypeCode { code: 3, .. })
        ));
    }

    #[test]
    fn undeclared_subtype_and_abstract_values_fail() {
        let serializer = BitSerializer::new(shapes_registry(), SerializerOptions::default()).unwrap();
        let field = shape_field(&serializer);
        assert!(matches!(
            serializer.to_bytes(&Value::Object(Object::new("Shape")), &field),
            Err(SchemaError::UnknownDerivedType { .. })
        ));

        let plain = serializer.descriptor("s", &TypeDesc::compound("Shape"), &[]).unwrap();
        assert!(matches!(
            serializer.to_bytes(&Value::Object(Object::new("Circle").with("id", 1u8).with("radius", 2u16)), &plain),
            Err(SchemaError::AbstractType { .. })
        ));
    }

    #[test]
    fn arrays_with_element_ranges() {
        let serializer = BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap();
        let field = serializer
            .descriptor(
                "values",
                &TypeDesc::array(TypeDesc::Int(IntKind::I32)),
                &[
                    Attribute::MaxLength(7),
                    Attribute::Required,
                    Attribute::element(Attribute::range(-4, 3)),
                ],
            )
            .unwrap();
        let value = Value::Array(vec![Value::I32(-4), Value::I32(0), Value::I32(3)]);

        let mut writer = BitWriter::new(Vec::new());
        serializer.encode(&mut writer, &value, &field).unwrap();
        assert_eq!(writer.bits_written(), 3 + 3 * 3);
        let bytes = writer.finish().unwrap();
        assert_eq!(serializer.from_bytes(&bytes, &field).unwrap(), value);

        let too_long = Value::Array(vec![Value::I32(0); 8]);
        assert!(matches!(
            serializer.to_bytes(&too_long, &field),
            Err(SchemaError::LengthExceeded { len: 8, max: 7, .. })
        ));
    }

    #[test]
    fn scalar_kinds_roundtrip() {
        let serializer = BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap();
        let cases = [
            (TypeDesc::Bool, Value::Bool(true)),
            (TypeDesc::Char, Value::Char('é')),
            (TypeDesc::Int(IntKind::I64), Value::I64(i64::MIN)),
            (TypeDesc::Int(IntKind::I8), Value::I8(-7)),
            (TypeDesc::enumeration("Mode", IntKind::U8), Value::Enum(200)),
            (TypeDesc::Single, Value::Single(2.5)),
            (TypeDesc::Timestamp, Value::Timestamp(638_000_000_000_000_000)),
            (
                TypeDesc::Guid,
                Value::Guid(Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef)),
            ),
        ];
        for (ty, value) in cases {
            let field = serializer.descriptor("v", &ty, &[]).unwrap();
            let bytes = serializer.to_bytes(&value, &field).unwrap();
            assert_eq!(serializer.from_bytes(&bytes, &field).unwrap(), value, "{ty}");
        }
    }

    #[test]
    fn guid_is_sixteen_raw_bytes() {
        let serializer = BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap();
        let field = serializer.descriptor("id", &TypeDesc::Guid, &[]).unwrap();
        let id = Uuid::from_u128(0x2835079a_6259_4dfa_9826_99b6acdbc02e);
        let bytes = serializer.to_bytes(&Value::Guid(id), &field).unwrap();
        assert_eq!(bytes.as_slice(), id.as_bytes());
    }

    #[test]
    fn doubles_and_decimals_name_the_field() {
        let serializer = BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap();
        let field = serializer.descriptor("price", &TypeDesc::Double, &[]).unwrap();
        let err = serializer.to_bytes(&Value::Single(1.0), &field).unwrap_err();
        assert!(err.to_string().contains("price"));
        assert!(matches!(err, SchemaError::Unsupported { kind: "double", .. }));

        let field = serializer.descriptor("total", &TypeDesc::Decimal, &[]).unwrap();
        assert!(matches!(
            serializer.from_bytes(&[0u8; 16], &field),
            Err(SchemaError::Unsupported { kind: "decimal", .. })
        ));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let serializer = BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap();
        let field = serializer.descriptor("n", &TypeDesc::Int(IntKind::U8), &[]).unwrap();
        assert!(matches!(
            serializer.to_bytes(&Value::I32(1), &field),
            Err(SchemaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn recursive_types_encode_until_null() {
        let registry = TypeRegistry::new()
            .with(
                CompoundType::new("Node")
                    .field(FieldDef::new("value", TypeDesc::Int(IntKind::U8)))
                    .field(FieldDef::new("next", TypeDesc::compound("Node"))),
            )
            .unwrap();
        let serializer = BitSerializer::new(registry, SerializerOptions::default()).unwrap();
        let field = serializer.descriptor("list", &TypeDesc::compound("Node"), &[]).unwrap();
        let list = Value::Object(
            Object::new("Node")
                .with("value", 1u8)
                .with("next", Object::new("Node").with("value", 2u8).with("next", Value::Null)),
        );
        let bytes = serializer.to_bytes(&list, &field).unwrap();
        assert_eq!(serializer.from_bytes(&bytes, &field).unwrap(), list);
    }

    fn chain_serializer(max_depth: usize) -> (BitSerializer, FieldDescriptor) {
        let registry = TypeRegistry::new()
            .with(CompoundType::new("Node").field(FieldDef::new("next", TypeDesc::compound("Node"))))
            .unwrap();
        let options = SerializerOptions {
            max_depth,
            ..SerializerOptions::default()
        };
        let serializer = BitSerializer::new(registry, options).unwrap();
        let field = serializer.descriptor("head", &TypeDesc::compound("Node"), &[]).unwrap();
        (serializer, field)
    }

    #[test]
    fn deep_chains_stop_at_max_depth() {
        let (serializer, field) = chain_serializer(SerializerOptions::default().max_depth);
        // one present bit per level: far deeper than any stack could follow
        let mut bytes = vec![0xFF; 16 * 1024];
        bytes.push(0x00);
        assert!(matches!(
            serializer.from_bytes(&bytes, &field),
            Err(SchemaError::DepthExceeded { max: 64, .. })
        ));
    }

    #[test]
    fn depth_limit_is_exact() {
        let (serializer, field) = chain_serializer(3);
        let three = serializer.from_bytes(&[0b1110_0000], &field).unwrap();
        let Value::Object(head) = &three else {
            panic!("expected an object, got {three:?}");
        };
        assert!(matches!(head.get("next"), Some(Value::Object(_))));
        assert!(matches!(
            serializer.from_bytes(&[0b1111_0000], &field),
            Err(SchemaError::DepthExceeded { max: 3, .. })
        ));

        let mut deep = Value::Null;
        for _ in 0..4 {
            deep = Value::Object(Object::new("Node").with("next", deep));
        }
        assert!(matches!(
            serializer.to_bytes(&deep, &field),
            Err(SchemaError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn zero_width_array_elements_are_rejected() {
        let registry = TypeRegistry::new().with(CompoundType::new("Empty")).unwrap();
        let serializer = BitSerializer::new(registry, SerializerOptions::default()).unwrap();
        let ints = TypeDesc::array(TypeDesc::Int(IntKind::I32));
        let empties = TypeDesc::array(TypeDesc::compound("Empty"));

        for (ty, attrs) in [
            (&ints, vec![Attribute::element(Attribute::range(5, 5))]),
            (&empties, vec![Attribute::element(Attribute::Required)]),
        ] {
            assert!(matches!(
                serializer.descriptor("xs", ty, &attrs),
                Err(SchemaError::InvalidSchema(_))
            ));
        }
        // nullable elements still cost their null bit
        serializer.descriptor("xs", &empties, &[]).unwrap();
        serializer
            .descriptor("xs", &ints, &[Attribute::element(Attribute::range(5, 6))])
            .unwrap();
    }

    #[test]
    fn registry_fields_with_zero_width_elements_are_rejected() {
        let registry = TypeRegistry::new()
            .with(
                CompoundType::new("Flags").field(
                    FieldDef::new("fives", TypeDesc::array(TypeDesc::Int(IntKind::U8)))
                        .with(Attribute::element(Attribute::range(5, 5))),
                ),
            )
            .unwrap();
        assert!(matches!(
            BitSerializer::new(registry, SerializerOptions::default()),
            Err(SchemaError::InvalidSchema(_))
        ));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let serializer = BitSerializer::new(person_registry(), SerializerOptions::default()).unwrap();
        let field = serializer
            .descriptor("person", &TypeDesc::compound("Person"), &[Attribute::Required])
            .unwrap();
        assert!(matches!(
            serializer.from_bytes(&[37, 0x8C], &field),
            Err(SchemaError::Bits(_))
        ));
    }
}
