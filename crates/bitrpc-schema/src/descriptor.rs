use std::collections::HashSet;

use bitrpc_bits::{precision_for_span, string_length_bits};

use crate::attr::{Attribute, Range};
use crate::error::{Result, SchemaError};
use crate::options::SerializerOptions;
use crate::range::RangeMap;
use crate::registry::{FieldDef, TypeRegistry};
use crate::types::{IntKind, TypeDesc};

/// One entry of a polymorphic field's type code table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedEntry {
    pub code: u32,
    pub type_name: String,
}

/// Type codes a polymorphic field may carry, most derived types first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTable {
    entries: Vec<DerivedEntry>,
    max_code: u32,
    bits: u32,
}

impl DerivedTable {
    pub fn entries(&self) -> &[DerivedEntry] {
        &self.entries
    }

    pub fn max_code(&self) -> u32 {
        self.max_code
    }

    /// Width of the type code on the wire: `precision(0, max_code)`.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// First entry whose type can hold a value of `runtime_type`.
    pub fn select(&self, registry: &TypeRegistry, runtime_type: &str) -> Option<&DerivedEntry> {
        self.entries
            .iter()
            .find(|entry| registry.is_assignable(&entry.type_name, runtime_type))
    }

    pub fn by_code(&self, code: u64) -> Option<&DerivedEntry> {
        self.entries
            .iter()
            .find(|entry| u64::from(entry.code) == code)
    }
}

/// Resolved encode/decode policy for one field.
///
/// Built once from a declared type and its attributes; it fixes the bit
/// layout of the field and must be used for both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    ty: TypeDesc,
    nullable: bool,
    ignored: bool,
    int: Option<RangeMap>,
    max_length: usize,
    length_bits: u32,
    element: Option<Box<FieldDescriptor>>,
    derived: Option<DerivedTable>,
    store_type_code: Option<(String, IntKind)>,
}

impl FieldDescriptor {
    /// Resolve a declared field.
    pub fn for_field(
        def: &FieldDef,
        options: &SerializerOptions,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        Self::resolve(&def.name, &def.ty, &def.attrs, options, registry)
    }

    /// Resolve `ty` with `attrs`.
    pub fn resolve(
        name: &str,
        ty: &TypeDesc,
        attrs: &[Attribute],
        options: &SerializerOptions,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        let mut range: Option<&Range> = None;
        let mut max_length = None;
        let mut required = false;
        let mut ignored = false;
        let mut derived = Vec::new();
        let mut store = None;
        let mut element_attrs = Vec::new();

        for attr in attrs {
            match attr {
                Attribute::Range(r) => range = Some(r),
                Attribute::MaxLength(n) => max_length = Some(*n),
                Attribute::Required => required = true,
                Attribute::Ignore => ignored = true,
                Attribute::DerivedTypeCode { code, type_name } => derived.push(DerivedEntry {
                    code: *code,
                    type_name: type_name.clone(),
                }),
                Attribute::StoreTypeCode(field) => store = Some(field.as_str()),
                Attribute::OneWay => {
                    return Err(invalid(name, "OneWay applies to methods only"));
                }
                Attribute::Element(inner) => element_attrs.push((**inner).clone()),
            }
        }

        if range.is_some() && ty.int_kind().is_none() {
            return Err(invalid(name, "Range applies to integer fields only"));
        }
        if max_length.is_some() && !matches!(ty, TypeDesc::String | TypeDesc::Array(_)) {
            return Err(invalid(name, "MaxLength applies to strings and arrays only"));
        }
        if !element_attrs.is_empty() && !matches!(ty, TypeDesc::Array(_)) {
            return Err(invalid(name, "element attributes apply to arrays only"));
        }
        if !derived.is_empty() && !matches!(ty, TypeDesc::Compound(_)) {
            return Err(invalid(name, "DerivedTypeCode applies to compound fields only"));
        }

        let mut descriptor = Self {
            name: name.to_string(),
            ty: ty.clone(),
            nullable: ty.is_reference() && !required,
            ignored,
            int: None,
            max_length: 0,
            length_bits: 0,
            element: None,
            derived: None,
            store_type_code: None,
        };

        match ty {
            TypeDesc::Int(kind) | TypeDesc::Enum { repr: kind, .. } => {
                descriptor.int = Some(RangeMap::resolve(*kind, range, name)?);
            }
            TypeDesc::Char => {
                descriptor.max_length = 1;
                descriptor.length_bits = string_length_bits(1);
            }
            TypeDesc::String => {
                let max = max_length.unwrap_or(options.max_string_length);
                descriptor.max_length = max;
                descriptor.length_bits = string_length_bits(max);
            }
            TypeDesc::Array(element) => {
                let max = max_length.unwrap_or(options.max_array_length);
                descriptor.max_length = max;
                descriptor.length_bits = precision_for_span(max as u64);
                descriptor.element = Some(Box::new(Self::resolve(
                    &format!("{name}[]"),
                    element,
                    &element_attrs,
                    options,
                    registry,
                )?));
            }
            TypeDesc::Compound(declared) => {
                registry.get(declared)?;
                if !derived.is_empty() {
                    descriptor.derived = Some(derived_table(name, declared, derived, registry)?);
                }
                if let Some(field) = store {
                    if descriptor.derived.is_none() {
                        return Err(invalid(name, "StoreTypeCode requires DerivedTypeCode"));
                    }
                    descriptor.store_type_code =
                        Some(store_target(name, declared, field, registry)?);
                }
            }
            _ => {}
        }
        if store.is_some() && !matches!(ty, TypeDesc::Compound(_)) {
            return Err(invalid(name, "StoreTypeCode applies to compound fields only"));
        }

        Ok(descriptor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }

    /// Whether a null bit precedes the value.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Integer mapping of integer and enum fields.
    pub fn range_map(&self) -> Option<&RangeMap> {
        self.int.as_ref()
    }

    /// Maximum string length (UTF-16 units) or array length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Width of the length prefix of strings and arrays.
    pub fn length_bits(&self) -> u32 {
        self.length_bits
    }

    /// Descriptor applied to each array element.
    pub fn element(&self) -> Option<&FieldDescriptor> {
        self.element.as_deref()
    }

    pub fn derived(&self) -> Option<&DerivedTable> {
        self.derived.as_ref()
    }

    /// Sibling field that receives the decoded type code.
    pub fn store_type_code(&self) -> Option<(&str, IntKind)> {
        self.store_type_code
            .as_ref()
            .map(|(field, kind)| (field.as_str(), *kind))
    }
}

fn invalid(field: &str, reason: &str) -> SchemaError {
    SchemaError::InvalidSchema(format!("field {field}: {reason}"))
}

fn derived_table(
    field: &str,
    declared: &str,
    mut entries: Vec<DerivedEntry>,
    registry: &TypeRegistry,
) -> Result<DerivedTable> {
    let mut codes = HashSet::new();
    for entry in &entries {
        registry.get(&entry.type_name)?;
        if !registry.is_assignable(declared, &entry.type_name) {
            return Err(invalid(
                field,
                &format!(
                    "derived type \"{}\" is not assignable to \"{declared}\"",
                    entry.type_name
                ),
            ));
        }
        if !codes.insert(entry.code) {
            return Err(SchemaError::DuplicateTypeCode {
                field: field.to_string(),
                code: entry.code,
            });
        }
    }

    // Most derived first, declaration order among equals.
    entries.sort_by_key(|entry| std::cmp::Reverse(registry.depth(&entry.type_name)));
    let max_code = entries.iter().map(|entry| entry.code).max().unwrap_or(0);
    Ok(DerivedTable {
        entries,
        max_code,
        bits: precision_for_span(u64::from(max_code)),
    })
}

fn store_target(
    field: &str,
    declared: &str,
    target: &str,
    registry: &TypeRegistry,
) -> Result<(String, IntKind)> {
    let def = registry
        .ordered_fields(declared)?
        .into_iter()
        .find(|def| def.name == target)
        .ok_or_else(|| {
            invalid(
                field,
                &format!("StoreTypeCode field \"{target}\" is not a field of \"{declared}\""),
            )
        })?;
    match def.ty {
        TypeDesc::Int(kind) => Ok((def.name.clone(), kind)),
        _ => Err(invalid(
            field,
            &format!("StoreTypeCode field \"{target}\" is not an integer"),
        )),
    }
}
