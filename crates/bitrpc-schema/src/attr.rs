//! Declarative serialization attributes.

/// What to do when an integer falls outside its declared range on encode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangeViolation {
    /// Fail with [`SchemaError::OutOfRange`](crate::SchemaError::OutOfRange).
    #[default]
    Reject,
    /// Replace the value with the nearest bound.
    Clamp,
}

/// Inclusive integer domain of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: i128,
    pub max: i128,
    pub on_violation: RangeViolation,
}

/// A serialization attribute attached to a field, parameter, method or
/// contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Integer domain; the field takes `precision(min, max)` bits.
    Range(Range),
    /// Maximum string or array length, or the method count bound of a
    /// contract.
    MaxLength(usize),
    /// The reference field is never null and carries no null bit.
    Required,
    /// The field or method is skipped entirely.
    Ignore,
    /// The field may hold `type_name` (or a subtype), tagged with `code`.
    DerivedTypeCode { code: u32, type_name: String },
    /// On decode, store the type code into the named integer field.
    StoreTypeCode(String),
    /// The method expects no response.
    OneWay,
    /// Applies the wrapped attribute to array elements instead of the array.
    Element(Box<Attribute>),
}

impl Attribute {
    /// Range that rejects out-of-range values.
    pub fn range(min: i128, max: i128) -> Self {
        Self::Range(Range {
            min,
            max,
            on_violation: RangeViolation::Reject,
        })
    }

    /// Range that clamps out-of-range values.
    pub fn clamped(min: i128, max: i128) -> Self {
        Self::Range(Range {
            min,
            max,
            on_violation: RangeViolation::Clamp,
        })
    }

    pub fn derived(code: u32, type_name: impl Into<String>) -> Self {
        Self::DerivedTypeCode {
            code,
            type_name: type_name.into(),
        }
    }

    pub fn store_type_code(field: impl Into<String>) -> Self {
        Self::StoreTypeCode(field.into())
    }

    pub fn element(inner: Attribute) -> Self {
        Self::Element(Box::new(inner))
    }
}
