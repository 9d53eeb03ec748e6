use std::fmt;

/// Width and signedness of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
}

impl IntKind {
    /// Native width in bits.
    pub fn bits(self) -> u32 {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::U16 | Self::I16 => 16,
            Self::U32 | Self::I32 => 32,
            Self::U64 | Self::I64 => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Smallest representable value.
    pub fn min(self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.bits() - 1))
        } else {
            0
        }
    }

    /// Largest representable value.
    pub fn max(self) -> i128 {
        if self.is_signed() {
            (1i128 << (self.bits() - 1)) - 1
        } else {
            (1i128 << self.bits()) - 1
        }
    }

    pub fn contains(self, value: i128) -> bool {
        (self.min()..=self.max()).contains(&value)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
        }
    }
}

/// Declared type of a field, parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Bool,
    /// A single UTF-16 code unit, sent as a one-character string.
    Char,
    Int(IntKind),
    /// 32-bit float, sent as 4 raw bytes.
    Single,
    /// 64-bit tick count.
    Timestamp,
    /// No wire encoding.
    Double,
    /// No wire encoding.
    Decimal,
    /// 16 raw bytes.
    Guid,
    String,
    /// Named enumeration carried as its underlying integer.
    Enum { name: String, repr: IntKind },
    Array(Box<TypeDesc>),
    /// A compound type registered in the [`TypeRegistry`](crate::TypeRegistry).
    Compound(String),
}

impl TypeDesc {
    pub fn array(element: TypeDesc) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn compound(name: impl Into<String>) -> Self {
        Self::Compound(name.into())
    }

    pub fn enumeration(name: impl Into<String>, repr: IntKind) -> Self {
        Self::Enum {
            name: name.into(),
            repr,
        }
    }

    /// Reference types carry a null bit unless the field is `Required`.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::String | Self::Array(_) | Self::Compound(_))
    }

    /// Integer kind of integer and enum types.
    pub fn int_kind(&self) -> Option<IntKind> {
        match self {
            Self::Int(kind) => Some(*kind),
            Self::Enum { repr, .. } => Some(*repr),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Char => f.write_str("char"),
            Self::Int(kind) => f.write_str(kind.name()),
            Self::Single => f.write_str("single"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Double => f.write_str("double"),
            Self::Decimal => f.write_str("decimal"),
            Self::Guid => f.write_str("guid"),
            Self::String => f.write_str("string"),
            Self::Enum { name, .. } => write!(f, "enum {name}"),
            Self::Array(element) => write!(f, "[{element}]"),
            Self::Compound(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_bounds() {
        assert_eq!(IntKind::U8.max(), 255);
        assert_eq!(IntKind::I8.min(), -128);
        assert_eq!(IntKind::U64.max(), u64::MAX as i128);
        assert_eq!(IntKind::I64.min(), i64::MIN as i128);
        assert!(!IntKind::U16.contains(-1));
        assert!(IntKind::I32.contains(-5));
    }

    #[test]
    fn reference_types() {
        assert!(TypeDesc::String.is_reference());
        assert!(TypeDesc::array(TypeDesc::Bool).is_reference());
        assert!(TypeDesc::compound("Shape").is_reference());
        assert!(!TypeDesc::Guid.is_reference());
        assert!(!TypeDesc::Int(IntKind::I32).is_reference());
    }

    #[test]
    fn display() {
        let ty = TypeDesc::array(TypeDesc::enumeration("Color", IntKind::U8));
        assert_eq!(ty.to_string(), "[enum Color]");
    }
}
