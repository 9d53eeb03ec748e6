use std::collections::BTreeMap;

use uuid::Uuid;

use crate::types::IntKind;

/// A dynamically typed value the serializer can encode.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    /// Enumeration value by its underlying integer.
    Enum(i64),
    Single(f32),
    /// 64-bit tick count.
    Timestamp(i64),
    Guid(Uuid),
    String(String),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    /// Short kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::U8(_) => "u8",
            Self::I8(_) => "i8",
            Self::U16(_) => "u16",
            Self::I16(_) => "i16",
            Self::U32(_) => "u32",
            Self::I32(_) => "i32",
            Self::U64(_) => "u64",
            Self::I64(_) => "i64",
            Self::Enum(_) => "enum",
            Self::Single(_) => "single",
            Self::Timestamp(_) => "timestamp",
            Self::Guid(_) => "guid",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer payload of integer and enum values.
    pub fn as_int(&self) -> Option<i128> {
        Some(match self {
            Self::U8(v) => i128::from(*v),
            Self::I8(v) => i128::from(*v),
            Self::U16(v) => i128::from(*v),
            Self::I16(v) => i128::from(*v),
            Self::U32(v) => i128::from(*v),
            Self::I32(v) => i128::from(*v),
            Self::U64(v) => i128::from(*v),
            Self::I64(v) => i128::from(*v),
            Self::Enum(v) => i128::from(*v),
            _ => return None,
        })
    }

    /// Build the integer variant for `kind`, or `None` if `value` does not fit.
    pub fn from_int(kind: IntKind, value: i128) -> Option<Self> {
        Some(match kind {
            IntKind::U8 => Self::U8(u8::try_from(value).ok()?),
            IntKind::I8 => Self::I8(i8::try_from(value).ok()?),
            IntKind::U16 => Self::U16(u16::try_from(value).ok()?),
            IntKind::I16 => Self::I16(i16::try_from(value).ok()?),
            IntKind::U32 => Self::U32(u32::try_from(value).ok()?),
            IntKind::I32 => Self::I32(i32::try_from(value).ok()?),
            IntKind::U64 => Self::U64(u64::try_from(value).ok()?),
            IntKind::I64 => Self::I64(i64::try_from(value).ok()?),
        })
    }

    /// Integer kind of a plain integer value.
    pub fn int_kind(&self) -> Option<IntKind> {
        Some(match self {
            Self::U8(_) => IntKind::U8,
            Self::I8(_) => IntKind::I8,
            Self::U16(_) => IntKind::U16,
            Self::I16(_) => IntKind::I16,
            Self::U32(_) => IntKind::U32,
            Self::I32(_) => IntKind::I32,
            Self::U64(_) => IntKind::U64,
            Self::I64(_) => IntKind::I64,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// An instance of a registered compound type.
///
/// `type_name` is the runtime type. It may be a subtype of the declared
/// field type; polymorphic fields pick their type code from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    type_name: String,
    fields: BTreeMap<String, Value>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    char => Char,
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => Single,
    Uuid => Guid,
    String => String,
    Vec<Value> => Array,
    Object => Object,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
