/// Errors raised while resolving schemas or encoding and decoding values.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A compound type name is not registered.
    #[error("unknown type \"{0}\"")]
    UnknownType(String),

    /// A compound type was registered twice.
    #[error("type \"{0}\" is already registered")]
    DuplicateType(String),

    /// A type, field or contract declaration is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Two derived type entries on one field share a code.
    #[error("field {field}: type code {code} is declared more than once")]
    DuplicateTypeCode { field: String, code: u32 },

    /// A range attribute is malformed or does not fit its integer type.
    #[error("field {field}: invalid range [{min}, {max}]: {reason}")]
    InvalidRange {
        field: String,
        min: i128,
        max: i128,
        reason: &'static str,
    },

    /// A range with negative bounds was declared on an unsigned integer.
    #[error("field {field}: range [{min}, {max}] has negative bounds but the field is unsigned")]
    UnsignedRange { field: String, min: i128, max: i128 },

    /// An integer lies outside its declared range and the policy is to reject.
    #[error("field {field}: value {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: i128,
        min: i128,
        max: i128,
    },

    /// A null was given where the field cannot hold one.
    #[error("field {field}: null value is not allowed")]
    NullValue { field: String },

    /// The value does not match the declared type of the field.
    #[error("field {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// A string or array is longer than the field allows.
    #[error("field {field}: length {len} exceeds maximum {max}")]
    LengthExceeded {
        field: String,
        len: usize,
        max: usize,
    },

    /// No derived type entry accepts the runtime type of the value.
    #[error("field {field}: type \"{type_name}\" matches none of the declared derived types")]
    UnknownDerivedType { field: String, type_name: String },

    /// A decoded type code is not in the field's code table.
    #[error("field {field}: no such derived type code {code}")]
    NoSuchTypeCode { field: String, code: u64 },

    /// An abstract type cannot be encoded or instantiated directly.
    #[error("field {field}: type \"{type_name}\" is abstract")]
    AbstractType { field: String, type_name: String },

    /// The value kind has no wire encoding.
    #[error("field {field}: serialization is not implemented for {kind} values")]
    Unsupported { field: String, kind: &'static str },

    /// Arrays and compound values are nested deeper than allowed.
    #[error("field {field}: nesting exceeds the maximum depth of {max}")]
    DepthExceeded { field: String, max: usize },

    /// A method name is not part of the contract.
    #[error("interface {interface} has no method \"{method}\"")]
    UnknownMethod { interface: String, method: String },

    /// A decoded method code is not part of the contract.
    #[error("invalid method code {code} for interface {interface}")]
    NoSuchMethod { interface: String, code: u64 },

    /// A call passed the wrong number of arguments.
    #[error("method {method} takes {expected} arguments, {found} given")]
    Arity {
        method: String,
        expected: usize,
        found: usize,
    },

    /// The underlying bit stream failed.
    #[error(transparent)]
    Bits(#[from] bitrpc_bits::BitsError),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
