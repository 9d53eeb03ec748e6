//! Field descriptors and the bit-packed value serializer.
//!
//! Values are described by a [`TypeDesc`] plus a list of [`Attribute`]s.
//! Resolving the two against a [`TypeRegistry`] and [`SerializerOptions`]
//! yields a [`FieldDescriptor`] that fixes the exact bit layout of the field.
//! The same descriptor must be used to encode and to decode.
//!
//! Compound types are declared up front in the registry. Their field order on
//! the wire is base type first, then each level's own fields sorted by name.
//!
//! ```text
//! struct Person { name: string (max 16), age: u16 range [0, 150] }
//!
//! age:  8 bits  (precision(0, 150))
//! name: 1 null bit, 6-bit byte length, UTF-8 bytes
//! ```

pub mod attr;
pub mod contract;
pub mod descriptor;
pub mod error;
pub mod json;
pub mod options;
pub mod range;
pub mod registry;
pub mod serializer;
pub mod types;
pub mod value;

pub use attr::{Attribute, Range, RangeViolation};
pub use contract::{InterfaceContract, MethodDef, ResolvedContract, ResolvedMethod};
pub use descriptor::{DerivedEntry, DerivedTable, FieldDescriptor};
pub use error::{Result, SchemaError};
pub use json::{from_json, to_json};
pub use options::SerializerOptions;
pub use range::RangeMap;
pub use registry::{CompoundType, FieldDef, TypeRegistry};
pub use serializer::BitSerializer;
pub use types::{IntKind, TypeDesc};
pub use value::{Object, Value};
