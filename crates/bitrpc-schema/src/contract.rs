//! Interface contracts: numbered methods with typed parameters.
//!
//! A call is the method code in `precision(0, method_count)` bits followed by
//! each parameter in declaration order. A two-way method's return value, if
//! it has one, is the whole response payload.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::Arc;

use bitrpc_bits::{precision_for_span, BitReader, BitWriter};
use uuid::Uuid;

use crate::attr::Attribute;
use crate::descriptor::FieldDescriptor;
use crate::error::{Result, SchemaError};
use crate::registry::FieldDef;
use crate::serializer::BitSerializer;
use crate::types::TypeDesc;
use crate::value::Value;

/// A method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<FieldDef>,
    pub returns: Option<FieldDef>,
    pub attrs: Vec<Attribute>,
}

impl MethodDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            attrs: Vec::new(),
        }
    }

    pub fn param(mut self, param: FieldDef) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: TypeDesc) -> Self {
        self.returns = Some(FieldDef::new("return", ty));
        self
    }

    /// Return type with serialization attributes.
    pub fn returns_with(mut self, ty: TypeDesc, attrs: Vec<Attribute>) -> Self {
        self.returns = Some(FieldDef {
            name: "return".to_string(),
            ty,
            attrs,
        });
        self
    }

    pub fn one_way(self) -> Self {
        self.with(Attribute::OneWay)
    }

    pub fn with(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn is_one_way(&self) -> bool {
        self.attrs.contains(&Attribute::OneWay)
    }

    pub fn is_ignored(&self) -> bool {
        self.attrs.contains(&Attribute::Ignore)
    }
}

/// An interface identified by a GUID, with methods numbered in declaration
/// order (ignored methods take no number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceContract {
    pub id: Uuid,
    pub name: String,
    pub methods: Vec<MethodDef>,
    pub attrs: Vec<Attribute>,
}

impl InterfaceContract {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            methods: Vec::new(),
            attrs: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Attach an interface attribute. `MaxLength(n)` reserves method codes
    /// `0..n` so methods can be added later without changing the code width.
    pub fn with(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }
}

/// A method with resolved parameter and return descriptors.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    name: String,
    code: u32,
    one_way: bool,
    params: Vec<FieldDescriptor>,
    returns: Option<FieldDescriptor>,
}

impl ResolvedMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn is_one_way(&self) -> bool {
        self.one_way
    }

    pub fn params(&self) -> &[FieldDescriptor] {
        &self.params
    }

    pub fn returns(&self) -> Option<&FieldDescriptor> {
        self.returns.as_ref()
    }
}

/// An [`InterfaceContract`] bound to a serializer, ready to encode calls.
#[derive(Debug, Clone)]
pub struct ResolvedContract {
    id: Uuid,
    name: String,
    method_bits: u32,
    methods: Vec<ResolvedMethod>,
    serializer: Arc<BitSerializer>,
}

impl ResolvedContract {
    pub fn resolve(contract: &InterfaceContract, serializer: Arc<BitSerializer>) -> Result<Self> {
        let invalid = |reason: String| {
            SchemaError::InvalidSchema(format!("interface {}: {reason}", contract.name))
        };

        let active: Vec<&MethodDef> = contract.methods.iter().filter(|m| !m.is_ignored()).collect();
        let max_methods = contract.attrs.iter().find_map(|attr| match attr {
            Attribute::MaxLength(n) => Some(*n),
            _ => None,
        });
        let method_bits = match max_methods {
            Some(max) if active.len() >= max => {
                return Err(invalid(format!(
                    "{} methods do not fit MaxLength({max})",
                    active.len()
                )))
            }
            Some(max) => precision_for_span(max as u64),
            None => precision_for_span(active.len() as u64),
        };

        let mut names = HashSet::new();
        let mut methods = Vec::with_capacity(active.len());
        for (code, def) in active.into_iter().enumerate() {
            if !names.insert(def.name.as_str()) {
                return Err(invalid(format!("method \"{}\" is declared twice", def.name)));
            }
            if let Some(attr) = def
                .attrs
                .iter()
                .find(|attr| !matches!(attr, Attribute::OneWay | Attribute::Ignore))
            {
                return Err(invalid(format!(
                    "method \"{}\": {attr:?} does not apply to methods",
                    def.name
                )));
            }
            let one_way = def.is_one_way();
            if one_way && def.returns.is_some() {
                return Err(invalid(format!(
                    "one-way method \"{}\" cannot return a value",
                    def.name
                )));
            }

            let params = def
                .params
                .iter()
                .map(|param| serializer.descriptor(&param.name, &param.ty, &param.attrs))
                .collect::<Result<Vec<_>>>()?;
            let returns = def
                .returns
                .as_ref()
                .map(|ret| {
                    serializer.descriptor(&format!("{}.return", def.name), &ret.ty, &ret.attrs)
                })
                .transpose()?;

            methods.push(ResolvedMethod {
                name: def.name.clone(),
                code: code as u32,
                one_way,
                params,
                returns,
            });
        }

        Ok(Self {
            id: contract.id,
            name: contract.name.clone(),
            method_bits,
            methods,
            serializer,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the method code.
    pub fn method_bits(&self) -> u32 {
        self.method_bits
    }

    pub fn methods(&self) -> &[ResolvedMethod] {
        &self.methods
    }

    pub fn serializer(&self) -> &BitSerializer {
        &self.serializer
    }

    pub fn method(&self, name: &str) -> Result<&ResolvedMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| SchemaError::UnknownMethod {
                interface: self.name.clone(),
                method: name.to_string(),
            })
    }

    pub fn method_by_code(&self, code: u64) -> Result<&ResolvedMethod> {
        usize::try_from(code)
            .ok()
            .and_then(|index| self.methods.get(index))
            .ok_or_else(|| SchemaError::NoSuchMethod {
                interface: self.name.clone(),
                code,
            })
    }

    /// Write the method code and arguments. Nothing is flushed.
    pub fn encode_call<W: Write>(
        &self,
        writer: &mut BitWriter<W>,
        method: &ResolvedMethod,
        args: &[Value],
    ) -> Result<()> {
        if args.len() != method.params.len() {
            return Err(SchemaError::Arity {
                method: method.name.clone(),
                expected: method.params.len(),
                found: args.len(),
            });
        }
        writer.write(u64::from(method.code), self.method_bits)?;
        for (param, arg) in method.params.iter().zip(args) {
            self.serializer.encode(writer, arg, param)?;
        }
        Ok(())
    }

    /// Read a call written by [`encode_call`](Self::encode_call).
    pub fn decode_call<R: Read>(
        &self,
        reader: &mut BitReader<R>,
    ) -> Result<(&ResolvedMethod, Vec<Value>)> {
        let code = reader.read(self.method_bits)?;
        let method = self.method_by_code(code)?;
        let args = method
            .params
            .iter()
            .map(|param| self.serializer.decode(reader, param))
            .collect::<Result<Vec<_>>>()?;
        Ok((method, args))
    }

    /// Write a two-way method's return value. Methods without a return type
    /// accept only `Value::Null` and write nothing.
    pub fn encode_return<W: Write>(
        &self,
        writer: &mut BitWriter<W>,
        method: &ResolvedMethod,
        value: &Value,
    ) -> Result<()> {
        match &method.returns {
            Some(ret) => self.serializer.encode(writer, value, ret),
            None if value.is_null() => Ok(()),
            None => Err(SchemaError::TypeMismatch {
                field: format!("{}.return", method.name),
                expected: "no value".to_string(),
                found: value.kind_name().to_string(),
            }),
        }
    }

    /// Read a return value written by [`encode_return`](Self::encode_return).
    pub fn decode_return<R: Read>(
        &self,
        reader: &mut BitReader<R>,
        method: &ResolvedMethod,
    ) -> Result<Option<Value>> {
        method
            .returns
            .as_ref()
            .map(|ret| self.serializer.decode(reader, ret))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SerializerOptions;
    use crate::registry::TypeRegistry;
    use crate::types::IntKind;

    fn calculator() -> InterfaceContract {
        InterfaceContract::new(Uuid::from_u128(42), "Calculator")
            .method(
                MethodDef::new("add")
                    .param(FieldDef::new("a", TypeDesc::Int(IntKind::I32)))
                    .param(FieldDef::new("b", TypeDesc::Int(IntKind::I32)))
                    .returns(TypeDesc::Int(IntKind::I64)),
            )
            .method(MethodDef::new("debug").with(Attribute::Ignore))
            .method(
                MethodDef::new("log")
                    .param(
                        FieldDef::new("line", TypeDesc::String)
                            .with(Attribute::MaxLength(80))
                            .with(Attribute::Required),
                    )
                    .one_way(),
            )
            .method(MethodDef::new("reset"))
    }

    fn serializer() -> Arc<BitSerializer> {
        Arc::new(BitSerializer::new(TypeRegistry::new(), SerializerOptions::default()).unwrap())
    }

    #[test]
    fn numbering_skips_ignored_methods() {
        let contract = ResolvedContract::resolve(&calculator(), serializer()).unwrap();
        assert_eq!(contract.method_bits(), 2);
        assert_eq!(contract.method("add").unwrap().code(), 0);
        assert_eq!(contract.method("log").unwrap().code(), 1);
        assert!(contract.method("log").unwrap().is_one_way());
        assert_eq!(contract.method("reset").unwrap().code(), 2);
        assert!(matches!(
            contract.method("debug"),
            Err(SchemaError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn call_roundtrip() {
        let contract = ResolvedContract::resolve(&calculator(), serializer()).unwrap();
        let add = contract.method("add").unwrap();

        let mut writer = BitWriter::new(Vec::new());
        contract
            .encode_call(&mut writer, add, &[Value::I32(2), Value::I32(-5)])
            .unwrap();
        assert_eq!(writer.bits_written(), 2 + 64);
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(bytes.as_slice());
        let (method, args) = contract.decode_call(&mut reader).unwrap();
        assert_eq!(method.name(), "add");
        assert_eq!(args, vec![Value::I32(2), Value::I32(-5)]);
    }

    #[test]
    fn return_values() {
        let contract = ResolvedContract::resolve(&calculator(), serializer()).unwrap();
        let add = contract.method("add").unwrap();
        let reset = contract.method("reset").unwrap();

        let mut writer = BitWriter::new(Vec::new());
        contract.encode_return(&mut writer, add, &Value::I64(-3)).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(bytes.as_slice());
        assert_eq!(
            contract.decode_return(&mut reader, add).unwrap(),
            Some(Value::I64(-3))
        );

        let mut writer = BitWriter::new(Vec::new());
        contract.encode_return(&mut writer, reset, &Value::Null).unwrap();
        assert!(writer.finish().unwrap().is_empty());
        assert!(contract
            .encode_return(&mut BitWriter::new(Vec::new()), reset, &Value::Bool(true))
            .is_err());
        let mut reader = BitReader::new(&[][..]);
        assert_eq!(contract.decode_return(&mut reader, reset).unwrap(), None);
    }

    #[test]
    fn arity_and_bad_codes() {
        let contract = ResolvedContract::resolve(&calculator(), serializer()).unwrap();
        let add = contract.method("add").unwrap();
        assert!(matches!(
            contract.encode_call(&mut BitWriter::new(Vec::new()), add, &[Value::I32(1)]),
            Err(SchemaError::Arity { expected: 2, found: 1, .. })
        ));

        let mut reader = BitReader::new(&[0b1100_0000u8][..]);
        assert!(matches!(
            contract.decode_call(&mut reader),
            Err(SchemaError::NoSuchMethod { code: 3, .. })
        ));
    }

    #[test]
    fn max_length_fixes_code_width() {
        let contract = ResolvedContract::resolve(
            &calculator().with(Attribute::MaxLength(16)),
            serializer(),
        )
        .unwrap();
        assert_eq!(contract.method_bits(), 5);

        let err = ResolvedContract::resolve(&calculator().with(Attribute::MaxLength(3)), serializer())
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
    }

    #[test]
    fn one_way_methods_cannot_return() {
        let contract = InterfaceContract::new(Uuid::nil(), "Bad").method(
            MethodDef::new("fire")
                .one_way()
                .returns(TypeDesc::Bool),
        );
        assert!(matches!(
            ResolvedContract::resolve(&contract, serializer()),
            Err(SchemaError::InvalidSchema(_))
        ));
    }
}
