use std::collections::{BTreeMap, HashSet};

use crate::attr::Attribute;
use crate::error::{Result, SchemaError};
use crate::types::TypeDesc;

/// A declared field of a compound type, or a method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeDesc,
    pub attrs: Vec<Attribute>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            name: name.into(),
            ty,
            attrs: Vec::new(),
        }
    }

    /// Attach an attribute.
    pub fn with(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }
}

/// A compound (object) type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundType {
    pub name: String,
    pub base: Option<String>,
    pub is_abstract: bool,
    pub fields: Vec<FieldDef>,
}

impl CompoundType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            is_abstract: false,
            fields: Vec::new(),
        }
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// The set of compound types a serializer knows about.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, CompoundType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. Base types may be registered later; [`validate`](Self::validate)
    /// checks the finished set.
    pub fn register(&mut self, ty: CompoundType) -> Result<()> {
        if self.types.contains_key(&ty.name) {
            return Err(SchemaError::DuplicateType(ty.name));
        }
        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, ty: CompoundType) -> Result<Self> {
        self.register(ty)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&CompoundType> {
        self.types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Whether a value of type `from` can be stored where `target` is declared.
    pub fn is_assignable(&self, target: &str, from: &str) -> bool {
        let mut current = Some(from);
        let mut steps = 0usize;
        while let Some(name) = current {
            if name == target {
                return true;
            }
            steps += 1;
            if steps > self.types.len() {
                return false;
            }
            current = self.types.get(name).and_then(|ty| ty.base.as_deref());
        }
        false
    }

    /// Number of base types above `name`.
    pub fn depth(&self, name: &str) -> usize {
        let mut depth = 0usize;
        let mut current = self.types.get(name).and_then(|ty| ty.base.as_deref());
        while let Some(base) = current {
            depth += 1;
            if depth > self.types.len() {
                break;
            }
            current = self.types.get(base).and_then(|ty| ty.base.as_deref());
        }
        depth
    }

    /// Fields of `name` in wire order: the root base type's fields first,
    /// each level sorted by field name.
    pub fn ordered_fields(&self, name: &str) -> Result<Vec<&FieldDef>> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(type_name) = current {
            let ty = self.get(type_name)?;
            if chain.len() > self.types.len() {
                return Err(SchemaError::InvalidSchema(format!(
                    "inheritance cycle through \"{name}\""
                )));
            }
            chain.push(ty);
            current = ty.base.as_deref();
        }

        let mut fields = Vec::new();
        for ty in chain.into_iter().rev() {
            let mut level: Vec<&FieldDef> = ty.fields.iter().collect();
            level.sort_by(|a, b| a.name.cmp(&b.name));
            fields.extend(level);
        }
        Ok(fields)
    }

    /// Check that every base and referenced type exists, inheritance is
    /// acyclic, and field names are unique within each type's chain.
    pub fn validate(&self) -> Result<()> {
        for ty in self.types.values() {
            if let Some(base) = &ty.base {
                if !self.types.contains_key(base) {
                    return Err(SchemaError::InvalidSchema(format!(
                        "type \"{}\" extends unknown type \"{base}\"",
                        ty.name
                    )));
                }
            }

            let fields = self.ordered_fields(&ty.name)?;
            let mut seen = HashSet::new();
            for field in fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(SchemaError::InvalidSchema(format!(
                        "type \"{}\" declares field \"{}\" more than once",
                        ty.name, field.name
                    )));
                }
                self.check_referenced(&field.ty)?;
            }
        }
        Ok(())
    }

    /// Fail if `ty` names a compound type that is not registered.
    pub fn check_referenced(&self, ty: &TypeDesc) -> Result<()> {
        match ty {
            TypeDesc::Array(element) => self.check_referenced(element),
            TypeDesc::Compound(name) => self.get(name).map(|_| ()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntKind;

    fn shapes() -> TypeRegistry {
        TypeRegistry::new()
            .with(
                CompoundType::new("Shape")
                    .abstract_type()
                    .field(FieldDef::new("name", TypeDesc::String)),
            )
            .unwrap()
            .with(
                CompoundType::new("Circle")
                    .extends("Shape")
                    .field(FieldDef::new("radius", TypeDesc::Int(IntKind::U16))),
            )
            .unwrap()
            .with(
                CompoundType::new("Square")
                    .extends("Shape")
                    .field(FieldDef::new("side", TypeDesc::Int(IntKind::U16)))
                    .field(FieldDef::new("fill", TypeDesc::Bool)),
            )
            .unwrap()
            .with(CompoundType::new("RoundedSquare").extends("Square"))
            .unwrap()
    }

    #[test]
    fn assignability_follows_base_chain() {
        let registry = shapes();
        assert!(registry.is_assignable("Shape", "RoundedSquare"));
        assert!(registry.is_assignable("Square", "Square"));
        assert!(!registry.is_assignable("Square", "Circle"));
        assert!(!registry.is_assignable("Circle", "Shape"));
        assert_eq!(registry.depth("Shape"), 0);
        assert_eq!(registry.depth("RoundedSquare"), 2);
    }

    #[test]
    fn field_order_is_base_first_then_alphabetical() {
        let registry = shapes();
        let names: Vec<_> = registry
            .ordered_fields("Square")
            .unwrap()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "fill", "side"]);
    }

    #[test]
    fn duplicate_registration() {
        let err = shapes().with(CompoundType::new("Circle")).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateType(name) if name == "Circle"));
    }

    #[test]
    fn validate_catches_missing_base_and_references() {
        let registry = TypeRegistry::new()
            .with(CompoundType::new("Orphan").extends("Missing"))
            .unwrap();
        assert!(matches!(registry.validate(), Err(SchemaError::InvalidSchema(_))));

        let registry = TypeRegistry::new()
            .with(
                CompoundType::new("Holder")
                    .field(FieldDef::new("items", TypeDesc::array(TypeDesc::compound("Nope")))),
            )
            .unwrap();
        assert!(matches!(registry.validate(), Err(SchemaError::UnknownType(_))));
    }

    #[test]
    fn validate_catches_cycles_and_shadowed_fields() {
        let registry = TypeRegistry::new()
            .with(CompoundType::new("A").extends("B"))
            .unwrap()
            .with(CompoundType::new("B").extends("A"))
            .unwrap();
        assert!(matches!(registry.validate(), Err(SchemaError::InvalidSchema(_))));
        assert!(!registry.is_assignable("C", "A"));

        let registry = shapes()
            .with(
                CompoundType::new("Named")
                    .extends("Shape")
                    .field(FieldDef::new("name", TypeDesc::String)),
            )
            .unwrap();
        assert!(matches!(registry.validate(), Err(SchemaError::InvalidSchema(_))));
    }

    #[test]
    fn self_reference_is_allowed() {
        let registry = TypeRegistry::new()
            .with(
                CompoundType::new("Node")
                    .field(FieldDef::new("next", TypeDesc::compound("Node"))),
            )
            .unwrap();
        registry.validate().unwrap();
    }
}
