//! Generator registry
//!
//! A [`Registry`] is an explicit arena of [`GeneratorRegistration`]s plus the
//! user-declared composite and enum types the resolver may fall back on. It is
//! passed to each run by reference and never mutated while resolving, so runs
//! with different registries are independent.

use crate::directives::DirectiveKind;
use crate::error::{SetupError, SetupResult};
use crate::generator::{
    BoxedGenerator, BooleanGenerator, BytesGenerator, CharGenerator, EnumGenerator,
    FloatGenerator, GeneratorExt, IntegerGenerator, ListGenerator, MapGenerator,
    OptionalGenerator, SequenceKind, StringGenerator, TupleGenerator, ValueBuilder,
};
use crate::types::{kinds, Arity, DeclaredType, KindCatalog, TypeDescriptor, MAX_TYPE_DEPTH};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh generator for a matched node
pub type GeneratorFactory = Arc<dyn Fn(&TypeDescriptor) -> BoxedGenerator + Send + Sync>;

/// Structural match on a descriptor node
pub type TypePredicate = Arc<dyn Fn(&TypeDescriptor) -> bool + Send + Sync>;

/// What a registered generator produces, which is also how it is matched
#[derive(Clone)]
pub enum Produces {
    /// Nodes whose raw kind is exactly this one
    Exact(String),
    /// Any node the predicate accepts; ranked below exact matches
    Structural { label: String, predicate: TypePredicate },
    /// Synthesised composite wrappers. These are built on demand by the
    /// resolver and can never be registered.
    AutoComposite,
}

impl Produces {
    pub fn matches(&self, node: &TypeDescriptor) -> bool {
        match self {
            Produces::Exact(raw) => node.raw() == raw,
            Produces::Structural { predicate, .. } => predicate(node),
            Produces::AutoComposite => false,
        }
    }

    /// Higher is more specific
    pub fn specificity(&self) -> u8 {
        match self {
            Produces::Exact(_) => 2,
            Produces::Structural { .. } => 1,
            Produces::AutoComposite => 0,
        }
    }
}

impl fmt::Display for Produces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Produces::Exact(raw) => write!(f, "`{}`", raw),
            Produces::Structural { label, .. } => write!(f, "{}", label),
            Produces::AutoComposite => write!(f, "an auto composite"),
        }
    }
}

impl fmt::Debug for Produces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Produces({})", self)
    }
}

/// One way of producing values for matching nodes
#[derive(Clone)]
pub struct GeneratorRegistration {
    name: String,
    produces: Produces,
    factory: GeneratorFactory,
    supported: Vec<DirectiveKind>,
    arity: Option<Arity>,
}

impl GeneratorRegistration {
    pub fn new<F>(name: &str, produces: Produces, factory: F) -> Self
    where
        F: Fn(&TypeDescriptor) -> BoxedGenerator + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            produces,
            factory: Arc::new(factory),
            supported: Vec::new(),
            arity: None,
        }
    }

    /// Registration for nodes of exactly `raw`, named after it
    pub fn exact<F>(raw: &str, factory: F) -> Self
    where
        F: Fn(&TypeDescriptor) -> BoxedGenerator + Send + Sync + 'static,
    {
        Self::new(raw, Produces::Exact(raw.to_string()), factory)
    }

    pub fn structural<P, F>(name: &str, label: &str, predicate: P, factory: F) -> Self
    where
        P: Fn(&TypeDescriptor) -> bool + Send + Sync + 'static,
        F: Fn(&TypeDescriptor) -> BoxedGenerator + Send + Sync + 'static,
    {
        let produces = Produces::Structural {
            label: label.to_string(),
            predicate: Arc::new(predicate),
        };
        Self::new(name, produces, factory)
    }

    /// Declare the generator-local directive kinds the generator understands
    pub fn supporting(mut self, kinds: &[DirectiveKind]) -> Self {
        self.supported = kinds.to_vec();
        self
    }

    /// Declare the number of type arguments the produced kind takes
    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn produces(&self) -> &Produces {
        &self.produces
    }

    pub fn supported(&self) -> &[DirectiveKind] {
        &self.supported
    }

    pub fn matches(&self, node: &TypeDescriptor) -> bool {
        self.produces.matches(node)
    }

    /// Whether every kind in `required` is supported
    pub fn supports_all(&self, required: &[DirectiveKind]) -> bool {
        required.iter().all(|kind| self.supported.contains(kind))
    }

    pub fn create(&self, node: &TypeDescriptor) -> BoxedGenerator {
        (self.factory)(node)
    }
}

impl fmt::Debug for GeneratorRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistration")
            .field("name", &self.name)
            .field("produces", &self.produces)
            .field("supported", &self.supported)
            .finish()
    }
}

/// A constructor of a composite type
#[derive(Debug, Clone)]
pub struct Constructor {
    pub params: Vec<(String, DeclaredType)>,
    pub accessible: bool,
}

impl Constructor {
    pub fn new(params: Vec<(&str, DeclaredType)>) -> Self {
        Self {
            params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
            accessible: true,
        }
    }

    pub fn private(params: Vec<(&str, DeclaredType)>) -> Self {
        Self {
            accessible: false,
            ..Self::new(params)
        }
    }
}

/// A field of a composite type
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub declared: DeclaredType,
    pub is_static: bool,
    pub is_final: bool,
}

impl Field {
    pub fn new(name: &str, declared: DeclaredType) -> Self {
        Self {
            name: name.to_string(),
            declared,
            is_static: false,
            is_final: false,
        }
    }

    pub fn constant(name: &str, declared: DeclaredType) -> Self {
        Self {
            is_static: true,
            is_final: true,
            ..Self::new(name, declared)
        }
    }

    /// Instance fields that can be assigned after construction
    pub fn is_assignable(&self) -> bool {
        !self.is_static && !self.is_final
    }
}

/// Slots of a user-defined type, enumerated explicitly rather than reflected
#[derive(Clone)]
pub struct CompositeType {
    pub name: String,
    pub type_params: Vec<String>,
    pub parent: Option<String>,
    pub constructors: Vec<Constructor>,
    pub fields: Vec<Field>,
    pub is_abstract: bool,
    pub builder: Option<ValueBuilder>,
}

impl CompositeType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_params: Vec::new(),
            parent: None,
            constructors: Vec::new(),
            fields: Vec::new(),
            is_abstract: false,
            builder: None,
        }
    }

    pub fn type_params(mut self, params: &[&str]) -> Self {
        self.type_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Inherit the fields of another registered composite
    pub fn extends(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(Vec<(String, crate::value::Value)>) -> Result<crate::value::Value, String>
            + Send
            + Sync
            + 'static,
    {
        self.builder = Some(Arc::new(builder));
        self
    }
}

impl fmt::Debug for CompositeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeType")
            .field("name", &self.name)
            .field("type_params", &self.type_params)
            .field("parent", &self.parent)
            .field("constructors", &self.constructors)
            .field("fields", &self.fields)
            .field("is_abstract", &self.is_abstract)
            .finish()
    }
}

/// Registrations, composite declarations and enum declarations
#[derive(Debug, Clone, Default)]
pub struct Registry {
    registrations: Vec<GeneratorRegistration>,
    composites: HashMap<String, CompositeType>,
    enums: HashMap<String, Vec<String>>,
}

impl Registry {
    /// Registry with nothing registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in generators
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for registration in builtin_registrations() {
            registry.registrations.push(registration);
        }
        registry
    }

    /// Add a registration. Names must be unique, and synthesised composite
    /// generators cannot be registered.
    pub fn register(&mut self, registration: GeneratorRegistration) -> SetupResult<()> {
        if let Produces::AutoComposite = registration.produces {
            return Err(SetupError::IllegalArgument(format!(
                "generator `{}` produces an auto composite and cannot be registered",
                registration.name
            )));
        }
        if self.named(&registration.name).is_some() {
            return Err(SetupError::IllegalArgument(format!(
                "a generator named `{}` is already registered",
                registration.name
            )));
        }
        log::debug!("registering generator `{}` for {}", registration.name, registration.produces);
        self.registrations.push(registration);
        Ok(())
    }

    /// Declare an enum type with a finite set of variants, in declaration order
    pub fn register_enum(&mut self, name: &str, variants: &[&str]) -> SetupResult<()> {
        if variants.is_empty() {
            return Err(SetupError::IllegalArgument(format!("enum `{}` has no variants", name)));
        }
        let variants: Vec<String> = variants.iter().map(|v| v.to_string()).collect();
        let for_factory = variants.clone();
        let type_name = name.to_string();
        self.register(GeneratorRegistration::exact(name, move |_| {
            EnumGenerator::new(&type_name, &for_factory).boxed()
        }))?;
        self.enums.insert(name.to_string(), variants);
        Ok(())
    }

    /// Declare a composite type the resolver may build by constructor or fields
    pub fn register_composite(&mut self, composite: CompositeType) -> SetupResult<()> {
        if self.composites.contains_key(&composite.name) || self.named(&composite.name).is_some() {
            return Err(SetupError::IllegalArgument(format!(
                "type `{}` is already registered",
                composite.name
            )));
        }
        self.composites.insert(composite.name.clone(), composite);
        Ok(())
    }

    pub fn registrations(&self) -> &[GeneratorRegistration] {
        &self.registrations
    }

    pub fn named(&self, name: &str) -> Option<&GeneratorRegistration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    /// Registrations matching `node`, most specific first, then in registration order
    pub fn candidates(&self, node: &TypeDescriptor) -> Vec<&GeneratorRegistration> {
        let mut matching: Vec<&GeneratorRegistration> =
            self.registrations.iter().filter(|r| r.matches(node)).collect();
        // Stable, so registration order breaks ties
        matching.sort_by(|a, b| b.produces.specificity().cmp(&a.produces.specificity()));
        matching
    }

    pub fn composite(&self, name: &str) -> Option<&CompositeType> {
        self.composites.get(name)
    }

    pub fn enum_variants(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(Vec::as_slice)
    }

    /// Assignable fields of `composite`, inherited fields first
    pub fn instance_fields<'a>(&'a self, composite: &'a CompositeType) -> SetupResult<Vec<&'a Field>> {
        let mut chain = vec![composite];
        let mut current = composite;
        while let Some(parent) = current.parent.clone() {
            if chain.len() > MAX_TYPE_DEPTH {
                return Err(SetupError::RecursionLimit(MAX_TYPE_DEPTH));
            }
            current = self
                .composite(&parent)
                .ok_or(SetupError::NoSuitableGenerator(parent))?;
            chain.push(current);
        }
        Ok(chain
            .into_iter()
            .rev()
            .flat_map(|c| c.fields.iter())
            .filter(|f| f.is_assignable())
            .collect())
    }
}

impl KindCatalog for Registry {
    fn arity(&self, raw: &str) -> Option<Arity> {
        if let Some(composite) = self.composites.get(raw) {
            return Some(Arity::Fixed(composite.type_params.len()));
        }
        self.registrations.iter().find_map(|r| match &r.produces {
            Produces::Exact(kind) if kind == raw => r.arity,
            _ => None,
        })
    }
}

fn builtin_registrations() -> Vec<GeneratorRegistration> {
    let mut builtins = vec![GeneratorRegistration::exact(kinds::BOOL, |_| BooleanGenerator.boxed())
        .with_arity(Arity::Fixed(0))];
    for &raw in kinds::INTEGERS {
        builtins.push(
            GeneratorRegistration::exact(raw, move |_| IntegerGenerator::new(raw).boxed())
                .supporting(&[DirectiveKind::Range])
                .with_arity(Arity::Fixed(0)),
        );
    }
    for &raw in [kinds::F32, kinds::F64].iter() {
        builtins.push(
            GeneratorRegistration::exact(raw, move |_| FloatGenerator::new(raw).boxed())
                .supporting(&[DirectiveKind::Range, DirectiveKind::Precision])
                .with_arity(Arity::Fixed(0)),
        );
    }
    builtins.extend(vec![
        GeneratorRegistration::exact(kinds::CHAR, |_| CharGenerator::default().boxed())
            .supporting(&[DirectiveKind::Range])
            .with_arity(Arity::Fixed(0)),
        GeneratorRegistration::exact(kinds::STRING, |_| StringGenerator::default().boxed())
            .supporting(&[DirectiveKind::Size])
            .with_arity(Arity::Fixed(0)),
        GeneratorRegistration::exact(kinds::BYTES, |_| BytesGenerator::default().boxed())
            .supporting(&[DirectiveKind::Size])
            .with_arity(Arity::Fixed(0)),
        GeneratorRegistration::exact(kinds::LIST, |_| ListGenerator::new(SequenceKind::List).boxed())
            .supporting(&[DirectiveKind::Size])
            .with_arity(Arity::Fixed(1)),
        GeneratorRegistration::exact(kinds::SET, |_| ListGenerator::new(SequenceKind::Set).boxed())
            .supporting(&[DirectiveKind::Size])
            .with_arity(Arity::Fixed(1)),
        GeneratorRegistration::exact(kinds::ARRAY, |_| ListGenerator::new(SequenceKind::Array).boxed())
            .supporting(&[DirectiveKind::Size]),
        GeneratorRegistration::exact(kinds::MAP, |_| MapGenerator::new().boxed())
            .supporting(&[DirectiveKind::Size])
            .with_arity(Arity::Fixed(2)),
        GeneratorRegistration::exact(kinds::OPTIONAL, |_| OptionalGenerator::new().boxed())
            .with_arity(Arity::Fixed(1)),
        GeneratorRegistration::exact(kinds::TUPLE, |node| {
            TupleGenerator::new(node.type_arguments().len()).boxed()
        })
        .with_arity(Arity::Variadic),
    ]);
    builtins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeKey, TypeKind};

    fn node(ty: DeclaredType, registry: &Registry) -> TypeDescriptor {
        ty.resolve(&crate::types::Bindings::new(), registry, TypeKey::parameter(0))
            .unwrap()
    }

    #[test]
    fn test_builtins_declare_arities() {
        let registry = Registry::new();
        assert_eq!(registry.arity(kinds::LIST), Some(Arity::Fixed(1)));
        assert_eq!(registry.arity(kinds::MAP), Some(Arity::Fixed(2)));
        assert_eq!(registry.arity(kinds::TUPLE), Some(Arity::Variadic));
        assert_eq!(registry.arity(kinds::I32), Some(Arity::Fixed(0)));
        assert_eq!(registry.arity("Unknown"), None);
    }

    #[test]
    fn test_auto_composite_cannot_be_registered() {
        let mut registry = Registry::empty();
        let registration = GeneratorRegistration::new("auto", Produces::AutoComposite, |_| {
            BooleanGenerator.boxed()
        });
        assert!(matches!(
            registry.register(registration),
            Err(SetupError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = Registry::new();
        let duplicate = GeneratorRegistration::exact(kinds::BOOL, |_| BooleanGenerator.boxed());
        assert!(registry.register(duplicate).is_err());
    }

    #[test]
    fn test_exact_ranks_above_structural() {
        let mut registry = Registry::new();
        registry
            .register(GeneratorRegistration::structural(
                "scalars",
                "any scalar",
                |node| node.kind() == TypeKind::Scalar,
                |_| BooleanGenerator.boxed(),
            ))
            .unwrap();
        let bool_node = node(DeclaredType::named(kinds::BOOL), &registry);
        let candidates = registry.candidates(&bool_node);
        let names: Vec<&str> = candidates.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec![kinds::BOOL, "scalars"]);
    }

    #[test]
    fn test_enum_registration_is_exact() {
        let mut registry = Registry::new();
        registry.register_enum("Colour", &["Red", "Green"]).unwrap();
        assert_eq!(registry.enum_variants("Colour").unwrap().len(), 2);
        let colour = node(DeclaredType::named("Colour"), &registry);
        assert_eq!(registry.candidates(&colour).len(), 1);
        assert!(registry.register_enum("Empty", &[]).is_err());
    }

    #[test]
    fn test_instance_fields_include_inherited() {
        let mut registry = Registry::new();
        registry
            .register_composite(
                CompositeType::new("Base")
                    .field(Field::new("id", DeclaredType::named(kinds::I64)))
                    .field(Field::constant("VERSION", DeclaredType::named(kinds::I32))),
            )
            .unwrap();
        registry
            .register_composite(
                CompositeType::new("Derived")
                    .extends("Base")
                    .field(Field::new("label", DeclaredType::named(kinds::STRING))),
            )
            .unwrap();
        let derived = registry.composite("Derived").unwrap();
        let fields = registry.instance_fields(derived).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "label"]);
    }
}
