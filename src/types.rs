//! Type descriptor model
//!
//! A property's signature arrives as a tree of [`DeclaredType`]s: raw kinds with
//! generic arguments, array components, wildcards and unresolved type variables,
//! each node carrying its own directives. Resolving a declared type against a
//! [`Bindings`] environment substitutes every type variable and yields an
//! immutable [`TypeDescriptor`] tree that is reused for every trial of a run.
//!
//! Directives stay on the node they were declared on. Two occurrences of the same
//! generic type therefore carry independent constraints on their arguments, and
//! every node gets a positional [`TypeKey`] that only a `Same` directive overrides.

use crate::directives::{Directive, DirectiveKind};
use crate::error::{SetupError, SetupResult};
use std::collections::HashMap;
use std::fmt;

/// Maximum nesting depth followed while resolving declared types
pub const MAX_TYPE_DEPTH: usize = 32;

/// Raw kinds understood by the built-in generators
pub mod kinds {
    pub const BOOL: &str = "bool";
    pub const I8: &str = "i8";
    pub const I16: &str = "i16";
    pub const I32: &str = "i32";
    pub const I64: &str = "i64";
    pub const U8: &str = "u8";
    pub const U16: &str = "u16";
    pub const U32: &str = "u32";
    pub const U64: &str = "u64";
    pub const F32: &str = "f32";
    pub const F64: &str = "f64";
    pub const CHAR: &str = "char";
    pub const STRING: &str = "string";
    pub const BYTES: &str = "bytes";
    pub const LIST: &str = "list";
    pub const SET: &str = "set";
    pub const MAP: &str = "map";
    pub const OPTIONAL: &str = "optional";
    pub const TUPLE: &str = "tuple";
    pub const ARRAY: &str = "array";
    /// Raw kind of wildcard nodes
    pub const WILDCARD: &str = "?";

    pub const INTEGERS: &[&str] = &[I8, I16, I32, I64, U8, U16, U32, U64];

    /// Inclusive value bounds of the built-in integer kinds
    pub fn integer_bounds(raw: &str) -> Option<(i128, i128)> {
        let bounds = match raw {
            I8 => (i8::MIN as i128, i8::MAX as i128),
            I16 => (i16::MIN as i128, i16::MAX as i128),
            I32 => (i32::MIN as i128, i32::MAX as i128),
            I64 => (i64::MIN as i128, i64::MAX as i128),
            U8 => (0, u8::MAX as i128),
            U16 => (0, u16::MAX as i128),
            U32 => (0, u32::MAX as i128),
            U64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(bounds)
    }
}

/// Number of type arguments a raw kind takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

/// Source of declared arities, implemented by the registry
pub trait KindCatalog {
    fn arity(&self, raw: &str) -> Option<Arity>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Array,
    Container,
    Wildcard,
}

/// Stable identity of a descriptor node within one property signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(String);

impl TypeKey {
    /// Key of the root node of parameter `index`
    pub fn parameter(index: usize) -> Self {
        TypeKey(format!("p{}", index))
    }

    /// Key shared by every node marked `Same(label)`
    pub fn shared(label: &str) -> Self {
        TypeKey(format!("same:{}", label))
    }

    pub fn child(&self, position: &str) -> Self {
        TypeKey(format!("{}/{}", self.0, position))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct WildcardBounds {
    pub upper: Option<Box<TypeDescriptor>>,
    pub lower: Option<Box<TypeDescriptor>>,
}

/// Fully substituted, immutable description of a parameter's type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    kind: TypeKind,
    raw: String,
    type_arguments: Vec<TypeDescriptor>,
    array_component: Option<Box<TypeDescriptor>>,
    wildcard_bounds: Option<WildcardBounds>,
    directives: Vec<Directive>,
    key: TypeKey,
}

impl TypeDescriptor {
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn type_arguments(&self) -> &[TypeDescriptor] {
        &self.type_arguments
    }

    pub fn array_component(&self) -> Option<&TypeDescriptor> {
        self.array_component.as_deref()
    }

    pub fn wildcard_bounds(&self) -> Option<&WildcardBounds> {
        self.wildcard_bounds.as_ref()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn has_directive(&self, kind: &DirectiveKind) -> bool {
        self.directives.iter().any(|d| &d.kind() == kind)
    }

    /// Label of this node's `Same` directive, if it has one
    pub fn shared_label(&self) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            Directive::Same(label) => Some(label.as_str()),
            _ => None,
        })
    }

    /// Copy of this node with the given directives in place of its own
    pub fn with_directives(&self, directives: Vec<Directive>) -> Self {
        let mut copy = self.clone();
        copy.directives = directives;
        copy
    }

    /// Declared form of this node, for use as a type-variable binding
    pub fn to_declared(&self) -> DeclaredType {
        let shape = match self.kind {
            TypeKind::Array => match &self.array_component {
                Some(component) => DeclaredShape::Array(Box::new(component.to_declared())),
                None => DeclaredShape::Array(Box::new(DeclaredType::wildcard())),
            },
            TypeKind::Wildcard => {
                let bounds = self.wildcard_bounds.as_ref();
                DeclaredShape::Wildcard {
                    upper: bounds
                        .and_then(|b| b.upper.as_ref())
                        .map(|upper| Box::new(upper.to_declared())),
                    lower: bounds
                        .and_then(|b| b.lower.as_ref())
                        .map(|lower| Box::new(lower.to_declared())),
                }
            }
            TypeKind::Scalar | TypeKind::Container => DeclaredShape::Named {
                raw: self.raw.clone(),
                args: self.type_arguments.iter().map(TypeDescriptor::to_declared).collect(),
            },
        };
        DeclaredType {
            shape,
            directives: self.directives.clone(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TypeKind::Array => match &self.array_component {
                Some(component) => write!(f, "[{}]", component),
                None => write!(f, "[?]"),
            },
            TypeKind::Wildcard => {
                write!(f, "?")?;
                if let Some(bounds) = &self.wildcard_bounds {
                    if let Some(upper) = &bounds.upper {
                        write!(f, " extends {}", upper)?;
                    }
                    if let Some(lower) = &bounds.lower {
                        write!(f, " super {}", lower)?;
                    }
                }
                Ok(())
            }
            _ => {
                write!(f, "{}", self.raw)?;
                if !self.type_arguments.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in self.type_arguments.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

/// Shape of a declared type before substitution
#[derive(Debug, Clone)]
pub enum DeclaredShape {
    Named { raw: String, args: Vec<DeclaredType> },
    Array(Box<DeclaredType>),
    Variable(String),
    Wildcard {
        upper: Option<Box<DeclaredType>>,
        lower: Option<Box<DeclaredType>>,
    },
}

/// A type as written in a property signature or composite declaration
#[derive(Debug, Clone)]
pub struct DeclaredType {
    pub shape: DeclaredShape,
    pub directives: Vec<Directive>,
}

impl DeclaredType {
    fn from_shape(shape: DeclaredShape) -> Self {
        Self {
            shape,
            directives: Vec::new(),
        }
    }

    pub fn named(raw: &str) -> Self {
        Self::from_shape(DeclaredShape::Named {
            raw: raw.to_string(),
            args: Vec::new(),
        })
    }

    pub fn generic(raw: &str, args: Vec<DeclaredType>) -> Self {
        Self::from_shape(DeclaredShape::Named {
            raw: raw.to_string(),
            args,
        })
    }

    pub fn list_of(element: DeclaredType) -> Self {
        Self::generic(kinds::LIST, vec![element])
    }

    pub fn set_of(element: DeclaredType) -> Self {
        Self::generic(kinds::SET, vec![element])
    }

    pub fn map_of(key: DeclaredType, value: DeclaredType) -> Self {
        Self::generic(kinds::MAP, vec![key, value])
    }

    pub fn optional_of(inner: DeclaredType) -> Self {
        Self::generic(kinds::OPTIONAL, vec![inner])
    }

    pub fn tuple_of(elements: Vec<DeclaredType>) -> Self {
        Self::generic(kinds::TUPLE, elements)
    }

    pub fn array_of(component: DeclaredType) -> Self {
        Self::from_shape(DeclaredShape::Array(Box::new(component)))
    }

    pub fn variable(name: &str) -> Self {
        Self::from_shape(DeclaredShape::Variable(name.to_string()))
    }

    pub fn wildcard() -> Self {
        Self::from_shape(DeclaredShape::Wildcard {
            upper: None,
            lower: None,
        })
    }

    pub fn wildcard_extends(bound: DeclaredType) -> Self {
        Self::from_shape(DeclaredShape::Wildcard {
            upper: Some(Box::new(bound)),
            lower: None,
        })
    }

    pub fn wildcard_super(bound: DeclaredType) -> Self {
        Self::from_shape(DeclaredShape::Wildcard {
            upper: None,
            lower: Some(Box::new(bound)),
        })
    }

    /// Attach a directive to this node
    pub fn with(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// Substitute type variables and build the descriptor tree rooted at `key`
    pub fn resolve(
        &self,
        bindings: &Bindings,
        catalog: &dyn KindCatalog,
        key: TypeKey,
    ) -> SetupResult<TypeDescriptor> {
        self.resolve_at(bindings, catalog, key, 0)
    }

    fn resolve_at(
        &self,
        bindings: &Bindings,
        catalog: &dyn KindCatalog,
        key: TypeKey,
        depth: usize,
    ) -> SetupResult<TypeDescriptor> {
        if depth > MAX_TYPE_DEPTH {
            return Err(SetupError::RecursionLimit(MAX_TYPE_DEPTH));
        }
        let node_key = match shared_label(&self.directives) {
            Some(label) => TypeKey::shared(label),
            None => key.clone(),
        };
        match &self.shape {
            DeclaredShape::Variable(name) => {
                let bound = bindings
                    .get(name)
                    .ok_or_else(|| SetupError::UnresolvedTypeVariable(name.clone()))?;
                let mut substituted = bound.clone();
                substituted.directives.extend(self.directives.iter().cloned());
                substituted.resolve_at(bindings, catalog, key, depth + 1)
            }
            DeclaredShape::Named { raw, args } => {
                let kind = match catalog.arity(raw) {
                    Some(Arity::Fixed(expected)) => {
                        if !args.is_empty() && args.len() != expected {
                            return Err(SetupError::ArityMismatch {
                                raw: raw.clone(),
                                expected,
                                found: args.len(),
                            });
                        }
                        if expected > 0 {
                            TypeKind::Container
                        } else {
                            TypeKind::Scalar
                        }
                    }
                    Some(Arity::Variadic) => TypeKind::Container,
                    None if args.is_empty() => TypeKind::Scalar,
                    None => TypeKind::Container,
                };
                let type_arguments = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| {
                        arg.resolve_at(bindings, catalog, key.child(&i.to_string()), depth + 1)
                    })
                    .collect::<SetupResult<Vec<_>>>()?;
                Ok(TypeDescriptor {
                    kind,
                    raw: raw.clone(),
                    type_arguments,
                    array_component: None,
                    wildcard_bounds: None,
                    directives: self.directives.clone(),
                    key: node_key,
                })
            }
            DeclaredShape::Array(component) => {
                let component = component.resolve_at(bindings, catalog, key.child("[]"), depth + 1)?;
                Ok(TypeDescriptor {
                    kind: TypeKind::Array,
                    raw: kinds::ARRAY.to_string(),
                    type_arguments: Vec::new(),
                    array_component: Some(Box::new(component)),
                    wildcard_bounds: None,
                    directives: self.directives.clone(),
                    key: node_key,
                })
            }
            DeclaredShape::Wildcard { upper, lower } => {
                let upper = match upper {
                    Some(bound) => Some(Box::new(bound.resolve_at(
                        bindings,
                        catalog,
                        key.child("+"),
                        depth + 1,
                    )?)),
                    None => None,
                };
                let lower = match lower {
                    Some(bound) => Some(Box::new(bound.resolve_at(
                        bindings,
                        catalog,
                        key.child("-"),
                        depth + 1,
                    )?)),
                    None => None,
                };
                Ok(TypeDescriptor {
                    kind: TypeKind::Wildcard,
                    raw: kinds::WILDCARD.to_string(),
                    type_arguments: Vec::new(),
                    array_component: None,
                    wildcard_bounds: Some(WildcardBounds { upper, lower }),
                    directives: self.directives.clone(),
                    key: node_key,
                })
            }
        }
    }
}

fn shared_label(directives: &[Directive]) -> Option<&str> {
    directives.iter().find_map(|d| match d {
        Directive::Same(label) => Some(label.as_str()),
        _ => None,
    })
}

/// Substitutions for type variables inherited from an enclosing declaration
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    substitutions: HashMap<String, DeclaredType>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, ty: DeclaredType) -> Self {
        self.substitutions.insert(name.to_string(), ty);
        self
    }

    pub fn insert(&mut self, name: &str, ty: DeclaredType) {
        self.substitutions.insert(name.to_string(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&DeclaredType> {
        self.substitutions.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Builtins;

    impl KindCatalog for Builtins {
        fn arity(&self, raw: &str) -> Option<Arity> {
            match raw {
                kinds::LIST | kinds::OPTIONAL => Some(Arity::Fixed(1)),
                kinds::MAP => Some(Arity::Fixed(2)),
                kinds::TUPLE => Some(Arity::Variadic),
                kinds::I32 | kinds::STRING => Some(Arity::Fixed(0)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_variable_substitution() {
        let declared = DeclaredType::list_of(DeclaredType::variable("T"));
        let bindings = Bindings::new().bind("T", DeclaredType::named(kinds::STRING));
        let descriptor = declared
            .resolve(&bindings, &Builtins, TypeKey::parameter(0))
            .unwrap();
        assert_eq!(descriptor.kind(), TypeKind::Container);
        assert_eq!(descriptor.to_string(), "list<string>");
    }

    #[test]
    fn test_unbound_variable_is_error() {
        let declared = DeclaredType::map_of(DeclaredType::named(kinds::I32), DeclaredType::variable("V"));
        let err = declared
            .resolve(&Bindings::new(), &Builtins, TypeKey::parameter(0))
            .unwrap_err();
        assert_eq!(err, SetupError::UnresolvedTypeVariable("V".to_string()));
    }

    #[test]
    fn test_directives_bind_positionally() {
        let declared = DeclaredType::map_of(
            DeclaredType::named(kinds::I32).with(Directive::range(0, 9)),
            DeclaredType::named(kinds::I32).with(Directive::range(100, 200)),
        );
        let descriptor = declared
            .resolve(&Bindings::new(), &Builtins, TypeKey::parameter(2))
            .unwrap();
        assert!(descriptor.directives().is_empty());
        let args = descriptor.type_arguments();
        assert_eq!(args[0].key().as_str(), "p2/0");
        assert_eq!(args[1].key().as_str(), "p2/1");
        assert!(matches!(&args[0].directives()[0], Directive::Range { min: Some(m), .. } if m == "0"));
        assert!(matches!(&args[1].directives()[0], Directive::Range { min: Some(m), .. } if m == "100"));
    }

    #[test]
    fn test_variable_directives_merge_onto_binding() {
        let declared = DeclaredType::variable("T").with(Directive::range(1, 2));
        let bindings = Bindings::new().bind("T", DeclaredType::named(kinds::I32).with(Directive::exclude(vec![1])));
        let descriptor = declared
            .resolve(&bindings, &Builtins, TypeKey::parameter(0))
            .unwrap();
        assert_eq!(descriptor.directives().len(), 2);
    }

    #[test]
    fn test_arity_mismatch() {
        let declared = DeclaredType::generic(
            kinds::MAP,
            vec![DeclaredType::named(kinds::I32)],
        );
        let err = declared
            .resolve(&Bindings::new(), &Builtins, TypeKey::parameter(0))
            .unwrap_err();
        assert!(matches!(err, SetupError::ArityMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_raw_container_allowed() {
        let descriptor = DeclaredType::named(kinds::LIST)
            .resolve(&Bindings::new(), &Builtins, TypeKey::parameter(0))
            .unwrap();
        assert_eq!(descriptor.kind(), TypeKind::Container);
        assert!(descriptor.type_arguments().is_empty());
    }

    #[test]
    fn test_same_directive_overrides_key() {
        let descriptor = DeclaredType::named(kinds::I32)
            .with(Directive::same("shared"))
            .resolve(&Bindings::new(), &Builtins, TypeKey::parameter(3))
            .unwrap();
        assert_eq!(descriptor.key(), &TypeKey::shared("shared"));
        assert_eq!(descriptor.shared_label(), Some("shared"));
    }

    #[test]
    fn test_self_referential_binding_hits_recursion_limit() {
        let bindings = Bindings::new().bind("T", DeclaredType::variable("T"));
        let err = DeclaredType::variable("T")
            .resolve(&bindings, &Builtins, TypeKey::parameter(0))
            .unwrap_err();
        assert_eq!(err, SetupError::RecursionLimit(MAX_TYPE_DEPTH));
    }
}
