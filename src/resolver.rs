//! Resolution of type descriptors to generators
//!
//! For each node the resolver:
//!
//! 1. validates the node's directives;
//! 2. builds the base generator, from an explicit `Using` selection, from a
//!    wildcard's bounds, from the most specific registration that supports the
//!    node's generator-local directives, or from a composite declaration;
//! 3. injects component generators resolved from the node's own children, so
//!    every child carries its own directives;
//! 4. wraps the result with the node-local directives (`Only`, `Also`,
//!    `Exclude`, `Satisfies`, `Same`).

use crate::directives::{
    convert_scalar_literal, generator_local_kinds, validate_directives, Directive, DirectiveScope,
    ValuePredicate,
};
use crate::error::{SetupError, SetupResult};
use crate::generator::{
    AlsoGenerator, AnyGenerator, BoxedGenerator, CompositeGenerator, CompositeStrategy, Correlated,
    Generator, GeneratorExt, NodeFilter, OnlyGenerator, WeightedChoice,
};
use crate::registry::{CompositeType, GeneratorRegistration, Registry};
use crate::types::{Bindings, DeclaredType, TypeDescriptor, TypeKind, MAX_TYPE_DEPTH};
use crate::value::Value;

/// Resolves descriptor trees against one registry
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    registry: &'r Registry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Build the generator for `node` and everything beneath it
    pub fn resolve(&self, node: &TypeDescriptor) -> SetupResult<BoxedGenerator> {
        self.resolve_at(node, 0)
    }

    fn resolve_at(&self, node: &TypeDescriptor, depth: usize) -> SetupResult<BoxedGenerator> {
        if depth > MAX_TYPE_DEPTH {
            return Err(SetupError::RecursionLimit(MAX_TYPE_DEPTH));
        }
        validate_directives(node.raw(), node.directives())?;

        let only = node.directives().iter().find_map(|d| match d {
            Directive::Only(literals) => Some(literals),
            _ => None,
        });
        let base = match only {
            Some(literals) => {
                let values = self.convert_literals(node, literals)?;
                OnlyGenerator::new(node.raw(), values).boxed()
            }
            None => self.base_generator(node, depth)?,
        };
        let generator = self.wrap(node, base)?;
        log::debug!("resolved `{}` at {} to `{}`", node, node.key(), generator.name());
        Ok(generator)
    }

    fn base_generator(&self, node: &TypeDescriptor, depth: usize) -> SetupResult<BoxedGenerator> {
        let selection = node.directives().iter().find_map(|d| match d {
            Directive::Using(refs) => Some(refs),
            _ => None,
        });
        if let Some(refs) = selection {
            if node.kind() == TypeKind::Wildcard {
                return Err(SetupError::WildcardGeneratorSelection);
            }
            let mut choices = Vec::with_capacity(refs.len());
            for generator_ref in refs {
                let registration = self
                    .registry
                    .named(&generator_ref.name)
                    .ok_or_else(|| SetupError::UnknownGenerator(generator_ref.name.clone()))?;
                if !registration.matches(node) {
                    return Err(SetupError::TypeMismatch {
                        generator: registration.name().to_string(),
                        produces: registration.produces().to_string(),
                        requested: node.to_string(),
                    });
                }
                self.check_supported(node, &[registration])?;
                choices.push((generator_ref.weight, self.instantiate(registration, node, depth)?));
            }
            return Ok(if choices.len() == 1 {
                choices.remove(0).1
            } else {
                WeightedChoice::new(choices).boxed()
            });
        }

        if node.kind() == TypeKind::Wildcard {
            return self.wildcard_generator(node, depth);
        }

        let candidates = self.registry.candidates(node);
        if let Some(registration) = self.check_supported(node, &candidates)? {
            return self.instantiate(registration, node, depth);
        }

        match self.registry.composite(node.raw()) {
            Some(composite) => {
                if !generator_local_kinds(node.directives()).is_empty() {
                    return Err(self.configuration_mismatch(node));
                }
                self.composite_generator(composite, node, depth)
            }
            None => Err(SetupError::NoSuitableGenerator(node.to_string())),
        }
    }

    /// First candidate that supports every generator-local directive on `node`.
    ///
    /// Fails when candidates exist but none supports the directives, so a
    /// directive is never silently ignored.
    fn check_supported<'a>(
        &self,
        node: &TypeDescriptor,
        candidates: &[&'a GeneratorRegistration],
    ) -> SetupResult<Option<&'a GeneratorRegistration>> {
        let required = generator_local_kinds(node.directives());
        match candidates.iter().find(|r| r.supports_all(&required)) {
            Some(registration) => Ok(Some(*registration)),
            None if candidates.is_empty() => Ok(None),
            None => Err(self.configuration_mismatch(node)),
        }
    }

    fn configuration_mismatch(&self, node: &TypeDescriptor) -> SetupError {
        SetupError::GeneratorConfigurationMismatch {
            raw: node.raw().to_string(),
            directives: generator_local_kinds(node.directives())
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    fn instantiate(
        &self,
        registration: &GeneratorRegistration,
        node: &TypeDescriptor,
        depth: usize,
    ) -> SetupResult<BoxedGenerator> {
        let mut generator = registration.create(node);
        for directive in node.directives() {
            if directive.scope() == DirectiveScope::GeneratorLocal {
                generator.configure(directive)?;
            }
        }
        let components = self.components(node, generator.needed_components(), depth)?;
        if generator.needed_components() > 0 || !components.is_empty() {
            generator.add_components(components)?;
        }
        Ok(generator)
    }

    /// Generators for a node's children, in position order. A raw container has
    /// no children; its components accept any value.
    fn components(
        &self,
        node: &TypeDescriptor,
        needed: usize,
        depth: usize,
    ) -> SetupResult<Vec<BoxedGenerator>> {
        if let Some(component) = node.array_component() {
            return Ok(vec![self.resolve_at(component, depth + 1)?]);
        }
        if node.type_arguments().is_empty() {
            return Ok((0..needed).map(|_| AnyGenerator::new().boxed()).collect());
        }
        node.type_arguments()
            .iter()
            .map(|argument| self.resolve_at(argument, depth + 1))
            .collect()
    }

    /// A wildcard draws from its upper bound, else its lower bound, else anything.
    /// The wildcard's generator-local directives configure the bound.
    fn wildcard_generator(&self, node: &TypeDescriptor, depth: usize) -> SetupResult<BoxedGenerator> {
        let bound = node
            .wildcard_bounds()
            .and_then(|b| b.upper.as_deref().or_else(|| b.lower.as_deref()));
        match bound {
            Some(bound) => {
                let mut directives = bound.directives().to_vec();
                directives.extend(
                    node.directives()
                        .iter()
                        .filter(|d| d.scope() == DirectiveScope::GeneratorLocal)
                        .cloned(),
                );
                self.resolve_at(&bound.with_directives(directives), depth + 1)
            }
            None if generator_local_kinds(node.directives()).is_empty() => {
                Ok(AnyGenerator::new().boxed())
            }
            None => Err(self.configuration_mismatch(node)),
        }
    }

    fn composite_generator(
        &self,
        composite: &CompositeType,
        node: &TypeDescriptor,
        depth: usize,
    ) -> SetupResult<BoxedGenerator> {
        if composite.is_abstract {
            return Err(SetupError::NoSuitableGenerator(node.to_string()));
        }
        let mut bindings = Bindings::new();
        for (param, argument) in composite.type_params.iter().zip(node.type_arguments()) {
            bindings.insert(param, argument.to_declared());
        }
        if node.type_arguments().is_empty() {
            for param in &composite.type_params {
                bindings.insert(param, DeclaredType::wildcard());
            }
        }

        let accessible: Vec<_> = composite.constructors.iter().filter(|c| c.accessible).collect();
        if let [constructor] = accessible.as_slice() {
            match self.resolve_slots(&constructor.params, &bindings, node, depth) {
                Ok(slots) => {
                    log::debug!("building `{}` by constructor", composite.name);
                    return self.assemble(composite, CompositeStrategy::ByConstructor, slots);
                }
                Err(err @ SetupError::RecursionLimit(_)) => return Err(err),
                Err(err) => {
                    log::debug!("constructor of `{}` unusable: {}", composite.name, err);
                }
            }
        }

        let fields: Vec<(String, DeclaredType)> = self
            .registry
            .instance_fields(composite)?
            .into_iter()
            .map(|f| (f.name.clone(), f.declared.clone()))
            .collect();
        if fields.is_empty() {
            return Err(SetupError::NoSuitableGenerator(node.to_string()));
        }
        let slots = self.resolve_slots(&fields, &bindings, node, depth)?;
        log::debug!("building `{}` by fields", composite.name);
        self.assemble(composite, CompositeStrategy::ByFields, slots)
    }

    /// Resolve each slot's own declared type at a child key of the composite
    fn resolve_slots(
        &self,
        slots: &[(String, DeclaredType)],
        bindings: &Bindings,
        node: &TypeDescriptor,
        depth: usize,
    ) -> SetupResult<Vec<(String, BoxedGenerator)>> {
        slots
            .iter()
            .map(|(name, declared)| {
                let descriptor = declared.resolve(bindings, self.registry, node.key().child(name))?;
                Ok((name.clone(), self.resolve_at(&descriptor, depth + 1)?))
            })
            .collect()
    }

    fn assemble(
        &self,
        composite: &CompositeType,
        strategy: CompositeStrategy,
        slots: Vec<(String, BoxedGenerator)>,
    ) -> SetupResult<BoxedGenerator> {
        let (names, generators): (Vec<String>, Vec<BoxedGenerator>) = slots.into_iter().unzip();
        let mut generator =
            CompositeGenerator::new(&composite.name, strategy, names, composite.builder.clone());
        generator.add_components(generators)?;
        Ok(generator.boxed())
    }

    fn wrap(&self, node: &TypeDescriptor, base: BoxedGenerator) -> SetupResult<BoxedGenerator> {
        let mut generator = base;

        let mut extras = Vec::new();
        let mut excluded = Vec::new();
        let mut predicates: Vec<(String, ValuePredicate)> = Vec::new();
        for directive in node.directives() {
            match directive {
                Directive::Also(literals) => extras.extend(self.convert_literals(node, literals)?),
                Directive::Exclude(literals) => {
                    excluded.extend(self.convert_literals(node, literals)?)
                }
                Directive::Satisfies { label, predicate } => {
                    predicates.push((label.clone(), predicate.clone()))
                }
                _ => {}
            }
        }
        if !extras.is_empty() {
            generator = AlsoGenerator::new(node.key().clone(), extras, generator).boxed();
        }
        if !excluded.is_empty() || !predicates.is_empty() {
            generator = NodeFilter::new(excluded, predicates, generator).boxed();
        }
        if node.shared_label().is_some() {
            generator = Correlated::new(node.key().clone(), generator).boxed();
        }
        Ok(generator)
    }

    fn convert_literals(&self, node: &TypeDescriptor, literals: &[String]) -> SetupResult<Vec<Value>> {
        literals.iter().map(|literal| self.convert_literal(node, literal)).collect()
    }

    /// Convert a literal to a value of the node's type; wildcards convert to
    /// their bound's type
    fn convert_literal(&self, node: &TypeDescriptor, literal: &str) -> SetupResult<Value> {
        let target = match node.wildcard_bounds() {
            Some(bounds) => bounds.upper.as_deref().or_else(|| bounds.lower.as_deref()).unwrap_or(node),
            None => node,
        };
        let raw = target.raw();
        if let Some(converted) = convert_scalar_literal(raw, literal) {
            return converted;
        }
        if let Some(variants) = self.registry.enum_variants(raw) {
            if variants.iter().any(|v| v == literal.trim()) {
                return Ok(Value::Variant {
                    type_name: raw.to_string(),
                    name: literal.trim().to_string(),
                });
            }
        }
        Err(SetupError::LiteralConversion {
            raw: raw.to_string(),
            literal: literal.to_string(),
        })
    }
}
