//! Generator abstraction
//!
//! A [`Generator`] produces one [`Value`] per call from a [`SourceOfRandomness`]
//! and the run's [`GenerationStatus`]. Generators may:
//!
//! - declare component generators they need (containers, tuples, composites) and
//!   receive them through [`Generator::add_components`];
//! - accept generator-local directives through [`Generator::configure`];
//! - offer simpler candidates for a value through [`Generator::shrink`];
//! - expose a finite, enumerable domain through [`Generator::domain`], which
//!   exhaustive sampling enumerates instead of drawing.
//!
//! [`GeneratorExt`] adds the `map` / `flat_map` / `filter` / `times` combinators.

pub mod collections;
pub mod combinators;
pub mod composite;
pub mod constrained;
pub mod primitives;
pub mod text;

use crate::context::GenerationStatus;
use crate::directives::{Directive, ValuePredicate};
use crate::error::{GenerationResult, SetupError, SetupResult};
use crate::random::SourceOfRandomness;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub use self::collections::{ListGenerator, MapGenerator, OptionalGenerator, SequenceKind, TupleGenerator};
pub use self::combinators::{FlatMap, Filter, Map, Times};
pub use self::composite::{CompositeGenerator, CompositeStrategy, EnumGenerator, ValueBuilder};
pub use self::constrained::{AlsoGenerator, AnyGenerator, Correlated, NodeFilter, OnlyGenerator, WeightedChoice};
pub use self::primitives::{BooleanGenerator, CharGenerator, FloatGenerator, IntegerGenerator};
pub use self::text::{BytesGenerator, StringGenerator};

pub type BoxedGenerator = Box<dyn Generator>;

/// Produces values of one type
pub trait Generator: fmt::Debug {
    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value>;

    /// Simpler candidates for `value`, most promising first
    fn shrink(&self, _value: &Value) -> Vec<Value> {
        Vec::new()
    }

    fn needed_components(&self) -> usize {
        0
    }

    fn add_components(&mut self, components: Vec<BoxedGenerator>) -> SetupResult<()> {
        expect_components(self.name(), 0, components).map(|_| ())
    }

    /// Apply one generator-local directive
    fn configure(&mut self, _directive: &Directive) -> SetupResult<()> {
        Ok(())
    }

    /// Every value this generator can produce, when that set is finite
    fn domain(&self) -> Option<Vec<Value>> {
        None
    }
}

impl Generator for BoxedGenerator {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        (**self).generate(random, status)
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        (**self).shrink(value)
    }

    fn needed_components(&self) -> usize {
        (**self).needed_components()
    }

    fn add_components(&mut self, components: Vec<BoxedGenerator>) -> SetupResult<()> {
        (**self).add_components(components)
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        (**self).configure(directive)
    }

    fn domain(&self) -> Option<Vec<Value>> {
        (**self).domain()
    }
}

/// Check a supplied component list against the count a generator needs
pub fn expect_components(
    name: &str,
    needed: usize,
    components: Vec<BoxedGenerator>,
) -> SetupResult<Vec<BoxedGenerator>> {
    if components.len() < needed {
        return Err(SetupError::missing_components(name, needed, components.len()));
    }
    if components.len() > needed {
        return Err(SetupError::IllegalArgument(format!(
            "generator `{}` needs {} component generator(s) but {} were supplied",
            name,
            needed,
            components.len()
        )));
    }
    Ok(components)
}

/// Combinators available on every sized generator
pub trait GeneratorExt: Generator + Sized + 'static {
    fn boxed(self) -> BoxedGenerator {
        Box::new(self)
    }

    /// Transform each produced value
    fn map<F>(self, f: F) -> Map
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Map::new(self.boxed(), Arc::new(f))
    }

    /// Use each produced value to select the generator for the final value
    fn flat_map<F>(self, f: F) -> FlatMap
    where
        F: Fn(Value) -> BoxedGenerator + Send + Sync + 'static,
    {
        FlatMap::new(self.boxed(), Arc::new(f))
    }

    /// Redraw until `predicate` holds; every rejection is charged as a discard
    fn filter<F>(self, predicate: F) -> Filter
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let predicate: ValuePredicate = Arc::new(predicate);
        Filter::new(self.boxed(), predicate)
    }

    /// Fixed-length list of `count` draws; a negative count is a setup error
    fn times(self, count: i64) -> SetupResult<Times> {
        Times::new(self.boxed(), count)
    }
}

impl<G: Generator + 'static> GeneratorExt for G {}

/// Draw from `generator` with a throwaway status, for tests and examples
pub fn sample(generator: &dyn Generator, random: &mut SourceOfRandomness, size: u32) -> GenerationResult<Value> {
    let mut status = GenerationStatus::unbounded().with_size(size);
    generator.generate(random, &mut status)
}
