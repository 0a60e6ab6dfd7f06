//! Wrappers that apply node-local directives around a node's generator
//!
//! The resolver stacks these in a fixed order, innermost first:
//! [`OnlyGenerator`] (replacing the base generator) or the base generator,
//! then [`AlsoGenerator`], then [`NodeFilter`], then [`Correlated`]. Keeping
//! `Correlated` outermost means a memoised value is never filtered twice.

use super::primitives::{BooleanGenerator, CharGenerator, FloatGenerator, IntegerGenerator};
use super::text::StringGenerator;
use super::{BoxedGenerator, Generator};
use crate::context::GenerationStatus;
use crate::directives::ValuePredicate;
use crate::error::GenerationResult;
use crate::random::SourceOfRandomness;
use crate::types::{kinds, TypeKey};
use crate::value::Value;
use std::fmt;

fn dedup(values: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

/// Uniform draws, with replacement, from a fixed set of literals
#[derive(Debug, Clone)]
pub struct OnlyGenerator {
    raw: String,
    values: Vec<Value>,
}

impl OnlyGenerator {
    pub fn new(raw: &str, values: Vec<Value>) -> Self {
        Self {
            raw: raw.to_string(),
            values: dedup(values),
        }
    }
}

impl Generator for OnlyGenerator {
    fn name(&self) -> &str {
        &self.raw
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        _status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let index = random.choose_index(self.values.len())?;
        Ok(self.values[index].clone())
    }

    /// Members listed before `value`
    fn shrink(&self, value: &Value) -> Vec<Value> {
        self.values.iter().take_while(|v| *v != value).cloned().collect()
    }

    fn domain(&self) -> Option<Vec<Value>> {
        Some(self.values.clone())
    }
}

/// Emits fixed literals first, in order, then defers to the inner generator.
///
/// The emission count lives in the run's status under the node's key, so the
/// literals come out once per run, not once per trial.
#[derive(Debug)]
pub struct AlsoGenerator {
    key: TypeKey,
    extras: Vec<Value>,
    inner: BoxedGenerator,
}

impl AlsoGenerator {
    pub fn new(key: TypeKey, extras: Vec<Value>, inner: BoxedGenerator) -> Self {
        Self { key, extras, inner }
    }
}

impl Generator for AlsoGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let emission = status.next_emission(&self.key);
        match self.extras.get(emission) {
            Some(extra) => Ok(extra.clone()),
            None => self.inner.generate(random, status),
        }
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        self.inner.shrink(value)
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let mut domain = self.extras.clone();
        domain.extend(self.inner.domain()?);
        Some(dedup(domain))
    }
}

/// Rejects draws that are excluded or fail a predicate, charging each rejection
/// as a discard
pub struct NodeFilter {
    excluded: Vec<Value>,
    predicates: Vec<(String, ValuePredicate)>,
    inner: BoxedGenerator,
}

impl NodeFilter {
    pub fn new(
        excluded: Vec<Value>,
        predicates: Vec<(String, ValuePredicate)>,
        inner: BoxedGenerator,
    ) -> Self {
        Self {
            excluded,
            predicates,
            inner,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        !self.excluded.contains(value) && self.predicates.iter().all(|(_, p)| p(value))
    }
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.predicates.iter().map(|(l, _)| l.as_str()).collect();
        f.debug_struct("NodeFilter")
            .field("excluded", &self.excluded)
            .field("predicates", &labels)
            .field("inner", &self.inner)
            .finish()
    }
}

impl Generator for NodeFilter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        loop {
            let value = self.inner.generate(random, status)?;
            if self.accepts(&value) {
                return Ok(value);
            }
            log::trace!("{} rejected {}", self.inner.name(), value);
            status.record_discard()?;
        }
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        self.inner
            .shrink(value)
            .into_iter()
            .filter(|candidate| self.accepts(candidate))
            .collect()
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let domain = self.inner.domain()?;
        Some(domain.into_iter().filter(|v| self.accepts(v)).collect())
    }
}

/// Shares one value per trial among every node with the same key
#[derive(Debug)]
pub struct Correlated {
    key: TypeKey,
    inner: BoxedGenerator,
}

impl Correlated {
    pub fn new(key: TypeKey, inner: BoxedGenerator) -> Self {
        Self { key, inner }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }
}

impl Generator for Correlated {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        if let Some(value) = status.correlated(&self.key) {
            return Ok(value.clone());
        }
        let value = self.inner.generate(random, status)?;
        status.correlate(&self.key, value.clone());
        Ok(value)
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        self.inner.shrink(value)
    }

    fn domain(&self) -> Option<Vec<Value>> {
        self.inner.domain()
    }
}

/// Picks one of several generators per draw, proportionally to their weights
#[derive(Debug)]
pub struct WeightedChoice {
    weights: Vec<u32>,
    choices: Vec<BoxedGenerator>,
}

impl WeightedChoice {
    pub fn new(choices: Vec<(u32, BoxedGenerator)>) -> Self {
        let (weights, choices) = choices.into_iter().unzip();
        Self { weights, choices }
    }
}

impl Generator for WeightedChoice {
    fn name(&self) -> &str {
        "weighted"
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let index = random.choose_weighted(&self.weights)?;
        self.choices[index].generate(random, status)
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        dedup(self.choices.iter().flat_map(|c| c.shrink(value)).collect())
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let mut domain = Vec::new();
        for choice in &self.choices {
            domain.extend(choice.domain()?);
        }
        Some(dedup(domain))
    }
}

/// Values of an arbitrary scalar type, used for raw containers and unbounded
/// wildcards
#[derive(Debug)]
pub struct AnyGenerator {
    booleans: BooleanGenerator,
    integers: IntegerGenerator,
    floats: FloatGenerator,
    chars: CharGenerator,
    strings: StringGenerator,
}

impl Default for AnyGenerator {
    fn default() -> Self {
        Self {
            booleans: BooleanGenerator,
            integers: IntegerGenerator::new(kinds::I64),
            floats: FloatGenerator::new(kinds::F64),
            chars: CharGenerator::default(),
            strings: StringGenerator::default(),
        }
    }
}

impl AnyGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generator for AnyGenerator {
    fn name(&self) -> &str {
        "any"
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        match random.next_integer_in(0, 4)? {
            0 => self.booleans.generate(random, status),
            1 => self.integers.generate(random, status),
            2 => self.floats.generate(random, status),
            3 => self.chars.generate(random, status),
            _ => self.strings.generate(random, status),
        }
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Bool(_) => self.booleans.shrink(value),
            Value::Integer(_) => self.integers.shrink(value),
            Value::Float(_) => self.floats.shrink(value),
            Value::Char(_) => self.chars.shrink(value),
            Value::String(_) => self.strings.shrink(value),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{sample, GeneratorExt};

    fn ints(min: i128, max: i128) -> BoxedGenerator {
        IntegerGenerator::with_bounds(kinds::I32, min, max).boxed()
    }

    #[test]
    fn test_only_draws_members() {
        let only = OnlyGenerator::new(
            kinds::I32,
            vec![Value::Integer(3), Value::Integer(7), Value::Integer(3)],
        );
        assert_eq!(only.domain().unwrap().len(), 2);
        let mut random = SourceOfRandomness::new(50);
        for _ in 0..50 {
            let value = sample(&only, &mut random, 0).unwrap();
            assert!(value == Value::Integer(3) || value == Value::Integer(7));
        }
        assert_eq!(only.shrink(&Value::Integer(7)), vec![Value::Integer(3)]);
    }

    #[test]
    fn test_only_and_filter_shrinks_stay_members() {
        let members = vec![Value::Integer(40), Value::Integer(12), Value::Integer(25)];
        let only = OnlyGenerator::new(kinds::I32, members.clone());
        for value in &members {
            assert!(only.shrink(value).iter().all(|c| members.contains(c)));
        }

        let even: ValuePredicate =
            std::sync::Arc::new(|v: &Value| v.as_integer().map_or(false, |i| i % 2 == 0));
        let filter = NodeFilter::new(vec![Value::Integer(0)], vec![("even".to_string(), even)], ints(0, 100));
        let candidates = filter.shrink(&Value::Integer(64));
        assert!(!candidates.is_empty());
        assert!(candidates
            .iter()
            .all(|c| *c != Value::Integer(0) && c.as_integer().unwrap() % 2 == 0));
    }

    #[test]
    fn test_also_emits_literals_first() {
        let key = TypeKey::parameter(0);
        let also = AlsoGenerator::new(
            key,
            vec![Value::Integer(-1), Value::Integer(1000)],
            ints(0, 10),
        );
        let mut random = SourceOfRandomness::new(51);
        let mut status = GenerationStatus::unbounded();
        assert_eq!(also.generate(&mut random, &mut status).unwrap(), Value::Integer(-1));
        assert_eq!(also.generate(&mut random, &mut status).unwrap(), Value::Integer(1000));
        for _ in 0..20 {
            let value = also.generate(&mut random, &mut status).unwrap().as_integer().unwrap();
            assert!((0..=10).contains(&value));
        }
    }

    #[test]
    fn test_node_filter_excludes_and_charges_discards() {
        let filter = NodeFilter::new(vec![Value::Integer(0)], Vec::new(), ints(0, 1));
        let mut random = SourceOfRandomness::new(52);
        let mut status = GenerationStatus::new(1_000);
        for _ in 0..20 {
            assert_eq!(filter.generate(&mut random, &mut status).unwrap(), Value::Integer(1));
        }
        assert!(status.discards() > 0);
        assert!(filter.shrink(&Value::Integer(1)).is_empty());
    }

    #[test]
    fn test_correlated_reuses_value_within_trial() {
        let key = TypeKey::shared("n");
        let first = Correlated::new(key.clone(), ints(0, 1_000_000));
        let second = Correlated::new(key, ints(0, 1_000_000));
        let mut random = SourceOfRandomness::new(53);
        let mut status = GenerationStatus::unbounded();
        status.begin_trial(0, 10);
        let a = first.generate(&mut random, &mut status).unwrap();
        let b = second.generate(&mut random, &mut status).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_weighted_choice_respects_zero_weight() {
        let choice = WeightedChoice::new(vec![(0, ints(0, 0)), (5, ints(100, 100))]);
        let mut random = SourceOfRandomness::new(54);
        for _ in 0..20 {
            assert_eq!(sample(&choice, &mut random, 0).unwrap(), Value::Integer(100));
        }
    }

    #[test]
    fn test_any_shrinks_by_variant() {
        let any = AnyGenerator::new();
        assert_eq!(any.shrink(&Value::Bool(true)), vec![Value::Bool(false)]);
        assert_eq!(any.shrink(&Value::Integer(4))[0], Value::Integer(0));
        assert!(any.shrink(&Value::Null).is_empty());
    }
}
