//! Monadic combinators over generators

use super::{BoxedGenerator, Generator};
use crate::context::GenerationStatus;
use crate::directives::ValuePredicate;
use crate::error::{GenerationResult, SetupError, SetupResult};
use crate::random::SourceOfRandomness;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub type ValueMapper = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type GeneratorSelector = Arc<dyn Fn(Value) -> BoxedGenerator + Send + Sync>;

/// Applies a function to every value of the inner generator.
///
/// Mapped values cannot be traced back to their source, so `Map` does not shrink.
pub struct Map {
    inner: BoxedGenerator,
    f: ValueMapper,
}

impl Map {
    pub fn new(inner: BoxedGenerator, f: ValueMapper) -> Self {
        Self { inner, f }
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map").field("inner", &self.inner).finish()
    }
}

impl Generator for Map {
    fn name(&self) -> &str {
        "map"
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let value = self.inner.generate(random, status)?;
        Ok((self.f)(value))
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let mut mapped: Vec<Value> = Vec::new();
        for value in self.inner.domain()? {
            let value = (self.f)(value);
            if !mapped.contains(&value) {
                mapped.push(value);
            }
        }
        Some(mapped)
    }
}

/// Lets each value of the inner generator pick the generator for the result
pub struct FlatMap {
    inner: BoxedGenerator,
    f: GeneratorSelector,
}

impl FlatMap {
    pub fn new(inner: BoxedGenerator, f: GeneratorSelector) -> Self {
        Self { inner, f }
    }
}

impl fmt::Debug for FlatMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatMap").field("inner", &self.inner).finish()
    }
}

impl Generator for FlatMap {
    fn name(&self) -> &str {
        "flat_map"
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let seed = self.inner.generate(random, status)?;
        let dependent = (self.f)(seed);
        dependent.generate(random, status)
    }
}

/// Redraws from the inner generator until the predicate accepts.
///
/// The loop itself is unbounded; each rejection is charged to the run's discard
/// budget, which ends the loop once exhausted.
pub struct Filter {
    inner: BoxedGenerator,
    predicate: ValuePredicate,
}

impl Filter {
    pub fn new(inner: BoxedGenerator, predicate: ValuePredicate) -> Self {
        Self { inner, predicate }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("inner", &self.inner).finish()
    }
}

impl Generator for Filter {
    fn name(&self) -> &str {
        "filter"
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        loop {
            let value = self.inner.generate(random, status)?;
            if (self.predicate)(&value) {
                return Ok(value);
            }
            status.record_discard()?;
        }
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        self.inner
            .shrink(value)
            .into_iter()
            .filter(|candidate| (self.predicate)(candidate))
            .collect()
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let domain = self.inner.domain()?;
        Some(domain.into_iter().filter(|v| (self.predicate)(v)).collect())
    }
}

/// Fixed-length list of independent draws
#[derive(Debug)]
pub struct Times {
    inner: BoxedGenerator,
    count: usize,
}

impl Times {
    pub fn new(inner: BoxedGenerator, count: i64) -> SetupResult<Self> {
        if count < 0 {
            return Err(SetupError::IllegalArgument(format!(
                "times() needs a non-negative count, got {}",
                count
            )));
        }
        Ok(Self {
            inner,
            count: count as usize,
        })
    }
}

impl Generator for Times {
    fn name(&self) -> &str {
        "times"
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let mut items = Vec::with_capacity(self.count);
        for _ in 0..self.count {
            items.push(self.inner.generate(random, status)?);
        }
        Ok(Value::List(items))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        let items = match value {
            Value::List(items) if items.len() == self.count => items,
            _ => return Vec::new(),
        };
        let mut candidates = Vec::new();
        for (index, item) in items.iter().enumerate() {
            for replacement in self.inner.shrink(item) {
                let mut shrunk = items.clone();
                shrunk[index] = replacement;
                candidates.push(Value::List(shrunk));
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{sample, BooleanGenerator, GeneratorExt, IntegerGenerator};
    use crate::types::kinds;

    fn small_ints() -> IntegerGenerator {
        IntegerGenerator::with_bounds(kinds::I32, 0, 10)
    }

    #[test]
    fn test_map_transforms_values() {
        let doubled = small_ints().map(|v| Value::Integer(v.as_integer().unwrap_or(0) * 2));
        let mut random = SourceOfRandomness::new(3);
        for _ in 0..50 {
            let value = sample(&doubled, &mut random, 10).unwrap().as_integer().unwrap();
            assert_eq!(value % 2, 0);
            assert!((0..=20).contains(&value));
        }
    }

    #[test]
    fn test_flat_map_uses_dependent_generator() {
        let nested = small_ints().flat_map(|bound| {
            let max = bound.as_integer().unwrap_or(0);
            IntegerGenerator::with_bounds(kinds::I32, 0, max).boxed()
        });
        let mut random = SourceOfRandomness::new(4);
        for _ in 0..50 {
            let value = sample(&nested, &mut random, 10).unwrap().as_integer().unwrap();
            assert!((0..=10).contains(&value));
        }
    }

    #[test]
    fn test_filter_redraws_until_accepted() {
        let evens = small_ints().filter(|v| v.as_integer().map_or(false, |i| i % 2 == 0));
        let mut random = SourceOfRandomness::new(5);
        for _ in 0..50 {
            let value = sample(&evens, &mut random, 10).unwrap().as_integer().unwrap();
            assert_eq!(value % 2, 0);
        }
        assert!(evens.shrink(&Value::Integer(8)).iter().all(|v| v.as_integer().unwrap() % 2 == 0));
    }

    #[test]
    fn test_filter_exhausts_discard_budget() {
        let never = small_ints().filter(|_| false);
        let mut random = SourceOfRandomness::new(6);
        let mut status = GenerationStatus::new(5);
        let err = never.generate(&mut random, &mut status).unwrap_err();
        assert_eq!(
            err,
            crate::error::GenerationError::DiscardRatioExceeded { discards: 6, budget: 5 }
        );
    }

    #[test]
    fn test_times_counts() {
        let mut random = SourceOfRandomness::new(7);
        let three = BooleanGenerator.times(3).unwrap();
        assert_eq!(sample(&three, &mut random, 0).unwrap().as_list().unwrap().len(), 3);
        let none = BooleanGenerator.times(0).unwrap();
        assert_eq!(sample(&none, &mut random, 0).unwrap(), Value::List(vec![]));
        assert!(matches!(BooleanGenerator.times(-1), Err(SetupError::IllegalArgument(_))));
    }

    #[test]
    fn test_map_domain_dedups() {
        let constant = BooleanGenerator.map(|_| Value::Integer(1));
        assert_eq!(constant.domain(), Some(vec![Value::Integer(1)]));
    }
}
