//! Generators for user-defined types: composites built slot by slot, and enums

use super::collections::{product_domain, MAX_PRODUCT_DOMAIN};
use super::{expect_components, BoxedGenerator, Generator};
use crate::context::GenerationStatus;
use crate::error::{GenerationError, GenerationResult, SetupResult};
use crate::random::SourceOfRandomness;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Builds the final value of a composite from its named slot values.
///
/// An `Err` carries the reason construction failed, e.g. a constructor
/// rejecting its arguments.
pub type ValueBuilder = Arc<dyn Fn(Vec<(String, Value)>) -> Result<Value, String> + Send + Sync>;

/// How a composite type without a registered generator is assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeStrategy {
    /// One slot per parameter of the type's single accessible constructor
    ByConstructor,
    /// One slot per assignable instance field
    ByFields,
}

/// Synthesised generator for one composite type.
///
/// Never registered; the resolver builds a fresh one for every node that needs it.
pub struct CompositeGenerator {
    type_name: String,
    strategy: CompositeStrategy,
    slot_names: Vec<String>,
    slots: Vec<BoxedGenerator>,
    builder: Option<ValueBuilder>,
}

impl CompositeGenerator {
    pub fn new(
        type_name: &str,
        strategy: CompositeStrategy,
        slot_names: Vec<String>,
        builder: Option<ValueBuilder>,
    ) -> Self {
        Self {
            type_name: type_name.to_string(),
            strategy,
            slot_names,
            slots: Vec::new(),
            builder,
        }
    }

    pub fn strategy(&self) -> CompositeStrategy {
        self.strategy
    }

    fn build(&self, values: Vec<Value>) -> GenerationResult<Value> {
        let fields: Vec<(String, Value)> = self.slot_names.iter().cloned().zip(values).collect();
        match &self.builder {
            Some(builder) => builder(fields).map_err(|reason| GenerationError::Construction {
                type_name: self.type_name.clone(),
                reason,
            }),
            None => Ok(Value::Composite {
                type_name: self.type_name.clone(),
                fields,
            }),
        }
    }
}

impl fmt::Debug for CompositeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeGenerator")
            .field("type_name", &self.type_name)
            .field("strategy", &self.strategy)
            .field("slot_names", &self.slot_names)
            .field("slots", &self.slots)
            .finish()
    }
}

impl Generator for CompositeGenerator {
    fn name(&self) -> &str {
        &self.type_name
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        if self.slots.len() != self.slot_names.len() {
            return Err(GenerationError::Construction {
                type_name: self.type_name.clone(),
                reason: "slot generators were never supplied".to_string(),
            });
        }
        let values = self
            .slots
            .iter()
            .map(|slot| slot.generate(random, status))
            .collect::<GenerationResult<Vec<_>>>()?;
        self.build(values)
    }

    /// Slot-wise simplification. Only values that still expose their slots, i.e.
    /// composites built without a custom builder, can be taken apart again.
    fn shrink(&self, value: &Value) -> Vec<Value> {
        let current: Option<Vec<Value>> = self
            .slot_names
            .iter()
            .map(|name| value.field(name).cloned())
            .collect();
        let current = match current {
            Some(current) if current.len() == self.slots.len() => current,
            _ => return Vec::new(),
        };
        let mut candidates = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            for replacement in slot.shrink(&current[index]) {
                let mut simpler = current.clone();
                simpler[index] = replacement;
                if let Ok(built) = self.build(simpler) {
                    candidates.push(built);
                }
            }
        }
        candidates
    }

    fn needed_components(&self) -> usize {
        self.slot_names.len()
    }

    fn add_components(&mut self, components: Vec<BoxedGenerator>) -> SetupResult<()> {
        self.slots = expect_components(&self.type_name, self.slot_names.len(), components)?;
        Ok(())
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let domains = self
            .slots
            .iter()
            .map(|slot| slot.domain())
            .collect::<Option<Vec<_>>>()?;
        let combinations = product_domain(&domains, MAX_PRODUCT_DOMAIN)?;
        Some(
            combinations
                .into_iter()
                .filter_map(|values| self.build(values).ok())
                .collect(),
        )
    }
}

/// Uniform choice among the variants of a registered enum
#[derive(Debug, Clone)]
pub struct EnumGenerator {
    type_name: String,
    variants: Vec<String>,
}

impl EnumGenerator {
    pub fn new(type_name: &str, variants: &[String]) -> Self {
        Self {
            type_name: type_name.to_string(),
            variants: variants.to_vec(),
        }
    }

    pub fn variant(&self, name: &str) -> Option<Value> {
        self.variants
            .iter()
            .find(|variant| variant.as_str() == name)
            .map(|variant| self.value_of(variant))
    }

    fn value_of(&self, variant: &str) -> Value {
        Value::Variant {
            type_name: self.type_name.clone(),
            name: variant.to_string(),
        }
    }
}

impl Generator for EnumGenerator {
    fn name(&self) -> &str {
        &self.type_name
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        _status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let index = random.choose_index(self.variants.len())?;
        Ok(self.value_of(&self.variants[index]))
    }

    /// Variants declared before `value`, first declared first
    fn shrink(&self, value: &Value) -> Vec<Value> {
        let name = match value {
            Value::Variant { type_name, name } if *type_name == self.type_name => name,
            _ => return Vec::new(),
        };
        self.variants
            .iter()
            .take_while(|variant| *variant != name)
            .map(|variant| self.value_of(variant))
            .collect()
    }

    fn domain(&self) -> Option<Vec<Value>> {
        Some(self.variants.iter().map(|v| self.value_of(v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{sample, BooleanGenerator, GeneratorExt, IntegerGenerator};
    use crate::types::kinds;

    fn point() -> CompositeGenerator {
        let mut generator = CompositeGenerator::new(
            "Point",
            CompositeStrategy::ByConstructor,
            vec!["x".to_string(), "y".to_string()],
            None,
        );
        generator
            .add_components(vec![
                IntegerGenerator::with_bounds(kinds::I32, -5, 5).boxed(),
                IntegerGenerator::with_bounds(kinds::I32, 10, 20).boxed(),
            ])
            .unwrap();
        generator
    }

    #[test]
    fn test_composite_fills_slots_in_order() {
        let mut random = SourceOfRandomness::new(40);
        let value = sample(&point(), &mut random, 10).unwrap();
        let x = value.field("x").and_then(Value::as_integer).unwrap();
        let y = value.field("y").and_then(Value::as_integer).unwrap();
        assert!((-5..=5).contains(&x));
        assert!((10..=20).contains(&y));
    }

    #[test]
    fn test_composite_shrinks_slotwise() {
        let value = Value::Composite {
            type_name: "Point".to_string(),
            fields: vec![
                ("x".to_string(), Value::Integer(3)),
                ("y".to_string(), Value::Integer(15)),
            ],
        };
        let candidates = point().shrink(&value);
        assert_eq!(candidates[0].field("x"), Some(&Value::Integer(0)));
        assert_eq!(candidates[0].field("y"), Some(&Value::Integer(15)));
        assert!(candidates
            .iter()
            .any(|c| c.field("y") == Some(&Value::Integer(10))));
    }

    #[test]
    fn test_builder_failure_is_construction_error() {
        let builder: ValueBuilder = Arc::new(|_| Err("rejected".to_string()));
        let mut generator = CompositeGenerator::new(
            "Strict",
            CompositeStrategy::ByFields,
            vec!["flag".to_string()],
            Some(builder),
        );
        generator.add_components(vec![BooleanGenerator.boxed()]).unwrap();
        let mut random = SourceOfRandomness::new(41);
        assert!(matches!(
            sample(&generator, &mut random, 0),
            Err(GenerationError::Construction { .. })
        ));
    }

    #[test]
    fn test_composite_domain_from_finite_slots() {
        let mut generator = CompositeGenerator::new(
            "Flags",
            CompositeStrategy::ByFields,
            vec!["a".to_string(), "b".to_string()],
            None,
        );
        generator
            .add_components(vec![BooleanGenerator.boxed(), BooleanGenerator.boxed()])
            .unwrap();
        assert_eq!(generator.domain().unwrap().len(), 4);
        assert!(point().domain().is_none());
    }

    #[test]
    fn test_enum_shrinks_toward_first_variant() {
        let colours = EnumGenerator::new(
            "Colour",
            &["Red".to_string(), "Green".to_string(), "Blue".to_string()],
        );
        let blue = colours.variant("Blue").unwrap();
        let shrunk = colours.shrink(&blue);
        assert_eq!(shrunk, vec![colours.variant("Red").unwrap(), colours.variant("Green").unwrap()]);
        assert_eq!(colours.domain().unwrap().len(), 3);
        assert!(colours.shrink(&colours.variant("Red").unwrap()).is_empty());
    }
}
