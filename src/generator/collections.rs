//! Lists, sets, arrays, maps, optionals and tuples

use super::{expect_components, BoxedGenerator, Generator};
use crate::context::GenerationStatus;
use crate::directives::Directive;
use crate::error::{GenerationError, GenerationResult, SetupError, SetupResult};
use crate::random::SourceOfRandomness;
use crate::types::kinds;
use crate::value::Value;
use std::collections::HashSet;

/// Largest product domain a composite generator will enumerate
pub const MAX_PRODUCT_DOMAIN: usize = 10_000;

/// Length bounds shared by strings and collections.
///
/// Without an explicit `Size` directive the upper bound is the trial's size hint.
#[derive(Debug, Clone, Default)]
pub struct SizeBounds {
    pub(crate) min: usize,
    pub(crate) max: Option<usize>,
}

impl SizeBounds {
    pub fn configure(&mut self, raw: &str, directive: &Directive) -> SetupResult<()> {
        if let Directive::Size { min, max } = directive {
            if min > max {
                return Err(SetupError::InvalidRange {
                    raw: raw.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            self.min = *min;
            self.max = Some(*max);
        }
        Ok(())
    }

    pub fn draw_len(
        &self,
        random: &mut SourceOfRandomness,
        status: &GenerationStatus,
    ) -> GenerationResult<usize> {
        let max = self
            .max
            .unwrap_or_else(|| (status.size() as usize).max(self.min));
        Ok(random.next_integer_in(self.min as i128, max as i128)? as usize)
    }
}

/// Shrink candidates for a sequence: removals first, largest chunks first, then
/// element-wise simplifications. No candidate is shorter than `min_len`.
pub fn shrink_sequence<T: Clone>(
    items: &[T],
    min_len: usize,
    shrink_element: &dyn Fn(&T) -> Vec<T>,
) -> Vec<Vec<T>> {
    let mut candidates = Vec::new();
    let len = items.len();
    if len > min_len {
        if min_len == 0 {
            candidates.push(Vec::new());
        }
        let mut chunk = (len / 2).max(1);
        loop {
            if len - chunk >= min_len && chunk < len {
                let mut start = 0;
                while start + chunk <= len {
                    let mut shorter = items[..start].to_vec();
                    shorter.extend_from_slice(&items[start + chunk..]);
                    candidates.push(shorter);
                    start += chunk;
                }
            }
            if chunk == 1 {
                break;
            }
            chunk /= 2;
        }
    }
    for (index, item) in items.iter().enumerate() {
        for replacement in shrink_element(item) {
            let mut simpler = items.to_vec();
            simpler[index] = replacement;
            candidates.push(simpler);
        }
    }
    candidates
}

/// Cartesian product of `domains` in lexicographic order, first domain slowest.
///
/// Returns `None` when the product would exceed `cap` elements.
pub fn product_domain(domains: &[Vec<Value>], cap: usize) -> Option<Vec<Vec<Value>>> {
    let mut total: usize = 1;
    for domain in domains {
        total = total.checked_mul(domain.len())?;
        if total > cap {
            return None;
        }
    }
    let mut product: Vec<Vec<Value>> = vec![Vec::new()];
    for domain in domains {
        let mut next = Vec::with_capacity(product.len() * domain.len());
        for prefix in &product {
            for value in domain {
                let mut extended = prefix.clone();
                extended.push(value.clone());
                next.push(extended);
            }
        }
        product = next;
    }
    Some(product)
}

fn has_duplicates(values: &[Value]) -> bool {
    let mut seen = HashSet::new();
    values.iter().any(|v| !seen.insert(v))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    List,
    /// Distinct elements
    Set,
    Array,
}

/// Variable-length sequences of one element type
#[derive(Debug)]
pub struct ListGenerator {
    kind: SequenceKind,
    size: SizeBounds,
    element: Option<BoxedGenerator>,
}

impl ListGenerator {
    pub fn new(kind: SequenceKind) -> Self {
        Self {
            kind,
            size: SizeBounds::default(),
            element: None,
        }
    }

    pub fn of(kind: SequenceKind, element: BoxedGenerator) -> Self {
        Self {
            kind,
            size: SizeBounds::default(),
            element: Some(element),
        }
    }

    fn element(&self) -> GenerationResult<&BoxedGenerator> {
        self.element.as_ref().ok_or_else(|| GenerationError::Construction {
            type_name: self.name().to_string(),
            reason: "no element generator".to_string(),
        })
    }
}

impl Generator for ListGenerator {
    fn name(&self) -> &str {
        match self.kind {
            SequenceKind::List => kinds::LIST,
            SequenceKind::Set => kinds::SET,
            SequenceKind::Array => kinds::ARRAY,
        }
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let element = self.element()?;
        let len = self.size.draw_len(random, status)?;
        let mut items = Vec::with_capacity(len);
        if self.kind == SequenceKind::Set {
            let mut seen = HashSet::new();
            let mut tries = 0;
            while items.len() < len && tries < len * 10 + 10 {
                tries += 1;
                let item = element.generate(random, status)?;
                if seen.insert(item.clone()) {
                    items.push(item);
                }
            }
            if items.len() < self.size.min {
                return Err(GenerationError::Exhausted(format!(
                    "{} set",
                    self.size.min
                )));
            }
        } else {
            for _ in 0..len {
                items.push(element.generate(random, status)?);
            }
        }
        Ok(Value::List(items))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        let (items, element) = match (value, self.element.as_ref()) {
            (Value::List(items), Some(element)) => (items, element),
            _ => return Vec::new(),
        };
        shrink_sequence(items, self.size.min, &|item: &Value| element.shrink(item))
            .into_iter()
            .filter(|candidate| self.kind != SequenceKind::Set || !has_duplicates(candidate))
            .map(Value::List)
            .collect()
    }

    fn needed_components(&self) -> usize {
        1
    }

    fn add_components(&mut self, components: Vec<BoxedGenerator>) -> SetupResult<()> {
        let mut components = expect_components(self.name(), 1, components)?;
        self.element = components.pop();
        Ok(())
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        let raw = self.name().to_string();
        self.size.configure(&raw, directive)
    }
}

/// Maps with distinct keys
#[derive(Debug, Default)]
pub struct MapGenerator {
    size: SizeBounds,
    key: Option<BoxedGenerator>,
    value: Option<BoxedGenerator>,
}

impl MapGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generator for MapGenerator {
    fn name(&self) -> &str {
        kinds::MAP
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let (key_gen, value_gen) = match (&self.key, &self.value) {
            (Some(k), Some(v)) => (k, v),
            _ => {
                return Err(GenerationError::Construction {
                    type_name: kinds::MAP.to_string(),
                    reason: "missing key or value generator".to_string(),
                })
            }
        };
        let len = self.size.draw_len(random, status)?;
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(len);
        let mut tries = 0;
        while entries.len() < len && tries < len * 10 + 10 {
            tries += 1;
            let key = key_gen.generate(random, status)?;
            if seen.insert(key.clone()) {
                let value = value_gen.generate(random, status)?;
                entries.push((key, value));
            }
        }
        if entries.len() < self.size.min {
            return Err(GenerationError::Exhausted(format!("{} map keys", self.size.min)));
        }
        Ok(Value::Map(entries))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        let (entries, key_gen, value_gen) = match (value, &self.key, &self.value) {
            (Value::Map(entries), Some(k), Some(v)) => (entries, k, v),
            _ => return Vec::new(),
        };
        let shrink_entry = |(key, value): &(Value, Value)| {
            let mut simpler: Vec<(Value, Value)> = key_gen
                .shrink(key)
                .into_iter()
                .map(|k| (k, value.clone()))
                .collect();
            simpler.extend(value_gen.shrink(value).into_iter().map(|v| (key.clone(), v)));
            simpler
        };
        shrink_sequence(entries, self.size.min, &shrink_entry)
            .into_iter()
            .filter(|candidate| {
                let keys: Vec<Value> = candidate.iter().map(|(k, _)| k.clone()).collect();
                !has_duplicates(&keys)
            })
            .map(Value::Map)
            .collect()
    }

    fn needed_components(&self) -> usize {
        2
    }

    fn add_components(&mut self, components: Vec<BoxedGenerator>) -> SetupResult<()> {
        let mut components = expect_components(kinds::MAP, 2, components)?.into_iter();
        self.key = components.next();
        self.value = components.next();
        Ok(())
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        self.size.configure(kinds::MAP, directive)
    }
}

/// Absent one time in four, otherwise a value of the inner generator
#[derive(Debug, Default)]
pub struct OptionalGenerator {
    inner: Option<BoxedGenerator>,
}

impl OptionalGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generator for OptionalGenerator {
    fn name(&self) -> &str {
        kinds::OPTIONAL
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let inner = self.inner.as_ref().ok_or_else(|| GenerationError::Construction {
            type_name: kinds::OPTIONAL.to_string(),
            reason: "no inner generator".to_string(),
        })?;
        if random.next_integer_in(0, 3)? == 0 {
            return Ok(Value::Null);
        }
        inner.generate(random, status)
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        if value.is_null() {
            return Vec::new();
        }
        let mut candidates = vec![Value::Null];
        if let Some(inner) = &self.inner {
            candidates.extend(inner.shrink(value));
        }
        candidates
    }

    fn needed_components(&self) -> usize {
        1
    }

    fn add_components(&mut self, components: Vec<BoxedGenerator>) -> SetupResult<()> {
        let mut components = expect_components(kinds::OPTIONAL, 1, components)?;
        self.inner = components.pop();
        Ok(())
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let mut domain = vec![Value::Null];
        domain.extend(self.inner.as_ref()?.domain()?);
        Some(domain)
    }
}

/// Fixed-arity heterogeneous tuples
#[derive(Debug)]
pub struct TupleGenerator {
    arity: usize,
    elements: Vec<BoxedGenerator>,
}

impl TupleGenerator {
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            elements: Vec::new(),
        }
    }
}

impl Generator for TupleGenerator {
    fn name(&self) -> &str {
        kinds::TUPLE
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        if self.elements.len() != self.arity {
            return Err(GenerationError::Construction {
                type_name: kinds::TUPLE.to_string(),
                reason: format!("expected {} element generators", self.arity),
            });
        }
        let items = self
            .elements
            .iter()
            .map(|element| element.generate(random, status))
            .collect::<GenerationResult<Vec<_>>>()?;
        Ok(Value::List(items))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        let items = match value {
            Value::List(items) if items.len() == self.elements.len() => items,
            _ => return Vec::new(),
        };
        let mut candidates = Vec::new();
        for (index, (item, element)) in items.iter().zip(&self.elements).enumerate() {
            for replacement in element.shrink(item) {
                let mut simpler = items.clone();
                simpler[index] = replacement;
                candidates.push(Value::List(simpler));
            }
        }
        candidates
    }

    fn needed_components(&self) -> usize {
        self.arity
    }

    fn add_components(&mut self, components: Vec<BoxedGenerator>) -> SetupResult<()> {
        self.elements = expect_components(kinds::TUPLE, self.arity, components)?;
        Ok(())
    }

    fn domain(&self) -> Option<Vec<Value>> {
        let domains = self
            .elements
            .iter()
            .map(|element| element.domain())
            .collect::<Option<Vec<_>>>()?;
        Some(
            product_domain(&domains, MAX_PRODUCT_DOMAIN)?
                .into_iter()
                .map(Value::List)
                .collect(),
        )
    }
}
