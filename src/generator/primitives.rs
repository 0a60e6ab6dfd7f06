//! Booleans, integers, floats and characters

use super::Generator;
use crate::context::GenerationStatus;
use crate::directives::{parse_char_bound, parse_float_bound, parse_int_bound, Directive};
use crate::error::{GenerationResult, SetupError, SetupResult};
use crate::random::SourceOfRandomness;
use crate::types::kinds;
use crate::value::Value;

/// Candidates between `value` and the preferred target, nearest the target first.
///
/// The target is zero clamped into `[min, max]`. Candidates approach `value` by
/// halving the remaining distance, so the last one is always one step away from it.
pub fn shrink_integer(value: i128, min: i128, max: i128) -> Vec<i128> {
    let target = 0i128.max(min).min(max);
    if value == target || value < min || value > max {
        return Vec::new();
    }
    let mut candidates = vec![target];
    let mut step = (value - target) / 2;
    while step != 0 {
        let candidate = value - step;
        if candidate != target && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
        step /= 2;
    }
    if !candidates.contains(&(value - (value - target).signum())) {
        candidates.push(value - (value - target).signum());
    }
    candidates
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanGenerator;

impl Generator for BooleanGenerator {
    fn name(&self) -> &str {
        kinds::BOOL
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        _status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        Ok(Value::Bool(random.next_boolean()))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Bool(true) => vec![Value::Bool(false)],
            _ => Vec::new(),
        }
    }

    fn domain(&self) -> Option<Vec<Value>> {
        Some(vec![Value::Bool(false), Value::Bool(true)])
    }
}

/// Uniform integers of one of the built-in widths
#[derive(Debug, Clone)]
pub struct IntegerGenerator {
    raw: String,
    min: i128,
    max: i128,
}

impl IntegerGenerator {
    /// Generator covering the full range of integer kind `raw`
    pub fn new(raw: &str) -> Self {
        let (min, max) = kinds::integer_bounds(raw)
            .unwrap_or((i64::MIN as i128, i64::MAX as i128));
        Self {
            raw: raw.to_string(),
            min,
            max,
        }
    }

    pub fn with_bounds(raw: &str, min: i128, max: i128) -> Self {
        Self {
            raw: raw.to_string(),
            min,
            max,
        }
    }

    pub fn bounds(&self) -> (i128, i128) {
        (self.min, self.max)
    }
}

impl Generator for IntegerGenerator {
    fn name(&self) -> &str {
        &self.raw
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        _status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        Ok(Value::Integer(random.next_integer_in(self.min, self.max)?))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Integer(i) => shrink_integer(*i, self.min, self.max)
                .into_iter()
                .map(Value::Integer)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        if let Directive::Range { min, max } = directive {
            let (type_min, type_max) = kinds::integer_bounds(&self.raw)
                .unwrap_or((i64::MIN as i128, i64::MAX as i128));
            let min = match min {
                Some(bound) => parse_int_bound(&self.raw, bound)?,
                None => type_min,
            };
            let max = match max {
                Some(bound) => parse_int_bound(&self.raw, bound)?,
                None => type_max,
            };
            if min > max || min < type_min || max > type_max {
                return Err(SetupError::InvalidRange {
                    raw: self.raw.clone(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            self.min = min;
            self.max = max;
        }
        Ok(())
    }
}

/// Floating-point values, optionally rounded to a number of decimal places
#[derive(Debug, Clone)]
pub struct FloatGenerator {
    raw: String,
    min: f64,
    max: f64,
    scale: Option<u32>,
}

impl FloatGenerator {
    pub fn new(raw: &str) -> Self {
        let limit = if raw == kinds::F32 {
            f32::MAX as f64
        } else {
            f64::MAX
        };
        Self {
            raw: raw.to_string(),
            min: -limit,
            max: limit,
            scale: None,
        }
    }

    pub fn with_bounds(raw: &str, min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            ..Self::new(raw)
        }
    }

    fn finish(&self, value: f64) -> f64 {
        let mut value = if self.raw == kinds::F32 {
            value as f32 as f64
        } else {
            value
        };
        if let Some(scale) = self.scale {
            let factor = 10f64.powi(scale as i32);
            let scaled = (value * factor).round() / factor;
            if scaled.is_finite() {
                value = scaled;
            }
        }
        value.max(self.min).min(self.max)
    }
}

impl Generator for FloatGenerator {
    fn name(&self) -> &str {
        &self.raw
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        _status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let value = random.next_double_in(self.min, self.max)?;
        Ok(Value::Float(self.finish(value)))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        let value = match value {
            Value::Float(f) if f.is_finite() => *f,
            _ => return Vec::new(),
        };
        let target = self.finish(0.0);
        let mut candidates: Vec<Value> = Vec::new();
        for candidate in [target, value.trunc(), value / 2.0].iter() {
            let candidate = self.finish(*candidate);
            let candidate = Value::Float(candidate);
            if candidate != Value::Float(value) && !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        match directive {
            Directive::Range { min, max } => {
                let min = match min {
                    Some(bound) => parse_float_bound(&self.raw, bound)?,
                    None => self.min,
                };
                let max = match max {
                    Some(bound) => parse_float_bound(&self.raw, bound)?,
                    None => self.max,
                };
                if min > max {
                    return Err(SetupError::InvalidRange {
                        raw: self.raw.clone(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                self.min = min;
                self.max = max;
            }
            Directive::Precision { scale } => self.scale = Some(*scale),
            _ => {}
        }
        Ok(())
    }
}

/// Characters with code points in an inclusive range
#[derive(Debug, Clone)]
pub struct CharGenerator {
    min: char,
    max: char,
}

impl Default for CharGenerator {
    fn default() -> Self {
        Self {
            min: '\u{0}',
            max: std::char::MAX,
        }
    }
}

impl CharGenerator {
    pub fn with_bounds(min: char, max: char) -> Self {
        Self { min, max }
    }

    /// Simpler characters within the configured range, approaching `c` from
    /// `'a'` clamped into the range, or from the range minimum below that
    pub fn shrink_char(&self, c: char) -> Vec<char> {
        if c < self.min || c > self.max {
            return Vec::new();
        }
        let preferred = 'a'.max(self.min).min(self.max);
        let target = if c < preferred { self.min as i128 } else { preferred as i128 };
        let value = c as i128;
        if value == target {
            return Vec::new();
        }
        let mut candidates = vec![target];
        let mut step = (value - target) / 2;
        while step != 0 {
            candidates.push(value - step);
            step /= 2;
        }
        candidates.push(value - (value - target).signum());
        let mut chars: Vec<char> = Vec::new();
        for code in candidates {
            if let Some(candidate) = std::char::from_u32(code as u32) {
                let in_range = candidate >= self.min && candidate <= self.max;
                if in_range && candidate != c && !chars.contains(&candidate) {
                    chars.push(candidate);
                }
            }
        }
        chars
    }
}

impl Generator for CharGenerator {
    fn name(&self) -> &str {
        kinds::CHAR
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        _status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        Ok(Value::Char(random.next_char_in(self.min, self.max)?))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Char(c) => self.shrink_char(*c).into_iter().map(Value::Char).collect(),
            _ => Vec::new(),
        }
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        if let Directive::Range { min, max } = directive {
            let min = match min {
                Some(bound) => parse_char_bound(kinds::CHAR, bound)?,
                None => self.min,
            };
            let max = match max {
                Some(bound) => parse_char_bound(kinds::CHAR, bound)?,
                None => self.max,
            };
            if min > max {
                return Err(SetupError::InvalidRange {
                    raw: kinds::CHAR.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            self.min = min;
            self.max = max;
        }
        Ok(())
    }
}
