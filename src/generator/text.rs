//! Strings and byte strings

use super::collections::{shrink_sequence, SizeBounds};
use super::primitives::{shrink_integer, CharGenerator};
use super::Generator;
use crate::context::GenerationStatus;
use crate::directives::Directive;
use crate::error::{GenerationResult, SetupResult};
use crate::random::SourceOfRandomness;
use crate::types::kinds;
use crate::value::Value;

/// Strings whose length follows the `Size` directive or the trial's size hint.
///
/// Three characters in four are printable ASCII; the rest span all of Unicode.
#[derive(Debug, Clone, Default)]
pub struct StringGenerator {
    size: SizeBounds,
    chars: CharGenerator,
}

impl StringGenerator {
    fn draw_char(&self, random: &mut SourceOfRandomness) -> GenerationResult<char> {
        if random.next_integer_in(0, 3)? < 3 {
            Ok(random.next_char_in(' ', '~')?)
        } else {
            Ok(random.next_char_in('\u{0}', std::char::MAX)?)
        }
    }
}

impl Generator for StringGenerator {
    fn name(&self) -> &str {
        kinds::STRING
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let len = self.size.draw_len(random, status)?;
        let mut s = String::with_capacity(len);
        for _ in 0..len {
            s.push(self.draw_char(random)?);
        }
        Ok(Value::String(s))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        let s = match value {
            Value::String(s) => s,
            _ => return Vec::new(),
        };
        let chars: Vec<char> = s.chars().collect();
        shrink_sequence(&chars, self.size.min, &|c: &char| self.chars.shrink_char(*c))
            .into_iter()
            .map(|shrunk| Value::String(shrunk.into_iter().collect()))
            .collect()
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        self.size.configure(kinds::STRING, directive)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BytesGenerator {
    size: SizeBounds,
}

impl Generator for BytesGenerator {
    fn name(&self) -> &str {
        kinds::BYTES
    }

    fn generate(
        &self,
        random: &mut SourceOfRandomness,
        status: &mut GenerationStatus,
    ) -> GenerationResult<Value> {
        let len = self.size.draw_len(random, status)?;
        Ok(Value::Bytes(random.next_bytes(len)))
    }

    fn shrink(&self, value: &Value) -> Vec<Value> {
        let bytes = match value {
            Value::Bytes(bytes) => bytes,
            _ => return Vec::new(),
        };
        let shrink_byte = |b: &u8| {
            shrink_integer(*b as i128, 0, u8::MAX as i128)
                .into_iter()
                .map(|v| v as u8)
                .collect::<Vec<u8>>()
        };
        shrink_sequence(bytes, self.size.min, &shrink_byte)
            .into_iter()
            .map(Value::Bytes)
            .collect()
    }

    fn configure(&mut self, directive: &Directive) -> SetupResult<()> {
        self.size.configure(kinds::BYTES, directive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::sample;

    #[test]
    fn test_string_respects_size() {
        let mut generator = StringGenerator::default();
        generator.configure(&Directive::size(2, 4)).unwrap();
        let mut random = SourceOfRandomness::new(21);
        for _ in 0..100 {
            let value = sample(&generator, &mut random, 50).unwrap();
            let len = value.as_str().unwrap().chars().count();
            assert!((2..=4).contains(&len));
        }
    }

    #[test]
    fn test_string_shrinks_to_shorter_first() {
        let generator = StringGenerator::default();
        let candidates = generator.shrink(&Value::String("xyz".to_string()));
        assert_eq!(candidates[0], Value::String(String::new()));
        assert!(candidates.contains(&Value::String("ayz".to_string())));
    }

    #[test]
    fn test_string_shrink_keeps_min_len() {
        let mut generator = StringGenerator::default();
        generator.configure(&Directive::size(2, 5)).unwrap();
        let candidates = generator.shrink(&Value::String("abc".to_string()));
        assert!(candidates.iter().all(|c| c.as_str().unwrap().chars().count() >= 2));
    }

    #[test]
    fn test_bytes_shrink_keeps_min_len() {
        let mut generator = BytesGenerator::default();
        generator.configure(&Directive::size(3, 6)).unwrap();
        let candidates = generator.shrink(&Value::Bytes(vec![9, 200, 7, 1, 0]));
        assert!(!candidates.is_empty());
        for candidate in candidates {
            match candidate {
                Value::Bytes(bytes) => assert!((3..=6).contains(&bytes.len())),
                other => panic!("unexpected value {:?}", other),
            }
        }
    }

    #[test]
    fn test_bytes_length_follows_size_hint() {
        let generator = BytesGenerator::default();
        let mut random = SourceOfRandomness::new(22);
        for _ in 0..50 {
            match sample(&generator, &mut random, 3).unwrap() {
                Value::Bytes(bytes) => assert!(bytes.len() <= 3),
                other => panic!("unexpected value {:?}", other),
            }
        }
    }
}
