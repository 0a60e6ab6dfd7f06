//! Directives: declarative configuration attached to type-descriptor nodes
//!
//! A directive either configures the generator chosen for a node
//! ([`DirectiveScope::GeneratorLocal`]) or constrains the node independently of
//! which generator is chosen ([`DirectiveScope::NodeLocal`]). Only generator-local
//! directives take part in capability matching during resolution.
//!
//! Range bounds and literal sets are carried as strings and converted once the
//! node's kind is known, so a malformed literal is a setup error rather than a
//! per-trial failure.

use crate::error::{SetupError, SetupResult};
use crate::types::kinds;
use crate::value::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Predicate used by `Satisfies` and by the `filter` combinator
pub type ValuePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Reference to a registered generator by name, with a selection weight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorRef {
    pub name: String,
    pub weight: u32,
}

/// Configuration attached to a single type-descriptor node
#[derive(Clone)]
pub enum Directive {
    /// Inclusive bounds; either side may be open
    Range { min: Option<String>, max: Option<String> },
    /// Inclusive bounds on the size of a collection or string
    Size { min: usize, max: usize },
    /// The node's domain is exactly these literals
    Only(Vec<String>),
    /// These literals are emitted first, in order, before random values
    Also(Vec<String>),
    /// Draws equal to any of these literals are rejected
    Exclude(Vec<String>),
    /// Draws not satisfying the predicate are rejected
    Satisfies { label: String, predicate: ValuePredicate },
    /// Explicit generator selection
    Using(Vec<GeneratorRef>),
    /// Number of decimal places kept by floating-point generators
    Precision { scale: u32 },
    /// Nodes carrying the same label share one value per trial
    Same(String),
    /// Free-form configuration understood by user generators
    Custom { name: String, params: Vec<(String, String)> },
}

/// Directive discriminant used for capability matching
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DirectiveKind {
    Range,
    Size,
    IncludeSet,
    Also,
    ExcludeComplement,
    Satisfies,
    GeneratorRef,
    Precision,
    Same,
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveScope {
    NodeLocal,
    GeneratorLocal,
}

impl Directive {
    pub fn range<T: ToString>(min: T, max: T) -> Self {
        Directive::Range {
            min: Some(min.to_string()),
            max: Some(max.to_string()),
        }
    }

    pub fn at_least<T: ToString>(min: T) -> Self {
        Directive::Range {
            min: Some(min.to_string()),
            max: None,
        }
    }

    pub fn at_most<T: ToString>(max: T) -> Self {
        Directive::Range {
            min: None,
            max: Some(max.to_string()),
        }
    }

    pub fn size(min: usize, max: usize) -> Self {
        Directive::Size { min, max }
    }

    pub fn only<I, T>(literals: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Directive::Only(literals.into_iter().map(|l| l.to_string()).collect())
    }

    pub fn also<I, T>(literals: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Directive::Also(literals.into_iter().map(|l| l.to_string()).collect())
    }

    pub fn exclude<I, T>(literals: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Directive::Exclude(literals.into_iter().map(|l| l.to_string()).collect())
    }

    pub fn satisfies<F>(label: &str, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Directive::Satisfies {
            label: label.to_string(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn using(name: &str) -> Self {
        Directive::Using(vec![GeneratorRef {
            name: name.to_string(),
            weight: 1,
        }])
    }

    pub fn using_weighted(refs: &[(&str, u32)]) -> Self {
        Directive::Using(
            refs.iter()
                .map(|(name, weight)| GeneratorRef {
                    name: name.to_string(),
                    weight: *weight,
                })
                .collect(),
        )
    }

    pub fn precision(scale: u32) -> Self {
        Directive::Precision { scale }
    }

    pub fn same(label: &str) -> Self {
        Directive::Same(label.to_string())
    }

    pub fn custom(name: &str, params: &[(&str, &str)]) -> Self {
        Directive::Custom {
            name: name.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Range { .. } => DirectiveKind::Range,
            Directive::Size { .. } => DirectiveKind::Size,
            Directive::Only(_) => DirectiveKind::IncludeSet,
            Directive::Also(_) => DirectiveKind::Also,
            Directive::Exclude(_) => DirectiveKind::ExcludeComplement,
            Directive::Satisfies { .. } => DirectiveKind::Satisfies,
            Directive::Using(_) => DirectiveKind::GeneratorRef,
            Directive::Precision { .. } => DirectiveKind::Precision,
            Directive::Same(_) => DirectiveKind::Same,
            Directive::Custom { name, .. } => DirectiveKind::Custom(name.clone()),
        }
    }

    pub fn scope(&self) -> DirectiveScope {
        self.kind().scope()
    }
}

impl DirectiveKind {
    pub fn scope(&self) -> DirectiveScope {
        match self {
            DirectiveKind::Range
            | DirectiveKind::Size
            | DirectiveKind::Precision
            | DirectiveKind::Custom(_) => DirectiveScope::GeneratorLocal,
            _ => DirectiveScope::NodeLocal,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::Range => write!(f, "range"),
            DirectiveKind::Size => write!(f, "size"),
            DirectiveKind::IncludeSet => write!(f, "only"),
            DirectiveKind::Also => write!(f, "also"),
            DirectiveKind::ExcludeComplement => write!(f, "exclude"),
            DirectiveKind::Satisfies => write!(f, "satisfies"),
            DirectiveKind::GeneratorRef => write!(f, "using"),
            DirectiveKind::Precision => write!(f, "precision"),
            DirectiveKind::Same => write!(f, "same"),
            DirectiveKind::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Directive::Size { min, max } => f
                .debug_struct("Size")
                .field("min", min)
                .field("max", max)
                .finish(),
            Directive::Only(literals) => f.debug_tuple("Only").field(literals).finish(),
            Directive::Also(literals) => f.debug_tuple("Also").field(literals).finish(),
            Directive::Exclude(literals) => f.debug_tuple("Exclude").field(literals).finish(),
            Directive::Satisfies { label, .. } => {
                f.debug_struct("Satisfies").field("label", label).finish()
            }
            Directive::Using(refs) => f.debug_tuple("Using").field(refs).finish(),
            Directive::Precision { scale } => {
                f.debug_struct("Precision").field("scale", scale).finish()
            }
            Directive::Same(label) => f.debug_tuple("Same").field(label).finish(),
            Directive::Custom { name, params } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("params", params)
                .finish(),
        }
    }
}

/// Kinds that may be attached at most once per node
const SINGLE_USE: &[DirectiveKind] = &[
    DirectiveKind::Range,
    DirectiveKind::Size,
    DirectiveKind::IncludeSet,
    DirectiveKind::GeneratorRef,
    DirectiveKind::Precision,
    DirectiveKind::Same,
];

/// Reject directive combinations that cannot be honoured together
pub fn validate_directives(raw: &str, directives: &[Directive]) -> SetupResult<()> {
    let mut seen = HashSet::new();
    for directive in directives {
        let kind = directive.kind();
        if SINGLE_USE.contains(&kind) && !seen.insert(kind.clone()) {
            return Err(SetupError::ConflictingDirectives {
                raw: raw.to_string(),
                reason: format!("`{}` given more than once", kind),
            });
        }
        match directive {
            Directive::Size { min, max } if min > max => {
                return Err(SetupError::InvalidRange {
                    raw: raw.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            Directive::Using(refs) if refs.is_empty() => {
                return Err(SetupError::IllegalArgument(format!(
                    "empty generator selection on `{}`",
                    raw
                )));
            }
            Directive::Only(literals) if literals.is_empty() => {
                return Err(SetupError::IllegalArgument(format!(
                    "empty `only` set on `{}`",
                    raw
                )));
            }
            _ => {}
        }
    }
    if seen.contains(&DirectiveKind::IncludeSet) && seen.contains(&DirectiveKind::GeneratorRef) {
        return Err(SetupError::ConflictingDirectives {
            raw: raw.to_string(),
            reason: "`only` replaces the domain, so it cannot be combined with `using`".to_string(),
        });
    }
    if seen.contains(&DirectiveKind::IncludeSet) {
        let local = generator_local_kinds(directives);
        if !local.is_empty() {
            let names: Vec<String> = local.iter().map(|kind| format!("`{}`", kind)).collect();
            return Err(SetupError::ConflictingDirectives {
                raw: raw.to_string(),
                reason: format!("`only` replaces the generator, so {} would not apply", names.join(", ")),
            });
        }
    }
    Ok(())
}

/// Generator-local directive kinds carried by `directives`, deduplicated and sorted
pub fn generator_local_kinds(directives: &[Directive]) -> Vec<DirectiveKind> {
    let mut kinds: Vec<DirectiveKind> = directives
        .iter()
        .map(Directive::kind)
        .filter(|kind| kind.scope() == DirectiveScope::GeneratorLocal)
        .collect();
    kinds.sort();
    kinds.dedup();
    kinds
}

pub fn parse_int_bound(raw: &str, bound: &str) -> SetupResult<i128> {
    bound.trim().parse::<i128>().map_err(|_| SetupError::MalformedRange {
        raw: raw.to_string(),
        bound: bound.to_string(),
    })
}

pub fn parse_float_bound(raw: &str, bound: &str) -> SetupResult<f64> {
    match bound.trim().parse::<f64>() {
        Ok(value) if !value.is_nan() => Ok(value),
        _ => Err(SetupError::MalformedRange {
            raw: raw.to_string(),
            bound: bound.to_string(),
        }),
    }
}

pub fn parse_char_bound(raw: &str, bound: &str) -> SetupResult<char> {
    let mut chars = bound.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(SetupError::MalformedRange {
            raw: raw.to_string(),
            bound: bound.to_string(),
        }),
    }
}

/// Convert a literal to a value of scalar kind `raw`.
///
/// Returns `None` when `raw` is not a scalar kind with a literal syntax; enum
/// literals are converted by the resolver, which knows the registered variants.
pub fn convert_scalar_literal(raw: &str, literal: &str) -> Option<SetupResult<Value>> {
    let conversion_error = || SetupError::LiteralConversion {
        raw: raw.to_string(),
        literal: literal.to_string(),
    };
    if let Some((min, max)) = kinds::integer_bounds(raw) {
        return Some(
            literal
                .trim()
                .parse::<i128>()
                .ok()
                .filter(|v| *v >= min && *v <= max)
                .map(Value::Integer)
                .ok_or_else(conversion_error),
        );
    }
    let converted = match raw {
        kinds::BOOL => match literal.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(conversion_error()),
        },
        kinds::F32 => literal
            .trim()
            .parse::<f32>()
            .map(|v| Value::Float(v as f64))
            .map_err(|_| conversion_error()),
        kinds::F64 => literal
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| conversion_error()),
        kinds::CHAR => parse_char_bound(raw, literal)
            .map(Value::Char)
            .map_err(|_| conversion_error()),
        kinds::STRING => Ok(Value::String(literal.to_string())),
        _ => return None,
    };
    Some(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_range_conflicts() {
        let directives = vec![Directive::range(0, 1), Directive::range(2, 3)];
        assert!(matches!(
            validate_directives("i32", &directives),
            Err(SetupError::ConflictingDirectives { .. })
        ));
    }

    #[test]
    fn test_only_with_using_conflicts() {
        let directives = vec![Directive::only(vec![1, 2]), Directive::using("i32")];
        assert!(validate_directives("i32", &directives).is_err());
    }

    #[test]
    fn test_only_with_generator_local_directive_conflicts() {
        let with_range = vec![Directive::only(vec![1, 2]), Directive::range(0, 10)];
        assert!(matches!(
            validate_directives("i32", &with_range),
            Err(SetupError::ConflictingDirectives { .. })
        ));
        let with_size = vec![Directive::size(1, 3), Directive::only(vec!["ab"])];
        assert!(matches!(
            validate_directives("string", &with_size),
            Err(SetupError::ConflictingDirectives { .. })
        ));
        let with_filter = vec![Directive::only(vec![1, 2]), Directive::exclude(vec![2])];
        assert!(validate_directives("i32", &with_filter).is_ok());
    }

    #[test]
    fn test_stacked_filters_are_allowed() {
        let directives = vec![
            Directive::exclude(vec![0]),
            Directive::exclude(vec![1]),
            Directive::satisfies("even", |v| v.as_integer().map_or(false, |i| i % 2 == 0)),
            Directive::range(0, 100),
        ];
        assert!(validate_directives("i32", &directives).is_ok());
    }

    #[test]
    fn test_generator_local_kinds_ignore_node_local() {
        let directives = vec![
            Directive::range(0, 5),
            Directive::only(vec![1]),
            Directive::same("x"),
            Directive::custom("alphabet", &[("chars", "ab")]),
        ];
        assert_eq!(
            generator_local_kinds(&directives),
            vec![DirectiveKind::Range, DirectiveKind::Custom("alphabet".to_string())]
        );
    }

    #[test]
    fn test_literal_conversion_respects_width() {
        assert_eq!(
            convert_scalar_literal(kinds::I8, "127").unwrap().unwrap(),
            Value::Integer(127)
        );
        assert!(convert_scalar_literal(kinds::I8, "128").unwrap().is_err());
        assert!(convert_scalar_literal(kinds::BOOL, "yes").unwrap().is_err());
        assert!(convert_scalar_literal("Point", "1").is_none());
    }

    #[test]
    fn test_f32_literals_round_to_f32() {
        assert_eq!(
            convert_scalar_literal(kinds::F32, "0.1").unwrap().unwrap(),
            Value::Float(0.1f32 as f64)
        );
        assert_ne!(Value::Float(0.1f32 as f64), Value::Float(0.1));
        assert_eq!(
            convert_scalar_literal(kinds::F64, "0.1").unwrap().unwrap(),
            Value::Float(0.1)
        );
    }
}
