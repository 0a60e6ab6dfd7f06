//! Error taxonomy for the generation engine
//!
//! Errors are split by the layer that raises them and by how the runner treats them:
//!
//! - [`SetupError`]: raised while building descriptors and resolving generators.
//!   Always fatal, always reported before the first trial, never shrunk.
//! - [`GenerationError`]: raised while drawing a single value.
//! - [`RandomError`]: invalid arguments to the randomness source.
//! - [`RunAbort`]: conditions that stop a run without falsifying the property.

/// Type alias for resolution-time results
pub type SetupResult<T> = Result<T, SetupError>;

/// Type alias for per-draw results
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Invalid arguments handed to a [`crate::random::SourceOfRandomness`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RandomError {
    #[error("Invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: String, max: String },

    #[error("Cannot choose from an empty set")]
    EmptyChoice,
}

/// Configuration problems detected before any trial runs
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error("Unresolved type variable `{0}`")]
    UnresolvedTypeVariable(String),

    #[error("Type `{raw}` expects {expected} type argument(s) but {found} were given")]
    ArityMismatch { raw: String, expected: usize, found: usize },

    #[error("Generator `{generator}` produces {produces}, which is incompatible with `{requested}`")]
    TypeMismatch { generator: String, produces: String, requested: String },

    #[error("Wildcards cannot be marked with an explicit generator")]
    WildcardGeneratorSelection,

    #[error("No generator for `{raw}` supports the directive(s) {directives:?}")]
    GeneratorConfigurationMismatch { raw: String, directives: Vec<String> },

    #[error("Conflicting directives on `{raw}`: {reason}")]
    ConflictingDirectives { raw: String, reason: String },

    #[error("Cannot find a suitable generator for `{0}`")]
    NoSuitableGenerator(String),

    #[error("Unknown generator `{0}`")]
    UnknownGenerator(String),

    #[error("Malformed range bound `{bound}` for `{raw}`")]
    MalformedRange { raw: String, bound: String },

    #[error("Invalid range for `{raw}`: {min} > {max}")]
    InvalidRange { raw: String, min: String, max: String },

    #[error("Cannot convert literal `{literal}` to `{raw}`")]
    LiteralConversion { raw: String, literal: String },

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Type nesting deeper than {0} levels while resolving generators")]
    RecursionLimit(usize),
}

impl SetupError {
    /// Component-count deficit reported by composite generators
    pub fn missing_components(generator: &str, needed: usize, supplied: usize) -> Self {
        SetupError::IllegalArgument(format!(
            "generator `{}` needs {} component generator(s) but {} were supplied ({} missing)",
            generator,
            needed,
            supplied,
            needed.saturating_sub(supplied)
        ))
    }
}

/// A [`SetupError`] together with the parameter it occurred on
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parameter `{parameter}`: {source}")]
pub struct SetupFailure {
    pub parameter: String,
    #[source]
    pub source: SetupError,
}

/// Failures while drawing a value for one trial
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("Discarded {discards} draws, exceeding the budget of {budget}")]
    DiscardRatioExceeded { discards: u64, budget: u64 },

    #[error(transparent)]
    Random(#[from] RandomError),

    #[error("Failed to construct `{type_name}`: {reason}")]
    Construction { type_name: String, reason: String },

    #[error("Unable to generate {0} distinct elements")]
    Exhausted(String),
}

/// Fatal run conditions that are not property falsifications
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunAbort {
    #[error("Discard ratio exceeded: {discards} discards after {trials} trial(s), budget {budget}")]
    DiscardRatioExceeded { discards: u64, budget: u64, trials: u32 },

    #[error("Generation failed for parameter `{parameter}`: {source}")]
    Generation {
        parameter: String,
        #[source]
        source: GenerationError,
    },
}
