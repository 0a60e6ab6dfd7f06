//! # propgen
//!
//! Type-directed property-based testing.
//!
//! A property's parameters are described by [`DeclaredType`]s. Each one is
//! resolved against a [`Registry`] to a generator, argument tuples are sampled
//! randomly or exhaustively, and the first tuple that falsifies the property is
//! shrunk to a minimal counterexample before it is reported.
//!
//! ```ignore
//! let registry = Registry::new();
//! let signature = Signature::new().param("n", DeclaredType::named(kinds::I32).with(Directive::range("0", "100")));
//! let report = PropertyRunner::new(&registry, RunConfig::default())
//!     .run(&signature, |args| check(args[0].as_integer() < Some(50), "too big"));
//! ```

pub mod context;
pub mod directives;
pub mod engine;
pub mod error;
pub mod generator;
pub mod property;
pub mod random;
pub mod registry;
pub mod resolver;
pub mod sampling;
pub mod shrinking;
pub mod types;
pub mod value;

// Re-export core types for easy access
pub use context::{discard_budget, GenerationContext, GenerationStatus};
pub use directives::{Directive, DirectiveKind, DirectiveScope, GeneratorRef};
pub use engine::{Counterexample, PropertyRunner, RunConfig, RunOutcome, RunReport, Signature};
pub use error::{GenerationError, RandomError, RunAbort, SetupError, SetupFailure};
pub use generator::{sample, BoxedGenerator, Generator, GeneratorExt};
pub use property::{assume, check, CounterexampleHook, FailureCause, FailureKind, PropertyFailure, RerunPolicy, TrialOutcome};
pub use random::SourceOfRandomness;
pub use registry::{CompositeType, Constructor, Field, GeneratorRegistration, Produces, Registry};
pub use resolver::Resolver;
pub use sampling::{AssumptionPolicy, SamplingMode};
pub use shrinking::{ShrinkBound, ShrinkReport, ShrinkTermination};
pub use types::{kinds, Bindings, DeclaredType, TypeDescriptor, TypeKey};
pub use value::Value;
