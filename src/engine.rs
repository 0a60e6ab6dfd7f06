//! PropertyRunner - drives a property from its signature to a report
//!
//! A run resolves a generator for every parameter, samples argument tuples
//! (randomly or exhaustively), shrinks the first counterexample and hands it to
//! the counterexample hook. Nothing is printed; the host reads the returned
//! [`RunReport`].

use crate::context::{discard_budget, GenerationContext, GenerationStatus};
use crate::error::{RunAbort, SetupFailure};
use crate::generator::Generator;
use crate::property::{evaluate, CounterexampleHook, FailureCause, PropertyFailure};
use crate::random::SourceOfRandomness;
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::sampling::{AssumptionPolicy, Parameter, Sampler, SamplingMode, SamplingResult};
use crate::shrinking::{ShrinkLimits, ShrinkReport, Shrinker};
use crate::types::{Bindings, DeclaredType, TypeKey};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trials run when none are requested
pub const DEFAULT_TRIALS: u32 = 100;

/// Configuration for a [`PropertyRunner`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of trials; in exhaustive mode, a cap on the enumerated combinations
    pub trials: Option<u32>,

    /// Fixed seed for replay; drawn from entropy when absent
    pub seed: Option<u64>,

    pub mode: SamplingMode,

    /// Shrink counterexamples before reporting them
    pub shrink: bool,

    pub max_shrinks: u32,
    pub max_shrink_depth: u32,
    pub max_shrink_time: Duration,

    /// Negative: no discards; zero: one per trial; positive: this many per trial
    pub discard_ratio: i32,

    /// Upper end of the size hint handed to collection generators
    pub max_size: u32,

    pub assumptions: AssumptionPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trials: None,
            seed: None,
            mode: SamplingMode::Random,
            shrink: true,
            max_shrinks: 100,
            max_shrink_depth: 20,
            max_shrink_time: Duration::from_secs(60),
            discard_ratio: 0,
            max_size: 100,
            assumptions: AssumptionPolicy::CountTowardTrials,
        }
    }
}

impl RunConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn effective_trials(&self) -> u32 {
        self.trials.unwrap_or(DEFAULT_TRIALS)
    }

    pub fn shrink_limits(&self) -> ShrinkLimits {
        ShrinkLimits {
            max_shrinks: self.max_shrinks,
            max_depth: self.max_shrink_depth,
            max_time: self.max_shrink_time,
        }
    }
}

/// Declared parameters of a property, in order
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<(String, DeclaredType)>,
    bindings: Bindings,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, declared: DeclaredType) -> Self {
        self.params.push((name.to_string(), declared));
        self
    }

    /// Bindings for type variables the parameters mention
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn params(&self) -> &[(String, DeclaredType)] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Counterexample {
    /// The tuple that first failed
    pub original: Vec<Value>,
    /// The smallest failing tuple the shrinker found
    pub minimal: Vec<Value>,
    pub cause: FailureCause,
    pub shrink: ShrinkReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success,
    Failure(Counterexample),
    SetupError(SetupFailure),
    Aborted(RunAbort),
}

/// Result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Seed that reproduces this run
    pub seed: u64,
    /// Number of times the property was invoked while sampling
    pub trials_run: u32,
    pub discards: u64,
    /// Trials whose assumptions were not met
    pub skipped: u32,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    pub fn counterexample(&self) -> Option<&Counterexample> {
        match &self.outcome {
            RunOutcome::Failure(counterexample) => Some(counterexample),
            _ => None,
        }
    }
}

/// Runs properties against generators resolved from a [`Registry`]
pub struct PropertyRunner<'r> {
    registry: &'r Registry,
    config: RunConfig,
    hook: Option<Box<dyn CounterexampleHook + 'r>>,
}

impl<'r> PropertyRunner<'r> {
    pub fn new(registry: &'r Registry, config: RunConfig) -> Self {
        Self {
            registry,
            config,
            hook: None,
        }
    }

    /// Install a hook that receives the final counterexample of each failing run
    pub fn with_hook<H: CounterexampleHook + 'r>(mut self, hook: H) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Resolve a generator for every parameter of `signature`
    pub fn resolve(&self, signature: &Signature) -> Result<Vec<Parameter>, SetupFailure> {
        let resolver = Resolver::new(self.registry);
        signature
            .params
            .iter()
            .enumerate()
            .map(|(index, (name, declared))| {
                let failure = |source| SetupFailure {
                    parameter: name.clone(),
                    source,
                };
                let descriptor = declared
                    .resolve(&signature.bindings, self.registry, TypeKey::parameter(index))
                    .map_err(failure)?;
                let generator = resolver.resolve(&descriptor).map_err(failure)?;
                log::debug!("parameter `{}` uses generator {}", name, generator.name());
                Ok(Parameter {
                    name: name.clone(),
                    generator,
                    shared: descriptor.shared_label().map(|_| descriptor.key().clone()),
                })
            })
            .collect()
    }

    /// Run `property` against tuples drawn for `signature`
    pub fn run<P>(&mut self, signature: &Signature, property: P) -> RunReport
    where
        P: Fn(&[Value]) -> Result<(), PropertyFailure>,
    {
        let random = match self.config.seed {
            Some(seed) => SourceOfRandomness::new(seed),
            None => SourceOfRandomness::from_entropy(),
        };
        let seed = random.seed();
        log::info!("running property with seed {}", seed);

        let parameters = match self.resolve(signature) {
            Ok(parameters) => parameters,
            Err(failure) => {
                log::error!("{}", failure);
                return RunReport {
                    seed,
                    trials_run: 0,
                    discards: 0,
                    skipped: 0,
                    outcome: RunOutcome::SetupError(failure),
                };
            }
        };

        let trials = self.config.effective_trials();
        let budget = discard_budget(self.config.discard_ratio, trials);
        let mut context =
            GenerationContext::new(random, GenerationStatus::new(budget), trials, self.config.max_size);

        let mut sampler = Sampler::new(&parameters, &property, self.config.assumptions);
        let result = match self.config.mode {
            SamplingMode::Random => sampler.run_random(&mut context, trials),
            SamplingMode::Exhaustive => sampler.run_exhaustive(&mut context, self.config.trials, trials),
        };
        let stats = sampler.stats();
        let discards = context.status().discards();

        let outcome = match result {
            SamplingResult::Passed => {
                log::info!("property passed {} trial(s)", stats.trials_run);
                RunOutcome::Success
            }
            SamplingResult::Aborted(abort) => RunOutcome::Aborted(abort),
            SamplingResult::Failed { args, cause } => {
                RunOutcome::Failure(self.report_failure(parameters, &property, args, cause))
            }
        };
        RunReport {
            seed,
            trials_run: stats.trials_run,
            discards,
            skipped: stats.skipped,
            outcome,
        }
    }

    fn report_failure<P>(
        &mut self,
        parameters: Vec<Parameter>,
        property: &P,
        original: Vec<Value>,
        cause: FailureCause,
    ) -> Counterexample
    where
        P: Fn(&[Value]) -> Result<(), PropertyFailure>,
    {
        let (minimal, cause, shrink) = if self.config.shrink {
            let mut generators = Vec::with_capacity(parameters.len());
            let mut shared = Vec::with_capacity(parameters.len());
            for parameter in parameters {
                generators.push(parameter.generator);
                shared.push(parameter.shared);
            }
            Shrinker::new(
                &generators,
                &shared,
                property,
                self.config.shrink_limits(),
                original.clone(),
                cause,
            )
            .shrink()
        } else {
            (original.clone(), cause, ShrinkReport::disabled())
        };
        log::info!("counterexample: {:?} ({})", minimal, cause.message);

        if let Some(hook) = self.hook.as_mut() {
            let mut rerun = || evaluate(property, &minimal);
            hook.on_counterexample(&minimal, &mut rerun);
        }
        Counterexample {
            original,
            minimal,
            cause,
            shrink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::check;
    use crate::shrinking::ShrinkTermination;
    use crate::types::kinds;

    #[test]
    fn test_config_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.effective_trials(), 100);
        assert!(config.shrink);
        assert_eq!(config.max_shrinks, 100);
        assert_eq!(config.max_shrink_depth, 20);
        assert_eq!(config.max_shrink_time, Duration::from_secs(60));
        assert_eq!(config.discard_ratio, 0);
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let config = RunConfig::from_json(r#"{"trials": 7, "mode": "Exhaustive", "seed": 3}"#).unwrap();
        assert_eq!(config.trials, Some(7));
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.mode, SamplingMode::Exhaustive);
        assert_eq!(config.max_shrinks, 100);
        assert!(RunConfig::from_json("{\"trials\": -1}").is_err());
    }

    #[test]
    fn test_passing_property_reports_success() {
        let registry = Registry::new();
        let config = RunConfig {
            trials: Some(20),
            seed: Some(1),
            ..RunConfig::default()
        };
        let signature = Signature::new().param("b", DeclaredType::named(kinds::BOOL));
        let report = PropertyRunner::new(&registry, config).run(&signature, |_| Ok(()));
        assert!(report.is_success());
        assert_eq!(report.trials_run, 20);
        assert_eq!(report.seed, 1);
    }

    #[test]
    fn test_shrink_disabled_reports_original() {
        let registry = Registry::new();
        let config = RunConfig {
            seed: Some(9),
            shrink: false,
            ..RunConfig::default()
        };
        let signature = Signature::new().param("n", DeclaredType::named(kinds::I32));
        let report = PropertyRunner::new(&registry, config)
            .run(&signature, |args| check(args[0].as_integer() == Some(0), "nonzero"));
        let counterexample = report.counterexample().unwrap();
        assert_eq!(counterexample.original, counterexample.minimal);
        assert_eq!(counterexample.shrink.termination, ShrinkTermination::Disabled);
    }

    #[test]
    fn test_unresolvable_parameter_is_setup_error() {
        let registry = Registry::new();
        let signature = Signature::new().param("t", DeclaredType::variable("T"));
        let report = PropertyRunner::new(&registry, RunConfig::default()).run(&signature, |_| Ok(()));
        match report.outcome {
            RunOutcome::SetupError(failure) => assert_eq!(failure.parameter, "t"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(report.trials_run, 0);
    }
}
