//! Trial drivers
//!
//! [`Sampler::run_random`] draws a fresh tuple for every trial.
//! [`Sampler::run_exhaustive`] enumerates the Cartesian product of every
//! parameter with a finite domain, first parameter slowest, and draws the
//! remaining parameters afresh for each combination.

use crate::context::GenerationContext;
use crate::error::{GenerationError, RunAbort};
use crate::generator::{BoxedGenerator, Generator};
use crate::property::{evaluate, FailureCause, PropertyFailure, TrialOutcome};
use crate::types::TypeKey;
use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMode {
    Random,
    Exhaustive,
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::Random
    }
}

/// How trials whose assumptions fail are accounted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssumptionPolicy {
    /// A skipped trial uses up one of the run's trials
    CountTowardTrials,
    /// A skipped trial is charged as a discard; the run continues until the
    /// requested number of trials pass
    ExtendRun,
}

impl Default for AssumptionPolicy {
    fn default() -> Self {
        AssumptionPolicy::CountTowardTrials
    }
}

/// One resolved parameter of a property
#[derive(Debug)]
pub struct Parameter {
    pub name: String,
    pub generator: BoxedGenerator,
    /// Correlation key when the parameter is marked `Same`
    pub shared: Option<TypeKey>,
}

/// How sampling ended
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingResult {
    Passed,
    Failed { args: Vec<Value>, cause: FailureCause },
    Aborted(RunAbort),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingStats {
    /// Property invocations
    pub trials_run: u32,
    pub skipped: u32,
}

pub struct Sampler<'a, P: ?Sized> {
    parameters: &'a [Parameter],
    property: &'a P,
    policy: AssumptionPolicy,
    stats: SamplingStats,
}

impl<'a, P> Sampler<'a, P>
where
    P: Fn(&[Value]) -> Result<(), PropertyFailure> + ?Sized,
{
    pub fn new(parameters: &'a [Parameter], property: &'a P, policy: AssumptionPolicy) -> Self {
        Self {
            parameters,
            property,
            policy,
            stats: SamplingStats::default(),
        }
    }

    pub fn stats(&self) -> SamplingStats {
        self.stats
    }

    /// Run `trials` random trials
    pub fn run_random(&mut self, context: &mut GenerationContext, trials: u32) -> SamplingResult {
        let mut passed = 0u32;
        let mut index = 0u32;
        loop {
            let done = match self.policy {
                AssumptionPolicy::CountTowardTrials => index >= trials,
                AssumptionPolicy::ExtendRun => passed >= trials,
            };
            if done {
                return SamplingResult::Passed;
            }
            context.begin_trial(index);
            let mut args = Vec::with_capacity(self.parameters.len());
            for parameter in self.parameters {
                match context.draw(&parameter.generator) {
                    Ok(value) => args.push(value),
                    Err(err) => return SamplingResult::Aborted(self.abort(parameter, err)),
                }
            }
            match self.trial(&args) {
                TrialOutcome::Passed => passed += 1,
                TrialOutcome::Skipped(_) => {
                    if self.policy == AssumptionPolicy::ExtendRun {
                        if let Err(err) = context.record_discard() {
                            return SamplingResult::Aborted(self.abort_discards(err));
                        }
                    }
                }
                TrialOutcome::Failed(cause) => return SamplingResult::Failed { args, cause },
            }
            index = index.saturating_add(1);
        }
    }

    /// Enumerate every combination of the finite parameters, at most `cap` of
    /// them. Falls back to `fallback_trials` random trials when no parameter
    /// has a finite domain.
    pub fn run_exhaustive(
        &mut self,
        context: &mut GenerationContext,
        cap: Option<u32>,
        fallback_trials: u32,
    ) -> SamplingResult {
        let mut enumerated: Vec<(usize, Vec<Value>)> = Vec::new();
        for (index, parameter) in self.parameters.iter().enumerate() {
            let follows_earlier = parameter.shared.is_some()
                && enumerated
                    .iter()
                    .any(|(earlier, _)| self.parameters[*earlier].shared == parameter.shared);
            if follows_earlier {
                continue;
            }
            if let Some(domain) = parameter.generator.domain() {
                if domain.is_empty() {
                    log::warn!("parameter `{}` has no value left to enumerate", parameter.name);
                    return SamplingResult::Aborted(RunAbort::Generation {
                        parameter: parameter.name.clone(),
                        source: GenerationError::Exhausted(format!(
                            "every value of `{}` is rejected by its directives",
                            parameter.generator.name()
                        )),
                    });
                }
                enumerated.push((index, domain));
            }
        }
        if enumerated.is_empty() {
            log::debug!("no parameter has a finite domain; sampling randomly");
            return self.run_random(context, fallback_trials);
        }

        let total = enumerated
            .iter()
            .fold(1u64, |acc, (_, domain)| acc.saturating_mul(domain.len() as u64));
        let limit = cap.map_or(total, |cap| total.min(cap as u64));
        log::debug!("enumerating {} of {} combination(s)", limit, total);

        for combination in 0..limit {
            let trial = combination.min(u32::MAX as u64) as u32;
            context.begin_trial(trial);
            let mut fixed: Vec<Option<Value>> = vec![None; self.parameters.len()];
            let mut remainder = combination;
            for (index, domain) in enumerated.iter().rev() {
                let len = domain.len() as u64;
                let value = domain[(remainder % len) as usize].clone();
                remainder /= len;
                if let Some(key) = &self.parameters[*index].shared {
                    context.correlate(key, value.clone());
                }
                fixed[*index] = Some(value);
            }
            let mut args = Vec::with_capacity(self.parameters.len());
            for (parameter, value) in self.parameters.iter().zip(fixed) {
                match value {
                    Some(value) => args.push(value),
                    None => match context.draw(&parameter.generator) {
                        Ok(value) => args.push(value),
                        Err(err) => return SamplingResult::Aborted(self.abort(parameter, err)),
                    },
                }
            }
            if let TrialOutcome::Failed(cause) = self.trial(&args) {
                return SamplingResult::Failed { args, cause };
            }
        }
        SamplingResult::Passed
    }

    fn trial(&mut self, args: &[Value]) -> TrialOutcome {
        self.stats.trials_run += 1;
        let outcome = evaluate(self.property, args);
        log::trace!("trial {}: {:?} -> {:?}", self.stats.trials_run, args, outcome);
        match &outcome {
            TrialOutcome::Skipped(_) => self.stats.skipped += 1,
            TrialOutcome::Failed(cause) => {
                log::debug!("property failed on {:?}: {}", args, cause.message)
            }
            TrialOutcome::Passed => {}
        }
        outcome
    }

    fn abort(&self, parameter: &Parameter, err: GenerationError) -> RunAbort {
        match err {
            GenerationError::DiscardRatioExceeded { .. } => self.abort_discards(err),
            source => RunAbort::Generation {
                parameter: parameter.name.clone(),
                source,
            },
        }
    }

    fn abort_discards(&self, err: GenerationError) -> RunAbort {
        match err {
            GenerationError::DiscardRatioExceeded { discards, budget } => {
                log::warn!(
                    "aborting after {} discards (budget {}) and {} trial(s)",
                    discards,
                    budget,
                    self.stats.trials_run
                );
                RunAbort::DiscardRatioExceeded {
                    discards,
                    budget,
                    trials: self.stats.trials_run,
                }
            }
            source => RunAbort::Generation {
                parameter: String::new(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenerationStatus;
    use crate::generator::{BooleanGenerator, GeneratorExt, IntegerGenerator};
    use crate::random::SourceOfRandomness;
    use crate::types::kinds;
    use std::cell::RefCell;

    fn parameter(name: &str, generator: BoxedGenerator) -> Parameter {
        Parameter {
            name: name.to_string(),
            generator,
            shared: None,
        }
    }

    fn context(budget: u64, trials: u32) -> GenerationContext {
        GenerationContext::new(SourceOfRandomness::new(70), GenerationStatus::new(budget), trials, 100)
    }

    #[test]
    fn test_random_runs_requested_trials() {
        let parameters = vec![parameter("n", IntegerGenerator::new(kinds::I32).boxed())];
        let property = |_: &[Value]| -> Result<(), PropertyFailure> { Ok(()) };
        let mut sampler = Sampler::new(&parameters, &property, AssumptionPolicy::CountTowardTrials);
        assert_eq!(sampler.run_random(&mut context(10, 25), 25), SamplingResult::Passed);
        assert_eq!(sampler.stats().trials_run, 25);
    }

    #[test]
    fn test_exhaustive_orders_first_parameter_slowest() {
        let parameters = vec![
            parameter("a", BooleanGenerator.boxed()),
            parameter("b", BooleanGenerator.boxed()),
        ];
        let seen = RefCell::new(Vec::new());
        let property = |args: &[Value]| -> Result<(), PropertyFailure> {
            seen.borrow_mut().push(args.to_vec());
            Ok(())
        };
        let mut sampler = Sampler::new(&parameters, &property, AssumptionPolicy::CountTowardTrials);
        assert_eq!(
            sampler.run_exhaustive(&mut context(10, 4), None, 100),
            SamplingResult::Passed
        );
        let f = Value::Bool(false);
        let t = Value::Bool(true);
        assert_eq!(
            *seen.borrow(),
            vec![
                vec![f.clone(), f.clone()],
                vec![f.clone(), t.clone()],
                vec![t.clone(), f],
                vec![t.clone(), t],
            ]
        );
    }

    #[test]
    fn test_exhaustive_cap_takes_prefix() {
        let parameters = vec![parameter("a", IntegerGenerator::with_bounds(kinds::I32, 0, 9).boxed())];
        let property = |_: &[Value]| -> Result<(), PropertyFailure> { Ok(()) };
        let mut sampler = Sampler::new(&parameters, &property, AssumptionPolicy::CountTowardTrials);
        // Integer ranges expose no domain, so this falls back to random trials
        sampler.run_exhaustive(&mut context(10, 7), Some(3), 7);
        assert_eq!(sampler.stats().trials_run, 7);

        let parameters = vec![parameter("a", BooleanGenerator.boxed())];
        let mut sampler = Sampler::new(&parameters, &property, AssumptionPolicy::CountTowardTrials);
        sampler.run_exhaustive(&mut context(10, 7), Some(1), 7);
        assert_eq!(sampler.stats().trials_run, 1);
    }

    #[test]
    fn test_exhaustive_empty_domain_aborts() {
        let parameters = vec![
            parameter("a", BooleanGenerator.boxed()),
            parameter(
                "b",
                crate::generator::NodeFilter::new(
                    vec![Value::Bool(false), Value::Bool(true)],
                    Vec::new(),
                    BooleanGenerator.boxed(),
                )
                .boxed(),
            ),
        ];
        let property = |_: &[Value]| -> Result<(), PropertyFailure> { Err(PropertyFailure::Falsified("always".to_string())) };
        let mut sampler = Sampler::new(&parameters, &property, AssumptionPolicy::CountTowardTrials);
        match sampler.run_exhaustive(&mut context(10, 4), None, 4) {
            SamplingResult::Aborted(RunAbort::Generation { parameter, source }) => {
                assert_eq!(parameter, "b");
                assert!(matches!(source, GenerationError::Exhausted(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(sampler.stats().trials_run, 0);
    }

    #[test]
    fn test_extend_run_charges_skips_as_discards() {
        let parameters = vec![parameter("a", BooleanGenerator.boxed())];
        let property = |_: &[Value]| crate::property::assume(false, "never");
        let mut sampler = Sampler::new(&parameters, &property, AssumptionPolicy::ExtendRun);
        match sampler.run_random(&mut context(5, 5), 5) {
            SamplingResult::Aborted(RunAbort::DiscardRatioExceeded { discards, budget, .. }) => {
                assert_eq!(discards, 6);
                assert_eq!(budget, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(sampler.stats().skipped, 6);
    }

    #[test]
    fn test_count_toward_trials_tolerates_skips() {
        let parameters = vec![parameter("a", BooleanGenerator.boxed())];
        let property = |_: &[Value]| crate::property::assume(false, "never");
        let mut sampler = Sampler::new(&parameters, &property, AssumptionPolicy::CountTowardTrials);
        assert_eq!(sampler.run_random(&mut context(0, 5), 5), SamplingResult::Passed);
        assert_eq!(sampler.stats().skipped, 5);
    }
}
