//! Shrink search over failing argument tuples
//!
//! The [`Shrinker`] keeps the smallest failing tuple found so far and asks each
//! parameter's generator for simpler candidates. Parameters take turns: after a
//! parameter improves the tuple, the next pass starts with the parameter after
//! it, so no parameter is exhausted before the others get a chance. Once a full
//! pass makes no progress, pairs of parameters are shrunk together before the
//! search is declared converged.
//!
//! Every tuple tried is fingerprinted; a tuple is never evaluated twice, which
//! also stops generators that offer the input back as its own shrink.

use crate::generator::{BoxedGenerator, Generator};
use crate::property::{evaluate, FailureCause, PropertyFailure, TrialOutcome};
use crate::types::TypeKey;
use crate::value::{fingerprint, Value};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Number of candidates per parameter tried in the combination phase
const COMBINATION_WIDTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShrinkLimits {
    pub max_shrinks: u32,
    pub max_depth: u32,
    pub max_time: Duration,
}

/// The bound that stopped a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkBound {
    Attempts,
    Depth,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkTermination {
    /// Shrinking was turned off; the original tuple is reported as is
    Disabled,
    /// A full pass found no smaller failing tuple
    Converged,
    BoundExceeded(ShrinkBound),
    /// Converged, but some candidates failed in an unexpected way
    ErrorDuringShrink,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShrinkReport {
    pub attempts: u32,
    pub depth: u32,
    pub termination: ShrinkTermination,
    /// Unexpected failures seen while evaluating candidates
    pub anomalies: Vec<FailureCause>,
}

impl ShrinkReport {
    pub fn disabled() -> Self {
        Self {
            attempts: 0,
            depth: 0,
            termination: ShrinkTermination::Disabled,
            anomalies: Vec::new(),
        }
    }
}

/// Per-failure search state
#[derive(Debug)]
struct ShrinkState {
    best: Vec<Value>,
    cause: FailureCause,
    depth: u32,
    attempts: u32,
    /// `None` when the time bound is too large to represent
    deadline: Option<Instant>,
    visited: HashSet<[u8; 32]>,
}

enum Step {
    Improved,
    Rejected,
    Stopped(ShrinkBound),
}

pub struct Shrinker<'a, P: ?Sized> {
    generators: &'a [BoxedGenerator],
    shared: &'a [Option<TypeKey>],
    property: &'a P,
    limits: ShrinkLimits,
    state: ShrinkState,
    anomalies: Vec<FailureCause>,
}

impl<'a, P> Shrinker<'a, P>
where
    P: Fn(&[Value]) -> Result<(), PropertyFailure> + ?Sized,
{
    /// `shared[i]` is the correlation key of parameter `i`, if it has one;
    /// parameters with equal keys are always substituted together.
    pub fn new(
        generators: &'a [BoxedGenerator],
        shared: &'a [Option<TypeKey>],
        property: &'a P,
        limits: ShrinkLimits,
        original: Vec<Value>,
        cause: FailureCause,
    ) -> Self {
        let mut visited = HashSet::new();
        visited.insert(fingerprint(&original));
        Self {
            generators,
            shared,
            property,
            limits,
            state: ShrinkState {
                best: original,
                cause,
                depth: 0,
                attempts: 0,
                deadline: Instant::now().checked_add(limits.max_time),
                visited,
            },
            anomalies: Vec::new(),
        }
    }

    /// Run the search to termination, returning the smallest failing tuple,
    /// its failure cause and a report of the search
    pub fn shrink(mut self) -> (Vec<Value>, FailureCause, ShrinkReport) {
        log::debug!("shrinking {:?}", self.state.best);
        let arity = self.state.best.len();
        let mut start = 0;
        let termination = 'search: loop {
            let mut improved = false;
            for offset in 0..arity {
                let index = (start + offset) % arity;
                match self.shrink_parameter(index) {
                    Step::Improved => {
                        start = (index + 1) % arity;
                        improved = true;
                        break;
                    }
                    Step::Rejected => {}
                    Step::Stopped(bound) => break 'search ShrinkTermination::BoundExceeded(bound),
                }
            }
            if improved {
                continue;
            }
            match self.shrink_pairs() {
                Step::Improved => continue,
                Step::Rejected if self.anomalies.is_empty() => break ShrinkTermination::Converged,
                Step::Rejected => break ShrinkTermination::ErrorDuringShrink,
                Step::Stopped(bound) => break ShrinkTermination::BoundExceeded(bound),
            }
        };
        log::info!(
            "shrinking finished ({:?}) after {} attempt(s) at depth {}: {:?}",
            termination,
            self.state.attempts,
            self.state.depth,
            self.state.best
        );
        let report = ShrinkReport {
            attempts: self.state.attempts,
            depth: self.state.depth,
            termination,
            anomalies: self.anomalies,
        };
        (self.state.best, self.state.cause, report)
    }

    fn shrink_parameter(&mut self, index: usize) -> Step {
        let current = self.state.best[index].clone();
        for candidate in self.generators[index].shrink(&current) {
            if candidate == current {
                continue;
            }
            let tuple = self.substitute(&self.state.best, index, &candidate);
            match self.consider(tuple) {
                Step::Rejected => {}
                step => return step,
            }
        }
        Step::Rejected
    }

    fn shrink_pairs(&mut self) -> Step {
        let arity = self.state.best.len();
        for i in 0..arity {
            for j in (i + 1)..arity {
                if self.shared[i].is_some() && self.shared[i] == self.shared[j] {
                    continue;
                }
                let firsts: Vec<Value> = self.generators[i]
                    .shrink(&self.state.best[i])
                    .into_iter()
                    .take(COMBINATION_WIDTH)
                    .collect();
                let seconds: Vec<Value> = self.generators[j]
                    .shrink(&self.state.best[j])
                    .into_iter()
                    .take(COMBINATION_WIDTH)
                    .collect();
                for first in &firsts {
                    for second in &seconds {
                        let partial = self.substitute(&self.state.best, i, first);
                        let tuple = self.substitute(&partial, j, second);
                        match self.consider(tuple) {
                            Step::Rejected => {}
                            step => return step,
                        }
                    }
                }
            }
        }
        Step::Rejected
    }

    /// Copy of `tuple` with `value` at `index` and at every parameter sharing its key
    fn substitute(&self, tuple: &[Value], index: usize, value: &Value) -> Vec<Value> {
        let mut substituted = tuple.to_vec();
        for (position, slot) in substituted.iter_mut().enumerate() {
            let correlated = self.shared[index].is_some() && self.shared[position] == self.shared[index];
            if position == index || correlated {
                *slot = value.clone();
            }
        }
        substituted
    }

    fn consider(&mut self, tuple: Vec<Value>) -> Step {
        let key = fingerprint(&tuple);
        if self.state.visited.contains(&key) {
            return Step::Rejected;
        }
        if self.state.attempts >= self.limits.max_shrinks {
            return Step::Stopped(ShrinkBound::Attempts);
        }
        if self.state.depth >= self.limits.max_depth {
            return Step::Stopped(ShrinkBound::Depth);
        }
        if self.state.deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            return Step::Stopped(ShrinkBound::Time);
        }
        self.state.visited.insert(key);
        self.state.attempts += 1;

        match evaluate(self.property, &tuple) {
            TrialOutcome::Failed(cause) if cause.kind == self.state.cause.kind => {
                log::trace!("shrink step {}: {:?}", self.state.depth + 1, tuple);
                self.state.best = tuple;
                self.state.cause = cause;
                self.state.depth += 1;
                Step::Improved
            }
            TrialOutcome::Failed(cause) => {
                log::debug!("unexpected failure while shrinking {:?}: {}", tuple, cause.message);
                self.anomalies.push(cause);
                Step::Rejected
            }
            TrialOutcome::Skipped(_) | TrialOutcome::Passed => Step::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{BooleanGenerator, GeneratorExt, IntegerGenerator};
    use crate::property::FailureKind;
    use crate::types::kinds;

    fn limits() -> ShrinkLimits {
        ShrinkLimits {
            max_shrinks: 1_000,
            max_depth: 100,
            max_time: Duration::from_secs(60),
        }
    }

    fn ints() -> BoxedGenerator {
        IntegerGenerator::new(kinds::I32).boxed()
    }

    #[test]
    fn test_converges_to_threshold() {
        let generators = vec![ints()];
        let shared = vec![None];
        let property = |args: &[Value]| {
            crate::property::check(args[0].as_integer().unwrap_or(0) <= 10, "too big")
        };
        let shrinker = Shrinker::new(
            &generators,
            &shared,
            &property,
            limits(),
            vec![Value::Integer(1_000)],
            FailureCause::assertion("too big"),
        );
        let (best, _, report) = shrinker.shrink();
        assert_eq!(best, vec![Value::Integer(11)]);
        assert_eq!(report.termination, ShrinkTermination::Converged);
        assert!(report.depth > 0);
    }

    #[test]
    fn test_every_parameter_gets_a_turn() {
        let generators = vec![ints(), ints()];
        let shared = vec![None, None];
        let property = |args: &[Value]| {
            let sum = args[0].as_integer().unwrap_or(0) + args[1].as_integer().unwrap_or(0);
            crate::property::check(sum < 10, "sum too big")
        };
        let shrinker = Shrinker::new(
            &generators,
            &shared,
            &property,
            limits(),
            vec![Value::Integer(40), Value::Integer(40)],
            FailureCause::assertion("sum too big"),
        );
        let (best, _, _) = shrinker.shrink();
        let sum: i128 = best.iter().filter_map(Value::as_integer).sum();
        assert_eq!(sum, 10);
    }

    #[test]
    fn test_attempt_bound() {
        let generators = vec![ints()];
        let shared = vec![None];
        let property = |_: &[Value]| -> Result<(), PropertyFailure> {
            Err(PropertyFailure::Falsified("always".to_string()))
        };
        let mut bounded = limits();
        bounded.max_shrinks = 0;
        let shrinker = Shrinker::new(
            &generators,
            &shared,
            &property,
            bounded,
            vec![Value::Integer(5)],
            FailureCause::assertion("always"),
        );
        let (best, _, report) = shrinker.shrink();
        assert_eq!(best, vec![Value::Integer(5)]);
        assert_eq!(report.attempts, 0);
        assert_eq!(report.termination, ShrinkTermination::BoundExceeded(ShrinkBound::Attempts));
    }

    #[test]
    fn test_depth_bound() {
        let generators = vec![ints()];
        let shared = vec![None];
        let property = |args: &[Value]| {
            crate::property::check(args[0].as_integer().unwrap_or(0) <= 0, "positive")
        };
        let mut bounded = limits();
        bounded.max_depth = 1;
        let shrinker = Shrinker::new(
            &generators,
            &shared,
            &property,
            bounded,
            vec![Value::Integer(100)],
            FailureCause::assertion("positive"),
        );
        let (_, _, report) = shrinker.shrink();
        assert_eq!(report.depth, 1);
        assert_eq!(report.termination, ShrinkTermination::BoundExceeded(ShrinkBound::Depth));
    }

    #[test]
    fn test_unexpected_errors_are_reported() {
        let generators = vec![ints()];
        let shared = vec![None];
        let property = |args: &[Value]| match args[0].as_integer().unwrap_or(0) {
            0 => Err(PropertyFailure::Error("zero".to_string())),
            n if n > 3 => Err(PropertyFailure::Falsified("big".to_string())),
            _ => Ok(()),
        };
        let shrinker = Shrinker::new(
            &generators,
            &shared,
            &property,
            limits(),
            vec![Value::Integer(20)],
            FailureCause::assertion("big"),
        );
        let (best, cause, report) = shrinker.shrink();
        assert_eq!(best, vec![Value::Integer(4)]);
        assert_eq!(cause.kind, FailureKind::Assertion);
        assert_eq!(report.termination, ShrinkTermination::ErrorDuringShrink);
        assert_eq!(report.anomalies[0].kind, FailureKind::Error);
    }

    #[test]
    fn test_assumption_failures_are_not_counterexamples() {
        let generators = vec![BooleanGenerator.boxed()];
        let shared = vec![None];
        let property = |args: &[Value]| -> Result<(), PropertyFailure> {
            crate::property::assume(args[0] == Value::Bool(true), "needs true")?;
            Err(PropertyFailure::Falsified("fails".to_string()))
        };
        let shrinker = Shrinker::new(
            &generators,
            &shared,
            &property,
            limits(),
            vec![Value::Bool(true)],
            FailureCause::assertion("fails"),
        );
        let (best, _, report) = shrinker.shrink();
        assert_eq!(best, vec![Value::Bool(true)]);
        assert_eq!(report.termination, ShrinkTermination::Converged);
    }

    #[test]
    fn test_shared_parameters_shrink_together() {
        let generators = vec![ints(), ints()];
        let key = Some(TypeKey::shared("n"));
        let shared = vec![key.clone(), key];
        let property = |args: &[Value]| {
            crate::property::check(args[0] != args[1] || args[0].as_integer().unwrap_or(0) < 5, "equal")
        };
        let shrinker = Shrinker::new(
            &generators,
            &shared,
            &property,
            limits(),
            vec![Value::Integer(50), Value::Integer(50)],
            FailureCause::assertion("equal"),
        );
        let (best, _, _) = shrinker.shrink();
        assert_eq!(best, vec![Value::Integer(5), Value::Integer(5)]);
    }
}
