//! Invoking property bodies and classifying what happened
//!
//! A property is any `Fn(&[Value]) -> Result<(), PropertyFailure>`. Panics
//! raised inside the body (e.g. by `assert!`) are caught and treated as
//! assertion failures.

use crate::value::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// How a property body reports that a tuple did not pass
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyFailure {
    /// The property does not hold for these arguments
    #[error("falsified: {0}")]
    Falsified(String),

    /// A precondition was not met; the tuple is not a counterexample
    #[error("assumption not met: {0}")]
    Assumption(String),

    /// The body failed for a reason other than an assertion
    #[error("error: {0}")]
    Error(String),
}

/// Skip the current tuple unless `condition` holds
pub fn assume(condition: bool, reason: &str) -> Result<(), PropertyFailure> {
    if condition {
        Ok(())
    } else {
        Err(PropertyFailure::Assumption(reason.to_string()))
    }
}

/// Fail the property unless `condition` holds
pub fn check(condition: bool, message: &str) -> Result<(), PropertyFailure> {
    if condition {
        Ok(())
    } else {
        Err(PropertyFailure::Falsified(message.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// `Falsified` or a panic
    Assertion,
    /// `PropertyFailure::Error`
    Error,
}

/// Why a tuple failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureCause {
    pub fn assertion(message: &str) -> Self {
        Self {
            kind: FailureKind::Assertion,
            message: message.to_string(),
        }
    }
}

/// Result of invoking a property on one argument tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialOutcome {
    Passed,
    Failed(FailureCause),
    Skipped(String),
}

impl TrialOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TrialOutcome::Failed(_))
    }
}

/// Run `property` on `args`, catching panics
pub fn evaluate<P>(property: &P, args: &[Value]) -> TrialOutcome
where
    P: Fn(&[Value]) -> Result<(), PropertyFailure> + ?Sized,
{
    match catch_unwind(AssertUnwindSafe(|| property(args))) {
        Ok(Ok(())) => TrialOutcome::Passed,
        Ok(Err(PropertyFailure::Falsified(message))) => {
            TrialOutcome::Failed(FailureCause::assertion(&message))
        }
        Ok(Err(PropertyFailure::Error(message))) => TrialOutcome::Failed(FailureCause {
            kind: FailureKind::Error,
            message,
        }),
        Ok(Err(PropertyFailure::Assumption(reason))) => TrialOutcome::Skipped(reason),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "property panicked".to_string());
            TrialOutcome::Failed(FailureCause::assertion(&message))
        }
    }
}

/// Receives the final counterexample once shrinking terminates.
///
/// `rerun` invokes the property again on the counterexample; the hook decides
/// whether and how often to call it.
pub trait CounterexampleHook {
    fn on_counterexample(&mut self, minimal: &[Value], rerun: &mut dyn FnMut() -> TrialOutcome);
}

impl<F> CounterexampleHook for F
where
    F: FnMut(&[Value], &mut dyn FnMut() -> TrialOutcome),
{
    fn on_counterexample(&mut self, minimal: &[Value], rerun: &mut dyn FnMut() -> TrialOutcome) {
        self(minimal, rerun)
    }
}

/// Ready-made hooks for the usual host policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerunPolicy {
    Nothing,
    /// Re-run once to reproduce the failure
    Once,
    /// Re-run `n` times to check for flakiness
    Times(u32),
}

impl CounterexampleHook for RerunPolicy {
    fn on_counterexample(&mut self, minimal: &[Value], rerun: &mut dyn FnMut() -> TrialOutcome) {
        let times = match *self {
            RerunPolicy::Nothing => 0,
            RerunPolicy::Once => 1,
            RerunPolicy::Times(n) => n,
        };
        let mut reproduced = 0;
        for _ in 0..times {
            if rerun().is_failure() {
                reproduced += 1;
            }
        }
        if times > 0 {
            log::info!(
                "counterexample {:?} reproduced {}/{} time(s)",
                minimal,
                reproduced,
                times
            );
            if reproduced < times {
                log::warn!("counterexample {:?} is flaky", minimal);
            }
        }
    }
}
