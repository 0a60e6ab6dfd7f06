//! Per-run generation state
//!
//! A [`GenerationContext`] owns the run's randomness and its [`GenerationStatus`].
//! The status is what generators see: the current trial index, the size hint for
//! that trial, the discard budget shared by every filter in the run, and the
//! correlation table used by `Same` directives.

use crate::error::{GenerationError, GenerationResult};
use crate::generator::Generator;
use crate::random::SourceOfRandomness;
use crate::types::TypeKey;
use crate::value::Value;
use std::collections::HashMap;

/// Number of discards a run may make before it is aborted.
///
/// A negative ratio allows none; a zero ratio allows one discard per trial; a
/// positive ratio allows `ratio × trials`.
pub fn discard_budget(discard_ratio: i32, trials: u32) -> u64 {
    if discard_ratio < 0 {
        0
    } else if discard_ratio == 0 {
        trials as u64
    } else {
        discard_ratio as u64 * trials as u64
    }
}

/// State visible to generators while drawing
#[derive(Debug, Clone)]
pub struct GenerationStatus {
    trial: u32,
    size: u32,
    attempts: u64,
    discards: u64,
    discard_budget: Option<u64>,
    correlations: HashMap<TypeKey, Value>,
    emissions: HashMap<TypeKey, usize>,
}

impl GenerationStatus {
    /// Status for a run that may discard at most `discard_budget` draws
    pub fn new(discard_budget: u64) -> Self {
        Self::with_budget(Some(discard_budget))
    }

    /// Status with no discard limit, for drawing outside a run
    pub fn unbounded() -> Self {
        Self::with_budget(None)
    }

    fn with_budget(discard_budget: Option<u64>) -> Self {
        Self {
            trial: 0,
            size: 0,
            attempts: 0,
            discards: 0,
            discard_budget,
            correlations: HashMap::new(),
            emissions: HashMap::new(),
        }
    }

    /// Set the size hint directly
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn trial(&self) -> u32 {
        self.trial
    }

    /// Size hint for collections drawn in the current trial
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of tuples drawn so far, including discarded ones
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn discards(&self) -> u64 {
        self.discards
    }

    pub fn discard_budget(&self) -> Option<u64> {
        self.discard_budget
    }

    /// Charge one rejected draw against the run's discard budget
    pub fn record_discard(&mut self) -> GenerationResult<()> {
        self.discards += 1;
        match self.discard_budget {
            Some(budget) if self.discards > budget => {
                log::debug!("discard budget {} exceeded after {} discards", budget, self.discards);
                Err(GenerationError::DiscardRatioExceeded {
                    discards: self.discards,
                    budget,
                })
            }
            _ => Ok(()),
        }
    }

    /// Value already drawn this trial for a correlated node
    pub fn correlated(&self, key: &TypeKey) -> Option<&Value> {
        self.correlations.get(key)
    }

    pub fn correlate(&mut self, key: &TypeKey, value: Value) {
        self.correlations.insert(key.clone(), value);
    }

    /// Number of earlier draws made for `key` in this run; increments the count
    pub fn next_emission(&mut self, key: &TypeKey) -> usize {
        let count = self.emissions.entry(key.clone()).or_insert(0);
        let index = *count;
        *count += 1;
        index
    }

    /// Start a new trial. Correlations only hold within a single trial.
    pub(crate) fn begin_trial(&mut self, trial: u32, size: u32) {
        self.trial = trial;
        self.size = size;
        self.attempts += 1;
        self.correlations.clear();
    }
}

/// Randomness plus status for one run
#[derive(Debug)]
pub struct GenerationContext {
    random: SourceOfRandomness,
    status: GenerationStatus,
    trials: u32,
    max_size: u32,
}

impl GenerationContext {
    pub fn new(random: SourceOfRandomness, status: GenerationStatus, trials: u32, max_size: u32) -> Self {
        Self {
            random,
            status,
            trials,
            max_size,
        }
    }

    pub fn seed(&self) -> u64 {
        self.random.seed()
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    pub fn random_mut(&mut self) -> &mut SourceOfRandomness {
        &mut self.random
    }

    /// Size hint for trial `index`: grows linearly from 0 to `max_size`
    pub fn size_for(&self, index: u32) -> u32 {
        if self.trials <= 1 {
            return self.max_size;
        }
        let scaled = index as u64 * self.max_size as u64 / (self.trials as u64 - 1);
        scaled.min(self.max_size as u64) as u32
    }

    pub fn begin_trial(&mut self, index: u32) {
        let size = self.size_for(index);
        self.status.begin_trial(index, size);
    }

    pub fn draw(&mut self, generator: &dyn Generator) -> GenerationResult<Value> {
        generator.generate(&mut self.random, &mut self.status)
    }

    /// Charge a discard that happened outside any generator, e.g. a skipped trial
    pub fn record_discard(&mut self) -> GenerationResult<()> {
        self.status.record_discard()
    }

    /// Record a value chosen by the driver rather than drawn, e.g. during enumeration
    pub fn correlate(&mut self, key: &TypeKey, value: Value) {
        self.status.correlate(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_budget_policies() {
        assert_eq!(discard_budget(-1, 100), 0);
        assert_eq!(discard_budget(0, 100), 100);
        assert_eq!(discard_budget(3, 100), 300);
    }

    #[test]
    fn test_record_discard_fails_past_budget() {
        let mut status = GenerationStatus::new(2);
        assert!(status.record_discard().is_ok());
        assert!(status.record_discard().is_ok());
        assert_eq!(
            status.record_discard(),
            Err(GenerationError::DiscardRatioExceeded { discards: 3, budget: 2 })
        );
    }

    #[test]
    fn test_size_grows_across_trials() {
        let context = GenerationContext::new(
            SourceOfRandomness::new(0),
            GenerationStatus::unbounded(),
            11,
            100,
        );
        assert_eq!(context.size_for(0), 0);
        assert_eq!(context.size_for(5), 50);
        assert_eq!(context.size_for(10), 100);
        assert_eq!(context.size_for(40), 100);
    }

    #[test]
    fn test_correlations_reset_each_trial() {
        let mut status = GenerationStatus::unbounded();
        let key = TypeKey::shared("x");
        status.begin_trial(0, 0);
        status.correlate(&key, Value::Integer(1));
        assert_eq!(status.correlated(&key), Some(&Value::Integer(1)));
        status.begin_trial(1, 0);
        assert_eq!(status.correlated(&key), None);
    }

    #[test]
    fn test_emissions_persist_across_trials() {
        let mut status = GenerationStatus::unbounded();
        let key = TypeKey::parameter(0);
        status.begin_trial(0, 0);
        assert_eq!(status.next_emission(&key), 0);
        status.begin_trial(1, 0);
        assert_eq!(status.next_emission(&key), 1);
    }
}
