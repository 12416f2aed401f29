//! Inter-dispatch delay scheduling.
//!
//! checkpagerank.net returns an empty results page when two lookups arrive
//! less than ~30 seconds apart. A batch therefore spaces its dispatches out,
//! either by a constant delay or by a random delay drawn from a range whose
//! lower bound already clears the rate-limit window.

use crate::error::PageRankError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum interval the remote service tolerates between two lookups.
pub const MIN_SAFE_DELAY_SECS: u64 = 30;

/// Default lower bound for randomized delays.
pub const DEFAULT_MIN_DELAY_SECS: u64 = 35;

/// Default (exclusive) upper bound for randomized delays.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 60;

/// How the wait between two consecutive dispatches is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DelayPolicy {
    /// Same delay before every dispatch after the first
    Fixed { secs: u64 },

    /// Whole seconds drawn uniformly from `[min_secs, max_secs)`
    Random { min_secs: u64, max_secs: u64 },
}

impl DelayPolicy {
    /// Constant delay; rejects anything below [`MIN_SAFE_DELAY_SECS`].
    pub fn fixed(secs: u64) -> Result<Self, PageRankError> {
        let policy = DelayPolicy::Fixed { secs };
        policy.validate()?;
        Ok(policy)
    }

    /// Randomized delay in `[min_secs, max_secs)`.
    pub fn random(min_secs: u64, max_secs: u64) -> Result<Self, PageRankError> {
        let policy = DelayPolicy::Random { min_secs, max_secs };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the policy against the service minimum.
    pub fn validate(&self) -> Result<(), PageRankError> {
        match *self {
            DelayPolicy::Fixed { secs } if secs < MIN_SAFE_DELAY_SECS => {
                Err(PageRankError::config(format!(
                    "Fixed delay of {}s is below the {}s minimum between requests",
                    secs, MIN_SAFE_DELAY_SECS
                )))
            }
            DelayPolicy::Random { min_secs, .. } if min_secs < MIN_SAFE_DELAY_SECS => {
                Err(PageRankError::config(format!(
                    "Minimum random delay of {}s is below the {}s minimum between requests",
                    min_secs, MIN_SAFE_DELAY_SECS
                )))
            }
            DelayPolicy::Random { min_secs, max_secs } if max_secs <= min_secs => {
                Err(PageRankError::config(format!(
                    "Maximum random delay ({}s) must be greater than the minimum ({}s)",
                    max_secs, min_secs
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        DelayPolicy::Random {
            min_secs: DEFAULT_MIN_DELAY_SECS,
            max_secs: DEFAULT_MAX_DELAY_SECS,
        }
    }
}

/// Ordered waits for one batch: entry `i` is the delay between dispatch
/// `i` and dispatch `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelaySchedule {
    delays: Vec<Duration>,
}

impl DelaySchedule {
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Duration> {
        self.delays.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.delays.iter().copied()
    }

    pub fn as_slice(&self) -> &[Duration] {
        &self.delays
    }

    /// Sum of all waits, i.e. the time until the last dispatch starts.
    pub fn total(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Produces delay schedules from a validated [`DelayPolicy`].
pub struct DelayScheduler {
    policy: DelayPolicy,
    rng: StdRng,
}

impl DelayScheduler {
    /// Create a scheduler seeded from the system RNG.
    pub fn new(policy: DelayPolicy) -> Result<Self, PageRankError> {
        Self::with_seed(policy, rand::random())
    }

    /// Create a scheduler with a fixed seed, for reproducible schedules.
    pub fn with_seed(policy: DelayPolicy, seed: u64) -> Result<Self, PageRankError> {
        policy.validate()?;
        Ok(Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn policy(&self) -> &DelayPolicy {
        &self.policy
    }

    /// Build the schedule for `domain_count` dispatches.
    ///
    /// Always `domain_count - 1` entries (none for zero or one domain).
    pub fn schedule(&mut self, domain_count: usize) -> DelaySchedule {
        let delays = (1..domain_count).map(|_| self.next_delay()).collect();
        DelaySchedule { delays }
    }

    fn next_delay(&mut self) -> Duration {
        match self.policy {
            DelayPolicy::Fixed { secs } => Duration::from_secs(secs),
            DelayPolicy::Random { min_secs, max_secs } => {
                Duration::from_secs(self.rng.random_range(min_secs..max_secs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_below_minimum_rejected() {
        let result = DelayPolicy::fixed(10);
        assert!(matches!(result, Err(PageRankError::ConfigError { .. })));
        assert!(DelayPolicy::fixed(MIN_SAFE_DELAY_SECS).is_ok());
    }

    #[test]
    fn test_random_bounds_validated() {
        assert!(DelayPolicy::random(20, 60).is_err());
        assert!(DelayPolicy::random(40, 40).is_err());
        assert!(DelayPolicy::random(40, 35).is_err());
        assert!(DelayPolicy::random(30, 31).is_ok());
    }

    #[test]
    fn test_schedule_length() {
        let mut scheduler = DelayScheduler::new(DelayPolicy::default()).unwrap();
        assert_eq!(scheduler.schedule(0).len(), 0);
        assert_eq!(scheduler.schedule(1).len(), 0);
        assert_eq!(scheduler.schedule(5).len(), 4);
    }

    #[test]
    fn test_fixed_schedule_is_constant() {
        let mut scheduler = DelayScheduler::new(DelayPolicy::fixed(45).unwrap()).unwrap();
        let schedule = scheduler.schedule(4);

        assert!(schedule.iter().all(|d| d == Duration::from_secs(45)));
        assert_eq!(schedule.total(), Duration::from_secs(135));
    }

    #[test]
    fn test_random_schedule_within_bounds() {
        let policy = DelayPolicy::random(35, 60).unwrap();
        let mut scheduler = DelayScheduler::with_seed(policy, 7).unwrap();
        let schedule = scheduler.schedule(500);

        assert_eq!(schedule.len(), 499);
        for delay in schedule.iter() {
            assert!(delay >= Duration::from_secs(35), "{:?} below range", delay);
            assert!(delay < Duration::from_secs(60), "{:?} above range", delay);
        }
    }

    #[test]
    fn test_seeded_schedules_repeat() {
        let policy = DelayPolicy::default();
        let a = DelayScheduler::with_seed(policy.clone(), 42)
            .unwrap()
            .schedule(10);
        let b = DelayScheduler::with_seed(policy, 42).unwrap().schedule(10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_policy_rejected_by_scheduler() {
        let policy = DelayPolicy::Fixed { secs: 5 };
        assert!(DelayScheduler::new(policy).is_err());
    }
}
