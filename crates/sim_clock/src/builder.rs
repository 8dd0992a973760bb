// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;
use tokio::sync::mpsc;

use crate::stepper_state::StepperState;
use crate::{Policy, Result, Stepper, machine};

const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configures and creates a [`Stepper`].
///
/// Created by [`Stepper::builder`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sim_clock::{Policy, Stepper};
/// use tick::ClockControl;
///
/// let stepper = Stepper::builder(&ClockControl::new().to_clock())
///     .policy(Policy::Measured, Duration::from_millis(100))
///     .queue_capacity(16)
///     .jitter_seed(42)
///     .build()?;
/// # Ok::<(), sim_clock::Error>(())
/// ```
#[derive(Debug)]
#[must_use]
pub struct StepperBuilder {
    clock: Clock,
    policy: Policy,
    interval: Duration,
    queue_capacity: usize,
    jitter_seed: u64,
}

impl StepperBuilder {
    pub(crate) fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            policy: Policy::Manual,
            interval: Duration::ZERO,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            jitter_seed: 0,
        }
    }

    /// Sets the policy entered by [`Stepper::start`] and its automatic tick interval.
    ///
    /// Defaults to [`Policy::Manual`] with a zero interval.
    pub fn policy(mut self, policy: Policy, interval: Duration) -> Self {
        self.policy = policy;
        self.interval = interval;
        self
    }

    /// Sets how many requests may be queued for the worker before callers have to wait.
    ///
    /// Defaults to 100. Values below 1 are raised to 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Sets the seed of the random draws that resolve delay jitter.
    ///
    /// Two steppers with the same seed that receive the same sequence of delays resolve them
    /// to the same ticks. Defaults to 0.
    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = seed;
        self
    }

    /// Creates the stepper. The worker is not running until [`Stepper::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Stepper::set_policy`] when the configured policy and
    /// interval do not fit together.
    pub fn build(self) -> Result<Stepper> {
        self.policy.validate(self.interval)?;

        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let state = StepperState::new(self.policy, self.interval, self.clock, sender.downgrade(), self.jitter_seed);
        let machine = machine::build(state)?;

        Ok(Stepper::new(self.policy, machine, sender, receiver))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use tick::ClockControl;

    use super::*;
    use crate::Error;

    fn builder() -> StepperBuilder {
        Stepper::builder(&ClockControl::new().to_clock())
    }

    #[test]
    fn defaults() {
        let builder = builder();

        assert_eq!(builder.policy, Policy::Manual);
        assert_eq!(builder.interval, Duration::ZERO);
        assert_eq!(builder.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(builder.jitter_seed, 0);
        builder.build().unwrap();
    }

    #[test]
    fn queue_capacity_is_at_least_one() {
        assert_eq!(builder().queue_capacity(0).queue_capacity, 1);
    }

    #[test]
    fn first_policy_is_validated() {
        assert!(matches!(
            builder().policy(Policy::Invalid, Duration::ZERO).build(),
            Err(Error::InvalidPolicy(0))
        ));
        assert!(matches!(
            builder().policy(Policy::Manual, Duration::from_secs(1)).build(),
            Err(Error::DelayMustBeZero { policy: Policy::Manual })
        ));
        assert!(matches!(
            builder().policy(Policy::Measured, Duration::ZERO).build(),
            Err(Error::DelayMustBePositive)
        ));
    }
}
