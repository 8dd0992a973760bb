// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

use crate::Policy;

/// A specialized `Result` type for stepper operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error returned by the [`Stepper`](crate::Stepper).
///
/// Every request made to a running stepper receives exactly one answer. The variants
/// below are the failure answers; future versions may add variants.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// [`Stepper::start`](crate::Stepper::start) was called more than once.
    #[error("the stepper has already been started")]
    AlreadyStarted,

    /// A request was made before the stepper was started.
    #[error("the stepper has not been started")]
    NotStarted,

    /// The stepper's worker is gone and can no longer answer requests.
    #[error("the stepper has stopped")]
    Stopped,

    /// The request is not valid in the stepper's current state, or was malformed.
    #[error("{message} is not a valid request in the current state")]
    InvalidMessage {
        /// The name of the rejected request.
        message: &'static str,
    },

    /// A pending delay was discarded because the stepper was reset.
    #[error("the delay was canceled before its due tick was reached")]
    DelayCanceled,

    /// A non-zero interval was supplied for a policy that does not use one.
    #[error("the {policy} policy requires a zero interval")]
    DelayMustBeZero {
        /// The requested policy.
        policy: Policy,
    },

    /// A zero interval was supplied for the measured policy.
    #[error("the measured policy requires an interval greater than zero")]
    DelayMustBePositive,

    /// The policy value is unknown or is not a valid target.
    #[error("{0} is not a valid target policy")]
    InvalidPolicy(i32),

    /// A guarded policy change arrived after another policy change had already been accepted.
    #[error("the policy change guarded by epoch {guard} is too late, the current epoch is {epoch}")]
    PolicyTooLate {
        /// The epoch the caller last observed.
        guard: i64,
        /// The epoch at the time the request was processed.
        epoch: i64,
    },

    /// The state machine driving the stepper could not be assembled.
    #[error(transparent)]
    Machine(#[from] sim_fsm::Error),

    /// An operating system thread needed by the stepper could not be spawned.
    #[error("failed to spawn the {thread} thread")]
    Spawn {
        /// The name of the thread.
        thread: &'static str,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Error: Send, Sync);
    }

    #[test]
    fn policy_too_late_display() {
        let error = Error::PolicyTooLate { guard: 1, epoch: 3 };

        assert_eq!(
            error.to_string(),
            "the policy change guarded by epoch 1 is too late, the current epoch is 3"
        );
    }

    #[test]
    fn delay_must_be_zero_names_policy() {
        let error = Error::DelayMustBeZero { policy: Policy::Manual };

        assert_eq!(error.to_string(), "the Manual policy requires a zero interval");
    }

    #[test]
    fn spawn_error_keeps_source() {
        let error = Error::Spawn {
            thread: "sim-clock-stepper",
            source: std::io::Error::other("out of threads"),
        };

        assert_eq!(error.to_string(), "failed to spawn the sim-clock-stepper thread");
        assert_eq!(error.source().unwrap().to_string(), "out of threads");
    }
}
