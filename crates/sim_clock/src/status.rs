// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::Policy;

/// A diagnostic snapshot of the stepper, returned by [`Stepper::status`](crate::Stepper::status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Status {
    /// The policy currently in effect.
    pub policy: Policy,
    /// The interval between automatic ticks. Zero unless the policy is [`Policy::Measured`].
    pub measured_delay: Duration,
    /// The current tick.
    pub now: i64,
    /// The number of accepted policy changes, including the initial start.
    pub epoch: i64,
    /// The number of callers blocked in a delay.
    pub waiters: usize,
}
