// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Duration;

use crate::{Error, Result};

/// The rule that governs how the tick advances.
///
/// The numeric values are the ones used on the wire; use [`Policy::try_from`] to convert a
/// raw value received from a remote caller.
///
/// # Examples
///
/// ```
/// use sim_clock::Policy;
///
/// assert_eq!(Policy::try_from(2)?, Policy::Manual);
/// assert!(Policy::try_from(7).is_err());
/// # Ok::<(), sim_clock::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Policy {
    /// No policy is in effect. The tick cannot advance and delays are rejected.
    ///
    /// This is the policy after a reset. It is never a valid target of a policy change.
    #[default]
    Invalid = 0,

    /// Delays never block: the tick jumps forward to the earliest due tick.
    NoWait = 1,

    /// The tick advances by one on every explicit step.
    Manual = 2,

    /// The tick advances by one every configured real-time interval.
    Measured = 3,
}

impl Policy {
    /// Returns the wire value of the policy.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Checks that `interval` is acceptable for this policy as a target.
    pub(crate) fn validate(self, interval: Duration) -> Result<()> {
        match self {
            Self::Invalid => Err(Error::InvalidPolicy(self.as_i32())),
            Self::NoWait | Self::Manual if !interval.is_zero() => Err(Error::DelayMustBeZero { policy: self }),
            Self::Measured if interval.is_zero() => Err(Error::DelayMustBePositive),
            Self::NoWait | Self::Manual | Self::Measured => Ok(()),
        }
    }
}

impl TryFrom<i32> for Policy {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Invalid),
            1 => Ok(Self::NoWait),
            2 => Ok(Self::Manual),
            3 => Ok(Self::Measured),
            other => Err(Error::InvalidPolicy(other)),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "Invalid",
            Self::NoWait => "NoWait",
            Self::Manual => "Manual",
            Self::Measured => "Measured",
        };
        f.write_str(name)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_round_trip() {
        for policy in [Policy::Invalid, Policy::NoWait, Policy::Manual, Policy::Measured] {
            assert_eq!(Policy::try_from(policy.as_i32()).unwrap(), policy);
        }
    }

    #[test]
    fn out_of_range_value_is_invalid_policy() {
        assert!(matches!(Policy::try_from(-1), Err(Error::InvalidPolicy(-1))));
        assert!(matches!(Policy::try_from(4), Err(Error::InvalidPolicy(4))));
    }

    #[test]
    fn invalid_is_never_a_target() {
        assert!(matches!(Policy::Invalid.validate(Duration::ZERO), Err(Error::InvalidPolicy(0))));
    }

    #[test]
    fn no_wait_and_manual_require_zero_interval() {
        Policy::NoWait.validate(Duration::ZERO).unwrap();
        Policy::Manual.validate(Duration::ZERO).unwrap();

        assert!(matches!(
            Policy::Manual.validate(Duration::from_millis(1)),
            Err(Error::DelayMustBeZero { policy: Policy::Manual })
        ));
        assert!(matches!(
            Policy::NoWait.validate(Duration::from_secs(1)),
            Err(Error::DelayMustBeZero { policy: Policy::NoWait })
        ));
    }

    #[test]
    fn measured_requires_positive_interval() {
        Policy::Measured.validate(Duration::from_millis(1)).unwrap();

        assert!(matches!(
            Policy::Measured.validate(Duration::ZERO),
            Err(Error::DelayMustBePositive)
        ));
    }
}
