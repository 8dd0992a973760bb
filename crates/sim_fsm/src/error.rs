// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use thiserror::Error;

/// A specialized `Result` type for state machine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by enter and leave hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error raised by a [`Machine`](crate::Machine).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A transition referenced a state that was never registered.
    ///
    /// The machine is left in the state it was in before the transition was attempted.
    #[error("state {0} is not registered")]
    UnknownState(String),

    /// The builder was finished without choosing an initial state.
    #[error("no initial state was configured")]
    NoInitialState,

    /// An enter or leave hook reported a failure.
    ///
    /// Hook failures never block a transition; by the time this error is observed the machine
    /// is already in the target state.
    #[error("{phase} hook of state {state} failed")]
    Hook {
        /// The state whose hook failed.
        state: String,
        /// Whether the failure happened while entering or leaving the state.
        phase: HookPhase,
        /// The failure reported by the hook.
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Returns `true` when the machine can no longer be trusted to follow its tables.
    ///
    /// Only references to unknown states are fatal. Hook failures are surfaced for diagnostics
    /// but leave the machine in a consistent state.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Hook { .. })
    }

    pub(crate) fn unknown_state(name: impl fmt::Debug) -> Self {
        Self::UnknownState(format!("{name:?}"))
    }

    pub(crate) fn hook(state: impl fmt::Debug, phase: HookPhase, source: BoxError) -> Self {
        Self::Hook {
            state: format!("{state:?}"),
            phase,
            source,
        }
    }
}

/// Identifies which hook of a state failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// The hook run when the machine enters a state.
    Enter,
    /// The hook run when the machine leaves a state.
    Leave,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => write!(f, "enter"),
            Self::Leave => write!(f, "leave"),
        }
    }
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
    fn unknown_state_is_fatal() {
        let error = Error::unknown_state("Missing");

        assert!(error.is_fatal());
        assert_eq!(error.to_string(), "state \"Missing\" is not registered");
    }

    #[test]
    fn hook_error_is_not_fatal() {
        let error = Error::hook("Measured", HookPhase::Leave, "timer did not stop".into());

        assert!(!error.is_fatal());
        assert_eq!(error.to_string(), "leave hook of state \"Measured\" failed");
        assert_eq!(error.source().unwrap().to_string(), "timer did not stop");
    }
}
