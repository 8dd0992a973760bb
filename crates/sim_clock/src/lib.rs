// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A simulated logical clock for deterministic simulations.
//!
//! A [`Stepper`] keeps a single authoritative tick, a signed 64-bit counter that starts at
//! zero and never decreases except through [`Stepper::reset`]. Components of a simulation
//! read it with [`Stepper::now`], wait on it with [`Stepper::delay`] and, depending on the
//! active [`Policy`], advance it with [`Stepper::step`].
//!
//! # Policies
//!
//! - [`Policy::NoWait`]: delays never block. The tick jumps forward to the requested target.
//! - [`Policy::Manual`]: the tick moves only when [`Stepper::step`] is called.
//! - [`Policy::Measured`]: the tick moves by one for every elapsed interval of the
//!   [`tick::Clock`] the stepper was built with. Stepping by hand is refused.
//!
//! Every accepted policy change increments the stepper's epoch. Callers can make a policy
//! change conditional on the epoch they last observed, so that a late request cannot undo
//! a newer decision. See [`Stepper::set_policy`].
//!
//! # Concurrency
//!
//! Each call becomes a request on a bounded queue that a single worker thread drains in
//! order. The worker owns all clock state; nothing is shared between callers and the worker
//! except the queue and the one-shot reply of every request. Calls carry the caller's
//! current [`tracing::Span`], which the worker enters while processing them.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use sim_clock::{Policy, Stepper};
//! use tick::ClockControl;
//!
//! # futures::executor::block_on(async {
//! let stepper = Stepper::builder(&ClockControl::new().to_clock()).build()?;
//! stepper.start().await?;
//!
//! let status = stepper.status().await?;
//! assert_eq!(status.policy, Policy::Manual);
//!
//! // Under NoWait a delay moves the tick to its target and returns at once.
//! stepper.set_policy(Policy::NoWait, Duration::ZERO, status.epoch).await?;
//! assert_eq!(stepper.delay(10, 0).await?, 10);
//! assert_eq!(stepper.now().await?, 10);
//! # Ok::<(), sim_clock::Error>(())
//! # }).unwrap();
//! ```

mod builder;
mod envelope;
mod error;
mod machine;
mod policy;
mod status;
mod stepper;
mod stepper_state;
mod ticker;
mod waiters;
mod worker;

pub use builder::StepperBuilder;
pub use error::{Error, Result};
pub use policy::Policy;
pub use status::Status;
pub use stepper::Stepper;
