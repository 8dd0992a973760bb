// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A table-driven finite state machine.
//!
//! The machine is made of named states. Each state carries an action table that maps the
//! tag of an incoming [`Message`] to a handler, plus optional enter and leave hooks that run
//! whenever the machine transitions into or out of the state.
//!
//! A handler returns `true` on success and `false` on failure; the matching [`Action`] decides
//! which [`Next`] state follows either outcome. Messages whose tag is not in the current
//! state's table are passed to the state's unexpected-message handler, which by default calls
//! [`Message::reject`] and leaves the machine where it is.
//!
//! The machine owns the domain data `D` it operates on. It is deliberately inert: it performs
//! no I/O, has no notion of time and holds no locks. Callers that need concurrent access are
//! expected to serialize messages onto a single owner of the machine.
//!
//! # Example
//!
//! ```
//! use sim_fsm::{Machine, Message, Next, StateSpec};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Turnstile {
//!     Locked,
//!     Unlocked,
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Input {
//!     Coin,
//!     Push,
//! }
//!
//! impl Message for Input {
//!     type Tag = Self;
//!
//!     fn tag(&self) -> Self::Tag {
//!         *self
//!     }
//!
//!     fn reject(self) {}
//! }
//!
//! fn count(passed: &mut u32, input: Input) -> bool {
//!     if input == Input::Push {
//!         *passed += 1;
//!     }
//!     true
//! }
//!
//! let mut machine = Machine::builder(0_u32)
//!     .state(
//!         Turnstile::Locked,
//!         StateSpec::new().on(Input::Coin, count, Next::To(Turnstile::Unlocked), Next::Stay),
//!     )
//!     .state(
//!         Turnstile::Unlocked,
//!         StateSpec::new().on(Input::Push, count, Next::To(Turnstile::Locked), Next::Stay),
//!     )
//!     .initial(Turnstile::Locked)
//!     .build()?;
//!
//! machine.receive(Input::Push)?; // rejected, still locked
//! machine.receive(Input::Coin)?;
//! machine.receive(Input::Push)?;
//!
//! assert_eq!(machine.current(), Turnstile::Locked);
//! assert_eq!(*machine.data(), 1);
//! # Ok::<(), sim_fsm::Error>(())
//! ```

mod error;
mod machine;
mod message;
mod state;

pub use error::{BoxError, Error, HookPhase, Result};
pub use machine::{Machine, MachineBuilder};
pub use message::Message;
pub use state::{Action, Handler, Hook, Next, StateSpec, Unexpected};
