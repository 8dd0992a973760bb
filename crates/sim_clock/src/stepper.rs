// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tick::Clock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::builder::StepperBuilder;
use crate::envelope::{Envelope, Request, Response};
use crate::machine::StepperMachine;
use crate::{Error, Policy, Result, Status, worker};

/// A handle to a simulated logical clock.
///
/// The clock is a monotonically increasing tick shared by every participant of a simulation.
/// Callers can read it, advance it by hand, or wait until it reaches a target; how it advances
/// is governed by the active [`Policy`].
///
/// Every call is turned into a request that a single worker thread processes in arrival
/// order, so concurrent callers always observe a consistent sequence of ticks.
///
/// The handle is cheap to clone; all clones talk to the same worker. The worker exits once
/// the last clone is dropped.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use sim_clock::{Policy, Stepper};
/// use tick::ClockControl;
///
/// # futures::executor::block_on(async {
/// let stepper = Stepper::builder(&ClockControl::new().to_clock())
///     .policy(Policy::Manual, Duration::ZERO)
///     .build()?;
/// stepper.start().await?;
///
/// assert_eq!(stepper.step().await?, 1);
/// assert_eq!(stepper.now().await?, 1);
/// # Ok::<(), sim_clock::Error>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Stepper {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    queue: mpsc::Sender<Request>,
    first_policy: Policy,
    started: AtomicBool,
    pending: Mutex<Option<(StepperMachine, mpsc::Receiver<Request>)>>,
}

impl Stepper {
    /// Creates a builder for a stepper whose measured ticks are timed by `clock`.
    #[must_use]
    pub fn builder(clock: &Clock) -> StepperBuilder {
        StepperBuilder::new(clock)
    }

    pub(crate) fn new(first_policy: Policy, machine: StepperMachine, queue: mpsc::Sender<Request>, receiver: mpsc::Receiver<Request>) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                first_policy,
                started: AtomicBool::new(false),
                pending: Mutex::new(Some((machine, receiver))),
            }),
        }
    }

    /// Starts the worker and enters the policy the stepper was built with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if this stepper, or any clone of it, was started before.
    /// Returns [`Error::Spawn`] if the worker thread cannot be created.
    pub async fn start(&self) -> Result<()> {
        let Some((machine, receiver)) = self.inner.pending.lock().take() else {
            return Err(Error::AlreadyStarted);
        };

        let _worker = worker::spawn(machine, receiver).map_err(|source| Error::Spawn {
            thread: "sim-clock-stepper",
            source,
        })?;

        let policy = self.inner.first_policy;
        let (envelope, reply) = Envelope::new();
        self.inner
            .queue
            .send(Request::Start { envelope, policy })
            .await
            .map_err(|_closed| Error::Stopped)?;
        self.inner.started.store(true, Ordering::Release);
        debug!(%policy, "stepper started");

        reply.await.map_err(|_dropped| Error::Stopped)?.into_tick().map(|_at| ())
    }

    /// Switches to `policy`.
    ///
    /// `interval` is the time between automatic ticks and must be positive for
    /// [`Policy::Measured`] and zero otherwise. A non-negative `guard` makes the change
    /// conditional: it is refused if another policy change has been accepted since the caller
    /// observed epoch `guard` in [`Status::epoch`]. A negative `guard` always applies.
    ///
    /// Waiters pending when entering [`Policy::NoWait`] are released immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPolicy`] for [`Policy::Invalid`], [`Error::PolicyTooLate`] if
    /// the guard is stale, and [`Error::DelayMustBeZero`] or [`Error::DelayMustBePositive`]
    /// if `interval` does not suit `policy`. A failed change leaves the stepper untouched.
    pub async fn set_policy(&self, policy: Policy, interval: Duration, guard: i64) -> Result<()> {
        if policy == Policy::Invalid {
            return Err(Error::InvalidPolicy(policy.as_i32()));
        }

        self.call(|envelope| Request::SetPolicy {
            envelope,
            policy,
            interval,
            guard,
        })
        .await?
        .into_tick()
        .map(|_at| ())
    }

    /// Advances the clock by one tick and returns the new tick.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] unless the policy is [`Policy::Manual`] or [`Policy::NoWait`].
    pub async fn step(&self) -> Result<i64> {
        self.call(Request::Step).await?.into_tick()
    }

    /// Returns the current tick without changing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] when no valid policy is in effect.
    pub async fn now(&self) -> Result<i64> {
        self.call(Request::Now).await?.into_tick()
    }

    /// Waits until the clock reaches `at_least` plus a random extra of up to `jitter` ticks,
    /// and returns the tick at which the wait ended.
    ///
    /// Under [`Policy::NoWait`] the clock jumps forward to the target and the call returns
    /// at once. A target that has already passed resolves immediately with the current tick.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DelayCanceled`] if the stepper is reset while waiting, and
    /// [`Error::InvalidMessage`] when no valid policy is in effect.
    pub async fn delay(&self, at_least: i64, jitter: i64) -> Result<i64> {
        self.call(|envelope| Request::Delay {
            envelope,
            at_least,
            jitter,
        })
        .await?
        .into_tick()
    }

    /// Rewinds the clock to zero, cancels every pending delay and invalidates the policy.
    ///
    /// A new policy must be set before the clock can be used again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if the stepper has faulted.
    pub async fn reset(&self) -> Result<i64> {
        self.call(Request::Reset).await?.into_tick()
    }

    /// Returns a diagnostic snapshot of the stepper.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if the stepper has faulted.
    pub async fn status(&self) -> Result<Status> {
        self.call(Request::GetStatus).await?.into_status()
    }

    async fn call(&self, request: impl FnOnce(Envelope) -> Request) -> Result<Response> {
        if !self.inner.started.load(Ordering::Acquire) {
            return Err(Error::NotStarted);
        }

        let (envelope, reply) = Envelope::new();
        self.inner
            .queue
            .send(request(envelope))
            .await
            .map_err(|_closed| Error::Stopped)?;
        reply.await.map_err(|_dropped| Error::Stopped)
    }
}
