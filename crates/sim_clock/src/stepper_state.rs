// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use sim_fsm::{BoxError, Message};
use tick::Clock;
use tokio::sync::mpsc::WeakSender;
use tracing::{debug, trace, warn};

use crate::envelope::{Envelope, Payload, Request, Response};
use crate::ticker::Ticker;
use crate::waiters::Waiters;
use crate::{Error, Policy, Result, Status};

/// The domain data of the stepper: the tick, the policy and everything waiting on them.
///
/// Only the worker thread ever touches this value, so nothing in it is synchronized.
/// Responses are staged in an outbox and posted by the worker once the state machine has
/// finished processing the request, including any transition it caused.
#[derive(Debug)]
pub(crate) struct StepperState {
    latest: i64,
    epoch: i64,
    policy: Policy,
    interval: Duration,
    first_policy: Option<(Policy, Duration)>,
    waiters: Waiters,
    ticker: Option<Ticker>,
    clock: Clock,
    queue: WeakSender<Request>,
    rng: fastrand::Rng,
    outbox: Vec<(Envelope, Response)>,
}

impl StepperState {
    pub(crate) fn new(
        first_policy: Policy,
        interval: Duration,
        clock: Clock,
        queue: WeakSender<Request>,
        jitter_seed: u64,
    ) -> Self {
        Self {
            latest: 0,
            epoch: 0,
            policy: Policy::Invalid,
            interval: Duration::ZERO,
            first_policy: Some((first_policy, interval)),
            waiters: Waiters::default(),
            ticker: None,
            clock,
            queue,
            rng: fastrand::Rng::with_seed(jitter_seed),
            outbox: Vec::new(),
        }
    }

    pub(crate) fn latest(&self) -> i64 {
        self.latest
    }

    pub(crate) fn epoch(&self) -> i64 {
        self.epoch
    }

    pub(crate) fn status(&self) -> Status {
        Status {
            policy: self.policy,
            measured_delay: self.interval,
            now: self.latest,
            epoch: self.epoch,
            waiters: self.waiters.len(),
        }
    }

    /// Posts every staged response.
    pub(crate) fn flush_replies(&mut self) {
        for (envelope, response) in self.outbox.drain(..) {
            envelope.respond(response);
        }
    }

    /// Stops the automatic ticker, if any. Used when the worker shuts down.
    pub(crate) fn shutdown(&mut self) {
        if let Some(ticker) = self.ticker.take()
            && ticker.stop().is_err()
        {
            debug!("automatic ticker panicked before shutdown");
        }
        self.flush_replies();
    }

    fn reply(&mut self, envelope: Envelope, outcome: Result<Payload>) {
        self.outbox.push((
            envelope,
            Response {
                at: self.latest,
                outcome,
            },
        ));
    }

    fn advance(&mut self, ticks: i64) {
        self.latest = self.latest.saturating_add(ticks);
        self.check_for_expiry();
    }

    /// Jumps the tick forward to the earliest due tick, if that lies in the future.
    fn advance_to_first_waiter(&mut self) {
        if let Some(due) = self.waiters.first_due()
            && due > self.latest
        {
            self.latest = due;
        }
        self.check_for_expiry();
    }

    /// Resolves every waiter whose due tick has been reached.
    fn check_for_expiry(&mut self) {
        for envelope in self.waiters.take_expired(self.latest) {
            debug!(parent: envelope.span(), at = self.latest, "delay satisfied");
            self.reply(envelope, Ok(Payload::Empty));
        }
    }

    fn cancel_waiters(&mut self) {
        for envelope in self.waiters.take_all() {
            debug!(parent: envelope.span(), "delay canceled");
            self.reply(envelope, Err(Error::DelayCanceled));
        }
    }

    fn resolve_due(&mut self, at_least: i64, jitter: i64) -> i64 {
        if jitter <= 0 {
            return at_least;
        }
        at_least.saturating_add(self.rng.i64(0..=jitter))
    }

    // Handlers. Each one answers its request and reports success or failure to the machine.

    pub(crate) fn start(&mut self, request: Request) -> bool {
        let (envelope, policy) = match request {
            Request::Start { envelope, policy } => (envelope, policy),
            other => return self.malformed(other),
        };

        let outcome = match self.first_policy.take() {
            Some((first, interval)) if first == policy => policy.validate(interval).map(|()| interval),
            _ => Err(Error::InvalidMessage { message: "Start" }),
        };

        match outcome {
            Ok(interval) => {
                self.apply_policy(policy, interval);
                self.reply(envelope, Ok(Payload::Empty));
                true
            }
            Err(error) => {
                self.reply(envelope, Err(error));
                false
            }
        }
    }

    pub(crate) fn set_policy(&mut self, request: Request) -> bool {
        let (envelope, policy, interval, guard) = match request {
            Request::SetPolicy {
                envelope,
                policy,
                interval,
                guard,
            } => (envelope, policy, interval, guard),
            other => return self.malformed(other),
        };

        if guard >= 0 && guard < self.epoch {
            let epoch = self.epoch;
            self.reply(envelope, Err(Error::PolicyTooLate { guard, epoch }));
            return false;
        }

        if let Err(error) = policy.validate(interval) {
            self.reply(envelope, Err(error));
            return false;
        }

        self.apply_policy(policy, interval);
        self.reply(envelope, Ok(Payload::Empty));
        true
    }

    fn apply_policy(&mut self, policy: Policy, interval: Duration) {
        self.epoch += 1;
        self.policy = policy;
        self.interval = if policy == Policy::Measured { interval } else { Duration::ZERO };
        debug!(%policy, epoch = self.epoch, interval_ms = self.interval.as_millis(), "policy changed");
    }

    pub(crate) fn now(&mut self, request: Request) -> bool {
        let envelope = match request {
            Request::Now(envelope) => envelope,
            other => return self.malformed(other),
        };
        self.reply(envelope, Ok(Payload::Empty));
        true
    }

    pub(crate) fn step(&mut self, request: Request) -> bool {
        let envelope = match request {
            Request::Step(envelope) => envelope,
            other => return self.malformed(other),
        };
        self.advance(1);
        self.reply(envelope, Ok(Payload::Empty));
        true
    }

    pub(crate) fn delay(&mut self, request: Request) -> bool {
        let (envelope, at_least, jitter) = match request {
            Request::Delay {
                envelope,
                at_least,
                jitter,
            } => (envelope, at_least, jitter),
            other => return self.malformed(other),
        };

        let due = self.resolve_due(at_least, jitter);
        trace!(parent: envelope.span(), due, latest = self.latest, "delay registered");
        self.waiters.add(due, envelope);
        self.check_for_expiry();
        true
    }

    /// Registers the delay and forces it to expire immediately.
    pub(crate) fn delay_no_wait(&mut self, request: Request) -> bool {
        let accepted = self.delay(request);
        self.drain_waiters();
        accepted
    }

    pub(crate) fn reset(&mut self, request: Request) -> bool {
        let envelope = match request {
            Request::Reset(envelope) => envelope,
            other => return self.malformed(other),
        };
        self.latest = 0;
        self.policy = Policy::Invalid;
        self.interval = Duration::ZERO;
        debug!(epoch = self.epoch, "stepper reset");
        self.reply(envelope, Ok(Payload::Empty));
        true
    }

    pub(crate) fn get_status(&mut self, request: Request) -> bool {
        let envelope = match request {
            Request::GetStatus(envelope) => envelope,
            other => return self.malformed(other),
        };
        let status = self.status();
        self.reply(envelope, Ok(Payload::Status(status)));
        true
    }

    pub(crate) fn auto_step(&mut self, request: Request) -> bool {
        let (envelope, epoch) = match request {
            Request::AutoStep { envelope, epoch } => (envelope, epoch),
            other => return self.malformed(other),
        };

        if epoch == self.epoch {
            self.advance(1);
        } else {
            trace!(epoch, current = self.epoch, "ignoring automatic step from an earlier epoch");
        }
        self.reply(envelope, Ok(Payload::Empty));
        true
    }

    /// Answers requests the current state has no action for.
    pub(crate) fn reject(&mut self, request: Request) {
        let message = request.tag().name();
        if let Request::AutoStep { epoch, .. } = &request {
            trace!(epoch = *epoch, "ignoring automatic step outside the measured policy");
        } else {
            warn!(parent: request.envelope().span(), request = message, "request is not valid in the current state");
        }
        self.reply(request.into_envelope(), Err(Error::InvalidMessage { message }));
    }

    fn malformed(&mut self, request: Request) -> bool {
        self.reject(request);
        false
    }

    fn drain_waiters(&mut self) {
        while !self.waiters.is_empty() {
            self.advance_to_first_waiter();
        }
    }

    // Hooks.

    pub(crate) fn enter_invalid(&mut self) -> std::result::Result<(), BoxError> {
        self.cancel_waiters();
        Ok(())
    }

    pub(crate) fn enter_no_wait(&mut self) -> std::result::Result<(), BoxError> {
        self.drain_waiters();
        Ok(())
    }

    pub(crate) fn enter_measured(&mut self) -> std::result::Result<(), BoxError> {
        let ticker = Ticker::start(&self.clock, self.interval, self.epoch, self.queue.clone())?;
        self.ticker = Some(ticker);
        Ok(())
    }

    pub(crate) fn leave_measured(&mut self) -> std::result::Result<(), BoxError> {
        match self.ticker.take() {
            Some(ticker) => ticker.stop().map_err(|_panic| "automatic ticker panicked".into()),
            None => Ok(()),
        }
    }

    pub(crate) fn enter_faulted(&mut self) -> std::result::Result<(), BoxError> {
        self.cancel_waiters();
        Ok(())
    }
}
