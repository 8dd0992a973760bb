// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use sim_fsm::Message;
use tokio::sync::oneshot;
use tracing::{Span, trace};

use crate::{Error, Policy, Result, Status};

/// The part of every request that is independent of its kind: the caller's trace context
/// and the single-use channel the answer is posted to.
#[derive(Debug)]
pub(crate) struct Envelope {
    span: Span,
    reply: oneshot::Sender<Response>,
}

impl Envelope {
    /// Creates an envelope bound to the caller's current span.
    pub(crate) fn new() -> (Self, oneshot::Receiver<Response>) {
        let (reply, receiver) = oneshot::channel();
        (
            Self {
                span: Span::current(),
                reply,
            },
            receiver,
        )
    }

    /// Creates an envelope whose answer nobody waits for.
    pub(crate) fn detached() -> Self {
        let (reply, _receiver) = oneshot::channel();
        Self { span: Span::none(), reply }
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    /// Posts the answer and closes the channel.
    pub(crate) fn respond(self, response: Response) {
        if self.reply.send(response).is_err() {
            // The caller gave up waiting; the answer is simply dropped.
            trace!("requester is no longer waiting for the response");
        }
    }
}

/// The answer to one request.
#[derive(Debug)]
pub(crate) struct Response {
    /// The tick at the time the request completed.
    pub(crate) at: i64,
    pub(crate) outcome: Result<Payload>,
}

impl Response {
    pub(crate) fn into_tick(self) -> Result<i64> {
        let Self { at, outcome } = self;
        outcome.map(|_payload| at)
    }

    pub(crate) fn into_status(self) -> Result<Status> {
        match self.outcome? {
            Payload::Status(status) => Ok(status),
            Payload::Empty => Err(Error::InvalidMessage { message: "GetStatus" }),
        }
    }
}

/// The typed body of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
    Empty,
    Status(Status),
}

/// A request to the stepper, one variant per kind.
#[derive(Debug)]
pub(crate) enum Request {
    /// Leaves the awaiting-start state for the configured first policy.
    Start { envelope: Envelope, policy: Policy },
    Now(Envelope),
    Step(Envelope),
    /// Waits until the tick reaches `at_least` plus a jitter drawn from `0..=jitter`.
    Delay {
        envelope: Envelope,
        at_least: i64,
        jitter: i64,
    },
    Reset(Envelope),
    GetStatus(Envelope),
    SetPolicy {
        envelope: Envelope,
        policy: Policy,
        interval: Duration,
        guard: i64,
    },
    /// Injected by the measured-policy ticker. Carries the epoch the ticker was started in.
    AutoStep { envelope: Envelope, epoch: i64 },
}

impl Request {
    pub(crate) fn envelope(&self) -> &Envelope {
        match self {
            Self::Start { envelope, .. }
            | Self::Now(envelope)
            | Self::Step(envelope)
            | Self::Delay { envelope, .. }
            | Self::Reset(envelope)
            | Self::GetStatus(envelope)
            | Self::SetPolicy { envelope, .. }
            | Self::AutoStep { envelope, .. } => envelope,
        }
    }

    pub(crate) fn into_envelope(self) -> Envelope {
        match self {
            Self::Start { envelope, .. }
            | Self::Now(envelope)
            | Self::Step(envelope)
            | Self::Delay { envelope, .. }
            | Self::Reset(envelope)
            | Self::GetStatus(envelope)
            | Self::SetPolicy { envelope, .. }
            | Self::AutoStep { envelope, .. } => envelope,
        }
    }
}

/// The discriminant the state tables are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Tag {
    Start(Policy),
    Now,
    Step,
    Delay,
    Reset,
    GetStatus,
    SetPolicy(Policy),
    AutoStep,
}

impl Tag {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Start(_) => "Start",
            Self::Now => "Now",
            Self::Step => "Step",
            Self::Delay => "Delay",
            Self::Reset => "Reset",
            Self::GetStatus => "GetStatus",
            Self::SetPolicy(_) => "SetPolicy",
            Self::AutoStep => "AutoStep",
        }
    }
}

impl Message for Request {
    type Tag = Tag;

    fn tag(&self) -> Tag {
        match self {
            Self::Start { policy, .. } => Tag::Start(*policy),
            Self::Now(_) => Tag::Now,
            Self::Step(_) => Tag::Step,
            Self::Delay { .. } => Tag::Delay,
            Self::Reset(_) => Tag::Reset,
            Self::GetStatus(_) => Tag::GetStatus,
            Self::SetPolicy { policy, .. } => Tag::SetPolicy(*policy),
            Self::AutoStep { .. } => Tag::AutoStep,
        }
    }

    fn reject(self) {
        let message = self.tag().name();
        self.into_envelope().respond(Response {
            at: 0,
            outcome: Err(Error::InvalidMessage { message }),
        });
    }
}
