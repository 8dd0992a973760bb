// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use sim_fsm::{Machine, Next, StateSpec};

use crate::Policy;
use crate::envelope::{Request, Tag};
use crate::stepper_state::StepperState;

pub(crate) type StepperMachine = Machine<StateName, StepperState, Request>;

type Spec = StateSpec<StateName, StepperState, Request>;

/// The states of the stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StateName {
    AwaitingStart,
    Invalid,
    NoWait,
    Manual,
    Measured,
    Faulted,
}

impl From<Policy> for StateName {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Invalid => Self::Invalid,
            Policy::NoWait => Self::NoWait,
            Policy::Manual => Self::Manual,
            Policy::Measured => Self::Measured,
        }
    }
}

const TARGET_POLICIES: [Policy; 3] = [Policy::NoWait, Policy::Manual, Policy::Measured];

/// Builds the stepper's state machine around `state`, starting in [`StateName::AwaitingStart`].
pub(crate) fn build(state: StepperState) -> sim_fsm::Result<StepperMachine> {
    Machine::builder(state)
        .state(StateName::AwaitingStart, awaiting_start())
        .state(
            StateName::Invalid,
            with_policy_changes(spec().on_enter(StepperState::enter_invalid)),
        )
        .state(
            StateName::NoWait,
            with_policy_changes(
                spec()
                    .on(Tag::Now, StepperState::now, Next::Stay, Next::Stay)
                    .on(Tag::Step, StepperState::step, Next::Stay, Next::Stay)
                    .on(Tag::Delay, StepperState::delay_no_wait, Next::Stay, Next::Stay)
                    .on_enter(StepperState::enter_no_wait),
            ),
        )
        .state(
            StateName::Manual,
            with_policy_changes(
                spec()
                    .on(Tag::Now, StepperState::now, Next::Stay, Next::Stay)
                    .on(Tag::Step, StepperState::step, Next::Stay, Next::Stay)
                    .on(Tag::Delay, StepperState::delay, Next::Stay, Next::Stay),
            ),
        )
        .state(
            StateName::Measured,
            with_policy_changes(
                spec()
                    .on(Tag::Now, StepperState::now, Next::Stay, Next::Stay)
                    .on(Tag::Delay, StepperState::delay, Next::Stay, Next::Stay)
                    .on(Tag::AutoStep, StepperState::auto_step, Next::Stay, Next::Stay)
                    .on_enter(StepperState::enter_measured)
                    .on_leave(StepperState::leave_measured),
            ),
        )
        .state(StateName::Faulted, spec().on_enter(StepperState::enter_faulted))
        .initial(StateName::AwaitingStart)
        .build()
}

fn spec() -> Spec {
    StateSpec::new().on_unexpected(StepperState::reject)
}

fn awaiting_start() -> Spec {
    TARGET_POLICIES.into_iter().fold(spec(), |spec, policy| {
        spec.on(Tag::Start(policy), StepperState::start, Next::To(policy.into()), Next::Stay)
    })
}

/// Adds the actions every started, non-faulted state shares.
fn with_policy_changes(spec: Spec) -> Spec {
    TARGET_POLICIES
        .into_iter()
        .fold(spec, |spec, policy| {
            spec.on(Tag::SetPolicy(policy), StepperState::set_policy, Next::To(policy.into()), Next::Stay)
        })
        .on(Tag::Reset, StepperState::reset, Next::To(StateName::Invalid), Next::Stay)
        .on(Tag::GetStatus, StepperState::get_status, Next::Stay, Next::Stay)
}
