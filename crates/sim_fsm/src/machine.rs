// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;

use tracing::{debug, warn};

use crate::{Error, HookPhase, Message, Next, Result, StateSpec};

/// A finite state machine that owns its domain data.
///
/// Create a machine with [`Machine::builder`], deliver messages with [`Machine::receive`] and
/// force transitions with [`Machine::change_state`].
pub struct Machine<S, D, M: Message> {
    states: HashMap<S, StateSpec<S, D, M>>,
    current: S,
    data: D,
}

impl<S, D, M> Machine<S, D, M>
where
    S: Copy + Eq + Hash + Debug,
    M: Message,
{
    /// Starts building a machine that owns `data`.
    #[must_use]
    pub fn builder(data: D) -> MachineBuilder<S, D, M> {
        MachineBuilder {
            data,
            states: HashMap::new(),
            initial: None,
        }
    }

    /// Returns the state the machine is currently in.
    #[must_use]
    pub fn current(&self) -> S {
        self.current
    }

    /// Returns the domain data owned by the machine.
    #[must_use]
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Returns the domain data owned by the machine.
    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// Consumes the machine and returns its domain data.
    #[must_use]
    pub fn into_data(self) -> D {
        self.data
    }

    /// Moves the machine from its current state to `name`.
    ///
    /// The leave hook of the current state runs first, then the machine switches to `name`
    /// and runs its enter hook. Transitioning to the current state runs both hooks as well.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownState`] if `name` is not registered; the machine does not move.
    /// Returns [`Error::Hook`] if a hook failed; the transition has completed regardless.
    pub fn change_state(&mut self, name: S) -> Result<()> {
        let Some(enter) = self.states.get(&name).map(StateSpec::enter_hook) else {
            return Err(Error::unknown_state(name));
        };
        let from = self.current;
        let leave = self.states.get(&from).and_then(StateSpec::leave_hook);

        let left = leave.map_or(Ok(()), |hook| hook(&mut self.data));
        self.current = name;
        debug!(from = ?from, to = ?name, "state changed");
        let entered = enter.map_or(Ok(()), |hook| hook(&mut self.data));

        match (left, entered) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(source), entered) => {
                if let Err(enter_error) = entered {
                    warn!(state = ?name, error = %enter_error, "enter hook failed after a failed leave hook");
                }
                Err(Error::hook(from, HookPhase::Leave, source))
            }
            (Ok(()), Err(source)) => Err(Error::hook(name, HookPhase::Enter, source)),
        }
    }

    /// Delivers a message to the current state.
    ///
    /// If the current state has an action for the message's tag, the action's handler runs and
    /// its result selects the next state. Otherwise the state's unexpected-message handler
    /// consumes the message and the machine stays where it is.
    ///
    /// # Errors
    ///
    /// Returns the error of the transition that followed the handler, if any. See
    /// [`Machine::change_state`].
    pub fn receive(&mut self, message: M) -> Result<()> {
        let tag = message.tag();
        let Some(state) = self.states.get(&self.current) else {
            return Err(Error::unknown_state(self.current));
        };

        let Some(action) = state.action(tag) else {
            debug!(state = ?self.current, tag = ?tag, "unexpected message");
            (state.unexpected())(&mut self.data, message);
            return Ok(());
        };

        match action.run(&mut self.data, message) {
            Next::Stay => Ok(()),
            Next::To(next) => self.change_state(next),
        }
    }
}

impl<S: Debug, D: Debug, M: Message> Debug for Machine<S, D, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("current", &self.current)
            .field("states", &self.states.len())
            .field("data", &self.data)
            .finish()
    }
}

/// Collects the states of a [`Machine`] before it is built.
pub struct MachineBuilder<S, D, M: Message> {
    data: D,
    states: HashMap<S, StateSpec<S, D, M>>,
    initial: Option<S>,
}

impl<S, D, M> MachineBuilder<S, D, M>
where
    S: Copy + Eq + Hash + Debug,
    M: Message,
{
    /// Registers a state, replacing any previous definition with the same name.
    #[must_use]
    pub fn state(mut self, name: S, spec: StateSpec<S, D, M>) -> Self {
        let _previous = self.states.insert(name, spec);
        self
    }

    /// Sets the state the machine starts in. The state's enter hook is not run.
    #[must_use]
    pub fn initial(mut self, name: S) -> Self {
        self.initial = Some(name);
        self
    }

    /// Builds the machine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoInitialState`] if no initial state was set, or
    /// [`Error::UnknownState`] if the initial state was never registered.
    pub fn build(self) -> Result<Machine<S, D, M>> {
        let initial = self.initial.ok_or(Error::NoInitialState)?;
        if !self.states.contains_key(&initial) {
            return Err(Error::unknown_state(initial));
        }

        Ok(Machine {
            states: self.states,
            current: initial,
            data: self.data,
        })
    }
}

impl<S: Debug, D: Debug, M: Message> Debug for MachineBuilder<S, D, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineBuilder")
            .field("states", &self.states.len())
            .field("initial", &self.initial)
            .field("data", &self.data)
            .finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Green,
        Yellow,
        Red,
        Broken,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Tag {
        Tick,
        Fail,
        Jump,
    }

    #[derive(Debug)]
    struct Signal {
        tag: Tag,
        rejected: Rc<Cell<bool>>,
    }

    impl Signal {
        fn new(tag: Tag) -> (Self, Rc<Cell<bool>>) {
            let rejected = Rc::new(Cell::new(false));
            (
                Self {
                    tag,
                    rejected: Rc::clone(&rejected),
                },
                rejected,
            )
        }
    }

    impl Message for Signal {
        type Tag = Tag;

        fn tag(&self) -> Tag {
            self.tag
        }

        fn reject(self) {
            self.rejected.set(true);
        }
    }

    #[derive(Debug, Default)]
    struct Log {
        events: Vec<&'static str>,
        fail_leave: bool,
    }

    fn ok(log: &mut Log, _signal: Signal) -> bool {
        log.events.push("handled");
        true
    }

    fn fail(log: &mut Log, _signal: Signal) -> bool {
        log.events.push("failed");
        false
    }

    fn machine() -> Machine<Light, Log, Signal> {
        Machine::builder(Log::default())
            .state(
                Light::Green,
                StateSpec::new()
                    .on(Tag::Tick, ok, Next::To(Light::Yellow), Next::Stay)
                    .on(Tag::Fail, fail, Next::Stay, Next::To(Light::Red))
                    .on(Tag::Jump, ok, Next::To(Light::Broken), Next::Stay)
                    .on_leave(|log| {
                        log.events.push("leave green");
                        if log.fail_leave { Err("stuck".into()) } else { Ok(()) }
                    }),
            )
            .state(
                Light::Yellow,
                StateSpec::new()
                    .on(Tag::Tick, ok, Next::To(Light::Red), Next::Stay)
                    .on_enter(|log| {
                        log.events.push("enter yellow");
                        Ok(())
                    }),
            )
            .state(
                Light::Red,
                StateSpec::new().on(Tag::Tick, ok, Next::Stay, Next::Stay).on_unexpected(|log, _signal| {
                    log.events.push("ignored");
                }),
            )
            .initial(Light::Green)
            .build()
            .unwrap()
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Next<Light>: Send, Sync, Copy);
    }

    #[test]
    fn success_follows_success_transition() {
        let mut machine = machine();
        let (signal, _) = Signal::new(Tag::Tick);

        machine.receive(signal).unwrap();

        assert_eq!(machine.current(), Light::Yellow);
        assert_eq!(machine.data().events, ["handled", "leave green", "enter yellow"]);
    }

    #[test]
    fn failure_follows_failure_transition() {
        let mut machine = machine();
        let (signal, _) = Signal::new(Tag::Fail);

        machine.receive(signal).unwrap();

        assert_eq!(machine.current(), Light::Red);
        assert_eq!(machine.data().events, ["failed", "leave green"]);
    }

    #[test]
    fn stay_runs_no_hooks() {
        let mut machine = machine();
        machine.change_state(Light::Red).unwrap();
        machine.data_mut().events.clear();
        let (signal, _) = Signal::new(Tag::Tick);

        machine.receive(signal).unwrap();

        assert_eq!(machine.current(), Light::Red);
        assert_eq!(machine.data().events, ["handled"]);
    }

    #[test]
    fn unexpected_message_is_rejected_by_default() {
        let mut machine = machine();
        machine.change_state(Light::Yellow).unwrap();
        let (signal, rejected) = Signal::new(Tag::Fail);

        machine.receive(signal).unwrap();

        assert!(rejected.get());
        assert_eq!(machine.current(), Light::Yellow);
    }

    #[test]
    fn unexpected_handler_can_be_replaced() {
        let mut machine = machine();
        machine.change_state(Light::Red).unwrap();
        let (signal, rejected) = Signal::new(Tag::Fail);

        machine.receive(signal).unwrap();

        assert!(!rejected.get());
        assert_eq!(machine.data().events.last(), Some(&"ignored"));
    }

    #[test]
    fn unknown_target_is_fatal_and_keeps_state() {
        let mut machine = machine();
        let (signal, _) = Signal::new(Tag::Jump);

        let error = machine.receive(signal).unwrap_err();

        assert!(error.is_fatal());
        assert!(matches!(error, Error::UnknownState(_)));
        assert_eq!(machine.current(), Light::Green);
    }

    #[test]
    fn failed_leave_hook_does_not_block_transition() {
        let mut machine = machine();
        machine.data_mut().fail_leave = true;

        let error = machine.change_state(Light::Yellow).unwrap_err();

        assert!(!error.is_fatal());
        assert!(matches!(error, Error::Hook { phase: HookPhase::Leave, .. }));
        assert_eq!(machine.current(), Light::Yellow);
        assert_eq!(machine.data().events, ["leave green", "enter yellow"]);
    }

    #[test]
    fn self_transition_runs_hooks() {
        let mut machine = machine();
        machine.change_state(Light::Yellow).unwrap();
        machine.data_mut().events.clear();

        machine.change_state(Light::Yellow).unwrap();

        assert_eq!(machine.data().events, ["enter yellow"]);
    }

    #[test]
    fn build_requires_registered_initial_state() {
        let missing = Machine::<Light, Log, Signal>::builder(Log::default()).build().unwrap_err();
        assert!(matches!(missing, Error::NoInitialState));

        let unknown = Machine::<Light, Log, Signal>::builder(Log::default())
            .initial(Light::Broken)
            .build()
            .unwrap_err();
        assert!(matches!(unknown, Error::UnknownState(_)));
    }

    #[test]
    fn into_data_returns_owned_data() {
        let mut machine = machine();
        let (signal, _) = Signal::new(Tag::Tick);
        machine.receive(signal).unwrap();

        let log = machine.into_data();

        assert_eq!(log.events.len(), 3);
    }
}
