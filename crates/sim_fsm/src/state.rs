// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt;

use crate::{BoxError, Message};

/// Handles one message. Returns `true` on success and `false` on failure.
pub type Handler<D, M> = fn(&mut D, M) -> bool;

/// Runs when the machine enters or leaves a state.
pub type Hook<D> = fn(&mut D) -> Result<(), BoxError>;

/// Consumes a message that the current state has no action for.
pub type Unexpected<D, M> = fn(&mut D, M);

/// The state that follows the completion of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next<S> {
    /// Remain in the current state without running any hooks.
    Stay,
    /// Transition to the given state.
    To(S),
}

/// One row of a state's action table.
pub struct Action<S, D, M> {
    handler: Handler<D, M>,
    on_success: Next<S>,
    on_failure: Next<S>,
}

impl<S: Copy, D, M> Action<S, D, M> {
    /// Creates an action that runs `handler` and then moves to `on_success` or `on_failure`.
    #[must_use]
    pub fn new(handler: Handler<D, M>, on_success: Next<S>, on_failure: Next<S>) -> Self {
        Self {
            handler,
            on_success,
            on_failure,
        }
    }

    pub(crate) fn run(&self, data: &mut D, message: M) -> Next<S> {
        if (self.handler)(data, message) {
            self.on_success
        } else {
            self.on_failure
        }
    }
}

impl<S: Copy, D, M> Clone for Action<S, D, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Copy, D, M> Copy for Action<S, D, M> {}

impl<S: fmt::Debug, D, M> fmt::Debug for Action<S, D, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("on_success", &self.on_success)
            .field("on_failure", &self.on_failure)
            .finish_non_exhaustive()
    }
}

/// The definition of a single state: its action table and its hooks.
///
/// # Examples
///
/// ```
/// use sim_fsm::{Message, Next, StateSpec};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Light {
///     Green,
///     Red,
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// struct Timeout;
///
/// impl Message for Timeout {
///     type Tag = Self;
///
///     fn tag(&self) -> Self::Tag {
///         *self
///     }
///
///     fn reject(self) {}
/// }
///
/// let green: StateSpec<Light, u32, Timeout> = StateSpec::new()
///     .on(Timeout, |_, _| true, Next::To(Light::Red), Next::Stay)
///     .on_enter(|cycles| {
///         *cycles += 1;
///         Ok(())
///     });
///
/// assert!(green.accepts(Timeout));
/// ```
pub struct StateSpec<S, D, M: Message> {
    actions: HashMap<M::Tag, Action<S, D, M>>,
    on_enter: Option<Hook<D>>,
    on_leave: Option<Hook<D>>,
    unexpected: Unexpected<D, M>,
}

impl<S: Copy, D, M: Message> StateSpec<S, D, M> {
    /// Creates a state with an empty action table and no hooks.
    ///
    /// Unexpected messages are passed to [`Message::reject`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            on_enter: None,
            on_leave: None,
            unexpected: reject,
        }
    }

    /// Adds an action for messages tagged `tag`, replacing any previous action for that tag.
    #[must_use]
    pub fn on(mut self, tag: M::Tag, handler: Handler<D, M>, on_success: Next<S>, on_failure: Next<S>) -> Self {
        let _previous = self.actions.insert(tag, Action::new(handler, on_success, on_failure));
        self
    }

    /// Sets the hook that runs after the machine has entered this state.
    #[must_use]
    pub fn on_enter(mut self, hook: Hook<D>) -> Self {
        self.on_enter = Some(hook);
        self
    }

    /// Sets the hook that runs before the machine leaves this state.
    #[must_use]
    pub fn on_leave(mut self, hook: Hook<D>) -> Self {
        self.on_leave = Some(hook);
        self
    }

    /// Replaces the handler for messages this state has no action for.
    #[must_use]
    pub fn on_unexpected(mut self, unexpected: Unexpected<D, M>) -> Self {
        self.unexpected = unexpected;
        self
    }

    /// Returns `true` if this state has an action for `tag`.
    #[must_use]
    pub fn accepts(&self, tag: M::Tag) -> bool {
        self.actions.contains_key(&tag)
    }

    pub(crate) fn action(&self, tag: M::Tag) -> Option<Action<S, D, M>> {
        self.actions.get(&tag).copied()
    }

    pub(crate) fn enter_hook(&self) -> Option<Hook<D>> {
        self.on_enter
    }

    pub(crate) fn leave_hook(&self) -> Option<Hook<D>> {
        self.on_leave
    }

    pub(crate) fn unexpected(&self) -> Unexpected<D, M> {
        self.unexpected
    }
}

impl<S: Copy, D, M: Message> Default for StateSpec<S, D, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: fmt::Debug, D, M: Message> fmt::Debug for StateSpec<S, D, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSpec")
            .field("actions", &self.actions)
            .field("has_enter_hook", &self.on_enter.is_some())
            .field("has_leave_hook", &self.on_leave.is_some())
            .finish_non_exhaustive()
    }
}

fn reject<D, M: Message>(_data: &mut D, message: M) {
    message.reject();
}
