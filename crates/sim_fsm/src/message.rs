// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::hash::Hash;

/// A message that can be delivered to a [`Machine`](crate::Machine).
///
/// The machine never inspects a message beyond its [`tag`](Message::tag). The tag selects the
/// action in the current state's table, so two messages with equal tags are always handled by
/// the same handler.
pub trait Message {
    /// The discriminant used to look up actions.
    type Tag: Copy + Eq + Hash + Debug;

    /// Returns the tag of this message.
    fn tag(&self) -> Self::Tag;

    /// Consumes a message that the current state does not accept.
    ///
    /// This is the default unexpected-message behavior of every state. Implementations
    /// typically answer the sender with an "invalid message" error.
    fn reject(self);
}
