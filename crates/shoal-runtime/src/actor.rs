//! Actor contract and per-turn processing context

use crate::handle::ActorRef;
use shoal_core::error::Result;

/// A unit of sequential state owned by exactly one mailbox
///
/// The mailbox guarantees that `process_message` is never called concurrently
/// for the same instance and that messages arrive in enqueue order.
pub trait Actor: Send + 'static {
    /// Message type accepted by this actor
    type Message: Send + 'static;

    /// Process one message
    ///
    /// Returns `Ok(true)` when the message was handled and `Ok(false)` when the
    /// actor does not support it. Errors and panics are logged by the mailbox
    /// and never stop delivery of later messages.
    fn process_message(
        &mut self,
        ctx: &ActorContext<'_, Self::Message>,
        message: Self::Message,
    ) -> Result<bool>;
}

/// Binding of the current mailbox for the duration of one `process_message` call
///
/// Created by the mailbox right before the call and dropped right after it,
/// so it can only be observed from inside the actor's own turn.
pub struct ActorContext<'a, M: Send + 'static> {
    actor_ref: &'a ActorRef<M>,
}

impl<'a, M: Send + 'static> ActorContext<'a, M> {
    pub(crate) fn new(actor_ref: &'a ActorRef<M>) -> Self {
        Self { actor_ref }
    }

    /// The mailbox currently processing this message
    pub fn actor_ref(&self) -> &'a ActorRef<M> {
        self.actor_ref
    }

    /// Stop accepting new messages; queued ones are still delivered
    pub fn release(&self) {
        self.actor_ref.release();
    }

    /// Release the mailbox if nothing is queued behind the current message
    ///
    /// The message being processed does not count as pending work here,
    /// unlike [`ActorRef::release_if_idle`] called from outside the turn.
    pub fn release_if_idle(&self) -> bool {
        self.actor_ref.mailbox().release_if_idle_in_turn()
    }
}

impl<M: Send + 'static> std::fmt::Debug for ActorContext<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("actor_ref", self.actor_ref)
            .finish()
    }
}
