//! Actor handle
//!
//! TigerStyle: Cheap to clone, identity-compared, never blocks the caller.

use crate::mailbox::{Mailbox, Rejected};
use shoal_core::error::Result;
use std::sync::Arc;

/// Handle to one actor's mailbox
///
/// Clones refer to the same mailbox. Two refs are equal only if they refer to
/// the same mailbox, which is how the registry tells a live entry from a stale
/// one after re-creation.
pub struct ActorRef<M: Send + 'static> {
    mailbox: Arc<Mailbox<M>>,
}

impl<M: Send + 'static> ActorRef<M> {
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<M>>) -> Self {
        Self { mailbox }
    }

    pub(crate) fn mailbox(&self) -> &Arc<Mailbox<M>> {
        &self.mailbox
    }

    /// Process-unique mailbox id
    pub fn id(&self) -> u64 {
        self.mailbox.id()
    }

    /// Type name of the bound actor
    pub fn actor_type(&self) -> &'static str {
        self.mailbox.actor_type()
    }

    /// Enqueue a message for the actor
    ///
    /// Fails fast with `TooManyPendingMessages` when the runtime's permit pool
    /// is exhausted, `RuntimeClosed` when the runtime is stopping, and
    /// `ActorRefReleased` when this mailbox no longer accepts messages.
    pub fn send_message(&self, message: M) -> Result<()> {
        self.try_send_message(message).map_err(Rejected::into_error)
    }

    /// Like [`send_message`](Self::send_message) but hands the message back on failure
    pub fn try_send_message(&self, message: M) -> std::result::Result<(), Rejected<M>> {
        self.mailbox.send(message)
    }

    /// Stop accepting messages; already queued messages are still delivered
    pub fn release(&self) {
        self.mailbox.release();
    }

    /// Release only if no message is queued or being processed
    ///
    /// Returns `true` if the mailbox is released after the call. Inside the
    /// actor's own turn use [`ActorContext::release_if_idle`](crate::ActorContext::release_if_idle).
    pub fn release_if_idle(&self) -> bool {
        self.mailbox.release_if_idle()
    }

    pub fn is_released(&self) -> bool {
        self.mailbox.is_released()
    }

    /// Messages waiting behind the one currently processed
    pub fn queued_messages(&self) -> usize {
        self.mailbox.queued_len()
    }
}

impl<M: Send + 'static> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

impl<M: Send + 'static> PartialEq for ActorRef<M> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mailbox, &other.mailbox)
    }
}

impl<M: Send + 'static> Eq for ActorRef<M> {}

impl<M: Send + 'static> std::fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.id())
            .field("actor_type", &self.actor_type())
            .finish()
    }
}
