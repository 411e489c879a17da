//! Smart actor lifecycle
//!
//! TigerStyle: Explicit lifecycle states, removal only after confirmation.
//!
//! A [`SmartActor`] is hosted by the registry inside a [`SmartActorHost`],
//! which turns the system messages of the sweep into lifecycle hooks:
//!
//! ```text
//!   Uninitialized ──first message──> Initialized ──removal confirmed──> Destroyed
//!                                         │                                ^
//!                                         └──────────── Destroy ───────────┘
//! ```
//!
//! Removal after a ping is a two-step protocol: `pre_destroy` runs first and
//! must leave the actor usable, the registry then confirms that no message is
//! queued behind the ping, and only then `destroy_actor` runs.

use crate::actor::{Actor, ActorContext};
use crate::handle::ActorRef;
use shoal_core::error::Result;
use std::cell::Cell;
use std::fmt;
use std::hash::Hash;
use std::sync::Weak;
use tracing::{debug, warn};

/// Envelope for everything delivered to a smart actor's mailbox
///
/// The system variants can never collide with an application payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmartMessage<M> {
    /// Expiry probe sent by the sweep
    Ping,
    /// Unconditional teardown
    Destroy,
    /// Application payload
    Message(M),
}

/// Smart actor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Created but not yet handed its first message
    #[default]
    Uninitialized,
    /// `init_actor` ran; processing messages
    Initialized,
    /// `destroy_actor` ran; remaining deliveries are dropped
    Destroyed,
}

impl LifecycleState {
    /// Check if messages reach the actor in this state
    pub fn can_process(&self) -> bool {
        !matches!(self, LifecycleState::Destroyed)
    }

    /// Check if valid transition
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        match (self, next) {
            (LifecycleState::Uninitialized, LifecycleState::Initialized) => true,
            (LifecycleState::Initialized, LifecycleState::Destroyed) => true,
            _ if *self == next => true,
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "uninitialized"),
            LifecycleState::Initialized => write!(f, "initialized"),
            LifecycleState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Actor managed by [`SmartActors`](crate::SmartActors): created lazily per
/// key and evicted when it reports it can be removed
pub trait SmartActor: Send + 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    type Message: Send + 'static;

    /// Called once, before the first message is delivered
    fn init_actor(&mut self, _key: &Self::Key) -> Result<()> {
        Ok(())
    }

    /// Handle an application message
    fn handle_message(
        &mut self,
        ctx: &SmartContext<'_, Self::Key, Self::Message>,
        message: Self::Message,
    ) -> Result<bool>;

    /// Called on every ping, before the expiry check
    fn process_ping(&mut self) {}

    /// Expiry check
    fn can_be_removed(&self) -> bool;

    /// Persist or flush state; the actor may still be kept alive afterwards
    fn pre_destroy(&mut self) -> Result<()> {
        Ok(())
    }

    /// Final teardown, called at most once after removal is confirmed
    fn destroy_actor(&mut self) {}
}

/// Context handed to [`SmartActor::handle_message`]
pub struct SmartContext<'a, K, M: Send + 'static> {
    key: &'a K,
    ctx: &'a ActorContext<'a, SmartMessage<M>>,
    removal_requested: Cell<bool>,
}

impl<'a, K, M: Send + 'static> SmartContext<'a, K, M> {
    fn new(key: &'a K, ctx: &'a ActorContext<'a, SmartMessage<M>>) -> Self {
        Self {
            key,
            ctx,
            removal_requested: Cell::new(false),
        }
    }

    /// Registry key of this actor
    pub fn key(&self) -> &K {
        self.key
    }

    /// Own mailbox, e.g. for sending follow-up messages to self
    pub fn actor_ref(&self) -> &ActorRef<SmartMessage<M>> {
        self.ctx.actor_ref()
    }

    /// Run the removal protocol once the handler returns
    ///
    /// Removal still requires that no message is queued behind this one.
    pub fn request_removal(&self) {
        self.removal_requested.set(true);
    }

    fn is_removal_requested(&self) -> bool {
        self.removal_requested.get()
    }
}

/// Registry operations a hosted actor calls back into
pub(crate) trait Membership<K, M: Send + 'static>: Send + Sync + 'static {
    /// Release the mailbox if idle and unregister it; `true` if removed
    fn try_remove_actor(&self, key: &K, ctx: &ActorContext<'_, SmartMessage<M>>) -> bool;

    /// Unregister `actor_ref` if it is still the entry for `key`
    fn remove_actor(&self, key: &K, actor_ref: &ActorRef<SmartMessage<M>>) -> bool;
}

/// Adapts a [`SmartActor`] to the plain [`Actor`] contract
pub(crate) struct SmartActorHost<A: SmartActor> {
    actor: A,
    key: A::Key,
    registry: Weak<dyn Membership<A::Key, A::Message>>,
    state: LifecycleState,
}

impl<A: SmartActor> SmartActorHost<A> {
    pub(crate) fn new(
        actor: A,
        key: A::Key,
        registry: Weak<dyn Membership<A::Key, A::Message>>,
    ) -> Self {
        Self {
            actor,
            key,
            registry,
            state: LifecycleState::Uninitialized,
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid lifecycle transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    fn initialize(&mut self) -> Result<()> {
        self.actor.init_actor(&self.key)?;
        self.transition(LifecycleState::Initialized);
        debug!(actor_key = ?self.key, "Smart actor initialized");
        Ok(())
    }

    /// Two-step removal; `destroy_actor` runs only if the registry confirms
    fn try_remove_self(
        &mut self,
        ctx: &ActorContext<'_, SmartMessage<A::Message>>,
    ) -> Result<bool> {
        self.actor.pre_destroy()?;

        let removed = match self.registry.upgrade() {
            Some(registry) => registry.try_remove_actor(&self.key, ctx),
            None => false,
        };

        if removed {
            self.finish_destroy();
        } else {
            debug!(actor_key = ?self.key, "Removal not confirmed, actor stays alive");
        }
        Ok(removed)
    }

    fn destroy(&mut self, ctx: &ActorContext<'_, SmartMessage<A::Message>>) {
        if let Err(e) = self.actor.pre_destroy() {
            warn!(actor_key = ?self.key, error = %e, "pre_destroy failed, destroying anyway");
        }

        ctx.release();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_actor(&self.key, ctx.actor_ref());
        }
        self.finish_destroy();
    }

    fn finish_destroy(&mut self) {
        self.actor.destroy_actor();
        self.transition(LifecycleState::Destroyed);
        debug!(actor_key = ?self.key, "Smart actor destroyed");
    }
}

impl<A: SmartActor> Actor for SmartActorHost<A> {
    type Message = SmartMessage<A::Message>;

    fn process_message(
        &mut self,
        ctx: &ActorContext<'_, Self::Message>,
        message: Self::Message,
    ) -> Result<bool> {
        if !self.state.can_process() {
            warn!(actor_key = ?self.key, "Dropping message delivered after destroy");
            return Ok(true);
        }

        if self.state == LifecycleState::Uninitialized {
            self.initialize()?;
        }

        match message {
            SmartMessage::Ping => {
                self.actor.process_ping();
                if self.actor.can_be_removed() {
                    self.try_remove_self(ctx)?;
                }
                Ok(true)
            }
            SmartMessage::Destroy => {
                self.destroy(ctx);
                Ok(true)
            }
            SmartMessage::Message(payload) => {
                let smart_ctx = SmartContext::new(&self.key, ctx);
                let handled = self.actor.handle_message(&smart_ctx, payload)?;
                if smart_ctx.is_removal_requested() {
                    self.try_remove_self(ctx)?;
                }
                Ok(handled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        use LifecycleState::*;

        assert!(Uninitialized.can_transition_to(Initialized));
        assert!(Initialized.can_transition_to(Destroyed));
        assert!(Initialized.can_transition_to(Initialized));

        assert!(!Uninitialized.can_transition_to(Destroyed));
        assert!(!Destroyed.can_transition_to(Initialized));
        assert!(!Destroyed.can_transition_to(Uninitialized));
    }

    #[test]
    fn test_lifecycle_processing() {
        assert!(LifecycleState::Uninitialized.can_process());
        assert!(LifecycleState::Initialized.can_process());
        assert!(!LifecycleState::Destroyed.can_process());
        assert_eq!(LifecycleState::default(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(LifecycleState::Initialized.to_string(), "initialized");
        assert_eq!(LifecycleState::Destroyed.to_string(), "destroyed");
    }
}
