//! Actor mailbox implementation
//!
//! TigerStyle: One message in flight per actor, FIFO, no silent drops.
//!
//! The queue and the `running`/`released` flags share one short critical
//! section. Actor code runs outside of it, under a separate lock that is only
//! ever taken by the drain step, so it is never contended.
//!
//! ```text
//! send ──> [permit] ──> queue ──(was idle?)──> schedule drain step
//!                                                   │
//!          drain step: pop ─> process_message ─> drop permit
//!                                                   │
//!                       more queued? reschedule : clear running
//! ```
//!
//! With an inline scheduler the drain step loops instead of rescheduling.

use crate::actor::{Actor, ActorContext};
use crate::handle::ActorRef;
use crate::runtime::RuntimeShared;
use shoal_core::error::Error;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error};

static MAILBOX_ID_NEXT: AtomicU64 = AtomicU64::new(1);

/// A send that was not accepted, carrying the message back to the caller
pub struct Rejected<M> {
    /// Why the mailbox refused the message
    pub reason: Error,
    /// The message, untouched
    pub message: M,
}

impl<M> Rejected<M> {
    /// Drop the message and keep the error
    pub fn into_error(self) -> Error {
        self.reason
    }

    /// Drop the error and keep the message
    pub fn into_message(self) -> M {
        self.message
    }
}

impl<M> std::fmt::Debug for Rejected<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<M> std::fmt::Display for Rejected<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "message rejected: {}", self.reason)
    }
}

impl<M> std::error::Error for Rejected<M> {}

/// A queued message and the permit it holds until processed
struct Envelope<M> {
    message: M,
    permit: OwnedSemaphorePermit,
}

struct MailboxState<M> {
    queue: VecDeque<Envelope<M>>,
    /// No further enqueue succeeds once set
    released: bool,
    /// A drain step is scheduled or executing
    running: bool,
}

pub(crate) struct Mailbox<M: Send + 'static> {
    id: u64,
    actor_type: &'static str,
    runtime: Arc<RuntimeShared>,
    state: Mutex<MailboxState<M>>,
    actor: Mutex<Box<dyn Actor<Message = M>>>,
}

impl<M: Send + 'static> Mailbox<M> {
    pub(crate) fn new<A>(actor: A, runtime: Arc<RuntimeShared>) -> Self
    where
        A: Actor<Message = M>,
    {
        Self {
            id: MAILBOX_ID_NEXT.fetch_add(1, Ordering::Relaxed),
            actor_type: std::any::type_name::<A>(),
            runtime,
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                released: false,
                running: false,
            }),
            actor: Mutex::new(Box::new(actor)),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn actor_type(&self) -> &'static str {
        self.actor_type
    }

    fn lock_state(&self) -> MutexGuard<'_, MailboxState<M>> {
        // Actor code never runs under this lock, so a poisoned guard still holds consistent state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a message, scheduling a drain step if the mailbox was idle
    pub(crate) fn send(self: &Arc<Self>, message: M) -> Result<(), Rejected<M>> {
        let permit = match self.runtime.acquire_permit_for_message() {
            Ok(permit) => permit,
            Err(reason) => return Err(Rejected { reason, message }),
        };

        let schedule = {
            let mut state = self.lock_state();
            if state.released {
                return Err(Rejected {
                    reason: Error::ActorRefReleased,
                    message,
                });
            }

            state.queue.push_back(Envelope { message, permit });
            let was_idle = !state.running;
            state.running = true;
            was_idle
        };

        if schedule {
            self.schedule_next();
        }
        Ok(())
    }

    pub(crate) fn release(&self) {
        self.lock_state().released = true;
    }

    pub(crate) fn is_released(&self) -> bool {
        self.lock_state().released
    }

    pub(crate) fn queued_len(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Release only if nothing is queued or being processed
    pub(crate) fn release_if_idle(&self) -> bool {
        let mut state = self.lock_state();
        if state.released {
            return true;
        }
        if state.running {
            return false;
        }

        debug_assert!(state.queue.is_empty());
        state.released = true;
        true
    }

    /// Release if nothing is queued behind the message being processed
    pub(crate) fn release_if_idle_in_turn(&self) -> bool {
        let mut state = self.lock_state();
        if state.released {
            return true;
        }
        if !state.queue.is_empty() {
            return false;
        }

        debug_assert!(state.running, "in-turn release outside of a turn");
        state.released = true;
        true
    }

    fn schedule_next(self: &Arc<Self>) {
        let mailbox = Arc::clone(self);
        self.runtime
            .schedule(Box::new(move || mailbox.handle_next_message()));
    }

    /// Process one message, then reschedule if more are queued
    ///
    /// Inline schedulers keep draining in this call instead.
    fn handle_next_message(self: Arc<Self>) {
        let actor_ref = ActorRef::from_mailbox(Arc::clone(&self));

        loop {
            let envelope = {
                let mut state = self.lock_state();
                let envelope = state.queue.pop_front();
                if envelope.is_none() {
                    state.running = false;
                }
                envelope
            };

            let Some(Envelope { message, permit }) = envelope else {
                debug!(mailbox_id = self.id, "Drain step found an empty queue");
                return;
            };

            self.process(&actor_ref, message);
            drop(permit);

            {
                let mut state = self.lock_state();
                if state.queue.is_empty() {
                    state.running = false;
                    return;
                }
            }

            if !self.runtime.runs_inline() {
                self.schedule_next();
                return;
            }
        }
    }

    fn process(&self, actor_ref: &ActorRef<M>, message: M) {
        let ctx = ActorContext::new(actor_ref);
        let outcome = {
            let mut actor = self.actor.lock().unwrap_or_else(PoisonError::into_inner);
            panic::catch_unwind(AssertUnwindSafe(|| actor.process_message(&ctx, message)))
        };

        match outcome {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => {
                error!(
                    mailbox_id = self.id,
                    actor = self.actor_type,
                    message_type = std::any::type_name::<M>(),
                    "Actor does not handle message"
                );
            }
            Ok(Err(e)) => {
                error!(
                    mailbox_id = self.id,
                    actor = self.actor_type,
                    error = %e,
                    "Actor failed to process message"
                );
            }
            Err(payload) => {
                error!(
                    mailbox_id = self.id,
                    actor = self.actor_type,
                    panic = %panic_message(payload.as_ref()),
                    "Actor panicked while processing message"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{RuntimeBuilder, SimpleActorsRuntime};
    use crate::scheduler::{DirectScheduler, ManualScheduler};
    use crate::ActorsRuntime;
    use shoal_core::config::RuntimeConfig;
    use shoal_core::error::Result;

    /// Records every message and what `release_if_idle` answered inside the turn
    struct Recorder {
        seen: Arc<Mutex<Vec<u32>>>,
        in_turn_release: Arc<Mutex<Vec<bool>>>,
        release_in_turn: bool,
    }

    impl Actor for Recorder {
        type Message = u32;

        fn process_message(&mut self, ctx: &ActorContext<'_, u32>, message: u32) -> Result<bool> {
            if message == 666 {
                panic!("boom");
            }
            if message == 404 {
                return Ok(false);
            }
            self.seen.lock().unwrap().push(message);
            if self.release_in_turn {
                self.in_turn_release.lock().unwrap().push(ctx.release_if_idle());
            }
            Ok(true)
        }
    }

    struct Fixture {
        runtime: SimpleActorsRuntime,
        actor_ref: ActorRef<u32>,
        seen: Arc<Mutex<Vec<u32>>>,
        in_turn_release: Arc<Mutex<Vec<bool>>>,
    }

    fn fixture(scheduler: Arc<dyn crate::scheduler::Scheduler>, release_in_turn: bool) -> Fixture {
        let runtime = RuntimeBuilder::new()
            .with_config(RuntimeConfig::with_max_messages(8))
            .with_scheduler(scheduler)
            .build()
            .unwrap();
        runtime.start().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let in_turn_release = Arc::new(Mutex::new(Vec::new()));
        let actor_ref = runtime
            .get_support_for(Recorder {
                seen: seen.clone(),
                in_turn_release: in_turn_release.clone(),
                release_in_turn,
            })
            .unwrap();

        Fixture {
            runtime,
            actor_ref,
            seen,
            in_turn_release,
        }
    }

    #[test]
    fn test_mailbox_fifo_order() {
        let fx = fixture(Arc::new(DirectScheduler), false);

        for i in 0..5 {
            fx.actor_ref.send_message(i).unwrap();
        }

        assert_eq!(*fx.seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(fx.runtime.pending_messages(), 0);
    }

    #[test]
    fn test_mailbox_schedules_once_per_idle_period() {
        let scheduler = Arc::new(ManualScheduler::default());
        let fx = fixture(scheduler.clone(), false);

        fx.actor_ref.send_message(1).unwrap();
        fx.actor_ref.send_message(2).unwrap();
        fx.actor_ref.send_message(3).unwrap();
        assert_eq!(scheduler.queued(), 1);
        assert_eq!(fx.actor_ref.queued_messages(), 3);

        // Each drain step handles one message and reschedules itself
        assert!(scheduler.run_next());
        assert_eq!(*fx.seen.lock().unwrap(), vec![1]);
        assert_eq!(scheduler.queued(), 1);

        scheduler.run_all();
        assert_eq!(*fx.seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(scheduler.queued(), 0);
        assert_eq!(fx.runtime.pending_messages(), 0);
    }

    #[test]
    fn test_released_mailbox_rejects_and_returns_permit() {
        let fx = fixture(Arc::new(DirectScheduler), false);

        fx.actor_ref.release();
        let rejected = fx.actor_ref.try_send_message(7).unwrap_err();

        assert!(rejected.reason.is_released());
        assert_eq!(rejected.into_message(), 7);
        assert_eq!(fx.runtime.pending_messages(), 0);
        assert!(fx.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_release_keeps_queued_messages() {
        let scheduler = Arc::new(ManualScheduler::default());
        let fx = fixture(scheduler.clone(), false);

        fx.actor_ref.send_message(1).unwrap();
        fx.actor_ref.send_message(2).unwrap();
        fx.actor_ref.release();
        assert!(fx.actor_ref.send_message(3).is_err());

        scheduler.run_all();
        assert_eq!(*fx.seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_release_if_idle_outside_turn() {
        let scheduler = Arc::new(ManualScheduler::default());
        let fx = fixture(scheduler.clone(), false);

        fx.actor_ref.send_message(1).unwrap();
        assert!(!fx.actor_ref.release_if_idle());
        assert!(!fx.actor_ref.is_released());

        scheduler.run_all();
        assert!(fx.actor_ref.release_if_idle());
        assert!(fx.actor_ref.is_released());

        // Already released
        assert!(fx.actor_ref.release_if_idle());
    }

    #[test]
    fn test_release_if_idle_inside_turn() {
        let scheduler = Arc::new(ManualScheduler::default());
        let fx = fixture(scheduler.clone(), true);

        fx.actor_ref.send_message(1).unwrap();
        fx.actor_ref.send_message(2).unwrap();

        // Message 2 is queued behind message 1
        scheduler.run_next();
        assert_eq!(*fx.in_turn_release.lock().unwrap(), vec![false]);

        // Only the current message remains, which does not count
        scheduler.run_next();
        assert_eq!(*fx.in_turn_release.lock().unwrap(), vec![false, true]);
        assert!(fx.actor_ref.is_released());
        assert!(fx.actor_ref.send_message(3).unwrap_err().is_released());
    }

    #[test]
    fn test_panic_and_unhandled_do_not_stall_mailbox() {
        let fx = fixture(Arc::new(DirectScheduler), false);

        fx.actor_ref.send_message(666).unwrap();
        fx.actor_ref.send_message(404).unwrap();
        fx.actor_ref.send_message(1).unwrap();

        assert_eq!(*fx.seen.lock().unwrap(), vec![1]);
        assert_eq!(fx.runtime.pending_messages(), 0);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }
}
