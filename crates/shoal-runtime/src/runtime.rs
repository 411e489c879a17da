//! Actors runtime: permit pool, scheduling and shutdown
//!
//! TigerStyle: Bounded in-flight work, fail-fast admission, bounded shutdown.
//!
//! Every message sent to any mailbox of one runtime holds a permit from a
//! shared pool of `max_messages` until it has been processed. Admission never
//! blocks: an exhausted pool is reported to the sender immediately.

use crate::actor::Actor;
use crate::handle::ActorRef;
use crate::mailbox::Mailbox;
use crate::scheduler::{DirectScheduler, ExecutorScheduler, Scheduler, Task};
use shoal_core::config::RuntimeConfig;
use shoal_core::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};

/// Service provider interface between mailboxes and an execution strategy
pub trait ActorsRuntime: Send + Sync + 'static {
    /// Bind an actor to a new mailbox owned by this runtime
    fn get_support_for<A: Actor>(&self, actor: A) -> Result<ActorRef<A::Message>>;

    /// Execute one mailbox drain step
    fn schedule_handle_next_message_call(&self, task: Task);
}

/// State shared by the runtime handle and every mailbox it created
pub(crate) struct RuntimeShared {
    permits: Arc<Semaphore>,
    max_messages: usize,
    closed: AtomicBool,
    shutdown_wait: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl RuntimeShared {
    pub(crate) fn acquire_permit_for_message(&self) -> Result<OwnedSemaphorePermit> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::RuntimeClosed);
        }

        Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| Error::too_many_pending(self.max_messages))
    }

    pub(crate) fn schedule(&self, task: Task) {
        self.scheduler.schedule(task);
    }

    pub(crate) fn runs_inline(&self) -> bool {
        self.scheduler.runs_inline()
    }

    fn pending_messages(&self) -> usize {
        self.max_messages
            .saturating_sub(self.permits.available_permits())
    }
}

/// Builder for creating a runtime
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl RuntimeBuilder {
    /// Create a new runtime builder
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            scheduler: None,
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the scheduling strategy
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build the runtime (closed until [`SimpleActorsRuntime::start`])
    pub fn build(self) -> Result<SimpleActorsRuntime> {
        let scheduler = self
            .scheduler
            .ok_or_else(|| Error::internal("scheduler is required"))?;
        self.config.validate()?;

        debug_assert!(self.config.max_messages > 0);
        debug_assert!(self.config.max_messages <= u32::MAX as usize);

        Ok(SimpleActorsRuntime {
            shared: Arc::new(RuntimeShared {
                permits: Arc::new(Semaphore::new(self.config.max_messages)),
                max_messages: self.config.max_messages,
                closed: AtomicBool::new(true),
                shutdown_wait: self.config.shutdown_wait(),
                scheduler,
            }),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Permit-pool runtime parameterised by a scheduling strategy
///
/// Cheap to clone; clones share the pool and the closing flag.
#[derive(Clone)]
pub struct SimpleActorsRuntime {
    shared: Arc<RuntimeShared>,
}

impl SimpleActorsRuntime {
    /// Runtime that processes messages on the caller's tokio blocking pool
    pub fn executor(config: RuntimeConfig) -> Result<Self> {
        RuntimeBuilder::new()
            .with_config(config)
            .with_scheduler(Arc::new(ExecutorScheduler::current()?))
            .build()
    }

    /// Runtime that processes messages synchronously in the sending thread
    pub fn direct(config: RuntimeConfig) -> Result<Self> {
        RuntimeBuilder::new()
            .with_config(config)
            .with_scheduler(Arc::new(DirectScheduler))
            .build()
    }

    /// Open the runtime for new actors and messages
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<()> {
        if !self.shared.closed.swap(false, Ordering::SeqCst) {
            return Err(Error::RuntimeAlreadyStarted);
        }

        info!(
            scheduler = self.shared.scheduler.name(),
            max_messages = self.shared.max_messages,
            "Actors runtime started"
        );
        Ok(())
    }

    /// Stop admitting messages and wait for outstanding ones to finish
    ///
    /// Returns `true` if every permit came back within the configured wait.
    /// A timeout is logged, not treated as an error.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> bool {
        self.shared.closed.store(true, Ordering::SeqCst);

        let all_permits = self.shared.max_messages as u32;
        let drained = tokio::time::timeout(
            self.shared.shutdown_wait,
            self.shared.permits.acquire_many(all_permits),
        )
        .await;

        match drained {
            Ok(Ok(_permits)) => {
                info!("Actors runtime stopped");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Permit pool closed during shutdown");
                false
            }
            Err(_) => {
                warn!(
                    pending = self.pending_messages(),
                    wait_ms = self.shared.shutdown_wait.as_millis() as u64,
                    "Timed out waiting for pending messages"
                );
                false
            }
        }
    }

    /// Stop admitting messages without waiting
    pub fn forced_stop(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        info!(pending = self.pending_messages(), "Actors runtime force-stopped");
    }

    /// Messages queued or being processed across all mailboxes
    pub fn pending_messages(&self) -> usize {
        self.shared.pending_messages()
    }

    pub fn max_messages(&self) -> usize {
        self.shared.max_messages
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl ActorsRuntime for SimpleActorsRuntime {
    fn get_support_for<A: Actor>(&self, actor: A) -> Result<ActorRef<A::Message>> {
        if self.is_closed() {
            return Err(Error::RuntimeClosed);
        }

        let mailbox = Arc::new(Mailbox::new(actor, Arc::clone(&self.shared)));
        debug!(
            mailbox_id = mailbox.id(),
            actor = mailbox.actor_type(),
            "Mailbox created"
        );
        Ok(ActorRef::from_mailbox(mailbox))
    }

    fn schedule_handle_next_message_call(&self, task: Task) {
        self.shared.schedule(task);
    }
}

impl std::fmt::Debug for SimpleActorsRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleActorsRuntime")
            .field("scheduler", &self.shared.scheduler.name())
            .field("max_messages", &self.shared.max_messages)
            .field("pending_messages", &self.pending_messages())
            .field("closed", &self.is_closed())
            .finish()
    }
}
