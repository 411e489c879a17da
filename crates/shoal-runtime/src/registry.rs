//! Keyed smart actor registry
//!
//! TigerStyle: At most one live mailbox per key, bounded shutdown.
//!
//! [`SmartActors`] creates an actor the first time a key is addressed, routes
//! messages to it, and runs a background sweep that pings registered actors in
//! adaptive batches so idle ones can remove themselves. The registry lock is
//! only held for map lookups and updates, never while actor code runs.

use crate::activation::{Membership, SmartActor, SmartActorHost, SmartMessage};
use crate::actor::ActorContext;
use crate::handle::ActorRef;
use crate::mailbox::Rejected;
use crate::ping::{calculate_ping_batch, PingBatch};
use crate::runtime::{ActorsRuntime, SimpleActorsRuntime};
use shoal_core::config::SmartActorsConfig;
use shoal_core::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Mailbox handle of a hosted smart actor
pub type SmartRef<A> = ActorRef<SmartMessage<<A as SmartActor>::Message>>;

// ============================================================================
// Factories
// ============================================================================

/// Factory for creating actors
pub trait ActorFactory<A: SmartActor>: Send + Sync + 'static {
    /// Create a new actor instance for `key`
    fn create(&self, key: &A::Key) -> A;
}

/// Simple factory that clones a prototype actor
pub struct CloneFactory<A: SmartActor + Clone + Sync> {
    prototype: A,
}

impl<A: SmartActor + Clone + Sync> CloneFactory<A> {
    pub fn new(prototype: A) -> Self {
        Self { prototype }
    }
}

impl<A: SmartActor + Clone + Sync> ActorFactory<A> for CloneFactory<A> {
    fn create(&self, _key: &A::Key) -> A {
        self.prototype.clone()
    }
}

/// Factory backed by a closure over the key
pub struct FnFactory<F> {
    create: F,
}

impl<F> FnFactory<F> {
    pub fn new(create: F) -> Self {
        Self { create }
    }
}

impl<A, F> ActorFactory<A> for FnFactory<F>
where
    A: SmartActor,
    F: Fn(&A::Key) -> A + Send + Sync + 'static,
{
    fn create(&self, key: &A::Key) -> A {
        (self.create)(key)
    }
}

// ============================================================================
// Registry
// ============================================================================

struct SweepState<K> {
    /// Keys still to be pinged in the current round
    cursor: VecDeque<K>,
    last_batch: PingBatch,
}

struct RegistryShared<A: SmartActor, R: ActorsRuntime> {
    runtime: R,
    factory: Arc<dyn ActorFactory<A>>,
    config: SmartActorsConfig,
    actors: RwLock<HashMap<A::Key, SmartRef<A>>>,
    /// Registered actor count, watched by `stop()`
    population: watch::Sender<usize>,
    sweep: Mutex<SweepState<A::Key>>,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
    /// Wakes a sleeping sweep on stop
    sweep_shutdown: Arc<Notify>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl<A: SmartActor, R: ActorsRuntime> RegistryShared<A, R> {
    fn read_actors(&self) -> RwLockReadGuard<'_, HashMap<A::Key, SmartRef<A>>> {
        self.actors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_actors(&self) -> RwLockWriteGuard<'_, HashMap<A::Key, SmartRef<A>>> {
        self.actors.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sweep(&self) -> MutexGuard<'_, SweepState<A::Key>> {
        self.sweep.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Look up the mailbox for `key`, creating the actor if absent
    ///
    /// Racing creators agree on one mailbox; the losers' actors are dropped
    /// before they ever see a message.
    fn get_actor_ref_for(self: &Arc<Self>, key: &A::Key) -> Result<SmartRef<A>> {
        if let Some(actor_ref) = self.read_actors().get(key) {
            return Ok(actor_ref.clone());
        }

        let actor = self.factory.create(key);
        let weak: Weak<Self> = Arc::downgrade(self);
        let membership: Weak<dyn Membership<A::Key, A::Message>> = weak;
        let candidate = self
            .runtime
            .get_support_for(SmartActorHost::new(actor, key.clone(), membership))?;

        let mut actors = self.write_actors();
        if let Some(registered) = actors.get(key) {
            return Ok(registered.clone());
        }
        // stop() snapshots the map after setting the flag; nothing may register past it
        if self.is_stopped() {
            return Err(Error::RegistryStopped);
        }

        actors.insert(key.clone(), candidate.clone());
        self.population.send_replace(actors.len());
        debug!(actor_key = ?key, mailbox_id = candidate.id(), "Smart actor created");
        Ok(candidate)
    }

    fn send_message(self: &Arc<Self>, key: &A::Key, message: A::Message) -> Result<()> {
        let mut message = SmartMessage::Message(message);
        loop {
            if self.is_stopped() {
                return Err(Error::RegistryStopped);
            }

            let actor_ref = self.get_actor_ref_for(key)?;
            match actor_ref.try_send_message(message) {
                Ok(()) => return Ok(()),
                Err(Rejected {
                    reason: Error::ActorRefReleased,
                    message: returned,
                }) => {
                    // Evicted between lookup and send: drop the stale entry and retry
                    debug!(
                        actor_key = ?key,
                        mailbox_id = actor_ref.id(),
                        "Mailbox released, retrying"
                    );
                    self.remove_actor(key, &actor_ref);
                    message = returned;
                }
                Err(rejected) => return Err(rejected.into_error()),
            }
        }
    }

    fn calculate_next_ping_batch(&self) -> PingBatch {
        let population = self.read_actors().len();
        let batch = calculate_ping_batch(
            population,
            self.config.ping_period_ms,
            self.config.preferred_ping_batch_size,
            self.config.min_ping_batch_period_ms,
        );

        self.lock_sweep().last_batch = batch;
        debug!(
            population,
            size = batch.size,
            period_ms = batch.period_ms,
            "Ping batch calculated"
        );
        batch
    }

    fn send_ping_to_next_batch(&self) {
        let size = self.lock_sweep().last_batch.size;

        for _ in 0..size {
            let next = {
                let mut sweep = self.lock_sweep();
                if sweep.cursor.is_empty() {
                    sweep.cursor = self.read_actors().keys().cloned().collect();
                }
                sweep.cursor.pop_front()
            };

            let Some(key) = next else {
                return;
            };

            // Keys removed since the round started are skipped
            let actor_ref = self.read_actors().get(&key).cloned();
            let Some(actor_ref) = actor_ref else {
                continue;
            };

            match actor_ref.send_message(SmartMessage::Ping) {
                Ok(()) => {}
                Err(Error::ActorRefReleased) => {
                    debug!(actor_key = ?key, "Ping skipped, actor already released");
                }
                Err(e) => {
                    error!(actor_key = ?key, error = %e, "Failed to ping actor");
                }
            }
        }
    }

    fn destroy_actor(&self, key: &A::Key) -> Result<bool> {
        let actor_ref = self.read_actors().get(key).cloned();
        let Some(actor_ref) = actor_ref else {
            return Ok(false);
        };

        let sent = match actor_ref.send_message(SmartMessage::Destroy) {
            Ok(()) => true,
            Err(Error::ActorRefReleased) => false,
            Err(e) => return Err(e),
        };
        actor_ref.release();
        Ok(sent)
    }
}

impl<A: SmartActor, R: ActorsRuntime> Membership<A::Key, A::Message> for RegistryShared<A, R> {
    fn try_remove_actor(
        &self,
        key: &A::Key,
        ctx: &ActorContext<'_, SmartMessage<A::Message>>,
    ) -> bool {
        if !ctx.release_if_idle() {
            debug!(actor_key = ?key, "Actor has queued messages, not removing");
            return false;
        }

        // Released is final; a sender that hit the released ref may have dropped the entry already
        if !self.remove_actor(key, ctx.actor_ref()) {
            debug!(actor_key = ?key, "Released actor was already unregistered");
        }
        true
    }

    fn remove_actor(&self, key: &A::Key, actor_ref: &SmartRef<A>) -> bool {
        let mut actors = self.write_actors();
        let registered = actors.get(key).is_some_and(|current| current == actor_ref);
        if registered {
            actors.remove(key);
            self.population.send_replace(actors.len());
            debug!(actor_key = ?key, remaining = actors.len(), "Smart actor removed");
        }
        registered
    }
}

/// Periodic eviction sweep; exits once the registry is stopped or dropped
async fn run_ping_sweep<A: SmartActor, R: ActorsRuntime>(
    registry: Weak<RegistryShared<A, R>>,
    shutdown: Arc<Notify>,
) {
    loop {
        let period = {
            let Some(registry) = registry.upgrade() else {
                break;
            };
            if registry.is_stopped() {
                break;
            }

            let batch = registry.calculate_next_ping_batch();
            registry.send_ping_to_next_batch();
            batch.period()
        };

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = shutdown.notified() => break,
        }
    }
    debug!("Ping sweep stopped");
}

/// Registry of lazily created, self-evicting actors addressed by key
///
/// Cheap to clone; clones share the registry.
pub struct SmartActors<A: SmartActor, R: ActorsRuntime = SimpleActorsRuntime> {
    shared: Arc<RegistryShared<A, R>>,
}

impl<A: SmartActor, R: ActorsRuntime> SmartActors<A, R> {
    /// Create a registry on top of `runtime`
    pub fn new(
        runtime: R,
        factory: Arc<dyn ActorFactory<A>>,
        config: SmartActorsConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (population, _) = watch::channel(0);
        Ok(Self {
            shared: Arc::new(RegistryShared {
                runtime,
                factory,
                sweep: Mutex::new(SweepState {
                    cursor: VecDeque::new(),
                    last_batch: PingBatch {
                        size: 0,
                        period_ms: config.ping_period_ms,
                    },
                }),
                config,
                actors: RwLock::new(HashMap::new()),
                population,
                sweep_task: Mutex::new(None),
                sweep_shutdown: Arc::new(Notify::new()),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        })
    }

    /// Create a registry whose actors are built by `create(key)`
    pub fn with_factory_fn<F>(runtime: R, config: SmartActorsConfig, create: F) -> Result<Self>
    where
        F: Fn(&A::Key) -> A + Send + Sync + 'static,
    {
        Self::new(runtime, Arc::new(FnFactory::new(create)), config)
    }

    /// Start the eviction sweep on the current tokio runtime
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<()> {
        if self.shared.is_stopped() {
            return Err(Error::RegistryStopped);
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::internal(format!("no tokio runtime in context: {}", e)))?;
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(Error::RegistryAlreadyStarted);
        }

        let task = handle.spawn(run_ping_sweep(
            Arc::downgrade(&self.shared),
            Arc::clone(&self.shared.sweep_shutdown),
        ));
        *self
            .shared
            .sweep_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);

        info!(
            ping_period_ms = self.shared.config.ping_period_ms,
            preferred_ping_batch_size = self.shared.config.preferred_ping_batch_size,
            "Smart actors started"
        );
        Ok(())
    }

    /// Deliver `message` to the actor for `key`, creating it if needed
    ///
    /// A released mailbox (the actor was just evicted) is replaced
    /// transparently. Backpressure and runtime errors are returned as is.
    pub fn send_message(&self, key: &A::Key, message: A::Message) -> Result<()> {
        self.shared.send_message(key, message)
    }

    /// Mailbox for `key`, creating the actor if needed
    pub fn get_actor_ref_for(&self, key: &A::Key) -> Result<SmartRef<A>> {
        if self.shared.is_stopped() {
            return Err(Error::RegistryStopped);
        }
        self.shared.get_actor_ref_for(key)
    }

    /// Destroy the actor for `key` regardless of its expiry check
    ///
    /// Returns `false` if no live actor was registered for `key`.
    pub fn destroy_actor(&self, key: &A::Key) -> Result<bool> {
        self.shared.destroy_actor(key)
    }

    /// Recompute the sweep batch from the current population
    pub fn calculate_next_ping_batch(&self) -> PingBatch {
        self.shared.calculate_next_ping_batch()
    }

    /// Ping the next batch of actors, continuing where the last batch ended
    pub fn send_ping_to_next_batch(&self) {
        self.shared.send_ping_to_next_batch()
    }

    /// Destroy every actor and wait for the registry to drain
    ///
    /// Returns `true` if all actors were removed within the configured wait.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<bool> {
        self.shared.stopped.store(true, Ordering::SeqCst);
        // Stored permit: the wake-up is not lost if the sweep is mid-batch
        self.shared.sweep_shutdown.notify_one();

        let sweep_task = self
            .shared
            .sweep_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = sweep_task {
            if let Err(e) = task.await {
                warn!(error = %e, "Ping sweep ended abnormally");
            }
        }

        let actor_refs: Vec<SmartRef<A>> = self.shared.read_actors().values().cloned().collect();
        info!(actors = actor_refs.len(), "Stopping smart actors");

        for actor_ref in &actor_refs {
            match actor_ref.send_message(SmartMessage::Destroy) {
                Ok(()) | Err(Error::ActorRefReleased) => {}
                Err(e) => {
                    warn!(mailbox_id = actor_ref.id(), error = %e, "Failed to send destroy");
                }
            }
            actor_ref.release();
        }
        drop(actor_refs);

        let mut population = self.shared.population.subscribe();
        let wait = self.shared.config.shutdown_wait();
        let drained = tokio::time::timeout(wait, population.wait_for(|count| *count == 0))
            .await
            .map(|waited| waited.map(|_| ()));
        match drained {
            Ok(Ok(())) => {
                info!("Smart actors stopped");
                Ok(true)
            }
            Ok(Err(e)) => Err(Error::internal(format!(
                "population channel closed: {}",
                e
            ))),
            Err(_) => {
                warn!(
                    remaining = self.len(),
                    wait_ms = wait.as_millis() as u64,
                    "Timed out waiting for smart actors to stop"
                );
                Ok(false)
            }
        }
    }

    /// Number of registered actors (may change concurrently)
    pub fn len(&self) -> usize {
        self.shared.read_actors().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &A::Key) -> bool {
        self.shared.read_actors().contains_key(key)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    pub fn last_ping_batch_size(&self) -> usize {
        self.shared.lock_sweep().last_batch.size
    }

    pub fn last_ping_batch_period_ms(&self) -> u64 {
        self.shared.lock_sweep().last_batch.period_ms
    }

    pub fn config(&self) -> &SmartActorsConfig {
        &self.shared.config
    }

    pub fn runtime(&self) -> &R {
        &self.shared.runtime
    }
}

impl<A: SmartActor, R: ActorsRuntime> Clone for SmartActors<A, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: SmartActor, R: ActorsRuntime> std::fmt::Debug for SmartActors<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartActors")
            .field("actors", &self.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
