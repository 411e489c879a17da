//! Shoal Runtime
//!
//! Mailboxes, backpressure and the keyed smart actor registry.
//!
//! # Overview
//!
//! The runtime provides:
//! - Single-threaded actor execution (one message in flight per mailbox, FIFO)
//! - A shared permit pool bounding queued and in-flight messages
//! - Pluggable scheduling (tokio blocking pool or the caller's thread)
//! - Lazily created per-key actors with ping-driven eviction
//! - Graceful, time-bounded shutdown
//!
//! # TigerStyle
//! - Fail-fast admission (no blocking on a full permit pool)
//! - Explicit lifecycle states
//! - Locks are never held while actor code runs
//!
//! # Example
//!
//! ```rust,ignore
//! use shoal_runtime::{SimpleActorsRuntime, SmartActors};
//!
//! let runtime = SimpleActorsRuntime::executor(config.runtime.clone())?;
//! runtime.start()?;
//!
//! let sessions = SmartActors::with_factory_fn(runtime.clone(), config.smart_actors.clone(), Session::new)?;
//! sessions.start()?;
//! sessions.send_message(&user_id, SessionEvent::Touch)?;
//! ```

pub mod activation;
pub mod actor;
pub mod dispatcher;
pub mod handle;
pub mod mailbox;
pub mod ping;
pub mod registry;
pub mod runtime;
pub mod scheduler;

pub use activation::{LifecycleState, SmartActor, SmartContext, SmartMessage};
pub use actor::{Actor, ActorContext};
pub use dispatcher::{MessageDispatcher, MessageDispatcherBuilder};
pub use handle::ActorRef;
pub use mailbox::Rejected;
pub use ping::{calculate_ping_batch, PingBatch};
pub use registry::{ActorFactory, CloneFactory, FnFactory, SmartActors, SmartRef};
pub use runtime::{ActorsRuntime, RuntimeBuilder, SimpleActorsRuntime};
pub use scheduler::{DirectScheduler, ExecutorScheduler, Scheduler, Task};
