//! Demo account actor driven by the `run` command
//!
//! Commands arrive as `Box<dyn Any + Send>` and are routed through a shared
//! [`MessageDispatcher`]. An account becomes removable once it has been idle
//! for the configured time.

use shoal_core::error::{Error, Result};
use shoal_runtime::{MessageDispatcher, SmartActor, SmartContext};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub type Command = Box<dyn Any + Send>;

pub struct Deposit(pub u64);
pub struct Withdraw(pub u64);

/// Counters shared by every account of one run
#[derive(Debug, Default)]
pub struct AccountStats {
    pub created: AtomicU64,
    pub processed: AtomicU64,
    pub overdrafts: AtomicU64,
    pub evicted: AtomicU64,
}

#[derive(Debug, Default)]
pub struct AccountState {
    balance: u64,
    overdrafts: u64,
}

/// Routing table shared by all accounts
pub fn dispatcher() -> MessageDispatcher<AccountState> {
    MessageDispatcher::builder()
        .on(|state: &mut AccountState, Deposit(amount): &Deposit| {
            state.balance = state.balance.saturating_add(*amount);
            Ok(())
        })
        .on(|state: &mut AccountState, Withdraw(amount): &Withdraw| {
            if *amount > state.balance {
                state.overdrafts += 1;
                return Err(Error::actor_failed(
                    "account",
                    format!("withdraw {} exceeds balance {}", amount, state.balance),
                ));
            }
            state.balance -= amount;
            Ok(())
        })
        .build()
}

pub struct Account {
    key: u32,
    state: AccountState,
    idle_after: Duration,
    last_activity: Instant,
    dispatcher: Arc<MessageDispatcher<AccountState>>,
    stats: Arc<AccountStats>,
}

impl Account {
    pub fn new(
        key: u32,
        idle_after: Duration,
        dispatcher: Arc<MessageDispatcher<AccountState>>,
        stats: Arc<AccountStats>,
    ) -> Self {
        Self {
            key,
            state: AccountState::default(),
            idle_after,
            last_activity: Instant::now(),
            dispatcher,
            stats,
        }
    }
}

impl SmartActor for Account {
    type Key = u32;
    type Message = Command;

    fn init_actor(&mut self, key: &u32) -> Result<()> {
        debug_assert_eq!(*key, self.key);
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn handle_message(
        &mut self,
        _ctx: &SmartContext<'_, u32, Command>,
        message: Command,
    ) -> Result<bool> {
        self.last_activity = Instant::now();
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        let overdrafts = self.state.overdrafts;
        let handled = self.dispatcher.dispatch(&mut self.state, &*message);
        if self.state.overdrafts > overdrafts {
            self.stats.overdrafts.fetch_add(1, Ordering::Relaxed);
        }
        Ok(handled)
    }

    fn can_be_removed(&self) -> bool {
        self.last_activity.elapsed() >= self.idle_after
    }

    fn pre_destroy(&mut self) -> Result<()> {
        debug!(
            account = self.key,
            balance = self.state.balance,
            overdrafts = self.state.overdrafts,
            "Flushing account"
        );
        Ok(())
    }

    fn destroy_actor(&mut self) {
        self.stats.evicted.fetch_add(1, Ordering::Relaxed);
    }
}
