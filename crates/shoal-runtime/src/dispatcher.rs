//! Message handler table
//!
//! TigerStyle: Explicit message routing, built once, immutable afterwards.
//!
//! Routes dynamically typed messages (`&dyn Any`) to handlers registered per
//! concrete message type. Several handlers may be registered for one type;
//! they run in registration order.

use shoal_core::error::{Error, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use tracing::warn;

type Handler<S> = Box<dyn Fn(&mut S, &dyn Any) -> Result<()> + Send + Sync>;

struct Route<S> {
    message_type: &'static str,
    handler: Handler<S>,
}

/// Builder for [`MessageDispatcher`]
pub struct MessageDispatcherBuilder<S> {
    routes: HashMap<TypeId, Vec<Route<S>>>,
}

impl<S: 'static> MessageDispatcherBuilder<S> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register `handler` for messages of type `T`
    pub fn on<T, F>(mut self, handler: F) -> Self
    where
        T: Any,
        F: Fn(&mut S, &T) -> Result<()> + Send + Sync + 'static,
    {
        let message_type = std::any::type_name::<T>();
        let handler: Handler<S> = Box::new(move |target: &mut S, message: &dyn Any| {
            let message = message.downcast_ref::<T>().ok_or_else(|| {
                Error::internal(format!("handler for {} got another type", message_type))
            })?;
            handler(target, message)
        });

        self.routes.entry(TypeId::of::<T>()).or_default().push(Route {
            message_type,
            handler,
        });
        self
    }

    /// Freeze the table
    pub fn build(self) -> MessageDispatcher<S> {
        MessageDispatcher {
            routes: self.routes,
        }
    }
}

impl<S: 'static> Default for MessageDispatcherBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable table of handlers keyed by message type
pub struct MessageDispatcher<S> {
    routes: HashMap<TypeId, Vec<Route<S>>>,
}

impl<S: 'static> MessageDispatcher<S> {
    pub fn builder() -> MessageDispatcherBuilder<S> {
        MessageDispatcherBuilder::new()
    }

    /// Invoke every handler registered for the message's concrete type
    ///
    /// Returns `false` if no handler is registered. A failing handler is
    /// logged and does not prevent the remaining handlers from running.
    pub fn dispatch(&self, target: &mut S, message: &dyn Any) -> bool {
        let Some(routes) = self.routes.get(&message.type_id()) else {
            return false;
        };

        for route in routes {
            if let Err(e) = (route.handler)(target, message) {
                warn!(
                    message_type = route.message_type,
                    error = %e,
                    "Message handler failed"
                );
            }
        }
        true
    }

    pub fn is_registered<T: Any>(&self) -> bool {
        self.routes.contains_key(&TypeId::of::<T>())
    }

    /// Total number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Deposit(u64);
    struct Withdraw(u64);
    struct Audit;

    #[derive(Default)]
    struct Account {
        balance: u64,
        log: Vec<&'static str>,
    }

    fn dispatcher() -> MessageDispatcher<Account> {
        MessageDispatcher::builder()
            .on(|account: &mut Account, Deposit(amount): &Deposit| {
                account.balance += amount;
                account.log.push("deposit");
                Ok(())
            })
            .on(|account: &mut Account, Withdraw(amount): &Withdraw| {
                if *amount > account.balance {
                    return Err(Error::actor_failed("account", "insufficient funds"));
                }
                account.balance -= amount;
                Ok(())
            })
            .on(|account: &mut Account, _: &Withdraw| {
                account.log.push("withdraw-attempt");
                Ok(())
            })
            .build()
    }

    #[test]
    fn test_dispatch_by_type() {
        let dispatcher = dispatcher();
        let mut account = Account::default();

        assert!(dispatcher.dispatch(&mut account, &Deposit(10)));
        assert!(dispatcher.dispatch(&mut account, &Withdraw(4)));

        assert_eq!(account.balance, 6);
        assert_eq!(account.log, vec!["deposit", "withdraw-attempt"]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_others() {
        let dispatcher = dispatcher();
        let mut account = Account::default();

        assert!(dispatcher.dispatch(&mut account, &Withdraw(100)));
        assert_eq!(account.balance, 0);
        assert_eq!(account.log, vec!["withdraw-attempt"]);
    }

    #[test]
    fn test_unregistered_type() {
        let dispatcher = dispatcher();
        let mut account = Account::default();

        assert!(!dispatcher.dispatch(&mut account, &Audit));
        assert!(!dispatcher.is_registered::<Audit>());
        assert!(dispatcher.is_registered::<Deposit>());
        assert_eq!(dispatcher.handler_count(), 3);
    }

    #[test]
    fn test_dispatch_boxed_message() {
        let dispatcher = dispatcher();
        let mut account = Account::default();
        let message: Box<dyn Any + Send> = Box::new(Deposit(3));

        assert!(dispatcher.dispatch(&mut account, &*message));
        assert_eq!(account.balance, 3);
    }
}
