//! Synchronous in-process event dispatch.
//!
//! Lifecycle operations publish domain events whose subscribers mutate
//! external resources (stock reservations, credit transfers). Those side
//! effects must be able to **veto** the triggering operation: a failed credit
//! debit during order creation has to abort the create, not get lost on a
//! queue. Dispatch is therefore an ordered, inline call chain rather than a
//! channel fan-out:
//!
//! - Subscribers run in registration order, on the caller's thread.
//! - The first subscriber error stops dispatch and is returned to the caller,
//!   who rolls back whatever the operation persisted.
//! - Subscribers receive a mutable context (typically the order aggregate)
//!   so they can record outcomes such as "this line is now paid".
//!
//! Subscribers must be idempotent: callers may retry a failed operation,
//! re-dispatching events the subscriber already saw.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::Event;

/// Reacts to one domain event with access to a mutable context.
pub trait Subscriber<E: Event>: Send + Sync {
    /// Shared mutable state threaded through dispatch (e.g. the aggregate).
    type Ctx;
    /// Subscriber-specific failure, surfaced to the dispatching caller.
    type Error: core::fmt::Debug + Send + Sync + 'static;

    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    fn on_event(&self, event: &E, ctx: &mut Self::Ctx) -> Result<(), Self::Error>;
}

/// Ordered registry of subscribers for one event type.
pub struct Dispatcher<E: Event, C, X> {
    subscribers: Vec<Arc<dyn Subscriber<E, Ctx = C, Error = X>>>,
}

impl<E: Event, C, X> Default for Dispatcher<E, C, X> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<E, C, X> Dispatcher<E, C, X>
where
    E: Event,
    X: core::fmt::Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber; dispatch order is registration order.
    pub fn register(&mut self, subscriber: Arc<dyn Subscriber<E, Ctx = C, Error = X>>) {
        self.subscribers.push(subscriber);
    }

    /// Run every subscriber in order; the first error aborts dispatch.
    pub fn dispatch(&self, event: &E, ctx: &mut C) -> Result<(), X> {
        for subscriber in &self.subscribers {
            debug!(
                event = event.event_type(),
                subscriber = subscriber.name(),
                "dispatching"
            );
            if let Err(err) = subscriber.on_event(event, ctx) {
                warn!(
                    event = event.event_type(),
                    subscriber = subscriber.name(),
                    error = ?err,
                    "subscriber failed; aborting dispatch"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Ping {
        at: DateTime<Utc>,
    }

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "test.ping"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    struct Recorder {
        label: &'static str,
        seen: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    impl Subscriber<Ping> for Recorder {
        type Ctx = Vec<&'static str>;
        type Error = String;

        fn name(&self) -> &'static str {
            self.label
        }

        fn on_event(&self, _event: &Ping, ctx: &mut Self::Ctx) -> Result<(), Self::Error> {
            self.seen.lock().unwrap().push(self.label);
            ctx.push(self.label);
            if self.fail {
                Err(format!("{} failed", self.label))
            } else {
                Ok(())
            }
        }
    }

    fn recorder(label: &'static str, fail: bool) -> Arc<Recorder> {
        Arc::new(Recorder {
            label,
            seen: Mutex::new(Vec::new()),
            fail,
        })
    }

    #[test]
    fn dispatch_runs_subscribers_in_registration_order() {
        let mut dispatcher: Dispatcher<Ping, Vec<&'static str>, String> = Dispatcher::new();
        dispatcher.register(recorder("first", false));
        dispatcher.register(recorder("second", false));

        let mut ctx = Vec::new();
        dispatcher
            .dispatch(&Ping { at: Utc::now() }, &mut ctx)
            .unwrap();
        assert_eq!(ctx, vec!["first", "second"]);
    }

    #[test]
    fn first_error_stops_dispatch_and_propagates() {
        let mut dispatcher: Dispatcher<Ping, Vec<&'static str>, String> = Dispatcher::new();
        dispatcher.register(recorder("first", true));
        let never_reached = recorder("second", false);
        dispatcher.register(never_reached.clone());

        let mut ctx = Vec::new();
        let err = dispatcher
            .dispatch(&Ping { at: Utc::now() }, &mut ctx)
            .unwrap_err();
        assert_eq!(err, "first failed");
        assert!(never_reached.seen.lock().unwrap().is_empty());
    }
}
