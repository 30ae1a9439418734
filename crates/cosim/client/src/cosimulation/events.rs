use std::panic::{catch_unwind, AssertUnwindSafe};

use cosim_shared::model::SimulationEvent;
use tracing::warn;

use super::panic_message;

pub type SimulationEventHandler =
    Box<dyn FnMut(&SimulationEvent) -> anyhow::Result<()> + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Outcome of delivering events to every subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered subscriber list. Handlers run in subscription order on the calling thread.
#[derive(Default)]
pub struct SimulationEventHandlers {
    handlers: Vec<(SubscriptionId, SimulationEventHandler)>,
    next_id: u64,
}

impl std::fmt::Debug for SimulationEventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEventHandlers")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl SimulationEventHandlers {
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&SimulationEvent) -> anyhow::Result<()> + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Delivers one event to every handler. A failing or panicking handler is logged
    /// and skipped; the remaining handlers still receive the event.
    pub fn dispatch(&mut self, event: &SimulationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (id, handler) in &mut self.handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(
                        subscription = id.0,
                        event = %event.name,
                        event_type = %event.event_type,
                        error = %err,
                        "event handler failed"
                    );
                }
                Err(payload) => {
                    report.failed += 1;
                    warn!(
                        subscription = id.0,
                        event = %event.name,
                        event_type = %event.event_type,
                        panic = %panic_message(payload.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
        report
    }

    /// Delivers `events` in order; each event reaches all handlers before the next one.
    pub fn dispatch_all(&mut self, events: &[SimulationEvent]) -> DeliveryReport {
        events.iter().fold(DeliveryReport::default(), |mut total, event| {
            let report = self.dispatch(event);
            total.delivered += report.delivered;
            total.failed += report.failed;
            total
        })
    }
}
