//! In-process publish/subscribe
//!
//! Delivery is synchronous in the caller's turn. `emit` snapshots the handler
//! list first, so handlers may subscribe or unsubscribe while being called
//! without affecting the current delivery. A handler that errors or panics is
//! logged and skipped; the rest still run.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Well-known topics
pub mod topics {
    /// Orders surfaced as new for the first time; `{"order_ids": [..]}`
    pub const ORDERS_NEW: &str = "orders.new";
    /// Realtime connection status changes; `{"status": .., ..}`
    pub const CONNECTION: &str = "realtime.connection";
    /// Latest latency probe; `{"ms": ..}`
    pub const LATENCY: &str = "realtime.latency";

    /// Topic a realtime channel event is republished on
    pub fn realtime(event_type: &str) -> String {
        format!("realtime.event.{}", event_type)
    }
}

pub type Handler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
struct BusInner {
    handlers: RwLock<HashMap<String, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

/// Cheaply cloneable handle to one bus
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Returned by [`EventBus::on`]; keeps no strong reference to the bus
#[derive(Debug, Clone)]
pub struct Subscription {
    topic: String,
    id: HandlerId,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Remove the handler; false if it was already gone
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => EventBus { inner }.off(&self.topic, self.id),
            None => false,
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        self.inner
            .handlers
            .write()
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            topic,
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove one handler, dropping the topic once it has none left
    pub fn off(&self, topic: &str, id: HandlerId) -> bool {
        let mut handlers = self.inner.handlers.write();
        let Some(bound) = handlers.get_mut(topic) else {
            return false;
        };

        let before = bound.len();
        bound.retain(|(handler_id, _)| *handler_id != id);
        let removed = bound.len() != before;

        if bound.is_empty() {
            handlers.remove(topic);
        }
        removed
    }

    /// Deliver `data` to every handler registered at call time
    ///
    /// Returns how many handlers completed successfully.
    pub fn emit(&self, topic: &str, data: &Value) -> usize {
        let snapshot: Vec<Handler> = match self.inner.handlers.read().get(topic) {
            Some(bound) => bound.iter().map(|(_, handler)| Arc::clone(handler)).collect(),
            None => {
                debug!("No handlers for {}", topic);
                return 0;
            }
        };

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => error!("Handler for {} failed: {:#}", topic, e),
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Handler for {} panicked: {}", topic, reason);
                }
            }
        }
        delivered
    }

    pub fn clear(&self) {
        self.inner.handlers.write().clear();
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.inner.handlers.read().get(topic).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_multiple_handlers_receive() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            bus.on("orders.new", move |data| {
                seen.lock().push(format!("{}:{}", tag, data["id"]));
                Ok(())
            });
        }

        assert_eq!(bus.emit("orders.new", &json!({"id": 7})), 2);
        let mut seen = seen.lock().clone();
        seen.sort();
        assert_eq!(seen, vec!["a:7", "b:7"]);
    }

    #[test]
    fn test_failing_handlers_do_not_block_others() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));

        bus.on("t", |_| anyhow::bail!("boom"));
        bus.on("t", |_| panic!("handler exploded"));
        let counter = Arc::clone(&hits);
        bus.on("t", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(bus.emit("t", &Value::Null), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_semantics() {
        let bus = EventBus::new();
        let late_hits = Arc::new(AtomicU64::new(0));

        let registrar = bus.clone();
        let counter = Arc::clone(&late_hits);
        bus.on("t", move |_| {
            let counter = Arc::clone(&counter);
            registrar.on("t", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        // The handler added during delivery only sees the next emit
        assert_eq!(bus.emit("t", &Value::Null), 1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.handler_count("t"), 2);

        bus.emit("t", &Value::Null);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_frees_topic() {
        let bus = EventBus::new();
        let first = bus.on("t", |_| Ok(()));
        let second = bus.on("t", |_| Ok(()));

        assert!(bus.off("t", first.id()));
        assert!(!bus.off("t", first.id()));
        assert_eq!(bus.handler_count("t"), 1);

        assert!(second.unsubscribe());
        assert_eq!(bus.handler_count("t"), 0);
        assert_eq!(bus.emit("t", &Value::Null), 0);
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();
        let sub = bus.on("a", |_| Ok(()));
        bus.on("b", |_| Ok(()));

        bus.clear();
        assert_eq!(bus.handler_count("a"), 0);
        assert_eq!(bus.handler_count("b"), 0);
        assert!(!sub.unsubscribe());
    }
}
