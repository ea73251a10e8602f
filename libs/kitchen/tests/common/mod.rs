//! Common test utilities for kitchen integration tests
//!
//! Provides an in-memory order backend and order fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use channels::ExponentialBackoff;
use kitchen::domain::{ItemId, ItemStatus, OrderId};
use kitchen::infrastructure::{OrderBackend, OrderQuery, RequestExecutor, RequestFailure};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Executor with short, jitter-free delays
pub fn test_executor(read_retries: u32) -> Arc<RequestExecutor> {
    let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), None)
        .with_jitter(0.0);
    Arc::new(RequestExecutor::new(backoff, read_retries))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    OrderStatus(OrderId, String),
    ItemStatus(OrderId, ItemId, ItemStatus),
}

/// Scripted backend
///
/// `fetch_orders` serves queued failures first, then the current orders.
#[derive(Default)]
pub struct MockBackend {
    orders: Mutex<Value>,
    failures: Mutex<VecDeque<RequestFailure>>,
    mutation_failures: Mutex<VecDeque<RequestFailure>>,
    mutation_reply: Mutex<Value>,
    delay: Mutex<Option<Duration>>,
    fetch_calls: AtomicUsize,
    queries: Mutex<Vec<OrderQuery>>,
    mutations: Mutex<Vec<Mutation>>,
}

impl MockBackend {
    pub fn new(orders: Value) -> Arc<Self> {
        let backend = Self::default();
        *backend.orders.lock() = orders;
        Arc::new(backend)
    }

    pub fn set_orders(&self, orders: Value) {
        *self.orders.lock() = orders;
    }

    pub fn fail_next(&self, failure: RequestFailure) {
        self.failures.lock().push_back(failure);
    }

    pub fn fail_next_mutation(&self, failure: RequestFailure) {
        self.mutation_failures.lock().push_back(failure);
    }

    /// Data returned by successful mutations (null by default)
    pub fn set_mutation_reply(&self, reply: Value) {
        *self.mutation_reply.lock() = reply;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<OrderQuery> {
        self.queries.lock().clone()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn mutate(&self, mutation: Mutation) -> Result<Value, RequestFailure> {
        self.mutations.lock().push(mutation);
        match self.mutation_failures.lock().pop_front() {
            Some(failure) => Err(failure),
            None => Ok(self.mutation_reply.lock().clone()),
        }
    }
}

#[async_trait]
impl OrderBackend for MockBackend {
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Value, RequestFailure> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.clone());
        self.pause().await;

        let failure = self.failures.lock().pop_front();
        match failure {
            Some(failure) => Err(failure),
            None => Ok(self.orders.lock().clone()),
        }
    }

    async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<Value, RequestFailure> {
        self.mutate(Mutation::OrderStatus(order_id, status.to_string()))
    }

    async fn update_item_status(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        status: ItemStatus,
    ) -> Result<Value, RequestFailure> {
        self.mutate(Mutation::ItemStatus(order_id, item_id, status))
    }

    async fn device_status(&self, device_id: &str) -> Result<Value, RequestFailure> {
        Ok(json!({ "device_id": device_id, "active": true }))
    }

    async fn pair_device(&self, code: &str) -> Result<Value, RequestFailure> {
        Ok(json!({ "device_id": format!("dev-{}", code) }))
    }
}

pub mod fixtures {
    //! Order payloads as the backend sends them

    use serde_json::{json, Value};

    pub fn item(id: u64, status: &str, cooking_started_at: Option<&str>) -> Value {
        json!({
            "id": id,
            "name": format!("item-{}", id),
            "quantity": 1,
            "status": status,
            "cooking_started_at": cooking_started_at,
        })
    }

    pub fn order(id: u64, created_at: &str, items: Vec<Value>) -> Value {
        json!({
            "id": id,
            "status": "open",
            "type": "dine_in",
            "created_at": created_at,
            "items": items,
        })
    }

    pub fn scheduled_order(id: u64, created_at: &str, scheduled_at: &str, items: Vec<Value>) -> Value {
        let mut order = order(id, created_at, items);
        order["scheduled_at"] = json!(scheduled_at);
        order
    }

    /// Order 7 with a cooking item that has not actually started
    pub fn order_seven() -> Value {
        order(7, "2024-01-15T11:50:00Z", vec![item(1, "cooking", None)])
    }

    pub fn lunch_service() -> Value {
        json!([
            order_seven(),
            order(8, "2024-01-15T11:40:00Z", vec![item(2, "cooking", Some("2024-01-15T11:45:00Z"))]),
            order(9, "2024-01-15T11:30:00Z", vec![item(3, "ready", None)]),
        ])
    }
}
