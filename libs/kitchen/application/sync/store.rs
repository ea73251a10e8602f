//! Order synchronization store
//!
//! Holds the last-known-good order snapshot for one selected date and keeps
//! it current from two sources: periodic pulls through the request executor
//! and realtime deltas arriving on the event bus.
//!
//! ```text
//!  fetch() ──executor (dedupe key)──> replace snapshot ──┐
//!                                                        ├──> detect_new ──> orders.new
//!  bus realtime.event.* ──> RealtimeDelta ──> merge ─────┘
//! ```
//!
//! A failed pull keeps the previous snapshot and records the classified
//! error. Locks are released before anything is published or awaited.

use super::deltas::{RealtimeDelta, EVENT_TYPES};
use super::seen::SeenOrderSet;
use crate::application::event_bus::{topics, EventBus, Subscription};
use crate::domain::{
    classify, parse_scheduled_time, DisplayBucket, ItemId, ItemStatus, Order, OrderId, TimeContext,
    UrgencyLevel, UrgencyPolicy,
};
use crate::infrastructure::client::{
    classify_failure, ClassifiedError, ExecuteOptions, OrderBackend, OrderQuery, RequestExecutor,
    RequestFailure,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct StoreState {
    orders: Vec<Order>,
    seen: SeenOrderSet,
    /// `YYYY-MM-DD` the snapshot belongs to
    date: String,
    /// Pulls awaiting their outcome
    in_flight: usize,
    error: Option<ClassifiedError>,
    /// UI-only overlay, never sent to the backend
    marked_done: HashSet<(OrderId, ItemId)>,
    last_synced: Option<DateTime<Utc>>,
}

impl StoreState {
    fn detect_new(&mut self, fresh: &[Order]) -> Vec<OrderId> {
        fresh
            .iter()
            .filter(|order| self.seen.mark_seen(order.id))
            .map(|order| order.id)
            .collect()
    }

    /// Insert or replace by id; true when the id was not present
    fn upsert(&mut self, order: Order) -> bool {
        match self.orders.iter_mut().find(|existing| existing.id == order.id) {
            Some(existing) => {
                *existing = order;
                false
            }
            None => {
                self.orders.push(order);
                true
            }
        }
    }

    /// Swap in a pulled collection, dropping done marks for orders it no longer holds
    fn replace_orders(&mut self, orders: Vec<Order>) {
        self.marked_done
            .retain(|(order_id, _)| orders.iter().any(|order| order.id == *order_id));
        self.orders = orders;
    }

    fn order_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|order| order.id == order_id)
    }
}

/// Point-in-time copy of the store for rendering or diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub date: String,
    pub orders: Vec<Order>,
    pub loading: bool,
    pub error: Option<ClassifiedError>,
    pub seen_count: usize,
    pub last_synced: Option<DateTime<Utc>>,
}

/// One order placed on the board
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayTicket {
    pub order: Order,
    pub bucket: DisplayBucket,
    pub urgency: UrgencyLevel,
    /// Minutes until the scheduled time (`±9999` on another day)
    pub minutes_until: Option<i64>,
    /// 30-minute slot label of the scheduled time
    pub slot: Option<String>,
    /// Minutes since cooking started
    pub elapsed_minutes: Option<i64>,
    pub done_items: Vec<ItemId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayBoard {
    pub new: Vec<DisplayTicket>,
    pub cooking: Vec<DisplayTicket>,
    pub ready: Vec<DisplayTicket>,
}

impl DisplayBoard {
    pub fn bucket(&self, bucket: DisplayBucket) -> &[DisplayTicket] {
        match bucket {
            DisplayBucket::New => &self.new,
            DisplayBucket::Cooking => &self.cooking,
            DisplayBucket::Ready => &self.ready,
        }
    }

    fn bucket_mut(&mut self, bucket: DisplayBucket) -> &mut Vec<DisplayTicket> {
        match bucket {
            DisplayBucket::New => &mut self.new,
            DisplayBucket::Cooking => &mut self.cooking,
            DisplayBucket::Ready => &mut self.ready,
        }
    }

    pub fn len(&self) -> usize {
        self.new.len() + self.cooking.len() + self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct StoreInner {
    backend: Arc<dyn OrderBackend>,
    executor: Arc<RequestExecutor>,
    bus: EventBus,
    state: RwLock<StoreState>,
}

/// Cheaply cloneable handle to one order store
#[derive(Clone)]
pub struct OrderSyncStore {
    inner: Arc<StoreInner>,
}

/// Accepts either a bare order array or `{"orders": [...]}`
fn decode_orders(data: Value) -> Result<Vec<Order>, ClassifiedError> {
    let list = match data {
        Value::Object(mut map) if map.contains_key("orders") => map.remove("orders").unwrap_or_default(),
        other => other,
    };
    serde_json::from_value(list).map_err(|e| {
        classify_failure(&RequestFailure::Decode {
            status: 200,
            message: e.to_string(),
        })
    })
}

/// Order echoed by a mutation response, if any
fn decode_echoed_order(data: &Value) -> Option<Order> {
    let body = data.get("order").unwrap_or(data);
    serde_json::from_value(body.clone()).ok()
}

/// Earliest recorded cooking start on the ticket
fn cooking_started(order: &Order) -> Option<&str> {
    order.cooking_started_at.as_deref().or_else(|| {
        order
            .items
            .iter()
            .filter_map(|item| item.cooking_started_at.as_deref())
            .min()
    })
}

impl OrderSyncStore {
    /// # Arguments
    /// * `backend` - raw order operations
    /// * `executor` - retry and dedupe policy shared with other callers
    /// * `bus` - where newly discovered orders are announced
    /// * `date` - initial `YYYY-MM-DD` to display
    pub fn new(
        backend: Arc<dyn OrderBackend>,
        executor: Arc<RequestExecutor>,
        bus: EventBus,
        date: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                executor,
                bus,
                state: RwLock::new(StoreState {
                    date: date.into(),
                    ..StoreState::default()
                }),
            }),
        }
    }

    /// Pull the snapshot for the selected date
    ///
    /// Concurrent pulls for the same device, date and station share one
    /// round trip and resolve to the same orders or the same error. Ids not
    /// seen before are announced on `orders.new`.
    pub async fn fetch(&self, device_id: &str, station: &str) -> Result<Vec<Order>, ClassifiedError> {
        let query = OrderQuery {
            device_id: device_id.to_string(),
            date: self.date(),
            station: station.to_string(),
        };
        let options = self.inner.executor.read_options().dedupe(query.dedupe_key());
        let requested_date = query.date.clone();

        self.inner.state.write().in_flight += 1;

        let backend = Arc::clone(&self.inner.backend);
        let outcome = self
            .inner
            .executor
            .execute(
                move || {
                    let backend = Arc::clone(&backend);
                    let query = query.clone();
                    async move { backend.fetch_orders(&query).await }
                },
                options,
            )
            .await
            .and_then(decode_orders);

        let new_ids = {
            let mut state = self.inner.state.write();
            state.in_flight = state.in_flight.saturating_sub(1);

            if state.date != requested_date {
                debug!(
                    "[Sync] Discarding pull for {} (now showing {})",
                    requested_date, state.date
                );
                return outcome;
            }

            match &outcome {
                Ok(orders) => {
                    let new_ids = state.detect_new(orders);
                    debug!(
                        "[Sync] Pulled {} orders for {} ({} new)",
                        orders.len(),
                        requested_date,
                        new_ids.len()
                    );
                    state.replace_orders(orders.clone());
                    state.error = None;
                    state.last_synced = Some(Utc::now());
                    new_ids
                }
                Err(error) => {
                    warn!(
                        "[Sync] Pull for {} failed, keeping {} orders: {}",
                        requested_date,
                        state.orders.len(),
                        error
                    );
                    state.error = Some(error.clone());
                    Vec::new()
                }
            }
        };

        self.publish_new(&new_ids);
        outcome
    }

    /// Report ids not seen before and remember them
    ///
    /// Each id is reported at most once for the lifetime of the store.
    pub fn detect_new(&self, fresh: &[Order]) -> Vec<OrderId> {
        self.inner.state.write().detect_new(fresh)
    }

    fn publish_new(&self, ids: &[OrderId]) {
        if ids.is_empty() {
            return;
        }
        info!("[Sync] {} new order(s): {:?}", ids.len(), ids);
        self.inner.bus.emit(topics::ORDERS_NEW, &json!({ "order_ids": ids }));
    }

    /// Merge one realtime change; returns whether the snapshot changed
    pub fn apply_delta(&self, delta: RealtimeDelta) -> bool {
        let (changed, new_ids) = {
            let mut state = self.inner.state.write();
            match delta {
                RealtimeDelta::OrderUpsert(order) => {
                    let id = order.id;
                    let inserted = state.upsert(order);
                    let new_ids = if inserted {
                        state.seen.mark_seen(id).then(|| vec![id]).unwrap_or_default()
                    } else {
                        Vec::new()
                    };
                    (true, new_ids)
                }
                RealtimeDelta::OrderRemoved(order_id) => {
                    let before = state.orders.len();
                    state.orders.retain(|order| order.id != order_id);
                    state.marked_done.retain(|(done_order, _)| *done_order != order_id);
                    (state.orders.len() != before, Vec::new())
                }
                RealtimeDelta::ItemStatus {
                    order_id,
                    item_id,
                    status,
                    cooking_started_at,
                } => {
                    let item = state
                        .order_mut(order_id)
                        .and_then(|order| order.item_mut(item_id));
                    match item {
                        Some(item) => {
                            item.status = status;
                            if cooking_started_at.is_some() {
                                item.cooking_started_at = cooking_started_at;
                            }
                            (true, Vec::new())
                        }
                        None => {
                            debug!("[Sync] Status for unknown item {}/{}", order_id, item_id);
                            (false, Vec::new())
                        }
                    }
                }
            }
        };

        self.publish_new(&new_ids);
        changed
    }

    /// Subscribe to the realtime topics on `bus`
    ///
    /// Handlers hold only a weak reference; they go quiet once every store
    /// handle is dropped.
    pub fn attach(&self, bus: &EventBus) -> Vec<Subscription> {
        EVENT_TYPES
            .iter()
            .map(|event_type| {
                let store: Weak<StoreInner> = Arc::downgrade(&self.inner);
                let event_type = event_type.to_string();
                bus.on(topics::realtime(&event_type), move |payload| {
                    let Some(inner) = store.upgrade() else {
                        return Ok(());
                    };
                    let delta = RealtimeDelta::parse(&event_type, payload)?;
                    OrderSyncStore { inner }.apply_delta(delta);
                    Ok(())
                })
            })
            .collect()
    }

    pub fn buckets(&self, ctx: &TimeContext, policy: &UrgencyPolicy) -> DisplayBoard {
        self.buckets_at(ctx, policy, Utc::now())
    }

    /// Group orders into display buckets
    ///
    /// Within a bucket, scheduled orders come first by scheduled time, then
    /// everything by creation time, then by id.
    pub fn buckets_at(&self, ctx: &TimeContext, policy: &UrgencyPolicy, now: DateTime<Utc>) -> DisplayBoard {
        let state = self.inner.state.read();

        let mut tickets: Vec<DisplayTicket> = state
            .orders
            .iter()
            .map(|order| {
                let scheduled = order.scheduled_at.as_deref();
                DisplayTicket {
                    bucket: classify(order),
                    urgency: scheduled.map_or(UrgencyLevel::Normal, |s| ctx.urgency_at(s, policy, now)),
                    minutes_until: scheduled.and_then(|s| ctx.minutes_until_at(s, now)),
                    slot: scheduled.and_then(parse_scheduled_time).map(|t| t.slot_key()),
                    elapsed_minutes: cooking_started(order).and_then(|s| ctx.elapsed_minutes_at(s, now)),
                    done_items: order
                        .items
                        .iter()
                        .filter(|item| state.marked_done.contains(&(order.id, item.id)))
                        .map(|item| item.id)
                        .collect(),
                    order: order.clone(),
                }
            })
            .collect();
        drop(state);

        tickets.sort_by_cached_key(|ticket| {
            let scheduled = ticket.order.scheduled_at.as_deref().and_then(parse_scheduled_time);
            (
                scheduled.is_none(),
                scheduled,
                ticket.order.created_at.clone(),
                ticket.order.id,
            )
        });

        let mut board = DisplayBoard::default();
        for ticket in tickets {
            board.bucket_mut(ticket.bucket).push(ticket);
        }
        board
    }

    /// Switch the displayed date, dropping the old snapshot
    ///
    /// The seen set survives so orders already alerted stay quiet.
    pub fn set_date(&self, date: impl Into<String>) {
        let date = date.into();
        let mut state = self.inner.state.write();
        if state.date == date {
            return;
        }
        info!("[Sync] Date {} -> {}", state.date, date);
        state.date = date;
        state.orders.clear();
        state.marked_done.clear();
        state.error = None;
        state.last_synced = None;
    }

    pub fn date(&self) -> String {
        self.inner.state.read().date.clone()
    }

    /// Flip the local done mark; returns the new value
    pub fn toggle_done(&self, order_id: OrderId, item_id: ItemId) -> bool {
        let mut state = self.inner.state.write();
        let key = (order_id, item_id);
        if state.marked_done.remove(&key) {
            false
        } else {
            state.marked_done.insert(key);
            true
        }
    }

    pub fn is_marked_done(&self, order_id: OrderId, item_id: ItemId) -> bool {
        self.inner.state.read().marked_done.contains(&(order_id, item_id))
    }

    /// Change an item's status on the backend, then locally
    ///
    /// Never retried. Starting to cook stamps a local start time when the
    /// backend does not echo the order back.
    pub async fn update_item_status(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        status: ItemStatus,
    ) -> Result<(), ClassifiedError> {
        let backend = Arc::clone(&self.inner.backend);
        let data = self
            .inner
            .executor
            .execute(
                move || {
                    let backend = Arc::clone(&backend);
                    async move { backend.update_item_status(order_id, item_id, status).await }
                },
                ExecuteOptions::mutation(),
            )
            .await?;

        let mut state = self.inner.state.write();
        if let Some(order) = decode_echoed_order(&data).filter(|order| order.id == order_id) {
            state.upsert(order);
            return Ok(());
        }

        match state.order_mut(order_id).and_then(|order| order.item_mut(item_id)) {
            Some(item) => {
                item.status = status;
                if status == ItemStatus::Cooking && item.cooking_started_at.is_none() {
                    item.cooking_started_at = Some(Utc::now().to_rfc3339());
                }
            }
            None => debug!("[Sync] Updated item {}/{} is not on the board", order_id, item_id),
        }
        Ok(())
    }

    /// Change an order's status on the backend, then locally; never retried
    pub async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<(), ClassifiedError> {
        let backend = Arc::clone(&self.inner.backend);
        let remote_status = status.to_string();
        let data = self
            .inner
            .executor
            .execute(
                move || {
                    let backend = Arc::clone(&backend);
                    let status = remote_status.clone();
                    async move { backend.update_order_status(order_id, &status).await }
                },
                ExecuteOptions::mutation(),
            )
            .await?;

        let mut state = self.inner.state.write();
        if let Some(order) = decode_echoed_order(&data).filter(|order| order.id == order_id) {
            state.upsert(order);
        } else if let Some(order) = state.order_mut(order_id) {
            order.status = status.to_string();
        }
        Ok(())
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.inner.state.read();
        StoreSnapshot {
            date: state.date.clone(),
            orders: state.orders.clone(),
            loading: state.in_flight > 0,
            error: state.error.clone(),
            seen_count: state.seen.len(),
            last_synced: state.last_synced,
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        self.inner.state.read().orders.clone()
    }

    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.inner.state.read().orders.iter().find(|o| o.id == order_id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.read().in_flight > 0
    }

    pub fn last_error(&self) -> Option<ClassifiedError> {
        self.inner.state.read().error.clone()
    }
}
