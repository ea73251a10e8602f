use super::error::RequestFailure;
use crate::domain::{ItemId, ItemStatus, OrderId};
use async_trait::async_trait;
use serde_json::Value;

/// Parameters of an order snapshot pull
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderQuery {
    pub device_id: String,
    /// `YYYY-MM-DD` in the restaurant's zone
    pub date: String,
    pub station: String,
}

impl OrderQuery {
    /// `orders-{device}-{date}-{station}`
    pub fn dedupe_key(&self) -> String {
        format!("orders-{}-{}-{}", self.device_id, self.date, self.station)
    }
}

/// Raw backend operations
///
/// Each call is a single attempt returning the validated envelope `data`;
/// retries and deduplication belong to the executor.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Value, RequestFailure>;

    async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<Value, RequestFailure>;

    async fn update_item_status(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        status: ItemStatus,
    ) -> Result<Value, RequestFailure>;

    async fn device_status(&self, device_id: &str) -> Result<Value, RequestFailure>;

    async fn pair_device(&self, code: &str) -> Result<Value, RequestFailure>;
}
