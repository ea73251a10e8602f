//! REST client for the kitchen backend

use super::backend::{OrderBackend, OrderQuery};
use super::envelope::validate_body;
use super::error::RequestFailure;
use crate::domain::{ItemId, ItemStatus, OrderId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Read the body and validate it against the response envelope
async fn read_envelope(response: reqwest::Response) -> Result<Value, RequestFailure> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    validate_body(status, &body)
}

pub struct KitchenApi {
    base_url: String,
    client: Client,
    token: Option<String>,
    device_id: Option<String>,
}

impl KitchenApi {
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.example.com/api`
    /// * `timeout` - per-request timeout; expiry is classified as `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: None,
            device_id: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Device identity sent as `X-Device-Id` on every request
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        match &self.device_id {
            Some(device_id) => req.header("X-Device-Id", device_id),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, RequestFailure> {
        let response = self.authorize(req).send().await?;
        read_envelope(response).await
    }
}

#[async_trait]
impl OrderBackend for KitchenApi {
    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Value, RequestFailure> {
        let url = format!("{}/kitchen/orders", self.base_url);
        debug!("Fetching orders for {} on {} ({})", query.device_id, query.date, query.station);

        let req = self.client.get(&url).query(&[
            ("device_id", query.device_id.as_str()),
            ("date", query.date.as_str()),
            ("station", query.station.as_str()),
        ]);
        self.send(req).await
    }

    async fn update_order_status(&self, order_id: OrderId, status: &str) -> Result<Value, RequestFailure> {
        let url = format!("{}/kitchen/orders/{}/status", self.base_url, order_id);
        debug!("Setting order {} status to {}", order_id, status);

        self.send(self.client.patch(&url).json(&json!({ "status": status })))
            .await
    }

    async fn update_item_status(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        status: ItemStatus,
    ) -> Result<Value, RequestFailure> {
        let url = format!(
            "{}/kitchen/orders/{}/items/{}/status",
            self.base_url, order_id, item_id
        );
        debug!("Setting item {}/{} status to {}", order_id, item_id, status);

        self.send(self.client.patch(&url).json(&json!({ "status": status })))
            .await
    }

    async fn device_status(&self, device_id: &str) -> Result<Value, RequestFailure> {
        let url = format!("{}/devices/{}/status", self.base_url, device_id);
        self.send(self.client.get(&url)).await
    }

    async fn pair_device(&self, code: &str) -> Result<Value, RequestFailure> {
        let url = format!("{}/devices/pair", self.base_url);
        self.send(self.client.post(&url).json(&json!({ "code": code })))
            .await
    }
}
