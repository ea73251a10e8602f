use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type OrderId = u64;
pub type ItemId = u64;

/// Backend ids arrive as numbers or numeric strings depending on the endpoint
fn lenient_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid id {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid id '{}'", s))),
        other => Err(serde::de::Error::custom(format!("invalid id {}", other))),
    }
}

fn default_quantity() -> u32 {
    1
}

/// Preparation status of a single line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[serde(alias = "pending")]
    New,
    #[serde(alias = "preparing", alias = "in_progress")]
    Cooking,
    #[serde(alias = "done")]
    Ready,
    #[serde(alias = "delivered")]
    Served,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::New => "new",
            ItemStatus::Cooking => "cooking",
            ItemStatus::Ready => "ready",
            ItemStatus::Served => "served",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line on a kitchen ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(deserialize_with = "lenient_id")]
    pub id: ItemId,
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub status: ItemStatus,
    /// RFC 3339 instant the kitchen started this item
    #[serde(default)]
    pub cooking_started_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
}

impl OrderItem {
    /// Cooking status without a start time still counts as not started
    pub fn is_unstarted(&self) -> bool {
        match self.status {
            ItemStatus::New => true,
            ItemStatus::Cooking => self.cooking_started_at.is_none(),
            _ => false,
        }
    }
}

/// An order as served by the kitchen endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(deserialize_with = "lenient_id")]
    pub id: OrderId,
    /// Human-facing ticket number
    #[serde(default)]
    pub number: Option<String>,
    pub status: String,
    #[serde(alias = "type", default)]
    pub order_type: String,
    /// RFC 3339 creation instant
    pub created_at: String,
    /// Restaurant-local wall clock (`YYYY-MM-DD HH:MM`), no offset
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub cooking_started_at: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
}

impl Order {
    pub fn item(&self, item_id: ItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: ItemId) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_at.is_some()
    }

    /// Ticket label: number when present, otherwise the id
    pub fn label(&self) -> String {
        self.number
            .clone()
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}
