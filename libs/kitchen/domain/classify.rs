//! Display bucket classification
//!
//! Pure and deterministic. Priority is new > cooking > ready: one unstarted
//! item keeps the whole ticket in the new column.

use super::models::{ItemStatus, Order};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBucket {
    New,
    Cooking,
    Ready,
}

impl DisplayBucket {
    pub const ALL: [DisplayBucket; 3] = [DisplayBucket::New, DisplayBucket::Cooking, DisplayBucket::Ready];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayBucket::New => "new",
            DisplayBucket::Cooking => "cooking",
            DisplayBucket::Ready => "ready",
        }
    }
}

pub fn classify(order: &Order) -> DisplayBucket {
    if order.items.iter().any(|item| item.is_unstarted()) {
        DisplayBucket::New
    } else if order.items.iter().any(|item| item.status == ItemStatus::Cooking) {
        DisplayBucket::Cooking
    } else {
        DisplayBucket::Ready
    }
}
