//! Domain Layer
//!
//! Pure order entities, bucket classification and the time & urgency engine.
//! This layer has no dependencies on infrastructure or application layers.

pub mod classify;
pub mod models;
pub mod timing;

pub use classify::{classify, DisplayBucket};
pub use models::{ItemId, ItemStatus, Order, OrderId, OrderItem};
pub use timing::{
    parse_scheduled_time, time_slot_key, ScheduledTime, TimeContext, TimeError, UrgencyLevel,
    UrgencyPolicy, WallClock, DIFFERENT_DAY_MINUTES,
};
