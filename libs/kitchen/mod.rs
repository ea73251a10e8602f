//! Kitchen Display Sync
//!
//! Order model, display classification, time and urgency engine, backend
//! access with retries and deduplication, and the order synchronization
//! store that keeps a kitchen terminal current.

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used items
pub use application::{
    BusBridge, DisplayBoard, DisplayTicket, EventBus, OrderSyncStore, RealtimeDelta, StoreSnapshot,
    Subscription,
};
pub use domain::{
    classify, DisplayBucket, ItemStatus, Order, OrderId, OrderItem, TimeContext, UrgencyLevel,
    UrgencyPolicy,
};
pub use infrastructure::{
    init_tracing, ClassifiedError, ErrorCode, ExecuteOptions, KitchenApi, KitchenConfig, LocalState,
    OrderBackend, OrderQuery, RequestExecutor, RequestFailure, ShutdownManager,
};
