//! Application Layer
//!
//! Contains the event bus and the order synchronization use cases.
//! This layer depends on domain and infrastructure layers.

pub mod event_bus;
pub mod sync;

pub use event_bus::{topics, EventBus, Handler, HandlerId, Subscription};

// Re-export sync services
pub use sync::{
    BusBridge, DeltaError, DisplayBoard, DisplayTicket, OrderSyncStore, RealtimeDelta, SeenOrderSet,
    StoreSnapshot,
};
