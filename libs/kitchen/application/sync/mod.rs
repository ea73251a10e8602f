pub mod bridge;
pub mod deltas;
pub mod seen;
pub mod store;

pub use bridge::{forward, BusBridge};
pub use deltas::{DeltaError, RealtimeDelta};
pub use seen::SeenOrderSet;
pub use store::{DisplayBoard, DisplayTicket, OrderSyncStore, StoreSnapshot};
