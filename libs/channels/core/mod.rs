//! Core building blocks: configuration, connection state, latency probing and
//! the Pusher websocket transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use channels::{ChannelConfig, ChannelManager, ExponentialBackoff, PusherTransport};
//!
//! let config = ChannelConfig::new("private", "tenant-42")
//!     .channel("kitchen", ["OrderCreated", "OrderUpdated"])
//!     .reconnect_strategy(ExponentialBackoff::new(
//!         Duration::from_secs(1),
//!         Duration::from_secs(30),
//!         Some(10),
//!     ));
//!
//! let manager = ChannelManager::new(config, PusherTransport::new("wss://push.example.com/app/key"))?;
//! manager.connect().await?;
//!
//! while let Some(event) = manager.recv_event().await {
//!     println!("Event: {:?}", event);
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod latency;

pub use client::{PusherHandle, PusherTransport};
pub use config::{ChannelConfig, ChannelSpec};
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use latency::LatencyTracker;
