//! # Channels
//!
//! Tenant-scoped realtime channel client for kitchen display terminals.
//!
//! ## Features
//!
//! - **One logical connection per tenant**: channels are qualified as
//!   `{tenantScope}.{tenantId}.{channelName}`
//! - **Bounded reconnection**: exponential backoff with jitter, halting after
//!   the configured attempt budget until an explicit `reconnect()`
//! - **Pluggable transport**: the [`Transport`] trait decouples the manager from
//!   the wire; [`PusherTransport`] speaks the Pusher channel protocol
//! - **Message passing**: lifecycle and channel events are queued as
//!   [`ManagerEvent`]s and fanned out to registered [`ConnectionObserver`]s

pub mod traits;
pub mod core;
pub mod manager;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use crate::core::{
    client::{PusherHandle, PusherTransport},
    config::{ChannelConfig, ChannelSpec},
    connection_state::{AtomicConnectionState, ConnectionState},
    latency::LatencyTracker,
};

// Re-export manager
pub use manager::{ChannelManager, ChannelSubscription};

/// Type alias for Result with ChannelError
pub type Result<T> = std::result::Result<T, traits::ChannelError>;
