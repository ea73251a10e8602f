//! Transport abstraction
//!
//! The channel manager never talks to a socket directly. It acquires a
//! [`TransportHandle`] from a [`Transport`], subscribes to qualified channel
//! names on it and binds one listener per event type.
//!
//! ```text
//! ChannelManager ──open()──> Transport ──> TransportHandle
//!                                             │  subscribe / bind
//!                                             │  ping
//!                                             └─> TransportSignal queue
//!                                                 (Connected / Disconnected / Error)
//! ```

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Connection-level signal emitted by a transport handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// The socket is up and the server acknowledged the connection
    Connected,
    /// The socket went down
    Disconnected,
    /// A transport-level error; informational only
    Error(String),
}

/// Listener invoked with `(event_type, payload)` for a bound event
pub type EventListener = Arc<dyn Fn(&str, serde_json::Value) + Send + Sync>;

/// Handle returned by [`TransportHandle::bind`], used to unbind a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(pub u64);

/// Source of push connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Acquire a live handle
    ///
    /// Returns `ChannelError::TransportUnavailable` when no connection can be
    /// established right now; the manager schedules a retry.
    async fn open(&self) -> Result<Arc<dyn TransportHandle>>;
}

/// A single push connection
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Whether the underlying socket is still open
    fn is_open(&self) -> bool;

    /// Take the signal queue; returns `None` after the first call
    ///
    /// Signals emitted before this call are buffered, so a `Connected` that
    /// races the subscription is never lost.
    fn take_signals(&self) -> Option<UnboundedReceiver<TransportSignal>>;

    /// Subscribe to a fully qualified channel name
    fn subscribe(&self, channel: &str) -> Result<()>;

    /// Unsubscribe from a fully qualified channel name
    fn unsubscribe(&self, channel: &str) -> Result<()>;

    /// Bind a listener for one event type on a channel
    fn bind(&self, channel: &str, event_type: &str, listener: EventListener) -> BindingId;

    /// Remove a previously bound listener
    fn unbind(&self, channel: &str, binding: BindingId);

    /// Round-trip probe; resolves with the measured latency
    async fn ping(&self) -> Result<Duration>;

    /// Close the connection; idempotent
    fn close(&self);
}
