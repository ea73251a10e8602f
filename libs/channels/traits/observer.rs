use std::time::Duration;

/// An event received on a subscribed channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    /// Fully qualified channel name (`{scope}.{tenant}.{channel}`)
    pub channel: String,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Events queued by the channel manager for its consumers
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    /// Transport reported connected; retry counter is back to zero
    Connected,
    /// Transport reported disconnected
    Disconnected,
    /// A reconnect is scheduled (attempt number, 1-based)
    Reconnecting(u32),
    /// Retry budget spent; no reconnect until `reconnect()` is called
    RetriesExhausted(u32),
    /// Latest latency probe sample
    Latency(Duration),
    /// A bound channel event
    Message(ChannelMessage),
}

/// Synchronous hooks for manager events
///
/// All methods default to no-ops so implementors only override what they need.
/// Hooks run on the manager's task; keep them short.
pub trait ConnectionObserver: Send + Sync {
    fn on_connected(&self) {}

    fn on_disconnected(&self) {}

    fn on_reconnecting(&self, _attempt: u32) {}

    fn on_retries_exhausted(&self, _attempts: u32) {}

    fn on_latency(&self, _latency: Duration) {}

    fn on_message(&self, _message: &ChannelMessage) {}
}

/// Route an event to the matching observer hook
pub fn dispatch(observer: &dyn ConnectionObserver, event: &ManagerEvent) {
    match event {
        ManagerEvent::Connected => observer.on_connected(),
        ManagerEvent::Disconnected => observer.on_disconnected(),
        ManagerEvent::Reconnecting(attempt) => observer.on_reconnecting(*attempt),
        ManagerEvent::RetriesExhausted(attempts) => observer.on_retries_exhausted(*attempts),
        ManagerEvent::Latency(latency) => observer.on_latency(*latency),
        ManagerEvent::Message(message) => observer.on_message(message),
    }
}
