//! Channel manager to event bus bridge
//!
//! Republishes manager events as bus topics so the store and UI
//! collaborators never touch the transport directly.

use crate::application::event_bus::{topics, EventBus};
use channels::{ChannelMessage, ConnectionObserver, ManagerEvent};
use serde_json::json;
use std::time::Duration;

/// Publish one manager event; returns how many handlers ran
pub fn forward(event: &ManagerEvent, bus: &EventBus) -> usize {
    match event {
        ManagerEvent::Message(message) => bus.emit(&topics::realtime(&message.event_type), &message.payload),
        ManagerEvent::Connected => bus.emit(topics::CONNECTION, &json!({ "status": "connected" })),
        ManagerEvent::Disconnected => bus.emit(topics::CONNECTION, &json!({ "status": "disconnected" })),
        ManagerEvent::Reconnecting(attempt) => bus.emit(
            topics::CONNECTION,
            &json!({ "status": "reconnecting", "attempt": attempt }),
        ),
        ManagerEvent::RetriesExhausted(attempts) => bus.emit(
            topics::CONNECTION,
            &json!({ "status": "halted", "attempts": attempts }),
        ),
        ManagerEvent::Latency(latency) => {
            bus.emit(topics::LATENCY, &json!({ "ms": latency.as_millis() as u64 }))
        }
    }
}

/// Observer that forwards every manager hook onto a bus
#[derive(Clone)]
pub struct BusBridge {
    bus: EventBus,
}

impl BusBridge {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl ConnectionObserver for BusBridge {
    fn on_connected(&self) {
        forward(&ManagerEvent::Connected, &self.bus);
    }

    fn on_disconnected(&self) {
        forward(&ManagerEvent::Disconnected, &self.bus);
    }

    fn on_reconnecting(&self, attempt: u32) {
        forward(&ManagerEvent::Reconnecting(attempt), &self.bus);
    }

    fn on_retries_exhausted(&self, attempts: u32) {
        forward(&ManagerEvent::RetriesExhausted(attempts), &self.bus);
    }

    fn on_latency(&self, latency: Duration) {
        forward(&ManagerEvent::Latency(latency), &self.bus);
    }

    fn on_message(&self, message: &ChannelMessage) {
        self.bus.emit(&topics::realtime(&message.event_type), &message.payload);
    }
}
