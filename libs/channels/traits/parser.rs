use crate::error::{ChannelError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw WebSocket payload, text or binary
#[derive(Debug, Clone)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }
}

/// One Pusher protocol frame
///
/// `data` arrives either as an object or as a JSON-encoded string depending on
/// the server; [`PusherFrame::payload`] normalizes both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PusherFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl PusherFrame {
    /// Parse a frame from a raw WebSocket message
    pub fn parse(message: &WsMessage) -> Result<Self> {
        let text = message
            .as_text()
            .ok_or_else(|| ChannelError::ParseError("binary frame".into()))?;
        serde_json::from_str(text).map_err(|e| ChannelError::ParseError(e.to_string()))
    }

    /// Build a client frame with an object payload
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            channel: None,
            data,
        }
    }

    /// Decoded payload; string-encoded JSON is unwrapped
    pub fn payload(&self) -> Value {
        match &self.data {
            Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| self.data.clone()),
            other => other.clone(),
        }
    }

    pub fn to_text(&self) -> String {
        // Serializing a struct of String/Value cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_message(&self) -> WsMessage {
        WsMessage::Text(self.to_text())
    }

    /// Whether this is a protocol frame rather than an application event
    pub fn is_protocol(&self) -> bool {
        self.event.starts_with("pusher:") || self.event.starts_with("pusher_internal:")
    }
}
