//! # Channel Traits
//!
//! Core traits and types shared by the channel manager and its transports:
//!
//! - **Transport / TransportHandle**: acquire a push connection, subscribe, bind listeners
//! - **ReconnectionStrategy**: control retry delays and the retry budget
//! - **ConnectionObserver**: synchronous hooks for lifecycle and channel events
//! - **WsMessage / PusherFrame**: wire-level message types

pub mod error;
pub mod observer;
pub mod parser;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{ChannelError, Result};
pub use observer::{ChannelMessage, ConnectionObserver, ManagerEvent};
pub use parser::{PusherFrame, WsMessage};
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
pub use transport::{BindingId, EventListener, Transport, TransportHandle, TransportSignal};
