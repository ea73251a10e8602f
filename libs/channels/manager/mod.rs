//! Channel Manager
//!
//! Maintains one logical push connection per tenant, owns the channel
//! subscriptions, the retry timer and the latency probe.

pub mod manager;
pub mod subscription;

pub use manager::ChannelManager;
pub use subscription::ChannelSubscription;
