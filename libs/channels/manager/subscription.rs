use crate::traits::{BindingId, TransportHandle};
use tracing::debug;

/// A subscribed channel and the listeners bound on it
///
/// Owned exclusively by the channel manager; rebuilt on every connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSubscription {
    /// Channel name as configured (`kitchen`)
    pub name: String,
    /// Tenant-qualified name (`private.acme.kitchen`)
    pub qualified_name: String,
    /// Event types bound on this channel, with their unbind handles
    pub bindings: Vec<(String, BindingId)>,
}

impl ChannelSubscription {
    pub fn new(name: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            bindings: Vec::new(),
        }
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(event_type, _)| event_type.as_str())
    }

    /// Unbind every listener and unsubscribe the channel
    pub(crate) fn release(&self, handle: &dyn TransportHandle) {
        for (_, binding) in &self.bindings {
            handle.unbind(&self.qualified_name, *binding);
        }
        if let Err(e) = handle.unsubscribe(&self.qualified_name) {
            debug!("[Channels] Unsubscribe from {} failed: {}", self.qualified_name, e);
        }
    }
}
