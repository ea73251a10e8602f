use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between latency probes
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default time allowed for a probe round trip
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Default reconnect budget before the manager halts
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default number of manager events held for pollers
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// A channel to subscribe to and the event types bound on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub event_types: Vec<String>,
}

/// Configuration for a [`ChannelManager`](crate::ChannelManager)
///
/// Holds the tenant identity every channel is scoped to, the channels to
/// subscribe, probe timings and the reconnection strategy.
#[derive(Clone)]
pub struct ChannelConfig {
    pub(crate) tenant_scope: String,
    pub(crate) tenant_id: String,
    pub(crate) channels: Vec<ChannelSpec>,
    pub(crate) ping_interval: Duration,
    pub(crate) ping_timeout: Duration,
    pub(crate) strategy: Arc<dyn ReconnectionStrategy>,
    pub(crate) event_queue_capacity: usize,
}

impl ChannelConfig {
    pub fn new(tenant_scope: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_scope: tenant_scope.into(),
            tenant_id: tenant_id.into(),
            channels: Vec::new(),
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            strategy: Arc::new(ExponentialBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(30),
                Some(DEFAULT_MAX_RETRIES),
            )),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }

    /// Add a channel and the event types to bind on it
    pub fn channel<I, S>(mut self, name: impl Into<String>, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.push(ChannelSpec {
            name: name.into(),
            event_types: event_types.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    /// Events kept for `recv_event` pollers before the oldest are evicted
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// `{tenantScope}.{tenantId}.{channelName}`
    pub fn qualified_name(&self, channel: &str) -> String {
        format!("{}.{}.{}", self.tenant_scope, self.tenant_id, channel)
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        &self.channels
    }

    /// Reject configurations that could never produce a usable subscription
    pub fn validate(&self) -> Result<()> {
        if self.tenant_scope.trim().is_empty() || self.tenant_id.trim().is_empty() {
            return Err(ChannelError::Configuration(
                "tenant scope and tenant id must not be empty".into(),
            ));
        }
        if self.channels.is_empty() {
            return Err(ChannelError::Configuration("at least one channel is required".into()));
        }
        if let Some(spec) = self.channels.iter().find(|c| c.event_types.is_empty()) {
            return Err(ChannelError::Configuration(format!(
                "channel '{}' declares no event types",
                spec.name
            )));
        }
        if self.ping_interval.is_zero() {
            return Err(ChannelError::Configuration("ping interval must be non-zero".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(ChannelError::Configuration("event queue capacity must be non-zero".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("tenant_scope", &self.tenant_scope)
            .field("tenant_id", &self.tenant_id)
            .field("channels", &self.channels)
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("event_queue_capacity", &self.event_queue_capacity)
            .finish()
    }
}
