use crate::core::config::ChannelConfig;
use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::core::heartbeat::spawn_latency_probe;
use crate::core::latency::LatencyTracker;
use crate::manager::subscription::ChannelSubscription;
use crate::traits::observer::dispatch;
use crate::traits::*;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Observers = Arc<RwLock<Vec<Arc<dyn ConnectionObserver>>>>;
type EventReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<ManagerEvent>>>;

/// Fans an event out to the observers, then queues it for pollers
///
/// The queue is bounded. When it is full the oldest queued event is evicted
/// to make room; if a poller is mid-receive the new event is dropped instead.
#[derive(Clone)]
struct Notifier {
    event_tx: mpsc::Sender<ManagerEvent>,
    event_rx: EventReceiver,
    dropped: Arc<AtomicU64>,
    observers: Observers,
}

impl Notifier {
    fn notify(&self, event: ManagerEvent) {
        // Snapshot so an observer may register another observer
        let observers: Vec<_> = self.observers.read().iter().cloned().collect();
        for observer in &observers {
            dispatch(observer.as_ref(), &event);
        }
        self.enqueue(event);
    }

    fn enqueue(&self, event: ManagerEvent) {
        let event = match self.event_tx.try_send(event) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Closed(_)) => return,
            Err(mpsc::error::TrySendError::Full(event)) => event,
        };

        if let Ok(mut rx) = self.event_rx.try_lock() {
            let _ = rx.try_recv();
        }
        let _ = self.event_tx.try_send(event);

        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if dropped == 1 || dropped % 1000 == 0 {
            warn!(
                "[Channels] Event queue full ({} slots), {} event(s) dropped so far",
                self.event_tx.max_capacity(),
                dropped
            );
        }
    }
}

/// Realtime channel manager
///
/// State machine:
///
/// ```text
/// idle ──connect()──> connecting ──(transport up)──> connected
///                        ▲                               │
///                        │                       (transport down)
///                  (backoff elapses)                     ▼
///                        └──────────── retrying <── disconnected
///
/// any state ──disconnect()──> destroyed   (until reconnect())
/// ```
///
/// Cloning is cheap; clones share the same connection.
///
/// # Type Parameters
/// - `T`: Transport implementation used to acquire connections
pub struct ChannelManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for ChannelManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T: Transport> {
    config: ChannelConfig,
    transport: T,
    state: AtomicConnectionState,
    destroyed: AtomicBool,
    retry_count: AtomicU32,
    /// Bumped by every connect and by disconnect; stale attempts compare against it
    generation: AtomicU64,
    handle: Mutex<Option<Arc<dyn TransportHandle>>>,
    subscriptions: Mutex<Vec<ChannelSubscription>>,
    retry_timer: Mutex<Option<JoinHandle<()>>>,
    probe: Mutex<Option<JoinHandle<()>>>,
    /// Connection listener consuming transport signals
    lifecycle: Mutex<Option<JoinHandle<()>>>,
    latency: Arc<LatencyTracker>,
    notifier: Notifier,
}

impl<T: Transport> ChannelManager<T> {
    /// Create an idle manager; nothing is dialed until [`connect`](Self::connect)
    pub fn new(config: ChannelConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_queue_capacity);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                state: AtomicConnectionState::new(ConnectionState::Idle),
                destroyed: AtomicBool::new(false),
                retry_count: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                handle: Mutex::new(None),
                subscriptions: Mutex::new(Vec::new()),
                retry_timer: Mutex::new(None),
                probe: Mutex::new(None),
                lifecycle: Mutex::new(None),
                latency: Arc::new(LatencyTracker::new()),
                notifier: Notifier {
                    event_tx,
                    event_rx: Arc::new(tokio::sync::Mutex::new(event_rx)),
                    dropped: Arc::new(AtomicU64::new(0)),
                    observers: Arc::new(RwLock::new(Vec::new())),
                },
            }),
        })
    }

    /// Tear down any previous subscriptions, acquire a transport handle and
    /// subscribe every configured channel
    ///
    /// Returns once subscriptions are sent; the `Connected` event follows when
    /// the transport confirms. If no handle can be acquired a retry is
    /// scheduled and the transport error is returned.
    pub async fn connect(&self) -> Result<()> {
        self.inner.connect().await
    }

    /// Mark the manager destroyed, cancel timers and release the connection
    ///
    /// No reconnection happens until [`reconnect`](Self::reconnect). A connect
    /// already in flight completes, notices the flag and releases its handle.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.destroyed.store(true, Ordering::Release);
        inner.generation.fetch_add(1, Ordering::AcqRel);
        inner.cancel_retry_timer();
        inner.release_connection();
        inner.latency.reset();
        inner.state.set(ConnectionState::Destroyed);
        info!("[Channels] Manager for tenant {} destroyed", inner.config.tenant_id);
    }

    /// Clear the destroyed flag and the retry counter, then connect again
    pub async fn reconnect(&self) -> Result<()> {
        let inner = &self.inner;
        inner.destroyed.store(false, Ordering::Release);
        inner.retry_count.store(0, Ordering::Release);
        inner.cancel_retry_timer();
        info!("[Channels] Forced reconnect for tenant {}", inner.config.tenant_id);
        inner.connect().await
    }

    /// Unsubscribe every channel, stop the probe and unbind connection
    /// listeners
    ///
    /// The socket itself stays up until the next [`connect`](Self::connect)
    /// or [`disconnect`](Self::disconnect); with its listener gone the
    /// manager no longer tracks it and reports `Disconnected`. Transport
    /// calls are skipped when the socket is no longer open. Idempotent.
    pub fn cleanup(&self) {
        let inner = &self.inner;
        inner.release_channels();
        inner.latency.reset();
        if matches!(
            inner.state.get(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            inner.state.set(ConnectionState::Disconnected);
            debug!("[Channels] Channels released for tenant {}", inner.config.tenant_id);
        }
    }

    /// Register a synchronous observer for manager events
    pub fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) {
        self.inner.notifier.observers.write().push(observer);
    }

    /// Try to receive a queued event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ManagerEvent> {
        self.inner.notifier.event_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Wait for the next queued event
    pub async fn recv_event(&self) -> Option<ManagerEvent> {
        self.inner.notifier.event_rx.lock().await.recv().await
    }

    /// Events waiting in the queue
    pub fn queued_events(&self) -> usize {
        let tx = &self.inner.notifier.event_tx;
        tx.max_capacity() - tx.capacity()
    }

    /// Events evicted or discarded because the queue was full
    pub fn dropped_events(&self) -> u64 {
        self.inner.notifier.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Reconnect attempts since the last successful connection
    #[inline]
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::Acquire)
    }

    /// Latest latency probe sample while connected
    pub fn latency(&self) -> Option<Duration> {
        self.inner.latency.last()
    }

    /// Current subscriptions (empty while disconnected)
    pub fn subscriptions(&self) -> Vec<ChannelSubscription> {
        self.inner.subscriptions.lock().clone()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }
}

impl<T: Transport> Inner<T> {
    /// Boxed so the retry timer can call back into connect without a
    /// recursive future type
    fn connect(self: &Arc<Self>) -> BoxFuture<'static, Result<()>> {
        let this = Arc::clone(self);
        Box::pin(async move { this.establish().await })
    }

    async fn establish(self: Arc<Self>) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(ChannelError::Destroyed);
        }

        self.release_connection();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.set(ConnectionState::Connecting);
        debug!(
            "[Channels] Connecting tenant {} (retry {})",
            self.config.tenant_id,
            self.retry_count.load(Ordering::Acquire)
        );

        let opened = self.transport.open().await;

        // Re-check after the await: disconnect() or a newer connect may have run
        if self.destroyed.load(Ordering::Acquire) {
            if let Ok(handle) = opened {
                debug!("[Channels] Destroyed while connecting, releasing transport");
                handle.close();
            }
            return Err(ChannelError::Destroyed);
        }
        if self.generation.load(Ordering::Acquire) != generation {
            if let Ok(handle) = opened {
                handle.close();
            }
            return Err(ChannelError::Superseded);
        }

        let handle = match opened {
            Ok(handle) => handle,
            Err(e) => {
                warn!("[Channels] Transport unavailable: {}", e);
                self.state.set(ConnectionState::Disconnected);
                self.schedule_retry();
                return Err(e);
            }
        };

        let signals = handle.take_signals();
        let subscriptions = self.subscribe_all(handle.as_ref());
        info!(
            "[Channels] Subscribed {} channel(s) for tenant {}",
            subscriptions.len(),
            self.config.tenant_id
        );
        *self.subscriptions.lock() = subscriptions;
        *self.handle.lock() = Some(handle);

        match signals {
            Some(signals) => self.spawn_lifecycle(signals, generation),
            None => warn!("[Channels] Transport handle exposed no signal queue"),
        }

        Ok(())
    }

    fn subscribe_all(&self, handle: &dyn TransportHandle) -> Vec<ChannelSubscription> {
        let mut subscriptions = Vec::with_capacity(self.config.channels.len());

        for spec in &self.config.channels {
            let qualified = self.config.qualified_name(&spec.name);
            if let Err(e) = handle.subscribe(&qualified) {
                warn!("[Channels] {}", e);
                continue;
            }

            let mut subscription = ChannelSubscription::new(spec.name.clone(), qualified.clone());
            for event_type in &spec.event_types {
                let binding = handle.bind(&qualified, event_type, self.listener(&qualified));
                subscription.bindings.push((event_type.clone(), binding));
            }
            debug!(
                "[Channels] {} bound to {:?}",
                qualified,
                subscription.event_types().collect::<Vec<_>>()
            );
            subscriptions.push(subscription);
        }

        subscriptions
    }

    fn listener(&self, channel: &str) -> EventListener {
        let notifier = self.notifier.clone();
        let channel = channel.to_string();
        Arc::new(move |event_type: &str, payload: serde_json::Value| {
            notifier.notify(ManagerEvent::Message(ChannelMessage {
                channel: channel.clone(),
                event_type: event_type.to_string(),
                payload,
            }));
        })
    }

    /// Consume transport signals; connected/disconnected drive the state
    /// machine, errors are only logged
    fn spawn_lifecycle(
        self: &Arc<Self>,
        mut signals: mpsc::UnboundedReceiver<TransportSignal>,
        generation: u64,
    ) {
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let Some(this) = weak.upgrade() else { break };
                if this.generation.load(Ordering::Acquire) != generation {
                    break;
                }
                match signal {
                    TransportSignal::Connected => this.handle_connected(),
                    TransportSignal::Disconnected => this.handle_disconnected(),
                    TransportSignal::Error(e) => warn!("[Channels] Transport error: {}", e),
                }
            }
        });

        if let Some(previous) = self.lifecycle.lock().replace(task) {
            previous.abort();
        }
    }

    fn handle_connected(&self) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }

        self.retry_count.store(0, Ordering::Release);
        self.cancel_retry_timer();
        self.state.set(ConnectionState::Connected);
        self.start_probe();

        info!("[Channels] Connected for tenant {}", self.config.tenant_id);
        self.notifier.notify(ManagerEvent::Connected);
    }

    fn handle_disconnected(self: &Arc<Self>) {
        self.stop_probe();
        self.latency.reset();

        if self.destroyed.load(Ordering::Acquire) {
            return;
        }

        self.state.set(ConnectionState::Disconnected);
        warn!("[Channels] Disconnected from tenant {}", self.config.tenant_id);
        self.notifier.notify(ManagerEvent::Disconnected);
        self.schedule_retry();
    }

    fn schedule_retry(self: &Arc<Self>) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }

        let attempt = self.retry_count.load(Ordering::Acquire);
        let Some(delay) = self.config.strategy.next_delay(attempt) else {
            warn!(
                "[Channels] Retry budget exhausted after {} attempts, waiting for reconnect()",
                attempt
            );
            self.state.set(ConnectionState::Disconnected);
            self.notifier.notify(ManagerEvent::RetriesExhausted(attempt));
            return;
        };

        let attempt = attempt + 1;
        self.retry_count.store(attempt, Ordering::Release);
        self.state.set(ConnectionState::Retrying);
        info!("[Channels] Reconnecting in {:?} (attempt {})", delay, attempt);
        self.notifier.notify(ManagerEvent::Reconnecting(attempt));

        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(this) = weak.upgrade() else { return };
            if this.destroyed.load(Ordering::Acquire) {
                return;
            }
            // Leave the slot so the connected transition does not abort this task
            this.retry_timer.lock().take();

            if let Err(e) = this.connect().await {
                debug!("[Channels] Scheduled reconnect failed: {}", e);
            }
        });

        if let Some(previous) = self.retry_timer.lock().replace(timer) {
            previous.abort();
        }
    }

    fn cancel_retry_timer(&self) {
        if let Some(timer) = self.retry_timer.lock().take() {
            timer.abort();
        }
    }

    fn start_probe(&self) {
        self.stop_probe();

        let Some(handle) = self.handle.lock().clone() else {
            return;
        };
        let latency = Arc::clone(&self.latency);
        let notifier = self.notifier.clone();

        let task = spawn_latency_probe(
            handle,
            self.config.ping_interval,
            self.config.ping_timeout,
            move |sample| {
                latency.record(sample);
                notifier.notify(ManagerEvent::Latency(sample));
            },
        );
        *self.probe.lock() = Some(task);
    }

    fn stop_probe(&self) {
        if let Some(probe) = self.probe.lock().take() {
            probe.abort();
        }
    }

    /// Unbind and unsubscribe every channel; the handle stays in its slot
    fn release_channels(&self) {
        if let Some(lifecycle) = self.lifecycle.lock().take() {
            lifecycle.abort();
        }
        self.stop_probe();

        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        let Some(handle) = self.handle.lock().clone() else {
            return;
        };

        if handle.is_open() {
            for subscription in &subscriptions {
                subscription.release(handle.as_ref());
            }
        } else if !subscriptions.is_empty() {
            debug!(
                "[Channels] Socket not open, skipping unsubscribe of {} channel(s)",
                subscriptions.len()
            );
        }
    }

    /// Release the channels, then close the socket
    fn release_connection(&self) {
        self.release_channels();
        if let Some(handle) = self.handle.lock().take() {
            handle.close();
        }
    }
}

impl<T: Transport> Drop for Inner<T> {
    fn drop(&mut self) {
        for slot in [&self.retry_timer, &self.probe, &self.lifecycle] {
            if let Some(task) = slot.lock().take() {
                task.abort();
            }
        }
        if let Some(handle) = self.handle.lock().take() {
            handle.close();
        }
    }
}
