//! Common test utilities for channel integration tests
//!
//! Provides an in-memory transport for driving the manager's state machine and
//! a minimal Pusher-speaking websocket server for the real transport.

#![allow(dead_code)]

use async_trait::async_trait;
use channels::*;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Notify};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Poll `cond` every 10ms until it holds, panicking after 5s
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

// ============================================================================
// In-memory transport
// ============================================================================

#[derive(Default)]
pub struct MockTransportState {
    opens: AtomicUsize,
    failures_left: AtomicUsize,
    handles: Mutex<Vec<Arc<MockHandle>>>,
    gate: Mutex<Option<Arc<Notify>>>,
    ping_latency_ms: AtomicU64,
}

/// Transport whose handles are driven by the test
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockTransportState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` opens with `TransportUnavailable`
    pub fn fail_next(&self, n: usize) {
        self.state.failures_left.store(n, Ordering::SeqCst);
    }

    /// Block opens until [`release_gate`](Self::release_gate)
    pub fn hold_opens(&self) {
        *self.state.gate.lock() = Some(Arc::new(Notify::new()));
    }

    pub fn release_gate(&self) {
        if let Some(gate) = self.state.gate.lock().take() {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    pub fn set_ping_latency(&self, latency: Duration) {
        self.state
            .ping_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn handles(&self) -> Vec<Arc<MockHandle>> {
        self.state.handles.lock().clone()
    }

    pub fn last_handle(&self) -> Arc<MockHandle> {
        self.state
            .handles
            .lock()
            .last()
            .cloned()
            .expect("no handle opened yet")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> channels::Result<Arc<dyn TransportHandle>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        let gate = self.state.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failures = self.state.failures_left.load(Ordering::SeqCst);
        if failures > 0 {
            self.state.failures_left.store(failures - 1, Ordering::SeqCst);
            return Err(ChannelError::TransportUnavailable("mock refused".into()));
        }

        let handle = Arc::new(MockHandle::new(Duration::from_millis(
            self.state.ping_latency_ms.load(Ordering::SeqCst),
        )));
        self.state.handles.lock().push(Arc::clone(&handle));
        Ok(handle)
    }
}

/// Records every call the manager makes on it
pub struct MockHandle {
    open: AtomicBool,
    closed: AtomicBool,
    signal_tx: mpsc::UnboundedSender<TransportSignal>,
    signals: Mutex<Option<mpsc::UnboundedReceiver<TransportSignal>>>,
    subscribed: Mutex<Vec<String>>,
    unsubscribed: Mutex<Vec<String>>,
    listeners: Mutex<Vec<(String, String, BindingId, EventListener)>>,
    unbound: Mutex<Vec<BindingId>>,
    next_binding: AtomicU64,
    ping_latency: Duration,
}

impl MockHandle {
    fn new(ping_latency: Duration) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            open: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            signal_tx,
            signals: Mutex::new(Some(signal_rx)),
            subscribed: Mutex::new(Vec::new()),
            unsubscribed: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            unbound: Mutex::new(Vec::new()),
            next_binding: AtomicU64::new(1),
            ping_latency,
        }
    }

    pub fn signal(&self, signal: TransportSignal) {
        let _ = self.signal_tx.send(signal);
    }

    /// Simulate the socket going away without closing the handle
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }

    pub fn unbound_count(&self) -> usize {
        self.unbound.lock().len()
    }

    pub fn bound(&self) -> Vec<(String, String)> {
        self.listeners
            .lock()
            .iter()
            .map(|(channel, event, _, _)| (channel.clone(), event.clone()))
            .collect()
    }

    /// Deliver an event to bound listeners; returns how many were called
    pub fn fire(&self, channel: &str, event_type: &str, payload: Value) -> usize {
        let listeners: Vec<EventListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(c, e, id, _)| c == channel && e == event_type && !self.unbound.lock().contains(id))
            .map(|(_, _, _, listener)| Arc::clone(listener))
            .collect();

        for listener in &listeners {
            listener(event_type, payload.clone());
        }
        listeners.len()
    }
}

#[async_trait]
impl TransportHandle for MockHandle {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<TransportSignal>> {
        self.signals.lock().take()
    }

    fn subscribe(&self, channel: &str) -> channels::Result<()> {
        self.subscribed.lock().push(channel.to_string());
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> channels::Result<()> {
        self.unsubscribed.lock().push(channel.to_string());
        Ok(())
    }

    fn bind(&self, channel: &str, event_type: &str, listener: EventListener) -> BindingId {
        let id = BindingId(self.next_binding.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .push((channel.to_string(), event_type.to_string(), id, listener));
        id
    }

    fn unbind(&self, _channel: &str, binding: BindingId) {
        self.unbound.lock().push(binding);
    }

    async fn ping(&self) -> channels::Result<Duration> {
        if !self.is_open() {
            return Err(ChannelError::ConnectionClosed("mock closed".into()));
        }
        Ok(self.ping_latency)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Pusher websocket server
// ============================================================================

/// A minimal Pusher-protocol server
///
/// Sends `pusher:connection_established` on accept, answers pings, confirms
/// subscriptions and relays frames pushed through [`MockPusherServer::push`].
pub struct MockPusherServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    push_tx: broadcast::Sender<String>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MockPusherServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let (push_tx, _) = broadcast::channel(64);
        let subscriptions = Arc::new(Mutex::new(Vec::new()));

        let shutdown_clone = shutdown.clone();
        let push_clone = push_tx.clone();
        let subscriptions_clone = subscriptions.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                let pushes = push_clone.subscribe();
                                let subscriptions = subscriptions_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown, pushes, subscriptions).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            push_tx,
            subscriptions,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        shutdown: Arc<Notify>,
        mut pushes: broadcast::Receiver<String>,
        subscriptions: Arc<Mutex<Vec<String>>>,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::{accept_async, tungstenite::Message};

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        let established = json!({
            "event": "pusher:connection_established",
            "data": json!({"socket_id": "123.456", "activity_timeout": 120}).to_string(),
        });
        if write.send(Message::Text(established.to_string())).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };
                    let frame: Value = match serde_json::from_str(&text) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };
                    let reply = match frame["event"].as_str() {
                        Some("pusher:ping") => Some(json!({"event": "pusher:pong", "data": {}})),
                        Some("pusher:subscribe") => {
                            let channel = frame["data"]["channel"].as_str().unwrap_or_default().to_string();
                            subscriptions.lock().push(channel.clone());
                            Some(json!({
                                "event": "pusher_internal:subscription_succeeded",
                                "channel": channel,
                                "data": "{}",
                            }))
                        }
                        _ => None,
                    };
                    if let Some(reply) = reply {
                        if write.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                pushed = pushes.recv() => {
                    match pushed {
                        Ok(text) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                _ = shutdown.notified() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/app/test-key?protocol=7", self.addr)
    }

    /// Relay a channel event to every connected client
    pub fn push(&self, channel: &str, event: &str, data: Value) {
        let frame = json!({
            "event": event,
            "channel": channel,
            "data": data.to_string(),
        });
        let _ = self.push_tx.send(frame.to_string());
    }

    /// Channels clients have subscribed to, in order
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }

    /// Close every connection and stop accepting
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockPusherServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Test fixture for configs
pub mod fixtures {
    use channels::{ChannelConfig, ExponentialBackoff};
    use std::time::Duration;

    pub fn kitchen_config() -> ChannelConfig {
        ChannelConfig::new("private", "acme")
            .channel("kitchen", ["OrderCreated", "OrderUpdated"])
            .channel("devices", ["DeviceUpdated"])
            .ping_interval(Duration::from_secs(3600))
            .reconnect_strategy(ExponentialBackoff::new(
                Duration::from_millis(100),
                Duration::from_secs(1),
                Some(3),
            ))
    }
}
