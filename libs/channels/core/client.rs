//! Pusher protocol transport over tokio-tungstenite
//!
//! Each [`PusherTransport::open`] dials a fresh socket and returns a
//! [`PusherHandle`]. The handle owns two tasks:
//!
//! - a writer draining an unbounded queue of outbound frames into the socket
//! - a reader decoding inbound frames, answering server pings, resolving
//!   pending probes and dispatching channel events to bound listeners
//!
//! When the reader observes the end of the stream it marks the handle closed
//! and emits [`TransportSignal::Disconnected`]. A handle is never reused; the
//! manager opens a new one on reconnect.

use crate::traits::*;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Dials Pusher-compatible websocket endpoints
#[derive(Debug, Clone)]
pub struct PusherTransport {
    url: String,
}

impl PusherTransport {
    /// # Arguments
    /// * `url` - full websocket URL, e.g. `wss://host/app/{key}?protocol=7`
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Transport for PusherTransport {
    async fn open(&self) -> Result<Arc<dyn TransportHandle>> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChannelError::TransportUnavailable(e.to_string()))?;

        info!("[Channels] Socket opened to {}", self.url);

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            open: AtomicBool::new(true),
            listeners: RwLock::new(HashMap::new()),
            next_binding: AtomicU64::new(1),
            pending_pong: Mutex::new(None),
            socket_id: RwLock::new(None),
            out_tx,
            signal_tx,
        });

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    debug!("[Channels] Write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Some(msg) = read.next().await {
                    match msg {
                        Ok(Message::Text(text)) => shared.handle_frame(&WsMessage::Text(text)),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            let _ = shared.signal_tx.send(TransportSignal::Error(e.to_string()));
                            break;
                        }
                    }
                }

                shared.open.store(false, Ordering::Release);
                warn!("[Channels] Socket stream ended");
                let _ = shared.signal_tx.send(TransportSignal::Disconnected);
            })
        };

        // The writer exits on its own once every sender is gone
        drop(writer);

        Ok(Arc::new(PusherHandle {
            shared,
            signals: Mutex::new(Some(signal_rx)),
            reader: Mutex::new(Some(reader)),
        }))
    }
}

type ListenerMap = HashMap<(String, String), Vec<(BindingId, EventListener)>>;

/// State shared between a handle and its reader task
struct Shared {
    open: AtomicBool,
    listeners: RwLock<ListenerMap>,
    next_binding: AtomicU64,
    pending_pong: Mutex<Option<oneshot::Sender<()>>>,
    socket_id: RwLock<Option<String>>,
    out_tx: mpsc::UnboundedSender<Message>,
    signal_tx: mpsc::UnboundedSender<TransportSignal>,
}

impl Shared {
    fn send_frame(&self, frame: PusherFrame) -> Result<()> {
        self.out_tx
            .send(Message::Text(frame.to_text()))
            .map_err(|_| ChannelError::ConnectionClosed("writer stopped".into()))
    }

    fn handle_frame(&self, message: &WsMessage) {
        let frame = match PusherFrame::parse(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[Channels] Dropping undecodable frame: {}", e);
                return;
            }
        };

        match frame.event.as_str() {
            "pusher:connection_established" => {
                let socket_id = frame.payload()["socket_id"].as_str().map(str::to_string);
                debug!("[Channels] Connection established (socket {:?})", socket_id);
                *self.socket_id.write() = socket_id;
                let _ = self.signal_tx.send(TransportSignal::Connected);
            }
            "pusher:pong" => {
                if let Some(tx) = self.pending_pong.lock().take() {
                    let _ = tx.send(());
                }
            }
            "pusher:ping" => {
                if let Err(e) = self.send_frame(PusherFrame::new("pusher:pong", json!({}))) {
                    debug!("[Channels] Failed to answer server ping: {}", e);
                }
            }
            "pusher:error" => {
                let payload = frame.payload();
                let message = payload["message"].as_str().unwrap_or("unknown error").to_string();
                let _ = self.signal_tx.send(TransportSignal::Error(message));
            }
            "pusher_internal:subscription_succeeded" => {
                debug!("[Channels] Subscribed to {:?}", frame.channel);
            }
            _ if frame.is_protocol() => {
                debug!("[Channels] Ignoring protocol frame {}", frame.event);
            }
            _ => self.dispatch(frame),
        }
    }

    fn dispatch(&self, frame: PusherFrame) {
        let Some(channel) = frame.channel.clone() else {
            debug!("[Channels] Event {} without channel", frame.event);
            return;
        };

        // Snapshot so listeners may unbind while being called
        let listeners: Vec<EventListener> = self
            .listeners
            .read()
            .get(&(channel, frame.event.clone()))
            .map(|bound| bound.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        if listeners.is_empty() {
            debug!("[Channels] No listener bound for {}", frame.event);
            return;
        }

        let payload = frame.payload();
        for listener in listeners {
            listener(&frame.event, payload.clone());
        }
    }
}

/// One open Pusher socket
pub struct PusherHandle {
    shared: Arc<Shared>,
    signals: Mutex<Option<mpsc::UnboundedReceiver<TransportSignal>>>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PusherHandle {
    /// Socket id assigned by the server, once the connection is established
    pub fn socket_id(&self) -> Option<String> {
        self.shared.socket_id.read().clone()
    }
}

#[async_trait::async_trait]
impl TransportHandle for PusherHandle {
    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<TransportSignal>> {
        self.signals.lock().take()
    }

    fn subscribe(&self, channel: &str) -> Result<()> {
        self.shared
            .send_frame(PusherFrame::new("pusher:subscribe", json!({ "channel": channel })))
            .map_err(|e| ChannelError::Subscription {
                channel: channel.to_string(),
                reason: e.to_string(),
            })
    }

    fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.shared
            .send_frame(PusherFrame::new("pusher:unsubscribe", json!({ "channel": channel })))
    }

    fn bind(&self, channel: &str, event_type: &str, listener: EventListener) -> BindingId {
        let id = BindingId(self.shared.next_binding.fetch_add(1, Ordering::AcqRel));
        self.shared
            .listeners
            .write()
            .entry((channel.to_string(), event_type.to_string()))
            .or_default()
            .push((id, listener));
        id
    }

    fn unbind(&self, channel: &str, binding: BindingId) {
        let mut listeners = self.shared.listeners.write();
        listeners.retain(|(bound_channel, _), bound| {
            if bound_channel == channel {
                bound.retain(|(id, _)| *id != binding);
            }
            !bound.is_empty()
        });
    }

    async fn ping(&self) -> Result<Duration> {
        let (tx, rx) = oneshot::channel();
        *self.shared.pending_pong.lock() = Some(tx);

        let started = Instant::now();
        self.shared.send_frame(PusherFrame::new("pusher:ping", json!({})))?;

        rx.await
            .map(|_| started.elapsed())
            .map_err(|_| ChannelError::ConnectionClosed("pong never arrived".into()))
    }

    fn close(&self) {
        if self.shared.open.swap(false, Ordering::AcqRel) {
            debug!("[Channels] Closing socket");
            let _ = self.shared.out_tx.send(Message::Close(None));
        }
        // Stop dispatching; the writer flushes the close frame and exits
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}

impl Drop for PusherHandle {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}
