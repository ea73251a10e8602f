//! Latency probe for push connections
//!
//! # Architecture
//!
//! The probe runs in a dedicated Tokio task for as long as the connection is
//! up:
//!
//! ```text
//! ┌─────────────────────┐
//! │  Probe Task         │
//! │                     │
//! │  Every X interval:  │
//! │  1. Wait for tick   │
//! │  2. handle.ping() ──┼──> round trip (bounded by timeout)
//! │  3. on_sample(rtt)  │
//! └─────────────────────┘
//! ```
//!
//! The probe is best-effort: a failed or timed-out ping is logged at debug
//! level and the next tick tries again. It never surfaces an error and never
//! tears the connection down; connection loss is reported by the transport.

use crate::traits::TransportHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Probe loop
///
/// Skips the immediate first tick so the first sample is taken one interval
/// after the connection came up.
pub async fn latency_probe_task<F>(
    handle: Arc<dyn TransportHandle>,
    interval: Duration,
    timeout: Duration,
    on_sample: F,
) where
    F: Fn(Duration) + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("[Channels] Latency probe started with interval: {:?}", interval);

    loop {
        ticker.tick().await;

        if !handle.is_open() {
            debug!("[Channels] Socket closed, latency probe exiting");
            break;
        }

        match tokio::time::timeout(timeout, handle.ping()).await {
            Ok(Ok(latency)) => on_sample(latency),
            Ok(Err(e)) => debug!("[Channels] Latency probe failed: {}", e),
            Err(_) => debug!("[Channels] Latency probe timed out after {:?}", timeout),
        }
    }
}

/// Spawn the probe task; abort the returned handle to stop it
pub fn spawn_latency_probe<F>(
    handle: Arc<dyn TransportHandle>,
    interval: Duration,
    timeout: Duration,
    on_sample: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn(Duration) + Send + Sync + 'static,
{
    tokio::spawn(latency_probe_task(handle, interval, timeout, on_sample))
}
