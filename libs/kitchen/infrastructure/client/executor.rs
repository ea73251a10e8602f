//! Request executor
//!
//! Runs backend calls with bounded retries and collapses concurrent calls
//! that share a dedupe key into one shared pending outcome.
//!
//! ```text
//! execute(call, key) ──┬── key in flight ──> await the same Shared future
//!                      └── new ──> register ──> attempt ─┬─ ok ──────────────┐
//!                                                 ▲      └─ err: classify    │
//!                                                 │         retryable and    │
//!                                                 └──sleep── budget left?    │
//!                                                                            ▼
//!                                              settle: remove own entry once
//! ```

use super::error::{classify_failure, ClassifiedError, RequestFailure};
use channels::ExponentialBackoff;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub type CallResult = Result<Value, ClassifiedError>;

type SharedCall = Shared<BoxFuture<'static, CallResult>>;
type Registry = Arc<Mutex<HashMap<String, (u64, SharedCall)>>>;

/// Per-call retry budget and optional dedupe key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub max_retries: u32,
    pub dedupe_key: Option<String>,
}

impl ExecuteOptions {
    /// Read with the given retry budget
    pub fn read(max_retries: u32) -> Self {
        Self {
            max_retries,
            dedupe_key: None,
        }
    }

    /// Side-effecting call; never retried
    pub fn mutation() -> Self {
        Self {
            max_retries: 0,
            dedupe_key: None,
        }
    }

    pub fn dedupe(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }
}

pub struct RequestExecutor {
    backoff: ExponentialBackoff,
    read_retries: u32,
    in_flight: Registry,
    next_id: AtomicU64,
}

impl RequestExecutor {
    /// # Arguments
    /// * `backoff` - delay policy between attempts
    /// * `read_retries` - default retry budget for reads
    pub fn new(backoff: ExponentialBackoff, read_retries: u32) -> Self {
        Self {
            backoff,
            read_retries,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Default options for reads
    pub fn read_options(&self) -> ExecuteOptions {
        ExecuteOptions::read(self.read_retries)
    }

    /// Number of keyed calls currently pending
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub async fn execute<F, Fut>(&self, call: F, options: ExecuteOptions) -> CallResult
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestFailure>> + Send + 'static,
    {
        let Some(key) = options.dedupe_key else {
            return run_with_retries(call, options.max_retries, self.backoff.clone(), None).await;
        };

        let pending = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key) {
                Some((_, pending)) => {
                    debug!("[Executor] Joining in-flight call {}", key);
                    pending.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let registry = Arc::clone(&self.in_flight);
                    let backoff = self.backoff.clone();
                    let settle_key = key.clone();
                    let max_retries = options.max_retries;

                    let pending = async move {
                        let outcome =
                            run_with_retries(call, max_retries, backoff, Some(settle_key.as_str())).await;

                        let mut in_flight = registry.lock();
                        if in_flight.get(&settle_key).is_some_and(|(entry, _)| *entry == id) {
                            in_flight.remove(&settle_key);
                        }
                        outcome
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(key, (id, pending.clone()));
                    pending
                }
            }
        };

        pending.await
    }
}

async fn run_with_retries<F, Fut>(
    call: F,
    max_retries: u32,
    backoff: ExponentialBackoff,
    label: Option<&str>,
) -> CallResult
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value, RequestFailure>>,
{
    let label = label.unwrap_or("request");
    let mut attempt = 0u32;

    loop {
        let failure = match call().await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        let error = classify_failure(&failure);
        if !error.retryable || attempt >= max_retries {
            warn!(
                "[Executor] {} failed after {} attempt(s): {} ({:?})",
                label,
                attempt + 1,
                error.code,
                failure
            );
            return Err(error);
        }

        let delay: Duration = backoff.delay(attempt);
        attempt += 1;
        debug!(
            "[Executor] {} failed with {}, retry {}/{} in {:?}",
            label, error.code, attempt, max_retries, delay
        );
        tokio::time::sleep(delay).await;
    }
}
