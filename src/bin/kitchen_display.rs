use anyhow::{anyhow, Context, Result};
use channels::{ChannelManager, ManagerEvent, PusherTransport};
use kitchen::application::{topics, BusBridge, EventBus, OrderSyncStore, Subscription};
use kitchen::domain::{TimeContext, UrgencyLevel, UrgencyPolicy};
use kitchen::infrastructure::{
    init_tracing, ExecuteOptions, KitchenApi, KitchenConfig, LocalState, OrderBackend,
    RequestExecutor, ShutdownManager,
};
use kitchen_display_sync::bin_common::{
    load_config_from_env, parse_args, BinaryRunner, CliCommand, ConfigType, RunConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let command = CliCommand::from_args(&parse_args()).map_err(|e| anyhow!(e))?;

    // Load config first (before logging is initialized)
    let config_path = load_config_from_env(ConfigType::Kitchen);
    let config = KitchenConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.log_level);
    config.log();

    let mut state = LocalState::open(&config.display.state_path);

    match command {
        CliCommand::Pair(code) => pair(&config, &mut state, &code).await,
        CliCommand::Unpair => {
            state.clear()?;
            info!("Device identity removed from {}", state.path().display());
            Ok(())
        }
        CliCommand::Run => {
            let mut app = KitchenDisplayApp::new(config, &mut state)?;
            app.execute().await
        }
    }
}

/// Exchange a pairing code for a device identity and persist it
async fn pair(config: &KitchenConfig, state: &mut LocalState, code: &str) -> Result<()> {
    let api = Arc::new(KitchenApi::new(&config.api.base_url, config.request_timeout())?);
    let executor = RequestExecutor::new(config.backoff(), config.retry.read_retries);
    let code = code.to_string();

    let data = executor
        .execute(
            move || {
                let api = Arc::clone(&api);
                let code = code.clone();
                async move { api.pair_device(&code).await }
            },
            ExecuteOptions::mutation(),
        )
        .await
        .map_err(|e| anyhow!("Pairing failed: {} ({})", e.message, e.code))?;

    let device_id = data["device_id"]
        .as_str()
        .ok_or_else(|| anyhow!("Pairing response carried no device_id"))?;
    state.set_device_id(device_id)?;
    info!("✅ Paired as device {}", device_id);
    Ok(())
}

struct KitchenDisplayApp {
    run_config: RunConfig,
    device_id: String,
    station: String,
    ctx: TimeContext,
    policy: UrgencyPolicy,
    store: OrderSyncStore,
    manager: ChannelManager<PusherTransport>,
    shutdown: ShutdownManager,
    halted: bool,
    refreshes: u64,
    _subscriptions: Vec<Subscription>,
}

impl KitchenDisplayApp {
    fn new(config: KitchenConfig, state: &mut LocalState) -> Result<Self> {
        let stored = state.device_id().map(str::to_string);
        let device_id = match (config.display.device_id.clone(), stored) {
            (Some(configured), stored) => {
                if stored.as_deref() != Some(configured.as_str()) {
                    state.set_device_id(configured.as_str())?;
                }
                configured
            }
            (None, Some(stored)) => stored,
            (None, None) => {
                return Err(anyhow!(
                    "No device identity; run with --pair <code> or set display.device_id"
                ))
            }
        };

        let executor = Arc::new(RequestExecutor::new(config.backoff(), config.retry.read_retries));
        let mut api = KitchenApi::new(&config.api.base_url, config.request_timeout())?.with_device(&device_id);
        if let Some(token) = &config.api.token {
            api = api.with_token(token);
        }

        let ctx = config.time_context();
        let bus = EventBus::new();
        let store = OrderSyncStore::new(Arc::new(api), executor, bus.clone(), ctx.today());

        let mut subscriptions = store.attach(&bus);
        subscriptions.push(bus.on(topics::ORDERS_NEW, |data| {
            info!("🔔 New order(s): {}", data["order_ids"]);
            Ok(())
        }));
        subscriptions.push(bus.on(topics::CONNECTION, |data| {
            info!("Realtime: {}", data);
            Ok(())
        }));
        subscriptions.push(bus.on(topics::LATENCY, |data| {
            debug!("Realtime latency: {}ms", data["ms"]);
            Ok(())
        }));

        let manager = ChannelManager::new(
            config.channel_config(),
            PusherTransport::new(&config.realtime.ws_url),
        )?;
        manager.add_observer(Arc::new(BusBridge::new(bus)));

        Ok(Self {
            run_config: RunConfig::new("Kitchen Display")
                .with_refresh_interval(config.display.refresh_interval_secs),
            device_id,
            station: config.display.station.clone(),
            ctx,
            policy: config.urgency_policy(),
            store,
            manager,
            shutdown: ShutdownManager::new(),
            halted: false,
            refreshes: 0,
            _subscriptions: subscriptions,
        })
    }

    /// Follow the calendar day in the restaurant's zone
    fn roll_date(&self) {
        let today = self.ctx.today();
        if today != self.store.date() {
            self.store.set_date(today);
        }
    }

    async fn refresh(&mut self) {
        self.refreshes += 1;
        match self.store.fetch(&self.device_id, &self.station).await {
            Ok(_) => self.log_board(),
            Err(e) => warn!("Refresh failed ({}): {}", e.code, e.message),
        }
    }

    fn log_board(&self) {
        let board = self.store.buckets(&self.ctx, &self.policy);
        info!(
            "📋 {} | new {} | cooking {} | ready {}",
            self.store.date(),
            board.new.len(),
            board.cooking.len(),
            board.ready.len()
        );

        for ticket in board.new.iter().chain(&board.cooking) {
            let marker = match ticket.urgency {
                UrgencyLevel::Overdue => "⛔",
                UrgencyLevel::Warning => "⚠️",
                UrgencyLevel::Normal => "  ",
            };
            debug!(
                "{} {} [{}] slot={} due_in={:?} cooking_for={:?}",
                marker,
                ticket.order.label(),
                ticket.bucket.as_str(),
                ticket.slot.as_deref().unwrap_or("-"),
                ticket.minutes_until,
                ticket.elapsed_minutes
            );
        }
    }

    async fn handle_event(&mut self, event: ManagerEvent) {
        match event {
            // Catch up on anything missed while the socket was down
            ManagerEvent::Connected => {
                self.halted = false;
                self.refresh().await;
            }
            ManagerEvent::RetriesExhausted(attempts) => {
                warn!(
                    "Realtime gave up after {} attempts; retrying on next refresh",
                    attempts
                );
                self.halted = true;
            }
            _ => {}
        }
    }
}

impl BinaryRunner for KitchenDisplayApp {
    async fn run(&mut self) -> Result<()> {
        self.shutdown.spawn_signal_handler();

        if let Err(e) = self.manager.connect().await {
            warn!("Initial realtime connect failed, retrying in background: {}", e);
        }
        self.refresh().await;

        let period = Duration::from_secs(self.run_config.refresh_interval_secs.max(1));
        let mut refresh = interval(period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        refresh.tick().await;

        while self.shutdown.is_running() {
            tokio::select! {
                _ = refresh.tick() => {
                    self.roll_date();
                    if self.halted {
                        self.halted = false;
                        if let Err(e) = self.manager.reconnect().await {
                            warn!("Realtime reconnect failed: {}", e);
                        }
                    }
                    self.refresh().await;
                }
                event = self.manager.recv_event() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                // Wakes as soon as Ctrl+C flips the flag
                _ = self.shutdown.interruptible_sleep(period) => {}
            }
        }

        self.manager.disconnect();
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        let snapshot = self.store.snapshot();
        Some(format!(
            "{} refreshes, {} orders on board, {} seen this session",
            self.refreshes,
            snapshot.orders.len(),
            snapshot.seen_count
        ))
    }
}
