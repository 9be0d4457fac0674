//! Live track-condition flags from motorsport timing feeds.
//!
//! Race Control connects to the live timing service of the session that is about
//! to run, translates its provider-specific messages into one canonical [`Flag`],
//! and pushes every change to display clients.
//!
//! # Features
//!
//! - **Three providers**: Formula 1, Formula 2 and Formula 3 live timing over SignalR
//! - **One authoritative flag**: precedence rules keep hazards from being downgraded
//! - **Self-healing connections**: unbounded reconnect with capped backoff
//! - **Replay**: recorded captures run through the same pipeline as live data
//!
//! # Pipeline
//!
//! ```text
//! provider -> Transport -> Adapter -> Arbiter -> Broadcast -> display clients
//!                                        ^
//!                   Scheduler ----------'  (starts and stops the adapter)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use racecontrol::{RaceControl, RaceControlConfig};
//!
//! #[tokio::main]
//! async fn main() -> racecontrol::Result<()> {
//!     let config = RaceControlConfig::load("racecontrol.yaml")?;
//!     racecontrol::init_logging(&config.logging.filter)?;
//!
//!     let race_control = RaceControl::new(config);
//!     let mut display = race_control.connect_client();
//!
//!     race_control.check(chrono::Utc::now()).await?;
//!     while let Some(event) = display.recv().await {
//!         println!("{event}");
//!     }
//!
//!     race_control.shutdown().await;
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod adapters;
pub mod arbiter;
pub mod broadcast;
pub mod config;
mod error;
pub mod provider;
pub mod providers;
pub mod scheduler;
pub mod store;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod transport;
pub mod types;

pub use adapters::{Adapter, AdapterContext, AdapterEvent, EventSink};
pub use arbiter::{Arbiter, Decision, FlagView, arbitrate};
pub use broadcast::{Broadcast, ClientFanout, ClientSubscription};
pub use config::{
    ArbiterConfig, EndpointConfig, FanoutConfig, LoggingConfig, RaceControlConfig, SchedulerConfig,
    TransportConfig,
};
pub use error::*;
pub use scheduler::{ProviderFactory, Scheduler};
pub use store::{InMemorySessionStore, SessionStore};
pub use types::*;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| RaceControlError::configuration(format!("invalid log filter: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| RaceControlError::configuration(format!("logging already initialised: {e}")))
}

/// Process-level entry point.
///
/// Wires the arbiter, the display fanout, the session store and the scheduler
/// according to a [`RaceControlConfig`].
pub struct RaceControl {
    config: RaceControlConfig,
    arbiter: Arc<Arbiter>,
    fanout: Arc<ClientFanout>,
    store: Arc<InMemorySessionStore>,
    scheduler: Scheduler,
}

impl RaceControl {
    /// Build with live SignalR connections.
    pub fn new(config: RaceControlConfig) -> Self {
        Self::with_providers(config, scheduler::signalr_providers())
    }

    /// Build with a custom provider source, e.g. recorded captures.
    pub fn with_providers(config: RaceControlConfig, providers: ProviderFactory) -> Self {
        let fanout = Arc::new(ClientFanout::new(config.fanout.client_buffer));
        let arbiter = Arc::new(Arbiter::new(config.arbiter.initial_flag, fanout.clone()));
        let store = Arc::new(InMemorySessionStore::new(config.sessions.clone()));
        let scheduler = Scheduler::with_providers(arbiter.clone(), fanout.clone(), &config, providers);
        info!(sessions = store.len(), "Race control ready");
        Self { config, arbiter, fanout, store, scheduler }
    }

    /// Load the configuration file and build with live connections.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(RaceControlConfig::load(path)?))
    }

    pub fn config(&self) -> &RaceControlConfig {
        &self.config
    }

    pub fn arbiter(&self) -> &Arc<Arbiter> {
        &self.arbiter
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<InMemorySessionStore> {
        &self.store
    }

    pub fn current_flag(&self) -> FlagData {
        self.arbiter.current()
    }

    /// Register a display client. Its first event is the current flag.
    pub fn connect_client(&self) -> ClientSubscription {
        self.fanout.register_with(|| OutboundEvent::FlagChange(self.arbiter.current()))
    }

    pub fn client_count(&self) -> usize {
        self.fanout.client_count()
    }

    /// Run one scheduling check against the configured sessions.
    pub async fn check(&self, now: DateTime<Utc>) -> Result<Option<Session>> {
        self.scheduler.check(self.store.as_ref(), now).await
    }

    /// Close the active connection and every display client.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.fanout.close_all();
        info!("Race control shut down");
    }
}
