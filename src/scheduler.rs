//! Session scheduling
//!
//! The [`Scheduler`] decides which single adapter is active. It wires the adapter's
//! events into the [`Arbiter`], and once the provider signals the end of the
//! session it waits a grace delay before closing the connection, so trailing
//! messages still arrive.
//!
//! Only one session is active at a time. The check and the claim of the active slot
//! happen under one short lock, so two concurrent checks cannot both start an
//! adapter; the loser is ignored.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::adapters::{self, Adapter, AdapterContext, AdapterEvent, EventSink};
use crate::arbiter::Arbiter;
use crate::broadcast::Broadcast;
use crate::config::{EndpointConfig, RaceControlConfig, SchedulerConfig, TransportConfig};
use crate::provider::Provider;
use crate::providers::SignalRProvider;
use crate::store::SessionStore;
use crate::{AdapterState, Category, OutboundEvent, RaceControlError, Result, Session};

/// Creates the upstream provider for an adapter.
pub type ProviderFactory = Arc<dyn Fn(Category) -> Box<dyn Provider> + Send + Sync>;

/// Live SignalR connections for every category.
pub fn signalr_providers() -> ProviderFactory {
    Arc::new(|_: Category| -> Box<dyn Provider> { Box::new(SignalRProvider::new()) })
}

struct ActiveSession {
    generation: u64,
    session: Session,
    /// `None` while the adapter is still starting.
    adapter: Option<Box<dyn Adapter>>,
    teardown_scheduled: bool,
}

struct SchedulerInner {
    arbiter: Arc<Arbiter>,
    output: Arc<dyn Broadcast>,
    config: SchedulerConfig,
    transport: TransportConfig,
    endpoints: EndpointConfig,
    providers: ProviderFactory,
    active: Mutex<Option<ActiveSession>>,
    generations: AtomicU64,
    shutdown: CancellationToken,
}

/// Owner of the active adapter.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Scheduler using live SignalR connections.
    pub fn new(arbiter: Arc<Arbiter>, output: Arc<dyn Broadcast>, config: &RaceControlConfig) -> Self {
        Self::with_providers(arbiter, output, config, signalr_providers())
    }

    pub fn with_providers(
        arbiter: Arc<Arbiter>,
        output: Arc<dyn Broadcast>,
        config: &RaceControlConfig,
        providers: ProviderFactory,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                arbiter,
                output,
                config: config.scheduler.clone(),
                transport: config.transport.clone(),
                endpoints: config.endpoints.clone(),
                providers,
                active: Mutex::new(None),
                generations: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn has_session_active(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    pub fn active_session(&self) -> Option<Session> {
        self.inner.active.lock().as_ref().map(|active| active.session.clone())
    }

    /// State of the active adapter, once it has been started.
    pub fn adapter_state(&self) -> Option<AdapterState> {
        let active = self.inner.active.lock();
        active.as_ref()?.adapter.as_ref().map(|adapter| adapter.state())
    }

    /// Start the adapter for `session` unless a session is already active.
    ///
    /// An unknown category key is logged and returned as a configuration error,
    /// leaving the active slot free. Connection failures are not retried here;
    /// the transport keeps reconnecting on its own.
    pub async fn start_category(&self, session: Session) -> Result<()> {
        if let Some((generation, category)) = self.claim(&session)? {
            self.launch(generation, category, session).await?;
        }
        Ok(())
    }

    /// Scheduling check, meant to be driven by an external periodic trigger.
    ///
    /// Looks up a session starting `look_ahead` from `now`. Once its slot is
    /// claimed the session is announced to display clients and started. Returns the
    /// session that was picked up.
    pub async fn check<S>(&self, store: &S, now: DateTime<Utc>) -> Result<Option<Session>>
    where
        S: SessionStore + ?Sized,
    {
        if self.has_session_active() {
            trace!("Session active, skipping check");
            return Ok(None);
        }

        let look_ahead = TimeDelta::from_std(self.inner.config.look_ahead())
            .map_err(|_| RaceControlError::configuration("look-ahead out of range"))?;
        let Some(session) = store.session_at(now + look_ahead).await? else {
            return Ok(None);
        };

        info!(category = %session.category_key, session = %session.session_key, "Upcoming session found");
        let Some((generation, category)) = self.claim(&session)? else {
            return Ok(None);
        };
        self.inner.output.broadcast(OutboundEvent::SessionChange(session.clone()));
        self.launch(generation, category, session.clone()).await?;
        Ok(Some(session))
    }

    /// Take the active slot for `session`.
    ///
    /// `Ok(None)` when another session holds it or the scheduler is shut down.
    fn claim(&self, session: &Session) -> Result<Option<(u64, Category)>> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            warn!(category = %session.category_key, "Scheduler shut down, not starting session");
            return Ok(None);
        }

        let Some(category) = Category::from_key(&session.category_key) else {
            let err = RaceControlError::configuration(format!(
                "no adapter registered for category '{}'",
                session.category_key
            ));
            error!("{}", err);
            return Err(err);
        };

        let mut active = inner.active.lock();
        if let Some(current) = active.as_ref() {
            debug!(
                active = %current.session.category_key,
                requested = %session.category_key,
                "Session already active, ignoring start"
            );
            return Ok(None);
        }
        let generation = inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        *active = Some(ActiveSession {
            generation,
            session: session.clone(),
            adapter: None,
            teardown_scheduled: false,
        });
        Ok(Some((generation, category)))
    }

    /// Resolve and start the adapter for a claimed slot.
    async fn launch(&self, generation: u64, category: Category, session: Session) -> Result<()> {
        let inner = &self.inner;
        let context = AdapterContext {
            events: inner.sink(generation),
            flags: inner.arbiter.view(),
            endpoint: inner.endpoints.endpoint(category).to_string(),
            transport: inner.transport.clone(),
        };
        let mut adapter = match adapters::resolve(category.key(), context) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!("{}", e);
                inner.release(generation);
                return Err(e);
            }
        };

        info!(%category, session = %session.session_key, "Starting {} session", category.display_name());
        match adapter.start(&session, (inner.providers)(category)).await {
            Ok(()) => {}
            Err(e) if e.is_retryable() => {
                warn!(%category, "Adapter still connecting: {}", e);
            }
            Err(e) => {
                error!(%category, "Adapter failed to start: {}", e);
                adapter.stop().await;
                inner.release(generation);
                return Err(e);
            }
        }

        let orphan = {
            let mut active = inner.active.lock();
            match active.as_mut() {
                Some(current) if current.generation == generation => {
                    current.adapter = Some(adapter);
                    None
                }
                _ => Some(adapter),
            }
        };
        // Torn down or shut down while starting.
        if let Some(mut adapter) = orphan {
            debug!(%category, "Session ended during start, closing adapter");
            adapter.stop().await;
        }
        Ok(())
    }

    /// Close the active adapter and cancel pending teardowns.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let active = self.inner.active.lock().take();
        if let Some(active) = active {
            info!(category = %active.session.category_key, "Closing active session for shutdown");
            if let Some(mut adapter) = active.adapter {
                adapter.stop().await;
            }
        }
    }
}

impl SchedulerInner {
    /// Event sink for the adapter of `generation`.
    ///
    /// Holds the scheduler weakly; the adapter lives inside it.
    fn sink(self: &Arc<Self>, generation: u64) -> EventSink {
        let scheduler: Weak<SchedulerInner> = Arc::downgrade(self);
        Arc::new(move |event| {
            let Some(inner) = scheduler.upgrade() else {
                return;
            };
            match event {
                AdapterEvent::FlagParsed(data) => {
                    inner.arbiter.set_active_flag(data);
                }
                AdapterEvent::SessionFinished => inner.schedule_teardown(generation),
            }
        })
    }

    fn schedule_teardown(self: &Arc<Self>, generation: u64) {
        {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(current) if current.generation == generation && !current.teardown_scheduled => {
                    current.teardown_scheduled = true;
                }
                _ => return,
            }
        }

        let grace = self.config.grace_delay();
        info!("Session finished, closing adapter in {}ms", grace.as_millis());
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => return,
                _ = tokio::time::sleep(grace) => {}
            }
            inner.teardown(generation).await;
        });
    }

    async fn teardown(&self, generation: u64) {
        let Some(finished) = self.take(generation) else {
            return;
        };
        if let Some(mut adapter) = finished.adapter {
            adapter.stop().await;
        }
        info!(
            category = %finished.session.category_key,
            session = %finished.session.session_key,
            "Session closed"
        );
    }

    fn take(&self, generation: u64) -> Option<ActiveSession> {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|current| current.generation == generation) {
            active.take()
        } else {
            None
        }
    }

    fn release(&self, generation: u64) {
        self.take(generation);
    }
}
