//! Connection task bookkeeping shared by every adapter

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::{Transport, TransportHandle};
use crate::{AdapterState, Category, RaceControlError, Result};

/// Owns the spawned transport task of one adapter instance.
pub(crate) struct AdapterRuntime {
    category: Category,
    handle: Option<TransportHandle>,
    task: Option<JoinHandle<()>>,
    finished: Arc<AtomicBool>,
}

impl AdapterRuntime {
    pub(crate) fn new(category: Category) -> Self {
        Self { category, handle: None, task: None, finished: Arc::new(AtomicBool::new(false)) }
    }

    /// Flag set by the parser once the session finished.
    pub(crate) fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }

    pub(crate) fn state(&self) -> AdapterState {
        let Some(handle) = &self.handle else {
            return AdapterState::Idle;
        };
        let state = handle.state();
        if state != AdapterState::Stopped && self.finished.load(Ordering::Acquire) {
            AdapterState::Finished
        } else {
            state
        }
    }

    /// Spawn the transport and wait for its subscription to go out.
    pub(crate) async fn launch(
        &mut self,
        transport: Transport,
        method: &'static str,
        start_timeout: Duration,
    ) -> Result<()> {
        if self.handle.is_some() {
            return Err(RaceControlError::configuration(format!(
                "{} adapter already started",
                self.category.display_name()
            )));
        }

        let handle = transport.handle();
        self.task = Some(tokio::spawn(transport.run(method)));
        self.handle = Some(handle.clone());

        let confirmed = handle
            .wait_for(start_timeout, |state| state.has_subscribed() || state == AdapterState::Stopped)
            .await;
        match confirmed {
            Ok(AdapterState::Stopped) => {
                warn!(category = %self.category, "Connection stopped before subscribing");
                Err(RaceControlError::configuration(format!(
                    "{} connection stopped before subscribing",
                    self.category.display_name()
                )))
            }
            Ok(_) => {
                info!(category = %self.category, "Subscribed to {} feed", self.category.display_name());
                Ok(())
            }
            Err(e) => {
                warn!(category = %self.category, "Subscription not confirmed: {}", e);
                Err(e)
            }
        }
    }

    pub(crate) async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            info!(category = %self.category, "Closing {} connection", self.category.display_name());
            handle.stop();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(category = %self.category, "Connection task ended abnormally: {}", e);
            }
            debug!(category = %self.category, "Connection task joined");
        }
    }
}

impl Drop for AdapterRuntime {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::providers::ReplayProvider;
    use crate::transport::HubSubscription;

    fn transport() -> (crate::providers::ReplayFeed, Transport) {
        let (feed, provider) = ReplayProvider::channel();
        let subscription = HubSubscription::new("https://example.test", "Streaming", vec![]);
        (feed, Transport::new(subscription, Box::new(provider), TransportConfig::default()))
    }

    #[tokio::test]
    async fn launch_confirms_subscription() {
        let (feed, transport) = transport();
        let mut runtime = AdapterRuntime::new(Category::Formula1);

        runtime.launch(transport, "Subscribe", Duration::from_secs(2)).await.unwrap();
        assert_eq!(runtime.state(), AdapterState::Subscribed);
        assert_eq!(feed.invocations().len(), 1);

        runtime.stop().await;
    }

    #[tokio::test]
    async fn launch_fails_when_stopped_before_subscribing() {
        let (feed, transport) = transport();
        transport.stop();
        let mut runtime = AdapterRuntime::new(Category::Formula1);

        let err = runtime.launch(transport, "Subscribe", Duration::from_secs(2)).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(runtime.state(), AdapterState::Stopped);
        assert!(feed.invocations().is_empty());

        runtime.stop().await;
    }
}
