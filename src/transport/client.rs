//! Persistent hub connection with handler dispatch and automatic reconnect

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::frame::{self, HubFrame};
use super::subscription::HubSubscription;
use crate::config::TransportConfig;
use crate::provider::Provider;
use crate::{AdapterState, RaceControlError, Result};

/// Callback invoked with the argument array of a matching hub frame.
pub type FrameHandler = Box<dyn FnMut(&[Value]) + Send>;

/// One persistent connection to a provider hub.
///
/// Handlers are registered per `(hub, method)` and run synchronously on the
/// connection task, in registration order. Frames without a handler are ignored.
pub struct Transport {
    subscription: HubSubscription,
    provider: Box<dyn Provider>,
    handlers: HashMap<(String, String), Vec<FrameHandler>>,
    config: TransportConfig,
    state: watch::Sender<AdapterState>,
    cancel: CancellationToken,
}

/// Cloneable control handle for a [`Transport`] that has been moved into its task.
#[derive(Clone)]
pub struct TransportHandle {
    cancel: CancellationToken,
    state: watch::Receiver<AdapterState>,
}

impl Transport {
    pub fn new(
        subscription: HubSubscription,
        provider: Box<dyn Provider>,
        config: TransportConfig,
    ) -> Self {
        let (state, _) = watch::channel(AdapterState::Idle);
        Self {
            subscription,
            provider,
            handlers: HashMap::new(),
            config,
            state,
            cancel: CancellationToken::new(),
        }
    }

    pub fn subscription(&self) -> &HubSubscription {
        &self.subscription
    }

    /// Register a callback for frames with this hub and method.
    pub fn add_handler<F>(&mut self, hub: &str, method: &str, handler: F)
    where
        F: FnMut(&[Value]) + Send + 'static,
    {
        self.handlers
            .entry((hub.to_string(), method.to_string()))
            .or_default()
            .push(Box::new(handler));
    }

    pub fn handle(&self) -> TransportHandle {
        TransportHandle { cancel: self.cancel.clone(), state: self.state.subscribe() }
    }

    /// Stop the connection loop. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Invoke every handler registered for the frame. Returns how many ran.
    pub fn dispatch(&mut self, frame: &HubFrame) -> usize {
        let key = (frame.hub.clone(), frame.method.clone());
        match self.handlers.get_mut(&key) {
            Some(handlers) => {
                for handler in handlers.iter_mut() {
                    handler(&frame.args);
                }
                handlers.len()
            }
            None => {
                trace!(hub = %frame.hub, method = %frame.method, "No handler for frame");
                0
            }
        }
    }

    /// Decode a raw text message and dispatch every hub frame it carries.
    ///
    /// Returns the number of hub frames decoded.
    pub fn dispatch_text(&mut self, text: &str) -> Result<usize> {
        let frames = frame::decode(text)?;
        for frame in &frames {
            self.dispatch(frame);
        }
        Ok(frames.len())
    }

    fn set_state(&self, next: AdapterState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!("Transport state {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }

    /// Sleep before the next attempt. Returns `false` if stopped meanwhile.
    async fn backoff(&mut self, attempt: u32) -> bool {
        let delay = self.config.reconnect_delay(attempt);
        info!("Reconnecting to {} in {}ms (attempt {})", self.subscription.endpoint, delay.as_millis(), attempt);
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn connect(&mut self, method: &str) -> Result<()> {
        let timeout = self.config.connect_timeout();
        match tokio::time::timeout(timeout, self.provider.connect(&self.subscription, method)).await {
            Ok(result) => result,
            Err(_) => Err(RaceControlError::Timeout { duration: timeout }),
        }
    }

    /// Connect, subscribe with `method`, and dispatch frames until stopped.
    ///
    /// Connection failures and remote closes lead to a reconnect for as long as
    /// the transport runs; retries are unbounded.
    pub async fn run(mut self, method: &str) {
        info!(
            endpoint = %self.subscription.endpoint,
            hub = %self.subscription.hub,
            method,
            "Transport started"
        );
        let cancel = self.cancel.clone();
        let mut attempt = 0u32;
        let mut frame_count = 0u64;

        'connection: loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_state(AdapterState::Connecting);
            let connected = tokio::select! {
                _ = cancel.cancelled() => break 'connection,
                result = self.connect(method) => result,
            };

            if let Err(e) = connected {
                attempt = attempt.saturating_add(1);
                warn!("Connection to {} failed: {}", self.subscription.endpoint, e);
                if !self.backoff(attempt).await {
                    break;
                }
                continue;
            }

            attempt = 0;
            self.set_state(AdapterState::Subscribed);

            loop {
                if cancel.is_cancelled() {
                    break 'connection;
                }

                let next = tokio::select! {
                    _ = cancel.cancelled() => break 'connection,
                    next = self.provider.next_frame() => next,
                };

                match next {
                    Ok(Some(text)) => match frame::decode(&text) {
                        Ok(frames) if frames.is_empty() => trace!("Frame without hub messages"),
                        Ok(frames) => {
                            self.set_state(AdapterState::Receiving);
                            frame_count += frames.len() as u64;
                            for frame in &frames {
                                self.dispatch(frame);
                            }
                        }
                        Err(e) => warn!("Dropping malformed frame: {}", e),
                    },
                    Ok(None) => {
                        warn!("Connection to {} closed by remote", self.subscription.endpoint);
                        break;
                    }
                    Err(e) => {
                        warn!("Connection to {} lost: {}", self.subscription.endpoint, e);
                        break;
                    }
                }
            }

            self.provider.close().await;
            attempt = attempt.saturating_add(1);
            if !self.backoff(attempt).await {
                break;
            }
        }

        self.provider.close().await;
        self.set_state(AdapterState::Stopped);
        info!("Transport stopped ({} hub frames)", frame_count);
    }
}

impl TransportHandle {
    /// Stop the connection loop. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> AdapterState {
        *self.state.borrow()
    }

    /// Wait until the state satisfies `predicate`, up to `timeout`.
    pub async fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> Result<AdapterState>
    where
        F: FnMut(AdapterState) -> bool,
    {
        let mut state = self.state.clone();
        let waited = tokio::time::timeout(timeout, async move {
            match state.wait_for(|s| predicate(*s)).await {
                Ok(current) => Ok(*current),
                Err(_) => Err(RaceControlError::transport("transport task ended")),
            }
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => Err(RaceControlError::Timeout { duration: timeout }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ReplayProvider;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn fast_config() -> TransportConfig {
        TransportConfig {
            connect_timeout_secs: 5,
            start_timeout_secs: 5,
            reconnect_base_ms: 1,
            reconnect_max_ms: 5,
        }
    }

    fn subscription() -> HubSubscription {
        HubSubscription::new("https://example.test", "Streaming", vec![json!(["TrackStatus"])])
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let (_feed, provider) = ReplayProvider::channel();
        let mut transport = Transport::new(subscription(), Box::new(provider), fast_config());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = Arc::clone(&order);
            transport.add_handler("Streaming", "feed", move |_| order.lock().push(id));
        }

        let ran = transport.dispatch(&HubFrame::new("Streaming", "feed", vec![]));
        assert_eq!(ran, 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn unmatched_frames_are_ignored() {
        let (_feed, provider) = ReplayProvider::channel();
        let mut transport = Transport::new(subscription(), Box::new(provider), fast_config());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        transport.add_handler("Streaming", "feed", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(transport.dispatch(&HubFrame::new("Streaming", "other", vec![])), 0);
        assert_eq!(transport.dispatch(&HubFrame::new("streaming", "feed", vec![])), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_text_is_rejected_without_dispatch() {
        let (_feed, provider) = ReplayProvider::channel();
        let mut transport = Transport::new(subscription(), Box::new(provider), fast_config());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        transport.add_handler("Streaming", "feed", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(transport.dispatch_text("{{{").is_err());
        assert_eq!(transport.dispatch_text(r#"{"M":[{"H":"Streaming","M":"feed"}]}"#).unwrap(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_future_can_be_spawned() {
        fn assert_send<T: Send>(_: &T) {}

        let (_feed, provider) = ReplayProvider::channel();
        let mut transport = Transport::new(subscription(), Box::new(provider), fast_config());
        transport.add_handler("Streaming", "feed", |_| {});
        let run = transport.run("Subscribe");
        assert_send(&run);
    }

    #[tokio::test]
    async fn run_subscribes_dispatches_and_stops() {
        let _ = tracing_subscriber::fmt::try_init();
        let (feed, provider) = ReplayProvider::channel();
        let mut transport = Transport::new(subscription(), Box::new(provider), fast_config());
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.add_handler("Streaming", "feed", move |args| {
            let _ = tx.send(args.to_vec());
        });

        let handle = transport.handle();
        let task = tokio::spawn(transport.run("Subscribe"));

        feed.push("Streaming", "feed", vec![json!("TrackStatus"), json!({ "Status": "1" })]);
        let args = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
        assert_eq!(args[0], "TrackStatus");
        assert_eq!(handle.state(), AdapterState::Receiving);

        let invocations = feed.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].method, "Subscribe");

        handle.stop();
        handle.stop();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(handle.state(), AdapterState::Stopped);
    }

    #[tokio::test]
    async fn reconnects_after_failures_and_remote_close() {
        let _ = tracing_subscriber::fmt::try_init();
        let (feed, provider) = ReplayProvider::channel();
        feed.fail_next_connects(2);
        let transport = Transport::new(subscription(), Box::new(provider), fast_config());
        let handle = transport.handle();
        let task = tokio::spawn(transport.run("Subscribe"));

        handle
            .wait_for(Duration::from_secs(2), AdapterState::has_subscribed)
            .await
            .unwrap();
        assert_eq!(feed.connect_count(), 3);

        feed.disconnect();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while feed.invocations().len() < 2 {
            assert!(tokio::time::Instant::now() < deadline, "transport did not resubscribe");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        handle.stop();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stop_before_run_ends_immediately() {
        let (_feed, provider) = ReplayProvider::channel();
        let transport = Transport::new(subscription(), Box::new(provider), fast_config());
        let handle = transport.handle();
        transport.stop();
        tokio::time::timeout(Duration::from_secs(1), transport.run("Subscribe")).await.unwrap();
        assert_eq!(handle.state(), AdapterState::Stopped);
        assert!(handle.is_stopped());
    }
}
