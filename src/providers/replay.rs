//! Replay provider for recorded feed captures

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::provider::Provider;
use crate::transport::{HubFrame, HubInvocation, HubSubscription};
use crate::{RaceControlError, Result};

enum ReplayItem {
    Frame(String),
    Disconnect,
}

/// State shared between a [`ReplayProvider`] and its [`ReplayFeed`].
#[derive(Default)]
struct Shared {
    invocations: Mutex<Vec<HubInvocation>>,
    connects: AtomicUsize,
    failing_connects: AtomicU32,
}

/// Provider that plays back recorded text frames.
///
/// Frames come either from a capture file (one raw websocket message per line)
/// or are pushed live through the paired [`ReplayFeed`]. Once the recording is
/// exhausted the provider stays connected and silent, like an idle live feed,
/// until the transport is stopped.
pub struct ReplayProvider {
    preloaded: VecDeque<String>,
    frames: mpsc::UnboundedReceiver<ReplayItem>,
    shared: Arc<Shared>,
    connected: bool,
    next_invocation_id: u64,
}

/// Handle for pushing frames into a [`ReplayProvider`] and inspecting what it was asked to do.
#[derive(Clone)]
pub struct ReplayFeed {
    sender: mpsc::UnboundedSender<ReplayItem>,
    shared: Arc<Shared>,
}

impl ReplayProvider {
    /// Create a provider fed through the returned handle.
    pub fn channel() -> (ReplayFeed, ReplayProvider) {
        let (sender, frames) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let feed = ReplayFeed { sender, shared: Arc::clone(&shared) };
        let provider = ReplayProvider {
            preloaded: VecDeque::new(),
            frames,
            shared,
            connected: false,
            next_invocation_id: 0,
        };
        (feed, provider)
    }

    /// Load a capture file with one raw frame per line. Blank lines are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<(ReplayFeed, ReplayProvider)> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RaceControlError::file_error(path, e))?;
        let (feed, mut provider) = Self::channel();
        provider.preloaded =
            text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
        info!("Loaded capture {} ({} frames)", path.display(), provider.preloaded.len());
        Ok((feed, provider))
    }
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    async fn connect(&mut self, subscription: &HubSubscription, method: &str) -> Result<()> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);

        let failing = self.shared.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.shared.failing_connects.store(failing - 1, Ordering::SeqCst);
            debug!("Replay connect refused ({} more)", failing - 1);
            return Err(RaceControlError::transport("replay connect refused"));
        }

        self.next_invocation_id += 1;
        let invocation = HubInvocation {
            hub: subscription.hub.clone(),
            method: method.to_string(),
            args: subscription.args.clone(),
            id: self.next_invocation_id,
        };
        trace!("Replay invocation: {:?}", invocation);
        self.shared.invocations.lock().push(invocation);
        self.connected = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<String>> {
        if !self.connected {
            return Err(RaceControlError::transport("replay provider not connected"));
        }

        if let Some(frame) = self.preloaded.pop_front() {
            return Ok(Some(frame));
        }

        match self.frames.recv().await {
            Some(ReplayItem::Frame(text)) => Ok(Some(text)),
            Some(ReplayItem::Disconnect) => {
                self.connected = false;
                Ok(None)
            }
            // Every feed handle is gone: nothing more will ever arrive.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.connected = false;
    }
}

impl ReplayFeed {
    /// Queue a raw text message exactly as it would arrive on the socket.
    pub fn push_raw(&self, text: impl Into<String>) {
        let _ = self.sender.send(ReplayItem::Frame(text.into()));
    }

    /// Queue a single hub frame wrapped in a persistent-connection envelope.
    pub fn push(&self, hub: &str, method: &str, args: Vec<Value>) {
        let frame = HubFrame::new(hub, method, args);
        let envelope = serde_json::json!({ "C": "replay", "M": [frame] });
        self.push_raw(envelope.to_string());
    }

    /// Make the provider report a remote close once the queue reaches this point.
    pub fn disconnect(&self) {
        let _ = self.sender.send(ReplayItem::Disconnect);
    }

    /// Refuse the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: u32) {
        self.shared.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Number of connection attempts so far, including refused ones.
    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Subscription invocations sent on successful connects.
    pub fn invocations(&self) -> Vec<HubInvocation> {
        self.shared.invocations.lock().clone()
    }
}
