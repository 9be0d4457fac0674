//! Formula 1 live timing adapter
//!
//! Formula 1 multiplexes its topics on a single `Streaming.feed` method: the first
//! argument names the topic and the second carries its payload. Track status and
//! race control messages both become flag reports. The session is over once the
//! number of Chequered flags for its session type has been seen.

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

use super::runtime::AdapterRuntime;
use super::{Adapter, AdapterContext, AdapterEvent, EventSink, race_control, track_status};
use crate::arbiter::FlagView;
use crate::provider::Provider;
use crate::transport::{HubSubscription, Transport};
use crate::{AdapterState, Category, Flag, FlagData, RaceControlError, Result, Session};

const HUB: &str = "Streaming";
const FEED_METHOD: &str = "feed";
const SUBSCRIBE_METHOD: &str = "Subscribe";
const TOPICS: [&str; 2] = ["RaceControlMessages", "TrackStatus"];

/// Frame parser for one Formula 1 session.
pub struct Formula1Parser {
    events: EventSink,
    flags: FlagView,
    remaining_chequered: u32,
    /// Highest race-control sequence number handled so far.
    last_sequence: Option<u64>,
    finished: Arc<AtomicBool>,
}

impl Formula1Parser {
    pub fn new(events: EventSink, flags: FlagView, chequered_threshold: u32) -> Self {
        Self {
            events,
            flags,
            remaining_chequered: chequered_threshold,
            last_sequence: None,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    fn with_finished(mut self, finished: Arc<AtomicBool>) -> Self {
        self.finished = finished;
        self
    }

    pub fn remaining_chequered(&self) -> u32 {
        self.remaining_chequered
    }

    /// Handle the argument array of a `Streaming.feed` frame.
    pub fn handle_feed(&mut self, args: &[Value]) {
        let topic = args.first().and_then(Value::as_str).unwrap_or_default();
        let Some(payload) = args.get(1) else {
            debug!(topic, "Feed frame without payload");
            return;
        };

        match topic {
            "TrackStatus" => self.handle_track_status(payload),
            "RaceControlMessages" => self.handle_race_control(payload),
            other => trace!(topic = other, "Ignoring feed topic"),
        }
    }

    fn handle_track_status(&mut self, payload: &Value) {
        let Some(code) = payload.get("Status").and_then(track_status::code_from_value) else {
            warn!("Invalid track status message: {}", payload);
            return;
        };
        match track_status::map_code(Category::Formula1, code) {
            Some(flag) => self.emit(FlagData::new(flag)),
            None => debug!(code, "Unmapped track status code"),
        }
    }

    fn handle_race_control(&mut self, payload: &Value) {
        let messages = match race_control::messages(payload) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        for (seq, message) in &messages {
            // The snapshot sent after a resubscribe repeats a message already handled.
            if self.last_sequence.is_some_and(|last| *seq <= last) {
                trace!(seq, "Race control message already handled");
                continue;
            }
            self.last_sequence = Some(*seq);

            // Re-read per message: an earlier one may have moved the stored flag.
            match race_control::interpret(message, self.flags.flag()) {
                Ok(Some(data)) => self.emit(data),
                Ok(None) => trace!(category = %message.category, "Race control message ignored"),
                Err(e) => warn!("{}", e),
            }
        }
    }

    fn emit(&mut self, data: FlagData) {
        info!(flag = %data.flag(), driver = ?data.driver(), "Formula 1 flag parsed");
        (self.events)(AdapterEvent::FlagParsed(data));

        if data.flag() != Flag::Chequered || self.remaining_chequered == 0 {
            return;
        }
        self.remaining_chequered -= 1;
        if self.remaining_chequered == 0 {
            info!("Formula 1 session finished");
            self.finished.store(true, Ordering::Release);
            (self.events)(AdapterEvent::SessionFinished);
        } else {
            debug!(remaining = self.remaining_chequered, "Chequered flag counted");
        }
    }
}

/// Adapter for `livetiming.formula1.com`.
pub struct Formula1Adapter {
    context: AdapterContext,
    runtime: AdapterRuntime,
}

impl Formula1Adapter {
    pub fn new(context: AdapterContext) -> Self {
        Self { context, runtime: AdapterRuntime::new(Category::Formula1) }
    }

    pub fn subscription(endpoint: &str) -> HubSubscription {
        HubSubscription::new(endpoint, HUB, vec![json!(TOPICS)])
    }
}

#[async_trait::async_trait]
impl Adapter for Formula1Adapter {
    fn category(&self) -> Category {
        Category::Formula1
    }

    fn state(&self) -> AdapterState {
        self.runtime.state()
    }

    async fn start(&mut self, session: &Session, provider: Box<dyn Provider>) -> Result<()> {
        let threshold = session.effective_chequered_threshold().ok_or_else(|| {
            RaceControlError::configuration(format!("no chequered threshold for session '{}'", session.session_key))
        })?;
        info!(session = %session.session_key, threshold, "Starting Formula 1 adapter");

        let mut parser = Formula1Parser::new(
            Arc::clone(&self.context.events),
            self.context.flags.clone(),
            threshold,
        )
        .with_finished(self.runtime.finished_flag());

        let mut transport = Transport::new(
            Self::subscription(&self.context.endpoint),
            provider,
            self.context.transport.clone(),
        );
        transport.add_handler(HUB, FEED_METHOD, move |args| parser.handle_feed(args));

        self.runtime
            .launch(transport, SUBSCRIBE_METHOD, self.context.transport.start_timeout())
            .await
    }

    async fn stop(&mut self) {
        self.runtime.stop().await;
    }
}
