//! Formula 2 and Formula 3 live timing adapter
//!
//! Both series run the same timing service on their own host. The feeds are joined
//! with `JoinFeeds` on the versioned `/streaming` endpoint and arrive as three
//! separate methods:
//!
//! - `trackfeed`: numeric track status in `args[1].Value`
//! - `sessionfeed`: session lifecycle text in `args[1].Value`
//! - `timefeed`: remaining session time in `args[2]`
//!
//! A finish is only honoured after a "started" message was seen on this connection.

use chrono::TimeDelta;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, trace, warn};

use super::runtime::AdapterRuntime;
use super::{Adapter, AdapterContext, AdapterEvent, EventSink, track_status};
use crate::provider::Provider;
use crate::transport::{HubSubscription, ProtocolVersion, Transport};
use crate::{AdapterState, Category, Flag, FlagData, RaceControlError, Result, Session};

const SUBSCRIBE_HUB: &str = "streaming";
const FEED_HUB: &str = "Streaming";
const JOIN_METHOD: &str = "JoinFeeds";
const PATH: &str = "/streaming";
const FEEDS: [&str; 2] = ["status", "time"];

static SESSION_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?(?:(\d+)\.)?(\d{1,2}):(\d{2}):(\d{2})(?:\.(\d{1,7}))?$").expect("static regex")
});

/// Parse a remaining-time value in `[-][d.]hh:mm:ss[.fffffff]` form.
pub fn parse_session_clock(text: &str) -> Result<TimeDelta> {
    let invalid = || RaceControlError::parse("session clock", format!("invalid time '{text}'"));
    let caps = SESSION_CLOCK.captures(text.trim()).ok_or_else(invalid)?;

    let number = |index: usize| -> Result<i64> {
        caps.get(index).map_or(Ok(0), |m| m.as_str().parse::<i64>().map_err(|_| invalid()))
    };
    let (days, hours, minutes, seconds) = (number(2)?, number(3)?, number(4)?, number(5)?);
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(invalid());
    }

    // Fraction is in ticks of 100ns, right-padded to seven digits.
    let nanos = match caps.get(6) {
        Some(m) => format!("{:0<7}", m.as_str()).parse::<i64>().map_err(|_| invalid())? * 100,
        None => 0,
    };

    let total = TimeDelta::try_days(days).ok_or_else(invalid)?
        + TimeDelta::hours(hours)
        + TimeDelta::minutes(minutes)
        + TimeDelta::seconds(seconds)
        + TimeDelta::nanoseconds(nanos);
    Ok(if caps.get(1).is_some() { -total } else { total })
}

/// Frame parser for one FIA timing session.
pub struct FiaParser {
    category: Category,
    events: EventSink,
    has_started: bool,
    finished: Arc<AtomicBool>,
}

impl FiaParser {
    pub fn new(category: Category, events: EventSink) -> Self {
        Self { category, events, has_started: false, finished: Arc::new(AtomicBool::new(false)) }
    }

    fn with_finished(mut self, finished: Arc<AtomicBool>) -> Self {
        self.finished = finished;
        self
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn handle_track(&mut self, args: &[Value]) {
        let Some(code) = args.get(1).and_then(|p| p.get("Value")).and_then(track_status::code_from_value)
        else {
            warn!(category = %self.category, "Invalid track feed message: {:?}", args.get(1));
            return;
        };
        match track_status::map_code(self.category, code) {
            Some(flag) => self.emit(FlagData::new(flag)),
            None => debug!(category = %self.category, code, "Unmapped track status code"),
        }
    }

    pub fn handle_session(&mut self, args: &[Value]) {
        let Some(value) = args.get(1).and_then(|p| p.get("Value")).and_then(Value::as_str) else {
            warn!(category = %self.category, "Invalid session feed message: {:?}", args.get(1));
            return;
        };

        match value.to_lowercase().as_str() {
            "started" => {
                info!(category = %self.category, "Session started");
                self.has_started = true;
                self.emit(FlagData::new(Flag::Clear));
            }
            "finished" | "finalised" if self.has_started => self.finish(),
            "finished" | "finalised" => {
                debug!(category = %self.category, "Finish before start ignored");
            }
            other => trace!(category = %self.category, status = other, "Session feed message ignored"),
        }
    }

    pub fn handle_time(&mut self, args: &[Value]) {
        let Some(text) = args.get(2).and_then(Value::as_str).filter(|t| !t.trim().is_empty()) else {
            debug!(category = %self.category, "Time feed without remaining time");
            return;
        };

        let remaining = match parse_session_clock(text) {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!(category = %self.category, "{}", e);
                return;
            }
        };

        if self.has_started && remaining == TimeDelta::zero() {
            self.finish();
        } else {
            trace!(category = %self.category, remaining = text, "Session clock");
        }
    }

    fn finish(&mut self) {
        info!(category = %self.category, "{} session finished", self.category.display_name());
        self.has_started = false;
        self.emit(FlagData::new(Flag::Chequered));
        self.finished.store(true, Ordering::Release);
        (self.events)(AdapterEvent::SessionFinished);
    }

    fn emit(&self, data: FlagData) {
        info!(category = %self.category, flag = %data.flag(), "Flag parsed");
        (self.events)(AdapterEvent::FlagParsed(data));
    }
}

/// Adapter for the Formula 2 and Formula 3 timing service.
pub struct FiaAdapter {
    category: Category,
    context: AdapterContext,
    runtime: AdapterRuntime,
}

impl FiaAdapter {
    pub fn new(category: Category, context: AdapterContext) -> Self {
        Self { category, context, runtime: AdapterRuntime::new(category) }
    }

    pub fn subscription(category: Category, endpoint: &str) -> HubSubscription {
        let series = category.key().to_uppercase();
        HubSubscription::new(endpoint, SUBSCRIBE_HUB, vec![json!(series), json!(FEEDS)])
            .with_protocol(ProtocolVersion::new(2, 1))
            .with_path(PATH)
    }
}

#[async_trait::async_trait]
impl Adapter for FiaAdapter {
    fn category(&self) -> Category {
        self.category
    }

    fn state(&self) -> AdapterState {
        self.runtime.state()
    }

    async fn start(&mut self, session: &Session, provider: Box<dyn Provider>) -> Result<()> {
        info!(category = %self.category, session = %session.session_key, "Starting {} adapter", self.category.display_name());

        let parser = FiaParser::new(self.category, Arc::clone(&self.context.events))
            .with_finished(self.runtime.finished_flag());
        let parser = Arc::new(parking_lot::Mutex::new(parser));

        let mut transport = Transport::new(
            Self::subscription(self.category, &self.context.endpoint),
            provider,
            self.context.transport.clone(),
        );
        let time = Arc::clone(&parser);
        transport.add_handler(FEED_HUB, "timefeed", move |args| time.lock().handle_time(args));
        let track = Arc::clone(&parser);
        transport.add_handler(FEED_HUB, "trackfeed", move |args| track.lock().handle_track(args));
        transport.add_handler(FEED_HUB, "sessionfeed", move |args| parser.lock().handle_session(args));

        self.runtime
            .launch(transport, JOIN_METHOD, self.context.transport.start_timeout())
            .await
    }

    async fn stop(&mut self) {
        self.runtime.stop().await;
    }
}
