//! Test utilities shared by unit tests, integration tests and benches.

#![cfg(any(test, feature = "benchmark"))]

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::broadcast::Broadcast;
use crate::{FlagData, OutboundEvent, Session};

/// Broadcast sink that records every event it is handed.
#[derive(Default)]
pub struct RecordingBroadcast {
    events: Mutex<Vec<OutboundEvent>>,
}

impl RecordingBroadcast {
    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().clone()
    }

    /// Only the flag payloads, in broadcast order.
    pub fn flags(&self) -> Vec<FlagData> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                OutboundEvent::FlagChange(data) => Some(*data),
                OutboundEvent::SessionChange(_) => None,
            })
            .collect()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                OutboundEvent::SessionChange(session) => Some(session.clone()),
                OutboundEvent::FlagChange(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Broadcast for RecordingBroadcast {
    fn broadcast(&self, event: OutboundEvent) {
        self.events.lock().push(event);
    }
}

/// `["TrackStatus", {"Status": code, "Message": ..}]` as carried by the Formula 1 feed.
pub fn f1_track_status(code: &str) -> Vec<Value> {
    vec![json!("TrackStatus"), json!({ "Status": code, "Message": "" }), json!("2025-07-06T14:03:11.000Z")]
}

/// Incremental race-control update with a single message under `seq`.
pub fn f1_race_control(seq: u32, message: Value) -> Vec<Value> {
    let mut messages = serde_json::Map::new();
    messages.insert(seq.to_string(), message);
    vec![json!("RaceControlMessages"), json!({ "Messages": messages }), json!("2025-07-06T14:03:11.000Z")]
}

/// Race-control flag message body.
pub fn rc_flag(flag: &str, racing_number: Option<&str>) -> Value {
    let mut message = json!({
        "Utc": "2025-07-06T14:03:11",
        "Category": "Flag",
        "Flag": flag,
        "Message": format!("{flag} FLAG"),
    });
    if let Some(number) = racing_number {
        message["RacingNumber"] = json!(number);
    }
    message
}

/// FIA `trackfeed` arguments.
pub fn fia_track_status(value: &str) -> Vec<Value> {
    vec![json!("F2"), json!({ "Value": value })]
}

/// FIA `sessionfeed` arguments.
pub fn fia_session_status(value: &str) -> Vec<Value> {
    vec![json!("F2"), json!({ "Value": value })]
}

/// FIA `timefeed` arguments with the given remaining time.
pub fn fia_time(remaining: &str) -> Vec<Value> {
    vec![json!("F2"), json!(true), json!(remaining)]
}
