//! Outbound display events

use serde::{Deserialize, Serialize};

use super::{FlagData, Session};

/// Event pushed to display clients.
///
/// Serializes as `{"event": "FlagChange", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundEvent {
    FlagChange(FlagData),
    SessionChange(Session),
}

impl OutboundEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::FlagChange(_) => "FlagChange",
            OutboundEvent::SessionChange(_) => "SessionChange",
        }
    }

    /// Serialize to the JSON text sent to every client.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
