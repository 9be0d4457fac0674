//! SignalR hub frame codec

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::{RaceControlError, Result};

/// A hub push frame: `{"H": hub, "M": method, "A": [args...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubFrame {
    #[serde(rename = "H")]
    pub hub: String,
    #[serde(rename = "M")]
    pub method: String,
    #[serde(rename = "A")]
    pub args: Vec<Value>,
}

impl HubFrame {
    pub fn new(hub: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self { hub: hub.into(), method: method.into(), args }
    }

    /// Build a frame from a JSON value, rejecting anything without a string hub,
    /// a string method and an argument array.
    fn from_value(value: &Value) -> Option<Self> {
        let hub = value.get("H")?.as_str()?;
        let method = value.get("M")?.as_str()?;
        let args = value.get("A")?.as_array()?;
        Some(Self::new(hub, method, args.clone()))
    }
}

/// Outgoing hub method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubInvocation {
    #[serde(rename = "H")]
    pub hub: String,
    #[serde(rename = "M")]
    pub method: String,
    #[serde(rename = "A")]
    pub args: Vec<Value>,
    #[serde(rename = "I")]
    pub id: u64,
}

impl HubInvocation {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode one websocket text message into the hub frames it carries.
///
/// Accepts either a persistent-connection envelope (`{"C": .., "M": [frames]}`) or a
/// bare hub frame. Keep-alives (`{}`), invocation results and init messages carry no
/// hub frames and decode to an empty list. Entries missing a required field are
/// dropped; only text that is not JSON at all is an error.
pub fn decode(text: &str) -> Result<Vec<HubFrame>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RaceControlError::parse("hub frame", e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(RaceControlError::parse("hub frame", "frame is not a JSON object"));
    };

    match object.get("M") {
        Some(Value::Array(entries)) => Ok(entries
            .iter()
            .filter_map(|entry| {
                let frame = HubFrame::from_value(entry);
                if frame.is_none() {
                    trace!("Dropping malformed hub frame entry");
                }
                frame
            })
            .collect()),
        Some(Value::String(_)) => Ok(HubFrame::from_value(&value).into_iter().collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_persistent_envelope() {
        let text = json!({
            "C": "d-1,2|A,0|B,1",
            "M": [
                { "H": "Streaming", "M": "feed", "A": ["TrackStatus", { "Status": "2" }, "ts"] },
                { "H": "Streaming", "M": "feed", "A": ["Heartbeat", {}, "ts"] }
            ]
        })
        .to_string();

        let frames = decode(&text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].hub, "Streaming");
        assert_eq!(frames[0].method, "feed");
        assert_eq!(frames[0].args[0], "TrackStatus");
    }

    #[test]
    fn accepts_bare_hub_frame() {
        let text = r#"{"H":"Streaming","M":"trackfeed","A":["F2",{"Value":"1"}]}"#;
        let frames = decode(text).unwrap();
        assert_eq!(frames, vec![HubFrame::new("Streaming", "trackfeed", vec![json!("F2"), json!({"Value": "1"})])]);
    }

    #[test]
    fn control_messages_carry_no_frames() {
        assert!(decode("{}").unwrap().is_empty());
        assert!(decode(r#"{"R":{},"I":"1"}"#).unwrap().is_empty());
        assert!(decode(r#"{"C":"s-0,1","S":1,"M":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let text = json!({
            "M": [
                { "H": "Streaming", "M": "feed" },
                { "H": "Streaming", "A": [] },
                { "H": "Streaming", "M": "feed", "A": "not-an-array" },
                { "H": "Streaming", "M": "feed", "A": [1] }
            ]
        })
        .to_string();
        let frames = decode(&text).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].args, vec![json!(1)]);
    }

    #[test]
    fn non_json_is_a_parse_error() {
        assert!(matches!(decode("not json"), Err(RaceControlError::Parse { .. })));
        assert!(matches!(decode("[1,2]"), Err(RaceControlError::Parse { .. })));
    }

    #[test]
    fn invocation_wire_shape() {
        let invocation = HubInvocation {
            hub: "Streaming".into(),
            method: "Subscribe".into(),
            args: vec![json!(["RaceControlMessages", "TrackStatus"])],
            id: 1,
        };
        let value: Value = serde_json::from_str(&invocation.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "H": "Streaming", "M": "Subscribe", "A": [["RaceControlMessages", "TrackStatus"]], "I": 1 })
        );
    }
}
