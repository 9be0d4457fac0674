//! Formula 1 race-control message interpretation

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::{Flag, FlagData, RaceControlError, Result};

static NOT_RESUMING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)WILL NOT.*RESUME").expect("static regex"));

/// One race-control message as published in `RaceControlMessages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RaceControlMessage {
    pub utc: Option<String>,
    pub category: String,
    pub message: String,
    pub flag: Option<String>,
    pub scope: Option<String>,
    /// String in live data, occasionally a number in captures.
    pub racing_number: Option<Value>,
}

impl RaceControlMessage {
    fn driver(&self) -> Option<u32> {
        match self.racing_number.as_ref()? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        }
    }
}

/// Extract the messages to act on from a `RaceControlMessages` payload, each with
/// its sequence number.
///
/// The first payload of a subscription is a snapshot array, of which only the
/// newest message matters; its sequence number is its array index. Later payloads
/// map sequence numbers to messages and are returned in sequence order.
pub fn messages(payload: &Value) -> Result<Vec<(u64, RaceControlMessage)>> {
    let Some(messages) = payload.get("Messages") else {
        return Err(RaceControlError::parse("race control", "payload without Messages"));
    };

    let raw: Vec<(u64, &Value)> = match messages {
        Value::Array(items) => items
            .last()
            .map(|last| (items.len() as u64 - 1, last))
            .into_iter()
            .collect(),
        Value::Object(map) => {
            let mut entries: Vec<(u64, &Value)> = map
                .iter()
                .filter_map(|(key, value)| match key.parse::<u64>() {
                    Ok(seq) => Some((seq, value)),
                    Err(_) => {
                        debug!("Skipping race control entry with key {:?}", key);
                        None
                    }
                })
                .collect();
            entries.sort_by_key(|(seq, _)| *seq);
            entries
        }
        other => {
            return Err(RaceControlError::parse(
                "race control",
                format!("Messages is neither array nor object: {other}"),
            ));
        }
    };

    let mut parsed = Vec::with_capacity(raw.len());
    for (seq, value) in raw {
        match RaceControlMessage::deserialize(value) {
            Ok(message) => parsed.push((seq, message)),
            Err(e) => warn!(seq, "Dropping race control message: {}", e),
        }
    }
    Ok(parsed)
}

/// Turn one message into a flag report, given the currently stored flag.
///
/// `Ok(None)` means the message is deliberately ignored. Flag text outside the
/// mapping table is an [`RaceControlError::UnknownFlagText`] error.
pub fn interpret(message: &RaceControlMessage, current: Flag) -> Result<Option<FlagData>> {
    if message.message.contains("SLIPPERY") {
        return Ok(Some(FlagData::new(Flag::Surface)));
    }

    if NOT_RESUMING.is_match(&message.message) {
        debug!("Session will not resume: {}", message.message);
        return Ok(Some(FlagData::new(Flag::Chequered)));
    }

    if message.category != "Flag" {
        return Ok(None);
    }

    let text = message.flag.as_deref().unwrap_or_default();
    let Some(flag) = Flag::from_race_control_text(text) else {
        return Err(RaceControlError::unknown_flag_text(text));
    };

    // A hazard is in force; race control text must not interfere with it.
    if !matches!(current, Flag::Chequered | Flag::Clear | Flag::Yellow) {
        debug!(%flag, %current, "Race control flag suppressed");
        return Ok(None);
    }

    if flag == Flag::Clear && current != Flag::Chequered {
        debug!(%current, "Race control clear ignored until track status confirms");
        return Ok(None);
    }

    let driver = if flag.carries_driver() { message.driver() } else { None };
    Ok(Some(FlagData::with_driver(flag, driver)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flag_message(flag: &str) -> RaceControlMessage {
        RaceControlMessage { category: "Flag".into(), flag: Some(flag.into()), ..Default::default() }
    }

    fn text_message(category: &str, text: &str) -> RaceControlMessage {
        RaceControlMessage { category: category.into(), message: text.into(), ..Default::default() }
    }

    #[test]
    fn slippery_short_circuits() {
        let message = text_message("Other", "RISK OF RAIN - SLIPPERY SURFACE IN TURN 4");
        assert_eq!(interpret(&message, Flag::Red).unwrap(), Some(FlagData::new(Flag::Surface)));
    }

    #[test]
    fn not_resuming_forces_chequered() {
        let message = text_message("Other", "Session will not be resumed");
        assert_eq!(interpret(&message, Flag::Red).unwrap(), Some(FlagData::new(Flag::Chequered)));
    }

    #[test]
    fn non_flag_categories_are_ignored() {
        let mut message = flag_message("YELLOW");
        message.category = "Drs".into();
        assert_eq!(interpret(&message, Flag::Clear).unwrap(), None);
    }

    #[test]
    fn unknown_text_is_an_error() {
        let err = interpret(&flag_message("PURPLE"), Flag::Clear).unwrap_err();
        assert!(matches!(err, RaceControlError::UnknownFlagText { ref text } if text == "PURPLE"));
    }

    #[test]
    fn hazards_suppress_race_control() {
        for current in [Flag::SafetyCar, Flag::Red, Flag::Vsc, Flag::DoubleYellow] {
            assert_eq!(interpret(&flag_message("CLEAR"), current).unwrap(), None);
            assert_eq!(interpret(&flag_message("BLUE"), current).unwrap(), None);
        }
    }

    #[test]
    fn clear_needs_chequered() {
        assert_eq!(interpret(&flag_message("CLEAR"), Flag::Clear).unwrap(), None);
        assert_eq!(interpret(&flag_message("GREEN"), Flag::Yellow).unwrap(), None);
        assert_eq!(
            interpret(&flag_message("GREEN"), Flag::Chequered).unwrap(),
            Some(FlagData::new(Flag::Clear))
        );
    }

    #[test]
    fn driver_only_for_driver_flags() {
        let mut blue = flag_message("BLUE");
        blue.racing_number = Some(json!("44"));
        assert_eq!(interpret(&blue, Flag::Clear).unwrap(), Some(FlagData::with_driver(Flag::Blue, Some(44))));

        let mut black_white = flag_message("BLACK AND WHITE");
        black_white.racing_number = Some(json!(16));
        assert_eq!(
            interpret(&black_white, Flag::Yellow).unwrap(),
            Some(FlagData::with_driver(Flag::BlackWhite, Some(16)))
        );

        let mut yellow = flag_message("YELLOW");
        yellow.racing_number = Some(json!("1"));
        assert_eq!(interpret(&yellow, Flag::Clear).unwrap(), Some(FlagData::new(Flag::Yellow)));
    }

    #[test]
    fn unparsable_driver_is_absent() {
        let mut blue = flag_message("BLUE");
        blue.racing_number = Some(json!("forty-four"));
        assert_eq!(interpret(&blue, Flag::Clear).unwrap(), Some(FlagData::new(Flag::Blue)));
    }

    #[test]
    fn snapshot_uses_newest_message() {
        let payload = json!({ "Messages": [
            { "Category": "Flag", "Flag": "YELLOW", "Message": "YELLOW IN TRACK SECTOR 3" },
            { "Category": "Flag", "Flag": "CLEAR", "Message": "CLEAR IN TRACK SECTOR 3" },
        ]});
        let parsed = messages(&payload).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, 1);
        assert_eq!(parsed[0].1.flag.as_deref(), Some("CLEAR"));
    }

    #[test]
    fn updates_are_ordered_numerically() {
        let payload = json!({ "Messages": {
            "10": { "Category": "Flag", "Flag": "RED" },
            "9": { "Category": "Flag", "Flag": "YELLOW" },
            "x": { "Category": "Flag", "Flag": "BLUE" },
        }});
        let flags: Vec<(u64, Option<String>)> =
            messages(&payload).unwrap().into_iter().map(|(seq, m)| (seq, m.flag)).collect();
        assert_eq!(flags, vec![(9, Some("YELLOW".into())), (10, Some("RED".into()))]);
    }

    #[test]
    fn empty_snapshot_has_no_messages() {
        assert!(messages(&json!({ "Messages": [] })).unwrap().is_empty());
    }

    #[test]
    fn payload_without_messages_is_a_parse_error() {
        assert!(matches!(messages(&json!({})), Err(RaceControlError::Parse { .. })));
        assert!(matches!(messages(&json!({ "Messages": 3 })), Err(RaceControlError::Parse { .. })));
    }
}
