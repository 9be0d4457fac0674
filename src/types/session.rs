//! Scheduled session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of Chequered flags a Formula 1 session shows before it is over.
///
/// Qualifying runs three parts, each ending with a Chequered flag.
pub fn default_chequered_threshold(session_key: &str) -> Option<u32> {
    match session_key {
        "fp1" | "fp2" | "fp3" | "sprint" | "gp" => Some(1),
        "qualifying" | "sprintQualifying" => Some(3),
        _ => None,
    }
}

/// A scheduled session, as read from the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Provider key, e.g. `f1`. Kept raw so unknown keys can be reported.
    pub category_key: String,
    /// Session type key, e.g. `qualifying`.
    pub session_key: String,
    pub scheduled_time: DateTime<Utc>,
    /// Overrides the built-in threshold table when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chequered_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Session {
    pub fn new(
        category_key: impl Into<String>,
        session_key: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            category_key: category_key.into(),
            session_key: session_key.into(),
            scheduled_time,
            chequered_threshold: None,
            name: None,
        }
    }

    pub fn with_chequered_threshold(mut self, threshold: u32) -> Self {
        self.chequered_threshold = Some(threshold);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Session threshold, falling back to the table for the session key.
    pub fn effective_chequered_threshold(&self) -> Option<u32> {
        self.chequered_threshold.or_else(|| default_chequered_threshold(&self.session_key))
    }
}
