//! Timing provider identities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RaceControlError;

/// Timing provider a session belongs to.
///
/// Each category maps to exactly one adapter implementation, one base endpoint and
/// one feed topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Category {
    #[serde(rename = "f1")]
    Formula1,
    #[serde(rename = "f2")]
    Formula2,
    #[serde(rename = "f3")]
    Formula3,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Formula1, Category::Formula2, Category::Formula3];

    /// Key used by the session store.
    pub fn key(self) -> &'static str {
        match self {
            Category::Formula1 => "f1",
            Category::Formula2 => "f2",
            Category::Formula3 => "f3",
        }
    }

    /// Resolve a session-store key.
    pub fn from_key(key: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Public live-timing host of the provider.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Category::Formula1 => "https://livetiming.formula1.com",
            Category::Formula2 => "https://ltss.fiaformula2.com",
            Category::Formula3 => "https://ltss.fiaformula3.com",
        }
    }

    /// Human readable name used in log lines.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Formula1 => "Formula 1",
            Category::Formula2 => "Formula 2",
            Category::Formula3 => "Formula 3",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = RaceControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_key(s)
            .ok_or_else(|| RaceControlError::configuration(format!("unknown category key '{s}'")))
    }
}
