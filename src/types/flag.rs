//! Canonical track-condition flags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical track-condition flag shown on the display panels.
///
/// The enumeration carries no ordering. Precedence between flags is a separate
/// lookup, see [`Flag::priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Flag {
    Clear,
    Yellow,
    DoubleYellow,
    SafetyCar,
    Vsc,
    Code60,
    Fyc,
    Red,
    Chequered,
    Blue,
    BlackWhite,
    Surface,
    None,
}

impl Flag {
    /// Every flag value, in declaration order.
    pub const ALL: [Flag; 13] = [
        Flag::Clear,
        Flag::Yellow,
        Flag::DoubleYellow,
        Flag::SafetyCar,
        Flag::Vsc,
        Flag::Code60,
        Flag::Fyc,
        Flag::Red,
        Flag::Chequered,
        Flag::Blue,
        Flag::BlackWhite,
        Flag::Surface,
        Flag::None,
    ];

    /// Clear and Chequered always take effect regardless of the stored flag.
    pub fn is_override(self) -> bool {
        matches!(self, Flag::Clear | Flag::Chequered)
    }

    /// Blue, Surface and BlackWhite are shown as an overlay on a clear track.
    pub fn is_information(self) -> bool {
        matches!(self, Flag::Blue | Flag::Surface | Flag::BlackWhite)
    }

    /// Whether this flag is addressed to a single car.
    pub fn carries_driver(self) -> bool {
        matches!(self, Flag::Blue | Flag::BlackWhite)
    }

    /// Precedence of a status flag.
    ///
    /// Returns `None` for the override flags and for [`Flag::None`], which sit
    /// outside the precedence table.
    pub fn priority(self) -> Option<u8> {
        match self {
            Flag::Blue | Flag::Surface | Flag::BlackWhite => Some(0),
            Flag::Yellow => Some(2),
            Flag::DoubleYellow => Some(3),
            Flag::Vsc | Flag::Code60 | Flag::Fyc => Some(4),
            Flag::SafetyCar => Some(5),
            Flag::Red => Some(6),
            Flag::Clear | Flag::Chequered | Flag::None => None,
        }
    }

    /// Map race-control flag text to a flag.
    ///
    /// Returns `None` for text outside the table; callers decide whether that is
    /// worth a warning.
    pub fn from_race_control_text(text: &str) -> Option<Flag> {
        let flag = match text.trim() {
            "BLUE" => Flag::Blue,
            "CHEQUERED" => Flag::Chequered,
            "CLEAR" | "GREEN" => Flag::Clear,
            "CODE 60" => Flag::Code60,
            "DOUBLE YELLOW" => Flag::DoubleYellow,
            "FULL COURSE YELLOW" => Flag::Fyc,
            "RED" => Flag::Red,
            "SAFETY CAR" => Flag::SafetyCar,
            "SLIPPERY SURFACE" => Flag::Surface,
            "VIRTUAL SAFETY CAR" => Flag::Vsc,
            "YELLOW" => Flag::Yellow,
            "BLACK AND WHITE" => Flag::BlackWhite,
            _ => return None,
        };
        Some(flag)
    }

    /// Name used on the wire and in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Clear => "Clear",
            Flag::Yellow => "Yellow",
            Flag::DoubleYellow => "DoubleYellow",
            Flag::SafetyCar => "SafetyCar",
            Flag::Vsc => "Vsc",
            Flag::Code60 => "Code60",
            Flag::Fyc => "Fyc",
            Flag::Red => "Red",
            Flag::Chequered => "Chequered",
            Flag::Blue => "Blue",
            Flag::BlackWhite => "BlackWhite",
            Flag::Surface => "Surface",
            Flag::None => "None",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = crate::RaceControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flag::ALL
            .into_iter()
            .find(|flag| flag.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::RaceControlError::unknown_flag_text(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_flags_have_no_priority() {
        assert_eq!(Flag::Clear.priority(), None);
        assert_eq!(Flag::Chequered.priority(), None);
        assert!(Flag::Clear.is_override());
        assert!(Flag::Chequered.is_override());
        assert!(!Flag::Red.is_override());
    }

    #[test]
    fn precedence_table() {
        assert_eq!(Flag::Blue.priority(), Some(0));
        assert_eq!(Flag::Surface.priority(), Some(0));
        assert_eq!(Flag::BlackWhite.priority(), Some(0));
        assert_eq!(Flag::Yellow.priority(), Some(2));
        assert_eq!(Flag::DoubleYellow.priority(), Some(3));
        assert_eq!(Flag::Vsc.priority(), Some(4));
        assert_eq!(Flag::Code60.priority(), Some(4));
        assert_eq!(Flag::Fyc.priority(), Some(4));
        assert_eq!(Flag::SafetyCar.priority(), Some(5));
        assert_eq!(Flag::Red.priority(), Some(6));
    }

    #[test]
    fn race_control_text_table() {
        assert_eq!(Flag::from_race_control_text("GREEN"), Some(Flag::Clear));
        assert_eq!(Flag::from_race_control_text("CLEAR"), Some(Flag::Clear));
        assert_eq!(Flag::from_race_control_text("DOUBLE YELLOW"), Some(Flag::DoubleYellow));
        assert_eq!(Flag::from_race_control_text("BLACK AND WHITE"), Some(Flag::BlackWhite));
        assert_eq!(Flag::from_race_control_text("VIRTUAL SAFETY CAR"), Some(Flag::Vsc));
        assert_eq!(Flag::from_race_control_text("PURPLE"), None);
    }

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for flag in Flag::ALL {
            assert_eq!(flag.as_str().parse::<Flag>().unwrap(), flag);
        }
        assert!("Magenta".parse::<Flag>().is_err());
    }
}
