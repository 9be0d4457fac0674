//! Flag report record

use serde::{Deserialize, Deserializer, Serialize};

use super::Flag;
use crate::RaceControlError;

/// A flag together with the car it concerns.
///
/// `driver` is only ever present for [`Flag::Blue`] and [`Flag::BlackWhite`].
/// The constructors and deserialization enforce this so downstream code never has to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FlagData {
    flag: Flag,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver: Option<u32>,
}

#[derive(Deserialize)]
struct WireFlagData {
    flag: Flag,
    #[serde(default)]
    driver: Option<u32>,
}

impl TryFrom<WireFlagData> for FlagData {
    type Error = RaceControlError;

    fn try_from(wire: WireFlagData) -> Result<Self, Self::Error> {
        if wire.driver.is_some() && !wire.flag.carries_driver() {
            return Err(RaceControlError::parse(
                "flag data",
                format!("{} flag cannot carry a driver", wire.flag),
            ));
        }
        Ok(Self { flag: wire.flag, driver: wire.driver })
    }
}

impl<'de> Deserialize<'de> for FlagData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireFlagData::deserialize(deserializer)?;
        Self::try_from(wire).map_err(serde::de::Error::custom)
    }
}

impl FlagData {
    pub const fn flag(&self) -> Flag {
        self.flag
    }

    /// Car the flag is shown to, for car-specific flags.
    pub const fn driver(&self) -> Option<u32> {
        self.driver
    }

    /// Report without a driver.
    pub const fn new(flag: Flag) -> Self {
        Self { flag, driver: None }
    }

    /// Report for a specific car. The driver is discarded for flags that are not
    /// addressed to a single car.
    pub fn with_driver(flag: Flag, driver: Option<u32>) -> Self {
        let driver = if flag.carries_driver() { driver } else { None };
        Self { flag, driver }
    }
}

impl From<Flag> for FlagData {
    fn from(flag: Flag) -> Self {
        Self::new(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_only_kept_for_car_specific_flags() {
        assert_eq!(FlagData::with_driver(Flag::Blue, Some(44)).driver(), Some(44));
        assert_eq!(FlagData::with_driver(Flag::BlackWhite, Some(1)).driver(), Some(1));
        assert_eq!(FlagData::with_driver(Flag::Yellow, Some(44)).driver(), None);
    }

    #[test]
    fn serializes_without_absent_driver() {
        let json = serde_json::to_value(FlagData::new(Flag::Red)).unwrap();
        assert_eq!(json, serde_json::json!({ "flag": "Red" }));

        let json = serde_json::to_value(FlagData::with_driver(Flag::Blue, Some(7))).unwrap();
        assert_eq!(json, serde_json::json!({ "flag": "Blue", "driver": 7 }));
    }

    #[test]
    fn deserialization_rejects_driver_on_other_flags() {
        let blue: FlagData = serde_json::from_str(r#"{"flag":"Blue","driver":44}"#).unwrap();
        assert_eq!(blue, FlagData::with_driver(Flag::Blue, Some(44)));

        let red: FlagData = serde_json::from_str(r#"{"flag":"Red"}"#).unwrap();
        assert_eq!(red, FlagData::new(Flag::Red));

        let err = serde_json::from_str::<FlagData>(r#"{"flag":"Yellow","driver":3}"#).unwrap_err();
        assert!(err.to_string().contains("cannot carry a driver"));
    }
}
