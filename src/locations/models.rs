use serde::{Deserialize, Serialize};

/// Forecast days requested for the device position
const LIVE_FORECAST_DAYS: u8 = 3;
/// Forecast days requested for saved and searched places
const PLACE_FORECAST_DAYS: u8 = 7;

const LIVE_TREND_HOURS: u32 = 24;
const PLACE_TREND_HOURS: u32 = 72;

/// A place weather can be shown for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Unique identifier (geocoder id for searched places)
    pub id: String,
    /// Display name
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Device position rather than a searched or saved place
    #[serde(default)]
    pub is_live: bool,
}

impl Location {
    pub const LIVE_ID: &'static str = "current-position";

    /// Location resolved from the device position
    pub fn live(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: Self::LIVE_ID.to_string(),
            name: name.into(),
            latitude,
            longitude,
            is_live: true,
        }
    }

    pub fn forecast_days(&self) -> u8 {
        if self.is_live {
            LIVE_FORECAST_DAYS
        } else {
            PLACE_FORECAST_DAYS
        }
    }

    /// Largest hour offset that can fall inside the fetched horizon
    pub fn max_offset_hours(&self) -> u32 {
        if self.is_live {
            24
        } else {
            168
        }
    }

    pub fn trend_horizon_hours(&self) -> u32 {
        if self.is_live {
            LIVE_TREND_HOURS
        } else {
            PLACE_TREND_HOURS
        }
    }

    pub fn clamp_offset(&self, hours: u32) -> u32 {
        hours.clamp(1, self.max_offset_hours())
    }

    /// Copy to keep in the saved list. The live position is pinned at its
    /// current coordinates under an id of its own, so it no longer follows
    /// the device and gets the place horizon.
    pub fn to_saved(&self) -> Location {
        if !self.is_live {
            return self.clone();
        }
        Location {
            id: format!("pos_{:.4}_{:.4}", self.latitude, self.longitude),
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            is_live: false,
        }
    }

    /// Check identifier and coordinates before persisting or fetching
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_string());
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} out of range", self.longitude));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place() -> Location {
        Location {
            id: "2643743".to_string(),
            name: "London".to_string(),
            latitude: 51.5085,
            longitude: -0.1257,
            is_live: false,
        }
    }

    #[test]
    fn test_horizon_policy() {
        let live = Location::live("Here", 51.5, -0.1);
        assert_eq!(live.forecast_days(), 3);
        assert_eq!(live.max_offset_hours(), 24);
        assert_eq!(live.trend_horizon_hours(), 24);

        let saved = place();
        assert_eq!(saved.forecast_days(), 7);
        assert_eq!(saved.max_offset_hours(), 168);
        assert_eq!(saved.trend_horizon_hours(), 72);
    }

    #[test]
    fn test_clamp_offset() {
        let live = Location::live("Here", 51.5, -0.1);
        assert_eq!(live.clamp_offset(30), 24);
        assert_eq!(live.clamp_offset(0), 1);
        assert_eq!(place().clamp_offset(30), 30);
        assert_eq!(place().clamp_offset(500), 168);
    }

    #[test]
    fn test_validate() {
        assert!(place().validate().is_ok());

        let mut bad = place();
        bad.latitude = 91.0;
        assert!(bad.validate().is_err());

        let mut bad = place();
        bad.id = "  ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_saving_live_position_pins_it() {
        let saved = Location::live("Here", 51.50853, -0.12574).to_saved();
        assert_eq!(saved.id, "pos_51.5085_-0.1257");
        assert_eq!(saved.name, "Here");
        assert!(!saved.is_live);
        assert_eq!(saved.forecast_days(), 7);

        assert_eq!(place().to_saved(), place());
    }

    #[test]
    fn test_is_live_defaults_to_false() {
        let loc: Location = serde_json::from_str(
            r#"{"id":"1","name":"Oslo","latitude":59.91,"longitude":10.75}"#,
        )
        .unwrap();
        assert!(!loc.is_live);
    }
}
