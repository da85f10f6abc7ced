use serde::{Deserialize, Serialize};

/// Procedurally generated course for one day. Regenerating from the same
/// day key always reproduces the same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescription {
    pub day_key: String,
    /// Meters.
    pub length: u32,
    pub corner_density: u32,
    pub straight_ratio: u32,
    /// Meters, one decimal.
    pub width: f64,
    pub surface_grip: u32,
    pub elevation_profile: Vec<f64>,
    pub weather_probability: u32,
    pub laps_required: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DailyModifier {
    Rain,
    DirtyAir,
    HighTyreWear,
    SafetyCar,
    LowGrip,
}

impl DailyModifier {
    pub const ALL: [DailyModifier; 5] = [
        DailyModifier::Rain,
        DailyModifier::DirtyAir,
        DailyModifier::HighTyreWear,
        DailyModifier::SafetyCar,
        DailyModifier::LowGrip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DailyModifier::Rain => "RAIN",
            DailyModifier::DirtyAir => "DIRTY_AIR",
            DailyModifier::HighTyreWear => "HIGH_TYRE_WEAR",
            DailyModifier::SafetyCar => "SAFETY_CAR",
            DailyModifier::LowGrip => "LOW_GRIP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}
