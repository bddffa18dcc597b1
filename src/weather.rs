use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::util::{round_to, weighted_choice};

// ===== Conditions =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rain,
    HeavyRain,
    Snow,
    Fog,
}

/// Value ranges a condition maps to: temperature and humidity spans, plus
/// base precipitation (in/hr) and visibility (miles).
struct ConditionProfile {
    temp: (f64, f64),
    humidity: (f64, f64),
    precipitation: f64,
    visibility: f64,
}

impl WeatherCondition {
    pub const ALL: [WeatherCondition; 6] = [
        WeatherCondition::Clear,
        WeatherCondition::Cloudy,
        WeatherCondition::Rain,
        WeatherCondition::HeavyRain,
        WeatherCondition::Snow,
        WeatherCondition::Fog,
    ];

    const SELECTION_WEIGHTS: [u32; 6] = [40, 30, 15, 5, 5, 5];

    pub fn as_str(self) -> &'static str {
        match self {
            WeatherCondition::Clear => "clear",
            WeatherCondition::Cloudy => "cloudy",
            WeatherCondition::Rain => "rain",
            WeatherCondition::HeavyRain => "heavy_rain",
            WeatherCondition::Snow => "snow",
            WeatherCondition::Fog => "fog",
        }
    }

    fn profile(self) -> ConditionProfile {
        match self {
            WeatherCondition::Clear => ConditionProfile {
                temp: (65.0, 85.0),
                humidity: (0.3, 0.5),
                precipitation: 0.0,
                visibility: 10.0,
            },
            WeatherCondition::Cloudy => ConditionProfile {
                temp: (60.0, 75.0),
                humidity: (0.5, 0.7),
                precipitation: 0.0,
                visibility: 10.0,
            },
            WeatherCondition::Rain => ConditionProfile {
                temp: (55.0, 70.0),
                humidity: (0.7, 0.9),
                precipitation: 0.1,
                visibility: 5.0,
            },
            WeatherCondition::HeavyRain => ConditionProfile {
                temp: (50.0, 65.0),
                humidity: (0.85, 0.95),
                precipitation: 0.5,
                visibility: 2.0,
            },
            WeatherCondition::Snow => ConditionProfile {
                temp: (20.0, 35.0),
                humidity: (0.7, 0.9),
                precipitation: 0.2,
                visibility: 3.0,
            },
            WeatherCondition::Fog => ConditionProfile {
                temp: (55.0, 65.0),
                humidity: (0.9, 1.0),
                precipitation: 0.0,
                visibility: 0.5,
            },
        }
    }
}

// ===== Readings =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReading {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature_f: f64,
    pub humidity: f64,
    pub precipitation_rate: f64,
    pub visibility_miles: f64,
    pub wind_speed_mph: f64,
    pub condition: WeatherCondition,
    pub latitude: f64,
    pub longitude: f64,
}

// ===== Synthesizer =====

pub const DEFAULT_STATION_ID: &str = "WEATHER-CENTRAL-01";

/// Conditions persist for a drawn number of generation calls.
pub const CONDITION_DURATION_RANGE: (u32, u32) = (4, 20);

/// Sticky weather process: the current condition holds until its duration
/// runs out, then a fresh condition and duration are drawn. Runs
/// indefinitely, one reading per call.
pub struct WeatherSynthesizer {
    station_id: String,
    latitude: f64,
    longitude: f64,
    condition: WeatherCondition,
    remaining_ticks: u32,
    rng: StdRng,
}

impl WeatherSynthesizer {
    pub fn new(center: (f64, f64), rng: StdRng) -> Self {
        Self {
            station_id: DEFAULT_STATION_ID.to_string(),
            latitude: center.0,
            longitude: center.1,
            condition: WeatherCondition::Clear,
            remaining_ticks: 0,
            rng,
        }
    }

    pub fn condition(&self) -> WeatherCondition {
        self.condition
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.remaining_ticks
    }

    pub fn generate(&mut self, timestamp: DateTime<Utc>) -> WeatherReading {
        if self.remaining_ticks == 0 {
            self.condition = *weighted_choice(
                &mut self.rng,
                &WeatherCondition::ALL,
                &WeatherCondition::SELECTION_WEIGHTS,
            );
            self.remaining_ticks = self
                .rng
                .gen_range(CONDITION_DURATION_RANGE.0..=CONDITION_DURATION_RANGE.1);
        }
        self.remaining_ticks -= 1;

        let profile = self.condition.profile();
        WeatherReading {
            station_id: self.station_id.clone(),
            timestamp,
            temperature_f: round_to(self.rng.gen_range(profile.temp.0..profile.temp.1), 1),
            humidity: round_to(self.rng.gen_range(profile.humidity.0..profile.humidity.1), 2),
            precipitation_rate: profile.precipitation * self.rng.gen_range(0.8..1.2),
            visibility_miles: profile.visibility * self.rng.gen_range(0.9..1.1),
            wind_speed_mph: round_to(self.rng.gen_range(0.0..25.0), 1),
            condition: self.condition,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}
