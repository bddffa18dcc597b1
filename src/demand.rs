use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use rand::rngs::StdRng;

use crate::grid::District;
use crate::util::weighted_choice;

/// One labeled hour band of the daily demand curve.
#[derive(Debug, Clone, Copy)]
pub struct TimeOfDayBand {
    pub label: &'static str,
    pub start_hour: u32,
    pub end_hour: u32,
    pub multiplier: f64,
}

/// Non-overlapping, exhaustive partition of [0, 24).
pub const TIME_OF_DAY_BANDS: [TimeOfDayBand; 5] = [
    TimeOfDayBand { label: "night", start_hour: 0, end_hour: 6, multiplier: 0.2 },
    TimeOfDayBand { label: "morning_rush", start_hour: 6, end_hour: 9, multiplier: 1.5 },
    TimeOfDayBand { label: "midday", start_hour: 9, end_hour: 16, multiplier: 0.8 },
    TimeOfDayBand { label: "evening_rush", start_hour: 16, end_hour: 19, multiplier: 1.6 },
    TimeOfDayBand { label: "evening", start_hour: 19, end_hour: 24, multiplier: 0.6 },
];

// Impact of {clear, rain, heavy_rain, snow, fog} on demand, with selection
// weights scaled to integers.
const WEATHER_FACTORS: [f64; 5] = [1.0, 0.7, 0.5, 0.4, 0.6];
const WEATHER_WEIGHTS: [u32; 5] = [60, 20, 5, 5, 10];

/// Converts a timestamp and district into a traffic-intensity multiplier.
pub struct DemandModel {
    rng: StdRng,
}

impl DemandModel {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Combined time-of-day, district, and weather multiplier. Always
    /// strictly positive.
    pub fn multiplier(&mut self, timestamp: DateTime<Utc>, district: District) -> f64 {
        self.time_factor(timestamp) * district.traffic_multiplier() * self.weather_impact()
    }

    fn time_factor(&mut self, timestamp: DateTime<Utc>) -> f64 {
        let hour = timestamp.hour();
        for band in &TIME_OF_DAY_BANDS {
            if (band.start_hour..band.end_hour).contains(&hour) {
                return band.multiplier * self.rng.gen_range(0.8..1.2);
            }
        }
        // The bands partition [0, 24), so this only covers an out-of-range hour.
        1.0
    }

    /// Weather impact on demand, re-drawn on every call: intersections
    /// synthesized within the same tick may see different conditions.
    fn weather_impact(&mut self) -> f64 {
        *weighted_choice(&mut self.rng, &WEATHER_FACTORS, &WEATHER_WEIGHTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, 30, 0).unwrap()
    }

    #[test]
    fn bands_partition_the_day() {
        let mut covered = [false; 24];
        for band in &TIME_OF_DAY_BANDS {
            for hour in band.start_hour..band.end_hour {
                assert!(!covered[hour as usize], "hour {hour} covered twice");
                covered[hour as usize] = true;
            }
        }
        assert!(covered.iter().all(|&hit| hit));
    }

    #[test]
    fn time_factor_jitters_around_the_band_base() {
        let mut model = DemandModel::new(StdRng::seed_from_u64(42));
        for _ in 0..200 {
            let factor = model.time_factor(at_hour(7));
            assert!(factor >= 1.5 * 0.8 && factor < 1.5 * 1.2);
        }
    }

    #[test]
    fn weather_impact_stays_in_the_declared_set() {
        let mut model = DemandModel::new(StdRng::seed_from_u64(42));
        for _ in 0..200 {
            let impact = model.weather_impact();
            assert!(WEATHER_FACTORS.contains(&impact));
        }
    }

    #[test]
    fn multiplier_is_strictly_positive_for_every_hour_and_district() {
        let mut model = DemandModel::new(StdRng::seed_from_u64(7));
        for hour in 0..24 {
            for district in District::ALL {
                let multiplier = model.multiplier(at_hour(hour), district);
                assert!(multiplier > 0.0, "hour {hour} district {district:?}");
            }
        }
    }

    #[test]
    fn rush_hour_downtown_outweighs_night_suburbs() {
        // Compare band bases without jitter noise by averaging.
        let mut model = DemandModel::new(StdRng::seed_from_u64(9));
        let average = |model: &mut DemandModel, hour: u32, district: District| {
            (0..500)
                .map(|_| model.multiplier(at_hour(hour), district))
                .sum::<f64>()
                / 500.0
        };
        let rush = average(&mut model, 17, District::Downtown);
        let night = average(&mut model, 2, District::Suburban);
        assert!(rush > night * 5.0);
    }
}
