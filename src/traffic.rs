use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::grid::{District, Intersection};
use crate::util::round_to;

// ===== Wire types =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Red,
    Yellow,
    Green,
}

impl SignalState {
    pub const ALL: [SignalState; 3] = [SignalState::Red, SignalState::Yellow, SignalState::Green];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleTypeCounts {
    pub car: u32,
    pub truck: u32,
    pub motorcycle: u32,
    pub bus: u32,
}

impl VehicleTypeCounts {
    pub fn total(&self) -> u32 {
        self.car + self.truck + self.motorcycle + self.bus
    }
}

/// One traffic sensor reading. Embeds intersection identity, location and
/// district so downstream consumers need no join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficReading {
    pub sensor_id: String,
    pub intersection_id: String,
    pub timestamp: DateTime<Utc>,
    pub vehicle_count: u32,
    pub average_speed: f64,
    pub occupancy_rate: f64,
    pub vehicle_types: VehicleTypeCounts,
    pub wait_time_seconds: f64,
    pub queue_length: u32,
    pub signal_state: SignalState,
    pub latitude: f64,
    pub longitude: f64,
    pub district: District,
}

// ===== Synthesizer =====

const BASE_SPEED_MPH: f64 = 35.0;

/// Turns one intersection, timestamp and demand multiplier into a fully
/// populated reading.
pub struct TrafficSynthesizer {
    rng: StdRng,
}

impl TrafficSynthesizer {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    pub fn synthesize(
        &mut self,
        intersection: &Intersection,
        timestamp: DateTime<Utc>,
        demand: f64,
    ) -> TrafficReading {
        let lanes = u32::from(intersection.lanes_north_south) + u32::from(intersection.lanes_east_west);
        let base_capacity = f64::from(lanes * 10);

        let raw_count = (base_capacity * demand) as i64 + self.rng.gen_range(-5..=5);
        let vehicle_count = raw_count.max(0) as u32;

        let max_capacity = base_capacity * 2.0;
        let occupancy = (f64::from(vehicle_count) / max_capacity).min(1.0);

        // Speed decreases with occupancy, floored at 5 mph.
        let average_speed = (BASE_SPEED_MPH * (1.0 - occupancy * 0.7)).max(5.0);

        let vehicle_types = self.split_vehicle_types(vehicle_count);

        let wait_time = occupancy * self.rng.gen_range(30.0..120.0);
        let queue_length = (occupancy * base_capacity * 0.5) as u32;

        // Signal state is deliberately uncoupled from the rest of the model.
        let signal_state = *SignalState::ALL.choose(&mut self.rng).unwrap();

        TrafficReading {
            sensor_id: format!("{}-SENSOR-01", intersection.intersection_id),
            intersection_id: intersection.intersection_id.clone(),
            timestamp,
            vehicle_count,
            average_speed: round_to(average_speed, 2),
            occupancy_rate: round_to(occupancy, 3),
            vehicle_types,
            wait_time_seconds: round_to(wait_time, 1),
            queue_length,
            signal_state,
            latitude: intersection.latitude,
            longitude: intersection.longitude,
            district: intersection.district,
        }
    }

    // The four fractions are drawn independently and rarely sum to 1; the
    // car share is back-computed so the counts always sum to the total.
    fn split_vehicle_types(&mut self, total: u32) -> VehicleTypeCounts {
        let truck = (f64::from(total) * self.rng.gen_range(0.05..0.12)) as u32;
        let motorcycle = (f64::from(total) * self.rng.gen_range(0.02..0.05)) as u32;
        let bus = (f64::from(total) * self.rng.gen_range(0.01..0.03)) as u32;
        let car = total - (truck + motorcycle + bus);
        VehicleTypeCounts {
            car,
            truck,
            motorcycle,
            bus,
        }
    }
}
