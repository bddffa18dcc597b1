use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::util::round_to;

// ===== Districts =====

/// Zone categories that scale traffic demand and camera likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum District {
    Downtown,
    Residential,
    Industrial,
    Suburban,
}

impl District {
    pub const ALL: [District; 4] = [
        District::Downtown,
        District::Residential,
        District::Industrial,
        District::Suburban,
    ];

    pub fn traffic_multiplier(self) -> f64 {
        match self {
            District::Downtown => 1.5,
            District::Residential => 0.7,
            District::Industrial => 1.2,
            District::Suburban => 0.5,
        }
    }

    pub fn camera_probability(self) -> f64 {
        match self {
            District::Downtown => 0.8,
            District::Residential => 0.3,
            District::Industrial => 0.5,
            District::Suburban => 0.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            District::Downtown => "downtown",
            District::Residential => "residential",
            District::Industrial => "industrial",
            District::Suburban => "suburban",
        }
    }

    /// Band a cell by its distance, in cell units, from the grid's
    /// geometric center.
    fn for_cell(i: u32, j: u32, size: u32) -> District {
        let half = f64::from(size) / 2.0;
        let distance = (f64::from(i) - half).hypot(f64::from(j) - half);
        if distance < 3.0 {
            District::Downtown
        } else if distance < 5.0 {
            District::Residential
        } else if distance < 7.0 {
            District::Industrial
        } else {
            District::Suburban
        }
    }
}

// ===== Intersections =====

/// One grid intersection. Immutable once generated; identity and district
/// are deterministic in (i, j), lane counts and camera presence are drawn
/// from the caller's random source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intersection {
    pub intersection_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub lanes_north_south: u8,
    pub lanes_east_west: u8,
    pub has_camera: bool,
    pub district: District,
}

const LANE_OPTIONS: [u8; 3] = [2, 3, 4];

/// Neighboring intersections sit approx 0.01 degrees (1.1 km) apart.
const CELL_SPACING_DEG: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct CityGrid {
    center: (f64, f64),
    size: u32,
    intersections: Vec<Intersection>,
}

impl CityGrid {
    /// Generate an N x N intersection grid around `center`.
    pub fn build(
        center: (f64, f64),
        size: u32,
        rng: &mut impl Rng,
    ) -> Result<Self, GenerationError> {
        if size == 0 {
            return Err(GenerationError::InvalidGridSize(0));
        }
        let (lat_base, lon_base) = center;
        if !(-90.0..=90.0).contains(&lat_base) || !(-180.0..=180.0).contains(&lon_base) {
            return Err(GenerationError::InvalidCenter {
                lat: lat_base,
                lon: lon_base,
            });
        }

        let half = f64::from(size) / 2.0;
        let mut intersections = Vec::with_capacity((size * size) as usize);

        for i in 0..size {
            for j in 0..size {
                let district = District::for_cell(i, j, size);
                intersections.push(Intersection {
                    intersection_id: format!("INT-{i:02}{j:02}"),
                    name: format!("{} St & {} Ave", char::from(b'A' + (i % 26) as u8), j + 1),
                    latitude: round_to(lat_base + (f64::from(i) - half) * CELL_SPACING_DEG, 6),
                    longitude: round_to(lon_base + (f64::from(j) - half) * CELL_SPACING_DEG, 6),
                    lanes_north_south: *LANE_OPTIONS.choose(rng).unwrap(),
                    lanes_east_west: *LANE_OPTIONS.choose(rng).unwrap(),
                    has_camera: rng.gen_bool(district.camera_probability()),
                    district,
                });
            }
        }

        Ok(Self {
            center,
            size,
            intersections,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }
}
