// Demo-mode reading generator
//
// Produces plausible readings while no device is attached. Stateless: every
// call draws fresh values inside fixed ranges.

use chrono::Utc;
use rand::Rng;
use std::ops::RangeInclusive;

use crate::streaming::types::Reading;

pub const WATER_TEMP_RANGE: RangeInclusive<f64> = 24.0..=32.0;
pub const AIR_TEMP_RANGE: RangeInclusive<f64> = 22.0..=30.0;
pub const AIR_PRESSURE_RANGE: RangeInclusive<f64> = 1.5..=3.5;
pub const WATER_PRESSURE_RANGE: RangeInclusive<f64> = 2.0..=4.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn generate(&self) -> Reading {
        let mut rng = rand::thread_rng();
        Reading {
            timestamp: Utc::now(),
            water_temp: round2(rng.gen_range(WATER_TEMP_RANGE)),
            air_temp: round2(rng.gen_range(AIR_TEMP_RANGE)),
            air_pressure: round2(rng.gen_range(AIR_PRESSURE_RANGE)),
            water_pressure: round2(rng.gen_range(WATER_PRESSURE_RANGE)),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
