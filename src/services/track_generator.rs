use crate::models::track::{DailyModifier, TrackDescription};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

const ELEVATION_SAMPLES: std::ops::RangeInclusive<usize> = 8..=16;

/// Derives an independent, reproducible stream for one purpose of a day.
/// ChaCha keeps the sequence stable across platforms and releases.
fn stream(day_key: &str, purpose: &[u8]) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(purpose);
    hasher.update(b":");
    hasher.update(day_key.as_bytes());
    hasher.update(b"daily-race");
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    ChaCha8Rng::from_seed(seed)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn laps_required(day_key: &str) -> u32 {
    stream(day_key, b"laps").gen_range(3..=5)
}

pub fn daily_modifier(day_key: &str) -> DailyModifier {
    let mut rng = stream(day_key, b"modifier");
    DailyModifier::ALL[rng.gen_range(0..DailyModifier::ALL.len())]
}

/// Pure function of the day key: the same key always yields the same track.
pub fn generate_track(day_key: &str) -> TrackDescription {
    let mut rng = stream(day_key, b"track");

    let length = rng.gen_range(3000.0..=7000.0_f64).round() as u32;
    let corner_density = rng.gen_range(20..=80);
    let straight_ratio = rng.gen_range(30..=70);
    let width = round1(rng.gen_range(10.0..=15.0));
    let surface_grip = rng.gen_range(60..=95);
    let weather_probability = rng.gen_range(0..=30);

    let samples = rng.gen_range(ELEVATION_SAMPLES);
    let mut elevation = rng.gen_range(0.0..=50.0_f64);
    let elevation_profile = (0..samples)
        .map(|_| {
            elevation = (elevation + rng.gen_range(-12.0..=12.0_f64)).clamp(0.0, 150.0);
            round1(elevation)
        })
        .collect();

    TrackDescription {
        day_key: day_key.to_string(),
        length,
        corner_density,
        straight_ratio,
        width,
        surface_grip,
        elevation_profile,
        weather_probability,
        laps_required: laps_required(day_key),
    }
}
