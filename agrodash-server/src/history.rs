//! Historique simulé des dernières 24h pour les graphiques.
//!
//! Pas de stockage derrière : une sinusoïde par topic plus du bruit entier.
//! Sortie du plus ancien (il y a 23h) au plus récent (maintenant).

use crate::models::HistoricalPoint;
use rand::Rng;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

const HISTORY_POINTS: i64 = 24;

pub fn generate_mock<R: Rng + ?Sized>(
    topic: &str,
    now: OffsetDateTime,
    rng: &mut R,
) -> Vec<HistoricalPoint> {
    (0..HISTORY_POINTS)
        .rev()
        .map(|hours_ago| {
            let at = now - Duration::hours(hours_ago);
            let i = hours_ago as f64;
            let value = match topic {
                "humidity" => 45.0 + (i * 0.5).sin() * 15.0 + f64::from(rng.random_range(-5..=5_i32)),
                "temperature" => 25.0 + (i * 0.3).sin() * 8.0 + f64::from(rng.random_range(-2..=3_i32)),
                "wind" => 15.0 + (i * 0.7).sin() * 10.0 + f64::from(rng.random_range(-3..=8_i32)),
                _ => f64::from(rng.random_range(0..=100_i32)),
            };
            HistoricalPoint {
                timestamp: at
                    .format(format_description!("[hour]:[minute]"))
                    .unwrap_or_default(),
                value: round_one_decimal(value),
            }
        })
        .collect()
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
