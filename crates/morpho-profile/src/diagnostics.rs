//! Population aggregate diagnostics: timing and outcome counts.
//!
//! Every call to [`Population::aggregate`](crate::population::Population::aggregate)
//! collects these alongside its results. They are meant for comparing
//! parameter choices across runs, so everything serializes to JSON.
//!
//! Timestamps are captured via the `web-time` crate. Durations are
//! serialized as fractional seconds (`f64`), since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::measure::ProfileKind;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from one population aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDiagnostics {
    /// Profile kind compared.
    pub kind: ProfileKind,
    /// Landmark every profile was aligned to.
    pub landmark: String,
    /// Length profiles were resampled to.
    pub comparison_length: usize,
    /// Members in the population.
    pub members: usize,
    /// Members that contributed to the ranking.
    pub ranked: usize,
    /// Members that could not be profiled or compared.
    pub skipped: usize,
    /// Index of the member closest to the median.
    pub most_similar: Option<usize>,
    /// Difference of that member to the median.
    pub best_difference: Option<f64>,
    /// Mean normalized variability, `0.0` if nothing was scored.
    pub mean_variability: f64,
    /// Largest normalized variability, `0.0` if nothing was scored.
    pub max_variability: f64,
    /// Median profile construction.
    #[serde(with = "duration_serde")]
    pub median_duration: Duration,
    /// Similarity ranking.
    #[serde(with = "duration_serde")]
    pub ranking_duration: Duration,
    /// Variability scoring.
    #[serde(with = "duration_serde")]
    pub variability_duration: Duration,
    /// Wall-clock duration of the whole aggregate.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl AggregateDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Population Aggregate Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Profile: {} from {} (compared at {} points)",
            self.kind, self.landmark, self.comparison_length,
        ));
        lines.push(format!(
            "Members: {}  |  Ranked: {}  |  Skipped: {}",
            self.members, self.ranked, self.skipped,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!("{:<24} {:>10} {:>10}", "Step", "Duration", "% Total"));
        lines.push("-".repeat(48));
        let total_ms = duration_ms(self.total_duration);
        for (name, duration) in [
            ("Median", self.median_duration),
            ("Ranking", self.ranking_duration),
            ("Variability", self.variability_duration),
        ] {
            let ms = duration_ms(duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%"));
        }

        lines.push(String::new());
        match (self.most_similar, self.best_difference) {
            (Some(index), Some(difference)) => lines.push(format!(
                "Most similar: member {index} (difference {difference:.4})"
            )),
            _ => lines.push("Most similar: none".to_string()),
        }
        lines.push(format!(
            "Variability: mean={:.6} max={:.6}",
            self.mean_variability, self.max_variability,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
