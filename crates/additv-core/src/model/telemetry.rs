// ── Telemetry readings ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One structured snapshot of printer sensor and actuator values.
///
/// Absent or invalid fields are omitted, never zero-filled. Keys are
/// metric names such as `tool0_temp` or `bed_power`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryReading(BTreeMap<String, f64>);

impl TelemetryReading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.0.get(metric).copied()
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.0.contains_key(metric)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub(crate) fn insert(&mut self, metric: impl Into<String>, value: f64) {
        self.0.insert(metric.into(), value);
    }
}

impl FromIterator<(String, f64)> for TelemetryReading {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for TelemetryReading {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
    }
}

/// A reading paired with the wall-clock time it was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedReading {
    pub reading: TelemetryReading,
    pub captured_at: DateTime<Utc>,
}

impl TimestampedReading {
    pub fn now(reading: TelemetryReading) -> Self {
        Self {
            reading,
            captured_at: Utc::now(),
        }
    }
}
