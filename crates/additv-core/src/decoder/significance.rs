// ── Significance filter ──

use super::fields::metric;
use crate::model::TelemetryReading;

/// A reading with any temperature above this is always forwarded.
pub const HOT_THRESHOLD: f64 = 30.0;
/// Metrics checked against [`HOT_THRESHOLD`].
const TEMPERATURES: [&str; 4] = [
    metric::TOOL0_TEMP,
    metric::BED_TEMP,
    metric::AMBIENT_TEMP,
    metric::PROBE_TEMP,
];

/// Minimum tool/bed change, relative to the last forwarded reading.
pub const MIN_DELTA: f64 = 0.3;

/// Remembers the last forwarded tool and bed temperatures.
#[derive(Debug, Clone, Default)]
pub(crate) struct SignificanceFilter {
    tool: Option<f64>,
    bed: Option<f64>,
}

fn moved(baseline: Option<f64>, current: Option<f64>) -> bool {
    match (baseline, current) {
        (Some(prev), Some(now)) => (now - prev).abs() > MIN_DELTA,
        (None, Some(_)) => true,
        (_, None) => false,
    }
}

impl SignificanceFilter {
    /// Decide whether `reading` goes downstream, updating the baseline
    /// when it does.
    pub(crate) fn admit(&mut self, reading: &TelemetryReading, always: bool) -> bool {
        let tool = reading.get(metric::TOOL0_TEMP);
        let bed = reading.get(metric::BED_TEMP);

        let hot = TEMPERATURES
            .iter()
            .filter_map(|name| reading.get(name))
            .any(|t| t > HOT_THRESHOLD);
        let forward = always || hot || moved(self.tool, tool) || moved(self.bed, bed);

        if forward {
            self.tool = tool.or(self.tool);
            self.bed = bed.or(self.bed);
        }
        forward
    }
}
