// ── Status-line field extraction ──
//
// A field is a literal marker at the start of a whitespace-separated
// token, followed by its numeric text. The text ends at whitespace, at
// a `/` (which introduces a target value), or where another known
// marker begins.

use tracing::{debug, warn};

use crate::error::FieldError;
use crate::model::TelemetryReading;

/// Metric names produced by the decoder.
pub mod metric {
    pub const TOOL0_TEMP: &str = "tool0_temp";
    pub const TOOL0_TARGET: &str = "tool0_target";
    pub const BED_TEMP: &str = "bed_temp";
    pub const BED_TARGET: &str = "bed_target";
    pub const AMBIENT_TEMP: &str = "ambient_temp";
    pub const PROBE_TEMP: &str = "probe_temp";
    pub const TOOL0_POWER: &str = "tool0_power";
    pub const BED_POWER: &str = "bed_power";
    pub const TOOL0_HEATSINK_FAN_RPM: &str = "tool0_heatsink_fan_rpm";
    pub const PART_FAN_RPM: &str = "part_fan_rpm";
    pub const TOOL0_HEATSINK_FAN_POWER: &str = "tool0_heatsink_fan_power";
    pub const PART_FAN_POWER: &str = "part_fan_power";
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FieldKind {
    /// Degrees Celsius, dropped outside `min..=max`.
    Temperature { min: f64, max: f64 },
    /// Heater duty on the firmware's 0–127 scale.
    HeaterPower,
    /// Fan PWM on the 0–255 scale.
    FanPower,
    /// Reported as-is.
    Plain,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Marker {
    pub text: &'static str,
    pub metric: &'static str,
    /// Metric for a `/value` following the reading.
    pub target: Option<&'static str>,
    pub kind: FieldKind,
    /// Higher priority wins when two markers feed one metric.
    pub priority: u8,
}

const TOOL_RANGE: FieldKind = FieldKind::Temperature { min: 0.0, max: 300.0 };
const BED_RANGE: FieldKind = FieldKind::Temperature { min: 0.0, max: 120.0 };
const AMBIENT_RANGE: FieldKind = FieldKind::Temperature { min: 0.0, max: 50.0 };

const fn marker(
    text: &'static str,
    metric: &'static str,
    target: Option<&'static str>,
    kind: FieldKind,
) -> Marker {
    Marker {
        text,
        metric,
        target,
        kind,
        priority: 0,
    }
}

/// Temperature report: `T:22.6 /0.0 B:23.7 /0.0 T0:22.6 /0.0 @:0 B@:0 P:0.0 A:30.6`
pub(crate) const TEMPERATURE_MARKERS: &[Marker] = &[
    marker("T:", metric::TOOL0_TEMP, Some(metric::TOOL0_TARGET), TOOL_RANGE),
    Marker {
        priority: 1,
        ..marker("T0:", metric::TOOL0_TEMP, Some(metric::TOOL0_TARGET), TOOL_RANGE)
    },
    marker("B:", metric::BED_TEMP, Some(metric::BED_TARGET), BED_RANGE),
    marker("@:", metric::TOOL0_POWER, None, FieldKind::HeaterPower),
    marker("B@:", metric::BED_POWER, None, FieldKind::HeaterPower),
    marker("P:", metric::PROBE_TEMP, None, FieldKind::Plain),
    marker("A:", metric::AMBIENT_TEMP, None, AMBIENT_RANGE),
];

/// Fan report: `E0:0 RPM PRN1:0 RPM E0@:0 PRN1@:0`
pub(crate) const FAN_MARKERS: &[Marker] = &[
    marker("E0:", metric::TOOL0_HEATSINK_FAN_RPM, None, FieldKind::Plain),
    marker("PRN1:", metric::PART_FAN_RPM, None, FieldKind::Plain),
    marker("E0@:", metric::TOOL0_HEATSINK_FAN_POWER, None, FieldKind::FanPower),
    marker("PRN1@:", metric::PART_FAN_POWER, None, FieldKind::FanPower),
];

const HEATER_SCALE: f64 = 127.0;
const PWM_SCALE: f64 = 255.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rescale a 0–127 heater power to a 0–100 percentage.
pub fn scale_power(raw: f64) -> f64 {
    round2(raw / HEATER_SCALE * 100.0)
}

fn scale_pwm(raw: f64) -> f64 {
    round2(raw / PWM_SCALE * 100.0)
}

/// Cut `rest` at the first `/` or known marker.
fn value_text<'a>(rest: &'a str, markers: &[Marker]) -> &'a str {
    let end = markers
        .iter()
        .filter_map(|m| rest.find(m.text))
        .chain(rest.find('/'))
        .min()
        .unwrap_or(rest.len());
    &rest[..end]
}

fn parse_number(metric: &'static str, raw: &str) -> Result<f64, FieldError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FieldError::Parse {
            metric,
            raw: raw.to_owned(),
        })
}

fn check_range(metric: &'static str, value: f64, min: f64, max: f64) -> Result<f64, FieldError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(FieldError::OutOfRange {
            metric,
            value,
            min,
            max,
        })
    }
}

/// Parse, validate and rescale one field value.
pub(crate) fn convert(metric: &'static str, raw: &str, kind: FieldKind) -> Result<f64, FieldError> {
    let value = parse_number(metric, raw)?;
    match kind {
        FieldKind::Temperature { min, max } => check_range(metric, value, min, max),
        FieldKind::HeaterPower => check_range(metric, value, 0.0, HEATER_SCALE).map(scale_power),
        FieldKind::FanPower => check_range(metric, value, 0.0, PWM_SCALE).map(scale_pwm),
        FieldKind::Plain => Ok(value),
    }
}

/// Accumulates fields, honouring marker priority.
#[derive(Default)]
pub(crate) struct FieldSink {
    reading: TelemetryReading,
    priorities: Vec<(&'static str, u8)>,
}

impl FieldSink {
    fn put(&mut self, metric: &'static str, priority: u8, result: Result<f64, FieldError>) {
        let value = match result {
            Ok(v) => v,
            Err(e @ FieldError::Parse { .. }) => {
                debug!(error = %e, "field omitted");
                return;
            }
            Err(e @ FieldError::OutOfRange { .. }) => {
                warn!(error = %e, "field dropped");
                return;
            }
        };

        match self.priorities.iter_mut().find(|(m, _)| *m == metric) {
            Some((_, held)) if *held > priority => {}
            Some((_, held)) => {
                *held = priority;
                self.reading.insert(metric, value);
            }
            None => {
                self.priorities.push((metric, priority));
                self.reading.insert(metric, value);
            }
        }
    }

    /// Extract every known field from one line.
    pub(crate) fn scan(&mut self, line: &str, markers: &[Marker]) {
        let mut tokens = line.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            let Some(m) = markers.iter().find(|m| token.starts_with(m.text)) else {
                continue;
            };
            let rest = &token[m.text.len()..];
            let raw = value_text(rest, markers);
            self.put(m.metric, m.priority, convert(m.metric, raw, m.kind));

            let Some(target) = m.target else { continue };
            let inline = rest[raw.len()..].strip_prefix('/');
            let target_raw = match inline {
                Some(t) => Some(t),
                None => tokens.next_if(|t| t.starts_with('/')).map(|t| &t[1..]),
            };
            if let Some(t) = target_raw {
                let raw = value_text(t, markers);
                self.put(target, m.priority, convert(target, raw, m.kind));
            }
        }
    }

    pub(crate) fn finish(self) -> TelemetryReading {
        self.reading
    }
}
