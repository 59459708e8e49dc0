//! Streaming decoder for the controller's status lines.

mod fields;
mod significance;

use strum::{Display, EnumString, VariantNames};
use tracing::{Span, debug, trace};

pub use fields::{metric, scale_power};
pub use significance::{HOT_THRESHOLD, MIN_DELTA};

use self::fields::{FAN_MARKERS, FieldSink, TEMPERATURE_MARKERS};
use self::significance::SignificanceFilter;
use crate::model::TelemetryReading;

/// Line-correlation strategy for a controller family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum TelemetryProfile {
    /// Temperature and fan reports arrive on separate lines.
    #[default]
    MultiLine,
    /// One combined status line carries every field.
    SingleLine,
    /// Low-frequency virtual printer; every reading is forwarded.
    Simulation,
}

impl TelemetryProfile {
    fn correlates_two_lines(self) -> bool {
        matches!(self, Self::MultiLine)
    }

    fn always_forwards(self) -> bool {
        matches!(self, Self::Simulation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineClass {
    Temperature,
    Fan,
    Irrelevant,
}

fn classify(line: &str) -> LineClass {
    let body = line.trim_start();
    let body = body.strip_prefix("ok").map_or(body, str::trim_start);
    if body.starts_with('T') && body.contains("T:") && body.contains("B:") {
        LineClass::Temperature
    } else if body.starts_with('E') && body.contains("E0:") && body.contains("RPM") {
        LineClass::Fan
    } else {
        LineClass::Irrelevant
    }
}

/// Turns raw status lines into significant [`TelemetryReading`]s.
///
/// Single-writer: owned by the thread that receives controller lines.
#[derive(Debug)]
pub struct TelemetryDecoder {
    profile: TelemetryProfile,
    temperature: Option<String>,
    fan: Option<String>,
    filter: SignificanceFilter,
    span: Span,
}

impl TelemetryDecoder {
    pub fn new(profile: TelemetryProfile) -> Self {
        Self {
            profile,
            temperature: None,
            fan: None,
            filter: SignificanceFilter::default(),
            span: tracing::debug_span!("telemetry_decoder", %profile),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn profile(&self) -> TelemetryProfile {
        self.profile
    }

    /// `true` when neither slot holds a pending line.
    pub fn is_idle(&self) -> bool {
        self.temperature.is_none() && self.fan.is_none()
    }

    /// Consume one line; returns a reading when one is complete and
    /// significant.
    pub fn feed(&mut self, line: &str) -> Option<TelemetryReading> {
        let span = self.span.clone();
        let _guard = span.enter();
        let reading = self.correlate(line)?;
        if reading.is_empty() {
            debug!("status lines yielded no usable fields");
            return None;
        }
        if self.filter.admit(&reading, self.profile.always_forwards()) {
            trace!(fields = reading.len(), "forwarding reading");
            Some(reading)
        } else {
            trace!("reading below significance threshold");
            None
        }
    }

    fn correlate(&mut self, line: &str) -> Option<TelemetryReading> {
        let class = classify(line);
        if class == LineClass::Irrelevant {
            return None;
        }

        if !self.profile.correlates_two_lines() {
            if class != LineClass::Temperature {
                return None;
            }
            let mut sink = FieldSink::default();
            sink.scan(line, TEMPERATURE_MARKERS);
            sink.scan(line, FAN_MARKERS);
            return Some(sink.finish());
        }

        match class {
            LineClass::Temperature => self.temperature = Some(line.to_owned()),
            LineClass::Fan => self.fan = Some(line.to_owned()),
            LineClass::Irrelevant => return None,
        }
        if self.temperature.is_none() || self.fan.is_none() {
            return None;
        }

        // Both slots are cleared whatever the lines contain.
        let temperature = self.temperature.take()?;
        let fan = self.fan.take()?;
        let mut sink = FieldSink::default();
        sink.scan(&temperature, TEMPERATURE_MARKERS);
        sink.scan(&fan, FAN_MARKERS);
        Some(sink.finish())
    }
}
