// ── Lifecycle events ──

use serde::Serialize;
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Event kinds the backend's `printer_events` table accepts.
///
/// The serialized names match the backend enum verbatim.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum EventKind {
    #[serde(rename = "Job_Started")]
    #[strum(serialize = "Job_Started")]
    JobStarted,
    #[serde(rename = "Job_Complete")]
    #[strum(serialize = "Job_Complete")]
    JobComplete,
    #[serde(rename = "Job_Failed")]
    #[strum(serialize = "Job_Failed")]
    JobFailed,
    #[serde(rename = "Job_Paused")]
    #[strum(serialize = "Job_Paused")]
    JobPaused,
    #[serde(rename = "Job_Resumed")]
    #[strum(serialize = "Job_Resumed")]
    JobResumed,
    #[serde(rename = "Printer_Connected")]
    #[strum(serialize = "Printer_Connected")]
    PrinterConnected,
    #[serde(rename = "Printer_Disconnected")]
    #[strum(serialize = "Printer_Disconnected")]
    PrinterDisconnected,
}

impl EventKind {
    /// Map a host application event name onto a known kind.
    ///
    /// Returns `None` for anything the backend does not track.
    pub fn from_host_event(name: &str) -> Option<Self> {
        match name {
            "PrintStarted" => Some(Self::JobStarted),
            "PrintDone" => Some(Self::JobComplete),
            "PrintFailed" | "PrintCancelled" => Some(Self::JobFailed),
            "PrintPaused" => Some(Self::JobPaused),
            "PrintResumed" => Some(Self::JobResumed),
            "Connected" => Some(Self::PrinterConnected),
            "Disconnected" => Some(Self::PrinterDisconnected),
            _ => None,
        }
    }
}

/// A lifecycle event with its opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub payload: Map<String, Value>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, payload: Map<String, Value>) -> Self {
        Self { kind, payload }
    }
}
