use serde_derive::{Deserialize, Serialize};

// ///////////// //
// Printer state //
// ///////////// //

/// Job state flags as reported by OctoPrint's `/api/printer` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrinterFlags {
    pub operational: bool,
    pub printing: bool,
    pub paused: bool,
    pub pausing: bool,
    pub resuming: bool,
    pub cancelling: bool,
    pub finishing: bool,
    pub ready: bool,
    pub error: bool,
    pub closed_or_error: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterState {
    pub text: String,
    pub flags: PrinterFlags,
}

/// A connected printer. Absent while OctoPrint has no printer connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterInfo {
    #[serde(default)]
    pub state: PrinterState,
}

impl PrinterInfo {
    pub fn flags(&self) -> &PrinterFlags {
        &self.state.flags
    }
}

/// Last known state as cached by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrinterStateSnapshot {
    pub last_update_success: bool,
    pub printer: Option<PrinterInfo>,
}

impl PrinterStateSnapshot {
    pub fn connected(printer: PrinterInfo) -> Self {
        PrinterStateSnapshot { last_update_success: true, printer: Some(printer) }
    }

    pub fn disconnected() -> Self {
        PrinterStateSnapshot { last_update_success: true, printer: None }
    }

    pub fn failed() -> Self {
        PrinterStateSnapshot { last_update_success: false, printer: None }
    }
}

// ////// //
// Device //
// ////// //

/// Device block shared by all entities of one OctoPrint instance.
///
/// Serializes to the `device` object of a Home Assistant discovery payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,
}
