use convert_case::{Case, Casing};

use crate::octoprint::models::{PrinterFlags, PrinterInfo, PrinterStateSnapshot};

use super::error::{ButtonError, InvalidPrinterStateSnafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKind {
    PauseJob,
    ResumeJob,
    StopJob,
    ConnectPrinter,
}

/// The remote call a press resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Cancel,
    Connect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Cancel => "cancel",
            Command::Connect => "connect",
        }
    }
}

impl ButtonKind {
    /// Registration order.
    pub const ALL: [ButtonKind; 4] = [
        ButtonKind::ResumeJob,
        ButtonKind::PauseJob,
        ButtonKind::StopJob,
        ButtonKind::ConnectPrinter,
    ];

    pub fn action_name(&self) -> &'static str {
        match self {
            ButtonKind::PauseJob => "Pause Job",
            ButtonKind::ResumeJob => "Resume Job",
            ButtonKind::StopJob => "Stop Job",
            ButtonKind::ConnectPrinter => "Connect Printer",
        }
    }

    /// Topic-safe identifier, e.g. `pause_job`.
    pub fn object_id(&self) -> String {
        self.action_name().to_case(Case::Snake)
    }

    pub fn is_available(&self, snapshot: &PrinterStateSnapshot) -> bool {
        if !snapshot.last_update_success {
            return false;
        }
        match self {
            ButtonKind::ConnectPrinter => snapshot.printer.is_none(),
            _ => snapshot.printer.is_some(),
        }
    }

    /// Evaluate the guard against the printer reference of the latest snapshot.
    ///
    /// `Ok(None)` means the press is a no-op. Transitional states (pausing,
    /// resuming) never raise; only a state that contradicts the action does.
    /// A missing printer is read as all flags cleared.
    pub fn decide(&self, printer: Option<&PrinterInfo>) -> Result<Option<Command>, ButtonError> {
        let idle = PrinterFlags::default();
        let flags = printer.map(PrinterInfo::flags).unwrap_or(&idle);

        match self {
            ButtonKind::PauseJob => {
                if flags.printing {
                    Ok(Some(Command::Pause))
                } else if !flags.paused && !flags.pausing {
                    InvalidPrinterStateSnafu { message: "Printer is not printing" }.fail()
                } else {
                    Ok(None)
                }
            }
            ButtonKind::ResumeJob => {
                if flags.paused {
                    Ok(Some(Command::Resume))
                } else if !flags.printing && !flags.resuming {
                    InvalidPrinterStateSnafu { message: "Printer is not currently paused" }.fail()
                } else {
                    Ok(None)
                }
            }
            ButtonKind::StopJob => Ok((flags.printing || flags.paused).then_some(Command::Cancel)),
            ButtonKind::ConnectPrinter => Ok(printer.is_none().then_some(Command::Connect)),
        }
    }
}

/// Naming shared by every button of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonConfig {
    pub name: String,
    pub unique_id: String,
    pub device_id: String,
}

impl ButtonConfig {
    pub fn new(kind: ButtonKind, device_id: &str) -> Self {
        let action = kind.action_name();
        ButtonConfig {
            name: format!("OctoPrint {action}"),
            unique_id: format!("{action}-{device_id}"),
            device_id: device_id.to_owned(),
        }
    }
}
