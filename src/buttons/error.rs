use snafu::Snafu;

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ButtonError {
    /// The press makes no sense for the current printer state.
    #[snafu(display("{message}"))]
    InvalidPrinterState { message: String },

    #[snafu(display("OctoPrint {command} command failed"))]
    Command {
        command: &'static str,
        #[snafu(source(from(anyhow::Error, Into::into)))]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Could not refresh printer state after connecting"))]
    Refresh {
        #[snafu(source(from(anyhow::Error, Into::into)))]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Buttons need a device id"))]
    MissingDeviceId,
}

impl ButtonError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, ButtonError::InvalidPrinterState { .. })
    }
}
