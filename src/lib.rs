//! Control buttons for an OctoPrint server: pause, resume and stop the
//! active job, and connect the printer.
//!
//! The host owns the OctoPrint client and the polling coordinator and hands
//! them to [`buttons::setup_buttons`]. [`mqtt_client::bridge::ButtonBridge`]
//! exposes the resulting buttons to Home Assistant over MQTT.

pub mod buttons;
pub mod config;
pub mod mqtt_client;
pub mod octoprint;

pub use buttons::{setup_buttons, ButtonError, ButtonKind, OctoprintButton};
pub use octoprint::client::{Coordinator, OctoprintClient};
pub use octoprint::models::{DeviceInfo, PrinterFlags, PrinterInfo, PrinterState, PrinterStateSnapshot};
