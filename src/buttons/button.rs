use std::sync::Arc;

use log::{debug, info};
use snafu::{OptionExt, ResultExt};
use tokio::sync::watch;

use crate::octoprint::{
    client::{Coordinator, OctoprintClient},
    models::{DeviceInfo, PrinterStateSnapshot},
};

use super::error::{ButtonError, CommandSnafu, MissingDeviceIdSnafu, RefreshSnafu};
use super::models::{ButtonConfig, ButtonKind, Command};

/// One control button of an OctoPrint device.
pub struct OctoprintButton<C, P> {
    kind: ButtonKind,
    config: ButtonConfig,
    device_info: DeviceInfo,
    coordinator: Arc<C>,
    client: Arc<P>,
}

impl<C: Coordinator, P: OctoprintClient> OctoprintButton<C, P> {
    pub fn new(kind: ButtonKind, device_id: &str, coordinator: Arc<C>, client: Arc<P>) -> Self {
        let device_info = coordinator.device_info();
        OctoprintButton {
            kind,
            config: ButtonConfig::new(kind, device_id),
            device_info,
            coordinator,
            client,
        }
    }

    pub fn kind(&self) -> ButtonKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn unique_id(&self) -> &str {
        &self.config.unique_id
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Snapshot updates of the coordinator behind this button.
    pub fn updates(&self) -> watch::Receiver<PrinterStateSnapshot> {
        self.coordinator.subscribe()
    }

    pub fn available(&self) -> bool {
        self.kind.is_available(&self.coordinator.snapshot())
    }

    /// Handle a press against the coordinator's current snapshot.
    pub async fn press(&self) -> Result<(), ButtonError> {
        let snapshot = self.coordinator.snapshot();
        let Some(command) = self.kind.decide(snapshot.printer.as_ref())? else {
            debug!("{}: nothing to do in printer state {:?}", self.config.name, snapshot.printer.map(|p| p.state.text));
            return Ok(());
        };

        info!("{}: sending {} command", self.config.name, command.as_str());
        let name = command.as_str();
        match command {
            Command::Pause => self.client.pause_job().await.context(CommandSnafu { command: name })?,
            Command::Resume => self.client.resume_job().await.context(CommandSnafu { command: name })?,
            Command::Cancel => self.client.cancel_job().await.context(CommandSnafu { command: name })?,
            Command::Connect => {
                self.client.connect().await.context(CommandSnafu { command: name })?;
                self.coordinator.refresh().await.context(RefreshSnafu)?;
            }
        }
        Ok(())
    }
}

/// Create the buttons of one device, in registration order.
pub fn setup_buttons<C: Coordinator, P: OctoprintClient>(
    coordinator: Arc<C>,
    client: Arc<P>,
    device_id: Option<&str>,
) -> Result<Vec<OctoprintButton<C, P>>, ButtonError> {
    let device_id = device_id.context(MissingDeviceIdSnafu)?;

    Ok(ButtonKind::ALL
        .into_iter()
        .map(|kind| OctoprintButton::new(kind, device_id, coordinator.clone(), client.clone()))
        .collect())
}
