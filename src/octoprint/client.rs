use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;

use super::models::{DeviceInfo, PrinterStateSnapshot};

/// Remote commands understood by an OctoPrint server.
///
/// Implemented by the host, typically on top of OctoPrint's REST API.
/// Serializing concurrent commands is up to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OctoprintClient: Send + Sync {
    async fn pause_job(&self) -> Result<()>;

    async fn resume_job(&self) -> Result<()>;

    async fn cancel_job(&self) -> Result<()>;

    /// Ask OctoPrint to open the connection to its printer.
    async fn connect(&self) -> Result<()>;
}

/// Polling coordinator that owns the cached printer state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// The last polled state. Must not block on I/O.
    fn snapshot(&self) -> PrinterStateSnapshot;

    fn device_info(&self) -> DeviceInfo;

    /// Notified with the new snapshot after every poll, successful or not.
    fn subscribe(&self) -> watch::Receiver<PrinterStateSnapshot>;

    /// Poll the server now instead of waiting for the next interval.
    async fn refresh(&self) -> Result<()>;
}
