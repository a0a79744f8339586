pub mod button;
pub mod error;
pub mod models;

pub use button::{setup_buttons, OctoprintButton};
pub use error::ButtonError;
pub use models::{ButtonConfig, ButtonKind, Command};
