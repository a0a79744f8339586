use std::time::Duration;

use serde_derive::Deserialize;

// When changing anything here, make sure to add
// #[serde(alias = "ihavenounderscores")]
// where needed, so it can be read from the ENV vars.

#[derive(Debug, Clone, Deserialize)]
pub struct Mqtt {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    #[serde(alias = "ignoretlserrors")]
    pub ignore_tls_errors: bool,
    pub username: String,
    pub password: String,
    #[serde(alias = "clientid")]
    pub client_id: String,
    #[serde(alias = "roottopic")]
    pub root_topic: String,
    pub ha: HomeAssistant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistant {
    #[serde(alias = "enablediscovery")]
    pub enable_discovery: bool,
    #[serde(alias = "discoverytopicprefix")]
    pub discovery_topic_prefix: String,
    #[serde(alias = "componentid")]
    pub component_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub mqtt: Mqtt,
    /// Unique id of the OctoPrint instance, usually its UUID.
    #[serde(alias = "deviceid")]
    pub device_id: Option<String>,
    #[serde(alias = "availabilityinterval", with = "humantime_serde")]
    pub availability_interval: Duration,
}
