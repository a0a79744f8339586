use config::{Config, Environment};
use log::info;
use snafu::{ResultExt, Snafu};

use super::models::Settings;

pub const ENV_PREFIX: &str = "OPB";

pub fn load_config() -> Result<Settings, ConfigError> {
    // As Rust has no native support for .env files,
    // we use the dotenv_flow crate to import to actual ENV vars.
    if let Ok(dotenv_path) = dotenv_flow::dotenv_flow() {
        info!("Loaded dotenv file: {:?}", dotenv_path);
    }

    load_config_from(Environment::default())
}

/// Build settings from `environment` on top of the defaults.
pub fn load_config_from(environment: Environment) -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(environment
            .prefix(ENV_PREFIX)
            .separator("_")
            .prefix_separator("_")
            .try_parsing(true))
        .set_default("mqtt.host", "localhost").context(LoadSnafu)?
        .set_default("mqtt.port", "1883").context(LoadSnafu)?
        .set_default("mqtt.secure", "false").context(LoadSnafu)?
        .set_default("mqtt.ignoretlserrors", "false").context(LoadSnafu)?
        .set_default("mqtt.username", "").context(LoadSnafu)?
        .set_default("mqtt.password", "").context(LoadSnafu)?
        .set_default("mqtt.clientid", "octoprint-buttons").context(LoadSnafu)?
        .set_default("mqtt.roottopic", "octoprint").context(LoadSnafu)?
        .set_default("mqtt.ha.enablediscovery", "true").context(LoadSnafu)?
        .set_default("mqtt.ha.discoverytopicprefix", "homeassistant").context(LoadSnafu)?
        .set_default("mqtt.ha.componentid", "octoprint").context(LoadSnafu)?
        .set_default("availabilityinterval", "30s").context(LoadSnafu)?
        .build().context(LoadSnafu)?;

    config.try_deserialize().context(LoadSnafu)
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Could not load settings"))]
    Load { source: config::ConfigError },
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use config::Map;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: Map<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::default().source(Some(source))
    }

    #[test]
    fn defaults_apply() {
        let settings = load_config_from(env(&[])).unwrap();

        assert_eq!(settings.mqtt.host, "localhost");
        assert_eq!(settings.mqtt.port, 1883);
        assert!(!settings.mqtt.secure);
        assert_eq!(settings.mqtt.root_topic, "octoprint");
        assert!(settings.mqtt.ha.enable_discovery);
        assert_eq!(settings.mqtt.ha.discovery_topic_prefix, "homeassistant");
        assert_eq!(settings.device_id, None);
        assert_eq!(settings.availability_interval, Duration::from_secs(30));
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = load_config_from(env(&[
            ("OPB_MQTT_HOST", "broker.lan"),
            ("OPB_MQTT_PORT", "8883"),
            ("OPB_MQTT_SECURE", "true"),
            ("OPB_MQTT_ROOTTOPIC", "printers"),
            ("OPB_MQTT_HA_ENABLEDISCOVERY", "false"),
            ("OPB_DEVICEID", "0f3c"),
            ("OPB_AVAILABILITYINTERVAL", "5m"),
        ]))
        .unwrap();

        assert_eq!(settings.mqtt.host, "broker.lan");
        assert_eq!(settings.mqtt.port, 8883);
        assert!(settings.mqtt.secure);
        assert_eq!(settings.mqtt.root_topic, "printers");
        assert!(!settings.mqtt.ha.enable_discovery);
        assert_eq!(settings.device_id.as_deref(), Some("0f3c"));
        assert_eq!(settings.availability_interval, Duration::from_secs(300));
    }

    #[test]
    fn bad_interval_is_an_error() {
        let result = load_config_from(env(&[("OPB_AVAILABILITYINTERVAL", "soon")]));
        assert!(matches!(result, Err(ConfigError::Load { .. })));
    }
}
