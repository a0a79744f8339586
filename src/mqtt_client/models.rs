use serde_derive::{Deserialize, Serialize};

use crate::octoprint::models::DeviceInfo;

pub const PAYLOAD_PRESS: &str = "PRESS";
pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";

/// An incoming publish on one of our subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

// ////// //
// Topics //
// ////// //

/// Topics of one button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonTopics {
    pub discovery: String,
    pub command: String,
    pub availability: String,
    pub error: String,
}

/// Retained `online`/`offline` state of the bridge process itself.
pub fn bridge_availability_topic(root_topic: &str) -> String {
    format!("{root_topic}/availability")
}

/// Make `value` usable as one topic level and as a discovery object id.
///
/// Anything outside `[a-zA-Z0-9_-]` becomes `_`, so ids can neither nest
/// topics nor act as wildcards.
pub fn topic_segment(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

impl ButtonTopics {
    pub fn new(root_topic: &str, discovery_prefix: &str, component_id: &str, device_id: &str, object_id: &str) -> Self {
        let device_id = topic_segment(device_id);
        let base = format!("{root_topic}/{device_id}/{object_id}");
        ButtonTopics {
            discovery: format!("{discovery_prefix}/button/{component_id}/{device_id}_{object_id}/config"),
            command: format!("{base}/press"),
            availability: format!("{base}/availability"),
            error: format!("{base}/error"),
        }
    }
}

// ////////////// //
// Home Assistant //
// ////////////// //

#[derive(Debug, Serialize, Deserialize)]
pub struct HomeAssistantAvailability {
    pub topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
}

impl HomeAssistantAvailability {
    pub fn online_offline(topic: &str) -> Self {
        HomeAssistantAvailability {
            topic: topic.to_owned(),
            payload_available: PAYLOAD_ONLINE.to_owned(),
            payload_not_available: PAYLOAD_OFFLINE.to_owned(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HomeAssistantDiscoveryButtonPayload {
    pub name: String,
    pub unique_id: String,
    pub command_topic: String,
    pub payload_press: String,
    pub availability: Vec<HomeAssistantAvailability>,
    /// `all`: available only while every availability topic says so.
    pub availability_mode: String,
    pub device: DeviceInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_cannot_break_topics() {
        let topics = ButtonTopics::new("octoprint", "homeassistant", "octoprint", "printer/#1+a b", "pause_job");

        assert_eq!(topics.command, "octoprint/printer__1_a_b/pause_job/press");
        assert_eq!(topics.discovery, "homeassistant/button/octoprint/printer__1_a_b_pause_job/config");
        assert!(!topics.availability.contains(&['#', '+'][..]));
    }

    #[test]
    fn uuid_device_ids_are_kept() {
        assert_eq!(topic_segment("0f3c9a2e-77b1-4c1d-9a51-2f1f0e0d1c2b"), "0f3c9a2e-77b1-4c1d-9a51-2f1f0e0d1c2b");
    }
}
