use std::{sync::Arc, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use snafu::{ResultExt, Snafu};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::buttons::OctoprintButton;
use crate::config::models::Settings;
use crate::octoprint::client::{Coordinator, OctoprintClient};
use crate::octoprint::models::PrinterStateSnapshot;

use super::client::MqttPublisher;
use super::models::{
    bridge_availability_topic, ButtonTopics, HomeAssistantAvailability, HomeAssistantDiscoveryButtonPayload, MqttMessage, PAYLOAD_OFFLINE,
    PAYLOAD_ONLINE, PAYLOAD_PRESS,
};

#[derive(Debug, Clone)]
pub struct Discovery {
    pub topic_prefix: String,
    pub component_id: String,
}

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub root_topic: String,
    /// `None` disables Home Assistant discovery.
    pub discovery: Option<Discovery>,
    pub availability_interval: Duration,
}

impl From<&Settings> for BridgeSettings {
    fn from(settings: &Settings) -> Self {
        let ha = &settings.mqtt.ha;
        BridgeSettings {
            root_topic: settings.mqtt.root_topic.clone(),
            discovery: ha.enable_discovery.then(|| Discovery {
                topic_prefix: ha.discovery_topic_prefix.clone(),
                component_id: ha.component_id.clone(),
            }),
            availability_interval: settings.availability_interval,
        }
    }
}

struct BridgedButton<C, P> {
    topics: ButtonTopics,
    button: OctoprintButton<C, P>,
}

/// Exposes buttons to Home Assistant over MQTT.
pub struct ButtonBridge<C, P, M> {
    publisher: Arc<M>,
    settings: BridgeSettings,
    // Keyed by command topic.
    buttons: DashMap<String, Arc<BridgedButton<C, P>>>,
    availability_topic: String,
    updates: watch::Receiver<PrinterStateSnapshot>,
}

impl<C, P, M> ButtonBridge<C, P, M>
where
    C: Coordinator,
    P: OctoprintClient,
    M: MqttPublisher,
{
    pub fn new(publisher: Arc<M>, settings: BridgeSettings, buttons: Vec<OctoprintButton<C, P>>) -> Self {
        let component_id = settings.discovery.as_ref().map_or("", |d| d.component_id.as_str());
        let prefix = settings.discovery.as_ref().map_or("", |d| d.topic_prefix.as_str());

        // All buttons of a bridge share one coordinator.
        let updates = match buttons.first() {
            Some(button) => button.updates(),
            None => watch::channel(PrinterStateSnapshot::default()).1,
        };

        let map = DashMap::new();
        for button in buttons {
            let topics = ButtonTopics::new(&settings.root_topic, prefix, component_id, button.device_id(), &button.kind().object_id());
            map.insert(topics.command.clone(), Arc::new(BridgedButton { topics, button }));
        }

        ButtonBridge {
            publisher,
            availability_topic: bridge_availability_topic(&settings.root_topic),
            settings,
            buttons: map,
            updates,
        }
    }

    fn entries(&self) -> Vec<Arc<BridgedButton<C, P>>> {
        self.buttons.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn command_topics(&self) -> Vec<String> {
        self.buttons.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BridgeError> {
        self.publisher.publish(topic, payload, retain).await.context(PublishSnafu { topic })
    }

    /// Publish discovery documents and subscribe to every command topic.
    pub async fn announce(&self) -> Result<(), BridgeError> {
        (|| self.announce_once())
            .retry(ExponentialBuilder::default().with_factor(4.0))
            .notify(|err, delay| warn!("Announcing buttons failed: {err}, retrying in {delay:?}"))
            .await
    }

    async fn announce_once(&self) -> Result<(), BridgeError> {
        for entry in self.entries() {
            if self.settings.discovery.is_some() {
                let payload = serde_json::to_vec(&discovery_payload(&entry, &self.availability_topic)).context(SerializeSnafu)?;
                self.publish(&entry.topics.discovery, &payload, true).await?;
                debug!("Published discovery for {} to {}", entry.button.unique_id(), entry.topics.discovery);
            }
            self.publisher.subscribe(&entry.topics.command).await.context(SubscribeSnafu { topic: entry.topics.command.as_str() })?;
        }
        info!("Announced {} buttons.", self.buttons.len());
        Ok(())
    }

    pub async fn publish_availability(&self) -> Result<(), BridgeError> {
        for entry in self.entries() {
            let payload = if entry.button.available() { PAYLOAD_ONLINE } else { PAYLOAD_OFFLINE };
            self.publish(&entry.topics.availability, payload.as_bytes(), true).await?;
        }
        Ok(())
    }

    /// Route an incoming message to its button.
    ///
    /// A rejected or failed press is not a bridge error: its text goes to the
    /// button's error topic.
    pub async fn handle_message(&self, message: &MqttMessage) -> Result<(), BridgeError> {
        let Some(entry) = self.buttons.get(&message.topic).map(|entry| entry.value().clone()) else {
            debug!("Ignoring message on unknown topic {}", message.topic);
            return Ok(());
        };
        if message.payload != PAYLOAD_PRESS.as_bytes() {
            debug!("Ignoring unexpected payload on {}: {:?}", message.topic, String::from_utf8_lossy(&message.payload));
            return Ok(());
        }

        match entry.button.press().await {
            Ok(()) => debug!("{} pressed", entry.button.name()),
            Err(e) => {
                if e.is_invalid_state() {
                    warn!("{}: {}", entry.button.name(), e);
                } else {
                    error!("{} failed: {:?}", entry.button.name(), e);
                }
                self.publish(&entry.topics.error, e.to_string().as_bytes(), false).await?;
            }
        }

        self.publish_availability().await
    }
}

impl<C, P, M> ButtonBridge<C, P, M>
where
    C: Coordinator + 'static,
    P: OctoprintClient + 'static,
    M: MqttPublisher + 'static,
{
    /// Announce, then serve presses and keep availability current until `messages` closes.
    ///
    /// Availability is republished on every coordinator update and on each
    /// `availability_interval` tick. Presses still in flight are awaited
    /// before returning.
    pub async fn run(self: Arc<Self>, mut messages: mpsc::Receiver<MqttMessage>) -> Result<(), BridgeError> {
        self.announce().await?;

        let mut updates = self.updates.clone();
        let mut updates_open = true;
        let mut presses = JoinSet::new();
        let mut ticker = tokio::time::interval(self.settings.availability_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.publish_availability().await {
                        error!("Error publishing availability: {:?}", e);
                    }
                }
                changed = updates.changed(), if updates_open => {
                    if changed.is_err() {
                        debug!("Coordinator stopped sending updates.");
                        updates_open = false;
                    } else if let Err(e) = self.publish_availability().await {
                        error!("Error publishing availability: {:?}", e);
                    }
                }
                Some(_) = presses.join_next(), if !presses.is_empty() => {}
                message = messages.recv() => {
                    let Some(message) = message else {
                        info!("MQTT message stream closed, stopping bridge.");
                        break;
                    };
                    let bridge = self.clone();
                    // Presses are independent of each other.
                    presses.spawn(async move {
                        if let Err(e) = bridge.handle_message(&message).await {
                            error!("Error handling message on {}: {:?}", message.topic, e);
                        }
                    });
                }
            }
        }

        while let Some(result) = presses.join_next().await {
            if let Err(e) = result {
                error!("Press task failed: {:?}", e);
            }
        }
        if let Err(e) = self.publish(&self.availability_topic, PAYLOAD_OFFLINE.as_bytes(), true).await {
            debug!("Could not mark bridge offline: {:?}", e);
        }
        Ok(())
    }
}

fn discovery_payload<C: Coordinator, P: OctoprintClient>(entry: &BridgedButton<C, P>, bridge_availability: &str) -> HomeAssistantDiscoveryButtonPayload {
    HomeAssistantDiscoveryButtonPayload {
        name: entry.button.name().to_owned(),
        unique_id: entry.button.unique_id().to_owned(),
        command_topic: entry.topics.command.clone(),
        payload_press: PAYLOAD_PRESS.to_owned(),
        availability: vec![
            HomeAssistantAvailability::online_offline(bridge_availability),
            HomeAssistantAvailability::online_offline(&entry.topics.availability),
        ],
        availability_mode: "all".to_owned(),
        device: entry.button.device_info().clone(),
    }
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
pub enum BridgeError {
    #[snafu(display("Could not publish to {topic}"))]
    Publish {
        topic: String,
        #[snafu(source(from(anyhow::Error, Into::into)))]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Could not subscribe to {topic}"))]
    Subscribe {
        topic: String,
        #[snafu(source(from(anyhow::Error, Into::into)))]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Could not serialize discovery payload"))]
    Serialize { source: serde_json::Error },
}
