use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rumqttc::{tokio_rustls::rustls::ClientConfig, AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use crate::config::models::Mqtt;

use super::fun_with_tls::{get_system_certs, NoopServerCertVerifier};
use super::models::{bridge_availability_topic, MqttMessage, PAYLOAD_OFFLINE, PAYLOAD_ONLINE};

/// Publishing side of the broker connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MqttPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<()>;

    async fn subscribe(&self, topic: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    // Replayed on every (re)connect.
    subscriptions: Arc<RwLock<Vec<String>>>,
}

pub fn tls_config(ignore_tls_errors: bool) -> ClientConfig {
    match ignore_tls_errors {
        // TLS without certificate verification.
        true => ClientConfig::builder().dangerous().with_custom_certificate_verifier(Arc::new(NoopServerCertVerifier)).with_no_client_auth(),
        // TLS with certificate verification.
        false => ClientConfig::builder().with_root_certificates(get_system_certs()).with_no_client_auth(),
    }
}

impl MqttClient {
    /// Connect to the broker. Incoming publishes are forwarded to the returned receiver.
    ///
    /// The bridge availability topic is set as retained last will and flipped
    /// back to online after every successful connect.
    pub fn new(mqtt_settings: &Mqtt) -> (Self, mpsc::Receiver<MqttMessage>) {
        let availability_topic = bridge_availability_topic(&mqtt_settings.root_topic);

        let mut mqtt_options = MqttOptions::new(mqtt_settings.client_id.to_owned(), mqtt_settings.host.to_owned(), mqtt_settings.port);
        if !mqtt_settings.username.is_empty() {
            mqtt_options.set_credentials(mqtt_settings.username.to_owned(), mqtt_settings.password.to_owned());
        }
        mqtt_options
            .set_transport(match mqtt_settings.secure {
                true => rumqttc::Transport::tls_with_config(rumqttc::TlsConfiguration::Rustls(Arc::new(tls_config(mqtt_settings.ignore_tls_errors)))),
                // No TLS.
                false => rumqttc::Transport::tcp(),
            })
            .set_last_will(LastWill::new(&availability_topic, PAYLOAD_OFFLINE, QoS::AtLeastOnce, true))
            .set_keep_alive(Duration::from_secs(10));

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, 10);
        let (tx, rx) = mpsc::channel(32);
        let subscriptions: Arc<RwLock<Vec<String>>> = Arc::default();

        let loop_client = client.clone();
        let loop_subscriptions = subscriptions.clone();
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = MqttMessage { topic: publish.topic, payload: publish.payload.to_vec() };
                        if tx.send(message).await.is_err() {
                            debug!("Message receiver dropped, stopping MQTT event loop.");
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker.");
                        // The event loop is the one draining requests, so never block on it here.
                        if let Err(e) = loop_client.try_publish(&availability_topic, QoS::AtLeastOnce, true, PAYLOAD_ONLINE) {
                            error!("Failed to publish availability to {}: {}", availability_topic, e);
                        }
                        let topics = loop_subscriptions.read().map(|subs| subs.clone()).unwrap_or_default();
                        if !topics.is_empty() {
                            info!("Re-subscribing to {} topics...", topics.len());
                        }
                        for topic in topics {
                            if let Err(e) = loop_client.try_subscribe(&topic, QoS::AtLeastOnce) {
                                error!("Failed to re-subscribe to {}: {}", topic, e);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT connection error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            warn!("MQTT event loop stopped.");
        });

        (Self { client, subscriptions }, rx)
    }
}

#[async_trait]
impl MqttPublisher for MqttClient {
    async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> Result<()> {
        Ok(self.client.publish(topic, QoS::AtLeastOnce, retain, payload.to_vec()).await?)
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        {
            let mut subs = self.subscriptions.write().map_err(|_| anyhow!("subscription list poisoned"))?;
            if !subs.iter().any(|s| s == topic) {
                subs.push(topic.to_owned());
            }
        }
        Ok(self.client.subscribe(topic, QoS::AtLeastOnce).await?)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    use super::*;
    use crate::config::models::HomeAssistant;

    const CONNECT: u8 = 0x10;
    const SUBSCRIBE: u8 = 0x80;
    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    // Connect flag bits of an MQTT 3.1.1 CONNECT packet.
    const FLAG_USERNAME: u8 = 0x80;
    const FLAG_WILL_RETAIN: u8 = 0x20;
    const FLAG_WILL: u8 = 0x04;

    fn settings(port: u16, username: &str) -> Mqtt {
        Mqtt {
            host: "127.0.0.1".to_string(),
            port,
            secure: false,
            ignore_tls_errors: false,
            username: username.to_string(),
            password: if username.is_empty() { String::new() } else { "secret".to_string() },
            client_id: "octoprint-buttons-test".to_string(),
            root_topic: "octoprint".to_string(),
            ha: HomeAssistant {
                enable_discovery: true,
                discovery_topic_prefix: "homeassistant".to_string(),
                component_id: "octoprint".to_string(),
            },
        }
    }

    /// Read one packet, returning its fixed header byte and body.
    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut length = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.unwrap();
            length |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; length];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    /// Read packets until one of type `kind` shows up.
    async fn expect_packet(stream: &mut TcpStream, kind: u8) -> Vec<u8> {
        loop {
            let (header, body) = read_packet(stream).await;
            if header & 0xf0 == kind {
                return body;
            }
        }
    }

    async fn accept_session(listener: &TcpListener) -> (TcpStream, Vec<u8>) {
        let (mut stream, _) = timeout(Duration::from_secs(5), listener.accept()).await.unwrap().unwrap();
        let connect = expect_packet(&mut stream, CONNECT).await;
        stream.write_all(&CONNACK).await.unwrap();
        (stream, connect)
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle.as_bytes())
    }

    #[tokio::test]
    async fn subscriptions_survive_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (client, _messages) = MqttClient::new(&settings(listener.local_addr().unwrap().port(), ""));
        let topic = "octoprint/dev-1/pause_job/press";

        let (mut first, _) = accept_session(&listener).await;
        client.subscribe(topic).await.unwrap();
        let subscribe = timeout(Duration::from_secs(5), expect_packet(&mut first, SUBSCRIBE)).await.unwrap();
        assert!(contains(&subscribe, topic));
        let pkid = [subscribe[0], subscribe[1]];
        first.write_all(&[0x90, 0x03, pkid[0], pkid[1], 0x01]).await.unwrap();
        drop(first);

        let (mut second, _) = accept_session(&listener).await;
        let subscribe = timeout(Duration::from_secs(5), expect_packet(&mut second, SUBSCRIBE))
            .await
            .expect("command topic was not subscribed again after reconnect");
        assert!(contains(&subscribe, topic));
    }

    #[tokio::test]
    async fn connect_registers_offline_will_and_skips_empty_credentials() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (_client, _messages) = MqttClient::new(&settings(listener.local_addr().unwrap().port(), ""));

        let (mut stream, connect) = accept_session(&listener).await;
        // Protocol name (6 bytes) and level precede the flags.
        let flags = connect[7];
        assert_eq!(flags & FLAG_USERNAME, 0);
        assert_ne!(flags & FLAG_WILL, 0);
        assert_ne!(flags & FLAG_WILL_RETAIN, 0);
        assert!(contains(&connect, "octoprint/availability"));
        assert!(contains(&connect, PAYLOAD_OFFLINE));

        // The will is undone by a retained online message once connected.
        let publish = timeout(Duration::from_secs(5), expect_packet(&mut stream, 0x30)).await.unwrap();
        assert!(contains(&publish, "octoprint/availability"));
        assert!(contains(&publish, PAYLOAD_ONLINE));
    }

    #[tokio::test]
    async fn connect_sends_credentials_when_configured() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (_client, _messages) = MqttClient::new(&settings(listener.local_addr().unwrap().port(), "printer-admin"));

        let (_stream, connect) = accept_session(&listener).await;
        assert_ne!(connect[7] & FLAG_USERNAME, 0);
        assert!(contains(&connect, "printer-admin"));
        assert!(contains(&connect, "secret"));
    }

    #[tokio::test]
    async fn incoming_publish_is_forwarded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (_client, mut messages) = MqttClient::new(&settings(listener.local_addr().unwrap().port(), ""));

        let (mut stream, _) = accept_session(&listener).await;
        let topic = b"octoprint/dev-1/stop_job/press";
        let mut packet = vec![0x30, (2 + topic.len() + 5) as u8, 0x00, topic.len() as u8];
        packet.extend_from_slice(topic);
        packet.extend_from_slice(b"PRESS");
        stream.write_all(&packet).await.unwrap();

        let message = timeout(Duration::from_secs(5), messages.recv()).await.unwrap().unwrap();
        assert_eq!(message.topic, "octoprint/dev-1/stop_job/press");
        assert_eq!(message.payload, b"PRESS");
    }

    #[test]
    fn tls_configs_build() {
        let _ = get_system_certs();
        let _ = tls_config(true);
        let _ = tls_config(false);
    }
}
