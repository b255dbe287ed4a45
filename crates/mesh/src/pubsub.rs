//! Event-stream publishing and subscription over MQTT.
//!
//! Publishing is best effort from the caller's point of view: the event loop
//! runs on its own task and reconnects after broker errors, so a publish only
//! fails when the client's request channel is closed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::Value;
use telemesh_core::config::BrokerConfig;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

const CHANNEL_CAPACITY: usize = 64;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Publish failures.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Request could not be queued
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Payload could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sink for JSON events keyed by topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), PublishError>;
}

fn options(config: &BrokerConfig, suffix: &str) -> MqttOptions {
    let client_id = format!("{}-{}", config.client_id, suffix);
    let mut opts = MqttOptions::new(client_id, config.host.clone(), config.port);
    opts.set_keep_alive(KEEP_ALIVE);
    opts
}

/// MQTT-backed publisher.
pub struct MqttPublisher {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl MqttPublisher {
    /// Start a client against the configured broker.
    ///
    /// `suffix` is appended to the configured client id so that several roles
    /// can share one broker.
    pub fn connect(config: &BrokerConfig, suffix: &str) -> Self {
        let (client, event_loop) = AsyncClient::new(options(config, suffix), CHANNEL_CAPACITY);
        info!(host = %config.host, port = config.port, "mqtt publisher starting");
        let driver = tokio::spawn(drive(event_loop, None));
        Self { client, driver }
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), PublishError> {
        let bytes = serde_json::to_vec(payload)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await?;
        trace!(topic, "published");
        Ok(())
    }
}

type Handler = Arc<dyn Fn(&str, Value) + Send + Sync>;

struct Subscription {
    client: AsyncClient,
    topic: String,
    handler: Handler,
}

/// MQTT subscriber dispatching JSON payloads to a handler.
pub struct MqttSubscriber {
    driver: JoinHandle<()>,
}

impl MqttSubscriber {
    /// Subscribe to `topic` and call `handler` for each JSON message.
    ///
    /// The subscription is renewed on every (re)connection. Payloads that are
    /// not JSON are logged and dropped.
    pub fn spawn<F>(config: &BrokerConfig, topic: &str, handler: F) -> Self
    where
        F: Fn(&str, Value) + Send + Sync + 'static,
    {
        let (client, event_loop) = AsyncClient::new(options(config, "sub"), CHANNEL_CAPACITY);
        info!(host = %config.host, port = config.port, topic, "mqtt subscriber starting");
        let subscription = Subscription {
            client,
            topic: topic.to_string(),
            handler: Arc::new(handler),
        };
        let driver = tokio::spawn(drive(event_loop, Some(subscription)));
        Self { driver }
    }
}

impl Drop for MqttSubscriber {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(mut event_loop: EventLoop, subscription: Option<Subscription>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                debug!("mqtt connected");
                if let Some(sub) = &subscription {
                    if let Err(e) = sub.client.try_subscribe(sub.topic.as_str(), QoS::AtLeastOnce) {
                        warn!(topic = %sub.topic, error = %e, "subscribe failed");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Some(sub) = &subscription {
                    match serde_json::from_slice::<Value>(&publish.payload) {
                        Ok(value) => (sub.handler)(&publish.topic, value),
                        Err(e) => warn!(topic = %publish.topic, error = %e, "dropping non-JSON message"),
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "mqtt connection error, reconnecting in {:?}", RECONNECT_DELAY);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// In-memory publisher that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, Value)>>,
}

impl RecordingPublisher {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in publish order.
    pub fn messages(&self) -> Vec<(String, Value)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Payloads published on `topic`.
    pub fn on_topic(&self, topic: &str) -> Vec<Value> {
        self.messages()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| v)
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), PublishError> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((topic.to_string(), payload.clone()));
        }
        Ok(())
    }
}
