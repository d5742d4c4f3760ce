//! MQTT device transport
//!
//! Commands are published as `"<Request> <interval_ms>"` text payloads. The
//! rumqttc event loop runs on its own task and reports connectivity as
//! [`TransportEvent`]s; after a connection error it waits for either a
//! reconnect request or the retry backoff before polling again.

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DeviceTransport, TransportError, TransportEvent};
use crate::mapping::Command;

const REQUEST_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub keep_alive_secs: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub retry_backoff_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "keyrhythm".to_string(),
            topic: "keyrhythm/commands".to_string(),
            keep_alive_secs: 5,
            username: None,
            password: None,
            retry_backoff_ms: 5000,
        }
    }
}

impl MqttConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        if let Some(username) = &self.username {
            options.set_credentials(username.clone(), self.password.clone().unwrap_or_default());
        }
        options
    }
}

pub struct MqttTransport {
    client: AsyncClient,
    topic: String,
    connected: Arc<AtomicBool>,
    reconnect: Arc<Notify>,
    poller: JoinHandle<()>,
}

impl MqttTransport {
    /// Creates the client and spawns its event loop
    ///
    /// Connecting happens in the background; watch `events` for the outcome.
    pub fn connect(config: &MqttConfig, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        info!(
            "Connecting to MQTT broker {}:{} as {}",
            config.host, config.port, config.client_id
        );
        if events.send(TransportEvent::Connecting).is_err() {
            debug!("No listener for MQTT transport events");
        }

        let (client, event_loop) = AsyncClient::new(config.mqtt_options(), REQUEST_QUEUE_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let reconnect = Arc::new(Notify::new());
        let poller = tokio::spawn(run_event_loop(
            event_loop,
            events,
            connected.clone(),
            reconnect.clone(),
            config.retry_backoff(),
        ));

        Self {
            client,
            topic: config.topic.clone(),
            connected,
            reconnect,
            poller,
        }
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
    reconnect: Arc<Notify>,
    backoff: Duration,
) {
    let report = |event: TransportEvent| {
        if events.send(event).is_err() {
            debug!("No listener for MQTT transport events");
        }
    };
    let mut outage_reported = false;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("MQTT broker accepted connection: {:?}", ack.code);
                outage_reported = false;
                connected.store(true, Ordering::Release);
                report(TransportEvent::Connected);
            }
            Ok(event) => {
                debug!("MQTT event: {:?}", event);
            }
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                connected.store(false, Ordering::Release);
                // Report each outage once, not every retry
                if !outage_reported {
                    report(TransportEvent::Disconnected);
                    outage_reported = true;
                }

                tokio::select! {
                    _ = reconnect.notified() => info!("Retrying MQTT connection on request"),
                    _ = tokio::time::sleep(backoff) => debug!("Retrying MQTT connection after {:?}", backoff),
                }
            }
        }
    }
}

impl DeviceTransport for MqttTransport {
    /// Publishes `command`, refusing while the broker is unreachable
    ///
    /// Commands are never queued across an outage.
    fn send(&mut self, command: Command) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        let payload = command.to_string();
        debug!("Publishing '{}' to {}", payload, self.topic);
        self.client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)
            .map_err(|e| TransportError::PublishError(e.to_string()))
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        if self.poller.is_finished() {
            return Err(TransportError::ReconnectError(
                "MQTT event loop is no longer running".to_string(),
            ));
        }
        self.reconnect.notify_one();
        Ok(())
    }

    fn name(&self) -> &str {
        "mqtt"
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.poller.abort();
    }
}
