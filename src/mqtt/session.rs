use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, NetworkOptions, QoS,
    SubscribeReasonCode,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::MqttConfig;

use super::BrokerEvent;
use super::tls;

pub struct BrokerSession {
    client: AsyncClient,
    eventloop: EventLoop,
    reconnect_delay: Duration,
    endpoint: String,
}

/// Build the connection options: client id, keep-alive, clean session,
/// last will, credentials and transport.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut mqttopts = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    mqttopts.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqttopts.set_clean_session(true);

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        mqttopts.set_credentials(user, pass);
    }

    mqttopts.set_last_will(LastWill::new(
        &config.will_topic,
        config.will_payload.as_bytes().to_vec(),
        QoS::AtMostOnce,
        false,
    ));
    mqttopts.set_transport(tls::transport(config));
    mqttopts
}

impl BrokerSession {
    /// Create the client. No I/O happens until [`BrokerSession::run`] polls
    /// the event loop.
    pub fn connect(config: &MqttConfig) -> Self {
        let (client, mut eventloop) = AsyncClient::new(mqtt_options(config), 100);

        let mut network = NetworkOptions::new();
        network.set_connection_timeout(config.connect_timeout_secs);
        eventloop.set_network_options(network);

        let scheme = if config.tls { "mqtts" } else { "mqtt" };
        Self {
            client,
            eventloop,
            reconnect_delay: Duration::from_millis(config.reconnect_ms),
            endpoint: format!("{scheme}://{}:{}", config.broker_host, config.broker_port),
        }
    }

    /// Publish/subscribe handle for the synchronizer.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Drive the connection forever, reconnecting after `reconnect_delay` on
    /// error. Returns once the event receiver is dropped.
    pub async fn run(mut self, events: mpsc::Sender<BrokerEvent>) {
        let mut connected = false;

        loop {
            let event = match self.eventloop.poll().await {
                Ok(Event::Incoming(incoming)) => match incoming {
                    Incoming::ConnAck(_) => {
                        info!("Connected to MQTT broker at {}", self.endpoint);
                        connected = true;
                        Some(BrokerEvent::Connected)
                    }
                    Incoming::Publish(publish) => Some(BrokerEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    }),
                    Incoming::SubAck(ack) => {
                        if ack
                            .return_codes
                            .iter()
                            .any(|code| matches!(code, SubscribeReasonCode::Failure))
                        {
                            warn!("Broker rejected subscription (pkid {})", ack.pkid);
                        }
                        None
                    }
                    Incoming::Disconnect => closed(&mut connected),
                    _ => None,
                },
                Ok(Event::Outgoing(_)) => None,
                Err(e) => {
                    let event = closed(&mut connected);
                    error!(
                        "MQTT connection error: {}. Reconnecting in {:?}",
                        e, self.reconnect_delay
                    );
                    if let Some(event) = event {
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };

            if let Some(event) = event {
                if events.send(event).await.is_err() {
                    warn!("Broker event channel closed");
                    return;
                }
            }
        }
    }
}

/// `Closed` only on the connected -> disconnected edge.
fn closed(connected: &mut bool) -> Option<BrokerEvent> {
    std::mem::replace(connected, false).then_some(BrokerEvent::Closed)
}
