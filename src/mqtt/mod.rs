pub mod session;
pub mod tls;

use rumqttc::{AsyncClient, QoS};

use crate::error::BrokerError;

/// Something that happened on the broker connection.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    /// Raised after every successful (re)connect.
    Connected,
    Message { topic: String, payload: Vec<u8> },
    /// Raised once per lost connection.
    Closed,
}

/// Non-blocking publish/subscribe capability handed to the lock synchronizer.
pub trait Broker: Send {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError>;
    fn subscribe(&self, topic: &str) -> Result<(), BrokerError>;
}

impl Broker for AsyncClient {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        self.try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| BrokerError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| BrokerError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}
