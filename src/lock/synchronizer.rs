use tracing::{info, warn};

use crate::config::LockConfig;
use crate::error::PayloadError;
use crate::host::LockHost;
use crate::mqtt::Broker;

use super::{LockState, classify, parse_device_status};

/// What an inbound message did to the lock state.
#[derive(Debug, PartialEq)]
pub enum StatusOutcome {
    /// Not the status topic.
    OtherTopic,
    /// Same token as the previous report; the host was not notified.
    Unchanged,
    Dropped(PayloadError),
    Changed { token: String, state: LockState },
}

/// Translates host requests into device commands and device status reports
/// into host updates. Owns the only copy of the lock state.
pub struct LockSynchronizer<B, H> {
    broker: B,
    host: H,
    config: LockConfig,
    current_state: Option<LockState>,
    target_state: Option<LockState>,
    last_device_status: Option<String>,
}

impl<B: Broker, H: LockHost> LockSynchronizer<B, H> {
    pub fn new(config: LockConfig, broker: B, host: H) -> Self {
        Self {
            broker,
            host,
            config,
            current_state: None,
            target_state: None,
            last_device_status: None,
        }
    }

    pub fn current_state(&self) -> Option<LockState> {
        self.current_state
    }

    pub fn target_state(&self) -> Option<LockState> {
        self.target_state
    }

    /// Resolve the device command for a requested state. "On" secures the
    /// device in this family, so unlocking sends the off command.
    pub fn command_for(&self, requested: LockState) -> &str {
        match requested {
            LockState::Unsecured => &self.config.off_command,
            LockState::Secured => &self.config.on_command,
        }
    }

    /// Publish the command for `requested` and accept it as the new target
    /// without waiting for the device. A later status report corrects it.
    pub fn handle_set_target(&mut self, requested: LockState) {
        let command = self.command_for(requested);
        if let Err(e) = self.broker.publish(&self.config.topic_command, command) {
            warn!("{}", e);
        }
        self.target_state = Some(requested);
    }

    pub fn handle_inbound_status(&mut self, topic: &str, payload: &[u8]) -> StatusOutcome {
        if topic != self.config.topic_status {
            return StatusOutcome::OtherTopic;
        }

        let token = match parse_device_status(payload) {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    "Dropping status message on {}: {} ({})",
                    topic,
                    e,
                    String::from_utf8_lossy(payload)
                );
                return StatusOutcome::Dropped(e);
            }
        };

        if self.last_device_status.as_deref() == Some(token.as_str()) {
            return StatusOutcome::Unchanged;
        }

        let state = classify(&token, &self.config.off_value);
        self.current_state = Some(state);
        self.target_state = Some(state);
        self.host.report_current_state(state);
        self.host.report_target_state(state);
        info!("Set door to : {}", token);
        self.last_device_status = Some(token.clone());

        StatusOutcome::Changed { token, state }
    }

    /// Re-issue the status subscription. Called after every (re)connect since
    /// a clean session drops broker-side subscriptions.
    pub fn handle_connected(&mut self) {
        match self.broker.subscribe(&self.config.topic_status) {
            Ok(()) => info!("Subscribed to {}", self.config.topic_status),
            Err(e) => warn!("Failed to subscribe : {} ({})", self.config.topic_status, e),
        }
    }

    pub fn handle_closed(&mut self) {
        info!("MQTT connection closed.");
    }
}
