use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::host::{AccessoryInfo, HostRequest, LockHost};
use crate::lock::synchronizer::{LockSynchronizer, StatusOutcome};
use crate::mqtt::{Broker, BrokerEvent};

/// Single owner of the lock synchronizer. Broker events and host requests
/// are applied one at a time, in arrival order.
pub struct LockEngine<B, H> {
    sync: LockSynchronizer<B, H>,
    accessory: AccessoryInfo,
}

impl<B: Broker, H: LockHost> LockEngine<B, H> {
    pub fn new(sync: LockSynchronizer<B, H>, accessory: AccessoryInfo) -> Self {
        info!("{} plugin loaded.", accessory.name);
        Self { sync, accessory }
    }

    pub fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => self.sync.handle_connected(),
            BrokerEvent::Message { topic, payload } => {
                match self.sync.handle_inbound_status(&topic, &payload) {
                    StatusOutcome::Changed { token, state } => {
                        debug!("{} reported {} -> {:?}", topic, token, state);
                    }
                    StatusOutcome::Unchanged => debug!("{}: duplicate status", topic),
                    StatusOutcome::Dropped(e) => debug!("{}: dropped ({:?})", topic, e),
                    StatusOutcome::OtherTopic => debug!("Ignoring message on {}", topic),
                }
            }
            BrokerEvent::Closed => self.sync.handle_closed(),
        }
    }

    pub fn handle_host_request(&mut self, request: HostRequest) {
        // A dropped reply receiver only means the requester stopped waiting
        match request {
            HostRequest::SetTarget { state, reply } => {
                self.sync.handle_set_target(state);
                let _ = reply.send(());
            }
            HostRequest::GetCurrentState { reply } => {
                let _ = reply.send(self.sync.current_state());
            }
            HostRequest::GetTargetState { reply } => {
                let _ = reply.send(self.sync.target_state());
            }
            HostRequest::Identify { reply } => {
                let _ = reply.send(self.accessory.clone());
            }
        }
    }

    /// Run until the broker session goes away. Queued broker events are
    /// applied before host requests. Losing the host side only stops request
    /// handling; status reports keep flowing.
    pub async fn run(
        mut self,
        mut broker_rx: mpsc::Receiver<BrokerEvent>,
        mut host_rx: mpsc::Receiver<HostRequest>,
    ) {
        let mut host_open = true;

        loop {
            tokio::select! {
                biased;

                event = broker_rx.recv() => match event {
                    Some(event) => self.handle_broker_event(event),
                    None => {
                        info!("Broker session ended");
                        return;
                    }
                },
                request = host_rx.recv(), if host_open => match request {
                    Some(request) => self.handle_host_request(request),
                    None => host_open = false,
                },
            }
        }
    }
}
