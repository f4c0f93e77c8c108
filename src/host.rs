//! The accessory platform side of the bridge.
//!
//! The engine reports state through [`LockHost`] and receives requests as
//! [`HostRequest`] messages, each carrying a reply channel.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::lock::LockState;

/// Identity fields shown by the host. Not used by the lock logic.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

/// Receives the characteristic updates produced by inbound status reports.
pub trait LockHost: Send {
    fn report_current_state(&mut self, state: LockState);
    fn report_target_state(&mut self, state: LockState);
}

pub enum HostRequest {
    /// Always accepted; the reply fires once the command has been handed to the broker client.
    SetTarget {
        state: LockState,
        reply: oneshot::Sender<()>,
    },
    GetCurrentState {
        reply: oneshot::Sender<Option<LockState>>,
    },
    GetTargetState {
        reply: oneshot::Sender<Option<LockState>>,
    },
    Identify {
        reply: oneshot::Sender<AccessoryInfo>,
    },
}

/// Host that records characteristic updates in the log.
pub struct TracingHost {
    name: String,
}

impl TracingHost {
    pub fn new(info: &AccessoryInfo) -> Self {
        Self {
            name: info.name.clone(),
        }
    }
}

impl LockHost for TracingHost {
    fn report_current_state(&mut self, state: LockState) {
        info!("{}: LockCurrentState = {}", self.name, state.characteristic_value());
    }

    fn report_target_state(&mut self, state: LockState) {
        info!("{}: LockTargetState = {}", self.name, state.characteristic_value());
    }
}

#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Set(LockState),
    Status,
    Identify,
}

/// Parse one console line. Numeric input follows the characteristic convention:
/// `0` unlocks, any other number locks.
fn parse_console_line(line: &str) -> Option<ConsoleCommand> {
    let word = line.trim().to_ascii_lowercase();
    match word.as_str() {
        "lock" | "secure" => Some(ConsoleCommand::Set(LockState::Secured)),
        "unlock" | "unsecure" => Some(ConsoleCommand::Set(LockState::Unsecured)),
        "status" => Some(ConsoleCommand::Status),
        "identify" => Some(ConsoleCommand::Identify),
        other => other
            .parse::<u8>()
            .ok()
            .map(|v| ConsoleCommand::Set(LockState::from_characteristic(v))),
    }
}

fn describe(state: Option<LockState>) -> &'static str {
    match state {
        Some(LockState::Secured) => "secured",
        Some(LockState::Unsecured) => "unsecured",
        None => "unknown",
    }
}

/// Read host requests from stdin until EOF or the engine goes away.
pub async fn run_console(requests: mpsc::Sender<HostRequest>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Console input closed");
                return;
            }
            Err(e) => {
                warn!("Console read error: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let Some(command) = parse_console_line(&line) else {
            warn!("Unknown command '{}' (expected lock, unlock, status or identify)", line.trim());
            continue;
        };

        let sent = match command {
            ConsoleCommand::Set(state) => {
                let (reply, rx) = oneshot::channel();
                if requests.send(HostRequest::SetTarget { state, reply }).await.is_err() {
                    return;
                }
                rx.await.is_ok()
            }
            ConsoleCommand::Status => {
                let (current_tx, current_rx) = oneshot::channel();
                let (target_tx, target_rx) = oneshot::channel();
                if requests
                    .send(HostRequest::GetCurrentState { reply: current_tx })
                    .await
                    .is_err()
                    || requests
                        .send(HostRequest::GetTargetState { reply: target_tx })
                        .await
                        .is_err()
                {
                    return;
                }
                match (current_rx.await, target_rx.await) {
                    (Ok(current), Ok(target)) => {
                        info!("current={}, target={}", describe(current), describe(target));
                        true
                    }
                    _ => false,
                }
            }
            ConsoleCommand::Identify => {
                let (reply, rx) = oneshot::channel();
                if requests.send(HostRequest::Identify { reply }).await.is_err() {
                    return;
                }
                match rx.await {
                    Ok(accessory) => {
                        info!(
                            "{} ({} {}, serial {})",
                            accessory.name,
                            accessory.manufacturer,
                            accessory.model,
                            accessory.serial_number
                        );
                        true
                    }
                    Err(_) => false,
                }
            }
        };

        if !sent {
            warn!("Lock engine stopped; closing console");
            return;
        }
    }
}
