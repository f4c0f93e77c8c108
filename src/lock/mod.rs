pub mod synchronizer;

use crate::error::PayloadError;

/// Position of the lock bolt, as reported by the device or requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unsecured,
    Secured,
}

impl LockState {
    /// Host characteristic value: 0 unsecured, anything else secured.
    pub fn from_characteristic(value: u8) -> Self {
        if value == 0 {
            Self::Unsecured
        } else {
            Self::Secured
        }
    }

    pub fn characteristic_value(self) -> u8 {
        match self {
            Self::Unsecured => 0,
            Self::Secured => 1,
        }
    }
}

/// Classify a raw status token. Only `off_value` unlocks; every other token,
/// `on_value` or not, is treated as secured.
pub fn classify(token: &str, off_value: &str) -> LockState {
    if token == off_value {
        LockState::Unsecured
    } else {
        LockState::Secured
    }
}

/// Extract the `DeviceStatus` token from a status payload such as
/// `{"DeviceStatus":"ON"}`. Other fields are ignored.
pub fn parse_device_status(payload: &[u8]) -> Result<String, PayloadError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| PayloadError::Json(e.to_string()))?;
    let object = value.as_object().ok_or(PayloadError::NotAnObject)?;

    match object.get("DeviceStatus") {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(PayloadError::StatusNotString(other.to_string())),
        None => Err(PayloadError::MissingStatus),
    }
}
