use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("Invalid mqttUrl '{url}': {reason}")]
    Url { url: String, reason: String },
    #[error("{0}")]
    Invalid(String),
}

/// Why an inbound status payload was dropped.
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no DeviceStatus field")]
    MissingStatus,
    #[error("DeviceStatus is not a string: {0}")]
    StatusNotString(String),
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to queue publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },
    #[error("failed to queue subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },
}
