use serde::Deserialize;
use std::env;
use std::path::Path;

use rand::Rng;
use url::Url;

use crate::error::ConfigError;
use crate::host::AccessoryInfo;

#[derive(Debug, Clone)]
pub struct Config {
    pub accessory: AccessoryInfo,
    pub mqtt: MqttConfig,
    pub lock: LockConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub tls: bool,
    /// Accept any server certificate. Only honoured for TLS URLs.
    pub insecure_skip_verify: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub reconnect_ms: u64,
    pub connect_timeout_secs: u64,
    pub will_topic: String,
    pub will_payload: String,
}

/// Topics and the device's command/status vocabulary.
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub topic_status: String,
    pub topic_command: String,
    pub on_command: String,
    pub off_command: String,
    pub on_value: String,
    pub off_value: String,
}

// Accessory JSON, field names as written by the accessory configuration UI
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    name: String,
    #[serde(default)]
    manufacturer: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    serial_number: Option<String>,
    mqtt_url: String,
    #[serde(default)]
    mqtt_user: Option<String>,
    #[serde(default)]
    mqtt_pass: Option<String>,
    topic_status: String,
    topic_command: String,
    on_command: String,
    off_command: String,
    on_value: String,
    off_value: String,
    #[serde(default)]
    insecure_skip_verify: bool,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_optional(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(lookup: Lookup<'_>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        let path = env_or_default(&lookup, "LOCK_CONFIG_FILE", "config.json".to_string());
        Self::load(Path::new(&path), &lookup)
    }

    /// Read the accessory JSON at `path`, taking connection tuning from `lookup`.
    pub fn load(path: &Path, lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let raw: RawConfig = serde_json::from_str(&content).map_err(|source| {
            ConfigError::Parse {
                path: display,
                source,
            }
        })?;
        let config = Self::from_raw(raw, lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig, lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let (broker_host, broker_port, tls) = parse_broker_url(&raw.mqtt_url)?;

        let client_id = env_optional(lookup, "MQTT_CLIENT_ID").unwrap_or_else(|| {
            let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
            format!("{}_{}", raw.name, suffix)
        });

        // A password without a user is never sent
        let username = raw.mqtt_user.filter(|u| !u.is_empty());
        let password = username
            .as_ref()
            .map(|_| raw.mqtt_pass.unwrap_or_default());

        Ok(Self {
            mqtt: MqttConfig {
                broker_host,
                broker_port,
                tls,
                insecure_skip_verify: raw.insecure_skip_verify,
                username,
                password,
                client_id,
                keep_alive_secs: env_or_default(lookup, "MQTT_KEEPALIVE_SECS", 10),
                reconnect_ms: env_or_default(lookup, "MQTT_RECONNECT_MS", 1000),
                connect_timeout_secs: env_or_default(lookup, "MQTT_CONNECT_TIMEOUT_SECS", 30),
                will_topic: env_or_default(lookup, "MQTT_WILL_TOPIC", "home/will".to_string()),
                will_payload: raw.name.clone(),
            },
            lock: LockConfig {
                topic_status: raw.topic_status,
                topic_command: raw.topic_command,
                on_command: raw.on_command,
                off_command: raw.off_command,
                on_value: raw.on_value,
                off_value: raw.off_value,
            },
            accessory: AccessoryInfo {
                name: raw.name,
                manufacturer: raw
                    .manufacturer
                    .unwrap_or_else(|| "Default-Manufacturer".to_string()),
                model: raw.model.unwrap_or_else(|| "Default-Model".to_string()),
                serial_number: raw
                    .serial_number
                    .unwrap_or_else(|| "Default-Serial".to_string()),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.accessory.name.is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.lock.topic_status.is_empty() {
            return Err(ConfigError::Invalid("topicStatus must not be empty".into()));
        }
        if self.lock.topic_command.is_empty() {
            return Err(ConfigError::Invalid("topicCommand must not be empty".into()));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Invalid("MQTT_CLIENT_ID must not be empty".into()));
        }
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::Invalid("MQTT_KEEPALIVE_SECS must be >= 5".into()));
        }
        if self.mqtt.reconnect_ms == 0 {
            return Err(ConfigError::Invalid("MQTT_RECONNECT_MS must be > 0".into()));
        }
        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "MQTT_CONNECT_TIMEOUT_SECS must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Split an `mqtt://` / `mqtts://` URL into (host, port, tls).
fn parse_broker_url(raw: &str) -> Result<(String, u16, bool), ConfigError> {
    let invalid = |reason: &str| ConfigError::Url {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    let tls = match url.scheme() {
        "mqtt" | "tcp" => false,
        "mqtts" | "ssl" | "tls" => true,
        other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
    };
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok((host.to_string(), port, tls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const BASE: &str = r#"{
        "accessory": "DoorLock",
        "name": "Front Door",
        "manufacturer": "Acme",
        "mqttUrl": "mqtt://broker.local",
        "mqttUser": "door",
        "mqttPass": "secret",
        "topicStatus": "home/door/status",
        "topicCommand": "home/door/cmd",
        "onCommand": "LOCK_CMD",
        "offCommand": "UNLOCK_CMD",
        "onValue": "CLOSE",
        "offValue": "OPEN"
    }"#;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn load_with(json: &str, env: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let file = write_config(json);
        let vars: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let lookup = move |key: &str| vars.get(key).cloned();
        Config::load(file.path(), &lookup)
    }

    #[test]
    fn loads_accessory_json_with_defaults() {
        let config = load_with(BASE, &[]).unwrap();

        assert_eq!(config.accessory.name, "Front Door");
        assert_eq!(config.accessory.manufacturer, "Acme");
        assert_eq!(config.accessory.model, "Default-Model");
        assert_eq!(config.mqtt.broker_host, "broker.local");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert!(!config.mqtt.tls);
        assert!(!config.mqtt.insecure_skip_verify);
        assert_eq!(config.mqtt.username.as_deref(), Some("door"));
        assert_eq!(config.mqtt.password.as_deref(), Some("secret"));
        assert_eq!(config.mqtt.keep_alive_secs, 10);
        assert_eq!(config.mqtt.reconnect_ms, 1000);
        assert_eq!(config.mqtt.connect_timeout_secs, 30);
        assert_eq!(config.mqtt.will_topic, "home/will");
        assert_eq!(config.mqtt.will_payload, "Front Door");
        assert!(config.mqtt.client_id.starts_with("Front Door_"));
        assert_eq!(config.lock.topic_status, "home/door/status");
        assert_eq!(config.lock.off_command, "UNLOCK_CMD");
        assert_eq!(config.lock.on_value, "CLOSE");
    }

    #[test]
    fn env_overrides_connection_tuning() {
        let config = load_with(
            BASE,
            &[
                ("MQTT_CLIENT_ID", "door-1"),
                ("MQTT_KEEPALIVE_SECS", "60"),
                ("MQTT_WILL_TOPIC", "home/door/will"),
            ],
        )
        .unwrap();

        assert_eq!(config.mqtt.client_id, "door-1");
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.mqtt.will_topic, "home/door/will");
    }

    #[test]
    fn tls_scheme_and_explicit_insecure_opt_in() {
        let json = BASE
            .replace("mqtt://broker.local", "mqtts://broker.local")
            .replace(
                r#""offValue": "OPEN""#,
                r#""offValue": "OPEN", "insecureSkipVerify": true"#,
            );
        let config = load_with(&json, &[]).unwrap();

        assert!(config.mqtt.tls);
        assert_eq!(config.mqtt.broker_port, 8883);
        assert!(config.mqtt.insecure_skip_verify);
    }

    #[test]
    fn password_without_user_is_dropped() {
        let json = BASE.replace(r#""mqttUser": "door","#, "");
        let config = load_with(&json, &[]).unwrap();
        assert!(config.mqtt.username.is_none());
        assert!(config.mqtt.password.is_none());
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let json = BASE.replace("mqtt://broker.local", "ws://broker.local:9001");
        assert!(matches!(load_with(&json, &[]), Err(ConfigError::Url { .. })));
    }

    #[test]
    fn rejects_missing_required_field() {
        let json = BASE.replace(r#""topicCommand": "home/door/cmd","#, "");
        assert!(matches!(load_with(&json, &[]), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn rejects_short_keepalive() {
        let result = load_with(BASE, &[("MQTT_KEEPALIVE_SECS", "2")]);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let lookup = |_: &str| None;
        let result = Config::load(Path::new("/nonexistent/lock.json"), &lookup);
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
