//! Server configuration read from the environment

/// Environment variable holding the bind address
pub const HOST_VAR: &str = "SPLIT_LEDGER_HOST";
/// Environment variable holding the bind port
pub const PORT_VAR: &str = "SPLIT_LEDGER_PORT";
/// MQTT broker host; publishing is off while unset
pub const MQTT_HOST_VAR: &str = "SPLIT_LEDGER_MQTT_HOST";
pub const MQTT_PORT_VAR: &str = "SPLIT_LEDGER_MQTT_PORT";
pub const MQTT_CLIENT_ID_VAR: &str = "SPLIT_LEDGER_MQTT_CLIENT_ID";
pub const MQTT_TOPIC_PREFIX_VAR: &str = "SPLIT_LEDGER_MQTT_TOPIC_PREFIX";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTT_CLIENT_ID: &str = "split-ledger";
const DEFAULT_MQTT_TOPIC_PREFIX: &str = "split-ledger";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port in SPLIT_LEDGER_PORT: {0}")]
    InvalidPort(String),
    #[error("SPLIT_LEDGER_HOST cannot be empty")]
    EmptyHost,
    #[error("Invalid port in SPLIT_LEDGER_MQTT_PORT: {0}")]
    InvalidMqttPort(String),
    #[error("SPLIT_LEDGER_MQTT_TOPIC_PREFIX cannot be empty")]
    EmptyTopicPrefix,
}

/// Broker settings for balance publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// First level of the state topics, `<prefix>/<group id>/state`
    pub topic_prefix: String,
}

impl MqttConfig {
    /// Settings for `host` with default port, client id and prefix
    pub fn new(host: String) -> Self {
        Self {
            host,
            port: DEFAULT_MQTT_PORT,
            client_id: DEFAULT_MQTT_CLIENT_ID.to_string(),
            topic_prefix: DEFAULT_MQTT_TOPIC_PREFIX.to_string(),
        }
    }
}

/// Where the HTTP server listens and where balances are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` keeps balance publishing in the log only
    pub mqtt: Option<MqttConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mqtt: None,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = match lookup(HOST_VAR) {
            Some(host) if host.trim().is_empty() => return Err(ConfigError::EmptyHost),
            Some(host) => host.trim().to_string(),
            None => DEFAULT_HOST.to_string(),
        };

        let port = match lookup(PORT_VAR) {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => return Err(ConfigError::InvalidPort(raw)),
            },
            None => DEFAULT_PORT,
        };

        let mqtt = Self::mqtt_from_lookup(&lookup)?;

        Ok(Self { host, port, mqtt })
    }

    fn mqtt_from_lookup<F>(lookup: &F) -> Result<Option<MqttConfig>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = match lookup(MQTT_HOST_VAR) {
            Some(host) if !host.trim().is_empty() => host.trim().to_string(),
            _ => return Ok(None),
        };
        let mut mqtt = MqttConfig::new(host);

        if let Some(raw) = lookup(MQTT_PORT_VAR) {
            mqtt.port = match raw.trim().parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => return Err(ConfigError::InvalidMqttPort(raw)),
            };
        }
        if let Some(client_id) = lookup(MQTT_CLIENT_ID_VAR).filter(|id| !id.trim().is_empty()) {
            mqtt.client_id = client_id.trim().to_string();
        }
        if let Some(prefix) = lookup(MQTT_TOPIC_PREFIX_VAR) {
            let prefix = prefix.trim().trim_matches('/');
            if prefix.is_empty() {
                return Err(ConfigError::EmptyTopicPrefix);
            }
            mqtt.topic_prefix = prefix.to_string();
        }

        Ok(Some(mqtt))
    }

    /// `host:port` for binding
    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
