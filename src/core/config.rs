use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
    pub demo: bool,
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub recv_window: Option<u64>,
    pub time_offset_ms: i64,
    pub ws_keepalive: bool,
    pub ws_timeout_secs: u64,
}

const DEFAULT_WS_TIMEOUT_SECS: u64 = 60;

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 9)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("demo", &self.demo)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("ws_url", &self.ws_url)?;
        state.serialize_field("recv_window", &self.recv_window)?;
        state.serialize_field("time_offset_ms", &self.time_offset_ms)?;
        state.serialize_field("ws_keepalive", &self.ws_keepalive)?;
        state.serialize_field("ws_timeout_secs", &self.ws_timeout_secs)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ExchangeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ExchangeConfigHelper {
            api_key: String,
            secret_key: String,
            #[serde(default)]
            demo: bool,
            base_url: Option<String>,
            ws_url: Option<String>,
            recv_window: Option<u64>,
            #[serde(default)]
            time_offset_ms: i64,
            #[serde(default)]
            ws_keepalive: bool,
            ws_timeout_secs: Option<u64>,
        }

        let helper = ExchangeConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            secret_key: Secret::new(helper.secret_key),
            demo: helper.demo,
            base_url: helper.base_url,
            ws_url: helper.ws_url,
            recv_window: helper.recv_window,
            time_offset_ms: helper.time_offset_ms,
            ws_keepalive: helper.ws_keepalive,
            ws_timeout_secs: helper.ws_timeout_secs.unwrap_or(DEFAULT_WS_TIMEOUT_SECS),
        })
    }
}

impl ExchangeConfig {
    /// Create a new configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            demo: false,
            base_url: None,
            ws_url: None,
            recv_window: None,
            time_offset_ms: 0,
            ws_keepalive: false,
            ws_timeout_secs: DEFAULT_WS_TIMEOUT_SECS,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY` (e.g., `CURRENCYCOM_API_KEY`)
    /// - `{PREFIX}_SECRET_KEY`
    /// - `{PREFIX}_DEMO` (optional, defaults to false)
    /// - `{PREFIX}_BASE_URL`, `{PREFIX}_WS_URL` (optional)
    /// - `{PREFIX}_RECV_WINDOW` (optional, milliseconds)
    /// - `{PREFIX}_WS_KEEPALIVE` (optional, defaults to false)
    /// - `{PREFIX}_WS_TIMEOUT_SECS` (optional, defaults to 60)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let api_key_var = format!("{}_API_KEY", prefix);
        let secret_key_var = format!("{}_SECRET_KEY", prefix);

        let api_key = env::var(&api_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(api_key_var))?;

        let secret_key = env::var(&secret_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(secret_key_var))?;

        let demo = parse_flag(&format!("{}_DEMO", prefix))?;
        let ws_keepalive = parse_flag(&format!("{}_WS_KEEPALIVE", prefix))?;
        let recv_window = parse_number::<u64>(&format!("{}_RECV_WINDOW", prefix))?;
        let ws_timeout_secs = parse_number::<u64>(&format!("{}_WS_TIMEOUT_SECS", prefix))?
            .unwrap_or(DEFAULT_WS_TIMEOUT_SECS);

        Ok(Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            demo,
            base_url: env::var(format!("{}_BASE_URL", prefix)).ok(),
            ws_url: env::var(format!("{}_WS_URL", prefix)).ok(),
            recv_window,
            time_offset_ms: 0,
            ws_keepalive,
            ws_timeout_secs,
        })
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no file: fall through to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Create configuration for read-only operations (market data only)
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new())
    }

    /// Check if this configuration has valid credentials for authenticated operations
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.secret_key.expose_secret().is_empty()
    }

    /// Use the demo environment
    #[must_use]
    pub const fn demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    /// Set custom REST base URL
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set custom streaming URL
    #[must_use]
    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    #[must_use]
    pub const fn recv_window(mut self, recv_window: u64) -> Self {
        self.recv_window = Some(recv_window);
        self
    }

    /// Offset subtracted from the local clock when stamping signed requests
    #[must_use]
    pub const fn time_offset_ms(mut self, offset: i64) -> Self {
        self.time_offset_ms = offset;
        self
    }

    /// Enable websocket keepalive pings with the given liveness timeout
    #[must_use]
    pub const fn ws_keepalive(mut self, enabled: bool, timeout_secs: u64) -> Self {
        self.ws_keepalive = enabled;
        self.ws_timeout_secs = timeout_secs;
        self
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

fn parse_flag(var: &str) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse::<bool>().map_err(|_| {
            ConfigError::InvalidConfiguration(format!("{} must be true or false, got '{}'", var, value))
        }),
        Err(_) => Ok(false),
    }
}

fn parse_number<T: std::str::FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::InvalidConfiguration(format!("{} is not a valid number: '{}'", var, value))
        }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_redacts_secrets() {
        let config = ExchangeConfig::new("key".to_string(), "secret".to_string()).demo(true);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("secret\""));
        assert!(json.contains("\"demo\":true"));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ExchangeConfig =
            serde_json::from_str(r#"{"api_key":"k","secret_key":"s"}"#).unwrap();
        assert_eq!(config.api_key(), "k");
        assert!(!config.demo);
        assert!(!config.ws_keepalive);
        assert_eq!(config.ws_timeout_secs, 60);
        assert_eq!(config.recv_window, None);
    }

    #[test]
    fn test_read_only_has_no_credentials() {
        assert!(!ExchangeConfig::read_only().has_credentials());
        assert!(ExchangeConfig::new("k".into(), "s".into()).has_credentials());
    }

    #[test]
    fn test_from_env_reads_prefixed_variables() {
        env::set_var("CCXTEST_API_KEY", "env-key");
        env::set_var("CCXTEST_SECRET_KEY", "env-secret");
        env::set_var("CCXTEST_DEMO", "true");
        env::set_var("CCXTEST_RECV_WINDOW", "5000");

        let config = ExchangeConfig::from_env("ccxtest").unwrap();
        assert_eq!(config.api_key(), "env-key");
        assert_eq!(config.secret_key(), "env-secret");
        assert!(config.demo);
        assert_eq!(config.recv_window, Some(5000));
    }

    #[test]
    fn test_from_env_missing_key() {
        let err = ExchangeConfig::from_env("CCXMISSING").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvironmentVariable(v) if v == "CCXMISSING_API_KEY"));
    }
}
