//! Signaling server configuration.
//!
//! Configuration is loaded from environment variables, every knob with a
//! default so a bare `cargo run` serves local clients.

use media_engine::{WebRtcTransportOptions, WorkerSettings};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default WebSocket signaling bind address.
pub const DEFAULT_SIGNALING_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default local address transports listen on.
pub const DEFAULT_LISTEN_IP: &str = "0.0.0.0";

/// Default address advertised to clients in ICE candidates.
pub const DEFAULT_ANNOUNCED_IP: &str = "127.0.0.1";

/// Default lowest RTC port.
pub const DEFAULT_RTC_MIN_PORT: u16 = 2000;

/// Default highest RTC port.
pub const DEFAULT_RTC_MAX_PORT: u16 = 2020;

/// Default SFU instance ID prefix.
pub const DEFAULT_SFU_ID_PREFIX: &str = "sfu";

/// Signaling server configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket signaling bind address (default: "0.0.0.0:8000").
    pub signaling_bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Local address WebRTC transports listen on (default: "0.0.0.0").
    pub listen_ip: String,

    /// Address advertised to clients in ICE candidates (default: "127.0.0.1").
    pub announced_ip: String,

    /// Lowest RTC port the engine worker may bind (default: 2000).
    pub rtc_min_port: u16,

    /// Highest RTC port the engine worker may bind (default: 2020).
    pub rtc_max_port: u16,

    /// Unique identifier for this SFU instance.
    pub sfu_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let signaling_bind_address = vars
            .get("SFU_SIGNALING_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SIGNALING_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("SFU_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let listen_ip = vars
            .get("SFU_LISTEN_IP")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LISTEN_IP.to_string());

        let announced_ip = vars
            .get("SFU_ANNOUNCED_IP")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ANNOUNCED_IP.to_string());

        let rtc_min_port = parse_port(vars, "SFU_RTC_MIN_PORT", DEFAULT_RTC_MIN_PORT)?;
        let rtc_max_port = parse_port(vars, "SFU_RTC_MAX_PORT", DEFAULT_RTC_MAX_PORT)?;

        if rtc_min_port > rtc_max_port {
            return Err(ConfigError::InvalidValue(format!(
                "SFU_RTC_MIN_PORT ({rtc_min_port}) must not exceed SFU_RTC_MAX_PORT ({rtc_max_port})"
            )));
        }

        // Generate SFU instance ID
        let sfu_id = vars.get("SFU_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_SFU_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            signaling_bind_address,
            health_bind_address,
            listen_ip,
            announced_ip,
            rtc_min_port,
            rtc_max_port,
            sfu_id,
        })
    }

    /// Engine worker settings derived from this configuration.
    #[must_use]
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            rtc_min_port: self.rtc_min_port,
            rtc_max_port: self.rtc_max_port,
            ..WorkerSettings::default()
        }
    }

    /// WebRTC transport options derived from this configuration.
    ///
    /// UDP and TCP candidates are both offered with UDP preferred; deployed
    /// clients rely on this ordering.
    #[must_use]
    pub fn transport_options(&self) -> WebRtcTransportOptions {
        WebRtcTransportOptions {
            listen_ip: self.listen_ip.clone(),
            announced_ip: self.announced_ip.clone(),
            enable_udp: true,
            enable_tcp: true,
            prefer_udp: true,
        }
    }
}

fn parse_port(
    vars: &HashMap<String, String>,
    name: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name} must be a port number: {raw}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.signaling_bind_address, DEFAULT_SIGNALING_BIND_ADDRESS);
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.listen_ip, DEFAULT_LISTEN_IP);
        assert_eq!(config.announced_ip, DEFAULT_ANNOUNCED_IP);
        assert_eq!(config.rtc_min_port, DEFAULT_RTC_MIN_PORT);
        assert_eq!(config.rtc_max_port, DEFAULT_RTC_MAX_PORT);
        // SFU ID should be auto-generated
        assert!(config.sfu_id.starts_with("sfu-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            (
                "SFU_SIGNALING_BIND_ADDRESS".to_string(),
                "127.0.0.1:9000".to_string(),
            ),
            (
                "SFU_HEALTH_BIND_ADDRESS".to_string(),
                "127.0.0.1:9081".to_string(),
            ),
            ("SFU_LISTEN_IP".to_string(), "10.0.0.5".to_string()),
            ("SFU_ANNOUNCED_IP".to_string(), "203.0.113.7".to_string()),
            ("SFU_RTC_MIN_PORT".to_string(), "40000".to_string()),
            ("SFU_RTC_MAX_PORT".to_string(), "40100".to_string()),
            ("SFU_ID".to_string(), "sfu-custom-001".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.signaling_bind_address, "127.0.0.1:9000");
        assert_eq!(config.health_bind_address, "127.0.0.1:9081");
        assert_eq!(config.listen_ip, "10.0.0.5");
        assert_eq!(config.announced_ip, "203.0.113.7");
        assert_eq!(config.rtc_min_port, 40000);
        assert_eq!(config.rtc_max_port, 40100);
        assert_eq!(config.sfu_id, "sfu-custom-001");
    }

    #[test]
    fn test_from_vars_invalid_port() {
        let vars = HashMap::from([("SFU_RTC_MIN_PORT".to_string(), "not-a-port".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_from_vars_inverted_port_range() {
        let vars = HashMap::from([
            ("SFU_RTC_MIN_PORT".to_string(), "3000".to_string()),
            ("SFU_RTC_MAX_PORT".to_string(), "2000".to_string()),
        ]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_transport_options_reflect_config() {
        let vars = HashMap::from([("SFU_ANNOUNCED_IP".to_string(), "198.51.100.4".to_string())]);
        let config = Config::from_vars(&vars).unwrap();

        let options = config.transport_options();
        assert_eq!(options.listen_ip, "0.0.0.0");
        assert_eq!(options.announced_ip, "198.51.100.4");
        assert!(options.enable_udp);
        assert!(options.enable_tcp);
        assert!(options.prefer_udp);
    }

    #[test]
    fn test_worker_settings_reflect_config() {
        let vars = HashMap::from([
            ("SFU_RTC_MIN_PORT".to_string(), "5000".to_string()),
            ("SFU_RTC_MAX_PORT".to_string(), "5010".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();

        let settings = config.worker_settings();
        assert_eq!(settings.rtc_min_port, 5000);
        assert_eq!(settings.rtc_max_port, 5010);
    }
}
