//! Configuration for the HomeSeer exporter.

use std::path::Path;

use homeseer_status::{Credentials, CredentialsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::FamilyDescriptor;
use crate::registry::is_valid_label_name;

/// Label name carrying the device name.
pub const DEVICE_LABEL: &str = "device";

/// Label name carrying the resolved parent device name.
pub const PARENT_DEVICE_LABEL: &str = "parentDevice";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid hub credentials: {0}")]
    Credentials(#[from] CredentialsError),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Hub connection settings.
    #[serde(default)]
    pub homeseer: HomeseerConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Names of the two location labels.
    #[serde(default)]
    pub labels: LabelConfig,

    /// Scheduling model.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Extra classifications on top of the built-in table.
    #[serde(default)]
    pub classifications: Vec<FamilyDescriptor>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hub connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct HomeseerConfig {
    /// `host:port` of the hub (default: "127.0.0.1:8080").
    #[serde(default = "default_host_port")]
    pub host_port: String,

    /// Username presented to the hub. Empty for none.
    #[serde(default)]
    pub username: String,

    /// Password presented to the hub. Required when `username` is set.
    #[serde(default)]
    pub password: String,
}

fn default_host_port() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for HomeseerConfig {
    fn default() -> Self {
        Self {
            host_port: default_host_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for HomeseerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeseerConfig")
            .field("host_port", &self.host_port)
            .field("username", &self.username)
            .field("password", &"elided")
            .finish()
    }
}

impl HomeseerConfig {
    /// Credentials to present, or `None` for anonymous access.
    pub fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        Ok(Credentials::optional(&self.username, &self.password)?)
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:6789").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Metric namespace (first name component, omitted when empty).
    #[serde(default)]
    pub namespace: String,

    /// Metric subsystem (second name component, omitted when empty).
    #[serde(default)]
    pub subsystem: String,
}

fn default_listen() -> String {
    "0.0.0.0:6789".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
            namespace: String::new(),
            subsystem: String::new(),
        }
    }
}

/// Prometheus label names for HomeSeer's two location fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Label for HomeSeer "Location1" (default: "room").
    #[serde(default = "default_location1")]
    pub location1: String,

    /// Label for HomeSeer "Location2" (default: "floor").
    #[serde(default = "default_location2")]
    pub location2: String,
}

fn default_location1() -> String {
    "room".to_string()
}

fn default_location2() -> String {
    "floor".to_string()
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            location1: default_location1(),
            location2: default_location2(),
        }
    }
}

impl LabelConfig {
    /// Ordered label names of every device series.
    pub fn label_names(&self) -> [&str; 4] {
        [
            self.location2.as_str(),
            self.location1.as_str(),
            DEVICE_LABEL,
            PARENT_DEVICE_LABEL,
        ]
    }

    /// Check that both names are usable and distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, name) in [("location1", &self.location1), ("location2", &self.location2)] {
            if !is_valid_label_name(name) {
                return Err(ConfigError::Validation(format!(
                    "{} label {:?} is not a valid Prometheus label name",
                    field, name
                )));
            }
            if name == DEVICE_LABEL || name == PARENT_DEVICE_LABEL {
                return Err(ConfigError::Validation(format!(
                    "{} label {:?} collides with a built-in label",
                    field, name
                )));
            }
        }

        if self.location1 == self.location2 {
            return Err(ConfigError::Validation(format!(
                "location1 and location2 labels must differ (both are {:?})",
                self.location1
            )));
        }

        Ok(())
    }
}

/// How polls are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// Background worker polling on a fixed interval.
    #[default]
    Interval,
    /// One poll per scrape request, no background worker.
    OnDemand,
}

/// Polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default)]
    pub mode: PollMode,

    /// Seconds between polls in interval mode (default: 60).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            mode: PollMode::default(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.homeseer.host_port.is_empty() {
            return Err(ConfigError::Validation(
                "homeseer host_port must not be empty".to_string(),
            ));
        }

        self.homeseer.credentials()?;

        self.labels.validate()?;

        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "interval_secs must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert_eq!(config.homeseer.host_port, "127.0.0.1:8080");
        assert!(config.homeseer.credentials().unwrap().is_none());
        assert_eq!(config.prometheus.listen, "0.0.0.0:6789");
        assert_eq!(config.prometheus.path, "/metrics");
        assert_eq!(config.labels.location1, "room");
        assert_eq!(config.labels.location2, "floor");
        assert_eq!(config.polling.mode, PollMode::Interval);
        assert_eq!(config.polling.interval_secs, 60);
        assert!(config.classifications.is_empty());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            homeseer: {
                host_port: "hs4.local:80",
                username: "monitor",
                password: "hunter2",
            },
            prometheus: {
                listen: "127.0.0.1:9091",
                path: "/prometheus/metrics",
                namespace: "homeseer",
                subsystem: "zwave",
            },
            labels: { location1: "area", location2: "level" },
            polling: { mode: "on_demand", interval_secs: 15 },
            classifications: [
                {
                    keys: ["Electric Meter:Power Factor"],
                    name: "electric_meter_power_factor",
                    help: "Electric meter power factor",
                },
            ],
            logging: { level: "debug", format: "json" },
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.homeseer.host_port, "hs4.local:80");
        let credentials = config.homeseer.credentials().unwrap().unwrap();
        assert_eq!(credentials.username(), "monitor");
        assert_eq!(credentials.password(), "hunter2");
        assert_eq!(config.prometheus.listen, "127.0.0.1:9091");
        assert_eq!(config.prometheus.path, "/prometheus/metrics");
        assert_eq!(config.prometheus.namespace, "homeseer");
        assert_eq!(config.prometheus.subsystem, "zwave");
        assert_eq!(config.labels.label_names(), ["level", "area", "device", "parentDevice"]);
        assert_eq!(config.polling.mode, PollMode::OnDemand);
        assert_eq!(config.polling.interval_secs, 15);
        assert_eq!(config.classifications.len(), 1);
        assert_eq!(
            config.classifications[0].keys,
            vec!["Electric Meter:Power Factor"]
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_username_requires_password() {
        let json = r#"{ homeseer: { username: "monitor" } }"#;

        let err = ExporterConfig::parse(json).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Credentials(CredentialsError::MissingPassword { .. })
        ));
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_equal_location_labels() {
        let json = r#"{ labels: { location1: "room", location2: "room" } }"#;

        let err = ExporterConfig::parse(json).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_invalid_location_labels() {
        for labels in [
            r#"{ location1: "1st", location2: "floor" }"#,
            r#"{ location1: "room", location2: "" }"#,
            r#"{ location1: "device", location2: "floor" }"#,
            r#"{ location1: "room", location2: "parentDevice" }"#,
        ] {
            let json = format!("{{ labels: {} }}", labels);
            assert!(ExporterConfig::parse(&json).is_err(), "labels {labels}");
        }
    }

    #[test]
    fn test_validate_invalid_listen() {
        let json = r#"{
            prometheus: { listen: "not-an-address" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let json = r#"{
            prometheus: { path: "no-leading-slash" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_zero_interval() {
        let json = r#"{ polling: { interval_secs: 0 } }"#;
        assert!(ExporterConfig::parse(json).is_err());
    }

    #[test]
    fn test_debug_elides_password() {
        let config = HomeseerConfig {
            host_port: "hs:80".to_string(),
            username: "monitor".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{ homeseer: { host_port: "10.0.0.5:8080" } }"#,
        )
        .unwrap();

        let config = ExporterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.homeseer.host_port, "10.0.0.5:8080");
    }

    #[test]
    fn test_load_missing_file() {
        let err = ExporterConfig::load_from_file("/nonexistent/homeseer.json5").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
