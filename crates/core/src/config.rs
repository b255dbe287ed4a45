//! Configuration management for telemesh.
//!
//! A single [`MeshConfig`] document describes the whole mesh; each role reads
//! its own section. Every field has a default, so an empty file is valid.
//! `TELEMESH_*` environment variables are applied on top of the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidOverride { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
        }
    }
}

/// Candidate-address policy shared by every hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Try the side-channel mesh address before the hostname.
    pub use_mesh_address: bool,
    /// A missing mesh address is fatal and the hostname tier is never used.
    pub strict: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_mesh_address: true,
            strict: false,
        }
    }
}

/// Per-candidate timeout budget for one hop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HopTimeouts {
    /// Budget for the mesh-address attempt.
    pub mesh_secs: f64,
    /// Budget for the hostname attempt.
    pub hostname_secs: f64,
}

impl HopTimeouts {
    pub fn mesh(&self) -> Duration {
        Duration::from_secs_f64(self.mesh_secs)
    }

    pub fn hostname(&self) -> Duration {
        Duration::from_secs_f64(self.hostname_secs)
    }
}

/// Where a logical target lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Conventional network hostname.
    pub host: String,
    #[serde(default = "default_service_port")]
    pub port: u16,
    /// Resource path on the target, without leading slash.
    pub path: String,
    /// Side-channel file holding the target's mesh address.
    #[serde(default)]
    pub addr_file: Option<PathBuf>,
}

impl TargetConfig {
    fn named(host: &str, path: &str) -> Self {
        Self {
            host: host.to_string(),
            port: default_service_port(),
            path: path.to_string(),
            addr_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub listen_port: u16,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            listen_port: default_service_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    pub listen_port: u16,
    pub election_interval_secs: f64,
    pub timeouts: HopTimeouts,
    pub gps: TargetConfig,
    pub battery: TargetConfig,
    pub temperature: TargetConfig,
}

impl LeaderConfig {
    pub fn election_interval(&self) -> Duration {
        Duration::from_secs_f64(self.election_interval_secs)
    }
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            listen_port: default_service_port(),
            election_interval_secs: 20.0,
            timeouts: HopTimeouts {
                mesh_secs: 1.0,
                hostname_secs: 2.5,
            },
            gps: TargetConfig::named("telemesh-gps", "gps"),
            battery: TargetConfig::named("telemesh-battery", "battery"),
            temperature: TargetConfig::named("telemesh-temperature", "temperature"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub listen_port: u16,
    pub timeouts: HopTimeouts,
    pub leader: TargetConfig,
    /// Republish canonical readings to the broker topic.
    pub publish: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listen_port: default_service_port(),
            timeouts: HopTimeouts {
                mesh_secs: 1.0,
                hostname_secs: 4.0,
            },
            leader: TargetConfig::named("telemesh-leader", "collect"),
            publish: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub listen_port: u16,
    pub timeouts: HopTimeouts,
    pub router: TargetConfig,
    pub collect_retries: u32,
    pub collect_delay_secs: f64,
    /// Overall budget for one end-to-end attempt.
    pub collect_timeout_secs: f64,
    pub database_path: PathBuf,
    /// Connect to the broker: ingest the router topic and publish session topics.
    pub subscribe: bool,
}

impl BackendConfig {
    pub fn collect_delay(&self) -> Duration {
        Duration::from_secs_f64(self.collect_delay_secs)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.collect_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            listen_port: 8000,
            timeouts: HopTimeouts {
                mesh_secs: 1.0,
                hostname_secs: 7.5,
            },
            router: TargetConfig::named("telemesh-router", "collect"),
            collect_retries: 1,
            collect_delay_secs: 0.3,
            collect_timeout_secs: 8.0,
            database_path: PathBuf::from("telemesh.db"),
            subscribe: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Topic the router republishes canonical readings on.
    pub topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "telemesh".to_string(),
            topic: "telemesh/readings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub shared_key: String,
    pub logging: LoggingConfig,
    pub resolver: ResolverConfig,
    pub sensor: SensorConfig,
    pub leader: LeaderConfig,
    pub router: RouterConfig,
    pub backend: BackendConfig,
    pub broker: BrokerConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            shared_key: "zolis-key".to_string(),
            logging: LoggingConfig::default(),
            resolver: ResolverConfig::default(),
            sensor: SensorConfig::default(),
            leader: LeaderConfig::default(),
            router: RouterConfig::default(),
            backend: BackendConfig::default(),
            broker: BrokerConfig::default(),
        }
    }
}

impl MeshConfig {
    /// Load from an optional TOML file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TELEMESH_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Overrides { lookup: &lookup };

        if let Some(key) = env.string("TELEMESH_SHARED_KEY") {
            self.shared_key = key;
        }
        if let Some(format) = env.parse::<LogFormat>("TELEMESH_LOG_FORMAT")? {
            self.logging.format = format;
        }
        if let Some(flag) = env.flag("TELEMESH_USE_MESH_ADDRESS")? {
            self.resolver.use_mesh_address = flag;
        }
        if let Some(flag) = env.flag("TELEMESH_STRICT_MESH")? {
            self.resolver.strict = flag;
        }
        if let Some(interval) = env.parse("TELEMESH_ELECTION_INTERVAL")? {
            self.leader.election_interval_secs = interval;
        }
        if let Some(port) = env.parse::<u16>("TELEMESH_LISTEN_PORT")? {
            self.sensor.listen_port = port;
            self.leader.listen_port = port;
            self.router.listen_port = port;
            self.backend.listen_port = port;
        }

        env.target("GPS", &mut self.leader.gps)?;
        env.target("BATTERY", &mut self.leader.battery)?;
        env.target("TEMPERATURE", &mut self.leader.temperature)?;
        env.target("LEADER", &mut self.router.leader)?;
        env.target("ROUTER", &mut self.backend.router)?;

        if let Some(flag) = env.flag("TELEMESH_ROUTER_PUBLISH")? {
            self.router.publish = flag;
        }
        if let Some(retries) = env.parse("TELEMESH_COLLECT_RETRIES")? {
            self.backend.collect_retries = retries;
        }
        if let Some(delay) = env.parse("TELEMESH_COLLECT_DELAY")? {
            self.backend.collect_delay_secs = delay;
        }
        if let Some(timeout) = env.parse("TELEMESH_COLLECT_TIMEOUT")? {
            self.backend.collect_timeout_secs = timeout;
        }
        if let Some(path) = env.string("TELEMESH_DATABASE_PATH") {
            self.backend.database_path = PathBuf::from(path);
        }
        if let Some(host) = env.string("TELEMESH_MQTT_HOST") {
            self.broker.host = host;
        }
        if let Some(port) = env.parse("TELEMESH_MQTT_PORT")? {
            self.broker.port = port;
        }
        if let Some(topic) = env.string("TELEMESH_MQTT_TOPIC") {
            self.broker.topic = topic;
        }
        Ok(())
    }

    /// Reject values no role can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared_key cannot be empty".to_string(),
            ));
        }
        if self.resolver.strict && !self.resolver.use_mesh_address {
            return Err(ConfigError::ValidationError(
                "resolver.strict requires resolver.use_mesh_address".to_string(),
            ));
        }
        if self.backend.collect_retries == 0 {
            return Err(ConfigError::ValidationError(
                "backend.collect_retries must be at least 1".to_string(),
            ));
        }
        let durations = [
            ("leader.timeouts.mesh_secs", self.leader.timeouts.mesh_secs),
            ("leader.timeouts.hostname_secs", self.leader.timeouts.hostname_secs),
            ("router.timeouts.mesh_secs", self.router.timeouts.mesh_secs),
            ("router.timeouts.hostname_secs", self.router.timeouts.hostname_secs),
            ("backend.timeouts.mesh_secs", self.backend.timeouts.mesh_secs),
            ("backend.timeouts.hostname_secs", self.backend.timeouts.hostname_secs),
            ("backend.collect_timeout_secs", self.backend.collect_timeout_secs),
        ];
        for (name, value) in durations {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a positive number of seconds (got {})",
                    name, value
                )));
            }
        }
        let non_negative = [
            ("leader.election_interval_secs", self.leader.election_interval_secs),
            ("backend.collect_delay_secs", self.backend.collect_delay_secs),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{} cannot be negative (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn default_service_port() -> u16 {
    5683
}

struct Overrides<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Overrides<'_> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        match self.string(name) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidOverride {
                    name: name.to_string(),
                    value,
                }),
        }
    }

    fn flag(&self, name: &str) -> Result<Option<bool>, ConfigError> {
        match self.string(name) {
            None => Ok(None),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidOverride {
                    name: name.to_string(),
                    value,
                }),
            },
        }
    }

    fn target(&self, prefix: &str, target: &mut TargetConfig) -> Result<(), ConfigError> {
        if let Some(host) = self.string(&format!("TELEMESH_{}_HOST", prefix)) {
            target.host = host;
        }
        if let Some(port) = self.parse(&format!("TELEMESH_{}_PORT", prefix))? {
            target.port = port;
        }
        if let Some(file) = self.string(&format!("TELEMESH_{}_ADDR_FILE", prefix)) {
            target.addr_file = Some(PathBuf::from(file));
        }
        Ok(())
    }
}
