use serde::Deserialize;
use reqmon_core::error::{ReqmonError, Result};

pub const DEFAULT_METRIC_PATH: &str = "/metrics";
pub const DEFAULT_SLOW_TIME_SECS: u32 = 5;
pub const DEFAULT_DURATION_BUCKETS: [f64; 5] = [0.1, 0.3, 1.2, 5.0, 10.0];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ReqmonError::BadConfig(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.monitor.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ReqmonError::BadConfig(
                "server.listen must be a valid socket address".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

/// Request monitor settings.
///
/// Every field may be left at its zero value (empty string, `0`, empty list);
/// [`MonitorConfig::normalized`] swaps those for the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Scrape endpoint, excluded from instrumentation.
    #[serde(default)]
    pub metric_path: String,

    /// Requests taking longer than this many whole seconds count as slow.
    #[serde(default)]
    pub slow_time_secs: u32,

    /// Buckets of `gin_request_duration`, in seconds.
    #[serde(default)]
    pub duration_buckets: Vec<f64>,
}

impl MonitorConfig {
    pub fn normalized(mut self) -> Self {
        if self.metric_path.is_empty() {
            self.metric_path = DEFAULT_METRIC_PATH.to_string();
        }
        if self.slow_time_secs == 0 {
            self.slow_time_secs = DEFAULT_SLOW_TIME_SECS;
        }
        if self.duration_buckets.is_empty() {
            self.duration_buckets = DEFAULT_DURATION_BUCKETS.to_vec();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.metric_path.is_empty() && !self.metric_path.starts_with('/') {
            return Err(ReqmonError::BadConfig(
                "monitor.metric_path must start with '/'".into(),
            ));
        }
        let b = &self.duration_buckets;
        if b.iter().any(|v| v.is_nan()) || b.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ReqmonError::BadConfig(
                "monitor.duration_buckets must be strictly increasing".into(),
            ));
        }
        Ok(())
    }
}
