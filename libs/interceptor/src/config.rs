//! # Interceptor Configuration
//!
//! Loaded from a TOML file with `ASOA_` prefixed environment overrides.
//! Every section has defaults, so a partial file (or none at all) is valid.
//!
//! ```toml
//! [pipeline]
//! workers = 2
//! max_frame_size = 65507
//! injection_timeout_ms = 1000
//! fail_closed_on_malformed = true
//! mutation_log_capacity = 10000
//!
//! [validation]
//! plausible_min = -1000.0
//! plausible_max = 1000.0
//! temperature_topic_id = 15
//!
//! [poisoning]
//! refresh_interval_ms = 2000
//! restore_attempts = 3
//! restore_timeout_ms = 1500
//!
//! [transport]
//! listen = "0.0.0.0:7400"
//! upstream = "192.168.1.20:7400"
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [[services]]
//! id = 1
//! name = "SensorModule"
//!
//! [directive]
//! kind = "value-spoof"
//! params = { target = 99.9 }
//! ```
//!
//! Environment overrides use a double underscore between section and key,
//! e.g. `ASOA_PIPELINE__WORKERS=4`.

use crate::directive::DirectiveSpec;
use crate::error::{InterceptorError, InterceptorResult};
use codec::{PlausibleRange, ASOA_UDP_PORT, MAX_FRAME_SIZE, TEMPERATURE_TOPIC_ID};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Complete interceptor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterceptorConfig {
    pub pipeline: PipelineConfig,
    pub validation: ValidationConfig,
    pub poisoning: PoisoningConfig,
    /// Seed entries for the service directory
    pub services: Vec<ServiceEntry>,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
    /// Directive armed at startup, if any
    pub directive: Option<DirectiveSpec>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            validation: ValidationConfig::default(),
            poisoning: PoisoningConfig::default(),
            services: default_services(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
            directive: None,
        }
    }
}

/// Frame processing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of capture workers sharing the capture channel
    pub workers: usize,
    /// Frames larger than this are dropped as malformed
    pub max_frame_size: usize,
    /// Upper bound on a single injection call
    pub injection_timeout_ms: u64,
    /// Drop frames whose header cannot be decoded instead of forwarding them
    pub fail_closed_on_malformed: bool,
    /// Oldest mutation records are evicted past this; `None` keeps all
    pub mutation_log_capacity: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_frame_size: MAX_FRAME_SIZE,
            injection_timeout_ms: 1000,
            fail_closed_on_malformed: true,
            mutation_log_capacity: Some(10_000),
        }
    }
}

impl PipelineConfig {
    pub fn injection_timeout(&self) -> Duration {
        Duration::from_millis(self.injection_timeout_ms)
    }
}

/// Post-mutation sanity gate settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub plausible_min: f64,
    pub plausible_max: f64,
    /// Topic tag identifying the reading that value directives edit
    pub temperature_topic_id: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let range = PlausibleRange::default();
        Self {
            plausible_min: range.min,
            plausible_max: range.max,
            temperature_topic_id: TEMPERATURE_TOPIC_ID,
        }
    }
}

impl ValidationConfig {
    pub fn plausible_range(&self) -> PlausibleRange {
        PlausibleRange::new(self.plausible_min, self.plausible_max)
    }
}

/// Link-layer poisoning lifecycle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoisoningConfig {
    pub refresh_interval_ms: u64,
    /// Restore calls attempted on stop before giving up
    pub restore_attempts: u32,
    pub restore_timeout_ms: u64,
}

impl Default for PoisoningConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2000,
            restore_attempts: 3,
            restore_timeout_ms: 1500,
        }
    }
}

impl PoisoningConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }
}

/// One service directory seed entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceEntry {
    pub id: u16,
    pub name: String,
}

impl ServiceEntry {
    pub fn new(id: u16, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Services known on a stock ASOA bus
pub fn default_services() -> Vec<ServiceEntry> {
    vec![
        ServiceEntry::new(1, "SensorModule"),
        ServiceEntry::new(2, "Dashboard"),
        ServiceEntry::new(3, "Cerebrum"),
        ServiceEntry::new(4, "DynamicModule"),
        ServiceEntry::new(5, "Radar"),
    ]
}

/// UDP relay adapter addresses
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    pub listen: SocketAddr,
    /// Where intercepted frames are forwarded; required by the UDP relay
    pub upstream: Option<SocketAddr>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], ASOA_UDP_PORT)),
            upstream: None,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl InterceptorConfig {
    /// Load from a TOML file, then apply `ASOA_` environment overrides
    ///
    /// A missing file is not an error; defaults fill every section.
    pub fn load(path: impl AsRef<Path>) -> InterceptorResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            debug!("Loading interceptor config: {:?}", path);
        } else {
            debug!("Config file {:?} not found, using defaults", path);
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("ASOA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml_str(contents: &str) -> InterceptorResult<Self> {
        let parsed: Self = toml::from_str(contents)
            .map_err(|e| InterceptorError::config(format!("Failed to parse config: {}", e)))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> InterceptorResult<()> {
        if self.pipeline.workers == 0 {
            return Err(InterceptorError::config("pipeline.workers must be at least 1"));
        }
        if self.pipeline.mutation_log_capacity == Some(0) {
            return Err(InterceptorError::config(
                "pipeline.mutation_log_capacity must be non-zero when set",
            ));
        }
        if self.pipeline.max_frame_size < codec::HEADER_SIZE {
            return Err(InterceptorError::config(format!(
                "pipeline.max_frame_size {} is smaller than a header",
                self.pipeline.max_frame_size
            )));
        }
        let (min, max) = (self.validation.plausible_min, self.validation.plausible_max);
        if min.is_nan() || max.is_nan() || min > max {
            return Err(InterceptorError::config(format!(
                "validation range invalid: min {} max {}",
                min, max
            )));
        }
        if self.poisoning.restore_attempts == 0 {
            return Err(InterceptorError::config(
                "poisoning.restore_attempts must be at least 1",
            ));
        }
        if self.poisoning.refresh_interval_ms == 0 {
            return Err(InterceptorError::config(
                "poisoning.refresh_interval_ms must be non-zero",
            ));
        }
        Ok(())
    }
}
