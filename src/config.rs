//! Configuration for status aggregation and rerun dispatch.
//!
//! The configuration is an explicit value handed to the aggregator, the
//! command builder and the dispatcher. It is assembled from defaults, an
//! optional YAML file and `BIFROST_*` environment variables, in that order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::job::is_valid_token;
use crate::scheduler::GridKind;
use crate::status::DEFAULT_COMPONENT_ORDER;

/// Upper bound on automatic snakemake restarts per component.
pub const MAX_RESTART_TIMES: u32 = 2;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration for the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    // Grid selection
    /// Scheduler back-end used for reruns.
    pub grid: GridKind,

    // Resource parameters, required only by the back-ends that use them
    /// Memory per job in GB.
    pub memory_gb: Option<u32>,
    /// Slurm partition or torque queue priority.
    pub priority: Option<String>,
    /// Threads per job.
    pub threads: Option<u32>,
    /// Walltime, e.g. `12:00:00`.
    pub walltime: Option<String>,
    /// Torque advance reservation.
    pub reservation: Option<String>,
    /// Refuse to submit to torque without a reservation.
    pub require_reservation: bool,
    /// Torque group and account.
    pub group: Option<String>,

    // Command policy
    /// Root of the bifrost installation; job definitions live under `components/`.
    pub bifrost_dir: PathBuf,
    pub shadow_prefix: String,
    pub restart_times: u32,
    pub cores: u32,
    pub sample_config: String,
    /// Canonical component order. Only these components can be rerun.
    pub components: Vec<String>,

    // Executables
    pub sbatch_bin: String,
    pub qsub_bin: String,
    /// File name of the torque job script inside the sample's run directory.
    pub script_name: String,

    /// Seconds between status refreshes in watch mode.
    pub refresh_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            grid: GridKind::DryRun,

            memory_gb: None,
            priority: None,
            threads: None,
            walltime: None,
            reservation: None,
            require_reservation: false,
            group: None,

            bifrost_dir: PathBuf::from("./bifrost"),
            shadow_prefix: "/scratch".to_string(),
            restart_times: MAX_RESTART_TIMES,
            cores: 4,
            sample_config: "sample.yaml".to_string(),
            components: DEFAULT_COMPONENT_ORDER.iter().map(|c| c.to_string()).collect(),

            sbatch_bin: "sbatch".to_string(),
            qsub_bin: "qsub".to_string(),
            script_name: "manual_rerun.sh".to_string(),

            refresh_interval_secs: 30,
        }
    }
}

impl MonitorConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a YAML file, then applies environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `BIFROST_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BIFROST_GRID`: slurm, torque or dry-run
    /// - `BIFROST_MEMORY_GB`, `BIFROST_PRIORITY`, `BIFROST_THREADS`, `BIFROST_WALLTIME`
    /// - `BIFROST_ADVRES`, `BIFROST_REQUIRE_ADVRES`, `BIFROST_GROUP`
    /// - `BIFROST_DIR`, `BIFROST_SHADOW_PREFIX`, `BIFROST_RESTART_TIMES`, `BIFROST_CORES`
    /// - `BIFROST_SAMPLE_CONFIG`, `BIFROST_COMPONENTS` (comma-separated)
    /// - `BIFROST_SBATCH_BIN`, `BIFROST_QSUB_BIN`, `BIFROST_SCRIPT_NAME`
    /// - `BIFROST_REFRESH_SECS`
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var("BIFROST_GRID") {
            self.grid = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "BIFROST_GRID".to_string(),
                message,
            })?;
        }

        // Resources
        if let Ok(val) = std::env::var("BIFROST_MEMORY_GB") {
            self.memory_gb = Some(parse_env_value(&val, "BIFROST_MEMORY_GB")?);
        }
        if let Ok(val) = std::env::var("BIFROST_PRIORITY") {
            self.priority = Some(val);
        }
        if let Ok(val) = std::env::var("BIFROST_THREADS") {
            self.threads = Some(parse_env_value(&val, "BIFROST_THREADS")?);
        }
        if let Ok(val) = std::env::var("BIFROST_WALLTIME") {
            self.walltime = Some(val);
        }
        if let Ok(val) = std::env::var("BIFROST_ADVRES") {
            self.reservation = Some(val);
        }
        if let Ok(val) = std::env::var("BIFROST_REQUIRE_ADVRES") {
            self.require_reservation = parse_env_bool(&val, "BIFROST_REQUIRE_ADVRES")?;
        }
        if let Ok(val) = std::env::var("BIFROST_GROUP") {
            self.group = Some(val);
        }

        // Command policy
        if let Ok(val) = std::env::var("BIFROST_DIR") {
            self.bifrost_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("BIFROST_SHADOW_PREFIX") {
            self.shadow_prefix = val;
        }
        if let Ok(val) = std::env::var("BIFROST_RESTART_TIMES") {
            self.restart_times = parse_env_value(&val, "BIFROST_RESTART_TIMES")?;
        }
        if let Ok(val) = std::env::var("BIFROST_CORES") {
            self.cores = parse_env_value(&val, "BIFROST_CORES")?;
        }
        if let Ok(val) = std::env::var("BIFROST_SAMPLE_CONFIG") {
            self.sample_config = val;
        }
        if let Ok(val) = std::env::var("BIFROST_COMPONENTS") {
            self.components = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Executables
        if let Ok(val) = std::env::var("BIFROST_SBATCH_BIN") {
            self.sbatch_bin = val;
        }
        if let Ok(val) = std::env::var("BIFROST_QSUB_BIN") {
            self.qsub_bin = val;
        }
        if let Ok(val) = std::env::var("BIFROST_SCRIPT_NAME") {
            self.script_name = val;
        }

        if let Ok(val) = std::env::var("BIFROST_REFRESH_SECS") {
            self.refresh_interval_secs = parse_env_value(&val, "BIFROST_REFRESH_SECS")?;
        }

        Ok(self)
    }

    /// Validates the configuration values.
    ///
    /// Back-end specific resource requirements are checked per job at
    /// dispatch time, not here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.restart_times > MAX_RESTART_TIMES {
            return Err(ConfigError::ValidationFailed(format!(
                "restart_times must be at most {}",
                MAX_RESTART_TIMES
            )));
        }

        if self.cores == 0 {
            return Err(ConfigError::ValidationFailed(
                "cores must be greater than 0".to_string(),
            ));
        }

        if self.threads == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "threads must be greater than 0".to_string(),
            ));
        }

        if self.memory_gb == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "memory_gb must be greater than 0".to_string(),
            ));
        }

        if self.shadow_prefix.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "shadow_prefix cannot be empty".to_string(),
            ));
        }

        if self.sample_config.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "sample_config cannot be empty".to_string(),
            ));
        }

        if self.components.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "components cannot be empty".to_string(),
            ));
        }

        if let Some(bad) = self.components.iter().find(|c| !is_valid_token(c)) {
            return Err(ConfigError::ValidationFailed(format!(
                "components contains invalid name '{}'",
                bad
            )));
        }

        if self.sbatch_bin.is_empty() || self.qsub_bin.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "sbatch_bin and qsub_bin cannot be empty".to_string(),
            ));
        }

        if !is_valid_token(&self.script_name) {
            return Err(ConfigError::ValidationFailed(format!(
                "script_name '{}' must be a plain file name",
                self.script_name
            )));
        }

        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "refresh_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Directory holding one job definition directory per component.
    pub fn components_dir(&self) -> PathBuf {
        self.bifrost_dir.join("components")
    }

    /// Builder method to set the grid back-end.
    pub fn with_grid(mut self, grid: GridKind) -> Self {
        self.grid = grid;
        self
    }

    /// Builder method to set memory per job.
    pub fn with_memory_gb(mut self, memory: u32) -> Self {
        self.memory_gb = Some(memory);
        self
    }

    /// Builder method to set the partition or queue priority.
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Builder method to set threads per job.
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Builder method to set walltime.
    pub fn with_walltime(mut self, walltime: impl Into<String>) -> Self {
        self.walltime = Some(walltime.into());
        self
    }

    /// Builder method to set the torque reservation.
    pub fn with_reservation(mut self, reservation: impl Into<String>) -> Self {
        self.reservation = Some(reservation.into());
        self
    }

    /// Builder method to require a torque reservation.
    pub fn with_require_reservation(mut self, required: bool) -> Self {
        self.require_reservation = required;
        self
    }

    /// Builder method to set the torque group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Builder method to set the bifrost installation root.
    pub fn with_bifrost_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.bifrost_dir = path.into();
        self
    }

    /// Builder method to set the restart count.
    pub fn with_restart_times(mut self, restarts: u32) -> Self {
        self.restart_times = restarts;
        self
    }

    /// Builder method to set snakemake cores.
    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }

    /// Builder method to set the canonical components.
    pub fn with_components<S: Into<String>>(mut self, components: impl IntoIterator<Item = S>) -> Self {
        self.components = components.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the sbatch executable.
    pub fn with_sbatch_bin(mut self, bin: impl Into<String>) -> Self {
        self.sbatch_bin = bin.into();
        self
    }

    /// Builder method to set the qsub executable.
    pub fn with_qsub_bin(mut self, bin: impl Into<String>) -> Self {
        self.qsub_bin = bin.into();
        self
    }

    /// Builder method to set the refresh interval.
    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
