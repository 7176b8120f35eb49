use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smc_core::errors::ErrorInfo;
use smc_core::SmcError;

/// YAML-configurable parameters governing a single generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of particles kept alive throughout the run.
    #[serde(default = "default_num_particles")]
    pub num_particles: usize,
    /// Maximum number of generated tokens per particle.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Resample when `ESS < resample_threshold * num_particles`.
    #[serde(default = "default_resample_threshold")]
    pub resample_threshold: f64,
    /// Batch potentials are evaluated every `checkpoint_interval` steps.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    /// Wall-clock budget in milliseconds; exceeding it yields a partial result.
    #[serde(default)]
    pub max_wall_time_ms: Option<u64>,
    /// Step budget; exceeding it yields a partial result.
    #[serde(default)]
    pub max_steps: Option<usize>,
    /// How the single returned sequence is chosen.
    #[serde(default)]
    pub selection_mode: SelectionMode,
    /// Restrict proposals to tokens accepted by incremental potentials.
    #[serde(default = "default_proposal_masking")]
    pub proposal_masking: bool,
    /// Retry behaviour for model inference failures.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Thread pool sizing.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

fn default_num_particles() -> usize {
    16
}

fn default_max_tokens() -> usize {
    64
}

fn default_resample_threshold() -> f64 {
    0.5
}

fn default_checkpoint_interval() -> usize {
    1
}

fn default_proposal_masking() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_particles: default_num_particles(),
            max_tokens: default_max_tokens(),
            resample_threshold: default_resample_threshold(),
            checkpoint_interval: default_checkpoint_interval(),
            max_wall_time_ms: None,
            max_steps: None,
            selection_mode: SelectionMode::default(),
            proposal_masking: default_proposal_masking(),
            retry: RetryPolicy::default(),
            concurrency: ConcurrencyConfig::default(),
            seed_policy: SeedPolicy::default(),
        }
    }
}

fn invalid(field: &str, message: &str, value: impl ToString) -> SmcError {
    SmcError::Config(
        ErrorInfo::new("invalid-config", message)
            .with_context("field", field)
            .with_context("value", value),
    )
}

impl EngineConfig {
    /// Parses a configuration from YAML and validates it.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SmcError> {
        let config: EngineConfig = serde_yaml::from_str(contents).map_err(|err| {
            SmcError::Serde(ErrorInfo::new("yaml-deserialize", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, SmcError> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            SmcError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| err.with_context("path", path.display()))
    }

    /// Serializes the configuration to YAML.
    pub fn to_yaml_string(&self) -> Result<String, SmcError> {
        serde_yaml::to_string(self)
            .map_err(|err| SmcError::Serde(ErrorInfo::new("yaml-serialize", err.to_string())))
    }

    /// Checks every field against its documented range.
    pub fn validate(&self) -> Result<(), SmcError> {
        if self.num_particles == 0 {
            return Err(invalid(
                "num_particles",
                "num_particles must be positive",
                self.num_particles,
            ));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "max_tokens must be positive", self.max_tokens));
        }
        if !(self.resample_threshold > 0.0 && self.resample_threshold <= 1.0) {
            return Err(invalid(
                "resample_threshold",
                "resample_threshold must lie in (0, 1]",
                self.resample_threshold,
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(invalid(
                "checkpoint_interval",
                "checkpoint_interval must be at least 1",
                self.checkpoint_interval,
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid(
                "retry.max_attempts",
                "at least one model attempt is required",
                self.retry.max_attempts,
            ));
        }
        if self.concurrency.batch_threads == 0 {
            return Err(invalid(
                "concurrency.batch_threads",
                "batch potential pool needs at least one thread",
                self.concurrency.batch_threads,
            ));
        }
        Ok(())
    }

    /// Wall-clock budget as a [`Duration`].
    pub fn max_wall_time(&self) -> Option<Duration> {
        self.max_wall_time_ms.map(Duration::from_millis)
    }
}

/// Strategy for picking the single returned sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    /// Highest normalized weight wins (ties broken by lowest slot).
    Argmax,
    /// One draw from the weighted particle population.
    #[default]
    Sample,
}

/// Bounded exponential backoff for model inference failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per model call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, doubled for every further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    1_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Thread pool sizing for extension and batch potential evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Workers used for particle extension (0 lets rayon decide).
    #[serde(default)]
    pub worker_threads: usize,
    /// Maximum concurrent batch potential evaluations.
    #[serde(default = "default_batch_threads")]
    pub batch_threads: usize,
}

fn default_batch_threads() -> usize {
    2
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            batch_threads: default_batch_threads(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in the run trace.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
