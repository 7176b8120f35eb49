#![deny(missing_docs)]

//! Sequential Monte Carlo sampler for constrained language model generation.
//!
//! A run keeps a fixed population of particles (partial token sequences with
//! log-weights). Each step extends every live particle by one token drawn
//! from the model, folds incremental potential ratios into the weights,
//! evaluates batch potentials at checkpoints, and resamples systematically
//! when the effective sample size drops below the configured fraction.

/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Core sampling loop and the public `SmcEngine::run` entry point.
pub mod engine;
/// Proposal step: next-token distributions, masking and sampling.
pub mod extend;
/// Canonical JSON hashing used for run fingerprints.
pub mod hash;
/// Step records, resampling lineage and run traces.
pub mod metrics;
/// Reference model providers.
pub mod model;
/// Particle population, weights and effective sample size.
pub mod particles;
/// Constraint registration and concrete potentials.
pub mod potentials;
/// Systematic resampling.
pub mod resample;
/// Run results and final sequence selection.
pub mod result;
/// Bounded exponential backoff for model calls.
pub mod retry;
/// Incremental and batch weight updates.
pub mod reweight;

pub use config::{ConcurrencyConfig, EngineConfig, RetryPolicy, SeedPolicy, SelectionMode};
pub use engine::{CancelToken, EngineState, SmcEngine};
pub use metrics::{ResampleEvent, RunTrace, StepRecord, TraceSummary};
pub use model::UnigramModel;
pub use particles::{Particle, ParticleId, ParticleSet};
pub use potentials::{ConstraintSpec, FnPotential, RegexPotential, TokenBanPotential};
pub use result::{BudgetKind, GenerationResult, Termination, WeightedSequence};
