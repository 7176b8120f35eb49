use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Per-step population statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    /// 1-based step index.
    pub step: usize,
    /// Effective sample size after reweighting (before any resampling).
    pub ess: f64,
    /// Particles with positive weight after the step.
    pub alive: usize,
    /// Particles that still need extension after the step.
    pub active: usize,
    /// Particles killed during the step.
    pub killed: usize,
    /// Whether the step ended with a resampling event.
    pub resampled: bool,
}

/// Lineage record of one resampling event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResampleEvent {
    /// Step after which resampling happened.
    pub step: usize,
    /// Generation number produced by this event.
    pub generation: usize,
    /// ESS that triggered the event.
    pub ess_before: f64,
    /// Ancestor slot chosen for every new slot.
    pub ancestors: Vec<usize>,
}

/// Diagnostic record of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunTrace {
    /// Master seed used for all randomness.
    pub master_seed: u64,
    /// Optional label from the seed policy.
    pub seed_label: Option<String>,
    /// One record per executed step.
    pub steps: Vec<StepRecord>,
    /// Every resampling event in order.
    pub resamples: Vec<ResampleEvent>,
    /// Particle kills attributed to each constraint, in registration order.
    pub kills_by_potential: IndexMap<String, usize>,
    /// Wall-clock duration of the run in milliseconds.
    pub elapsed_ms: u64,
}

/// Aggregate view over a [`RunTrace`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSummary {
    /// Number of executed steps.
    pub steps: usize,
    /// Number of resampling events.
    pub resample_count: usize,
    /// Mean ESS over all steps.
    pub mean_ess: f64,
    /// Smallest ESS observed.
    pub min_ess: f64,
    /// Total particles killed by constraints.
    pub total_killed: usize,
}

impl RunTrace {
    /// ESS value of every step in order.
    pub fn ess_history(&self) -> Vec<f64> {
        self.steps.iter().map(|record| record.ess).collect()
    }

    /// Computes aggregate statistics.
    pub fn summary(&self) -> TraceSummary {
        let ess = self.ess_history();
        let mean_ess = if ess.is_empty() {
            0.0
        } else {
            ess.iter().sum::<f64>() / ess.len() as f64
        };
        let min_ess = ess.iter().copied().fold(f64::INFINITY, f64::min);
        TraceSummary {
            steps: self.steps.len(),
            resample_count: self.resamples.len(),
            mean_ess,
            min_ess: if min_ess.is_finite() { min_ess } else { 0.0 },
            total_killed: self.steps.iter().map(|record| record.killed).sum(),
        }
    }
}

/// Collects step records and resampling lineage while a run executes.
#[derive(Debug)]
pub struct TraceRecorder {
    master_seed: u64,
    seed_label: Option<String>,
    steps: Vec<StepRecord>,
    resamples: Vec<ResampleEvent>,
    kills: IndexMap<String, usize>,
}

impl TraceRecorder {
    /// Creates a recorder; every potential name starts with zero kills.
    pub fn new<'a>(
        master_seed: u64,
        seed_label: Option<String>,
        potential_names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            master_seed,
            seed_label,
            steps: Vec::new(),
            resamples: Vec::new(),
            kills: potential_names
                .into_iter()
                .map(|name| (name.to_string(), 0))
                .collect(),
        }
    }

    /// Attributes one particle kill to `potential`.
    pub fn note_kill(&mut self, potential: &str) {
        *self.kills.entry(potential.to_string()).or_insert(0) += 1;
    }

    /// Appends a step record.
    pub fn push_step(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    /// Appends a resampling event.
    pub fn push_resample(&mut self, event: ResampleEvent) {
        self.resamples.push(event);
    }

    /// Recorded step records.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Finalizes the trace.
    pub fn finish(self, elapsed_ms: u64) -> RunTrace {
        RunTrace {
            master_seed: self.master_seed,
            seed_label: self.seed_label,
            steps: self.steps,
            resamples: self.resamples,
            kills_by_potential: self.kills,
            elapsed_ms,
        }
    }
}
