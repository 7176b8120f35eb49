use serde::{Deserialize, Serialize};
use smc_core::errors::ErrorInfo;
use smc_core::{SmcError, TokenId};

/// Arena-style lineage identifier: the slot a particle descended from and the
/// resampling generation in which that happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticleId {
    /// Slot of the ancestor in the previous generation.
    pub slot: usize,
    /// Number of resampling events the lineage has gone through.
    pub generation: usize,
}

/// One candidate sequence with its unnormalized log-weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Generated tokens (the context string is not part of the sequence).
    pub sequence: Vec<TokenId>,
    /// Unnormalized log-weight; `-inf` once the particle is dead.
    pub log_weight: f64,
    /// False once a potential assigned zero score.
    pub alive: bool,
    /// True once an end token was emitted or the length limit was reached.
    pub terminal: bool,
    /// Lineage record of the most recent resampling.
    pub ancestor: ParticleId,
    pub(crate) incremental_log_scores: Vec<f64>,
    pub(crate) batch_log_scores: Vec<f64>,
}

impl Particle {
    /// Whether the particle still needs extension.
    pub fn is_active(&self) -> bool {
        self.alive && !self.terminal
    }

    pub(crate) fn kill(&mut self) {
        self.alive = false;
        self.log_weight = f64::NEG_INFINITY;
    }
}

/// Fixed-size population of particles for one generation request.
#[derive(Debug, Clone)]
pub struct ParticleSet {
    particles: Vec<Particle>,
    step: usize,
    generation: usize,
    ess: f64,
    log_evidence_offset: f64,
}

impl ParticleSet {
    /// Creates `n` empty particles with uniform weights `-ln n`.
    ///
    /// `initial_incremental` holds the log-scores of the empty prefix under
    /// each incremental potential; batch potentials start neutral.
    pub fn new(n: usize, initial_incremental: Vec<f64>, batch_count: usize) -> Self {
        let log_uniform = -(n as f64).ln();
        let particles = (0..n)
            .map(|slot| Particle {
                sequence: Vec::new(),
                log_weight: log_uniform,
                alive: true,
                terminal: false,
                ancestor: ParticleId {
                    slot,
                    generation: 0,
                },
                incremental_log_scores: initial_incremental.clone(),
                batch_log_scores: vec![0.0; batch_count],
            })
            .collect();
        Self {
            particles,
            step: 0,
            generation: 0,
            ess: n as f64,
            log_evidence_offset: 0.0,
        }
    }

    /// Number of particles (constant over the run).
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the set holds no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Read-only view of all particle slots.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Number of completed extension steps.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of resampling events so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Effective sample size computed after the last committed step.
    pub fn ess(&self) -> f64 {
        self.ess
    }

    /// Unnormalized log-weights in slot order.
    pub fn log_weights(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.log_weight).collect()
    }

    /// Normalized weights in slot order, `None` when every weight is zero.
    pub fn normalized_weights(&self) -> Option<Vec<f64>> {
        normalize_log_weights(&self.log_weights())
    }

    /// Particles with positive weight.
    pub fn alive_count(&self) -> usize {
        self.particles.iter().filter(|p| p.alive).count()
    }

    /// Particles that still need extension.
    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_active()).count()
    }

    /// True when no particle needs further extension.
    pub fn is_finished(&self) -> bool {
        self.active_count() == 0
    }

    /// SMC estimate of the log normalizing constant of the target.
    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_evidence_offset + log_sum_exp(&self.log_weights())
    }

    /// Replaces the population with the outcome of one step and recomputes ESS.
    pub(crate) fn commit_step(&mut self, next: Vec<Particle>) -> Result<f64, SmcError> {
        debug_assert_eq!(next.len(), self.particles.len());
        let weights = normalize_log_weights(
            &next.iter().map(|p| p.log_weight).collect::<Vec<_>>(),
        )
        .ok_or_else(|| degenerate(self.step + 1, next.len()))?;
        self.particles = next;
        self.step += 1;
        self.ess = effective_sample_size(&weights);
        Ok(self.ess)
    }

    /// Rebuilds the population from ancestor slots and resets weights to `-ln N`.
    ///
    /// The pre-resampling log-normalizer is folded into the evidence estimate.
    pub fn resample_from(&mut self, ancestors: &[usize]) {
        debug_assert_eq!(ancestors.len(), self.particles.len());
        self.log_evidence_offset += log_sum_exp(&self.log_weights());
        self.generation += 1;
        let n = self.particles.len();
        let log_uniform = -(n as f64).ln();
        let generation = self.generation;
        let next = ancestors
            .iter()
            .map(|&ancestor| {
                let mut particle = self.particles[ancestor].clone();
                particle.log_weight = log_uniform;
                particle.ancestor = ParticleId {
                    slot: ancestor,
                    generation,
                };
                particle
            })
            .collect();
        self.particles = next;
        self.ess = n as f64;
    }
}

pub(crate) fn degenerate(step: usize, num_particles: usize) -> SmcError {
    SmcError::DegenerateParticleSet(
        ErrorInfo::new(
            "all-particles-dead",
            "every particle reached zero weight in the same step",
        )
        .with_context("step", step)
        .with_context("num_particles", num_particles)
        .with_context("surviving", 0)
        .with_hint("the constraints may be unsatisfiable under the model; relax them or raise num_particles"),
    )
}

/// Numerically stable `ln Σ exp(x_i)`; `-inf` for an empty or all `-inf` input.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Converts log-weights to normalized weights, `None` if all are `-inf`.
pub fn normalize_log_weights(log_weights: &[f64]) -> Option<Vec<f64>> {
    let total = log_sum_exp(log_weights);
    if !total.is_finite() {
        return None;
    }
    Some(log_weights.iter().map(|w| (w - total).exp()).collect())
}

/// Effective sample size `1 / Σ w_i²` of normalized weights, clamped to `[1, N]`.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq <= 0.0 {
        return 0.0;
    }
    (1.0 / sum_sq).clamp(1.0, weights.len() as f64)
}
