use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smc_core::errors::ErrorInfo;
use smc_core::{RngHandle, SmcError, TokenId, Vocabulary};

use crate::config::SelectionMode;
use crate::hash::stable_hash_string;
use crate::metrics::RunTrace;
use crate::particles::{ParticleId, ParticleSet};

/// Which budget cut a run short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetKind {
    /// `max_wall_time_ms` elapsed.
    WallTime,
    /// `max_steps` reached.
    Steps,
}

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Termination {
    /// Every surviving particle emitted an end token or hit `max_tokens`.
    Completed,
    /// A budget was exhausted; the result holds the current weighted particles.
    BudgetExceeded {
        /// Exhausted budget.
        budget: BudgetKind,
    },
}

/// One surviving particle with its normalized weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSequence {
    /// Slot the particle occupied in the final population.
    pub slot: usize,
    /// Generated tokens.
    pub tokens: Vec<TokenId>,
    /// Normalized weight in `(0, 1]`.
    pub weight: f64,
    /// Unnormalized log-weight.
    pub log_weight: f64,
    /// Whether the sequence is finished.
    pub terminal: bool,
    /// Lineage of the particle.
    pub ancestor: ParticleId,
}

/// Output of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Surviving particles in slot order; weights sum to one.
    pub particles: Vec<WeightedSequence>,
    /// Sequence chosen according to `selection_mode`.
    pub selected: WeightedSequence,
    /// Mode used to pick `selected`.
    pub selection_mode: SelectionMode,
    /// Why the run stopped.
    pub termination: Termination,
    /// SMC estimate of the log normalizing constant.
    pub log_marginal_likelihood: f64,
    /// Number of executed steps.
    pub steps: usize,
    /// Diagnostic trace.
    pub trace: RunTrace,
}

impl GenerationResult {
    pub(crate) fn from_particle_set(
        set: &ParticleSet,
        termination: Termination,
        mode: SelectionMode,
        selection_seed: u64,
        trace: RunTrace,
    ) -> Result<Self, SmcError> {
        let weights = set.normalized_weights().ok_or_else(|| {
            SmcError::DegenerateParticleSet(
                ErrorInfo::new("no-surviving-particles", "no particle has positive weight")
                    .with_context("step", set.step())
                    .with_context("num_particles", set.len()),
            )
        })?;
        let particles: Vec<WeightedSequence> = set
            .particles()
            .iter()
            .zip(&weights)
            .enumerate()
            .filter(|(_, (particle, weight))| particle.alive && **weight > 0.0)
            .map(|(slot, (particle, weight))| WeightedSequence {
                slot,
                tokens: particle.sequence.clone(),
                weight: *weight,
                log_weight: particle.log_weight,
                terminal: particle.terminal,
                ancestor: particle.ancestor,
            })
            .collect();
        let selected = select(&particles, mode, &mut RngHandle::from_seed(selection_seed))
            .cloned()
            .ok_or_else(|| {
                SmcError::DegenerateParticleSet(ErrorInfo::new(
                    "no-surviving-particles",
                    "no particle available for selection",
                ))
            })?;
        Ok(Self {
            particles,
            selected,
            selection_mode: mode,
            termination,
            log_marginal_likelihood: set.log_marginal_likelihood(),
            steps: set.step(),
            trace,
        })
    }

    /// True when a budget stopped the run early.
    pub fn is_partial(&self) -> bool {
        matches!(self.termination, Termination::BudgetExceeded { .. })
    }

    /// Distinct sequences with their summed weights, heaviest first.
    pub fn posterior(&self) -> Vec<(Vec<TokenId>, f64)> {
        let mut merged: BTreeMap<&[TokenId], f64> = BTreeMap::new();
        for particle in &self.particles {
            *merged.entry(particle.tokens.as_slice()).or_insert(0.0) += particle.weight;
        }
        let mut posterior: Vec<(Vec<TokenId>, f64)> = merged
            .into_iter()
            .map(|(tokens, weight)| (tokens.to_vec(), weight))
            .collect();
        posterior.sort_by(|a, b| b.1.total_cmp(&a.1));
        posterior
    }

    /// Decoded posterior over texts, heaviest first.
    pub fn decoded_posterior(&self, vocabulary: &Vocabulary) -> Vec<(String, f64)> {
        let mut merged: BTreeMap<String, f64> = BTreeMap::new();
        for (tokens, weight) in self.posterior() {
            *merged.entry(vocabulary.decode(&tokens)).or_insert(0.0) += weight;
        }
        let mut decoded: Vec<(String, f64)> = merged.into_iter().collect();
        decoded.sort_by(|a, b| b.1.total_cmp(&a.1));
        decoded
    }

    /// Text of the selected sequence.
    pub fn selected_text(&self, vocabulary: &Vocabulary) -> String {
        vocabulary.decode(&self.selected.tokens)
    }

    /// Stable hash of particles, selection and resampling lineage.
    ///
    /// Wall-clock fields are excluded, so identical seeded runs agree.
    pub fn fingerprint(&self) -> Result<String, SmcError> {
        stable_hash_string(&(
            &self.particles,
            &self.selected,
            &self.trace.resamples,
            self.steps,
        ))
    }
}

/// Picks one particle: the heaviest (lowest slot on ties) or a weighted draw.
pub fn select<'a>(
    particles: &'a [WeightedSequence],
    mode: SelectionMode,
    rng: &mut RngHandle,
) -> Option<&'a WeightedSequence> {
    match mode {
        SelectionMode::Argmax => particles.iter().reduce(|best, candidate| {
            if candidate.weight > best.weight {
                candidate
            } else {
                best
            }
        }),
        SelectionMode::Sample => {
            let target = rng.unit_interval() * particles.iter().map(|p| p.weight).sum::<f64>();
            let mut cumulative = 0.0;
            for particle in particles {
                cumulative += particle.weight;
                if target < cumulative {
                    return Some(particle);
                }
            }
            particles.last()
        }
    }
}
