use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use smc_core::errors::ErrorInfo;
use smc_core::{Distribution, LanguageModel, Potential, RngHandle, SmcError, TokenId};

use crate::config::EngineConfig;
use crate::determinism;
use crate::particles::Particle;
use crate::retry::call_with_retry;
use crate::reweight::incremental_log_scores;

/// Read-only inputs shared by every particle extension within one step.
pub struct StepInputs<'a> {
    /// Model provider queried for next-token distributions.
    pub model: &'a dyn LanguageModel,
    /// Caller context forwarded to the model.
    pub context: &'a str,
    /// Incremental potentials in registration order.
    pub incremental: &'a [Arc<dyn Potential>],
    /// Run configuration.
    pub config: &'a EngineConfig,
    /// End-of-sequence token of the model, if any.
    pub eos: Option<TokenId>,
    /// 1-based index of the step being executed.
    pub step: usize,
}

/// Proposed extension of one particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    /// Slot of the extended particle.
    pub slot: usize,
    /// Sampled token, `None` when masking left no admissible token.
    pub token: Option<TokenId>,
    /// Whether the particle becomes terminal with this token.
    pub terminal: bool,
    /// Log of the base-model mass kept by masking (0 without masking).
    pub log_proposal_mass: f64,
    /// Incremental log-scores of the extended sequence when masking computed them.
    pub incremental_log_scores: Option<Vec<f64>>,
}

/// Fetches next-token distributions for `slots`, in the same order.
///
/// Batching providers receive one call per group of equal-length sequences;
/// other providers are queried per particle on the worker pool.
pub fn fetch_distributions(
    inputs: &StepInputs<'_>,
    particles: &[Particle],
    slots: &[usize],
    pool: &ThreadPool,
) -> Result<Vec<Distribution>, SmcError> {
    let retry = &inputs.config.retry;
    if !inputs.model.supports_batching() {
        return pool.install(|| {
            slots
                .par_iter()
                .map(|&slot| {
                    call_with_retry(retry, "next_token_distribution", || {
                        inputs
                            .model
                            .next_token_distribution(&particles[slot].sequence, inputs.context)
                    })
                    .map_err(|err| err.with_context("slot", slot))
                })
                .collect()
        });
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (position, &slot) in slots.iter().enumerate() {
        groups
            .entry(particles[slot].sequence.len())
            .or_default()
            .push(position);
    }
    let mut fetched: Vec<Option<Distribution>> = vec![None; slots.len()];
    for (length, positions) in groups {
        let sequences: Vec<&[TokenId]> = positions
            .iter()
            .map(|&position| particles[slots[position]].sequence.as_slice())
            .collect();
        let distributions = call_with_retry(retry, "next_token_distributions", || {
            inputs
                .model
                .next_token_distributions(&sequences, inputs.context)
        })?;
        if distributions.len() != sequences.len() {
            return Err(SmcError::Model(
                ErrorInfo::new(
                    "batch-size-mismatch",
                    "model returned a different number of distributions than requested",
                )
                .with_context("requested", sequences.len())
                .with_context("returned", distributions.len())
                .with_context("sequence_len", length),
            ));
        }
        for (position, distribution) in positions.into_iter().zip(distributions) {
            fetched[position] = Some(distribution);
        }
    }
    Ok(fetched.into_iter().flatten().collect())
}

/// Samples the next token for one particle from its (optionally masked) distribution.
pub fn propose(
    inputs: &StepInputs<'_>,
    particle: &Particle,
    slot: usize,
    distribution: &Distribution,
) -> Result<Extension, SmcError> {
    let next_len = particle.sequence.len() + 1;
    let max_tokens = inputs.config.max_tokens;
    let eos = inputs.eos;
    let ends = |token: TokenId| Some(token) == eos || next_len >= max_tokens;
    let mut rng = RngHandle::from_seed(determinism::extension_seed(
        inputs.config.seed_policy.master_seed,
        inputs.step,
        slot,
    ));

    if !inputs.config.proposal_masking || inputs.incremental.is_empty() {
        let token = draw(distribution, &mut rng, slot)?;
        return Ok(Extension {
            slot,
            token: Some(token),
            terminal: ends(token),
            log_proposal_mass: 0.0,
            incremental_log_scores: None,
        });
    }

    let mut candidate = particle.sequence.clone();
    candidate.push(TokenId::from_raw(0));
    let last = candidate.len() - 1;
    let mut admitted: HashMap<TokenId, Vec<f64>> = HashMap::new();
    let mut violation = None;
    let restricted = distribution.restrict(|token| {
        if violation.is_some() {
            return false;
        }
        candidate[last] = token;
        match incremental_log_scores(inputs.incremental, &candidate, ends(token)) {
            Ok(scores) if scores.iter().all(|s| s.is_finite()) => {
                admitted.insert(token, scores);
                true
            }
            Ok(_) => false,
            Err(err) => {
                violation = Some(err);
                false
            }
        }
    });
    if let Some(err) = violation {
        return Err(err.with_context("slot", slot));
    }

    match restricted {
        Some((mass, masked)) => {
            let token = draw(&masked, &mut rng, slot)?;
            Ok(Extension {
                slot,
                token: Some(token),
                terminal: ends(token),
                log_proposal_mass: mass.ln(),
                incremental_log_scores: admitted.remove(&token),
            })
        }
        None => Ok(Extension {
            slot,
            token: None,
            terminal: false,
            log_proposal_mass: f64::NEG_INFINITY,
            incremental_log_scores: None,
        }),
    }
}

fn draw(distribution: &Distribution, rng: &mut RngHandle, slot: usize) -> Result<TokenId, SmcError> {
    distribution.sample(rng).ok_or_else(|| {
        SmcError::Model(
            ErrorInfo::new("empty-distribution", "model returned a distribution with no support")
                .with_context("slot", slot),
        )
    })
}
