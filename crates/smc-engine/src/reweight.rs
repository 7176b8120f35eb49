use std::sync::Arc;

use smc_core::{Potential, SmcError, TokenId};

use crate::extend::Extension;
use crate::particles::Particle;
use crate::potentials::log_score;

/// Label recorded when masking removed every token of a particle's proposal.
pub const MASK_EXHAUSTED: &str = "proposal-mask";

/// Log-scores of `sequence` under each potential, in order.
pub fn incremental_log_scores(
    potentials: &[Arc<dyn Potential>],
    sequence: &[TokenId],
    complete: bool,
) -> Result<Vec<f64>, SmcError> {
    potentials
        .iter()
        .map(|potential| log_score(potential.as_ref(), sequence, complete))
        .collect()
}

/// Appends the proposed token and folds the incremental ratio into the weight.
///
/// Returns the name of the constraint that killed the particle, if any.
pub fn apply_incremental(
    particle: &mut Particle,
    extension: Extension,
    incremental: &[Arc<dyn Potential>],
) -> Result<Option<String>, SmcError> {
    let Some(token) = extension.token else {
        particle.kill();
        return Ok(Some(MASK_EXHAUSTED.to_string()));
    };
    particle.sequence.push(token);
    particle.terminal = extension.terminal;

    let scores = match extension.incremental_log_scores {
        Some(scores) => scores,
        None => incremental_log_scores(incremental, &particle.sequence, extension.terminal)?,
    };
    if let Some(idx) = scores.iter().position(|s| *s == f64::NEG_INFINITY) {
        particle.incremental_log_scores = scores;
        particle.kill();
        return Ok(Some(incremental[idx].name().to_string()));
    }

    let ratio: f64 = scores
        .iter()
        .zip(&particle.incremental_log_scores)
        .map(|(new, old)| new - old)
        .sum();
    particle.log_weight += extension.log_proposal_mass + ratio;
    particle.incremental_log_scores = scores;
    Ok(None)
}

/// Evaluates batch potentials on the full sequence and folds the change
/// since the previous evaluation into the weight.
///
/// Terminal particles are scored as complete sequences.
pub fn apply_batch(
    particle: &mut Particle,
    batch: &[Arc<dyn Potential>],
) -> Result<Option<String>, SmcError> {
    let scores = incremental_log_scores(batch, &particle.sequence, particle.terminal)?;
    if let Some(idx) = scores.iter().position(|s| *s == f64::NEG_INFINITY) {
        particle.batch_log_scores = scores;
        particle.kill();
        return Ok(Some(batch[idx].name().to_string()));
    }
    let change: f64 = scores
        .iter()
        .zip(&particle.batch_log_scores)
        .map(|(new, old)| new - old)
        .sum();
    particle.log_weight += change;
    particle.batch_log_scores = scores;
    Ok(None)
}
