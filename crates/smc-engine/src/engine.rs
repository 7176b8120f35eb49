use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use smc_core::errors::ErrorInfo;
use smc_core::{LanguageModel, Potential, RngHandle, SmcError};
use tracing::{debug, error, info, trace};

use crate::config::EngineConfig;
use crate::determinism;
use crate::extend::{self, StepInputs};
use crate::metrics::{ResampleEvent, StepRecord, TraceRecorder};
use crate::particles::{self, Particle, ParticleSet};
use crate::potentials::ConstraintSpec;
use crate::resample;
use crate::result::{BudgetKind, GenerationResult, Termination};
use crate::reweight;

/// Lifecycle states of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Building the initial uniform population.
    Initializing,
    /// Extending and reweighting particles.
    Stepping,
    /// Replacing the population after ESS dropped below the threshold.
    Resampling,
    /// Results extracted or a run-level failure surfaced.
    Terminated,
}

/// Cooperative cancellation flag checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the run stops before its next step.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Sequential Monte Carlo sampler over a language model.
///
/// The engine holds no per-run state; every call to [`SmcEngine::run`]
/// starts from a fresh population.
pub struct SmcEngine {
    model: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for SmcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmcEngine")
            .field("eos", &self.model.eos_token())
            .field("batching", &self.model.supports_batching())
            .finish_non_exhaustive()
    }
}

struct StepOutcome {
    particles: Vec<Particle>,
    killed_by: Vec<String>,
}

impl SmcEngine {
    /// Creates an engine bound to a model provider.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Draws constrained sequences for `context` without external cancellation.
    ///
    /// Returns a partial result when a budget runs out, and an error on
    /// degeneracy, exhausted model retries or a potential contract violation.
    pub fn run(
        &self,
        context: &str,
        potentials: &ConstraintSpec,
        config: &EngineConfig,
    ) -> Result<GenerationResult, SmcError> {
        self.run_with_cancel(context, potentials, config, &CancelToken::new())
    }

    /// Like [`SmcEngine::run`], stopping with [`SmcError::Cancelled`] before
    /// the next step once `cancel` is triggered.
    ///
    /// The token only affects this call.
    pub fn run_with_cancel(
        &self,
        context: &str,
        potentials: &ConstraintSpec,
        config: &EngineConfig,
        cancel: &CancelToken,
    ) -> Result<GenerationResult, SmcError> {
        config.validate()?;
        let started = Instant::now();
        let n = config.num_particles;
        let seed = config.seed_policy.master_seed;
        let mut state = EngineState::Initializing;
        info!(
            num_particles = n,
            max_tokens = config.max_tokens,
            potentials = potentials.len(),
            seed,
            "starting constrained generation"
        );

        let worker_pool = build_pool(config.concurrency.worker_threads, "worker")?;
        let batch_pool = build_pool(config.concurrency.batch_threads, "batch")?;
        let incremental = potentials.incremental();
        let batch = potentials.batch();

        let initial = reweight::incremental_log_scores(&incremental, &[], false)?;
        if let Some(idx) = initial.iter().position(|score| !score.is_finite()) {
            let err = particles::degenerate(0, n)
                .with_context("potential", incremental[idx].name());
            error!(error = %err, "empty prefix is forbidden by a constraint");
            return Err(err);
        }
        let mut set = ParticleSet::new(n, initial, batch.len());
        let mut recorder = TraceRecorder::new(
            seed,
            config.seed_policy.label.clone(),
            potentials.names(),
        );
        let eos = self.model.eos_token();

        let termination = loop {
            if cancel.is_cancelled() {
                transition(&mut state, EngineState::Terminated);
                let err = SmcError::Cancelled(
                    ErrorInfo::new("cancelled", "run cancelled by caller")
                        .with_context("step", set.step())
                        .with_context("surviving", set.alive_count()),
                );
                info!(step = set.step(), "generation cancelled");
                return Err(err);
            }
            if set.is_finished() {
                break Termination::Completed;
            }
            if let Some(limit) = config.max_wall_time() {
                if started.elapsed() >= limit {
                    break Termination::BudgetExceeded {
                        budget: BudgetKind::WallTime,
                    };
                }
            }
            if let Some(max_steps) = config.max_steps {
                if set.step() >= max_steps {
                    break Termination::BudgetExceeded {
                        budget: BudgetKind::Steps,
                    };
                }
            }

            transition(&mut state, EngineState::Stepping);
            let step = set.step() + 1;
            let inputs = StepInputs {
                model: self.model.as_ref(),
                context,
                incremental: &incremental,
                config,
                eos,
                step,
            };
            let outcome = self
                .step(&set, &inputs, &batch, &worker_pool, &batch_pool)
                .map_err(|err| surface(err, step, &set))?;
            for killer in &outcome.killed_by {
                debug!(step, potential = %killer, "particle killed by constraint");
                recorder.note_kill(killer);
            }
            let killed = outcome.killed_by.len();
            let ess = set
                .commit_step(outcome.particles)
                .map_err(|err| surface(err, step, &set))?;
            let alive = set.alive_count();
            let active = set.active_count();

            let resampled =
                active > 0 && resample::should_resample(ess, n, config.resample_threshold);
            if resampled {
                transition(&mut state, EngineState::Resampling);
                let weights = set
                    .normalized_weights()
                    .ok_or_else(|| particles::degenerate(step, n))?;
                let mut rng = RngHandle::from_seed(determinism::resample_seed(seed, step));
                let ancestors = resample::systematic_resample(&weights, &mut rng);
                set.resample_from(&ancestors);
                recorder.push_resample(ResampleEvent {
                    step,
                    generation: set.generation(),
                    ess_before: ess,
                    ancestors,
                });
            }

            recorder.push_step(StepRecord {
                step,
                ess,
                alive,
                active,
                killed,
                resampled,
            });
            debug!(step, ess, alive, active, killed, resampled, "step complete");
        };

        transition(&mut state, EngineState::Terminated);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = GenerationResult::from_particle_set(
            &set,
            termination,
            config.selection_mode,
            determinism::selection_seed(seed),
            recorder.finish(elapsed_ms),
        )?;
        info!(
            steps = result.steps,
            survivors = result.particles.len(),
            partial = result.is_partial(),
            elapsed_ms,
            "generation finished"
        );
        Ok(result)
    }

    /// Extends every active particle by one token and reweights it.
    ///
    /// Works on a copy of the population so a failed step leaves `set` untouched.
    fn step(
        &self,
        set: &ParticleSet,
        inputs: &StepInputs<'_>,
        batch: &[Arc<dyn Potential>],
        worker_pool: &ThreadPool,
        batch_pool: &ThreadPool,
    ) -> Result<StepOutcome, SmcError> {
        let current = set.particles();
        let active: Vec<usize> = (0..current.len())
            .filter(|&slot| current[slot].is_active())
            .collect();
        let distributions = extend::fetch_distributions(inputs, current, &active, worker_pool)?;

        let extended = worker_pool.install(|| {
            active
                .par_iter()
                .zip(distributions.par_iter())
                .map(|(&slot, distribution)| {
                    let extension = extend::propose(inputs, &current[slot], slot, distribution)?;
                    let mut particle = current[slot].clone();
                    let killer =
                        reweight::apply_incremental(&mut particle, extension, inputs.incremental)?;
                    Ok((slot, particle, killer))
                })
                .collect::<Result<Vec<_>, SmcError>>()
        })?;

        let checkpoint = inputs.step % inputs.config.checkpoint_interval == 0;
        let mut next = current.to_vec();
        let mut killed_by = Vec::new();
        let mut batch_due = vec![false; next.len()];
        for (slot, particle, killer) in extended {
            match killer {
                Some(name) => killed_by.push(name),
                None if !batch.is_empty() && (checkpoint || particle.terminal) => {
                    batch_due[slot] = true;
                }
                None => {}
            }
            next[slot] = particle;
        }

        if batch_due.iter().any(|due| *due) {
            let batch_kills = batch_pool.install(|| {
                next.par_iter_mut()
                    .zip(batch_due.par_iter())
                    .filter(|(_, due)| **due)
                    .map(|(particle, _)| reweight::apply_batch(particle, batch))
                    .collect::<Result<Vec<_>, SmcError>>()
            })?;
            killed_by.extend(batch_kills.into_iter().flatten());
        }

        Ok(StepOutcome {
            particles: next,
            killed_by,
        })
    }
}

fn build_pool(threads: usize, role: &'static str) -> Result<ThreadPool, SmcError> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |index| format!("smc-{role}-{index}"))
        .build()
        .map_err(|err| {
            SmcError::Config(
                ErrorInfo::new("thread-pool", err.to_string()).with_context("role", role),
            )
        })
}

fn transition(state: &mut EngineState, next: EngineState) {
    if *state != next {
        trace!(from = ?*state, to = ?next, "engine state transition");
        *state = next;
    }
}

/// Adds step diagnostics to a run-level failure and logs it.
fn surface(err: SmcError, step: usize, set: &ParticleSet) -> SmcError {
    let mut err = err;
    if !err.info().context.contains_key("step") {
        err = err.with_context("step", step);
    }
    if !err.info().context.contains_key("surviving") {
        err = err.with_context("surviving", set.alive_count());
    }
    error!(step, error = %err, "generation failed");
    err
}
