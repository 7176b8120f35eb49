use smc_core::RngHandle;

/// Whether the population should be resampled at this ESS.
pub fn should_resample(ess: f64, num_particles: usize, threshold: f64) -> bool {
    ess < threshold * num_particles as f64
}

/// Systematic resampling: one uniform offset, `N` evenly spaced points.
///
/// `weights` must be normalized with at least one positive entry. Returns the
/// ancestor slot for each new particle, in non-decreasing order. Zero-weight
/// slots are never selected.
pub fn systematic_resample(weights: &[f64], rng: &mut RngHandle) -> Vec<usize> {
    let n = weights.len();
    let Some(last_positive) = weights.iter().rposition(|w| *w > 0.0) else {
        return Vec::new();
    };
    let offset = rng.unit_interval();
    let mut ancestors = Vec::with_capacity(n);
    let mut idx = 0;
    let mut cumulative = weights[0];
    for i in 0..n {
        let point = (i as f64 + offset) / n as f64;
        while point >= cumulative && idx < last_positive {
            idx += 1;
            cumulative += weights[idx];
        }
        ancestors.push(idx);
    }
    ancestors
}
