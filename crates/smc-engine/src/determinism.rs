use smc_core::derive_substream_seed;

/// Derives the deterministic seed used to extend one particle slot at one step.
pub fn extension_seed(master_seed: u64, step: usize, slot: usize) -> u64 {
    let intermediate = derive_substream_seed(master_seed, step as u64);
    derive_substream_seed(intermediate, slot as u64)
}

/// Derives the deterministic seed for the resampling event of a step.
pub fn resample_seed(master_seed: u64, step: usize) -> u64 {
    derive_substream_seed(master_seed ^ 0xA5A5_A5A5_A5A5_A5A5, step as u64)
}

/// Derives the deterministic seed used for final sequence selection.
pub fn selection_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0x5A5A_5A5A_5A5A_5A5A, u64::MAX)
}
