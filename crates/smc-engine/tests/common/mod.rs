#![allow(dead_code)]

use std::sync::Arc;

use smc_core::{Distribution, TokenId, Vocabulary};
use smc_engine::{EngineConfig, UnigramModel};

pub const A: TokenId = TokenId::from_raw(0);
pub const B: TokenId = TokenId::from_raw(1);
pub const SPACE: TokenId = TokenId::from_raw(2);
pub const PERIOD: TokenId = TokenId::from_raw(3);
pub const BANG: TokenId = TokenId::from_raw(4);
pub const QUESTION: TokenId = TokenId::from_raw(5);
pub const EOS: TokenId = TokenId::from_raw(6);

/// Character-level vocabulary; the end token decodes to nothing.
pub fn char_vocabulary() -> Arc<Vocabulary> {
    Arc::new(Vocabulary::new(["a", "b", " ", ".", "!", "?", ""]))
}

pub fn char_distribution() -> Distribution {
    Distribution::from_probs([
        (A, 0.25),
        (B, 0.25),
        (SPACE, 0.15),
        (PERIOD, 0.10),
        (BANG, 0.05),
        (QUESTION, 0.05),
        (EOS, 0.15),
    ])
    .unwrap()
}

/// Unigram model over the character vocabulary with an end token.
pub fn char_model() -> UnigramModel {
    UnigramModel::new(char_distribution()).with_eos(EOS)
}

/// Same distribution without an end token, so particles only stop at `max_tokens`.
pub fn endless_model() -> UnigramModel {
    let without_eos = char_distribution().restrict(|token| token != EOS).unwrap().1;
    UnigramModel::new(without_eos)
}

pub fn config(num_particles: usize, max_tokens: usize, seed: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.num_particles = num_particles;
    config.max_tokens = max_tokens;
    config.seed_policy.master_seed = seed;
    config.retry.base_delay_ms = 1;
    config
}
