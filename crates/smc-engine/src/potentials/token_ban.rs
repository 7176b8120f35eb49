use std::collections::BTreeSet;

use smc_core::{CostClass, Potential, SmcError, TokenId};

/// Incremental potential forbidding any occurrence of the listed tokens.
#[derive(Debug, Clone)]
pub struct TokenBanPotential {
    name: String,
    banned: BTreeSet<TokenId>,
}

impl TokenBanPotential {
    /// Bans every token in `banned`.
    pub fn new(banned: impl IntoIterator<Item = TokenId>) -> Self {
        Self {
            name: "token-ban".to_string(),
            banned: banned.into_iter().collect(),
        }
    }

    /// Overrides the registration name (defaults to `"token-ban"`).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Potential for TokenBanPotential {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_class(&self) -> CostClass {
        CostClass::Incremental
    }

    fn evaluate(&self, sequence: &[TokenId]) -> Result<f64, SmcError> {
        let hit = sequence.iter().any(|token| self.banned.contains(token));
        Ok(if hit { 0.0 } else { 1.0 })
    }
}
