use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, SmcError};
use crate::rng::RngHandle;

/// Identifier for a vocabulary entry of the underlying language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(u32);

impl TokenId {
    /// Creates a new identifier from its raw integer representation.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

fn invalid_distribution(message: impl Into<String>) -> SmcError {
    SmcError::Model(ErrorInfo::new("invalid-distribution", message))
}

/// Normalized probability distribution over a finite set of tokens.
///
/// Entries are kept sorted by token id and only tokens with positive mass are
/// stored, so iteration order and sampling are deterministic. Deserialized
/// values go through [`Distribution::from_probs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDistribution")]
pub struct Distribution {
    entries: Vec<(TokenId, f64)>,
}

#[derive(Deserialize)]
struct RawDistribution {
    entries: Vec<(TokenId, f64)>,
}

impl TryFrom<RawDistribution> for Distribution {
    type Error = SmcError;

    fn try_from(raw: RawDistribution) -> Result<Self, Self::Error> {
        Distribution::from_probs(raw.entries)
    }
}

impl Distribution {
    /// Builds a distribution from non-negative (not necessarily normalized) weights.
    ///
    /// Repeated tokens have their weights summed.
    pub fn from_probs<I>(weights: I) -> Result<Self, SmcError>
    where
        I: IntoIterator<Item = (TokenId, f64)>,
    {
        let mut merged = BTreeMap::new();
        for (token, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid_distribution("weights must be finite and non-negative")
                    .with_context("token", token.as_raw())
                    .with_context("weight", weight));
            }
            if weight > 0.0 {
                *merged.entry(token).or_insert(0.0) += weight;
            }
        }
        let total: f64 = merged.values().sum();
        if merged.is_empty() || !total.is_finite() {
            return Err(invalid_distribution("distribution has no finite positive mass"));
        }
        Ok(Self {
            entries: merged
                .into_iter()
                .map(|(token, weight)| (token, weight / total))
                .collect(),
        })
    }

    /// Builds a distribution from dense logits indexed by token id (softmax).
    ///
    /// Logits of `-inf` receive zero mass; NaN or `+inf` logits are rejected.
    pub fn from_logits(logits: &[f64]) -> Result<Self, SmcError> {
        if logits.iter().any(|l| l.is_nan() || *l == f64::INFINITY) {
            return Err(invalid_distribution("logits must not contain NaN or +inf"));
        }
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return Err(invalid_distribution("all logits are -inf"));
        }
        Self::from_probs(
            logits
                .iter()
                .enumerate()
                .map(|(idx, &logit)| (TokenId::from_raw(idx as u32), (logit - max).exp())),
        )
    }

    /// Uniform distribution over token ids `0..size`.
    pub fn uniform(size: usize) -> Result<Self, SmcError> {
        Self::from_probs((0..size).map(|idx| (TokenId::from_raw(idx as u32), 1.0)))
    }

    /// Probability assigned to `token` (zero when outside the support).
    pub fn prob(&self, token: TokenId) -> f64 {
        self.entries
            .binary_search_by_key(&token, |(t, _)| *t)
            .map(|idx| self.entries[idx].1)
            .unwrap_or(0.0)
    }

    /// Tokens with positive probability, in ascending id order.
    pub fn support(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.entries.iter().map(|(token, _)| *token)
    }

    /// `(token, probability)` pairs in ascending id order.
    pub fn entries(&self) -> &[(TokenId, f64)] {
        &self.entries
    }

    /// Number of tokens in the support.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the support is empty (never true for a constructed distribution).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restricts the support to tokens accepted by `keep`.
    ///
    /// Returns the probability mass that was kept together with the
    /// renormalized distribution, or `None` when nothing survives.
    pub fn restrict<F>(&self, mut keep: F) -> Option<(f64, Distribution)>
    where
        F: FnMut(TokenId) -> bool,
    {
        let kept: Vec<(TokenId, f64)> = self
            .entries
            .iter()
            .copied()
            .filter(|(token, _)| keep(*token))
            .collect();
        let mass: f64 = kept.iter().map(|(_, p)| p).sum();
        if kept.is_empty() || mass <= 0.0 {
            return None;
        }
        Some((
            mass,
            Distribution {
                entries: kept.into_iter().map(|(t, p)| (t, p / mass)).collect(),
            },
        ))
    }

    /// Draws one token by inverting the cumulative distribution.
    ///
    /// Returns `None` only for an empty support.
    pub fn sample(&self, rng: &mut RngHandle) -> Option<TokenId> {
        let target = rng.unit_interval();
        let mut cumulative = 0.0;
        for (token, prob) in &self.entries {
            cumulative += prob;
            if target < cumulative {
                return Some(*token);
            }
        }
        // rounding can leave the cumulative sum a hair below one
        self.entries.last().map(|(token, _)| *token)
    }
}

/// Mapping from token ids to their surface text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Vocabulary {
    tokens: Vec<String>,
}

impl Vocabulary {
    /// Creates a vocabulary where token `i` decodes to `tokens[i]`.
    pub fn new<S: Into<String>>(tokens: impl IntoIterator<Item = S>) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a vocabulary from a decode function; missing ids decode to "".
    pub fn from_decode_fn<F>(size: usize, decode: F) -> Self
    where
        F: Fn(TokenId) -> Option<String>,
    {
        Self {
            tokens: (0..size)
                .map(|idx| decode(TokenId::from_raw(idx as u32)).unwrap_or_default())
                .collect(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary has no entries.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Surface text of a single token.
    pub fn token_text(&self, token: TokenId) -> Option<&str> {
        self.tokens.get(token.as_raw() as usize).map(String::as_str)
    }

    /// Looks up the id of the first token whose text equals `text`.
    pub fn token_id(&self, text: &str) -> Option<TokenId> {
        self.tokens
            .iter()
            .position(|candidate| candidate == text)
            .map(|idx| TokenId::from_raw(idx as u32))
    }

    /// Concatenates the text of every token; unknown ids contribute nothing.
    pub fn decode(&self, sequence: &[TokenId]) -> String {
        sequence
            .iter()
            .filter_map(|token| self.token_text(*token))
            .collect()
    }
}
