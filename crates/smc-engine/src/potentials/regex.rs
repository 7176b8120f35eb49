//! Regex constraint over the decoded text, backed by an anchored dense DFA.

use std::sync::Arc;

use regex_automata::dfa::{dense, Automaton, StartKind};
use regex_automata::util::primitives::StateID;
use regex_automata::util::start;
use regex_automata::Anchored;
use smc_core::errors::ErrorInfo;
use smc_core::{CostClass, Potential, SmcError, TokenId, Vocabulary};

/// Maximum allowed regex pattern length.
const MAX_PATTERN_LEN: usize = 8192;
/// Maximum DFA size in bytes (10 MB).
const MAX_DFA_SIZE: usize = 10 * 1024 * 1024;

/// Incremental potential that requires the decoded text to match a regex.
///
/// A prefix scores 1 while the DFA can still reach a match and 0 once it is
/// dead. A complete sequence scores 1 only if the whole text matches.
pub struct RegexPotential {
    name: String,
    pattern: String,
    dfa: dense::DFA<Vec<u32>>,
    start: StateID,
    vocabulary: Arc<Vocabulary>,
}

impl std::fmt::Debug for RegexPotential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegexPotential")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

enum Walk {
    Live(StateID),
    Dead,
}

impl RegexPotential {
    /// Compiles `pattern`; the match must span the entire decoded text.
    pub fn new(pattern: &str, vocabulary: Arc<Vocabulary>) -> Result<Self, SmcError> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(SmcError::Config(
                ErrorInfo::new("regex-too-long", "regex pattern exceeds the length limit")
                    .with_context("len", pattern.len())
                    .with_context("max", MAX_PATTERN_LEN),
            ));
        }
        let anchored = format!("(?:{pattern})$");
        let dfa = dense::Builder::new()
            .configure(
                dense::DFA::config()
                    .start_kind(StartKind::Anchored)
                    .dfa_size_limit(Some(MAX_DFA_SIZE)),
            )
            .build(&anchored)
            .map_err(|err| {
                SmcError::Config(
                    ErrorInfo::new("regex-compile", err.to_string())
                        .with_context("pattern", pattern),
                )
            })?;
        let start = dfa
            .start_state(&start::Config::new().anchored(Anchored::Yes))
            .map_err(|err| {
                SmcError::Config(
                    ErrorInfo::new("regex-start-state", err.to_string())
                        .with_context("pattern", pattern),
                )
            })?;
        Ok(Self {
            name: "regex".to_string(),
            pattern: pattern.to_string(),
            dfa,
            start,
            vocabulary,
        })
    }

    /// Overrides the registration name (defaults to `"regex"`).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Source pattern as supplied by the caller.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn walk(&self, sequence: &[TokenId]) -> Result<Walk, SmcError> {
        let mut state = self.start;
        for token in sequence {
            let Some(text) = self.vocabulary.token_text(*token) else {
                continue;
            };
            for &byte in text.as_bytes() {
                state = self.dfa.next_state(state, byte);
                if self.dfa.is_dead_state(state) {
                    return Ok(Walk::Dead);
                }
                if self.dfa.is_quit_state(state) {
                    return Err(SmcError::Potential(
                        ErrorInfo::new("regex-quit", "DFA gave up on the input")
                            .with_context("pattern", &self.pattern),
                    ));
                }
            }
        }
        Ok(Walk::Live(state))
    }
}

impl Potential for RegexPotential {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_class(&self) -> CostClass {
        CostClass::Incremental
    }

    fn evaluate(&self, sequence: &[TokenId]) -> Result<f64, SmcError> {
        Ok(match self.walk(sequence)? {
            Walk::Live(_) => 1.0,
            Walk::Dead => 0.0,
        })
    }

    fn evaluate_complete(&self, sequence: &[TokenId]) -> Result<f64, SmcError> {
        Ok(match self.walk(sequence)? {
            Walk::Live(state) if self.dfa.is_match_state(self.dfa.next_eoi_state(state)) => 1.0,
            _ => 0.0,
        })
    }
}
