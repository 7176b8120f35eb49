use smc_core::errors::{ErrorInfo, SmcError};
use smc_core::{CostClass, Distribution, LanguageModel, Potential, TokenId};

struct ConstantModel;

impl LanguageModel for ConstantModel {
    fn next_token_distribution(
        &self,
        sequence: &[TokenId],
        _context: &str,
    ) -> Result<Distribution, SmcError> {
        if sequence.len() > 100 {
            return Err(SmcError::Model(ErrorInfo::new("too-long", "sequence too long")));
        }
        Distribution::uniform(4)
    }

    fn eos_token(&self) -> Option<TokenId> {
        Some(TokenId::from_raw(3))
    }
}

struct EvenLength;

impl Potential for EvenLength {
    fn name(&self) -> &str {
        "even-length"
    }

    fn cost_class(&self) -> CostClass {
        CostClass::Batch
    }

    fn evaluate(&self, _sequence: &[TokenId]) -> Result<f64, SmcError> {
        Ok(1.0)
    }

    fn evaluate_complete(&self, sequence: &[TokenId]) -> Result<f64, SmcError> {
        Ok(if sequence.len() % 2 == 0 { 1.0 } else { 0.0 })
    }
}

#[test]
fn default_batched_call_loops_over_sequences() {
    let model = ConstantModel;
    assert!(!model.supports_batching());
    let a = [TokenId::from_raw(0)];
    let b = [TokenId::from_raw(1)];
    let dists = model.next_token_distributions(&[&a, &b], "ctx").unwrap();
    assert_eq!(dists.len(), 2);
    assert_eq!(model.eos_token(), Some(TokenId::from_raw(3)));
}

#[test]
fn potentials_are_object_safe() {
    let potentials: Vec<Box<dyn Potential>> = vec![Box::new(EvenLength)];
    let seq = [TokenId::from_raw(0)];
    for potential in &potentials {
        assert_eq!(potential.cost_class(), CostClass::Batch);
        assert_eq!(potential.evaluate(&seq).unwrap(), 1.0);
        assert_eq!(potential.evaluate_complete(&seq).unwrap(), 0.0);
    }
}
