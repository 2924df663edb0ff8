// src/valuation/error.rs
use thiserror::Error;

use super::scenario::Scenario;

pub type Result<T> = std::result::Result<T, ValuationError>;

/// Precondition failures raised by the valuation engine. None of these are
/// transient; retrying with the same inputs fails the same way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    #[error("insufficient history: {years} year(s) supplied, at least 2 are required to compute growth")]
    InsufficientHistory { years: usize },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid assumption: {0}")]
    InvalidAssumption(String),

    #[error("{scenario} scenario: {source}")]
    Scenario {
        scenario: Scenario,
        #[source]
        source: Box<ValuationError>,
    },
}

impl ValuationError {
    pub fn in_scenario(self, scenario: Scenario) -> Self {
        ValuationError::Scenario {
            scenario,
            source: Box::new(self),
        }
    }

    /// The underlying error with any scenario context stripped.
    pub fn root(&self) -> &ValuationError {
        match self {
            ValuationError::Scenario { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_invalid_assumption(&self) -> bool {
        matches!(self.root(), ValuationError::InvalidAssumption(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_context_is_part_of_the_message() {
        let err = ValuationError::InvalidAssumption("WACC 2.00% <= terminal growth 2.50%".into())
            .in_scenario(Scenario::FallingRates);
        assert_eq!(
            err.to_string(),
            "Falling Rates scenario: invalid assumption: WACC 2.00% <= terminal growth 2.50%"
        );
        assert!(err.is_invalid_assumption());
    }
}
