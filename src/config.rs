// src/config.rs
use serde::Serialize;

use crate::valuation::ValuationError;

pub const DEFAULT_PROJECTION_YEARS: u32 = 5;
pub const DEFAULT_TERMINAL_GROWTH: f64 = 0.025;
pub const DEFAULT_EQUITY_RISK_PREMIUM: f64 = 0.055;

/// Axis spacing for the two sensitivity grids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityConfig {
    pub wacc_step: f64,
    pub wacc_points: usize,
    pub tgr_step: f64,
    pub tgr_points: usize,
    pub growth_step: f64,
    pub growth_points: usize,
    pub margin_step: f64,
    pub margin_points: usize,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        SensitivityConfig {
            wacc_step: 0.01,
            wacc_points: 7,
            tgr_step: 0.005,
            tgr_points: 7,
            growth_step: 0.02,
            growth_points: 3,
            margin_step: 0.02,
            margin_points: 5,
        }
    }
}

/// Model settings read once at startup and passed into the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationConfig {
    pub projection_years: u32,
    pub terminal_growth: f64,
    pub equity_risk_premium: f64,
    pub sensitivity: SensitivityConfig,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            projection_years: DEFAULT_PROJECTION_YEARS,
            terminal_growth: DEFAULT_TERMINAL_GROWTH,
            equity_risk_premium: DEFAULT_EQUITY_RISK_PREMIUM,
            sensitivity: SensitivityConfig::default(),
        }
    }
}

impl ValuationConfig {
    /// Checks that do not depend on market data.
    pub fn validate(&self) -> Result<(), ValuationError> {
        if self.projection_years < 1 {
            return Err(ValuationError::InvalidAssumption(
                "projection horizon must be at least 1 year".to_string(),
            ));
        }
        if !self.terminal_growth.is_finite() || !self.equity_risk_premium.is_finite() {
            return Err(ValuationError::InvalidAssumption(
                "terminal growth and equity risk premium must be finite numbers".to_string(),
            ));
        }
        let s = &self.sensitivity;
        for (name, points) in [
            ("WACC", s.wacc_points),
            ("terminal growth", s.tgr_points),
            ("revenue growth", s.growth_points),
            ("operating margin", s.margin_points),
        ] {
            if points == 0 || points % 2 == 0 {
                return Err(ValuationError::InvalidAssumption(format!(
                    "{} axis needs an odd number of points, got {}",
                    name, points
                )));
            }
        }
        for (name, step) in [
            ("WACC", s.wacc_step),
            ("terminal growth", s.tgr_step),
            ("revenue growth", s.growth_step),
            ("operating margin", s.margin_step),
        ] {
            if !(step > 0.0) {
                return Err(ValuationError::InvalidAssumption(format!(
                    "{} axis step must be positive, got {}",
                    name, step
                )));
            }
        }
        Ok(())
    }

    /// The configured terminal growth must stay below the base-case WACC.
    pub fn validate_against_wacc(&self, base_wacc: f64) -> Result<(), ValuationError> {
        if self.terminal_growth < base_wacc {
            Ok(())
        } else {
            Err(ValuationError::InvalidAssumption(format!(
                "terminal growth {:.2}% must be below the base-case WACC {:.2}%",
                self.terminal_growth * 100.0,
                base_wacc * 100.0
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ValuationConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_year_horizon_is_rejected() {
        let config = ValuationConfig {
            projection_years: 0,
            ..ValuationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn even_axis_is_rejected() {
        let mut config = ValuationConfig::default();
        config.sensitivity.margin_points = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn terminal_growth_must_stay_below_base_wacc() {
        let config = ValuationConfig::default();
        assert!(config.validate_against_wacc(0.1094).is_ok());
        let err = config.validate_against_wacc(0.025).unwrap_err();
        assert!(err.to_string().contains("2.50%"));
    }
}
