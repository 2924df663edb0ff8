// src/valuation/scenario.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five fixed valuation paths. Declaration order is the canonical order
/// used for iteration and for keyed storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scenario {
    Base,
    Bull,
    Bear,
    RisingRates,
    FallingRates,
}

/// Offsets a scenario applies on top of the historical baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioAssumptions {
    /// Added to the historical average revenue growth.
    pub revenue_growth_adjustment: f64,
    /// Added to the historical average operating margin.
    pub margin_adjustment: f64,
    /// Added to the base WACC, in basis points.
    pub wacc_adjustment_bps: i32,
    /// Replaces the configured terminal growth rate when set.
    pub terminal_growth_override: Option<f64>,
}

impl ScenarioAssumptions {
    pub fn wacc_adjustment(&self) -> f64 {
        f64::from(self.wacc_adjustment_bps) / 10_000.0
    }

    pub fn terminal_growth(&self, configured: f64) -> f64 {
        self.terminal_growth_override.unwrap_or(configured)
    }
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Base,
        Scenario::Bull,
        Scenario::Bear,
        Scenario::RisingRates,
        Scenario::FallingRates,
    ];

    pub fn assumptions(self) -> ScenarioAssumptions {
        match self {
            Scenario::Base => ScenarioAssumptions {
                revenue_growth_adjustment: 0.0,
                margin_adjustment: 0.0,
                wacc_adjustment_bps: 0,
                terminal_growth_override: None,
            },
            Scenario::Bull => ScenarioAssumptions {
                revenue_growth_adjustment: 0.03,
                margin_adjustment: 0.02,
                wacc_adjustment_bps: -100,
                terminal_growth_override: Some(0.03),
            },
            Scenario::Bear => ScenarioAssumptions {
                revenue_growth_adjustment: -0.03,
                margin_adjustment: -0.02,
                wacc_adjustment_bps: 150,
                terminal_growth_override: Some(0.02),
            },
            Scenario::RisingRates => ScenarioAssumptions {
                revenue_growth_adjustment: 0.0,
                // higher funding costs squeeze margins slightly
                margin_adjustment: -0.005,
                wacc_adjustment_bps: 200,
                terminal_growth_override: None,
            },
            Scenario::FallingRates => ScenarioAssumptions {
                revenue_growth_adjustment: 0.0,
                margin_adjustment: 0.005,
                wacc_adjustment_bps: -150,
                terminal_growth_override: None,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Base => "Base Case",
            Scenario::Bull => "Bull Case",
            Scenario::Bear => "Bear Case",
            Scenario::RisingRates => "Rising Rates",
            Scenario::FallingRates => "Falling Rates",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::Base => "Moderate growth, current interest rates maintained",
            Scenario::Bull => "Rising sales & profit, falling interest rates (-100bp)",
            Scenario::Bear => "Falling sales & profit, rising interest rates (+150bp)",
            Scenario::RisingRates => "Stable sales, aggressive rate hikes (+200bp)",
            Scenario::FallingRates => "Stable sales, rate cuts (-150bp)",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
