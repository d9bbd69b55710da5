use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Share of the retail tariff owed on injected energy under net metering.
///
/// Regulators phase this charge in over several years, so besides a fixed
/// fraction a schedule keyed by project year can be supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireCharge {
    /// Same fraction for every year.
    Fixed {
        /// Fraction of the tariff, 0.0..=1.0
        fraction: f64,
    },
    /// Fraction changes at the given project years.
    PhaseIn {
        /// Steps ordered by `from_year`
        steps: Vec<PhaseInStep>,
    },
}

/// A phase-in step: from `from_year` on (1-based project year) the fraction applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct PhaseInStep {
    pub from_year: u32,
    pub fraction: f64,
}

impl WireCharge {
    /// Creates a fixed wire charge
    pub fn fixed(fraction: f64) -> Self {
        Self::Fixed { fraction }
    }

    /// Creates a phase-in schedule
    pub fn phase_in(steps: Vec<PhaseInStep>) -> Self {
        Self::PhaseIn { steps }
    }

    /// Fraction of the tariff owed in the given 1-based project year.
    ///
    /// Years before the first phase-in step owe nothing.
    pub fn fraction_for_year(&self, year: u32) -> f64 {
        match self {
            WireCharge::Fixed { fraction } => *fraction,
            WireCharge::PhaseIn { steps } => steps
                .iter()
                .take_while(|step| step.from_year <= year)
                .last()
                .map(|step| step.fraction)
                .unwrap_or(0.0),
        }
    }

    /// All fractions within `[0, 1]` and phase-in years strictly increasing from 1.
    pub fn is_valid(&self) -> bool {
        match self {
            WireCharge::Fixed { fraction } => is_fraction(*fraction),
            WireCharge::PhaseIn { steps } => {
                if steps.is_empty() || steps[0].from_year < 1 {
                    return false;
                }
                steps.iter().all(|s| is_fraction(s.fraction))
                    && steps.windows(2).all(|w| w[0].from_year < w[1].from_year)
            }
        }
    }
}

fn is_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Everything the financial engine needs for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct FinancialInput {
    /// Up-front cost of the installation.
    pub initial_investment: f64,
    /// Twelve monthly generation values for year one, kWh.
    pub monthly_generation_kwh: Vec<f64>,
    /// Twelve monthly consumption values for year one, kWh.
    pub monthly_consumption_kwh: Vec<f64>,
    /// Retail energy tariff per kWh in year one.
    pub tariff: f64,
    pub wire_charge: WireCharge,
    pub lifetime_years: u32,
    pub discount_rate: f64,
    /// Annual energy price inflation.
    pub energy_inflation: f64,
    /// Annual module degradation.
    pub degradation_rate: f64,
    pub om_cost_year1: f64,
    pub om_inflation: f64,
    /// Annual growth of consumption.
    #[serde(default)]
    pub load_growth: f64,
}

/// One row of the cash-flow ledger. Year 0 holds the investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct CashFlowYear {
    pub year: u32,
    pub generation_kwh: f64,
    pub consumption_kwh: f64,
    pub tariff: f64,
    pub energy_savings: f64,
    pub om_cost: f64,
    pub net_cash_flow: f64,
    pub cumulative_cash_flow: f64,
    pub present_value: f64,
    pub cumulative_discounted_cash_flow: f64,
}

/// Metrics derived from one cash-flow ledger.
///
/// Undefined values (no IRR root, never paid back) are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct CashFlowAnalysis {
    pub npv: f64,
    pub irr: Option<f64>,
    pub simple_payback_years: Option<f64>,
    pub discounted_payback_years: Option<f64>,
    pub total_savings_nominal: f64,
    pub total_savings_present_value: f64,
    pub profitability_index: f64,
    /// Levelized cost of energy per kWh.
    pub lcoe: Option<f64>,
    pub years: Vec<CashFlowYear>,
}

/// Inputs perturbed by the sensitivity sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
#[serde(rename_all = "snake_case")]
pub enum SensitivityParameter {
    Tariff,
    EnergyInflation,
    DiscountRate,
}

impl SensitivityParameter {
    pub fn all() -> &'static [SensitivityParameter] {
        &[
            SensitivityParameter::Tariff,
            SensitivityParameter::EnergyInflation,
            SensitivityParameter::DiscountRate,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensitivityParameter::Tariff => "tariff",
            SensitivityParameter::EnergyInflation => "energy inflation",
            SensitivityParameter::DiscountRate => "discount rate",
        }
    }
}

/// NPV at one relative perturbation (0.1 = +10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct SensitivityPoint {
    pub perturbation: f64,
    pub npv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct SensitivitySeries {
    pub parameter: SensitivityParameter,
    pub points: Vec<SensitivityPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Base,
    Optimistic,
    Conservative,
    Pessimistic,
}

impl ScenarioKind {
    pub fn all() -> &'static [ScenarioKind] {
        &[
            ScenarioKind::Base,
            ScenarioKind::Optimistic,
            ScenarioKind::Conservative,
            ScenarioKind::Pessimistic,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Base => "base",
            ScenarioKind::Optimistic => "optimistic",
            ScenarioKind::Conservative => "conservative",
            ScenarioKind::Pessimistic => "pessimistic",
        }
    }
}

/// Multipliers applied to a base [`FinancialInput`]. Rates are scaled
/// relatively, so `energy_inflation: 1.2` turns 4.5% into 5.4%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct InputAdjustment {
    pub generation: f64,
    pub tariff: f64,
    pub energy_inflation: f64,
    pub discount_rate: f64,
    pub om_cost: f64,
    pub om_inflation: f64,
}

impl InputAdjustment {
    pub fn identity() -> Self {
        Self {
            generation: 1.0,
            tariff: 1.0,
            energy_inflation: 1.0,
            discount_rate: 1.0,
            om_cost: 1.0,
            om_inflation: 1.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

impl Default for InputAdjustment {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct ScenarioOutcome {
    pub kind: ScenarioKind,
    pub adjustment: InputAdjustment,
    pub analysis: CashFlowAnalysis,
}

/// Complete output of the financial engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./finance.ts")]
pub struct FinancialResult {
    pub analysis: CashFlowAnalysis,
    pub sensitivity: Vec<SensitivitySeries>,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl FinancialResult {
    pub fn scenario(&self, kind: ScenarioKind) -> Option<&ScenarioOutcome> {
        self.scenarios.iter().find(|s| s.kind == kind)
    }

    pub fn sensitivity_for(&self, parameter: SensitivityParameter) -> Option<&SensitivitySeries> {
        self.sensitivity.iter().find(|s| s.parameter == parameter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> WireCharge {
        WireCharge::phase_in(vec![
            PhaseInStep {
                from_year: 1,
                fraction: 0.15,
            },
            PhaseInStep {
                from_year: 3,
                fraction: 0.30,
            },
            PhaseInStep {
                from_year: 6,
                fraction: 0.60,
            },
        ])
    }

    #[test]
    fn test_fixed_wire_charge() {
        let charge = WireCharge::fixed(0.3);
        assert_eq!(charge.fraction_for_year(1), 0.3);
        assert_eq!(charge.fraction_for_year(25), 0.3);
        assert!(charge.is_valid());
    }

    #[test]
    fn test_phase_in_picks_latest_step() {
        let charge = schedule();
        assert_eq!(charge.fraction_for_year(1), 0.15);
        assert_eq!(charge.fraction_for_year(2), 0.15);
        assert_eq!(charge.fraction_for_year(3), 0.30);
        assert_eq!(charge.fraction_for_year(5), 0.30);
        assert_eq!(charge.fraction_for_year(20), 0.60);
        assert!(charge.is_valid());
    }

    #[test]
    fn test_phase_in_before_first_step_owes_nothing() {
        let charge = WireCharge::phase_in(vec![PhaseInStep {
            from_year: 4,
            fraction: 0.5,
        }]);
        assert_eq!(charge.fraction_for_year(3), 0.0);
        assert_eq!(charge.fraction_for_year(4), 0.5);
    }

    #[test]
    fn test_invalid_wire_charges() {
        assert!(!WireCharge::fixed(1.2).is_valid());
        assert!(!WireCharge::fixed(f64::NAN).is_valid());
        assert!(!WireCharge::phase_in(Vec::new()).is_valid());
        let unordered = WireCharge::phase_in(vec![
            PhaseInStep {
                from_year: 5,
                fraction: 0.2,
            },
            PhaseInStep {
                from_year: 2,
                fraction: 0.4,
            },
        ]);
        assert!(!unordered.is_valid());
    }

    #[test]
    fn test_identity_adjustment() {
        assert!(InputAdjustment::identity().is_identity());
        let tweaked = InputAdjustment {
            tariff: 1.05,
            ..InputAdjustment::identity()
        };
        assert!(!tweaked.is_identity());
    }
}
