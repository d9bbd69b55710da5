//! Sensitivity and scenario runs. Both go through [`sweep`].

use pv_model::{
    CashFlowAnalysis, FinancialInput, InputAdjustment, ScenarioOutcome, SensitivityParameter,
    SensitivityPoint, SensitivitySeries,
};

use super::{cashflow, metrics};
use crate::config::{FinanceConfig, IrrSolverConfig, ScenarioPreset};
use crate::error::InvalidFinancialInput;

/// Scales `input` by `adjustment`. The identity returns an exact copy.
pub fn apply(input: &FinancialInput, adjustment: &InputAdjustment) -> FinancialInput {
    if adjustment.is_identity() {
        return input.clone();
    }
    FinancialInput {
        monthly_generation_kwh: input
            .monthly_generation_kwh
            .iter()
            .map(|v| v * adjustment.generation)
            .collect(),
        tariff: input.tariff * adjustment.tariff,
        energy_inflation: input.energy_inflation * adjustment.energy_inflation,
        discount_rate: input.discount_rate * adjustment.discount_rate,
        om_cost_year1: input.om_cost_year1 * adjustment.om_cost,
        om_inflation: input.om_inflation * adjustment.om_inflation,
        ..input.clone()
    }
}

/// Evaluates `input` once per adjustment, in order.
pub fn sweep(
    input: &FinancialInput,
    adjustments: &[InputAdjustment],
    solver: &IrrSolverConfig,
) -> Result<Vec<CashFlowAnalysis>, InvalidFinancialInput> {
    adjustments
        .iter()
        .map(|adjustment| {
            let adjusted = apply(input, adjustment);
            cashflow::validate(&adjusted)?;
            let ledger = cashflow::build_ledger(&adjusted);
            Ok(metrics::analyze(&adjusted, ledger, solver))
        })
        .collect()
}

/// Adjustment moving a single parameter by the relative `perturbation`.
pub fn perturb(parameter: SensitivityParameter, perturbation: f64) -> InputAdjustment {
    let factor = 1.0 + perturbation;
    let identity = InputAdjustment::identity();
    match parameter {
        SensitivityParameter::Tariff => InputAdjustment {
            tariff: factor,
            ..identity
        },
        SensitivityParameter::EnergyInflation => InputAdjustment {
            energy_inflation: factor,
            ..identity
        },
        SensitivityParameter::DiscountRate => InputAdjustment {
            discount_rate: factor,
            ..identity
        },
    }
}

/// Perturbations sorted ascending with the unperturbed point included.
fn perturbation_points(config: &FinanceConfig) -> Vec<f64> {
    let mut points = config.perturbations.clone();
    if !points.contains(&0.0) {
        points.push(0.0);
    }
    points.sort_by(f64::total_cmp);
    points.dedup();
    points
}

/// NPV of every parameter at every configured perturbation.
pub fn sensitivity(
    input: &FinancialInput,
    config: &FinanceConfig,
) -> Result<Vec<SensitivitySeries>, InvalidFinancialInput> {
    let points = perturbation_points(config);
    SensitivityParameter::all()
        .iter()
        .map(|parameter| {
            let adjustments: Vec<InputAdjustment> =
                points.iter().map(|p| perturb(*parameter, *p)).collect();
            let analyses = sweep(input, &adjustments, &config.irr)?;
            Ok(SensitivitySeries {
                parameter: *parameter,
                points: points
                    .iter()
                    .zip(analyses)
                    .map(|(perturbation, analysis)| SensitivityPoint {
                        perturbation: *perturbation,
                        npv: analysis.npv,
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Runs every configured scenario preset.
pub fn scenarios(
    input: &FinancialInput,
    config: &FinanceConfig,
) -> Result<Vec<ScenarioOutcome>, InvalidFinancialInput> {
    let adjustments: Vec<InputAdjustment> =
        config.scenarios.iter().map(|p| p.adjustment).collect();
    let analyses = sweep(input, &adjustments, &config.irr)?;
    Ok(config
        .scenarios
        .iter()
        .zip(analyses)
        .map(|(ScenarioPreset { kind, adjustment }, analysis)| ScenarioOutcome {
            kind: *kind,
            adjustment: *adjustment,
            analysis,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::tests::reference_input;

    #[test]
    fn test_identity_is_exact_copy() {
        let input = reference_input();
        assert_eq!(apply(&input, &InputAdjustment::identity()), input);
    }

    #[test]
    fn test_apply_scales_relative_rates() {
        let input = reference_input();
        let adjusted = apply(&input, &perturb(SensitivityParameter::EnergyInflation, 0.2));
        assert!((adjusted.energy_inflation - 0.054).abs() < 1e-12);
        assert_eq!(adjusted.tariff, input.tariff);
    }

    #[test]
    fn test_npv_rises_with_tariff_and_falls_with_discount_rate() {
        let input = reference_input();
        let config = FinanceConfig::default();
        let series = sensitivity(&input, &config).unwrap();

        let tariff = &series[0];
        assert_eq!(tariff.parameter, SensitivityParameter::Tariff);
        assert!(tariff.points.windows(2).all(|w| w[1].npv > w[0].npv));

        let discount = series
            .iter()
            .find(|s| s.parameter == SensitivityParameter::DiscountRate)
            .unwrap();
        assert!(discount.points.windows(2).all(|w| w[1].npv < w[0].npv));
    }

    #[test]
    fn test_zero_perturbation_is_included_once() {
        let config = FinanceConfig::default();
        let points = perturbation_points(&config);
        assert_eq!(points.iter().filter(|p| **p == 0.0).count(), 1);
        assert!(points.windows(2).all(|w| w[0] < w[1]));
    }
}
