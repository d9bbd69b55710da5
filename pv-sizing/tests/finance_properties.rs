use pv_model::{FinancialInput, PhaseInStep, ScenarioKind, WireCharge};
use pv_sizing::FinancialEngine;
use pv_sizing::finance::{cashflow, metrics};

fn reference() -> FinancialInput {
    FinancialInput {
        initial_investment: 50_000.0,
        monthly_generation_kwh: vec![500.0; 12],
        monthly_consumption_kwh: vec![400.0; 12],
        tariff: 0.80,
        wire_charge: WireCharge::fixed(0.30),
        lifetime_years: 25,
        discount_rate: 0.08,
        energy_inflation: 0.045,
        degradation_rate: 0.005,
        om_cost_year1: 500.0,
        om_inflation: 0.04,
        load_growth: 0.0,
    }
}

#[test]
fn test_reference_case_recovers_investment() {
    let result = FinancialEngine::default().evaluate(&reference()).unwrap();
    let analysis = &result.analysis;
    assert!(analysis.npv > 0.0);
    let payback = analysis.simple_payback_years.unwrap();
    assert!((10.0..11.0).contains(&payback));

    let generation: Vec<f64> = analysis.years[1..].iter().map(|y| y.generation_kwh).collect();
    assert!(generation.windows(2).all(|w| w[1] < w[0]));
}

#[test]
fn test_losing_investment_has_no_payback() {
    let input = FinancialInput {
        tariff: 0.01,
        om_cost_year1: 400.0,
        ..reference()
    };
    let analysis = FinancialEngine::default().analyze(&input).unwrap();
    assert!(analysis.years[1..].iter().all(|y| y.net_cash_flow < 0.0));
    assert!(analysis.npv < 0.0);
    assert_eq!(analysis.simple_payback_years, None);
    assert_eq!(analysis.irr, None);
}

#[test]
fn test_lcoe_without_discounting() {
    let input = FinancialInput {
        initial_investment: 10_000.0,
        monthly_generation_kwh: vec![1000.0; 12],
        lifetime_years: 10,
        discount_rate: 0.0,
        degradation_rate: 0.0,
        om_cost_year1: 100.0,
        om_inflation: 0.0,
        ..reference()
    };
    let analysis = FinancialEngine::default().analyze(&input).unwrap();
    let expected = (10_000.0 + 1_000.0) / 120_000.0;
    assert!((analysis.lcoe.unwrap() - expected).abs() < 1e-12);
}

#[test]
fn test_phase_in_lowers_value_versus_no_charge() {
    let free = FinancialInput {
        wire_charge: WireCharge::fixed(0.0),
        ..reference()
    };
    let phased = FinancialInput {
        wire_charge: WireCharge::phase_in(vec![
            PhaseInStep { from_year: 1, fraction: 0.0 },
            PhaseInStep { from_year: 4, fraction: 0.5 },
        ]),
        ..reference()
    };
    let engine = FinancialEngine::default();
    let free_npv = engine.analyze(&free).unwrap().npv;
    let phased = engine.analyze(&phased).unwrap();
    assert!(phased.npv < free_npv);
    assert_eq!(
        phased.years[3].energy_savings,
        engine.analyze(&free).unwrap().years[3].energy_savings
    );
}

#[test]
fn test_base_scenario_is_exact() {
    let input = reference();
    let result = FinancialEngine::default().evaluate(&input).unwrap();
    let base = result.scenario(ScenarioKind::Base).unwrap();
    assert!(base.adjustment.is_identity());
    assert_eq!(base.analysis, result.analysis);
}

#[test]
fn test_ledger_and_metrics_agree() {
    let input = reference();
    let ledger = cashflow::build_ledger(&input);
    let flows: Vec<f64> = ledger.iter().map(|y| y.net_cash_flow).collect();
    let npv = metrics::npv(input.discount_rate, &flows);
    let last = ledger.last().unwrap();
    assert!((npv - last.cumulative_discounted_cash_flow).abs() < 1e-6);
}
