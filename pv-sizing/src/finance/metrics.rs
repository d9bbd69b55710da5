//! Investment metrics over a cash-flow ledger.

use pv_model::{CashFlowAnalysis, CashFlowYear, FinancialInput};
use tracing::debug;

use crate::config::IrrSolverConfig;

/// Net present value of `flows`, where `flows[t]` occurs at the end of year `t`.
pub fn npv(rate: f64, flows: &[f64]) -> f64 {
    flows
        .iter()
        .enumerate()
        .map(|(t, flow)| flow / (1.0 + rate).powi(t as i32))
        .sum()
}

/// Derivative of [`npv`] with respect to the rate.
fn npv_derivative(rate: f64, flows: &[f64]) -> f64 {
    flows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(t, flow)| -(t as f64) * flow / (1.0 + rate).powi(t as i32 + 1))
        .sum()
}

/// Internal rate of return of `flows`.
///
/// Newton's method is tried first; when it diverges or leaves the bracket the
/// root is searched by bisection over `[lower_rate, upper_rate]`. `None` when
/// the flows never change sign or no root lies in the bracket.
pub fn irr(flows: &[f64], solver: &IrrSolverConfig) -> Option<f64> {
    let has_inflow = flows.iter().any(|f| *f > 0.0);
    let has_outflow = flows.iter().any(|f| *f < 0.0);
    if !(has_inflow && has_outflow) {
        return None;
    }

    if let Some(rate) = newton_method_root_finding(flows, solver) {
        return Some(rate);
    }
    debug!("newton iteration for IRR did not converge, falling back to bisection");
    bisection_root_finding(flows, solver)
}

fn newton_method_root_finding(flows: &[f64], solver: &IrrSolverConfig) -> Option<f64> {
    let mut rate = solver.initial_guess;
    for _ in 0..solver.max_iterations {
        let value = npv(rate, flows);
        let derivative = npv_derivative(rate, flows);
        if !value.is_finite() || !derivative.is_finite() || derivative.abs() < 1e-12 {
            return None;
        }
        let step = value / derivative;
        rate -= step;
        if !(solver.lower_rate..=solver.upper_rate).contains(&rate) {
            return None;
        }
        if step.abs() < solver.tolerance {
            return Some(rate);
        }
    }
    None
}

fn bisection_root_finding(flows: &[f64], solver: &IrrSolverConfig) -> Option<f64> {
    let mut low = solver.lower_rate;
    let mut high = solver.upper_rate;
    let mut f_low = npv(low, flows);
    let f_high = npv(high, flows);
    if !f_low.is_finite() || !f_high.is_finite() || f_low.signum() == f_high.signum() {
        return None;
    }

    for _ in 0..solver.max_iterations {
        let mid = (low + high) / 2.0;
        let f_mid = npv(mid, flows);
        if f_mid == 0.0 || (high - low) / 2.0 < solver.tolerance {
            return Some(mid);
        }
        if f_low.signum() == f_mid.signum() {
            low = mid;
            f_low = f_mid;
        } else {
            high = mid;
        }
    }
    Some((low + high) / 2.0)
}

/// Years until `cumulative` first turns non-negative, interpolated linearly
/// within the year of recovery.
pub fn payback<F>(years: &[CashFlowYear], cumulative: F) -> Option<f64>
where
    F: Fn(&CashFlowYear) -> f64,
{
    years.windows(2).find_map(|pair| {
        let before = cumulative(&pair[0]);
        let after = cumulative(&pair[1]);
        if before < 0.0 && after >= 0.0 {
            let fraction = -before / (after - before);
            Some(f64::from(pair[0].year) + fraction)
        } else {
            None
        }
    })
}

/// Computes every metric for a ledger built from `input`.
pub fn analyze(
    input: &FinancialInput,
    years: Vec<CashFlowYear>,
    solver: &IrrSolverConfig,
) -> CashFlowAnalysis {
    let investment = input.initial_investment;
    let discount = |year: u32| (1.0 + input.discount_rate).powf(f64::from(year));
    let operating = years.iter().filter(|y| y.year > 0);

    let flows: Vec<f64> = years.iter().map(|y| y.net_cash_flow).collect();
    let npv_value = npv(input.discount_rate, &flows);
    let discounted_inflows: f64 = operating.clone().map(|y| y.present_value).sum();

    let total_savings_nominal = operating.clone().map(|y| y.energy_savings).sum();
    let total_savings_present_value = operating
        .clone()
        .map(|y| y.energy_savings / discount(y.year))
        .sum();

    let discounted_om: f64 = operating.clone().map(|y| y.om_cost / discount(y.year)).sum();
    let discounted_generation: f64 = operating.map(|y| y.generation_kwh / discount(y.year)).sum();
    let lcoe = (discounted_generation > 0.0)
        .then(|| (investment + discounted_om) / discounted_generation);

    CashFlowAnalysis {
        npv: npv_value,
        irr: irr(&flows, solver),
        simple_payback_years: payback(&years, |y| y.cumulative_cash_flow),
        discounted_payback_years: payback(&years, |y| y.cumulative_discounted_cash_flow),
        total_savings_nominal,
        total_savings_present_value,
        profitability_index: discounted_inflows / investment,
        lcoe,
        years,
    }
}
