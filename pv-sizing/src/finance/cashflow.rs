//! Input validation and the yearly cash-flow ledger.

use pv_model::{CashFlowYear, FinancialInput, MONTHS};

use crate::error::InvalidFinancialInput;

/// Rejects inputs that would make any metric meaningless.
pub fn validate(input: &FinancialInput) -> Result<(), InvalidFinancialInput> {
    let investment = input.initial_investment;
    if !investment.is_finite() || investment <= 0.0 {
        return Err(InvalidFinancialInput::new(
            "initial_investment",
            format!("must be a positive amount, got {investment}"),
        ));
    }
    check_monthly("monthly_generation_kwh", &input.monthly_generation_kwh)?;
    check_monthly("monthly_consumption_kwh", &input.monthly_consumption_kwh)?;
    if input.monthly_generation_kwh.iter().all(|v| *v == 0.0) {
        return Err(InvalidFinancialInput::new(
            "monthly_generation_kwh",
            "the system generates nothing",
        ));
    }
    if input.lifetime_years == 0 {
        return Err(InvalidFinancialInput::new("lifetime_years", "must be at least one year"));
    }
    if !input.tariff.is_finite() || input.tariff < 0.0 {
        return Err(InvalidFinancialInput::new(
            "tariff",
            format!("must be non-negative, got {}", input.tariff),
        ));
    }
    if !input.wire_charge.is_valid() {
        return Err(InvalidFinancialInput::new(
            "wire_charge",
            "fractions must lie within [0, 1] and phase-in years must increase from year 1",
        ));
    }
    check_rate("discount_rate", input.discount_rate)?;
    check_rate("energy_inflation", input.energy_inflation)?;
    check_rate("om_inflation", input.om_inflation)?;
    check_rate("load_growth", input.load_growth)?;
    let degradation = input.degradation_rate;
    if !degradation.is_finite() || !(0.0..1.0).contains(&degradation) {
        return Err(InvalidFinancialInput::new(
            "degradation_rate",
            format!("must lie within [0, 1), got {degradation}"),
        ));
    }
    if !input.om_cost_year1.is_finite() || input.om_cost_year1 < 0.0 {
        return Err(InvalidFinancialInput::new(
            "om_cost_year1",
            format!("must be non-negative, got {}", input.om_cost_year1),
        ));
    }
    Ok(())
}

fn check_monthly(field: &'static str, values: &[f64]) -> Result<(), InvalidFinancialInput> {
    if values.len() != MONTHS {
        return Err(InvalidFinancialInput::new(
            field,
            format!("expected {MONTHS} monthly values, got {}", values.len()),
        ));
    }
    if let Some((month, value)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(InvalidFinancialInput::new(
            field,
            format!("month {} holds {value}", month + 1),
        ));
    }
    Ok(())
}

/// Growth and discount rates must keep `1 + rate` positive.
fn check_rate(field: &'static str, rate: f64) -> Result<(), InvalidFinancialInput> {
    if !rate.is_finite() || rate <= -1.0 {
        return Err(InvalidFinancialInput::new(
            field,
            format!("must be greater than -1, got {rate}"),
        ));
    }
    Ok(())
}

/// Builds the ledger for years `0..=lifetime`. Year 0 carries the investment.
///
/// Expects an input that passed [`validate`].
pub fn build_ledger(input: &FinancialInput) -> Vec<CashFlowYear> {
    let generation_year1: f64 = input.monthly_generation_kwh.iter().sum();
    let consumption_year1: f64 = input.monthly_consumption_kwh.iter().sum();
    let investment = input.initial_investment;

    let mut years = Vec::with_capacity(input.lifetime_years as usize + 1);
    years.push(CashFlowYear {
        year: 0,
        generation_kwh: 0.0,
        consumption_kwh: 0.0,
        tariff: 0.0,
        energy_savings: 0.0,
        om_cost: 0.0,
        net_cash_flow: -investment,
        cumulative_cash_flow: -investment,
        present_value: -investment,
        cumulative_discounted_cash_flow: -investment,
    });

    let mut cumulative = -investment;
    let mut cumulative_discounted = -investment;
    for year in 1..=input.lifetime_years {
        let elapsed = f64::from(year - 1);
        let generation = generation_year1 * (1.0 - input.degradation_rate).powf(elapsed);
        let consumption = consumption_year1 * (1.0 + input.load_growth).powf(elapsed);
        let tariff = input.tariff * (1.0 + input.energy_inflation).powf(elapsed);

        let self_consumed = generation.min(consumption);
        let injected = (generation - consumption).max(0.0);
        let wire_fraction = input.wire_charge.fraction_for_year(year);
        let energy_savings = self_consumed * tariff + injected * (tariff - wire_fraction * tariff);

        let om_cost = input.om_cost_year1 * (1.0 + input.om_inflation).powf(elapsed);
        let net_cash_flow = energy_savings - om_cost;
        let present_value = net_cash_flow / (1.0 + input.discount_rate).powf(f64::from(year));
        cumulative += net_cash_flow;
        cumulative_discounted += present_value;

        years.push(CashFlowYear {
            year,
            generation_kwh: generation,
            consumption_kwh: consumption,
            tariff,
            energy_savings,
            om_cost,
            net_cash_flow,
            cumulative_cash_flow: cumulative,
            present_value,
            cumulative_discounted_cash_flow: cumulative_discounted,
        });
    }
    years
}
