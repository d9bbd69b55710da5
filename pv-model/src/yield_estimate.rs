use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Loss buckets reported by the yield estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./yield_estimate.ts")]
#[serde(rename_all = "snake_case")]
pub enum LossCategory {
    Temperature,
    Shading,
    Soiling,
    Mismatch,
    Cabling,
    Inverter,
    Other,
}

impl LossCategory {
    pub fn all() -> &'static [LossCategory] {
        &[
            LossCategory::Temperature,
            LossCategory::Shading,
            LossCategory::Soiling,
            LossCategory::Mismatch,
            LossCategory::Cabling,
            LossCategory::Inverter,
            LossCategory::Other,
        ]
    }
}

/// Energy lost in one month, per category, in kWh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./yield_estimate.ts")]
pub struct MonthlyLosses {
    pub temperature: f64,
    pub shading: f64,
    pub soiling: f64,
    pub mismatch: f64,
    pub cabling: f64,
    pub inverter: f64,
    pub other: f64,
}

impl MonthlyLosses {
    pub fn get(&self, category: LossCategory) -> f64 {
        match category {
            LossCategory::Temperature => self.temperature,
            LossCategory::Shading => self.shading,
            LossCategory::Soiling => self.soiling,
            LossCategory::Mismatch => self.mismatch,
            LossCategory::Cabling => self.cabling,
            LossCategory::Inverter => self.inverter,
            LossCategory::Other => self.other,
        }
    }

    pub fn total(&self) -> f64 {
        LossCategory::all().iter().map(|c| self.get(*c)).sum()
    }
}

/// Aggregate output of the external yield estimator for the whole array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./yield_estimate.ts")]
pub struct YieldEstimate {
    pub annual_energy_kwh: f64,
    pub required_area_m2: f64,
    pub daily_average_kwh: f64,
    pub performance_ratio: f64,
    /// kWh per installed kWp and year.
    pub specific_yield_kwh_kwp: f64,
    pub capacity_factor: f64,
    /// Twelve monthly energy values in kWh; empty when the estimator only
    /// reports annual totals.
    #[serde(default)]
    pub monthly_energy_kwh: Vec<f64>,
    /// Twelve monthly loss breakdowns, January first.
    pub monthly_losses: Vec<MonthlyLosses>,
}

impl YieldEstimate {
    /// Monthly energy, spreading the annual total evenly when the estimator
    /// did not report months.
    pub fn monthly_energy_or_flat(&self) -> Vec<f64> {
        if self.monthly_energy_kwh.len() == crate::MONTHS {
            self.monthly_energy_kwh.clone()
        } else {
            vec![self.annual_energy_kwh / crate::MONTHS as f64; crate::MONTHS]
        }
    }

    /// Annual loss per category in kWh.
    pub fn annual_loss(&self, category: LossCategory) -> f64 {
        self.monthly_losses.iter().map(|m| m.get(category)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(monthly: Vec<f64>) -> YieldEstimate {
        YieldEstimate {
            annual_energy_kwh: 1200.0,
            required_area_m2: 10.0,
            daily_average_kwh: 1200.0 / 365.0,
            performance_ratio: 0.8,
            specific_yield_kwh_kwp: 1500.0,
            capacity_factor: 0.17,
            monthly_energy_kwh: monthly,
            monthly_losses: vec![
                MonthlyLosses {
                    temperature: 2.0,
                    soiling: 1.0,
                    ..MonthlyLosses::default()
                };
                12
            ],
        }
    }

    #[test]
    fn test_flat_months_when_missing() {
        let e = estimate(Vec::new());
        assert_eq!(e.monthly_energy_or_flat(), vec![100.0; 12]);
    }

    #[test]
    fn test_reported_months_are_kept() {
        let months: Vec<f64> = (1..=12).map(|m| m as f64 * 10.0).collect();
        let e = estimate(months.clone());
        assert_eq!(e.monthly_energy_or_flat(), months);
    }

    #[test]
    fn test_annual_loss_sums_months() {
        let e = estimate(Vec::new());
        assert_eq!(e.annual_loss(LossCategory::Temperature), 24.0);
        assert_eq!(e.monthly_losses[0].total(), 3.0);
    }
}
