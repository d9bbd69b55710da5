//! Result of a full project run and its text rendering.

use std::fmt;

use pv_model::{FinancialResult, Orientation, YieldEstimate};
use serde::Serialize;

use crate::allocation::{BalancingCorrection, CapacityClamp};
use crate::compatibility::MpptCapacity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrientationMonthly {
    pub name: String,
    pub monthly_kwh: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectReport {
    pub project: String,
    pub module_count: u32,
    pub peak_power_kwp: f64,
    pub capacity: MpptCapacity,
    pub exceeds_dc_rating: bool,
    pub orientations: Vec<Orientation>,
    pub monthly_by_orientation: Vec<OrientationMonthly>,
    pub clamps: Vec<CapacityClamp>,
    pub corrections: Vec<BalancingCorrection>,
    pub estimate: YieldEstimate,
    pub financial: FinancialResult,
}

fn years(value: Option<f64>) -> String {
    value.map_or_else(|| "never".to_string(), |v| format!("{v:.1} years"))
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

impl fmt::Display for MpptCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_preview {
            writeln!(f, "(preview with default equipment)")?;
        }
        writeln!(f, "Modules per string: {}", self.modules_per_string)?;
        if let Some(min) = self.min_modules_per_string {
            writeln!(f, "Min modules per string: {min}")?;
        }
        writeln!(
            f,
            "Parallel strings: {} (design {}, current limit {})",
            self.parallel_strings,
            self.strings_per_mppt,
            self.strings_by_current
                .map_or_else(|| "unknown".to_string(), |s| s.to_string())
        )?;
        writeln!(f, "Max modules per MPPT: {}", self.max_modules_per_mppt)?;
        if let Some(dc) = self.max_modules_by_dc_power {
            writeln!(f, "Max modules per inverter (DC rating): {dc}")?;
        }
        if !self.is_feasible() {
            writeln!(f, "WARNING: module and inverter are not compatible")?;
        }
        Ok(())
    }
}

impl fmt::Display for ProjectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.project)?;
        writeln!(
            f,
            "Array: {} modules, {:.2} kWp",
            self.module_count, self.peak_power_kwp
        )?;
        write!(f, "{}", self.capacity)?;
        if self.exceeds_dc_rating {
            writeln!(f, "WARNING: array exceeds the inverter DC rating")?;
        }

        writeln!(f)?;
        writeln!(f, "Orientations:")?;
        for o in &self.orientations {
            let channel = o
                .channel
                .map_or_else(|| "unassigned".to_string(), |c| c.to_string());
            writeln!(
                f,
                "  {:<12} az {:>5.1} tilt {:>4.1}  {:>3} modules  {:>9.1} kWh/yr  [{}]",
                o.name,
                o.azimuth_deg,
                o.tilt_deg,
                o.module_count,
                o.annual_generation_kwh.unwrap_or(0.0),
                channel
            )?;
        }
        for c in &self.clamps {
            writeln!(
                f,
                "  {}: {} modules requested, capped at {}",
                c.orientation_name, c.requested, c.ceiling
            )?;
        }
        for c in &self.corrections {
            writeln!(
                f,
                "  {}: {} -> {} modules ({} strings of {})",
                c.orientation_name,
                c.requested,
                c.corrected,
                c.strings_per_mppt,
                c.modules_per_string
            )?;
        }

        let e = &self.estimate;
        writeln!(f)?;
        writeln!(f, "Annual energy: {:.0} kWh", e.annual_energy_kwh)?;
        writeln!(f, "Specific yield: {:.0} kWh/kWp", e.specific_yield_kwh_kwp)?;
        writeln!(f, "Performance ratio: {:.2}", e.performance_ratio)?;
        writeln!(f, "Required area: {:.1} m²", e.required_area_m2)?;

        let a = &self.financial.analysis;
        writeln!(f)?;
        writeln!(f, "NPV: {:.2}", a.npv)?;
        writeln!(f, "IRR: {}", percent(a.irr))?;
        writeln!(f, "Simple payback: {}", years(a.simple_payback_years))?;
        writeln!(f, "Discounted payback: {}", years(a.discounted_payback_years))?;
        writeln!(f, "Profitability index: {:.2}", a.profitability_index)?;
        match a.lcoe {
            Some(lcoe) => writeln!(f, "LCOE: {lcoe:.4} per kWh")?,
            None => writeln!(f, "LCOE: n/a")?,
        }

        writeln!(f)?;
        writeln!(f, "Scenarios:")?;
        for s in &self.financial.scenarios {
            writeln!(
                f,
                "  {:<13} NPV {:>12.2}  IRR {:>8}  payback {}",
                s.kind.name(),
                s.analysis.npv,
                percent(s.analysis.irr),
                years(s.analysis.simple_payback_years)
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Sensitivity (NPV):")?;
        for series in &self.financial.sensitivity {
            let points: Vec<String> = series
                .points
                .iter()
                .map(|p| format!("{:+.0}%: {:.0}", p.perturbation * 100.0, p.npv))
                .collect();
            writeln!(f, "  {:<17} {}", series.parameter.name(), points.join("  "))?;
        }
        Ok(())
    }
}
