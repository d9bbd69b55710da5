//! Module count from a fixed quantity or an annual consumption target.

use pv_model::{PvModule, SizingRequest};
use tracing::debug;

use crate::error::InvalidSizingInput;

const DAYS_PER_YEAR: f64 = 365.0;

/// Sizes the array for one module type.
#[derive(Debug, Clone, Copy)]
pub struct SystemSizer<'a> {
    module: &'a PvModule,
}

impl<'a> SystemSizer<'a> {
    pub fn new(module: &'a PvModule) -> Self {
        Self { module }
    }

    /// Number of modules satisfying the request.
    ///
    /// A consumption target is converted to a daily demand, divided by the
    /// effective daily yield per kWp and rounded up to whole modules.
    pub fn size(&self, request: &SizingRequest) -> Result<u32, InvalidSizingInput> {
        match request {
            SizingRequest::FixedCount { module_count } => {
                if *module_count == 0 {
                    return Err(InvalidSizingInput::new("module_count", "must be at least 1"));
                }
                Ok(*module_count)
            }
            SizingRequest::ConsumptionTarget {
                annual_consumption_kwh,
                site_irradiance_kwh_m2_day,
                system_efficiency_pct,
            } => self.size_for_consumption(
                *annual_consumption_kwh,
                *site_irradiance_kwh_m2_day,
                *system_efficiency_pct,
            ),
        }
    }

    pub fn peak_power_kwp(&self, module_count: u32) -> f64 {
        f64::from(module_count) * self.module.power_w / 1000.0
    }

    fn size_for_consumption(
        &self,
        annual_consumption_kwh: f64,
        irradiance_kwh_m2_day: f64,
        efficiency_pct: f64,
    ) -> Result<u32, InvalidSizingInput> {
        if !annual_consumption_kwh.is_finite() || annual_consumption_kwh < 0.0 {
            return Err(InvalidSizingInput::new(
                "annual_consumption_kwh",
                format!("must be a non-negative number, got {annual_consumption_kwh}"),
            ));
        }
        if !irradiance_kwh_m2_day.is_finite() || irradiance_kwh_m2_day <= 0.0 {
            return Err(InvalidSizingInput::new(
                "site_irradiance_kwh_m2_day",
                format!("must be positive, got {irradiance_kwh_m2_day}"),
            ));
        }
        if !efficiency_pct.is_finite() || efficiency_pct <= 0.0 {
            return Err(InvalidSizingInput::new(
                "system_efficiency_pct",
                format!("must be positive, got {efficiency_pct}"),
            ));
        }
        let power_w = self.module.power_w;
        if !power_w.is_finite() || power_w <= 0.0 {
            return Err(InvalidSizingInput::new(
                "module.power_w",
                format!("module `{}` has no usable power rating ({power_w})", self.module.id),
            ));
        }

        let daily_kwh = annual_consumption_kwh / DAYS_PER_YEAR;
        let effective_sun_hours = irradiance_kwh_m2_day * efficiency_pct / 100.0;
        let required_kwp = daily_kwh / effective_sun_hours;
        let count = (required_kwp * 1000.0 / power_w).ceil();

        debug!(
            daily_kwh,
            effective_sun_hours,
            required_kwp,
            module_count = count,
            "sized array for consumption target"
        );
        if count > f64::from(u32::MAX) {
            return Err(InvalidSizingInput::new(
                "annual_consumption_kwh",
                "target needs more modules than can be represented",
            ));
        }
        Ok(count as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::tests::module_450;

    fn target(annual: f64, irradiance: f64, efficiency: f64) -> SizingRequest {
        SizingRequest::ConsumptionTarget {
            annual_consumption_kwh: annual,
            site_irradiance_kwh_m2_day: irradiance,
            system_efficiency_pct: efficiency,
        }
    }

    #[test]
    fn test_fixed_count_passes_through() {
        let module = module_450();
        let sizer = SystemSizer::new(&module);
        assert_eq!(sizer.size(&SizingRequest::FixedCount { module_count: 14 }), Ok(14));
    }

    #[test]
    fn test_zero_fixed_count_is_rejected() {
        let module = module_450();
        let sizer = SystemSizer::new(&module);
        let err = sizer.size(&SizingRequest::FixedCount { module_count: 0 }).unwrap_err();
        assert_eq!(err.field, "module_count");
    }

    #[test]
    fn test_consumption_target() {
        // 5475 kWh/yr = 15 kWh/day; 5 h * 80% = 4 h effective -> 3.75 kWp
        // 3750 W / 450 W = 8.33 -> 9 modules
        let module = module_450();
        let sizer = SystemSizer::new(&module);
        assert_eq!(sizer.size(&target(5475.0, 5.0, 80.0)), Ok(9));
        assert!((sizer.peak_power_kwp(9) - 4.05).abs() < 1e-9);
    }

    #[test]
    fn test_zero_consumption_needs_no_modules() {
        let module = module_450();
        let sizer = SystemSizer::new(&module);
        assert_eq!(sizer.size(&target(0.0, 5.0, 80.0)), Ok(0));
    }

    #[test]
    fn test_invalid_target_inputs() {
        let module = module_450();
        let sizer = SystemSizer::new(&module);
        let cases = [
            (target(5000.0, 0.0, 80.0), "site_irradiance_kwh_m2_day"),
            (target(5000.0, 5.0, 0.0), "system_efficiency_pct"),
            (target(-1.0, 5.0, 80.0), "annual_consumption_kwh"),
            (target(f64::NAN, 5.0, 80.0), "annual_consumption_kwh"),
        ];
        for (request, field) in cases {
            assert_eq!(sizer.size(&request).unwrap_err().field, field);
        }
    }

    #[test]
    fn test_module_without_power_is_rejected() {
        let mut module = module_450();
        module.power_w = 0.0;
        let sizer = SystemSizer::new(&module);
        let err = sizer.size(&target(5000.0, 5.0, 80.0)).unwrap_err();
        assert_eq!(err.field, "module.power_w");
    }
}
