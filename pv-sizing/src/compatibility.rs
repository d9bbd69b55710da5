//! String sizing limits from module and inverter electrical data.

use pv_model::{Inverter, PvModule};
use serde::Serialize;
use tracing::debug;

use crate::config::CompatibilityConfig;
use crate::error::IncompleteSpecification;

/// Limits for one MPPT input of a given module/inverter pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpptCapacity {
    /// Longest string whose cold Voc stays below the MPPT maximum voltage.
    pub modules_per_string: u32,
    /// Shortest string whose hot Voc stays above the MPPT minimum voltage.
    pub min_modules_per_string: Option<u32>,
    /// Parallel strings the MPPT input accepts.
    pub strings_per_mppt: u32,
    /// Parallel strings allowed by the input current limit, if Isc is known.
    pub strings_by_current: Option<u32>,
    /// Binding number of parallel strings.
    pub parallel_strings: u32,
    pub max_modules_per_mppt: u32,
    /// Modules one inverter unit accepts before exceeding its DC power rating.
    pub max_modules_by_dc_power: Option<u32>,
    /// Computed from default equipment classes; not valid for final sizing.
    pub is_preview: bool,
}

impl MpptCapacity {
    pub fn is_feasible(&self) -> bool {
        self.max_modules_per_mppt > 0
            && self
                .min_modules_per_string
                .is_none_or(|min| min <= self.modules_per_string)
    }
}

#[derive(Debug, Clone)]
pub struct CompatibilityResolver {
    config: CompatibilityConfig,
}

impl CompatibilityResolver {
    pub fn new(config: CompatibilityConfig) -> Self {
        Self { config }
    }

    /// Voc at the minimum ambient temperature.
    pub fn cold_voc(&self, module: &PvModule) -> Result<f64, IncompleteSpecification> {
        let (voc, coefficient) = voc_and_coefficient(module)?;
        let delta = self.config.reference_temp_c - self.config.min_ambient_temp_c;
        Ok(voc * (1.0 + coefficient / 100.0 * delta))
    }

    /// Voc at the maximum cell temperature.
    pub fn hot_voc(&self, module: &PvModule) -> Result<f64, IncompleteSpecification> {
        let (voc, coefficient) = voc_and_coefficient(module)?;
        let delta = self.config.max_cell_temp_c - self.config.reference_temp_c;
        Ok(voc * (1.0 - coefficient / 100.0 * delta))
    }

    pub fn max_modules_per_string(
        &self,
        module: &PvModule,
        inverter: &Inverter,
    ) -> Result<u32, IncompleteSpecification> {
        let max_voltage = positive(inverter.mppt_max_voltage_v)
            .ok_or_else(|| missing_inverter(inverter, "mppt_max_voltage_v"))?;
        let cold_voc = self.cold_voc(module)?;
        Ok((max_voltage / cold_voc).floor() as u32)
    }

    pub fn max_modules_per_mppt(
        &self,
        module: &PvModule,
        inverter: &Inverter,
    ) -> Result<u32, IncompleteSpecification> {
        Ok(self.capacity(module, inverter)?.max_modules_per_mppt)
    }

    /// Resolves every limit for the pair; missing data is an error, never a guess.
    pub fn capacity(
        &self,
        module: &PvModule,
        inverter: &Inverter,
    ) -> Result<MpptCapacity, IncompleteSpecification> {
        let modules_per_string = self.max_modules_per_string(module, inverter)?;
        let max_current = positive(inverter.max_input_current_a)
            .ok_or_else(|| missing_inverter(inverter, "max_input_current_a"))?;

        let strings_by_current =
            positive(module.isc_a).map(|isc| (max_current / isc).floor() as u32);
        let parallel_strings = match strings_by_current {
            Some(by_current) => inverter.strings_per_mppt.min(by_current),
            None => inverter.strings_per_mppt,
        };

        let min_modules_per_string = match positive(inverter.mppt_min_voltage_v) {
            Some(min_voltage) => {
                let hot_voc = self.hot_voc(module)?;
                (hot_voc > 0.0).then(|| (min_voltage / hot_voc).ceil() as u32)
            }
            None => None,
        };

        let max_modules_by_dc_power = match (
            positive(Some(inverter.max_pv_power_w)),
            positive(Some(module.power_w)),
        ) {
            (Some(dc), Some(power)) => Some((dc / power).floor() as u32),
            _ => None,
        };

        let capacity = MpptCapacity {
            modules_per_string,
            min_modules_per_string,
            strings_per_mppt: inverter.strings_per_mppt,
            strings_by_current,
            parallel_strings,
            max_modules_per_mppt: modules_per_string * parallel_strings,
            max_modules_by_dc_power,
            is_preview: false,
        };
        debug!(
            module = %module.id,
            inverter = %inverter.id,
            modules_per_string,
            parallel_strings,
            max_modules_per_mppt = capacity.max_modules_per_mppt,
            "resolved MPPT capacity"
        );
        Ok(capacity)
    }

    /// Capacity for exploratory previews: whatever is missing or incomplete is
    /// replaced by the configured default class.
    pub fn preview_capacity(
        &self,
        module: Option<&PvModule>,
        inverter: Option<&Inverter>,
    ) -> Result<MpptCapacity, IncompleteSpecification> {
        let module = module
            .filter(|m| voc_and_coefficient(m).is_ok())
            .unwrap_or(&self.config.preview_module);
        let inverter = inverter
            .filter(|i| {
                positive(i.mppt_max_voltage_v).is_some()
                    && positive(i.max_input_current_a).is_some()
            })
            .unwrap_or(&self.config.preview_inverter);
        let mut capacity = self.capacity(module, inverter)?;
        capacity.is_preview = true;
        Ok(capacity)
    }
}

fn voc_and_coefficient(module: &PvModule) -> Result<(f64, f64), IncompleteSpecification> {
    let voc = positive(module.voc_v).ok_or_else(|| missing_module(module, "voc_v"))?;
    let coefficient = module
        .temp_coefficient_voc_pct
        .filter(|c| c.is_finite())
        .ok_or_else(|| missing_module(module, "temp_coefficient_voc_pct"))?;
    // Datasheets quote the coefficient with either sign.
    Ok((voc, coefficient.abs()))
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn missing_module(module: &PvModule, field: &'static str) -> IncompleteSpecification {
    IncompleteSpecification::new("module", module.id.clone(), field)
}

fn missing_inverter(inverter: &Inverter, field: &'static str) -> IncompleteSpecification {
    IncompleteSpecification::new("inverter", inverter.id.clone(), field)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pv_model::NetworkType;

    pub(crate) fn module_450() -> PvModule {
        PvModule {
            id: "m450".to_string(),
            model: "Test 450".to_string(),
            power_w: 450.0,
            voc_v: Some(49.5),
            temp_coefficient_voc_pct: Some(-0.27),
            isc_a: Some(11.6),
            cell_count: 144,
            area_m2: Some(2.2),
        }
    }

    pub(crate) fn inverter_8k(strings_per_mppt: u32) -> Inverter {
        Inverter {
            id: "inv8k".to_string(),
            model: "Test 8k".to_string(),
            rated_ac_power_w: 8000.0,
            max_pv_power_w: 12000.0,
            max_input_current_a: Some(26.0),
            mppt_count: 2,
            strings_per_mppt,
            mppt_min_voltage_v: Some(120.0),
            mppt_max_voltage_v: Some(600.0),
            network_type: NetworkType::ThreePhase,
        }
    }

    fn resolver() -> CompatibilityResolver {
        CompatibilityResolver::new(CompatibilityConfig::default())
    }

    #[test]
    fn test_cold_voc_rises_above_stc() {
        // 49.5 * (1 + 0.0027 * 35) = 54.17775
        let voc = resolver().cold_voc(&module_450()).unwrap();
        assert!((voc - 54.17775).abs() < 1e-9);
    }

    #[test]
    fn test_capacity_for_two_strings() {
        let capacity = resolver().capacity(&module_450(), &inverter_8k(2)).unwrap();
        // floor(600 / 54.17775) = 11
        assert_eq!(capacity.modules_per_string, 11);
        // floor(26 / 11.6) = 2
        assert_eq!(capacity.strings_by_current, Some(2));
        assert_eq!(capacity.parallel_strings, 2);
        assert_eq!(capacity.max_modules_per_mppt, 22);
        assert_eq!(capacity.max_modules_by_dc_power, Some(26));
        assert!(capacity.is_feasible());
        assert!(!capacity.is_preview);
    }

    #[test]
    fn test_current_limit_binds_before_strings_per_mppt() {
        let mut module = module_450();
        module.isc_a = Some(14.0);
        let capacity = resolver().capacity(&module, &inverter_8k(3)).unwrap();
        assert_eq!(capacity.strings_per_mppt, 3);
        assert_eq!(capacity.strings_by_current, Some(1));
        assert_eq!(capacity.max_modules_per_mppt, capacity.modules_per_string);
    }

    #[test]
    fn test_unknown_isc_uses_strings_per_mppt() {
        let mut module = module_450();
        module.isc_a = None;
        let capacity = resolver().capacity(&module, &inverter_8k(2)).unwrap();
        assert_eq!(capacity.strings_by_current, None);
        assert_eq!(capacity.parallel_strings, 2);
    }

    #[test]
    fn test_min_string_length_from_hot_voc() {
        let capacity = resolver().capacity(&module_450(), &inverter_8k(1)).unwrap();
        // hot Voc = 49.5 * (1 - 0.0027 * 45) = 43.48575, ceil(120 / 43.48575) = 3
        assert_eq!(capacity.min_modules_per_string, Some(3));
    }

    #[test]
    fn test_missing_voc_is_incomplete_specification() {
        let mut module = module_450();
        module.voc_v = None;
        let err = resolver().max_modules_per_mppt(&module, &inverter_8k(1)).unwrap_err();
        assert_eq!(err, IncompleteSpecification::new("module", "m450", "voc_v"));
    }

    #[test]
    fn test_missing_mppt_limits_are_incomplete_specification() {
        let mut inverter = inverter_8k(1);
        inverter.mppt_max_voltage_v = None;
        let err = resolver().capacity(&module_450(), &inverter).unwrap_err();
        assert_eq!(err.field, "mppt_max_voltage_v");

        let mut inverter = inverter_8k(1);
        inverter.max_input_current_a = None;
        let err = resolver().capacity(&module_450(), &inverter).unwrap_err();
        assert_eq!(err.field, "max_input_current_a");
    }

    #[test]
    fn test_missing_coefficient_is_incomplete_specification() {
        let mut module = module_450();
        module.temp_coefficient_voc_pct = None;
        let err = resolver().cold_voc(&module).unwrap_err();
        assert_eq!(err.field, "temp_coefficient_voc_pct");
    }

    #[test]
    fn test_max_per_mppt_non_increasing_in_voc() {
        let r = resolver();
        let inverter = inverter_8k(2);
        let mut previous = u32::MAX;
        for step in 0..60 {
            let mut module = module_450();
            module.voc_v = Some(30.0 + step as f64 * 0.75);
            let max = r.max_modules_per_mppt(&module, &inverter).unwrap();
            assert!(max <= previous, "voc {:?}: {max} > {previous}", module.voc_v);
            previous = max;
        }
    }

    #[test]
    fn test_max_per_mppt_non_increasing_in_coefficient_magnitude() {
        let r = resolver();
        let inverter = inverter_8k(2);
        let mut previous = u32::MAX;
        for step in 0..40 {
            let mut module = module_450();
            module.temp_coefficient_voc_pct = Some(-0.05 * step as f64);
            let max = r.max_modules_per_mppt(&module, &inverter).unwrap();
            assert!(max <= previous);
            previous = max;
        }
    }

    #[test]
    fn test_preview_falls_back_to_default_classes() {
        let r = resolver();
        let mut module = module_450();
        module.voc_v = None;
        let preview = r.preview_capacity(Some(&module), None).unwrap();
        assert!(preview.is_preview);
        let defaults = CompatibilityConfig::default();
        let direct = r
            .capacity(&defaults.preview_module, &defaults.preview_inverter)
            .unwrap();
        assert_eq!(preview.max_modules_per_mppt, direct.max_modules_per_mppt);
    }

    #[test]
    fn test_preview_keeps_complete_selection() {
        let r = resolver();
        let preview = r
            .preview_capacity(Some(&module_450()), Some(&inverter_8k(2)))
            .unwrap();
        assert!(preview.is_preview);
        assert_eq!(preview.max_modules_per_mppt, 22);
    }
}
