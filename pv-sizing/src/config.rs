//! Engine tunables: design temperatures, preview defaults, fallback ceilings,
//! sensitivity perturbations, scenario presets and IRR solver settings.
//!
//! All fields have defaults for a typical residential design. Load overrides
//! from TOML with [`EngineConfig::from_toml_file`].

use std::fs;
use std::path::Path;

use pv_model::{InputAdjustment, Inverter, NetworkType, PvModule, ScenarioKind};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub compatibility: CompatibilityConfig,
    pub allocation: AllocationConfig,
    pub finance: FinanceConfig,
}

/// Design temperatures and the equipment classes used for previews.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompatibilityConfig {
    pub reference_temp_c: f64,   // STC cell temperature
    pub min_ambient_temp_c: f64, // coldest expected morning, drives max Voc
    pub max_cell_temp_c: f64,    // hottest expected cell, drives min Voc
    /// Module class assumed when a preview has no module selected.
    pub preview_module: PvModule,
    /// Inverter class assumed when a preview has no inverter selected.
    pub preview_inverter: Inverter,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            reference_temp_c: 25.0,
            min_ambient_temp_c: -10.0,
            max_cell_temp_c: 70.0,
            preview_module: PvModule {
                id: "preview-module".to_string(),
                model: "Generic 550 W mono".to_string(),
                power_w: 550.0,
                voc_v: Some(49.6),
                temp_coefficient_voc_pct: Some(-0.28),
                isc_a: Some(14.0),
                cell_count: 144,
                area_m2: Some(2.58),
            },
            preview_inverter: Inverter {
                id: "preview-inverter".to_string(),
                model: "Generic 5 kW string".to_string(),
                rated_ac_power_w: 5000.0,
                max_pv_power_w: 7500.0,
                max_input_current_a: Some(16.0),
                mppt_count: 2,
                strings_per_mppt: 1,
                mppt_min_voltage_v: Some(90.0),
                mppt_max_voltage_v: Some(550.0),
                network_type: NetworkType::SinglePhase,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationConfig {
    /// Ceiling for orientations that are not bound to an MPPT channel yet.
    pub fallback_max_modules: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            fallback_max_modules: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioPreset {
    pub kind: ScenarioKind,
    pub adjustment: InputAdjustment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IrrSolverConfig {
    pub initial_guess: f64,
    pub lower_rate: f64,
    pub upper_rate: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for IrrSolverConfig {
    fn default() -> Self {
        Self {
            initial_guess: 0.1,
            lower_rate: -0.99,
            upper_rate: 10.0,
            tolerance: 1e-9,
            max_iterations: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinanceConfig {
    /// Relative perturbations for the sensitivity table (0.1 = +10%).
    pub perturbations: Vec<f64>,
    pub scenarios: Vec<ScenarioPreset>,
    pub irr: IrrSolverConfig,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        let identity = InputAdjustment::identity();
        Self {
            perturbations: vec![-0.20, -0.15, -0.10, -0.05, 0.05, 0.10, 0.15, 0.20],
            scenarios: vec![
                ScenarioPreset {
                    kind: ScenarioKind::Base,
                    adjustment: identity,
                },
                ScenarioPreset {
                    kind: ScenarioKind::Optimistic,
                    adjustment: InputAdjustment {
                        generation: 1.05,
                        energy_inflation: 1.25,
                        om_inflation: 0.75,
                        ..identity
                    },
                },
                ScenarioPreset {
                    kind: ScenarioKind::Conservative,
                    adjustment: InputAdjustment {
                        generation: 0.95,
                        energy_inflation: 0.8,
                        om_inflation: 1.25,
                        ..identity
                    },
                },
                ScenarioPreset {
                    kind: ScenarioKind::Pessimistic,
                    adjustment: InputAdjustment {
                        generation: 0.9,
                        tariff: 0.95,
                        energy_inflation: 0.6,
                        om_cost: 1.1,
                        om_inflation: 1.5,
                        ..identity
                    },
                },
            ],
            irr: IrrSolverConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a config from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a config from a TOML string; missing sections keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Validates all fields and returns every violation found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let c = &self.compatibility;
        if !(c.min_ambient_temp_c < c.reference_temp_c) {
            errors.push(ConfigError::invalid(
                "compatibility.min_ambient_temp_c",
                "must be below compatibility.reference_temp_c",
            ));
        }
        if !(c.max_cell_temp_c > c.reference_temp_c) {
            errors.push(ConfigError::invalid(
                "compatibility.max_cell_temp_c",
                "must be above compatibility.reference_temp_c",
            ));
        }

        if self.allocation.fallback_max_modules == 0 {
            errors.push(ConfigError::invalid(
                "allocation.fallback_max_modules",
                "must be > 0",
            ));
        }

        let f = &self.finance;
        if f.perturbations.iter().any(|p| !p.is_finite() || *p <= -1.0) {
            errors.push(ConfigError::invalid(
                "finance.perturbations",
                "every perturbation must be finite and > -1.0",
            ));
        }
        for kind in ScenarioKind::all() {
            let count = f.scenarios.iter().filter(|s| s.kind == *kind).count();
            if count != 1 {
                errors.push(ConfigError::invalid(
                    "finance.scenarios",
                    format!("expected exactly one `{}` preset, found {count}", kind.name()),
                ));
            }
        }
        for preset in &f.scenarios {
            let a = &preset.adjustment;
            let multipliers = [
                a.generation,
                a.tariff,
                a.energy_inflation,
                a.discount_rate,
                a.om_cost,
                a.om_inflation,
            ];
            if multipliers.iter().any(|m| !m.is_finite() || *m < 0.0) {
                errors.push(ConfigError::invalid(
                    format!("finance.scenarios.{}", preset.kind.name()),
                    "multipliers must be finite and >= 0",
                ));
            }
        }

        let irr = &f.irr;
        if irr.lower_rate <= -1.0 || irr.lower_rate >= irr.upper_rate {
            errors.push(ConfigError::invalid(
                "finance.irr.lower_rate",
                "must be > -1.0 and below finance.irr.upper_rate",
            ));
        }
        if !(irr.tolerance > 0.0) {
            errors.push(ConfigError::invalid("finance.irr.tolerance", "must be > 0"));
        }
        if irr.max_iterations == 0 {
            errors.push(ConfigError::invalid(
                "finance.irr.max_iterations",
                "must be > 0",
            ));
        }

        errors
    }
}
