//! Project files: one installation described in TOML.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use pv_model::{Inverter, MpptChannel, PvModule, Site, SizingRequest, WireCharge};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, EquipmentList, InMemoryCatalog};
use crate::consumption::MonthlyProfile;
use crate::error::{ConfigError, UnknownEquipment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectFile {
    pub site: Site,
    pub module_id: String,
    pub inverter_id: String,
    /// Equipment catalog file, relative to the project file.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Project-local records; they replace catalog entries with the same id.
    #[serde(default)]
    pub equipment: EquipmentList,
    #[serde(default = "default_quantity")]
    pub inverter_quantity: u32,
    pub orientations: Vec<OrientationSpec>,
    /// When present, the sized module total replaces the per-orientation counts.
    #[serde(default)]
    pub sizing: Option<SizingRequest>,
    #[serde(default)]
    pub losses: LossSettings,
    pub finance: FinanceSettings,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrientationSpec {
    pub name: String,
    pub azimuth_deg: f64,
    pub tilt_deg: f64,
    #[serde(default)]
    pub channel: Option<MpptChannel>,
    /// Requested module count; corrected by the allocator.
    #[serde(default)]
    pub modules: u32,
}

/// Loss and estimator settings forwarded with each estimate request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LossSettings {
    pub total_loss_pct: f64,
    pub safety_margin: f64,
    pub decomposition_model: Option<String>,
    pub transposition_model: Option<String>,
}

impl Default for LossSettings {
    fn default() -> Self {
        Self {
            total_loss_pct: 14.0,
            safety_margin: 1.1,
            decomposition_model: None,
            transposition_model: None,
        }
    }
}

/// Financial assumptions; generation comes from the yield estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinanceSettings {
    pub initial_investment: f64,
    pub tariff: f64,
    pub wire_charge: WireCharge,
    pub lifetime_years: u32,
    pub discount_rate: f64,
    pub energy_inflation: f64,
    pub degradation_rate: f64,
    pub om_cost_year1: f64,
    pub om_inflation: f64,
    #[serde(default)]
    pub load_growth: f64,
    /// CSV or spreadsheet with twelve monthly values, relative to the project file.
    #[serde(default)]
    pub consumption_profile: Option<PathBuf>,
    #[serde(default)]
    pub monthly_consumption_kwh: Option<Vec<f64>>,
    #[serde(default)]
    pub annual_consumption_kwh: Option<f64>,
}

impl FinanceSettings {
    /// Resolves the consumption profile; relative paths start at `base_dir`.
    pub fn consumption(&self, base_dir: &Path) -> anyhow::Result<MonthlyProfile> {
        match (
            &self.consumption_profile,
            &self.monthly_consumption_kwh,
            self.annual_consumption_kwh,
        ) {
            (Some(path), None, None) => {
                let path = base_dir.join(path);
                MonthlyProfile::load(&path).with_context(|| {
                    format!("Failed to load consumption profile {}", path.display())
                })
            }
            (None, Some(monthly), None) => MonthlyProfile::new(monthly.clone()),
            (None, None, Some(annual)) => MonthlyProfile::flat(annual),
            _ => bail!(
                "exactly one of consumption_profile, monthly_consumption_kwh or \
                 annual_consumption_kwh must be set"
            ),
        }
    }
}

impl ProjectFile {
    /// Builds the catalog this project resolves its equipment against.
    pub fn catalog(&self, base_dir: &Path) -> anyhow::Result<InMemoryCatalog> {
        let mut catalog = match &self.catalog {
            Some(path) => {
                let path = base_dir.join(path);
                InMemoryCatalog::from_toml_file(&path)
                    .with_context(|| format!("Failed to load catalog {}", path.display()))?
            }
            None => InMemoryCatalog::new(),
        };
        catalog.extend(self.equipment.clone());
        Ok(catalog)
    }

    /// Looks up the selected module and inverter.
    pub fn resolve_equipment<'c, C>(
        &self,
        catalog: &'c C,
    ) -> Result<(&'c PvModule, &'c Inverter), UnknownEquipment>
    where
        C: Catalog + ?Sized,
    {
        let module = catalog.require_module(&self.module_id)?;
        let inverter = catalog.require_inverter(&self.inverter_id)?;
        Ok((module, inverter))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Validates all fields and returns every violation found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let coordinates = &self.site.coordinates;
        if !(-90.0..=90.0).contains(&coordinates.latitude) {
            errors.push(ConfigError::invalid(
                "site.coordinates.latitude",
                "must be within [-90, 90]",
            ));
        }
        if !(-180.0..=180.0).contains(&coordinates.longitude) {
            errors.push(ConfigError::invalid(
                "site.coordinates.longitude",
                "must be within [-180, 180]",
            ));
        }
        let irradiance = self.site.irradiance_kwh_m2_day;
        if !(irradiance.is_finite() && irradiance > 0.0) {
            errors.push(ConfigError::invalid(
                "site.irradiance_kwh_m2_day",
                "must be > 0",
            ));
        }

        if self.module_id.trim().is_empty() {
            errors.push(ConfigError::invalid("module_id", "must not be empty"));
        }
        if self.inverter_id.trim().is_empty() {
            errors.push(ConfigError::invalid("inverter_id", "must not be empty"));
        }
        if self.inverter_quantity == 0 {
            errors.push(ConfigError::invalid("inverter_quantity", "must be > 0"));
        }
        if self.orientations.is_empty() {
            errors.push(ConfigError::invalid(
                "orientations",
                "at least one orientation is required",
            ));
        }
        let mut names = HashSet::new();
        for o in &self.orientations {
            if !names.insert(o.name.as_str()) {
                errors.push(ConfigError::invalid(
                    format!("orientations.{}", o.name),
                    "duplicate orientation name",
                ));
            }
        }

        let l = &self.losses;
        if !(0.0..100.0).contains(&l.total_loss_pct) {
            errors.push(ConfigError::invalid(
                "losses.total_loss_pct",
                "must be within [0, 100)",
            ));
        }
        if !(l.safety_margin.is_finite() && l.safety_margin > 0.0) {
            errors.push(ConfigError::invalid("losses.safety_margin", "must be > 0"));
        }

        let f = &self.finance;
        let sources = [
            f.consumption_profile.is_some(),
            f.monthly_consumption_kwh.is_some(),
            f.annual_consumption_kwh.is_some(),
        ];
        if sources.iter().filter(|set| **set).count() != 1 {
            errors.push(ConfigError::invalid(
                "finance",
                "set exactly one of consumption_profile, monthly_consumption_kwh, \
                 annual_consumption_kwh",
            ));
        }

        errors
    }

    /// Requested count per orientation, in file order.
    ///
    /// With a sizing total, modules are split evenly and the remainder goes
    /// to the first orientations.
    pub fn requested_counts(&self, sized_total: Option<u32>) -> Vec<u32> {
        match sized_total {
            None => self.orientations.iter().map(|o| o.modules).collect(),
            Some(total) => {
                let n = self.orientations.len() as u32;
                if n == 0 {
                    return Vec::new();
                }
                (0..n)
                    .map(|i| total / n + u32::from(i < total % n))
                    .collect()
            }
        }
    }
}
