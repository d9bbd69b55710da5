//! Boundary to the external yield estimator.
//!
//! The estimator itself (irradiance decomposition, transposition, loss
//! modelling) lives outside this crate. Here we define what is sent to it,
//! validate what comes back, and provide a coarse stand-in for offline use.

use std::f64::consts::PI;

use pv_model::{Coordinates, Inverter, MONTHS, MonthlyLosses, PvModule, YieldEstimate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EstimatorError, IncompleteSpecification};

const ENTITY: &str = "yield estimate";
const MID_MONTH_DAY: [u32; MONTHS] = [17, 47, 75, 105, 135, 162, 198, 228, 258, 288, 318, 344];
const DAYS_IN_MONTH: [f64; MONTHS] = [
    31.0, 28.0, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];

/// Everything the estimator needs for one array.
///
/// `decomposition_model` and `transposition_model` are opaque identifiers the
/// estimator understands; they are forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateRequest {
    pub coordinates: Coordinates,
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
    pub module: PvModule,
    pub inverter: Inverter,
    pub module_count: u32,
    /// Combined system losses in percent.
    pub total_loss_pct: f64,
    /// Multiplier on the module footprint for spacing and access paths.
    pub safety_margin: f64,
    pub decomposition_model: Option<String>,
    pub transposition_model: Option<String>,
}

impl EstimateRequest {
    pub fn peak_power_kwp(&self) -> f64 {
        f64::from(self.module_count) * self.module.power_w / 1000.0
    }
}

pub trait YieldEstimator {
    fn estimate(&self, request: &EstimateRequest) -> Result<YieldEstimate, EstimatorError>;
}

/// Wire shape of an estimator response, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawYieldEstimate {
    annual_energy_kwh: Option<f64>,
    required_area_m2: Option<f64>,
    daily_average_kwh: Option<f64>,
    performance_ratio: Option<f64>,
    specific_yield_kwh_kwp: Option<f64>,
    capacity_factor: Option<f64>,
    #[serde(default)]
    monthly_energy_kwh: Vec<Option<f64>>,
    #[serde(default)]
    monthly_losses: Vec<MonthlyLosses>,
}

/// Parses and validates a JSON estimator response.
///
/// Missing or non-finite scalars are reported as incomplete rather than
/// being defaulted to zero. `source` identifies the response in errors.
pub fn parse_estimate_json(json: &str, source: &str) -> Result<YieldEstimate, EstimatorError> {
    let raw: RawYieldEstimate = serde_json::from_str(json)?;
    let required = |value: Option<f64>, field: &'static str| {
        value
            .filter(|v| v.is_finite())
            .ok_or_else(|| IncompleteSpecification::new(ENTITY, source, field))
    };

    let annual_energy_kwh = required(raw.annual_energy_kwh, "annual_energy_kwh")?;
    let estimate = YieldEstimate {
        annual_energy_kwh,
        required_area_m2: required(raw.required_area_m2, "required_area_m2")?,
        daily_average_kwh: required(raw.daily_average_kwh, "daily_average_kwh")?,
        performance_ratio: required(raw.performance_ratio, "performance_ratio")?,
        specific_yield_kwh_kwp: required(raw.specific_yield_kwh_kwp, "specific_yield_kwh_kwp")?,
        capacity_factor: required(raw.capacity_factor, "capacity_factor")?,
        monthly_energy_kwh: raw
            .monthly_energy_kwh
            .into_iter()
            .map(|month| required(month, "monthly_energy_kwh"))
            .collect::<Result<_, _>>()?,
        monthly_losses: raw.monthly_losses,
    };
    if !estimate.monthly_energy_kwh.is_empty() && estimate.monthly_energy_kwh.len() != MONTHS {
        return Err(IncompleteSpecification::new(ENTITY, source, "monthly_energy_kwh").into());
    }
    if estimate.monthly_losses.iter().any(|m| !m.total().is_finite()) {
        return Err(IncompleteSpecification::new(ENTITY, source, "monthly_losses").into());
    }
    Ok(estimate)
}

/// Peak-sun-hours approximation for offline runs and tests.
///
/// Monthly energy follows the noon sun height at the site; the orientation
/// enters through the noon angle of incidence. Not a substitute for a real
/// irradiance model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSunHoursEstimator {
    /// Long-term mean horizontal irradiation, kWh/m²/day.
    pub irradiance_kwh_m2_day: f64,
}

impl PeakSunHoursEstimator {
    pub fn new(irradiance_kwh_m2_day: f64) -> Self {
        Self {
            irradiance_kwh_m2_day,
        }
    }
}

impl YieldEstimator for PeakSunHoursEstimator {
    fn estimate(&self, request: &EstimateRequest) -> Result<YieldEstimate, EstimatorError> {
        if !(self.irradiance_kwh_m2_day.is_finite() && self.irradiance_kwh_m2_day > 0.0) {
            return Err(EstimatorError::Backend(format!(
                "irradiance must be positive, got {}",
                self.irradiance_kwh_m2_day
            )));
        }
        let module_area = request.module.area_m2.ok_or_else(|| {
            IncompleteSpecification::new("module", request.module.id.clone(), "area_m2")
        })?;

        let kwp = request.peak_power_kwp();
        let loss_factor = (1.0 - request.total_loss_pct / 100.0).clamp(0.0, 1.0);
        let latitude = request.coordinates.latitude;

        let noon: Vec<(f64, f64)> = MID_MONTH_DAY
            .iter()
            .map(|day| noon_sun(latitude, *day))
            .collect();
        let weights: Vec<f64> = noon
            .iter()
            .map(|(elevation, _)| elevation.to_radians().sin().max(0.05))
            .collect();
        let mean_weight = weights
            .iter()
            .zip(DAYS_IN_MONTH)
            .map(|(w, days)| w * days)
            .sum::<f64>()
            / 365.0;

        let mut monthly_energy_kwh = Vec::with_capacity(MONTHS);
        let mut monthly_losses = Vec::with_capacity(MONTHS);
        for (month, ((elevation, sun_azimuth), weight)) in noon.iter().zip(&weights).enumerate() {
            let horizontal = self.irradiance_kwh_m2_day * weight / mean_weight;
            let gain = orientation_gain(*elevation, *sun_azimuth, request);
            let ideal = kwp * horizontal * gain * DAYS_IN_MONTH[month];
            let delivered = ideal * loss_factor;
            monthly_energy_kwh.push(delivered);
            monthly_losses.push(MonthlyLosses {
                other: ideal - delivered,
                ..MonthlyLosses::default()
            });
        }

        let annual_energy_kwh: f64 = monthly_energy_kwh.iter().sum();
        let reference_kwh = kwp * self.irradiance_kwh_m2_day * 365.0;
        let specific_yield_kwh_kwp = if kwp > 0.0 { annual_energy_kwh / kwp } else { 0.0 };
        debug!(
            kwp,
            annual_energy_kwh,
            tilt = request.tilt_deg,
            azimuth = request.azimuth_deg,
            "peak-sun-hours estimate"
        );

        Ok(YieldEstimate {
            annual_energy_kwh,
            required_area_m2: f64::from(request.module_count) * module_area * request.safety_margin,
            daily_average_kwh: annual_energy_kwh / 365.0,
            performance_ratio: if reference_kwh > 0.0 {
                annual_energy_kwh / reference_kwh
            } else {
                0.0
            },
            specific_yield_kwh_kwp,
            capacity_factor: specific_yield_kwh_kwp / 8760.0,
            monthly_energy_kwh,
            monthly_losses,
        })
    }
}

/// Noon sun elevation and azimuth (degrees) on `day` of the year.
fn noon_sun(latitude_deg: f64, day: u32) -> (f64, f64) {
    let declination = 23.45 * (2.0 * PI * (284.0 + f64::from(day)) / 365.0).sin();
    let elevation = 90.0 - (latitude_deg - declination).abs();
    let azimuth = if latitude_deg >= declination { 180.0 } else { 0.0 };
    (elevation, azimuth)
}

/// Plane-of-array to horizontal ratio at noon, bounded to keep low winter
/// sun from blowing up the ratio.
fn orientation_gain(
    sun_elevation_deg: f64,
    sun_azimuth_deg: f64,
    request: &EstimateRequest,
) -> f64 {
    let zenith = (90.0 - sun_elevation_deg).to_radians();
    let tilt = request.tilt_deg.to_radians();
    let relative_azimuth = (sun_azimuth_deg - request.azimuth_deg).to_radians();
    let cos_aoi = zenith.cos() * tilt.cos() + zenith.sin() * tilt.sin() * relative_azimuth.cos();
    // Diffuse light still reaches panels facing away from the sun.
    let diffuse_floor = 0.5 * (1.0 + tilt.cos()) * 0.3;
    let ratio = cos_aoi.max(0.0) / zenith.cos().max(0.05);
    (ratio * 0.7 + diffuse_floor).clamp(0.2, 1.4)
}
