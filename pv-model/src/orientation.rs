use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::equipment::MpptChannel;

pub const AZIMUTH_MAX_DEG: f64 = 360.0;
pub const TILT_MAX_DEG: f64 = 90.0;

/// A roof section ("water") with its own tilt and azimuth.
///
/// `area_m2` and `annual_generation_kwh` stay `None` until a yield estimate has
/// been distributed over the orientations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./orientation.ts")]
pub struct Orientation {
    pub name: String,
    /// Degrees, 0..=360.
    pub azimuth_deg: f64,
    /// Degrees from horizontal, 0..=90.
    pub tilt_deg: f64,
    pub module_count: u32,
    pub channel: Option<MpptChannel>,
    pub area_m2: Option<f64>,
    pub annual_generation_kwh: Option<f64>,
}

impl Orientation {
    /// New orientation with no modules; angles are clamped into range.
    pub fn new(name: impl Into<String>, azimuth_deg: f64, tilt_deg: f64) -> Self {
        Self {
            name: name.into(),
            azimuth_deg: clamp_degrees(azimuth_deg, AZIMUTH_MAX_DEG),
            tilt_deg: clamp_degrees(tilt_deg, TILT_MAX_DEG),
            module_count: 0,
            channel: None,
            area_m2: None,
            annual_generation_kwh: None,
        }
    }

    pub fn set_azimuth(&mut self, azimuth_deg: f64) {
        self.azimuth_deg = clamp_degrees(azimuth_deg, AZIMUTH_MAX_DEG);
    }

    pub fn set_tilt(&mut self, tilt_deg: f64) {
        self.tilt_deg = clamp_degrees(tilt_deg, TILT_MAX_DEG);
    }

    /// Forget aggregated values, e.g. after the module count changed.
    pub fn clear_generation(&mut self) {
        self.area_m2 = None;
        self.annual_generation_kwh = None;
    }
}

/// Clamp an angle into `[0, max]`; NaN maps to 0.
pub fn clamp_degrees(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}
