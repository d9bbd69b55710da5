use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

/// A PV module as it appears in the catalog.
///
/// Electrical values that datasheets sometimes omit are optional; the
/// compatibility resolver refuses to guess them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./equipment.ts")]
pub struct PvModule {
    /// Catalog identifier.
    pub id: String,
    /// Manufacturer model name.
    pub model: String,
    /// Nominal power at STC in W.
    pub power_w: f64,
    /// Open-circuit voltage at STC in V.
    pub voc_v: Option<f64>,
    /// Voc temperature coefficient in %/°C (usually negative).
    pub temp_coefficient_voc_pct: Option<f64>,
    /// Short-circuit current at STC in A.
    #[serde(default)]
    pub isc_a: Option<f64>,
    /// Number of cells.
    pub cell_count: u32,
    /// Panel surface in m².
    #[serde(default)]
    pub area_m2: Option<f64>,
}

/// Grid connection of an inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./equipment.ts")]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    SinglePhase,
    SplitPhase,
    ThreePhase,
}

impl NetworkType {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkType::SinglePhase => "single-phase",
            NetworkType::SplitPhase => "split-phase",
            NetworkType::ThreePhase => "three-phase",
        }
    }
}

/// A string inverter as it appears in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export, export_to = "./equipment.ts")]
pub struct Inverter {
    /// Catalog identifier.
    pub id: String,
    /// Manufacturer model name.
    pub model: String,
    /// Rated AC output in W.
    pub rated_ac_power_w: f64,
    /// Maximum DC (PV) input power in W.
    pub max_pv_power_w: f64,
    /// Maximum input current per MPPT in A.
    pub max_input_current_a: Option<f64>,
    /// Number of independent MPPT inputs.
    pub mppt_count: u32,
    /// Parallel strings accepted by each MPPT.
    pub strings_per_mppt: u32,
    /// Lower bound of the MPPT voltage window in V.
    pub mppt_min_voltage_v: Option<f64>,
    /// Upper bound of the MPPT voltage window in V.
    pub mppt_max_voltage_v: Option<f64>,
    pub network_type: NetworkType,
}

/// One MPPT input of one inverter unit.
///
/// Units are numbered `1..=quantity`, channels `1..=mppt_count`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema, TS,
)]
#[ts(export, export_to = "./equipment.ts")]
pub struct MpptChannel {
    pub inverter_unit: u32,
    pub mppt_index: u32,
}

impl MpptChannel {
    pub fn new(inverter_unit: u32, mppt_index: u32) -> Self {
        Self {
            inverter_unit,
            mppt_index,
        }
    }
}

impl fmt::Display for MpptChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inverter {} / MPPT {}", self.inverter_unit, self.mppt_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ordering_groups_by_unit() {
        let mut channels = vec![
            MpptChannel::new(2, 1),
            MpptChannel::new(1, 2),
            MpptChannel::new(1, 1),
        ];
        channels.sort();
        assert_eq!(
            channels,
            vec![
                MpptChannel::new(1, 1),
                MpptChannel::new(1, 2),
                MpptChannel::new(2, 1)
            ]
        );
    }

    #[test]
    fn test_module_without_optional_fields_deserializes() {
        let json = r#"{
            "id": "m1",
            "model": "Generic 450",
            "power_w": 450.0,
            "voc_v": 49.5,
            "temp_coefficient_voc_pct": -0.27,
            "cell_count": 144
        }"#;
        let module: PvModule = serde_json::from_str(json).unwrap();
        assert_eq!(module.isc_a, None);
        assert_eq!(module.area_m2, None);
    }

    #[test]
    fn test_network_type_snake_case() {
        let json = serde_json::to_string(&NetworkType::ThreePhase).unwrap();
        assert_eq!(json, "\"three_phase\"");
    }
}
