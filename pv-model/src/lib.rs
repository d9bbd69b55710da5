//! Value types shared between the dimensioning engine and its consumers.
//!
//! Everything here is plain data: catalog records, roof orientations, sizing
//! requests, yield estimates and financial results. The types derive `serde`,
//! `utoipa::ToSchema` and `ts_rs::TS` so the front end can consume them as-is.

pub mod equipment;
pub mod finance;
pub mod orientation;
pub mod site;
pub mod sizing;
pub mod yield_estimate;

/// Number of monthly buckets carried by profiles and estimates.
pub const MONTHS: usize = 12;

pub use equipment::{Inverter, MpptChannel, NetworkType, PvModule};
pub use finance::{
    CashFlowAnalysis, CashFlowYear, FinancialInput, FinancialResult, InputAdjustment,
    PhaseInStep, ScenarioKind, ScenarioOutcome, SensitivityParameter, SensitivityPoint,
    SensitivitySeries, WireCharge,
};
pub use orientation::Orientation;
pub use site::{Coordinates, Site};
pub use sizing::SizingRequest;
pub use yield_estimate::{LossCategory, MonthlyLosses, YieldEstimate};
