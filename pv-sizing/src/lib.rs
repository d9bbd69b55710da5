//! PV dimensioning engine.
//!
//! Resolves how many modules each MPPT input of an inverter accepts, keeps the
//! roof orientations balanced on their channels, sizes the array for a fixed
//! count or a consumption target, spreads the estimated yield over the
//! orientations and evaluates the investment over its lifetime.

pub mod aggregation;
pub mod allocation;
pub mod catalog;
pub mod compatibility;
pub mod config;
pub mod consumption;
pub mod error;
pub mod estimator;
pub mod finance;
pub mod project;
pub mod recompute;
pub mod report;
pub mod session;
pub mod sizing;

pub use aggregation::{GenerationAggregator, GenerationTotals};
pub use allocation::{BalancingCorrection, CapacityClamp, CountUpdate, OrientationAllocator};
pub use catalog::{Catalog, EquipmentList, InMemoryCatalog};
pub use compatibility::{CompatibilityResolver, MpptCapacity};
pub use config::EngineConfig;
pub use consumption::MonthlyProfile;
pub use error::{
    AllocationError, ConfigError, EngineError, EstimatorError, IncompleteSpecification,
    InvalidFinancialInput, InvalidSizingInput, UnknownEquipment,
};
pub use estimator::{EstimateRequest, PeakSunHoursEstimator, YieldEstimator, parse_estimate_json};
pub use finance::FinancialEngine;
pub use project::ProjectFile;
pub use recompute::{InputFingerprint, RecomputeGuard, Ticket};
pub use report::ProjectReport;
pub use session::{Session, run_project, session_from_project};
pub use sizing::SystemSizer;
