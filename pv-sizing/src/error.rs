//! Error taxonomy of the dimensioning engine.
//!
//! Every error carries the field or constraint that failed so the caller can
//! render an actionable message.

use std::path::PathBuf;

use pv_model::MpptChannel;
use thiserror::Error;

/// A value needed for a binding calculation is missing from a catalog record
/// or an estimator response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("incomplete specification: {entity} `{id}` is missing `{field}`")]
pub struct IncompleteSpecification {
    /// Kind of record, e.g. `"module"`, `"inverter"`, `"yield estimate"`.
    pub entity: &'static str,
    pub id: String,
    pub field: &'static str,
}

impl IncompleteSpecification {
    pub fn new(entity: &'static str, id: impl Into<String>, field: &'static str) -> Self {
        Self {
            entity,
            id: id.into(),
            field,
        }
    }
}

/// A project references equipment the catalog does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} `{id}` is not in the equipment catalog")]
pub struct UnknownEquipment {
    pub kind: &'static str,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("{channel} is already used by orientation `{owner}`")]
    ChannelAlreadyInUse { channel: MpptChannel, owner: String },
    #[error("cannot remove `{name}`: at least one orientation must remain")]
    CannotRemoveLastOrientation { name: String },
    #[error("unknown orientation `{name}`")]
    UnknownOrientation { name: String },
    #[error("orientation `{name}` already exists")]
    DuplicateOrientation { name: String },
    #[error("{channel} does not exist on the selected inverters")]
    UnknownChannel { channel: MpptChannel },
    #[error(transparent)]
    Compatibility(#[from] IncompleteSpecification),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid sizing input `{field}`: {reason}")]
pub struct InvalidSizingInput {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidSizingInput {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid financial input `{field}`: {reason}")]
pub struct InvalidFinancialInput {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidFinancialInput {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error(transparent)]
    Incomplete(#[from] IncompleteSpecification),
    #[error("estimator response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("yield estimator failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config error: {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Any failure surfaced at the orchestration boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Incomplete(#[from] IncompleteSpecification),
    #[error(transparent)]
    UnknownEquipment(#[from] UnknownEquipment),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Sizing(#[from] InvalidSizingInput),
    #[error(transparent)]
    Financial(#[from] InvalidFinancialInput),
    #[error(transparent)]
    Estimator(#[from] EstimatorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
