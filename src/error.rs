//! Failure taxonomy for scenario execution.
//!
//! Every error carries a class so the executor can decide containment
//! (skip one actor, keep the batch going) without matching on messages.
use crate::engine::EngineError;
use std::fmt;
use thiserror::Error;

/// How far a failure is allowed to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected policy outcome such as a reserved or out-of-range spawn index.
    PolicyRejection,
    /// A resource an actor (or the whole run) depends on is missing.
    ResourceUnavailable,
    /// The simulator refused or failed an operation on a live request.
    EngineFailure,
    /// A caller broke a documented precondition.
    ProgrammerError,
    /// Static input (scenario document, map tables) is malformed.
    Structural,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::PolicyRejection => "policy_rejection",
            ErrorClass::ResourceUnavailable => "resource_unavailable",
            ErrorClass::EngineFailure => "engine_failure",
            ErrorClass::ProgrammerError => "programmer_error",
            ErrorClass::Structural => "structural",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why `IndexValidator` refused an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Negative,
    BeyondHighest { highest: Option<usize> },
    Reserved,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Negative => f.write_str("index is negative"),
            RejectReason::BeyondHighest {
                highest: Some(highest),
            } => write!(f, "index exceeds highest spawn index {highest}"),
            RejectReason::BeyondHighest { highest: None } => {
                f.write_str("map publishes no spawn points")
            }
            RejectReason::Reserved => f.write_str("index is reserved"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("spawn index {index} rejected: {reason}")]
    PolicyRejection { index: i64, reason: RejectReason },

    #[error("no spawn points available in the map")]
    NoSpawnPoints,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("spawn index {index} is outside the {len} known spawn points")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("walker route must contain at least one spawn index")]
    EmptyRoute,

    #[error("walker speed must be positive and finite (got {0})")]
    InvalidSpeed(f64),

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("spawn points are not dense: expected index {expected}, found {found}")]
    SparseSpawnPoints { expected: usize, found: usize },

    #[error("sidewalk zone table is malformed: {0}")]
    InvalidZoneTable(String),

    #[error("malformed scenario: {0}")]
    MalformedScenario(String),
}

impl DirectorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DirectorError::PolicyRejection { .. } => ErrorClass::PolicyRejection,
            DirectorError::NoSpawnPoints => ErrorClass::ResourceUnavailable,
            DirectorError::Engine(EngineError::BlueprintNotFound(_)) => {
                ErrorClass::ResourceUnavailable
            }
            DirectorError::Engine(_) => ErrorClass::EngineFailure,
            DirectorError::IndexOutOfRange { .. }
            | DirectorError::EmptyRoute
            | DirectorError::InvalidSpeed(_)
            | DirectorError::InvalidRoute(_) => ErrorClass::ProgrammerError,
            DirectorError::SparseSpawnPoints { .. }
            | DirectorError::InvalidZoneTable(_)
            | DirectorError::MalformedScenario(_) => ErrorClass::Structural,
        }
    }

    /// True when the failure only costs the actor being spawned.
    ///
    /// Missing spawn points are resource-class but shared by every actor, so
    /// they escape the batch like structural failures do.
    pub fn is_contained(&self) -> bool {
        match self.class() {
            ErrorClass::PolicyRejection | ErrorClass::EngineFailure => true,
            ErrorClass::ResourceUnavailable => !matches!(self, DirectorError::NoSpawnPoints),
            ErrorClass::ProgrammerError | ErrorClass::Structural => false,
        }
    }
}
