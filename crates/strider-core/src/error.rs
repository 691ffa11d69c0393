use std::fmt;

use thiserror::Error;

use crate::types::LocomotionPhase;

/// Top-level error type for the walking core.
#[derive(Debug, Error)]
pub enum StriderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feedback acquisition error: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("QP error: {0}")]
    Qp(#[from] QpError),

    #[error("Numerical degeneracy: {0}")]
    Numerical(#[from] NumericalError),

    #[error("Replan consistency error: {0}")]
    Replan(#[from] ReplanError),

    #[error("Transition rejected: {0}")]
    Transition(#[from] TransitionError),

    #[error("Step adaptation failed: {0}")]
    Adaptation(#[from] AdaptationError),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("Actuation error: {0}")]
    Actuation(#[from] ActuationError),

    #[error("Inverse kinematics error: {0}")]
    Ik(#[from] IkError),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Incompatible configuration: {0}")]
    Incompatible(String),
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime errors
// ---------------------------------------------------------------------------

/// Sensor or kinematics read failure.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Feedback not available within {0} attempts")]
    Timeout(u32),

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Kinematics update failed: {0}")]
    Kinematics(String),
}

/// QP workspace and solver failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QpError {
    #[error("QP must have at least one {0}")]
    EmptyProblem(&'static str),

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        got: String,
    },

    #[error("Lower bound exceeds upper bound on constraint row {0}")]
    InconsistentBounds(usize),

    #[error("Constraint matrix sparsity pattern changed after initialization")]
    SparsityPatternChanged,

    #[error("QP data missing before initialization: {0}")]
    MissingData(&'static str),

    #[error("Solver used before initialization")]
    NotInitialized,

    #[error("No primal solution available")]
    NoSolution,

    #[error("Solver setup failed: {0}")]
    Setup(String),

    #[error("Problem is infeasible ({0})")]
    Infeasible(String),

    #[error("Solver failed with status {0}")]
    SolverFailed(String),
}

/// An estimate is undefined for the current data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    #[error("Total vertical contact force {total} N below floor {floor} N")]
    InsufficientContactForce { total: f64, floor: f64 },

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("Support polygon is empty")]
    EmptySupport,
}

/// Inconsistencies in the merge-point replanning protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplanError {
    #[error("Merge point {merge_point} outside buffer of length {len}")]
    MergePointOutOfRange { merge_point: usize, len: usize },

    #[error("Replacement segment is empty")]
    EmptySegment,

    #[error("Trajectory buffer is empty")]
    EmptyBuffer,

    #[error("Replanning requires double support when no merge point is left")]
    NotInDoubleSupport,

    #[error("Updated trajectory not computed at commit time")]
    SegmentNotReady,
}

/// A command was issued in a phase that does not accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{command} not accepted in phase {current_phase}")]
pub struct TransitionError {
    pub command: &'static str,
    pub current_phase: LocomotionPhase,
}

/// Step adaptation could not produce a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdaptationError {
    #[error("QP failed: {0}")]
    Failed(#[from] QpError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// External trajectory planner failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    #[error("Trajectory not computed yet")]
    NotComputed,

    #[error("Planner failed: {0}")]
    Failed(String),
}

/// External actuation layer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuationError {
    #[error("Joint command rejected: {0}")]
    Rejected(String),

    #[error("Control mode switch failed: {0}")]
    ModeSwitch(String),
}

/// External inverse kinematics failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IkError {
    #[error("IK did not converge: {0}")]
    NotConverged(String),
}

// ---------------------------------------------------------------------------
// Cycle diagnostics
// ---------------------------------------------------------------------------

/// Pipeline stage at which a control cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Preparation,
    Feedback,
    Kinematics,
    ZmpEstimation,
    Replanning,
    StableDcmModel,
    StepAdaptation,
    DcmControl,
    ZmpComControl,
    InverseKinematics,
    Actuation,
    BufferAdvance,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preparation => "preparation",
            Self::Feedback => "feedback",
            Self::Kinematics => "kinematics",
            Self::ZmpEstimation => "zmp estimation",
            Self::Replanning => "replanning",
            Self::StableDcmModel => "stable dcm model",
            Self::StepAdaptation => "step adaptation",
            Self::DcmControl => "dcm control",
            Self::ZmpComControl => "zmp-com control",
            Self::InverseKinematics => "inverse kinematics",
            Self::Actuation => "actuation",
            Self::BufferAdvance => "buffer advance",
        };
        f.write_str(name)
    }
}

/// A control cycle aborted at `stage`. No command was emitted.
#[derive(Debug, Error)]
#[error("cycle aborted at {stage}: {source}")]
pub struct CycleError {
    pub stage: PipelineStage,
    #[source]
    pub source: StriderError,
}

impl CycleError {
    pub fn new(stage: PipelineStage, source: impl Into<StriderError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}
