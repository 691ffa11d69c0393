use std::fmt;

use nalgebra::{DVector, Isometry3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Locomotion phase of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionPhase {
    Configured,
    Preparing,
    Prepared,
    Walking,
    Paused,
    Stopped,
}

impl fmt::Display for LocomotionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configured => "configured",
            Self::Preparing => "preparing",
            Self::Prepared => "prepared",
            Self::Walking => "walking",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Per-foot phase within the step cycle.
///
/// `SwitchOut` is the double-support interval before the foot lifts off,
/// `SwitchIn` the one after it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    #[default]
    Stance,
    SwitchIn,
    SwitchOut,
    Swing,
}

impl StepPhase {
    /// Whether the foot carries load in this phase.
    pub const fn in_contact(self) -> bool {
        !matches!(self, Self::Swing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Foot {
    Left,
    Right,
}

impl Foot {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Foot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

// ---------------------------------------------------------------------------
// Spatial quantities
// ---------------------------------------------------------------------------

/// Linear and angular velocity of a frame, both in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Twist {
    pub fn zeros() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }
}

impl Default for Twist {
    fn default() -> Self {
        Self::zeros()
    }
}

/// 6-axis contact wrench expressed in the foot sole frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wrench {
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
}

impl Wrench {
    pub fn zeros() -> Self {
        Self {
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        }
    }

    pub fn new(force: Vector3<f64>, torque: Vector3<f64>) -> Self {
        Self { force, torque }
    }
}

impl Default for Wrench {
    fn default() -> Self {
        Self::zeros()
    }
}

// ---------------------------------------------------------------------------
// Reference trajectory
// ---------------------------------------------------------------------------

/// One control tick of the planned reference trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTrajectorySample {
    pub left_foot_pose: Isometry3<f64>,
    pub right_foot_pose: Isometry3<f64>,
    pub left_foot_twist: Twist,
    pub right_foot_twist: Twist,
    pub left_in_contact: bool,
    pub right_in_contact: bool,
    pub is_left_fixed_frame: bool,
    pub left_phase: StepPhase,
    pub right_phase: StepPhase,
    pub dcm_position: Vector2<f64>,
    pub dcm_velocity: Vector2<f64>,
    pub com_height: f64,
    pub com_height_velocity: f64,
}

impl ReferenceTrajectorySample {
    pub const fn is_double_support(&self) -> bool {
        self.left_in_contact && self.right_in_contact
    }

    pub const fn phase(&self, foot: Foot) -> StepPhase {
        match foot {
            Foot::Left => self.left_phase,
            Foot::Right => self.right_phase,
        }
    }

    pub const fn in_contact(&self, foot: Foot) -> bool {
        match foot {
            Foot::Left => self.left_in_contact,
            Foot::Right => self.right_in_contact,
        }
    }
}

/// A planned foothold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footstep {
    pub position: Vector2<f64>,
    pub yaw: f64,
    /// Absolute time at which the foot touches down.
    pub impact_time: f64,
}

/// Planned footholds per foot, ordered by impact time.
///
/// The first entry of each list is the foothold the foot occupies when the
/// plan starts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FootstepPlan {
    pub left: Vec<Footstep>,
    pub right: Vec<Footstep>,
    /// Nominal duration of the double-support interval around each impact.
    pub double_support_duration: f64,
}

impl FootstepPlan {
    pub fn steps(&self, foot: Foot) -> &[Footstep] {
        match foot {
            Foot::Left => &self.left,
            Foot::Right => &self.right,
        }
    }

    /// First step after the initial foothold that lands after `now`.
    pub fn next_step(&self, foot: Foot, now: f64) -> Option<&Footstep> {
        self.steps(foot)
            .iter()
            .skip(1)
            .find(|step| step.impact_time > now)
    }

    /// Foothold currently occupied by `foot`: its latest step landed at or
    /// before `now`, or the initial foothold.
    pub fn current_foothold(&self, foot: Foot, now: f64) -> Option<&Footstep> {
        let steps = self.steps(foot);
        steps
            .iter()
            .rev()
            .find(|step| step.impact_time <= now)
            .or_else(|| steps.first())
    }
}

/// A planner output: per-tick samples plus merge points and footholds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrajectorySegment {
    pub samples: Vec<ReferenceTrajectorySample>,
    /// Offsets into `samples` where a later replan may be spliced in.
    pub merge_points: Vec<usize>,
    pub footsteps: FootstepPlan,
}

/// Inputs for an asynchronous trajectory update.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplanRequest {
    /// Absolute time of the first sample of the new segment.
    pub init_time: f64,
    pub dcm_position: Vector2<f64>,
    pub dcm_velocity: Vector2<f64>,
    pub is_left_swinging: bool,
    pub measured_swing_foot: Isometry3<f64>,
    pub goal: Vector2<f64>,
}

// ---------------------------------------------------------------------------
// Feedback and commands
// ---------------------------------------------------------------------------

/// Raw robot feedback for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotFeedback {
    pub joint_positions: DVector<f64>,
    pub joint_velocities: DVector<f64>,
    pub left_wrench: Wrench,
    pub right_wrench: Wrench,
}

/// Which foot the kinematic estimate is anchored to, and where it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFrame {
    pub is_left: bool,
    pub left_foot: Isometry3<f64>,
    pub right_foot: Isometry3<f64>,
}

/// Measured kinematic quantities in world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    pub com_position: Vector3<f64>,
    pub com_velocity: Vector3<f64>,
    pub dcm: Vector2<f64>,
    pub base: Isometry3<f64>,
    pub left_foot: Isometry3<f64>,
    pub right_foot: Isometry3<f64>,
}

impl KinematicState {
    pub const fn foot(&self, foot: Foot) -> &Isometry3<f64> {
        match foot {
            Foot::Left => &self.left_foot,
            Foot::Right => &self.right_foot,
        }
    }
}

/// Cartesian targets handed to the inverse kinematics layer.
#[derive(Debug, Clone, PartialEq)]
pub struct IkTargets {
    pub com_position: Vector3<f64>,
    pub com_velocity: Vector3<f64>,
    pub left_foot: Isometry3<f64>,
    pub right_foot: Isometry3<f64>,
    pub left_foot_twist: Twist,
    pub right_foot_twist: Twist,
}
