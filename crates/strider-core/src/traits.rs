use nalgebra::DVector;

use crate::error::{ActuationError, FeedbackError, IkError, PlannerError};
use crate::types::{
    FixedFrame, IkTargets, KinematicState, ReplanRequest, RobotFeedback, TrajectorySegment,
};

// ---------------------------------------------------------------------------
// TrajectoryPlanner
// ---------------------------------------------------------------------------

/// Footstep and reference trajectory generator.
///
/// Requests are fire-and-forget: the planner may compute in the background
/// and reports completion through [`is_trajectory_computed`](Self::is_trajectory_computed).
pub trait TrajectoryPlanner: Send + 'static {
    /// Produce the first trajectory from the robot's standing posture.
    fn generate_initial_trajectories(&mut self) -> Result<(), PlannerError>;

    /// Ask for a trajectory starting at `request.init_time`.
    fn request_updated_trajectories(&mut self, request: &ReplanRequest) -> Result<(), PlannerError>;

    /// Whether the last request has finished.
    fn is_trajectory_computed(&self) -> bool;

    /// The most recently computed segment.
    fn latest_segment(&mut self) -> Result<TrajectorySegment, PlannerError>;

    /// Drop any pending work.
    fn reset(&mut self) {}

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// ---------------------------------------------------------------------------
// RobotInterface
// ---------------------------------------------------------------------------

/// Sensor feedback and joint actuation.
///
/// `read_feedback` is expected to enforce its own bounded timeout.
pub trait RobotInterface: Send + 'static {
    fn read_feedback(&mut self) -> Result<RobotFeedback, FeedbackError>;

    /// Start a position-controlled motion to `joints`.
    fn move_to(&mut self, joints: &DVector<f64>) -> Result<(), ActuationError>;

    /// Whether the motion started by [`move_to`](Self::move_to) has finished.
    fn motion_done(&mut self) -> Result<bool, FeedbackError>;

    /// Switch to streamed position references.
    fn enable_streaming(&mut self) -> Result<(), ActuationError>;

    fn send_joint_references(&mut self, joints: &DVector<f64>) -> Result<(), ActuationError>;

    /// Clear any filter state held by the sensor layer.
    fn reset_filters(&mut self) {}
}

// ---------------------------------------------------------------------------
// KinematicsEstimator
// ---------------------------------------------------------------------------

/// Forward kinematics anchored to the planned fixed foot.
pub trait KinematicsEstimator: Send + 'static {
    fn update(
        &mut self,
        feedback: &RobotFeedback,
        fixed_frame: &FixedFrame,
    ) -> Result<KinematicState, FeedbackError>;
}

// ---------------------------------------------------------------------------
// InverseKinematics
// ---------------------------------------------------------------------------

/// Maps Cartesian CoM/feet targets to joint positions.
pub trait InverseKinematics: Send + 'static {
    fn solve(&mut self, targets: &IkTargets) -> Result<DVector<f64>, IkError>;
}
