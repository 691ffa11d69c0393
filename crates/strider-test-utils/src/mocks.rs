//! Mock collaborators for the locomotion supervisor.
//!
//! Each mock shares its state with a probe (`Arc<Mutex<..>>`) so a test can
//! script failures and inspect what the supervisor sent while the mock
//! itself is owned by the supervisor.

use std::collections::VecDeque;
use std::sync::Arc;

use nalgebra::{DVector, Vector2, Vector3};
use parking_lot::Mutex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use strider_core::error::{ActuationError, FeedbackError, IkError, PlannerError};
use strider_core::traits::{InverseKinematics, KinematicsEstimator, RobotInterface, TrajectoryPlanner};
use strider_core::types::{
    FixedFrame, IkTargets, KinematicState, ReplanRequest, RobotFeedback, TrajectorySegment, Wrench,
};
use strider_core::Foot;

use crate::plans::{straight_walk, WalkParams};
use crate::rng::seeded_rng;

// ---------------------------------------------------------------------------
// ScriptedPlanner
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PlannerState {
    pub requests: Vec<ReplanRequest>,
    /// Segments returned for successive replans, before falling back to a
    /// generated straight walk.
    pub queued: VecDeque<TrajectorySegment>,
    /// Whether the last request reports as computed.
    pub ready: bool,
    pub fail_initial: bool,
    pub resets: usize,
}

/// Planner returning a fixed initial segment and scripted or generated
/// replans.
pub struct ScriptedPlanner {
    initial: TrajectorySegment,
    walk: WalkParams,
    state: Arc<Mutex<PlannerState>>,
    latest: Option<TrajectorySegment>,
}

impl ScriptedPlanner {
    pub fn new(initial: TrajectorySegment, walk: WalkParams) -> (Self, Arc<Mutex<PlannerState>>) {
        let state = Arc::new(Mutex::new(PlannerState {
            ready: true,
            ..PlannerState::default()
        }));
        (
            Self {
                initial,
                walk,
                state: Arc::clone(&state),
                latest: None,
            },
            state,
        )
    }

    /// Straight walk from the request's DCM towards its goal.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn generate(&self, request: &ReplanRequest) -> TrajectorySegment {
        let remaining = (request.goal.x - request.dcm_position.x).max(0.0);
        let steps = (remaining / self.walk.step_length).ceil().max(1.0) as usize;
        straight_walk(&WalkParams {
            start_time: request.init_time,
            start_x: request.dcm_position.x,
            steps,
            // the reported swing foot lands at the merge point; the other one steps next
            first_swing: if request.is_left_swinging {
                Foot::Right
            } else {
                Foot::Left
            },
            ..self.walk
        })
    }
}

impl TrajectoryPlanner for ScriptedPlanner {
    fn generate_initial_trajectories(&mut self) -> Result<(), PlannerError> {
        if self.state.lock().fail_initial {
            return Err(PlannerError::Failed("scripted initial failure".into()));
        }
        self.latest = Some(self.initial.clone());
        Ok(())
    }

    fn request_updated_trajectories(&mut self, request: &ReplanRequest) -> Result<(), PlannerError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        let segment = state.queued.pop_front();
        drop(state);
        self.latest = Some(segment.unwrap_or_else(|| self.generate(request)));
        Ok(())
    }

    fn is_trajectory_computed(&self) -> bool {
        self.state.lock().ready && self.latest.is_some()
    }

    fn latest_segment(&mut self) -> Result<TrajectorySegment, PlannerError> {
        self.latest.take().ok_or(PlannerError::NotComputed)
    }

    fn reset(&mut self) {
        self.latest = None;
        self.state.lock().resets += 1;
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ScriptedPlanner"
    }
}

// ---------------------------------------------------------------------------
// SimulatedRobot
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RobotState {
    pub joints: usize,
    /// Polls of `motion_done` before it reports completion.
    pub motion_polls: usize,
    pub fail_feedback: bool,
    pub streaming: bool,
    pub move_targets: Vec<DVector<f64>>,
    pub references: Vec<DVector<f64>>,
    pub left_wrench: Wrench,
    pub right_wrench: Wrench,
    pub filter_resets: usize,
}

/// Robot that echoes the last joint reference as its position.
pub struct SimulatedRobot {
    state: Arc<Mutex<RobotState>>,
}

impl SimulatedRobot {
    /// Both feet loaded with half of `weight` newtons, ZMP at the sole origins.
    pub fn new(joints: usize, weight: f64) -> (Self, Arc<Mutex<RobotState>>) {
        let half = Wrench::new(Vector3::new(0.0, 0.0, weight / 2.0), Vector3::zeros());
        let state = Arc::new(Mutex::new(RobotState {
            joints,
            motion_polls: 0,
            fail_feedback: false,
            streaming: false,
            move_targets: Vec::new(),
            references: Vec::new(),
            left_wrench: half,
            right_wrench: half,
            filter_resets: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl RobotInterface for SimulatedRobot {
    fn read_feedback(&mut self) -> Result<RobotFeedback, FeedbackError> {
        let state = self.state.lock();
        if state.fail_feedback {
            return Err(FeedbackError::SensorUnavailable("scripted feedback failure".into()));
        }
        let positions = state
            .references
            .last()
            .or_else(|| state.move_targets.last())
            .cloned()
            .unwrap_or_else(|| DVector::zeros(state.joints));
        Ok(RobotFeedback {
            joint_velocities: DVector::zeros(positions.len()),
            joint_positions: positions,
            left_wrench: state.left_wrench,
            right_wrench: state.right_wrench,
        })
    }

    fn move_to(&mut self, joints: &DVector<f64>) -> Result<(), ActuationError> {
        self.state.lock().move_targets.push(joints.clone());
        Ok(())
    }

    fn motion_done(&mut self) -> Result<bool, FeedbackError> {
        let mut state = self.state.lock();
        if state.fail_feedback {
            return Err(FeedbackError::SensorUnavailable("scripted feedback failure".into()));
        }
        if state.motion_polls == 0 {
            return Ok(true);
        }
        state.motion_polls -= 1;
        Ok(false)
    }

    fn enable_streaming(&mut self) -> Result<(), ActuationError> {
        self.state.lock().streaming = true;
        Ok(())
    }

    fn send_joint_references(&mut self, joints: &DVector<f64>) -> Result<(), ActuationError> {
        let mut state = self.state.lock();
        if !state.streaming {
            return Err(ActuationError::ModeSwitch("streaming not enabled".into()));
        }
        state.references.push(joints.clone());
        Ok(())
    }

    fn reset_filters(&mut self) {
        self.state.lock().filter_resets += 1;
    }
}

// ---------------------------------------------------------------------------
// PassthroughKinematics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct KinematicsState {
    /// Added to the measured DCM.
    pub dcm_offset: Vector2<f64>,
    pub fail: bool,
}

/// Places the CoM above the midpoint of the fixed-frame feet and reports its
/// horizontal position as the DCM, optionally with seeded noise.
pub struct PassthroughKinematics {
    com_height: f64,
    noise: Option<(ChaCha8Rng, f64)>,
    state: Arc<Mutex<KinematicsState>>,
}

impl PassthroughKinematics {
    pub fn new(com_height: f64) -> (Self, Arc<Mutex<KinematicsState>>) {
        let state = Arc::new(Mutex::new(KinematicsState::default()));
        (
            Self {
                com_height,
                noise: None,
                state: Arc::clone(&state),
            },
            state,
        )
    }

    /// Uniform DCM noise in `[-amplitude, amplitude]` per axis.
    #[must_use]
    pub fn with_noise(mut self, seed: u64, amplitude: f64) -> Self {
        self.noise = Some((seeded_rng(seed), amplitude));
        self
    }
}

impl KinematicsEstimator for PassthroughKinematics {
    fn update(
        &mut self,
        _feedback: &RobotFeedback,
        fixed_frame: &FixedFrame,
    ) -> Result<KinematicState, FeedbackError> {
        let state = self.state.lock().clone();
        if state.fail {
            return Err(FeedbackError::Kinematics("scripted kinematics failure".into()));
        }
        let mid = (fixed_frame.left_foot.translation.vector + fixed_frame.right_foot.translation.vector)
            / 2.0;
        let noise = self.noise.as_mut().map_or_else(Vector2::zeros, |(rng, a)| {
            Vector2::new(rng.gen_range(-*a..=*a), rng.gen_range(-*a..=*a))
        });
        let com = Vector3::new(mid.x, mid.y, self.com_height);
        Ok(KinematicState {
            com_position: com,
            com_velocity: Vector3::zeros(),
            dcm: com.xy() + state.dcm_offset + noise,
            base: fixed_frame.left_foot,
            left_foot: fixed_frame.left_foot,
            right_foot: fixed_frame.right_foot,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingIk
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct IkState {
    pub targets: Vec<IkTargets>,
    pub fail: bool,
}

/// Writes the CoM target into the first three joints and records every call.
pub struct RecordingIk {
    joints: usize,
    state: Arc<Mutex<IkState>>,
}

impl RecordingIk {
    pub fn new(joints: usize) -> (Self, Arc<Mutex<IkState>>) {
        let state = Arc::new(Mutex::new(IkState::default()));
        (
            Self {
                joints: joints.max(3),
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl InverseKinematics for RecordingIk {
    fn solve(&mut self, targets: &IkTargets) -> Result<DVector<f64>, IkError> {
        let mut state = self.state.lock();
        if state.fail {
            return Err(IkError::NotConverged("scripted ik failure".into()));
        }
        state.targets.push(targets.clone());
        let mut joints = DVector::zeros(self.joints);
        joints.fixed_rows_mut::<3>(0).copy_from(&targets.com_position);
        Ok(joints)
    }
}
