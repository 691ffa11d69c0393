//! Locomotion supervisor: phase machine and the per-cycle pipeline.
//!
//! ```text
//! Configured ──prepare──▶ Preparing ──motion done──▶ Prepared ──start──▶ Walking ◀──start── Paused
//!     ▲                      │ failure                                      │ pause ──────────▶ │
//!     └── Stopped ◀──────────┴──────────────────────── stop ────────────────┴───────────────────┘
//! ```
//!
//! `prepare` may be issued from `Configured` and `Stopped` only. While
//! `Walking`, each [`Supervisor::run_cycle`] runs the stages listed in
//! [`PipelineStage`] in order and stops at the first failure without sending
//! a joint command.

use nalgebra::{DVector, Vector2, Vector3};
use strider_adapt::{
    adapted_step, AdaptationGate, AdaptedStep, GateDecision, GateInputs, StepAdaptationEngine,
};
use strider_core::error::{NumericalError, ReplanError, TransitionError};
use strider_core::time::ControlClock;
use strider_core::traits::{InverseKinematics, KinematicsEstimator, RobotInterface, TrajectoryPlanner};
use strider_core::types::{
    FixedFrame, IkTargets, KinematicState, ReferenceTrajectorySample, ReplanRequest,
};
use strider_core::{CycleError, Foot, LocomotionPhase, PipelineStage, StriderError, WalkingConfig};
use strider_stabilizer::{
    ComCommand, DcmController, DcmLaw, StableDcmModel, ZmpComController, ZmpEstimator,
};
use tracing::{debug, info, trace, warn};

use crate::buffer::TrajectoryBuffer;
use crate::replan::{ReplanAction, ReplanScheduler};

/// External components the supervisor drives.
pub struct Collaborators {
    pub planner: Box<dyn TrajectoryPlanner>,
    pub robot: Box<dyn RobotInterface>,
    pub kinematics: Box<dyn KinematicsEstimator>,
    pub ik: Box<dyn InverseKinematics>,
}

/// Everything one walking cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleCommand {
    /// Walking time at the start of the cycle.
    pub time: f64,
    pub joints: DVector<f64>,
    pub desired_zmp: Vector2<f64>,
    pub measured_zmp: Vector2<f64>,
    pub com: ComCommand,
    pub adapted_step: Option<AdaptedStep>,
}

/// Outcome of a successful [`Supervisor::run_cycle`].
#[derive(Debug, Clone, PartialEq)]
pub enum CycleStatus {
    /// Nothing to do in the current phase.
    Idle,
    /// Still waiting for the preparation motion.
    Preparing,
    /// The preparation motion finished during this cycle.
    Prepared,
    Walked(CycleCommand),
}

pub struct Supervisor {
    config: WalkingConfig,
    phase: LocomotionPhase,
    clock: ControlClock,
    omega: f64,
    collaborators: Collaborators,
    buffer: TrajectoryBuffer,
    scheduler: ReplanScheduler,
    zmp_estimator: ZmpEstimator,
    dcm_law: DcmLaw,
    zmp_com: ZmpComController,
    stable_dcm: StableDcmModel,
    gate: AdaptationGate,
    adaptation: StepAdaptationEngine,
    adapted_step: Option<AdaptedStep>,
    preview: Vec<ReferenceTrajectorySample>,
}

impl Supervisor {
    /// Validate `config` and build every component. The supervisor starts in
    /// [`LocomotionPhase::Configured`].
    pub fn configure(config: WalkingConfig, collaborators: Collaborators) -> Result<Self, StriderError> {
        config.validate()?;
        let dt = config.general.sampling_time;
        let omega = config.general.omega();
        let adaptation = StepAdaptationEngine::new(&config.step_adaptation)?;
        let zmp_estimator = ZmpEstimator::new(&config.zmp_estimation, dt);
        info!(
            dt,
            omega,
            dcm_law = ?config.dcm_controller.kind,
            zmp_filter = zmp_estimator.is_filtered(),
            planner = collaborators.planner.name(),
            "walking supervisor configured"
        );
        Ok(Self {
            phase: LocomotionPhase::Configured,
            clock: ControlClock::new(dt),
            omega,
            buffer: TrajectoryBuffer::new(config.general.buffer_capacity),
            scheduler: ReplanScheduler::new(&config.replanning),
            zmp_estimator,
            dcm_law: DcmLaw::from_config(&config.dcm_controller, omega, dt),
            zmp_com: ZmpComController::new(&config.zmp_com_controller, dt),
            stable_dcm: StableDcmModel::new(omega, dt),
            gate: AdaptationGate::new(&config.step_adaptation),
            adaptation,
            adapted_step: None,
            preview: Vec::new(),
            collaborators,
            config,
        })
    }

    pub const fn phase(&self) -> LocomotionPhase {
        self.phase
    }

    pub const fn config(&self) -> &WalkingConfig {
        &self.config
    }

    /// Walking time in seconds since preparation.
    pub fn time(&self) -> f64 {
        self.clock.now()
    }

    pub const fn buffer(&self) -> &TrajectoryBuffer {
        &self.buffer
    }

    /// Latest adapted footstep, if any was computed on the current trajectory.
    pub const fn adapted_step(&self) -> Option<&AdaptedStep> {
        self.adapted_step.as_ref()
    }

    pub const fn is_replan_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    fn require(&self, command: &'static str, allowed: &[LocomotionPhase]) -> Result<(), TransitionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            warn!(command, phase = %self.phase, "command rejected");
            Err(TransitionError {
                command,
                current_phase: self.phase,
            })
        }
    }

    fn enter(&mut self, phase: LocomotionPhase) {
        info!(from = %self.phase, to = %phase, "locomotion phase changed");
        self.phase = phase;
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Load the initial trajectory and move the joints to its first posture.
    pub fn prepare(&mut self) -> Result<(), StriderError> {
        self.require("prepare", &[LocomotionPhase::Configured, LocomotionPhase::Stopped])?;

        let planner = &mut self.collaborators.planner;
        planner.generate_initial_trajectories()?;
        self.buffer.load(planner.latest_segment()?)?;
        self.adapted_step = None;
        self.clock.reset();
        self.scheduler.reset();

        let front = self.buffer.front().ok_or(ReplanError::EmptyBuffer)?;
        let com = Vector3::new(front.dcm_position.x, front.dcm_position.y, front.com_height);
        let targets = ik_targets(front, com, Vector3::zeros());
        let joints = self.collaborators.ik.solve(&targets)?;
        self.collaborators.robot.move_to(&joints)?;

        self.enter(LocomotionPhase::Preparing);
        Ok(())
    }

    pub fn start_walking(&mut self) -> Result<(), TransitionError> {
        self.require("start_walking", &[LocomotionPhase::Prepared, LocomotionPhase::Paused])?;
        self.collaborators.robot.reset_filters();
        self.zmp_estimator.clear_filter();
        self.dcm_law.reset();
        self.enter(LocomotionPhase::Walking);
        Ok(())
    }

    pub fn pause_walking(&mut self) -> Result<(), TransitionError> {
        self.require("pause_walking", &[LocomotionPhase::Walking])?;
        self.enter(LocomotionPhase::Paused);
        Ok(())
    }

    /// Reset every controller, the adaptation engine and the planner.
    pub fn stop_walking(&mut self) -> Result<(), StriderError> {
        self.require("stop_walking", &[LocomotionPhase::Walking, LocomotionPhase::Paused])?;
        self.reset_controllers();
        self.collaborators.planner.reset();
        self.scheduler.reset();
        self.adapted_step = None;
        self.enter(LocomotionPhase::Stopped);
        self.adaptation.reset()?;
        Ok(())
    }

    /// Walk towards `(x, y)`. Accepted while walking only.
    pub fn set_goal(&mut self, x: f64, y: f64) -> Result<(), StriderError> {
        self.require("set_goal", &[LocomotionPhase::Walking])?;
        self.scheduler.set_goal(Vector2::new(x, y), &self.buffer)?;
        Ok(())
    }

    fn reset_controllers(&mut self) {
        let dcm = self.buffer.front().map_or_else(Vector2::zeros, |s| s.dcm_position);
        self.stable_dcm.reset(dcm);
        self.zmp_com.reset(dcm);
        self.dcm_law.reset();
        self.zmp_estimator.clear_filter();
    }

    // -----------------------------------------------------------------------
    // Cycle
    // -----------------------------------------------------------------------

    /// Run one control cycle for the current phase.
    pub fn run_cycle(&mut self) -> Result<CycleStatus, CycleError> {
        match self.phase {
            LocomotionPhase::Preparing => self.poll_preparation(),
            LocomotionPhase::Walking => self.walk().map(CycleStatus::Walked),
            _ => Ok(CycleStatus::Idle),
        }
    }

    fn poll_preparation(&mut self) -> Result<CycleStatus, CycleError> {
        match self.finish_preparation() {
            Ok(false) => Ok(CycleStatus::Preparing),
            Ok(true) => {
                self.enter(LocomotionPhase::Prepared);
                Ok(CycleStatus::Prepared)
            }
            Err(e) => {
                self.reset_controllers();
                self.enter(LocomotionPhase::Stopped);
                Err(CycleError::new(PipelineStage::Preparation, e))
            }
        }
    }

    fn finish_preparation(&mut self) -> Result<bool, StriderError> {
        if !self.collaborators.robot.motion_done()? {
            return Ok(false);
        }
        self.collaborators.robot.enable_streaming()?;
        let dcm = self.buffer.front().ok_or(ReplanError::EmptyBuffer)?.dcm_position;
        self.stable_dcm.reset(dcm);
        self.zmp_com.reset(dcm);
        Ok(true)
    }

    /// The stateful controllers advance on copies that are stored back only
    /// after the joint command went out, so a failed cycle can be retried on
    /// the same sample. A merge committed by the replanning stage stays.
    fn walk(&mut self) -> Result<CycleCommand, CycleError> {
        use PipelineStage as Stage;

        let mut zmp_estimator = self.zmp_estimator.clone();
        let mut stable_dcm = self.stable_dcm;
        let mut zmp_com = self.zmp_com.clone();

        let feedback = self
            .collaborators
            .robot
            .read_feedback()
            .map_err(|e| CycleError::new(Stage::Feedback, e))?;

        let front = self
            .buffer
            .front()
            .cloned()
            .ok_or_else(|| CycleError::new(Stage::Kinematics, ReplanError::EmptyBuffer))?;
        let fixed_frame = FixedFrame {
            is_left: front.is_left_fixed_frame,
            left_foot: front.left_foot_pose,
            right_foot: front.right_foot_pose,
        };
        let measured = self
            .collaborators
            .kinematics
            .update(&feedback, &fixed_frame)
            .map_err(|e| CycleError::new(Stage::Kinematics, e))?;

        let measured_zmp = zmp_estimator
            .estimate(
                &feedback.left_wrench,
                &feedback.right_wrench,
                &measured.left_foot,
                &measured.right_foot,
            )
            .map_err(|e| CycleError::new(Stage::ZmpEstimation, e))?;

        self.replan(&front, &measured)
            .map_err(|e| CycleError::new(Stage::Replanning, e))?;

        stable_dcm.set_input(front.dcm_position);
        stable_dcm.integrate();
        let com_reference = stable_dcm.com_position();
        if !com_reference.iter().all(|v| v.is_finite()) {
            return Err(CycleError::new(
                Stage::StableDcmModel,
                NumericalError::NonFinite("stable dcm model"),
            ));
        }

        let now = self.clock.now();
        let new_step = self
            .adapt_step(&front, now, measured_zmp, measured.dcm)
            .map_err(|e| CycleError::new(Stage::StepAdaptation, e))?;

        // the law's inputs are rewritten every cycle
        self.dcm_law.set_feedback(measured.dcm);
        self.dcm_law.set_reference(front.dcm_position, front.dcm_velocity);
        if let Some(window) = self.dcm_law.preview_window() {
            self.preview.clear();
            self.preview
                .extend(window.offsets().filter_map(|o| self.buffer.get_clamped(o).cloned()));
            self.dcm_law.set_preview(&self.preview);
        }
        let desired_zmp = self
            .dcm_law
            .evaluate()
            .map_err(|e| CycleError::new(Stage::DcmControl, e))?;

        let in_stance =
            front.dcm_velocity.norm() < self.config.zmp_com_controller.stance_velocity_threshold;
        zmp_com.set_phase(in_stance);
        zmp_com.set_feedback(measured_zmp, measured.com_position.xy());
        zmp_com.set_reference(desired_zmp, com_reference, stable_dcm.com_velocity());
        let com = zmp_com.evaluate();
        if !com.position.iter().chain(com.velocity.iter()).all(|v| v.is_finite()) {
            return Err(CycleError::new(
                Stage::ZmpComControl,
                NumericalError::NonFinite("com command"),
            ));
        }

        let targets = ik_targets(
            &front,
            Vector3::new(com.position.x, com.position.y, front.com_height),
            Vector3::new(com.velocity.x, com.velocity.y, front.com_height_velocity),
        );
        let joints = self
            .collaborators
            .ik
            .solve(&targets)
            .map_err(|e| CycleError::new(Stage::InverseKinematics, e))?;

        self.collaborators
            .robot
            .send_joint_references(&joints)
            .map_err(|e| CycleError::new(Stage::Actuation, e))?;

        self.zmp_estimator = zmp_estimator;
        self.stable_dcm = stable_dcm;
        self.zmp_com = zmp_com;
        if new_step.is_some() {
            self.adapted_step = new_step;
        }

        self.clock.tick();
        self.buffer.advance();
        self.scheduler.advance();

        trace!(
            t = now,
            zmp_x = desired_zmp.x,
            zmp_y = desired_zmp.y,
            dcm_x = measured.dcm.x,
            dcm_y = measured.dcm.y,
            "walking cycle"
        );
        Ok(CycleCommand {
            time: now,
            joints,
            desired_zmp,
            measured_zmp,
            com,
            adapted_step: self.adapted_step,
        })
    }

    fn replan(
        &mut self,
        front: &ReferenceTrajectorySample,
        measured: &KinematicState,
    ) -> Result<(), StriderError> {
        match self.scheduler.on_tick(&self.buffer) {
            ReplanAction::None => {}
            ReplanAction::Request { merge_point } => {
                let Some(goal) = self.scheduler.goal() else {
                    return Ok(());
                };
                let sample = self.buffer.get(merge_point).ok_or(ReplanError::MergePointOutOfRange {
                    merge_point,
                    len: self.buffer.len(),
                })?;
                let swing = if front.is_left_fixed_frame {
                    Foot::Right
                } else {
                    Foot::Left
                };
                let request = ReplanRequest {
                    init_time: self.clock.time_after(merge_point),
                    dcm_position: sample.dcm_position,
                    dcm_velocity: sample.dcm_velocity,
                    is_left_swinging: swing == Foot::Left,
                    measured_swing_foot: *measured.foot(swing),
                    goal,
                };
                self.collaborators.planner.request_updated_trajectories(&request)?;
                debug!(
                    merge_point,
                    init_time = request.init_time,
                    goal_x = goal.x,
                    goal_y = goal.y,
                    "trajectory update requested"
                );
            }
            ReplanAction::Commit { merge_point } => {
                let planner = &mut self.collaborators.planner;
                if !planner.is_trajectory_computed() {
                    return Err(ReplanError::SegmentNotReady.into());
                }
                self.buffer.splice(merge_point, planner.latest_segment()?)?;
                self.adapted_step = None;
                info!(merge_point, "updated trajectory merged");
            }
        }
        Ok(())
    }

    fn adapt_step(
        &mut self,
        front: &ReferenceTrajectorySample,
        now: f64,
        measured_zmp: Vector2<f64>,
        measured_dcm: Vector2<f64>,
    ) -> Result<Option<AdaptedStep>, StriderError> {
        if !self.gate.is_enabled() {
            return Ok(None);
        }
        let merge_sample = self
            .buffer
            .next_merge_point()
            .and_then(|m| self.buffer.get(m))
            .or_else(|| self.buffer.back())
            .ok_or(ReplanError::EmptyBuffer)?;
        let inputs = GateInputs {
            now,
            omega: self.omega,
            desired_dcm_at_merge_point: merge_sample.dcm_position,
            measured_zmp,
            measured_dcm,
        };
        match self.gate.decide(front, self.buffer.footsteps(), &inputs) {
            GateDecision::Skip(reason) => {
                trace!(?reason, "step adaptation skipped");
                Ok(None)
            }
            GateDecision::Adapt {
                foot,
                request,
                nominal_lateral,
            } => {
                let result = self.adaptation.solve(&request)?;
                let step = adapted_step(
                    foot,
                    result,
                    nominal_lateral,
                    now,
                    self.omega,
                    self.buffer.footsteps().double_support_duration,
                );
                debug!(
                    %foot,
                    zmp_x = step.zmp.x,
                    nominal_x = request.nominal_zmp_position,
                    impact_time = step.impact_time,
                    "step adapted"
                );
                Ok(Some(step))
            }
        }
    }
}

fn ik_targets(sample: &ReferenceTrajectorySample, com: Vector3<f64>, com_velocity: Vector3<f64>) -> IkTargets {
    IkTargets {
        com_position: com,
        com_velocity,
        left_foot: sample.left_foot_pose,
        right_foot: sample.right_foot_pose,
        left_foot_twist: sample.left_foot_twist,
        right_foot_twist: sample.right_foot_twist,
    }
}
