#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use strider_core::{LocomotionPhase, WalkingConfig};
use strider_test_utils::mocks::{IkState, KinematicsState, PlannerState, RobotState};
use strider_test_utils::{
    straight_walk, PassthroughKinematics, RecordingIk, ScriptedPlanner, SimulatedRobot, WalkParams,
};
use strider_walking::{Collaborators, CycleStatus, Supervisor};

pub const JOINTS: usize = 12;
pub const WEIGHT: f64 = 600.0;

/// Supervisor wired to mocks, plus the probes into each mock.
pub struct Rig {
    pub supervisor: Supervisor,
    pub planner: Arc<Mutex<PlannerState>>,
    pub robot: Arc<Mutex<RobotState>>,
    pub kinematics: Arc<Mutex<KinematicsState>>,
    pub ik: Arc<Mutex<IkState>>,
}

pub fn walk_params(config: &WalkingConfig) -> WalkParams {
    WalkParams {
        dt: config.general.sampling_time,
        omega: config.general.omega(),
        com_height: config.general.nominal_com_height,
        ..WalkParams::default()
    }
}

pub fn rig(config: WalkingConfig) -> Rig {
    let walk = walk_params(&config);
    let (planner_mock, planner) = ScriptedPlanner::new(straight_walk(&walk), walk);
    let (robot_mock, robot) = SimulatedRobot::new(JOINTS, WEIGHT);
    let (kinematics_mock, kinematics) = PassthroughKinematics::new(config.general.nominal_com_height);
    let (ik_mock, ik) = RecordingIk::new(JOINTS);
    let supervisor = Supervisor::configure(
        config,
        Collaborators {
            planner: Box::new(planner_mock),
            robot: Box::new(robot_mock),
            kinematics: Box::new(kinematics_mock),
            ik: Box::new(ik_mock),
        },
    )
    .unwrap();
    Rig {
        supervisor,
        planner,
        robot,
        kinematics,
        ik,
    }
}

/// A rig already prepared and walking.
pub fn walking_rig(config: WalkingConfig) -> Rig {
    let mut rig = rig(config);
    rig.supervisor.prepare().unwrap();
    assert_eq!(rig.supervisor.run_cycle().unwrap(), CycleStatus::Prepared);
    rig.supervisor.start_walking().unwrap();
    assert_eq!(rig.supervisor.phase(), LocomotionPhase::Walking);
    rig
}

/// Run `n` walking cycles, all of which must succeed.
pub fn walk(rig: &mut Rig, n: usize) {
    for i in 0..n {
        match rig.supervisor.run_cycle() {
            Ok(CycleStatus::Walked(_)) => {}
            other => panic!("cycle {i}: {other:?}"),
        }
    }
}
