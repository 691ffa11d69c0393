//! Analytic straight-line walking trajectories.
//!
//! The ZMP is piecewise constant on the stance foot and switches in the
//! middle of each double support; the DCM follows from the backward LIPM
//! recursion ending at rest between the final footholds.

use std::f64::consts::PI;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector2, Vector3};
use strider_core::types::{
    Footstep, FootstepPlan, ReferenceTrajectorySample, TrajectorySegment, Twist,
};
use strider_core::{Foot, StepPhase};

/// Extra standing time appended after the last double support.
const TAIL_DURATION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    pub dt: f64,
    pub omega: f64,
    pub start_time: f64,
    pub start_x: f64,
    /// Forward advance of each step relative to the previous landing.
    pub step_length: f64,
    pub step_width: f64,
    pub single_support: f64,
    pub double_support: f64,
    pub steps: usize,
    pub first_swing: Foot,
    pub com_height: f64,
    pub step_height: f64,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            dt: 0.016,
            omega: (9.81_f64 / 0.53).sqrt(),
            start_time: 0.0,
            start_x: 0.0,
            step_length: 0.1,
            step_width: 0.16,
            single_support: 0.6,
            double_support: 0.2,
            steps: 4,
            first_swing: Foot::Left,
            com_height: 0.53,
            step_height: 0.03,
        }
    }
}

impl WalkParams {
    fn lateral(&self, foot: Foot) -> f64 {
        match foot {
            Foot::Left => self.step_width / 2.0,
            Foot::Right => -self.step_width / 2.0,
        }
    }

    fn swing_foot(&self, step: usize) -> Foot {
        if step % 2 == 1 {
            self.first_swing
        } else {
            self.first_swing.other()
        }
    }

    /// Lift-off time of step `i` (1-based).
    #[allow(clippy::cast_precision_loss)]
    fn lift_off(&self, i: usize) -> f64 {
        self.start_time
            + self.double_support
            + (i - 1) as f64 * (self.single_support + self.double_support)
    }

    fn impact(&self, i: usize) -> f64 {
        self.lift_off(i) + self.single_support
    }
}

struct Swing {
    foot: Foot,
    lift_off: f64,
    impact: f64,
    from: Vector2<f64>,
    to: Vector2<f64>,
}

fn pose(position: Vector2<f64>, z: f64) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(position.x, position.y, z),
        UnitQuaternion::identity(),
    )
}

/// Straight walk along +x.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn straight_walk(p: &WalkParams) -> TrajectorySegment {
    let mut plan = FootstepPlan {
        left: vec![Footstep {
            position: Vector2::new(p.start_x, p.lateral(Foot::Left)),
            yaw: 0.0,
            impact_time: p.start_time,
        }],
        right: vec![Footstep {
            position: Vector2::new(p.start_x, p.lateral(Foot::Right)),
            yaw: 0.0,
            impact_time: p.start_time,
        }],
        double_support_duration: p.double_support,
    };

    let mut swings = Vec::with_capacity(p.steps);
    for i in 1..=p.steps {
        let foot = p.swing_foot(i);
        let from = plan.steps(foot).last().map_or_else(Vector2::zeros, |s| s.position);
        let to = Vector2::new(p.start_x + i as f64 * p.step_length, p.lateral(foot));
        let step = Footstep {
            position: to,
            yaw: 0.0,
            impact_time: p.impact(i),
        };
        match foot {
            Foot::Left => plan.left.push(step),
            Foot::Right => plan.right.push(step),
        }
        swings.push(Swing {
            foot,
            lift_off: p.lift_off(i),
            impact: p.impact(i),
            from,
            to,
        });
    }

    // ZMP switch times and the ZMP held after each switch.
    let switches: Vec<f64> = swings
        .iter()
        .map(|s| s.impact + p.double_support / 2.0)
        .collect();
    let final_left = plan.left.last().map_or_else(Vector2::zeros, |s| s.position);
    let final_right = plan.right.last().map_or_else(Vector2::zeros, |s| s.position);
    let rest = (final_left + final_right) / 2.0;
    let mut zmps = Vec::with_capacity(p.steps + 1);
    if p.steps > 0 {
        zmps.push(Vector2::new(p.start_x, p.lateral(p.first_swing.other())));
        zmps.extend(swings.iter().take(p.steps - 1).map(|s| s.to));
    }
    zmps.push(rest);

    // DCM at each switch, backwards from rest.
    let mut dcm_at_switch = vec![rest; switches.len()];
    for i in (0..switches.len().saturating_sub(1)).rev() {
        let decay = (-p.omega * (switches[i + 1] - switches[i])).exp();
        dcm_at_switch[i] = zmps[i + 1] + decay * (dcm_at_switch[i + 1] - zmps[i + 1]);
    }

    let end = swings
        .last()
        .map_or(p.start_time + p.double_support, |s| s.impact + p.double_support)
        + TAIL_DURATION;
    let n = ((end - p.start_time) / p.dt).round() as usize + 1;

    let samples = (0..n)
        .map(|k| {
            let t = p.start_time + k as f64 * p.dt;
            let interval = switches.iter().filter(|&&s| s <= t).count();
            let (dcm, dcm_velocity) = if interval == switches.len() {
                (rest, Vector2::zeros())
            } else {
                let z = zmps[interval];
                let xi = z + (p.omega * (t - switches[interval])).exp() * (dcm_at_switch[interval] - z);
                (xi, p.omega * (xi - z))
            };
            let fixed = if interval == 0 {
                p.first_swing.other()
            } else {
                swings[interval - 1].foot
            };
            sample_at(p, &plan, &swings, t, dcm, dcm_velocity, fixed)
        })
        .collect();

    let merge_points = switches
        .iter()
        .map(|s| ((s - p.start_time) / p.dt).round() as usize)
        .filter(|&m| m > 0 && m < n)
        .collect();

    TrajectorySegment {
        samples,
        merge_points,
        footsteps: plan,
    }
}

/// A segment in which the robot stands still between its feet.
pub fn standing(params: &WalkParams) -> TrajectorySegment {
    straight_walk(&WalkParams {
        steps: 0,
        ..*params
    })
}

fn sample_at(
    p: &WalkParams,
    plan: &FootstepPlan,
    swings: &[Swing],
    t: f64,
    dcm: Vector2<f64>,
    dcm_velocity: Vector2<f64>,
    fixed: Foot,
) -> ReferenceTrajectorySample {
    let foot_state = |foot: Foot| -> (Isometry3<f64>, Twist, StepPhase) {
        if let Some(s) = swings
            .iter()
            .find(|s| s.foot == foot && s.lift_off <= t && t < s.impact)
        {
            let r = (t - s.lift_off) / p.single_support;
            let position = s.from + (s.to - s.from) * r;
            let height = p.step_height * (PI * r).sin();
            let velocity = (s.to - s.from) / p.single_support;
            let twist = Twist {
                linear: Vector3::new(
                    velocity.x,
                    velocity.y,
                    p.step_height * PI / p.single_support * (PI * r).cos(),
                ),
                angular: Vector3::zeros(),
            };
            return (pose(position, height), twist, StepPhase::Swing);
        }

        let foothold = plan
            .current_foothold(foot, t)
            .map_or_else(Vector2::zeros, |s| s.position);
        let lifts_next = swings
            .iter()
            .find(|s| s.lift_off > t)
            .is_some_and(|s| s.foot == foot && s.lift_off - t <= p.double_support + 1e-9);
        let just_landed = swings
            .iter()
            .any(|s| s.foot == foot && s.impact <= t && t < s.impact + p.double_support);
        let phase = if lifts_next {
            StepPhase::SwitchOut
        } else if just_landed {
            StepPhase::SwitchIn
        } else {
            StepPhase::Stance
        };
        (pose(foothold, 0.0), Twist::zeros(), phase)
    };

    let (left_foot_pose, left_foot_twist, left_phase) = foot_state(Foot::Left);
    let (right_foot_pose, right_foot_twist, right_phase) = foot_state(Foot::Right);
    ReferenceTrajectorySample {
        left_foot_pose,
        right_foot_pose,
        left_foot_twist,
        right_foot_twist,
        left_in_contact: left_phase.in_contact(),
        right_in_contact: right_phase.in_contact(),
        is_left_fixed_frame: fixed == Foot::Left,
        left_phase,
        right_phase,
        dcm_position: dcm,
        dcm_velocity,
        com_height: p.com_height,
        com_height_velocity: 0.0,
    }
}
