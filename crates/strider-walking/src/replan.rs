//! Merge-point replanning schedule.
//!
//! A goal update picks a merge point and counts down to it. At the request
//! lead the supervisor asks the planner for a segment starting there; at the
//! commit lead the segment is spliced in. One request is in flight at a time;
//! later goals only retarget it.

use nalgebra::Vector2;
use strider_core::config::ReplanningConfig;
use strider_core::error::ReplanError;
use tracing::debug;

use crate::buffer::TrajectoryBuffer;

/// What the supervisor must do with the planner this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanAction {
    None,
    /// Ask for a segment starting `merge_point` ticks ahead.
    Request { merge_point: usize },
    /// Splice the computed segment at `merge_point`.
    Commit { merge_point: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    countdown: usize,
    requested: bool,
}

#[derive(Debug, Clone)]
pub struct ReplanScheduler {
    request_lead: usize,
    commit_lead: usize,
    continuous: bool,
    goal: Option<Vector2<f64>>,
    pending: Option<Pending>,
}

impl ReplanScheduler {
    pub const fn new(config: &ReplanningConfig) -> Self {
        Self {
            request_lead: config.request_lead_ticks,
            commit_lead: config.commit_lead_ticks,
            continuous: config.continuous_replanning,
            goal: None,
            pending: None,
        }
    }

    pub const fn goal(&self) -> Option<Vector2<f64>> {
        self.goal
    }

    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Ticks left until the pending merge point.
    pub fn countdown(&self) -> Option<usize> {
        self.pending.map(|p| p.countdown)
    }

    pub fn reset(&mut self) {
        self.goal = None;
        self.pending = None;
    }

    /// Record a new goal and, unless a replan is already pending, schedule
    /// one at the first suitable merge point.
    pub fn set_goal(&mut self, goal: Vector2<f64>, buffer: &TrajectoryBuffer) -> Result<(), ReplanError> {
        if self.pending.is_some() {
            self.goal = Some(goal);
            debug!(x = goal.x, y = goal.y, "replan pending, goal retargeted");
            return Ok(());
        }
        let countdown = self.select_merge_point(buffer)?;
        self.goal = Some(goal);
        self.pending = Some(Pending {
            countdown,
            requested: false,
        });
        debug!(countdown, x = goal.x, y = goal.y, "replan scheduled");
        Ok(())
    }

    fn select_merge_point(&self, buffer: &TrajectoryBuffer) -> Result<usize, ReplanError> {
        if buffer.merge_points().is_empty() {
            let front = buffer.front().ok_or(ReplanError::EmptyBuffer)?;
            if !front.is_double_support() {
                return Err(ReplanError::NotInDoubleSupport);
            }
            return Ok(self.request_lead);
        }
        Ok(buffer
            .merge_points()
            .iter()
            .copied()
            .find(|&m| m >= self.request_lead)
            .unwrap_or(self.request_lead))
    }

    /// Planner action for this tick. Call once per walking cycle before the
    /// buffer advances.
    pub fn on_tick(&mut self, buffer: &TrajectoryBuffer) -> ReplanAction {
        if self.continuous
            && self.pending.is_none()
            && self.goal.is_some()
            && buffer.next_merge_point() == Some(self.request_lead + 1)
        {
            self.pending = Some(Pending {
                countdown: self.request_lead + 1,
                requested: false,
            });
            debug!("continuous replanning towards last goal");
        }

        let Some(pending) = self.pending.as_mut() else {
            return ReplanAction::None;
        };
        let merge_point = pending.countdown;
        if pending.requested {
            if merge_point <= self.commit_lead {
                self.pending = None;
                return ReplanAction::Commit { merge_point };
            }
        } else if merge_point <= self.request_lead {
            pending.requested = true;
            return ReplanAction::Request { merge_point };
        }
        ReplanAction::None
    }

    /// One tick elapsed.
    pub fn advance(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.countdown = pending.countdown.saturating_sub(1);
            if pending.countdown == 0 {
                self.pending = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Isometry3;
    use strider_core::types::{FootstepPlan, ReferenceTrajectorySample, TrajectorySegment, Twist};
    use strider_core::StepPhase;

    fn config(continuous: bool) -> ReplanningConfig {
        ReplanningConfig {
            request_lead_ticks: 5,
            commit_lead_ticks: 2,
            continuous_replanning: continuous,
        }
    }

    fn buffer(merge_points: Vec<usize>, double_support: bool) -> TrajectoryBuffer {
        let sample = ReferenceTrajectorySample {
            left_foot_pose: Isometry3::identity(),
            right_foot_pose: Isometry3::identity(),
            left_foot_twist: Twist::zeros(),
            right_foot_twist: Twist::zeros(),
            left_in_contact: true,
            right_in_contact: double_support,
            is_left_fixed_frame: true,
            left_phase: StepPhase::Stance,
            right_phase: if double_support {
                StepPhase::Stance
            } else {
                StepPhase::Swing
            },
            dcm_position: Vector2::zeros(),
            dcm_velocity: Vector2::zeros(),
            com_height: 0.53,
            com_height_velocity: 0.0,
        };
        let mut b = TrajectoryBuffer::new(50);
        b.load(TrajectorySegment {
            samples: vec![sample; 50],
            merge_points,
            footsteps: FootstepPlan::default(),
        })
        .unwrap();
        b
    }

    fn run(scheduler: &mut ReplanScheduler, buffer: &mut TrajectoryBuffer, ticks: usize) -> Vec<(usize, ReplanAction)> {
        (0..ticks)
            .filter_map(|tick| {
                let action = scheduler.on_tick(buffer);
                scheduler.advance();
                buffer.advance();
                (action != ReplanAction::None).then_some((tick, action))
            })
            .collect()
    }

    #[test]
    fn picks_first_merge_point_past_request_lead() {
        let mut s = ReplanScheduler::new(&config(false));
        let mut b = buffer(vec![3, 12, 30], true);
        s.set_goal(Vector2::new(1.0, 0.0), &b).unwrap();
        assert_eq!(s.countdown(), Some(12));
        let actions = run(&mut s, &mut b, 20);
        assert_eq!(
            actions,
            vec![
                (7, ReplanAction::Request { merge_point: 5 }),
                (10, ReplanAction::Commit { merge_point: 2 }),
            ]
        );
        assert!(!s.is_pending());
    }

    #[test]
    fn falls_back_to_request_lead() {
        let mut s = ReplanScheduler::new(&config(false));
        let mut b = buffer(vec![2], true);
        s.set_goal(Vector2::new(1.0, 0.0), &b).unwrap();
        assert_eq!(s.countdown(), Some(5));
        let actions = run(&mut s, &mut b, 10);
        assert_eq!(actions[0], (0, ReplanAction::Request { merge_point: 5 }));
        assert_eq!(actions[1], (3, ReplanAction::Commit { merge_point: 2 }));
    }

    #[test]
    fn no_merge_point_requires_double_support() {
        let mut s = ReplanScheduler::new(&config(false));
        let b = buffer(vec![], false);
        assert_eq!(
            s.set_goal(Vector2::new(1.0, 0.0), &b),
            Err(ReplanError::NotInDoubleSupport)
        );
        assert!(!s.is_pending());
        assert_eq!(s.goal(), None);

        let b = buffer(vec![], true);
        s.set_goal(Vector2::new(1.0, 0.0), &b).unwrap();
        assert_eq!(s.countdown(), Some(5));
    }

    #[test]
    fn second_goal_only_retargets() {
        let mut s = ReplanScheduler::new(&config(false));
        let b = buffer(vec![12, 30], true);
        s.set_goal(Vector2::new(1.0, 0.0), &b).unwrap();
        s.set_goal(Vector2::new(2.0, 0.5), &b).unwrap();
        assert_eq!(s.countdown(), Some(12));
        assert_eq!(s.goal(), Some(Vector2::new(2.0, 0.5)));
    }

    #[test]
    fn continuous_replanning_reissues_goal() {
        let mut s = ReplanScheduler::new(&config(true));
        let mut b = buffer(vec![3, 20], true);
        s.set_goal(Vector2::new(1.0, 0.0), &b).unwrap();
        // first cycle: scheduled at 20, committed at tick 18
        let actions = run(&mut s, &mut b, 19);
        assert_eq!(actions.last(), Some(&(18, ReplanAction::Commit { merge_point: 2 })));
        assert!(!s.is_pending());

        // a merge point that will pass request_lead + 1 restarts the cycle
        let mut b = buffer(vec![8], true);
        let actions = run(&mut s, &mut b, 8);
        assert_eq!(
            actions,
            vec![
                (3, ReplanAction::Request { merge_point: 5 }),
                (6, ReplanAction::Commit { merge_point: 2 }),
            ]
        );
    }

    #[test]
    fn without_goal_nothing_happens() {
        let mut s = ReplanScheduler::new(&config(true));
        let mut b = buffer(vec![6, 20], true);
        assert!(run(&mut s, &mut b, 25).is_empty());
    }
}
