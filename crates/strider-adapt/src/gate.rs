//! When to adapt, and the nominal request to adapt from.

use nalgebra::Vector2;
use strider_core::config::StepAdaptationConfig;
use strider_core::types::{FootstepPlan, ReferenceTrajectorySample};
use strider_core::{Foot, StepPhase};

use crate::request::{AdaptedStep, StepAdaptationRequest, StepAdaptationResult};

/// Why a tick did not run the step-adaptation QP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    /// No adaptable foot is in the trigger phase.
    NotInTriggerPhase,
    /// The foot has no planned step left after its current foothold.
    NoFollowingStep(Foot),
    /// The remaining step time is within the duration tolerance.
    StepTooShort(Foot),
}

/// Outcome of the gate for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Adapt {
        foot: Foot,
        request: StepAdaptationRequest,
        /// Lateral coordinate of the nominal next step.
        nominal_lateral: f64,
    },
    Skip(SkipReason),
}

/// Per-tick measurements and references the nominal request is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateInputs {
    pub now: f64,
    pub omega: f64,
    pub desired_dcm_at_merge_point: Vector2<f64>,
    pub measured_zmp: Vector2<f64>,
    pub measured_dcm: Vector2<f64>,
}

/// Decides, from the per-foot phase of the current reference sample, which
/// foot (if any) gets its next step adapted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationGate {
    enabled: bool,
    adapt_left: bool,
    adapt_right: bool,
    trigger_phase: StepPhase,
    duration_tolerance: f64,
}

impl AdaptationGate {
    pub const fn new(config: &StepAdaptationConfig) -> Self {
        Self {
            enabled: config.enabled,
            adapt_left: config.adapt_left_foot,
            adapt_right: config.adapt_right_foot,
            trigger_phase: config.trigger_phase,
            duration_tolerance: config.step_duration_tolerance,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled && (self.adapt_left || self.adapt_right)
    }

    const fn adapts(&self, foot: Foot) -> bool {
        match foot {
            Foot::Left => self.adapt_left,
            Foot::Right => self.adapt_right,
        }
    }

    /// The adaptable foot currently in the trigger phase.
    pub fn triggered_foot(&self, sample: &ReferenceTrajectorySample) -> Option<Foot> {
        [Foot::Left, Foot::Right]
            .into_iter()
            .find(|&foot| self.adapts(foot) && sample.phase(foot) == self.trigger_phase)
    }

    pub fn decide(
        &self,
        sample: &ReferenceTrajectorySample,
        plan: &FootstepPlan,
        inputs: &GateInputs,
    ) -> GateDecision {
        if !self.is_enabled() {
            return GateDecision::Skip(SkipReason::Disabled);
        }
        let Some(foot) = self.triggered_foot(sample) else {
            return GateDecision::Skip(SkipReason::NotInTriggerPhase);
        };
        let (Some(next), Some(anchor)) = (
            plan.next_step(foot, inputs.now),
            plan.current_foothold(foot.other(), inputs.now),
        ) else {
            return GateDecision::Skip(SkipReason::NoFollowingStep(foot));
        };

        let duration = next.impact_time + plan.double_support_duration / 2.0 - inputs.now;
        if duration <= self.duration_tolerance {
            return GateDecision::Skip(SkipReason::StepTooShort(foot));
        }

        let sigma = (inputs.omega * duration).exp();
        let step_length = next.position.x - anchor.position.x;
        GateDecision::Adapt {
            foot,
            request: StepAdaptationRequest {
                nominal_zmp_position: next.position.x,
                nominal_sigma: sigma,
                nominal_dcm_offset: step_length / (sigma - 1.0),
                desired_dcm_at_merge_point: inputs.desired_dcm_at_merge_point.x,
                omega: inputs.omega,
                measured_zmp: inputs.measured_zmp.x,
                measured_dcm: inputs.measured_dcm.x,
            },
            nominal_lateral: next.position.y,
        }
    }
}

/// Footstep command from a solved adaptation.
pub fn adapted_step(
    foot: Foot,
    result: StepAdaptationResult,
    nominal_lateral: f64,
    now: f64,
    omega: f64,
    next_double_support: f64,
) -> AdaptedStep {
    AdaptedStep {
        foot,
        impact_time: result.impact_time(now, omega, next_double_support),
        zmp: Vector2::new(result.zmp_position, nominal_lateral),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;
    use strider_core::types::{Footstep, Twist};

    fn sample(left: StepPhase, right: StepPhase) -> ReferenceTrajectorySample {
        ReferenceTrajectorySample {
            left_foot_pose: Isometry3::identity(),
            right_foot_pose: Isometry3::identity(),
            left_foot_twist: Twist::zeros(),
            right_foot_twist: Twist::zeros(),
            left_in_contact: left.in_contact(),
            right_in_contact: right.in_contact(),
            is_left_fixed_frame: true,
            left_phase: left,
            right_phase: right,
            dcm_position: Vector2::zeros(),
            dcm_velocity: Vector2::zeros(),
            com_height: 0.53,
            com_height_velocity: 0.0,
        }
    }

    fn step(x: f64, y: f64, impact_time: f64) -> Footstep {
        Footstep {
            position: Vector2::new(x, y),
            yaw: 0.0,
            impact_time,
        }
    }

    fn plan() -> FootstepPlan {
        FootstepPlan {
            left: vec![step(0.0, 0.1, 0.0), step(0.3, 0.1, 1.2)],
            right: vec![step(0.0, -0.1, 0.0), step(0.6, -0.1, 2.4)],
            double_support_duration: 0.2,
        }
    }

    fn inputs(now: f64) -> GateInputs {
        GateInputs {
            now,
            omega: 4.0,
            desired_dcm_at_merge_point: Vector2::new(0.35, 0.0),
            measured_zmp: Vector2::new(0.01, 0.05),
            measured_dcm: Vector2::new(0.04, 0.02),
        }
    }

    fn gate(config: StepAdaptationConfig) -> AdaptationGate {
        AdaptationGate::new(&config)
    }

    #[test]
    fn left_foot_in_trigger_phase_is_adapted() {
        let g = gate(StepAdaptationConfig::default());
        let s = sample(StepPhase::SwitchOut, StepPhase::SwitchIn);
        let decision = g.decide(&s, &plan(), &inputs(0.5));
        let GateDecision::Adapt {
            foot,
            request,
            nominal_lateral,
        } = decision
        else {
            panic!("expected adaptation, got {decision:?}");
        };
        assert_eq!(foot, Foot::Left);
        // T = 1.2 + 0.1 - 0.5
        assert_relative_eq!(request.nominal_sigma, (4.0_f64 * 0.8).exp(), max_relative = 1e-12);
        assert_relative_eq!(request.nominal_zmp_position, 0.3);
        assert_relative_eq!(
            request.nominal_dcm_offset,
            0.3 / ((4.0_f64 * 0.8).exp() - 1.0),
            max_relative = 1e-12
        );
        assert_relative_eq!(request.desired_dcm_at_merge_point, 0.35);
        assert_relative_eq!(request.measured_zmp, 0.01);
        assert_relative_eq!(request.measured_dcm, 0.04);
        assert_relative_eq!(nominal_lateral, 0.1);
    }

    #[test]
    fn right_foot_is_adapted_symmetrically() {
        let g = gate(StepAdaptationConfig::default());
        let s = sample(StepPhase::SwitchIn, StepPhase::SwitchOut);
        // The left foot landed at 1.2, so it anchors the right step.
        match g.decide(&s, &plan(), &inputs(1.5)) {
            GateDecision::Adapt { foot, request, .. } => {
                assert_eq!(foot, Foot::Right);
                let sigma = (4.0_f64 * 1.0).exp();
                assert_relative_eq!(request.nominal_sigma, sigma, max_relative = 1e-12);
                assert_relative_eq!(request.nominal_dcm_offset, 0.3 / (sigma - 1.0), max_relative = 1e-12);
            }
            other => panic!("expected adaptation, got {other:?}"),
        }
    }

    #[test]
    fn other_phases_skip() {
        let g = gate(StepAdaptationConfig::default());
        for (l, r) in [
            (StepPhase::Stance, StepPhase::Stance),
            (StepPhase::Swing, StepPhase::Stance),
            (StepPhase::SwitchIn, StepPhase::Stance),
        ] {
            assert_eq!(
                g.decide(&sample(l, r), &plan(), &inputs(0.5)),
                GateDecision::Skip(SkipReason::NotInTriggerPhase)
            );
        }
    }

    #[test]
    fn disabled_foot_is_not_adapted() {
        let g = gate(StepAdaptationConfig {
            adapt_left_foot: false,
            ..StepAdaptationConfig::default()
        });
        let s = sample(StepPhase::SwitchOut, StepPhase::SwitchIn);
        assert_eq!(
            g.decide(&s, &plan(), &inputs(0.5)),
            GateDecision::Skip(SkipReason::NotInTriggerPhase)
        );
    }

    #[test]
    fn disabled_gate_skips() {
        let g = gate(StepAdaptationConfig {
            enabled: false,
            ..StepAdaptationConfig::default()
        });
        let s = sample(StepPhase::SwitchOut, StepPhase::SwitchIn);
        assert_eq!(
            g.decide(&s, &plan(), &inputs(0.5)),
            GateDecision::Skip(SkipReason::Disabled)
        );
    }

    #[test]
    fn single_step_plan_skips() {
        let g = gate(StepAdaptationConfig::default());
        let s = sample(StepPhase::SwitchOut, StepPhase::SwitchIn);
        let mut p = plan();
        p.left.truncate(1);
        assert_eq!(
            g.decide(&s, &p, &inputs(0.5)),
            GateDecision::Skip(SkipReason::NoFollowingStep(Foot::Left))
        );
    }

    #[test]
    fn imminent_impact_skips() {
        let g = gate(StepAdaptationConfig::default());
        let s = sample(StepPhase::SwitchOut, StepPhase::SwitchIn);
        let mut p = plan();
        p.double_support_duration = 0.0;
        // 1.2 - 1.05 = 0.15 > 0.1 still adapts; 1.15 leaves 0.05.
        assert!(matches!(
            g.decide(&s, &p, &inputs(1.05)),
            GateDecision::Adapt { .. }
        ));
        assert_eq!(
            g.decide(&s, &p, &inputs(1.15)),
            GateDecision::Skip(SkipReason::StepTooShort(Foot::Left))
        );
    }

    #[test]
    fn adapted_step_keeps_nominal_lateral() {
        let result = StepAdaptationResult {
            zmp_position: 0.42,
            sigma: (4.0_f64 * 0.7).exp(),
            dcm_offset: 0.05,
        };
        let step = adapted_step(Foot::Right, result, -0.1, 2.0, 4.0, 0.2);
        assert_eq!(step.foot, Foot::Right);
        assert_relative_eq!(step.zmp.x, 0.42);
        assert_relative_eq!(step.zmp.y, -0.1);
        assert_relative_eq!(step.impact_time, 2.6, epsilon = 1e-12);
    }
}
