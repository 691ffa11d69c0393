//! Inner ZMP–CoM admittance loop.
//!
//! `v = ċ_des + k_com (c_des − c) − k_zmp (z_des − z)`, integrated into a CoM
//! position command. Walking and stance use separate gain sets; switching
//! blends them linearly over the configured transition time.

use nalgebra::Vector2;
use strider_core::config::ZmpComControllerConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZmpComGains {
    pub zmp: f64,
    pub com: f64,
}

impl ZmpComGains {
    fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            zmp: self.zmp + (other.zmp - self.zmp) * t,
            com: self.com + (other.com - self.com) * t,
        }
    }
}

/// Desired CoM position and velocity in the horizontal plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComCommand {
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
}

#[derive(Debug, Clone)]
pub struct ZmpComController {
    walking: ZmpComGains,
    stance: ZmpComGains,
    transition_time: f64,
    dt: f64,

    in_stance: bool,
    /// 0 means walking gains, 1 stance gains.
    blend: f64,

    measured_zmp: Vector2<f64>,
    measured_com: Vector2<f64>,
    desired_zmp: Vector2<f64>,
    desired_com: Vector2<f64>,
    desired_com_velocity: Vector2<f64>,

    position: Vector2<f64>,
}

impl ZmpComController {
    pub fn new(config: &ZmpComControllerConfig, dt: f64) -> Self {
        Self {
            walking: ZmpComGains {
                zmp: config.zmp_gain_walking,
                com: config.com_gain_walking,
            },
            stance: ZmpComGains {
                zmp: config.zmp_gain_stance,
                com: config.com_gain_stance,
            },
            transition_time: config.gain_transition_time,
            dt,
            in_stance: false,
            blend: 0.0,
            measured_zmp: Vector2::zeros(),
            measured_com: Vector2::zeros(),
            desired_zmp: Vector2::zeros(),
            desired_com: Vector2::zeros(),
            desired_com_velocity: Vector2::zeros(),
            position: Vector2::zeros(),
        }
    }

    /// Restart the integrator at `com` with the walking gains.
    pub fn reset(&mut self, com: Vector2<f64>) {
        self.position = com;
        self.in_stance = false;
        self.blend = 0.0;
    }

    /// `true` favours stillness with the stance gains.
    pub fn set_phase(&mut self, in_stance: bool) {
        self.in_stance = in_stance;
    }

    pub fn set_feedback(&mut self, zmp: Vector2<f64>, com: Vector2<f64>) {
        self.measured_zmp = zmp;
        self.measured_com = com;
    }

    pub fn set_reference(
        &mut self,
        zmp: Vector2<f64>,
        com: Vector2<f64>,
        com_velocity: Vector2<f64>,
    ) {
        self.desired_zmp = zmp;
        self.desired_com = com;
        self.desired_com_velocity = com_velocity;
    }

    /// Gains currently applied.
    pub fn gains(&self) -> ZmpComGains {
        self.walking.lerp(self.stance, self.blend)
    }

    pub fn evaluate(&mut self) -> ComCommand {
        let target = if self.in_stance { 1.0 } else { 0.0 };
        if self.transition_time > 0.0 {
            let step = self.dt / self.transition_time;
            self.blend = if target > self.blend {
                (self.blend + step).min(target)
            } else {
                (self.blend - step).max(target)
            };
        } else {
            self.blend = target;
        }

        let gains = self.gains();
        let velocity = self.desired_com_velocity
            + gains.com * (self.desired_com - self.measured_com)
            - gains.zmp * (self.desired_zmp - self.measured_zmp);
        self.position += velocity * self.dt;

        ComCommand {
            position: self.position,
            velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> ZmpComControllerConfig {
        ZmpComControllerConfig {
            zmp_gain_walking: 1.0,
            com_gain_walking: 4.0,
            zmp_gain_stance: 0.5,
            com_gain_stance: 2.0,
            gain_transition_time: 0.1,
            stance_velocity_threshold: 0.001,
        }
    }

    #[test]
    fn perfect_tracking_passes_feedforward() {
        let mut c = ZmpComController::new(&config(), 0.01);
        c.reset(Vector2::new(0.1, 0.0));
        c.set_feedback(Vector2::new(0.05, 0.0), Vector2::new(0.1, 0.0));
        c.set_reference(
            Vector2::new(0.05, 0.0),
            Vector2::new(0.1, 0.0),
            Vector2::new(0.3, 0.0),
        );
        let cmd = c.evaluate();
        assert_relative_eq!(cmd.velocity, Vector2::new(0.3, 0.0));
        assert_relative_eq!(cmd.position, Vector2::new(0.103, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn com_and_zmp_errors_use_opposite_signs() {
        let mut c = ZmpComController::new(&config(), 0.01);
        c.set_feedback(Vector2::zeros(), Vector2::zeros());
        c.set_reference(Vector2::new(0.01, 0.0), Vector2::new(0.02, 0.0), Vector2::zeros());
        let cmd = c.evaluate();
        // 4.0 * 0.02 - 1.0 * 0.01
        assert_relative_eq!(cmd.velocity.x, 0.07, epsilon = 1e-12);
    }

    #[test]
    fn stance_gains_blend_in_over_transition() {
        let mut c = ZmpComController::new(&config(), 0.01);
        c.set_phase(true);
        c.evaluate();
        let halfway = {
            for _ in 0..4 {
                c.evaluate();
            }
            c.gains()
        };
        assert_relative_eq!(halfway.com, 3.0, epsilon = 1e-9);
        for _ in 0..10 {
            c.evaluate();
        }
        assert_relative_eq!(c.gains().com, 2.0);
        assert_relative_eq!(c.gains().zmp, 0.5);
    }

    #[test]
    fn zero_transition_time_switches_immediately() {
        let mut cfg = config();
        cfg.gain_transition_time = 0.0;
        let mut c = ZmpComController::new(&cfg, 0.01);
        c.set_phase(true);
        c.evaluate();
        assert_relative_eq!(c.gains().com, 2.0);
        c.set_phase(false);
        c.evaluate();
        assert_relative_eq!(c.gains().com, 4.0);
    }
}
