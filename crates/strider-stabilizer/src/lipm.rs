//! CoM reference from the desired DCM.
//!
//! Along a desired DCM `ξ`, the CoM of the LIPM obeys the stable dynamics
//! `ċ = −ω (c − ξ)`. Integrating them gives a CoM reference consistent with
//! the DCM plan.

use nalgebra::Vector2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableDcmModel {
    omega: f64,
    dt: f64,
    com: Vector2<f64>,
    com_velocity: Vector2<f64>,
    input: Vector2<f64>,
}

impl StableDcmModel {
    pub fn new(omega: f64, dt: f64) -> Self {
        Self {
            omega,
            dt,
            com: Vector2::zeros(),
            com_velocity: Vector2::zeros(),
            input: Vector2::zeros(),
        }
    }

    /// Restart with the CoM at `com`, at rest relative to the DCM.
    pub fn reset(&mut self, com: Vector2<f64>) {
        self.com = com;
        self.input = com;
        self.com_velocity = Vector2::zeros();
    }

    /// Desired DCM to track during the next [`integrate`](Self::integrate).
    pub fn set_input(&mut self, dcm: Vector2<f64>) {
        self.input = dcm;
    }

    /// Advance one period with the exact solution for a constant input.
    pub fn integrate(&mut self) {
        let decay = (-self.omega * self.dt).exp();
        self.com = self.input + (self.com - self.input) * decay;
        self.com_velocity = -self.omega * (self.com - self.input);
    }

    pub const fn com_position(&self) -> Vector2<f64> {
        self.com
    }

    pub const fn com_velocity(&self) -> Vector2<f64> {
        self.com_velocity
    }
}
