//! First-order low-pass filter for planar signals.

use std::f64::consts::PI;

use nalgebra::Vector2;

/// Discrete first-order low pass `y += α (x − y)` with
/// `α = dt / (dt + 1/(2π f_c))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    alpha: f64,
    state: Option<Vector2<f64>>,
}

impl LowPassFilter {
    pub fn new(cutoff_frequency: f64, dt: f64) -> Self {
        let time_constant = 1.0 / (2.0 * PI * cutoff_frequency);
        Self {
            alpha: dt / (dt + time_constant),
            state: None,
        }
    }

    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Filter one sample. The first sample after a reset passes through.
    pub fn filter(&mut self, input: Vector2<f64>) -> Vector2<f64> {
        let output = match self.state {
            Some(previous) => previous + self.alpha * (input - previous),
            None => input,
        };
        self.state = Some(output);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_sample_passes_through() {
        let mut f = LowPassFilter::new(10.0, 0.01);
        let out = f.filter(Vector2::new(1.0, -2.0));
        assert_relative_eq!(out, Vector2::new(1.0, -2.0));
    }

    #[test]
    fn step_response_converges_monotonically() {
        let mut f = LowPassFilter::new(5.0, 0.01);
        f.filter(Vector2::zeros());
        let mut previous = 0.0;
        for _ in 0..200 {
            let out = f.filter(Vector2::new(1.0, 0.0));
            assert!(out.x >= previous && out.x <= 1.0);
            previous = out.x;
        }
        assert_relative_eq!(previous, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn alpha_grows_with_cutoff() {
        let slow = LowPassFilter::new(1.0, 0.016);
        let fast = LowPassFilter::new(50.0, 0.016);
        assert!(slow.alpha() < fast.alpha());
        assert!(fast.alpha() < 1.0);
    }

    #[test]
    fn reset_forgets_the_state() {
        let mut f = LowPassFilter::new(1.0, 0.016);
        f.filter(Vector2::new(0.3, 0.0));
        assert!(f.filter(Vector2::new(1.0, 0.0)).x < 0.5);
        f.reset();
        assert_relative_eq!(f.filter(Vector2::new(1.0, 0.0)).x, 1.0);
    }
}
