use nalgebra::Vector2;
use strider_core::error::AdaptationError;
use strider_core::Foot;

/// Inputs of one step-adaptation solve, all along the sagittal axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepAdaptationRequest {
    pub nominal_zmp_position: f64,
    /// `exp(ω·T)` for the nominal step duration `T`.
    pub nominal_sigma: f64,
    pub nominal_dcm_offset: f64,
    pub desired_dcm_at_merge_point: f64,
    /// LIPM natural frequency.
    pub omega: f64,
    pub measured_zmp: f64,
    pub measured_dcm: f64,
}

impl StepAdaptationRequest {
    /// Nominal step duration `ln(σ)/ω`.
    pub fn nominal_step_duration(&self) -> f64 {
        self.nominal_sigma.ln() / self.omega
    }

    /// Reject requests the QP cannot be built from.
    pub fn validate(&self) -> Result<(), AdaptationError> {
        let values = [
            self.nominal_zmp_position,
            self.nominal_sigma,
            self.nominal_dcm_offset,
            self.desired_dcm_at_merge_point,
            self.omega,
            self.measured_zmp,
            self.measured_dcm,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AdaptationError::InvalidRequest("non-finite input".into()));
        }
        if self.omega <= 0.0 {
            return Err(AdaptationError::InvalidRequest(format!(
                "omega {} must be > 0",
                self.omega
            )));
        }
        if self.nominal_sigma <= 1.0 {
            return Err(AdaptationError::InvalidRequest(format!(
                "nominal sigma {} must be > 1",
                self.nominal_sigma
            )));
        }
        Ok(())
    }
}

/// Solution of the step-adaptation QP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepAdaptationResult {
    pub zmp_position: f64,
    pub sigma: f64,
    pub dcm_offset: f64,
}

impl StepAdaptationResult {
    pub fn step_duration(&self, omega: f64) -> f64 {
        self.sigma.ln() / omega
    }

    /// Touch-down time of the adapted step.
    pub fn impact_time(&self, now: f64, omega: f64, next_double_support: f64) -> f64 {
        now + self.step_duration(omega) - next_double_support / 2.0
    }
}

/// Adapted footstep command for the foot about to swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptedStep {
    pub foot: Foot,
    pub impact_time: f64,
    /// Desired ZMP on landing: adapted sagittal, nominal lateral coordinate.
    pub zmp: Vector2<f64>,
    pub result: StepAdaptationResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn request() -> StepAdaptationRequest {
        StepAdaptationRequest {
            nominal_zmp_position: 0.5,
            nominal_sigma: (0.5_f64 * 4.0).exp(),
            nominal_dcm_offset: 0.1,
            desired_dcm_at_merge_point: 0.6,
            omega: 4.0,
            measured_zmp: 0.0,
            measured_dcm: 0.1,
        }
    }

    #[test]
    fn nominal_duration_inverts_sigma() {
        assert_relative_eq!(request().nominal_step_duration(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn validate_rejects_bad_inputs() {
        assert!(request().validate().is_ok());

        let mut r = request();
        r.omega = 0.0;
        assert!(matches!(r.validate(), Err(AdaptationError::InvalidRequest(_))));

        let mut r = request();
        r.nominal_sigma = 1.0;
        assert!(r.validate().is_err());

        let mut r = request();
        r.measured_dcm = f64::NAN;
        assert!(r.validate().is_err());
    }

    #[test]
    fn impact_time_subtracts_half_double_support() {
        let result = StepAdaptationResult {
            zmp_position: 0.5,
            sigma: (0.6_f64 * 4.0).exp(),
            dcm_offset: 0.1,
        };
        assert_relative_eq!(result.step_duration(4.0), 0.6, epsilon = 1e-12);
        assert_relative_eq!(result.impact_time(10.0, 4.0, 0.2), 10.5, epsilon = 1e-12);
    }
}
