//! Predictive DCM law: condensed MPC over the ZMP sequence.
//!
//! # QP Formulation
//!
//! Decision variables: `U = [u_0, ..., u_{N-1}]`, one planar ZMP per node.
//!
//! Node dynamics over `Δ = stride·dt`:
//! `ξ_{k+1} = a ξ_k + (1 − a) u_k`, `a = e^{ωΔ}`.
//!
//! Cost: `Σ w_ξ ‖ξ_k − ξ_ref,k‖² + w_z ‖u_k − z_ref,k‖²` with
//! `z_ref = ξ_ref − ξ̇_ref / ω`.
//!
//! Subject to: each `u_k` inside the support polygon of preview node `k`.
//!
//! The support constraints change with the preview, so each tick is a fresh
//! dense problem.

use nalgebra::{DMatrix, DVector, Vector2};
use strider_core::config::PredictiveConfig;
use strider_core::error::QpError;
use strider_core::types::ReferenceTrajectorySample;
use strider_qp::{solve_dense, QpSettings};
use tracing::debug;

use crate::dcm::{DcmController, PreviewWindow};
use crate::support::{Footprint, SupportPolygon, SupportState};

const SOLVER_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct PredictiveDcmController {
    omega: f64,
    node_dt: f64,
    window: PreviewWindow,
    dcm_weight: f64,
    zmp_weight: f64,
    footprint: Footprint,
    settings: QpSettings,

    dcm: Vector2<f64>,
    preview: Vec<ReferenceTrajectorySample>,
}

impl PredictiveDcmController {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(config: &PredictiveConfig, omega: f64, dt: f64) -> Self {
        let stride = config.preview_stride;
        Self {
            omega,
            node_dt: dt * stride as f64,
            window: PreviewWindow {
                nodes: config.horizon,
                stride,
            },
            dcm_weight: config.dcm_tracking_weight,
            zmp_weight: config.zmp_tracking_weight,
            footprint: Footprint {
                length: config.foot_length,
                width: config.foot_width,
            },
            settings: QpSettings {
                max_iterations: config.max_iterations,
                tolerance: SOLVER_TOLERANCE,
            },
            dcm: Vector2::zeros(),
            preview: Vec::new(),
        }
    }

    /// `Γ[k][j] = a^{k−j}(1 − a)` for `j ≤ k`: effect of `u_j` on `ξ_{k+1}`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn input_map(&self, a: f64) -> DMatrix<f64> {
        let n = self.window.nodes;
        DMatrix::from_fn(n, n, |k, j| {
            if j <= k {
                a.powi((k - j) as i32) * (1.0 - a)
            } else {
                0.0
            }
        })
    }

    fn supports(&self) -> Result<Vec<SupportPolygon>, QpError> {
        self.preview[..self.window.nodes]
            .iter()
            .enumerate()
            .map(|(k, sample)| {
                SupportPolygon::from_state(&SupportState::from_sample(sample), &self.footprint)
                    .map_err(|e| QpError::Infeasible(format!("preview node {k}: {e}")))
            })
            .collect()
    }
}

impl DcmController for PredictiveDcmController {
    fn set_feedback(&mut self, dcm: Vector2<f64>) {
        self.dcm = dcm;
    }

    /// The preview carries the references; the instantaneous ones are unused.
    fn set_reference(&mut self, _position: Vector2<f64>, _velocity: Vector2<f64>) {}

    fn set_preview(&mut self, preview: &[ReferenceTrajectorySample]) {
        self.preview.clear();
        self.preview.extend_from_slice(preview);
    }

    fn preview_window(&self) -> Option<PreviewWindow> {
        Some(self.window)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn evaluate(&mut self) -> Result<Vector2<f64>, QpError> {
        let n = self.window.nodes;
        if self.preview.len() < n + 1 {
            return Err(QpError::MissingData("preview horizon"));
        }
        let polygons = self.supports()?;

        let a = (self.omega * self.node_dt).exp();
        let gamma = self.input_map(a);
        let axis_hessian = 2.0
            * (self.dcm_weight * gamma.transpose() * &gamma
                + self.zmp_weight * DMatrix::<f64>::identity(n, n));

        let n_vars = 2 * n;
        let mut hessian = DMatrix::<f64>::zeros(n_vars, n_vars);
        let mut gradient = DVector::<f64>::zeros(n_vars);
        for d in 0..2 {
            // free response minus reference: a^{k+1} ξ_0 − ξ_ref,k+1
            let residual = DVector::from_fn(n, |k, _| {
                a.powi(k as i32 + 1) * self.dcm[d] - self.preview[k + 1].dcm_position[d]
            });
            let zmp_ref = DVector::from_fn(n, |k, _| {
                let s = &self.preview[k];
                s.dcm_position[d] - s.dcm_velocity[d] / self.omega
            });
            let axis_gradient =
                2.0 * (self.dcm_weight * gamma.transpose() * residual - self.zmp_weight * zmp_ref);
            for i in 0..n {
                gradient[2 * i + d] = axis_gradient[i];
                for j in 0..n {
                    hessian[(2 * i + d, 2 * j + d)] = axis_hessian[(i, j)];
                }
            }
        }

        let n_cons: usize = polygons.iter().map(|p| p.half_planes().len()).sum();
        let mut constraints = DMatrix::<f64>::zeros(n_cons, n_vars);
        let lower = DVector::from_element(n_cons, f64::NEG_INFINITY);
        let mut upper = DVector::<f64>::zeros(n_cons);
        let rows = polygons
            .iter()
            .enumerate()
            .flat_map(|(k, p)| p.half_planes().iter().map(move |h| (k, h)));
        for (row, (k, h)) in rows.enumerate() {
            constraints[(row, 2 * k)] = h.normal.x;
            constraints[(row, 2 * k + 1)] = h.normal.y;
            upper[row] = h.offset;
        }

        let solution = solve_dense(&hessian, &gradient, &constraints, &lower, &upper, self.settings)?;
        let zmp = Vector2::new(solution[0], solution[1]);
        debug!(x = zmp.x, y = zmp.y, "predictive dcm law solved");
        Ok(zmp)
    }

    fn reset(&mut self) {
        self.preview.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion};
    use strider_core::types::Twist;
    use strider_core::StepPhase;

    fn at(x: f64, y: f64) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::new(x, y, 0.0), UnitQuaternion::identity())
    }

    fn sample(dcm: Vector2<f64>, left: bool, right: bool) -> ReferenceTrajectorySample {
        ReferenceTrajectorySample {
            left_foot_pose: at(0.0, 0.1),
            right_foot_pose: at(0.0, -0.1),
            left_foot_twist: Twist::zeros(),
            right_foot_twist: Twist::zeros(),
            left_in_contact: left,
            right_in_contact: right,
            is_left_fixed_frame: true,
            left_phase: StepPhase::Stance,
            right_phase: StepPhase::Stance,
            dcm_position: dcm,
            dcm_velocity: Vector2::zeros(),
            com_height: 0.53,
            com_height_velocity: 0.0,
        }
    }

    fn controller() -> PredictiveDcmController {
        let config = PredictiveConfig {
            horizon: 5,
            preview_stride: 2,
            ..PredictiveConfig::default()
        };
        PredictiveDcmController::new(&config, 4.0, 0.01)
    }

    fn preview(dcm: Vector2<f64>, len: usize) -> Vec<ReferenceTrajectorySample> {
        vec![sample(dcm, true, true); len]
    }

    #[test]
    fn stationary_reference_inside_support_is_tracked() {
        let mut c = controller();
        let p = Vector2::new(0.02, 0.03);
        c.set_feedback(p);
        c.set_preview(&preview(p, 6));
        let zmp = c.evaluate().unwrap();
        assert_relative_eq!(zmp, p, epsilon = 1e-5);
    }

    #[test]
    fn zmp_is_held_inside_the_support_polygon() {
        let mut c = controller();
        let far = Vector2::new(0.5, 0.0);
        c.set_feedback(far);
        c.set_preview(&preview(far, 6));
        let zmp = c.evaluate().unwrap();
        assert_relative_eq!(zmp.x, 0.1, epsilon = 1e-4);
        let poly = SupportPolygon::from_state(
            &SupportState::from_sample(&sample(far, true, true)),
            &c.footprint,
        )
        .unwrap();
        assert!(poly.contains(&zmp, 1e-6));
    }

    #[test]
    fn flight_in_horizon_is_infeasible() {
        let mut c = controller();
        let mut p = preview(Vector2::zeros(), 6);
        p[3] = sample(Vector2::zeros(), false, false);
        c.set_preview(&p);
        assert!(matches!(c.evaluate(), Err(QpError::Infeasible(_))));
    }

    #[test]
    fn short_preview_is_rejected() {
        let mut c = controller();
        c.set_preview(&preview(Vector2::zeros(), 3));
        assert_eq!(c.evaluate(), Err(QpError::MissingData("preview horizon")));
    }

    #[test]
    fn input_map_is_lower_triangular() {
        let c = controller();
        let g = c.input_map(2.0);
        assert_relative_eq!(g[(0, 0)], -1.0);
        assert_relative_eq!(g[(2, 0)], -4.0);
        assert_relative_eq!(g[(0, 2)], 0.0);
    }
}
