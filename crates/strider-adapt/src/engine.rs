//! Step-adaptation QP.
//!
//! Decision vector `x = [z, σ, b]`: next-step ZMP, DCM growth factor over the
//! step and DCM offset at the end of the step. The cost
//!
//! ```text
//! ½ [ w_z (z − z_nom)² + w_σ (σ − σ_nom)² + w_b (b − b_nom)² + w_m (z + b − ξ_merge)² ]
//! ```
//!
//! is minimized subject to the one-step LIPM recursion from the measured ZMP
//! and DCM,
//!
//! ```text
//! z + σ (z_cur − ξ_cur) + b = z_cur
//! ```
//!
//! and box bounds on `z` and on the step duration `ln(σ)/ω`.

use nalgebra::{DMatrix, DVector};
use strider_core::config::StepAdaptationConfig;
use strider_core::error::AdaptationError;
use strider_qp::csc::from_triplets;
use strider_qp::{CscMatrix, QpSettings, QpWorkspace};
use tracing::trace;

use crate::request::{StepAdaptationRequest, StepAdaptationResult};

pub const NUM_VARIABLES: usize = 3;
pub const NUM_CONSTRAINTS: usize = 5;

/// Quadratic cost weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    pub zmp_position: f64,
    pub sigma: f64,
    pub dcm_offset: f64,
    /// Couples `z + b` to the desired DCM at the next merge point.
    pub dcm_at_merge_point: f64,
}

/// Admissible deviation from the nominal step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationTolerances {
    pub zmp_low: f64,
    pub zmp_high: f64,
    /// Seconds.
    pub step_duration: f64,
}

/// Builds and solves the step-adaptation QP every call.
#[derive(Debug, Clone)]
pub struct StepAdaptationEngine {
    workspace: QpWorkspace,
    weights: CostWeights,
    tolerances: AdaptationTolerances,
    settings: QpSettings,
}

impl StepAdaptationEngine {
    pub fn new(config: &StepAdaptationConfig) -> Result<Self, AdaptationError> {
        let weights = CostWeights {
            zmp_position: config.zmp_position_weight,
            sigma: config.sigma_weight,
            dcm_offset: config.dcm_offset_weight,
            dcm_at_merge_point: config.dcm_at_merge_point_weight,
        };
        let tolerances = AdaptationTolerances {
            zmp_low: config.zmp_tolerance_low,
            zmp_high: config.zmp_tolerance_high,
            step_duration: config.step_duration_tolerance,
        };
        let settings = QpSettings {
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        };
        Self::with_parts(weights, tolerances, settings)
    }

    pub fn with_parts(
        weights: CostWeights,
        tolerances: AdaptationTolerances,
        settings: QpSettings,
    ) -> Result<Self, AdaptationError> {
        let mut workspace = QpWorkspace::configure(NUM_VARIABLES, NUM_CONSTRAINTS, settings)?;
        workspace.set_or_update_hessian(&hessian(&weights))?;
        Ok(Self {
            workspace,
            weights,
            tolerances,
            settings,
        })
    }

    /// Drop solver state; the next solve sets the problem up again.
    pub fn reset(&mut self) -> Result<(), AdaptationError> {
        *self = Self::with_parts(self.weights, self.tolerances, self.settings)?;
        Ok(())
    }

    /// Solve for the adapted step. Any failure leaves no result behind.
    pub fn solve(
        &mut self,
        request: &StepAdaptationRequest,
    ) -> Result<StepAdaptationResult, AdaptationError> {
        request.validate()?;

        let (lower, upper) = bounds(request, &self.tolerances);
        self.workspace.set_or_update_gradient(&gradient(request, &self.weights))?;
        self.workspace.set_or_update_constraint_matrix(&constraint_matrix(request))?;
        self.workspace.set_or_update_bounds(&lower, &upper)?;
        self.workspace.initialize_if_needed()?;
        self.workspace.solve()?;

        let x = self.workspace.primal_solution()?;
        let result = StepAdaptationResult {
            zmp_position: x[0],
            sigma: x[1],
            dcm_offset: x[2],
        };
        trace!(
            zmp = result.zmp_position,
            sigma = result.sigma,
            offset = result.dcm_offset,
            "step adaptation solved"
        );
        Ok(result)
    }
}

/// Constant Hessian for the given weights.
pub fn hessian(weights: &CostWeights) -> DMatrix<f64> {
    let wm = weights.dcm_at_merge_point;
    DMatrix::from_row_slice(
        NUM_VARIABLES,
        NUM_VARIABLES,
        &[
            weights.zmp_position + wm,
            0.0,
            wm,
            0.0,
            weights.sigma,
            0.0,
            wm,
            0.0,
            weights.dcm_offset + wm,
        ],
    )
}

pub fn gradient(request: &StepAdaptationRequest, weights: &CostWeights) -> DVector<f64> {
    let merge = weights.dcm_at_merge_point * request.desired_dcm_at_merge_point;
    DVector::from_vec(vec![
        -weights.zmp_position * request.nominal_zmp_position - merge,
        -weights.sigma * request.nominal_sigma,
        -weights.dcm_offset * request.nominal_dcm_offset - merge,
    ])
}

/// Constraint rows:
/// 0. LIPM recursion (equality)
/// 1. `z ≤ z_nom + tol_high`
/// 2. `−z ≤ −(z_nom − tol_low)`
/// 3. `σ ≤ exp((T + tol)ω)`
/// 4. `−σ ≤ −exp((T − tol)ω)`
///
/// The pattern is identical every call, including the possibly zero
/// `z_cur − ξ_cur` coefficient.
pub fn constraint_matrix(request: &StepAdaptationRequest) -> CscMatrix<f64> {
    from_triplets(
        NUM_CONSTRAINTS,
        NUM_VARIABLES,
        &[
            (0, 0, 1.0),
            (0, 1, request.measured_zmp - request.measured_dcm),
            (0, 2, 1.0),
            (1, 0, 1.0),
            (2, 0, -1.0),
            (3, 1, 1.0),
            (4, 1, -1.0),
        ],
    )
}

pub fn bounds(
    request: &StepAdaptationRequest,
    tolerances: &AdaptationTolerances,
) -> (DVector<f64>, DVector<f64>) {
    let omega = request.omega;
    let duration = request.nominal_step_duration();
    let z_nom = request.nominal_zmp_position;

    let lower = DVector::from_vec(vec![
        request.measured_zmp,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
    ]);
    let upper = DVector::from_vec(vec![
        request.measured_zmp,
        z_nom + tolerances.zmp_high,
        -(z_nom - tolerances.zmp_low),
        ((duration + tolerances.step_duration) * omega).exp(),
        -((duration - tolerances.step_duration) * omega).exp(),
    ]);
    (lower, upper)
}
