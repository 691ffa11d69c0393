use nalgebra::{DMatrix, DVector};
use strider_core::error::QpError;

use crate::csc::dmatrix_to_csc;
use crate::workspace::{QpSettings, QpWorkspace};

/// Solve a one-off dense QP `min ½xᵀHx + gᵀx  s.t.  l ≤ Ax ≤ u`.
///
/// For problems whose structure changes every call, such as an MPC whose
/// support constraints vary along the horizon.
pub fn solve_dense(
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    constraints: &DMatrix<f64>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
    settings: QpSettings,
) -> Result<DVector<f64>, QpError> {
    let mut qp = QpWorkspace::configure(gradient.len(), constraints.nrows(), settings)?;
    qp.set_or_update_hessian(hessian)?;
    qp.set_or_update_gradient(gradient)?;
    qp.set_or_update_constraint_matrix(&dmatrix_to_csc(constraints))?;
    qp.set_or_update_bounds(lower, upper)?;
    qp.initialize_if_needed()?;
    qp.solve()?;
    Ok(qp.primal_solution()?.clone())
}
