//! Persistent QP instance with "set once, update afterwards" semantics.
//!
//! Problems are stated as
//!
//! ```text
//! minimize    ½ xᵀ H x + gᵀ x
//! subject to  l ≤ A x ≤ u
//! ```
//!
//! Before [`QpWorkspace::initialize_if_needed`] every setter replaces its
//! data. Afterwards the Hessian is frozen and the constraint matrix keeps the
//! sparsity pattern it had at initialization; only numeric values change.
//! Rows with `l == u` become equality constraints, infinite bounds are
//! dropped when the problem is handed to Clarabel.
//!
//! The cone layout therefore follows the bound values and may change between
//! solves, so the Clarabel solver is set up from the stored data on each
//! [`QpWorkspace::solve`]. The workspace holds plain data only and is `Send`.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector};
use strider_core::error::QpError;
use tracing::{debug, warn};

use crate::csc::{dmatrix_to_csc_upper_tri, entries, from_triplets, same_pattern};

/// Bounds closer than this are treated as an equality row.
const EQUALITY_TOLERANCE: f64 = 1e-12;

/// Interior-point solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QpSettings {
    pub max_iterations: u32,
    /// Absolute/relative gap and feasibility tolerance.
    pub tolerance: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-9,
        }
    }
}

impl QpSettings {
    fn build(&self) -> Result<DefaultSettings<f64>, QpError> {
        DefaultSettingsBuilder::default()
            .max_iter(self.max_iterations)
            .verbose(false)
            .tol_gap_abs(self.tolerance)
            .tol_gap_rel(self.tolerance)
            .tol_feas(self.tolerance)
            .build()
            .map_err(|e| QpError::Setup(format!("{e:?}")))
    }
}

/// One constrained QP instance.
#[derive(Debug, Clone)]
pub struct QpWorkspace {
    n_vars: usize,
    n_cons: usize,
    settings: QpSettings,
    hessian: Option<CscMatrix<f64>>,
    gradient: Option<DVector<f64>>,
    constraints: Option<CscMatrix<f64>>,
    lower: Option<DVector<f64>>,
    upper: Option<DVector<f64>>,
    initialized: bool,
    solution: Option<DVector<f64>>,
}

impl QpWorkspace {
    /// Allocate a problem with `n_vars` unknowns and `n_cons` constraint rows.
    pub fn configure(n_vars: usize, n_cons: usize, settings: QpSettings) -> Result<Self, QpError> {
        if n_vars == 0 {
            return Err(QpError::EmptyProblem("variable"));
        }
        if n_cons == 0 {
            return Err(QpError::EmptyProblem("constraint"));
        }
        Ok(Self {
            n_vars,
            n_cons,
            settings,
            hessian: None,
            gradient: None,
            constraints: None,
            lower: None,
            upper: None,
            initialized: false,
            solution: None,
        })
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Set the Hessian. Later calls are ignored with a warning.
    pub fn set_or_update_hessian(&mut self, hessian: &DMatrix<f64>) -> Result<(), QpError> {
        if self.hessian.is_some() {
            warn!("QP Hessian already set; keeping the original matrix");
            return Ok(());
        }
        if hessian.shape() != (self.n_vars, self.n_vars) {
            return Err(shape_mismatch("hessian", (self.n_vars, self.n_vars), hessian.shape()));
        }
        if !hessian.iter().all(|v| v.is_finite()) {
            return Err(QpError::Setup("non-finite Hessian entries".into()));
        }
        self.hessian = Some(dmatrix_to_csc_upper_tri(hessian));
        Ok(())
    }

    pub fn set_or_update_gradient(&mut self, gradient: &DVector<f64>) -> Result<(), QpError> {
        if gradient.len() != self.n_vars {
            return Err(len_mismatch("gradient", self.n_vars, gradient.len()));
        }
        match &mut self.gradient {
            Some(current) if self.initialized => current.copy_from(gradient),
            slot => *slot = Some(gradient.clone()),
        }
        Ok(())
    }

    /// Set the constraint matrix, or update its values once initialized.
    ///
    /// After initialization `a` must have exactly the stored sparsity pattern.
    pub fn set_or_update_constraint_matrix(&mut self, a: &CscMatrix<f64>) -> Result<(), QpError> {
        if (a.m, a.n) != (self.n_cons, self.n_vars) {
            return Err(shape_mismatch(
                "constraint matrix",
                (self.n_cons, self.n_vars),
                (a.m, a.n),
            ));
        }
        match &mut self.constraints {
            Some(current) if self.initialized => {
                if !same_pattern(current, a) {
                    return Err(QpError::SparsityPatternChanged);
                }
                current.nzval.copy_from_slice(&a.nzval);
            }
            slot => *slot = Some(a.clone()),
        }
        Ok(())
    }

    pub fn set_or_update_bounds(
        &mut self,
        lower: &DVector<f64>,
        upper: &DVector<f64>,
    ) -> Result<(), QpError> {
        if lower.len() != self.n_cons {
            return Err(len_mismatch("lower bounds", self.n_cons, lower.len()));
        }
        if upper.len() != self.n_cons {
            return Err(len_mismatch("upper bounds", self.n_cons, upper.len()));
        }
        let crossed = |i: &usize| lower[*i].is_nan() || upper[*i].is_nan() || lower[*i] > upper[*i];
        if let Some(row) = (0..self.n_cons).find(crossed) {
            return Err(QpError::InconsistentBounds(row));
        }
        match (&mut self.lower, &mut self.upper) {
            (Some(l), Some(u)) if self.initialized => {
                l.copy_from(lower);
                u.copy_from(upper);
            }
            (l, u) => {
                *l = Some(lower.clone());
                *u = Some(upper.clone());
            }
        }
        Ok(())
    }

    /// One-time setup. Requires every piece of problem data and freezes the
    /// Hessian and the constraint sparsity pattern.
    pub fn initialize_if_needed(&mut self) -> Result<(), QpError> {
        if self.initialized {
            return Ok(());
        }
        if self.hessian.is_none() {
            return Err(QpError::MissingData("hessian"));
        }
        if self.gradient.is_none() {
            return Err(QpError::MissingData("gradient"));
        }
        if self.constraints.is_none() {
            return Err(QpError::MissingData("constraint matrix"));
        }
        if self.lower.is_none() || self.upper.is_none() {
            return Err(QpError::MissingData("bounds"));
        }
        self.initialized = true;
        debug!(
            variables = self.n_vars,
            constraints = self.n_cons,
            "QP workspace initialized"
        );
        Ok(())
    }

    /// Solve with the current data.
    ///
    /// On failure the previous solution is discarded.
    pub fn solve(&mut self) -> Result<(), QpError> {
        self.solution = None;
        if !self.initialized {
            return Err(QpError::NotInitialized);
        }
        let (Some(p), Some(q), Some(a), Some(l), Some(u)) = (
            &self.hessian,
            &self.gradient,
            &self.constraints,
            &self.lower,
            &self.upper,
        ) else {
            return Err(QpError::NotInitialized);
        };

        let (a_cone, b_cone, cones) = to_cone_form(a, l, u);
        let q_slice: Vec<f64> = q.iter().copied().collect();
        let settings = self.settings.build()?;

        let mut solver = DefaultSolver::new(p, &q_slice, &a_cone, &b_cone, &cones, settings)
            .map_err(|e| QpError::Setup(format!("{e:?}")))?;
        solver.solve();

        let sol = &solver.solution;
        match sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                self.solution = Some(DVector::from_column_slice(&sol.x));
                Ok(())
            }
            SolverStatus::PrimalInfeasible
            | SolverStatus::AlmostPrimalInfeasible
            | SolverStatus::DualInfeasible
            | SolverStatus::AlmostDualInfeasible => {
                Err(QpError::Infeasible(format!("{:?}", sol.status)))
            }
            other => Err(QpError::SolverFailed(format!("{other:?}"))),
        }
    }

    /// Decision vector of the last successful solve.
    pub fn primal_solution(&self) -> Result<&DVector<f64>, QpError> {
        self.solution.as_ref().ok_or(QpError::NoSolution)
    }
}

/// Split `l ≤ A x ≤ u` into Clarabel's `A' x + s = b, s ∈ K` form.
///
/// Equality rows come first (zero cone), then `A_i x ≤ u_i` and
/// `-A_i x ≤ -l_i` rows (non-negative cone).
fn to_cone_form(
    a: &CscMatrix<f64>,
    lower: &DVector<f64>,
    upper: &DVector<f64>,
) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
    // (source row, sign) for every output row
    let mut equalities: Vec<(usize, f64)> = Vec::new();
    let mut inequalities: Vec<(usize, f64)> = Vec::new();
    let mut b_eq = Vec::new();
    let mut b_ineq = Vec::new();

    for i in 0..a.m {
        let (l, u) = (lower[i], upper[i]);
        if l.is_finite() && u.is_finite() && (u - l).abs() <= EQUALITY_TOLERANCE {
            equalities.push((i, 1.0));
            b_eq.push(u);
            continue;
        }
        if u.is_finite() {
            inequalities.push((i, 1.0));
            b_ineq.push(u);
        }
        if l.is_finite() {
            inequalities.push((i, -1.0));
            b_ineq.push(-l);
        }
    }

    let n_eq = equalities.len();
    let rows: Vec<(usize, f64)> = equalities.into_iter().chain(inequalities).collect();

    let mut out_rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); a.m];
    for (out, &(src, sign)) in rows.iter().enumerate() {
        out_rows[src].push((out, sign));
    }

    let triplets: Vec<(usize, usize, f64)> = entries(a)
        .flat_map(|(i, j, v)| out_rows[i].iter().map(move |&(out, sign)| (out, j, sign * v)))
        .collect();
    let a_cone = from_triplets(rows.len(), a.n, &triplets);

    let n_ineq = rows.len() - n_eq;
    let mut cones = Vec::with_capacity(2);
    if n_eq > 0 {
        cones.push(ZeroConeT(n_eq));
    }
    if n_ineq > 0 {
        cones.push(NonnegativeConeT(n_ineq));
    }

    let b = b_eq.into_iter().chain(b_ineq).collect();
    (a_cone, b, cones)
}

fn shape_mismatch(what: &'static str, expected: (usize, usize), got: (usize, usize)) -> QpError {
    QpError::DimensionMismatch {
        what,
        expected: format!("{}x{}", expected.0, expected.1),
        got: format!("{}x{}", got.0, got.1),
    }
}

fn len_mismatch(what: &'static str, expected: usize, got: usize) -> QpError {
    QpError::DimensionMismatch {
        what,
        expected: expected.to_string(),
        got: got.to_string(),
    }
}
