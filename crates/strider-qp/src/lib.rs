//! Sparse quadratic programming on top of the Clarabel interior-point solver.
//!
//! [`QpWorkspace`] holds one persistent problem with set-then-update
//! semantics: the Hessian is fixed at the first call, the constraint matrix
//! keeps the sparsity pattern it had at initialization, and only gradient,
//! constraint values and bounds change from tick to tick.
//! [`solve_dense`] covers one-shot problems built from dense matrices.

pub mod csc;
pub mod dense;
pub mod workspace;

pub use clarabel::algebra::CscMatrix;
pub use dense::solve_dense;
pub use workspace::{QpSettings, QpWorkspace};
