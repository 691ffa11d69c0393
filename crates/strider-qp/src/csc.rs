//! Conversions from dense and triplet form to Clarabel's compressed sparse column matrices.

use clarabel::algebra::CscMatrix;
use nalgebra::DMatrix;

const ZERO_THRESHOLD: f64 = 1e-15;

/// Convert a nalgebra `DMatrix<f64>` to `CscMatrix<f64>`, dropping zeros.
pub fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v.abs() > ZERO_THRESHOLD {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Convert a symmetric `DMatrix<f64>` to its upper triangle in CSC form.
///
/// Diagonal entries are always kept so the pattern covers every variable.
pub fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if i == j || v.abs() > ZERO_THRESHOLD {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Build a CSC matrix from `(row, col, value)` triplets.
///
/// Every triplet becomes a structural entry, zeros included, so a caller can
/// fix a sparsity pattern independently of the current values. Duplicate
/// positions are summed.
pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> CscMatrix<f64> {
    let mut sorted: Vec<(usize, usize, f64)> = triplets
        .iter()
        .copied()
        .filter(|&(i, j, _)| i < nrows && j < ncols)
        .collect();
    sorted.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));

    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval: Vec<usize> = Vec::with_capacity(sorted.len());
    let mut nzval: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut last: Option<(usize, usize)> = None;

    for (i, j, v) in sorted {
        if last == Some((i, j)) {
            if let Some(value) = nzval.last_mut() {
                *value += v;
            }
            continue;
        }
        rowval.push(i);
        nzval.push(v);
        colptr[j + 1] += 1;
        last = Some((i, j));
    }
    for j in 0..ncols {
        colptr[j + 1] += colptr[j];
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Whether two matrices share shape and structural pattern.
pub fn same_pattern(a: &CscMatrix<f64>, b: &CscMatrix<f64>) -> bool {
    a.m == b.m && a.n == b.n && a.colptr == b.colptr && a.rowval == b.rowval
}

/// Iterate `(row, col, value)` over the structural entries of `m`.
pub fn entries(m: &CscMatrix<f64>) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
    (0..m.n).flat_map(move |j| {
        (m.colptr[j]..m.colptr[j + 1]).map(move |idx| (m.rowval[idx], j, m.nzval[idx]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_conversion_drops_zeros() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let csc = dmatrix_to_csc(&m);
        assert_eq!(csc.colptr, vec![0, 1, 2, 3]);
        assert_eq!(csc.rowval, vec![0, 1, 0]);
        assert_eq!(csc.nzval, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn upper_triangle_keeps_diagonal() {
        let m = DMatrix::from_row_slice(3, 3, &[2.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 4.0]);
        let csc = dmatrix_to_csc_upper_tri(&m);
        let got: Vec<_> = entries(&csc).collect();
        assert_eq!(got, vec![(0, 0, 2.0), (1, 1, 0.0), (0, 2, 1.0), (2, 2, 4.0)]);
    }

    #[test]
    fn triplets_keep_explicit_zeros_and_sort() {
        let csc = from_triplets(2, 2, &[(1, 1, 5.0), (0, 1, 0.0), (1, 0, 2.0)]);
        assert_eq!(csc.colptr, vec![0, 1, 3]);
        assert_eq!(csc.rowval, vec![1, 0, 1]);
        assert_eq!(csc.nzval, vec![2.0, 0.0, 5.0]);
    }

    #[test]
    fn triplets_sum_duplicates() {
        let csc = from_triplets(1, 1, &[(0, 0, 1.5), (0, 0, 2.0)]);
        assert_eq!(csc.nzval, vec![3.5]);
        assert_eq!(csc.colptr, vec![0, 1]);
    }

    #[test]
    fn pattern_comparison_ignores_values() {
        let a = from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 2.0)]);
        let b = from_triplets(2, 2, &[(0, 0, -3.0), (1, 1, 0.0)]);
        let c = from_triplets(2, 2, &[(0, 0, 1.0), (0, 1, 2.0)]);
        assert!(same_pattern(&a, &b));
        assert!(!same_pattern(&a, &c));
    }
}
