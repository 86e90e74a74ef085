//! Small dense linear algebra for local regressions
//!
//! Local design matrices have one column per coefficient, so the systems
//! solved here are tiny (k × k with k = covariates + 1). Gauss–Jordan with
//! partial pivoting is enough and lets singular systems be reported as
//! `None` instead of producing garbage.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Pivots smaller than this fraction of the largest diagonal entry are
/// treated as zero.
const SINGULAR_TOL: f64 = 1e-12;

/// Invert a square matrix. Returns `None` if it is singular (numerically).
pub fn invert(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n == 0 || a.ncols() != n {
        return None;
    }

    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if !scale.is_finite() || scale == 0.0 {
        return None;
    }
    let tol = scale * SINGULAR_TOL;

    let mut m = a.to_owned();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        // Partial pivoting
        let mut max_val = m[(col, col)].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = m[(row, col)].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < tol || !max_val.is_finite() {
            return None;
        }

        if max_row != col {
            for j in 0..n {
                m.swap((col, j), (max_row, j));
                inv.swap((col, j), (max_row, j));
            }
        }

        let pivot = m[(col, col)];
        for j in 0..n {
            m[(col, j)] /= pivot;
            inv[(col, j)] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                m[(row, j)] -= factor * m[(col, j)];
                inv[(row, j)] -= factor * inv[(col, j)];
            }
        }
    }

    Some(inv)
}

/// Accumulate XᵀWX and XᵀWy for diagonal weights `w`.
///
/// Rows with zero weight are skipped.
pub fn weighted_normal_equations(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    w: ArrayView1<f64>,
) -> (Array2<f64>, Array1<f64>) {
    let k = x.ncols();
    let mut xtwx = Array2::<f64>::zeros((k, k));
    let mut xtwy = Array1::<f64>::zeros(k);

    for (j, row) in x.rows().into_iter().enumerate() {
        let wj = w[j];
        if wj == 0.0 {
            continue;
        }
        for a in 0..k {
            let wa = wj * row[a];
            xtwy[a] += wa * y[j];
            for b in a..k {
                xtwx[(a, b)] += wa * row[b];
            }
        }
    }

    // Mirror the upper triangle
    for a in 0..k {
        for b in 0..a {
            xtwx[(a, b)] = xtwx[(b, a)];
        }
    }

    (xtwx, xtwy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_invert_identity() {
        let a = Array2::<f64>::eye(3);
        let inv = invert(a.view()).unwrap();
        assert_eq!(inv, a);
    }

    #[test]
    fn test_invert_roundtrip() {
        let a = array![[4.0, 1.0, 2.0], [1.0, 3.0, 0.5], [2.0, 0.5, 5.0]];
        let inv = invert(a.view()).unwrap();
        let prod = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((prod[(i, j)] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_invert_needs_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let inv = invert(a.view()).unwrap();
        assert_eq!(inv, a);
    }

    #[test]
    fn test_invert_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(invert(a.view()).is_none());
        let z = Array2::<f64>::zeros((2, 2));
        assert!(invert(z.view()).is_none());
    }

    #[test]
    fn test_weighted_normal_equations() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0]];
        let y = array![1.0, 3.0, 5.0];
        let w = array![1.0, 0.0, 2.0];
        let (xtwx, xtwy) = weighted_normal_equations(x.view(), y.view(), w.view());
        assert_eq!(xtwx, array![[3.0, 4.0], [4.0, 8.0]]);
        assert_eq!(xtwy, array![11.0, 20.0]);
    }
}
