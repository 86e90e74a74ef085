//! Global ordinary least squares, the reference model for GWR diagnostics

use ndarray::{Array1, ArrayView1, ArrayView2};

use super::diagnostics::information_criteria;
use crate::linalg::{invert, weighted_normal_equations};

/// Global (unweighted) regression fit
#[derive(Debug, Clone)]
pub struct GlobalFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub rss: f64,
    pub sigma2: f64,
    pub r2: f64,
    pub adj_r2: f64,
    pub aic: f64,
    pub aicc: f64,
}

/// Fit y = Xβ by least squares. `None` if XᵀX is singular or there are no
/// residual degrees of freedom.
pub fn global_ols(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Option<GlobalFit> {
    let (n, k) = x.dim();
    if n <= k {
        return None;
    }

    let ones = Array1::<f64>::ones(n);
    let (xtx, xty) = weighted_normal_equations(x, y, ones.view());
    let inv = invert(xtx.view())?;
    let beta = inv.dot(&xty);

    let fitted = x.dot(&beta);
    let rss: f64 = y.iter().zip(fitted.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    let mean = y.sum() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();

    let df = (n - k) as f64;
    let sigma2 = rss / df;
    let r2 = if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN };
    let adj_r2 = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / df;
    let (aic, aicc) = information_criteria(n, rss, k as f64);

    Some(GlobalFit {
        coefficients: beta.to_vec(),
        std_errors: inv.diag().iter().map(|v| (v * sigma2).sqrt()).collect(),
        rss,
        sigma2,
        r2,
        adj_r2,
        aic,
        aicc,
    })
}
