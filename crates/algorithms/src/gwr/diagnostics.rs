//! Model-level GWR diagnostics (GWmodel conventions)

use std::f64::consts::PI;

use ndarray::Array1;

use super::local::LocalFit;

/// AIC and AICc for a fit with `n` observations, residual sum of squares
/// `rss` and `tr_s` effective parameters. σ is the ML estimate sqrt(RSS/n).
///
/// AICc is +∞ when n − 2 − tr(S) ≤ 0.
pub(crate) fn information_criteria(n: usize, rss: f64, tr_s: f64) -> (f64, f64) {
    let nf = n as f64;
    let sigma = (rss / nf).sqrt();
    let base = 2.0 * nf * sigma.ln() + nf * (2.0 * PI).ln();
    let aic = base + nf + tr_s;
    let denom = nf - 2.0 - tr_s;
    let aicc = if denom > 0.0 {
        base + nf * (nf + tr_s) / denom
    } else {
        f64::INFINITY
    };
    (aic, aicc)
}

/// Global diagnostics of a GWR fit
#[derive(Debug, Clone, PartialEq)]
pub struct GwrDiagnostics {
    /// Locations with a defined local fit (all sums run over these)
    pub observations: usize,
    pub rss: f64,
    /// Trace of the hat matrix
    pub tr_s: f64,
    /// Trace of SᵀS
    pub tr_sts: f64,
    /// Effective degrees of freedom n − 2tr(S) + tr(SᵀS)
    pub edf: f64,
    /// σ̂² = RSS / edf
    pub sigma2: f64,
    pub aic: f64,
    pub aicc: f64,
    pub r2: f64,
    pub adj_r2: f64,
}

impl GwrDiagnostics {
    pub(crate) fn from_fits(y: &Array1<f64>, fits: &[LocalFit]) -> Self {
        let mut n = 0usize;
        let mut rss = 0.0;
        let mut tr_s = 0.0;
        let mut tr_sts = 0.0;
        let mut y_sum = 0.0;

        for (fit, &yi) in fits.iter().zip(y) {
            if !fit.is_defined() {
                continue;
            }
            n += 1;
            rss += (yi - fit.fitted).powi(2);
            tr_s += fit.s_ii;
            tr_sts += fit.s_norm2;
            y_sum += yi;
        }

        let nf = n as f64;
        let mean = y_sum / nf;
        let tss: f64 = fits
            .iter()
            .zip(y)
            .filter(|(f, _)| f.is_defined())
            .map(|(_, yi)| (yi - mean).powi(2))
            .sum();

        let edf = nf - 2.0 * tr_s + tr_sts;
        let sigma2 = rss / edf;
        let (aic, aicc) = information_criteria(n, rss, tr_s);
        let r2 = if tss > 0.0 { 1.0 - rss / tss } else { f64::NAN };
        let adj_r2 = 1.0 - (1.0 - r2) * (nf - 1.0) / (edf - 1.0);

        Self {
            observations: n,
            rss,
            tr_s,
            tr_sts,
            edf,
            sigma2,
            aic,
            aicc,
            r2,
            adj_r2,
        }
    }
}
