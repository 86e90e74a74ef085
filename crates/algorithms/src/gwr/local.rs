//! Per-location weighted least squares
//!
//! At location i the kernel row w_i weights every observation and
//! β_i = (XᵀW_iX)⁻¹XᵀW_iy. The hat-matrix row is s_i = x_iᵀ(XᵀW_iX)⁻¹XᵀW_i;
//! only S_ii and ‖s_i‖² are kept, together with diag(C_iC_iᵀ) for the
//! coefficient standard errors (C_i = (XᵀW_iX)⁻¹XᵀW_i).

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1};

use geolocus_parallel::Execution;
use geolocus_core::Result;

use crate::kernel::{Bandwidth, Kernel};
use crate::linalg::{invert, weighted_normal_equations};
use crate::weights::DistanceWeights;

/// Outcome of the local fit at one location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStatus {
    Ok,
    /// No other observation has a positive weight
    Isolate,
    /// Too few weighted observations or a singular XᵀWX
    RankDeficient,
    /// Robust iterations still moving at the cap; last iterate kept
    NotConverged,
}

impl LocalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LocalStatus::Ok => "ok",
            LocalStatus::Isolate => "isolate",
            LocalStatus::RankDeficient => "rank-deficient",
            LocalStatus::NotConverged => "not converged",
        }
    }
}

impl fmt::Display for LocalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of the hat-matrix row to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FitDetail {
    /// Own weight zeroed; only the prediction of y_i
    LeaveOneOut,
    /// Fitted value and S_ii
    Hat,
    /// Fitted value, S_ii, ‖s_i‖² and variance factors
    Full,
}

/// Raw local fit
#[derive(Debug, Clone)]
pub(crate) struct LocalFit {
    pub status: LocalStatus,
    pub beta: Array1<f64>,
    pub fitted: f64,
    pub s_ii: f64,
    pub s_norm2: f64,
    pub variance_factors: Array1<f64>,
}

impl LocalFit {
    fn undefined(status: LocalStatus, k: usize) -> Self {
        Self {
            status,
            beta: Array1::from_elem(k, f64::NAN),
            fitted: f64::NAN,
            s_ii: f64::NAN,
            s_norm2: f64::NAN,
            variance_factors: Array1::from_elem(k, f64::NAN),
        }
    }

    /// Whether coefficients and fitted value exist
    pub fn is_defined(&self) -> bool {
        matches!(self.status, LocalStatus::Ok | LocalStatus::NotConverged)
    }
}

/// Design matrix, response and locations of one GWR run
#[derive(Debug, Clone)]
pub(crate) struct LocalModel {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub locations: DistanceWeights,
    pub kernel: Kernel,
}

impl LocalModel {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Number of coefficients (intercept included)
    pub fn coefficients(&self) -> usize {
        self.x.ncols()
    }

    /// Kernel row of location i, optionally multiplied by robustness weights
    pub fn weights_at(&self, i: usize, bandwidth: Bandwidth, robustness: Option<&[f64]>) -> Vec<f64> {
        let n = self.len();
        let mut row = vec![0.0; n];
        let mut scratch = Vec::with_capacity(n);
        self.locations
            .kernel_row(i, bandwidth, self.kernel, &mut row, &mut scratch);
        if let Some(rw) = robustness {
            for (w, r) in row.iter_mut().zip(rw) {
                *w *= r;
            }
        }
        row
    }

    /// Fit the local regression at location `i`.
    pub fn fit_location(
        &self,
        i: usize,
        bandwidth: Bandwidth,
        robustness: Option<&[f64]>,
        detail: FitDetail,
    ) -> LocalFit {
        let k = self.coefficients();
        let mut w = self.weights_at(i, bandwidth, robustness);
        if detail == FitDetail::LeaveOneOut {
            w[i] = 0.0;
        }

        let others = w
            .iter()
            .enumerate()
            .filter(|&(j, &wj)| j != i && wj > 0.0)
            .count();
        if others == 0 {
            return LocalFit::undefined(LocalStatus::Isolate, k);
        }
        let positive = others + usize::from(w[i] > 0.0);
        if positive < k {
            return LocalFit::undefined(LocalStatus::RankDeficient, k);
        }

        let (xtwx, xtwy) = weighted_normal_equations(self.x.view(), self.y.view(), ArrayView1::from(&w[..]));
        let inv = match invert(xtwx.view()) {
            Some(inv) => inv,
            None => return LocalFit::undefined(LocalStatus::RankDeficient, k),
        };

        let beta = inv.dot(&xtwy);
        let xi = self.x.row(i);
        let fitted = xi.dot(&beta);
        let mut fit = LocalFit {
            status: LocalStatus::Ok,
            beta,
            fitted,
            s_ii: f64::NAN,
            s_norm2: f64::NAN,
            variance_factors: Array1::from_elem(k, f64::NAN),
        };

        match detail {
            FitDetail::LeaveOneOut => {}
            FitDetail::Hat => {
                let a = inv.dot(&xi);
                fit.s_ii = a.dot(&xi) * w[i];
            }
            FitDetail::Full => {
                // XᵀWX is symmetric, so x_iᵀ(XᵀWX)⁻¹ = ((XᵀWX)⁻¹x_i)ᵀ
                let a = inv.dot(&xi);
                let mut s_norm2 = 0.0;
                let mut var = Array1::<f64>::zeros(k);
                for (j, &wj) in w.iter().enumerate() {
                    if wj == 0.0 {
                        continue;
                    }
                    let xj = self.x.row(j);
                    let s = a.dot(&xj) * wj;
                    s_norm2 += s * s;
                    let c = inv.dot(&xj);
                    var.zip_mut_with(&c, |v, &cj| *v += wj * wj * cj * cj);
                }
                fit.s_ii = a.dot(&xi) * w[i];
                fit.s_norm2 = s_norm2;
                fit.variance_factors = var;
            }
        }

        fit
    }

    /// Fit every location with full hat-matrix detail
    pub fn fit_all(
        &self,
        bandwidth: Bandwidth,
        robustness: Option<&[f64]>,
        exec: &Execution,
    ) -> Result<Vec<LocalFit>> {
        exec.map(self.len(), |i| {
            self.fit_location(i, bandwidth, robustness, FitDetail::Full)
        })
    }

    /// Local R² at every location: 1 − RSS_w / TSS_w with the kernel
    /// weights of location i over all observations that have a fitted
    /// value. TSS_w is taken around the kernel-weighted mean of y at i.
    pub fn local_r2(&self, bandwidth: Bandwidth, fits: &[LocalFit], exec: &Execution) -> Result<Vec<f64>> {
        let defined: Vec<bool> = fits.iter().map(LocalFit::is_defined).collect();

        exec.map(self.len(), |i| {
            if !defined[i] {
                return f64::NAN;
            }
            let w = self.weights_at(i, bandwidth, None);
            let used: Vec<usize> = (0..self.len()).filter(|&j| defined[j] && w[j] > 0.0).collect();

            let w_sum: f64 = used.iter().map(|&j| w[j]).sum();
            let mean = used.iter().map(|&j| w[j] * self.y[j]).sum::<f64>() / w_sum;

            let mut rss = 0.0;
            let mut tss = 0.0;
            for &j in &used {
                rss += w[j] * (self.y[j] - fits[j].fitted).powi(2);
                tss += w[j] * (self.y[j] - mean).powi(2);
            }
            if tss > 0.0 {
                1.0 - rss / tss
            } else {
                f64::NAN
            }
        })
    }
}
