//! Outlier-resistant GWR by iterative re-weighting
//!
//! Each pass standardizes the residuals of the previous fit,
//! r_j = e_j / (σ̂ · sqrt(1 − S_jj)), turns them into robustness weights and
//! refits with kernel × robustness weights.

use geolocus_core::{Error, Result};
use geolocus_parallel::Execution;
use tracing::{debug, warn};

use super::diagnostics::GwrDiagnostics;
use super::local::{LocalFit, LocalModel, LocalStatus};
use crate::kernel::Bandwidth;

/// Parameters for robust GWR
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustParams {
    /// Maximum number of re-weighting passes
    pub max_iterations: usize,
    /// Stop when no coefficient moves by this much
    pub tolerance: f64,
}

impl Default for RobustParams {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-5,
        }
    }
}

impl RobustParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::invalid("robust iterations", self.max_iterations, "must be at least 1"));
        }
        if !(self.tolerance > 0.0) || !self.tolerance.is_finite() {
            return Err(Error::invalid("robust tolerance", self.tolerance, "must be positive"));
        }
        Ok(())
    }
}

/// Robustness weight of a standardized residual
pub fn robustness_weight(r: f64) -> f64 {
    let a = r.abs();
    if a <= 2.0 {
        1.0
    } else if a <= 3.0 {
        let t = 1.0 - (a - 2.0).powi(2);
        t * t
    } else {
        0.0
    }
}

/// Outcome of the re-weighting loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustReport {
    pub iterations: usize,
    pub converged: bool,
    /// Largest coefficient change in the last pass
    pub max_change: f64,
    /// Observations whose final robustness weight is 0
    pub downweighted: usize,
}

pub(crate) fn robust_fit(
    model: &LocalModel,
    bandwidth: Bandwidth,
    params: &RobustParams,
    exec: &Execution,
) -> Result<(Vec<LocalFit>, RobustReport)> {
    let n = model.len();
    let mut fits = model.fit_all(bandwidth, None, exec)?;
    let mut moving = vec![false; n];
    let mut report = RobustReport {
        iterations: 0,
        converged: false,
        max_change: 0.0,
        downweighted: 0,
    };

    for iteration in 1..=params.max_iterations {
        exec.checkpoint()?;
        let rw = weights_from_residuals(model, &fits);
        let next = model.fit_all(bandwidth, Some(&rw), exec)?;

        let mut max_change = 0.0_f64;
        for (i, (old, new)) in fits.iter().zip(&next).enumerate() {
            let change = if old.is_defined() && new.is_defined() {
                old.beta
                    .iter()
                    .zip(new.beta.iter())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0, f64::max)
            } else {
                0.0
            };
            moving[i] = change >= params.tolerance;
            max_change = max_change.max(change);
        }

        fits = next;
        report.iterations = iteration;
        report.max_change = max_change;
        report.downweighted = rw.iter().filter(|&&w| w == 0.0).count();
        debug!(iteration, max_change, "robust GWR pass");

        if max_change < params.tolerance {
            report.converged = true;
            break;
        }
    }

    if !report.converged {
        let mut flagged = 0;
        for (fit, _) in fits.iter_mut().zip(&moving).filter(|(_, &m)| m) {
            if fit.status == LocalStatus::Ok {
                fit.status = LocalStatus::NotConverged;
                flagged += 1;
            }
        }
        warn!(
            iterations = report.iterations,
            max_change = report.max_change,
            locations = flagged,
            "robust GWR did not converge"
        );
    }

    Ok((fits, report))
}

fn weights_from_residuals(model: &LocalModel, fits: &[LocalFit]) -> Vec<f64> {
    let diag = GwrDiagnostics::from_fits(&model.y, fits);
    let sigma = diag.sigma2.sqrt();

    fits.iter()
        .zip(model.y.iter())
        .map(|(fit, &y)| {
            if !fit.is_defined() || !(sigma > 0.0) || !sigma.is_finite() {
                return 1.0;
            }
            let leverage = 1.0 - fit.s_ii;
            if leverage <= 0.0 {
                return 1.0;
            }
            robustness_weight((y - fit.fitted) / (sigma * leverage.sqrt()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use crate::weights::DistanceWeights;
    use geo::Coord;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_robustness_weight() {
        assert_eq!(robustness_weight(0.0), 1.0);
        assert_eq!(robustness_weight(-2.0), 1.0);
        assert!((robustness_weight(2.5) - 0.5625).abs() < 1e-12);
        assert_eq!(robustness_weight(3.0), 0.0);
        assert_eq!(robustness_weight(-7.0), 0.0);
    }

    #[test]
    fn test_validate() {
        assert!(RobustParams::default().validate().is_ok());
        let bad = RobustParams {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_outlier_downweighted() {
        let n = 30;
        let mut rng: u64 = 42;
        let mut x = Array2::<f64>::ones((n, 2));
        let mut y = Array1::<f64>::zeros(n);
        let mut coords = Vec::with_capacity(n);
        for i in 0..n {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = ((rng >> 33) as f64 / (1u64 << 31) as f64 - 0.5) * 0.2;
            let xi = (i % 6) as f64;
            x[(i, 1)] = xi;
            y[i] = 1.0 + 2.0 * xi + noise;
            coords.push(Coord { x: (i % 6) as f64, y: (i / 6) as f64 });
        }
        y[14] += 50.0;

        let model = LocalModel {
            x,
            y,
            locations: DistanceWeights::from_coords(coords).unwrap(),
            kernel: Kernel::Gaussian,
        };
        let exec = Execution::sequential();
        let bw = Bandwidth::Fixed(1e6);

        let plain = model.fit_all(bw, None, &exec).unwrap();
        let (robust, report) = robust_fit(&model, bw, &RobustParams::default(), &exec).unwrap();
        assert!(report.iterations >= 1);
        assert!(report.downweighted >= 1);

        let err = |fits: &[LocalFit]| (fits[0].beta[1] - 2.0).abs();
        assert!(err(&robust) < err(&plain));
        assert!(err(&robust) < 0.1);
    }
}
