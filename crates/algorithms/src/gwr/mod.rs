//! Geographically Weighted Regression
//!
//! Fits y = Xβ_i at every observation i by weighted least squares, the
//! weights decaying with distance from i through a [`Kernel`]. The
//! bandwidth is either given or chosen by golden-section search on CV or
//! AICc. A robust variant down-weights outliers by iterative re-weighting.
//!
//! Reference:
//! Fotheringham, A.S., Brunsdon, C., Charlton, M. (2002).
//! Geographically Weighted Regression: the analysis of spatially varying
//! relationships. Wiley.

mod bandwidth;
mod diagnostics;
mod local;
mod ols;
mod robust;

pub use bandwidth::{Criterion, SearchParams, SearchReport};
pub use diagnostics::GwrDiagnostics;
pub use local::LocalStatus;
pub use ols::{global_ols, GlobalFit};
pub use robust::{robustness_weight, RobustParams, RobustReport};

use std::collections::HashSet;

use ndarray::{Array1, Array2};
use tracing::{info, warn};

use geolocus_core::{Algorithm, Dataset, Error, Result};
use geolocus_parallel::Execution;

use crate::kernel::{Bandwidth, Kernel};
use crate::weights::DistanceWeights;
use local::{LocalFit, LocalModel};

/// Name of the intercept coefficient
pub const INTERCEPT: &str = "Intercept";

/// How the bandwidth is obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandwidthSpec {
    /// Golden-section search on a criterion
    Search { criterion: Criterion, adaptive: bool },
    /// Caller-provided bandwidth, used unchanged
    Manual(Bandwidth),
}

impl Default for BandwidthSpec {
    fn default() -> Self {
        BandwidthSpec::Search {
            criterion: Criterion::Cv,
            adaptive: false,
        }
    }
}

/// Parameters for GWR
#[derive(Debug, Clone, Default)]
pub struct GwrParams {
    /// Response column
    pub dependent: String,
    /// Covariate columns; an intercept is always added
    pub independents: Vec<String>,
    pub kernel: Kernel,
    pub bandwidth: BandwidthSpec,
    /// Z-score the response and covariates (sample standard deviation)
    pub standardize: bool,
    /// Robust re-weighting; `None` for the ordinary fit
    pub robust: Option<RobustParams>,
    pub search: SearchParams,
    pub execution: Execution,
}

impl GwrParams {
    pub fn validate(&self) -> Result<()> {
        if self.dependent.is_empty() {
            return Err(Error::invalid("dependent", "", "a dependent variable is required"));
        }
        if self.independents.is_empty() {
            return Err(Error::invalid("independents", "", "at least one independent variable is required"));
        }
        let mut seen = HashSet::new();
        for name in &self.independents {
            if name == &self.dependent {
                return Err(Error::invalid("independents", name, "the dependent variable cannot be a covariate"));
            }
            if name == INTERCEPT {
                return Err(Error::invalid("independents", name, "the intercept is added automatically"));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::invalid("independents", name, "listed more than once"));
            }
        }
        if let BandwidthSpec::Manual(bw) = self.bandwidth {
            bw.validate()?;
        }
        self.search.validate()?;
        if let Some(robust) = &self.robust {
            robust.validate()?;
        }
        Ok(())
    }
}

/// Local result at one observation
#[derive(Debug, Clone, PartialEq)]
pub struct GwrLocalResult {
    pub fitted: f64,
    pub residual: f64,
    pub local_r2: f64,
    /// Intercept first, then covariates in parameter order
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub status: LocalStatus,
}

/// Complete GWR output
#[derive(Debug, Clone)]
pub struct GwrOutput {
    /// `Intercept` followed by the covariate names
    pub coefficient_names: Vec<String>,
    pub locals: Vec<GwrLocalResult>,
    pub diagnostics: GwrDiagnostics,
    /// Global OLS fit; absent when the global design is singular
    pub global: Option<GlobalFit>,
    pub kernel: Kernel,
    pub bandwidth: Bandwidth,
    pub search: Option<SearchReport>,
    pub robust: Option<RobustReport>,
    pub standardized: bool,
}

impl GwrOutput {
    /// Number of locations with the given status
    pub fn count(&self, status: LocalStatus) -> usize {
        self.locals.iter().filter(|l| l.status == status).count()
    }

    /// Coefficient estimates of one term across all locations
    pub fn coefficient(&self, index: usize) -> Vec<f64> {
        self.locals.iter().map(|l| l.coefficients[index]).collect()
    }
}

/// GWR algorithm
#[derive(Debug, Clone, Default)]
pub struct Gwr;

impl Algorithm for Gwr {
    type Input = Dataset;
    type Output = GwrOutput;
    type Params = GwrParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "GWR"
    }

    fn description(&self) -> &'static str {
        "Geographically weighted regression with kernel bandwidth selection"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        gwr(&input, &params)
    }
}

/// Sample mean and standard deviation (n − 1)
fn mean_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

fn zscore(name: &str, values: &mut [f64]) -> Result<()> {
    let (mean, sd) = mean_sd(values);
    if !(sd > 0.0) {
        return Err(Error::invalid(
            "standardize",
            name,
            "variable is constant and cannot be standardized",
        ));
    }
    for v in values.iter_mut() {
        *v = (*v - mean) / sd;
    }
    Ok(())
}

/// Build the response vector and design matrix (intercept column first)
/// from a private copy of the analysis columns.
fn design(dataset: &Dataset, params: &GwrParams) -> Result<(Array1<f64>, Array2<f64>)> {
    let table = dataset.table();
    let n = dataset.len();

    let mut y = table.complete_numeric_column(&params.dependent)?;
    let mut covariates = params
        .independents
        .iter()
        .map(|name| table.complete_numeric_column(name))
        .collect::<Result<Vec<_>>>()?;

    if params.standardize {
        zscore(&params.dependent, &mut y)?;
        for (name, col) in params.independents.iter().zip(covariates.iter_mut()) {
            zscore(name, col)?;
        }
    }

    let k = covariates.len() + 1;
    let mut x = Array2::<f64>::ones((n, k));
    for (c, col) in covariates.iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            x[(i, c + 1)] = v;
        }
    }

    Ok((Array1::from(y), x))
}

/// Run GWR on a dataset.
///
/// # Errors
/// Input errors (missing or non-numeric columns, missing values, invalid
/// parameters), too few observations, a failed bandwidth search, or no
/// location with a defined local fit.
pub fn gwr(dataset: &Dataset, params: &GwrParams) -> Result<GwrOutput> {
    params.validate()?;
    let exec = &params.execution;

    let n = dataset.len();
    let k = params.independents.len() + 1;
    if n <= k {
        return Err(Error::InsufficientData(format!(
            "GWR with {} coefficients needs more than {} observations, got {}",
            k, k, n
        )));
    }

    let (y, x) = design(dataset, params)?;
    let model = LocalModel {
        x,
        y,
        locations: DistanceWeights::from_geometries(dataset.geometries())?,
        kernel: params.kernel,
    };

    let global = global_ols(model.x.view(), model.y.view());
    if global.is_none() {
        warn!("global design matrix is singular; global OLS diagnostics unavailable");
    }

    let (bandwidth, search) = match params.bandwidth {
        BandwidthSpec::Manual(bw) => (bw, None),
        BandwidthSpec::Search { criterion, adaptive } => {
            let (bw, report) = bandwidth::select_bandwidth(&model, criterion, adaptive, &params.search, exec)?;
            info!(bandwidth = %bw, %criterion, score = report.score, "selected bandwidth");
            (bw, Some(report))
        }
    };
    exec.checkpoint()?;

    let (fits, robust) = match &params.robust {
        Some(rp) => {
            let (fits, report) = robust::robust_fit(&model, bandwidth, rp, exec)?;
            (fits, Some(report))
        }
        None => (model.fit_all(bandwidth, None, exec)?, None),
    };

    if !fits.iter().any(LocalFit::is_defined) {
        return Err(Error::NoValidResults {
            analysis: "GWR",
            total: n,
        });
    }

    let diagnostics = GwrDiagnostics::from_fits(&model.y, &fits);
    let local_r2 = model.local_r2(bandwidth, &fits, exec)?;

    let locals: Vec<GwrLocalResult> = fits
        .iter()
        .zip(&local_r2)
        .zip(model.y.iter())
        .map(|((fit, &r2), &yi)| GwrLocalResult {
            fitted: fit.fitted,
            residual: yi - fit.fitted,
            local_r2: r2,
            coefficients: fit.beta.to_vec(),
            std_errors: fit
                .variance_factors
                .iter()
                .map(|v| (v * diagnostics.sigma2).sqrt())
                .collect(),
            status: fit.status,
        })
        .collect();

    let mut coefficient_names = vec![INTERCEPT.to_string()];
    coefficient_names.extend(params.independents.iter().cloned());

    let output = GwrOutput {
        coefficient_names,
        locals,
        diagnostics,
        global,
        kernel: params.kernel,
        bandwidth,
        search,
        robust,
        standardized: params.standardize,
    };

    let isolates = output.count(LocalStatus::Isolate);
    let rank_deficient = output.count(LocalStatus::RankDeficient);
    if isolates > 0 {
        warn!(isolates, "locations without weighted neighbors");
    }
    if rank_deficient > 0 {
        warn!(rank_deficient, "locations with a rank-deficient local design");
    }
    info!(
        observations = n,
        valid = output.diagnostics.observations,
        aicc = output.diagnostics.aicc,
        r2 = output.diagnostics.r2,
        "GWR complete"
    );

    Ok(output)
}
