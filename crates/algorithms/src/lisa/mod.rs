//! Local Indicators of Spatial Association
//!
//! Local Moran's I over polygon contiguity weights, univariate or bivariate,
//! with conditional-permutation pseudo p-values and cluster classification.

mod cluster;
mod moran;

pub use cluster::LisaCluster;
pub use moran::{local_statistic, permutation_test, PermutationOutcome, PermutationParams};

use tracing::{info, warn};

use geolocus_core::{Algorithm, Dataset, Error, Result};
use geolocus_parallel::Execution;

use crate::weights::{contiguity_weights, ContiguityParams, SpatialWeights};

/// Analysed variable(s)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LisaVariables {
    /// I_i = z_i · Σ w_ij z_j
    Univariate(String),
    /// I_i = z1_i · Σ w_ij z2_j, `lag` being the neighbor variable
    Bivariate { focal: String, lag: String },
}

impl Default for LisaVariables {
    fn default() -> Self {
        LisaVariables::Univariate(String::new())
    }
}

impl LisaVariables {
    pub fn names(&self) -> Vec<&str> {
        match self {
            LisaVariables::Univariate(x) => vec![x.as_str()],
            LisaVariables::Bivariate { focal, lag } => vec![focal.as_str(), lag.as_str()],
        }
    }
}

/// Parameters for local Moran's I
#[derive(Debug, Clone)]
pub struct LisaParams {
    pub variables: LisaVariables,
    /// Divide deviations by the sample standard deviation
    pub standardize: bool,
    pub weights: ContiguityParams,
    /// Pseudo p-value threshold in (0, 1]
    pub significance: f64,
    pub permutations: PermutationParams,
    pub execution: Execution,
}

impl Default for LisaParams {
    fn default() -> Self {
        Self {
            variables: LisaVariables::default(),
            standardize: false,
            weights: ContiguityParams::default(),
            significance: 0.05,
            permutations: PermutationParams::default(),
            execution: Execution::default(),
        }
    }
}

impl LisaParams {
    pub fn validate(&self) -> Result<()> {
        if self.variables.names().iter().any(|n| n.is_empty()) {
            return Err(Error::invalid("variables", "", "a variable name is required"));
        }
        if !(self.significance > 0.0 && self.significance <= 1.0) {
            return Err(Error::invalid("significance", self.significance, "must be in (0, 1]"));
        }
        self.weights.validate()?;
        self.permutations.validate()
    }
}

/// Local result at one observation
#[derive(Debug, Clone, PartialEq)]
pub struct LisaLocalResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Weighted sum of neighbor deviations (of the lag variable)
    pub lag: f64,
    pub neighbors: usize,
    pub cluster: LisaCluster,
}

/// Complete LISA output
#[derive(Debug, Clone)]
pub struct LisaOutput {
    pub variables: LisaVariables,
    pub locals: Vec<LisaLocalResult>,
    pub significance: f64,
    pub permutations: usize,
    /// Smallest, largest and mean neighbor count
    pub cardinality: (usize, usize, f64),
}

impl LisaOutput {
    pub fn count(&self, cluster: LisaCluster) -> usize {
        self.locals.iter().filter(|l| l.cluster == cluster).count()
    }
}

/// Local Moran's I algorithm
#[derive(Debug, Clone, Default)]
pub struct Lisa;

impl Algorithm for Lisa {
    type Input = Dataset;
    type Output = LisaOutput;
    type Params = LisaParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "LISA"
    }

    fn description(&self) -> &'static str {
        "Local Moran's I with conditional permutation inference"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        lisa(&input, &params)
    }
}

/// Deviations from the mean, optionally scaled by the sample standard deviation
pub fn deviations(values: &[f64], standardize: bool) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let mut z: Vec<f64> = values.iter().map(|v| v - mean).collect();
    if standardize {
        let sd = (z.iter().map(|d| d * d).sum::<f64>() / (n - 1.0)).sqrt();
        if sd > 0.0 {
            z.iter_mut().for_each(|d| *d /= sd);
        }
    }
    z
}

/// Local Moran's I with permutation inference for prepared deviations.
///
/// `z1` is the focal variable, `z2` the variable whose spatial lag is taken
/// (the same slice for the univariate statistic).
pub fn local_moran(
    z1: &[f64],
    z2: &[f64],
    weights: &SpatialWeights,
    significance: f64,
    permutations: &PermutationParams,
    exec: &Execution,
) -> Result<Vec<LisaLocalResult>> {
    let n = weights.len();
    if z1.len() != n || z2.len() != n {
        return Err(Error::Algorithm(format!(
            "{} weights rows for {} and {} values",
            n,
            z1.len(),
            z2.len()
        )));
    }

    exec.map(n, |i| {
        let neighbors = weights.cardinality(i);
        let isolated = neighbors == 0;

        let (statistic, lag) = if isolated {
            (f64::NAN, f64::NAN)
        } else {
            let lag = weights.lag_at(i, z2);
            (z1[i] * lag, lag)
        };
        let (p_value, defined) = if statistic.is_finite() {
            let outcome = permutation_test(i, z1, z2, weights, statistic, permutations);
            (outcome.p_value, !outcome.is_degenerate())
        } else {
            (f64::NAN, false)
        };

        LisaLocalResult {
            statistic,
            p_value,
            lag,
            neighbors,
            cluster: LisaCluster::classify(isolated, defined, z1[i], lag, p_value, significance),
        }
    })
}

/// Run LISA on a polygon dataset.
///
/// # Errors
/// Input errors (missing or non-numeric columns, missing values, invalid
/// parameters or non-polygon geometries), fewer than 2 observations, or no
/// observation with a defined statistic.
pub fn lisa(dataset: &Dataset, params: &LisaParams) -> Result<LisaOutput> {
    params.validate()?;
    let exec = &params.execution;
    let table = dataset.table();

    let (z1, z2) = match &params.variables {
        LisaVariables::Univariate(name) => {
            let z = deviations(&table.complete_numeric_column(name)?, params.standardize);
            (z.clone(), z)
        }
        LisaVariables::Bivariate { focal, lag } => (
            deviations(&table.complete_numeric_column(focal)?, params.standardize),
            deviations(&table.complete_numeric_column(lag)?, params.standardize),
        ),
    };

    let weights = contiguity_weights(dataset.geometries(), &params.weights)?;
    let isolates = weights.isolates();
    if !isolates.is_empty() {
        warn!(count = isolates.len(), "observations without neighbors are classified Isolated");
    }
    exec.checkpoint()?;

    let locals = local_moran(
        &z1,
        &z2,
        &weights,
        params.significance,
        &params.permutations,
        exec,
    )?;

    let output = LisaOutput {
        variables: params.variables.clone(),
        locals,
        significance: params.significance,
        permutations: params.permutations.permutations,
        cardinality: weights.cardinality_summary(),
    };

    let valid = output
        .locals
        .iter()
        .filter(|l| !matches!(l.cluster, LisaCluster::Isolated | LisaCluster::Undefined))
        .count();
    if valid == 0 {
        return Err(Error::NoValidResults {
            analysis: "LISA",
            total: dataset.len(),
        });
    }

    let significant = output.locals.iter().filter(|l| l.cluster.is_significant()).count();
    info!(
        observations = dataset.len(),
        significant,
        undefined = output.count(LisaCluster::Undefined),
        isolated = isolates.len(),
        "LISA complete"
    );

    Ok(output)
}
