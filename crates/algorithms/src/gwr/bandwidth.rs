//! Bandwidth selection by golden-section search
//!
//! Every candidate bandwidth is scored by a full pass over all locations:
//!
//! - **CV**: Σ (y_i − ŷ_{≠i})², each location predicted with its own weight
//!   set to zero
//! - **AICc**: corrected Akaike criterion of the fit
//!
//! A candidate at which any location has no defined fit scores +∞.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use geolocus_core::{Error, Result};
use geolocus_parallel::Execution;
use tracing::{debug, warn};

use super::diagnostics::information_criteria;
use super::local::{FitDetail, LocalModel};
use crate::kernel::Bandwidth;

/// Golden ratio conjugate used to place interior points
const GOLDEN: f64 = 0.61803399;

/// Score minimized by the search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criterion {
    /// Leave-one-out cross-validation
    #[default]
    Cv,
    /// Corrected Akaike information criterion
    Aicc,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Cv => f.write_str("CV"),
            Criterion::Aicc => f.write_str("AICc"),
        }
    }
}

impl FromStr for Criterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cv" => Ok(Criterion::Cv),
            "aicc" | "aic" => Ok(Criterion::Aicc),
            _ => Err(Error::invalid("approach", s, "use cv, aicc or none")),
        }
    }
}

/// Search controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Iteration cap; reaching it keeps the best candidate
    pub max_iterations: usize,
    /// Stop when the bracket is narrower than this fraction of the initial
    /// interval (fixed bandwidths only)
    pub tolerance: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-4,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::invalid("search iterations", self.max_iterations, "must be at least 1"));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(Error::invalid("search tolerance", self.tolerance, "must be in (0, 1)"));
        }
        Ok(())
    }
}

/// What the search did
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    pub criterion: Criterion,
    pub lower: f64,
    pub upper: f64,
    /// Criterion value at the chosen bandwidth
    pub score: f64,
    pub iterations: usize,
    /// Distinct bandwidths scored
    pub evaluations: usize,
    /// False when the iteration cap was hit
    pub converged: bool,
}

/// Criterion value of one bandwidth
pub(crate) fn score(model: &LocalModel, bandwidth: Bandwidth, criterion: Criterion, exec: &Execution) -> Result<f64> {
    match criterion {
        Criterion::Cv => {
            let errors = exec.map(model.len(), |i| {
                let fit = model.fit_location(i, bandwidth, None, FitDetail::LeaveOneOut);
                if fit.is_defined() {
                    Some((model.y[i] - fit.fitted).powi(2))
                } else {
                    None
                }
            })?;
            Ok(errors
                .into_iter()
                .try_fold(0.0, |acc, e| e.map(|v| acc + v))
                .unwrap_or(f64::INFINITY))
        }
        Criterion::Aicc => {
            let fits = exec.map(model.len(), |i| {
                let fit = model.fit_location(i, bandwidth, None, FitDetail::Hat);
                if fit.is_defined() {
                    Some(((model.y[i] - fit.fitted).powi(2), fit.s_ii))
                } else {
                    None
                }
            })?;
            let totals = fits
                .into_iter()
                .try_fold((0.0, 0.0), |(rss, trs), f| f.map(|(e, s)| (rss + e, trs + s)));
            Ok(match totals {
                Some((rss, tr_s)) => information_criteria(model.len(), rss, tr_s).1,
                None => f64::INFINITY,
            })
        }
    }
}

/// Search interval for the current model
fn bounds(model: &LocalModel, adaptive: bool) -> (f64, f64) {
    let n = model.len();
    let p = model.coefficients() - 1;
    if adaptive {
        (((p + 2).min(n)) as f64, n as f64)
    } else {
        let mut scratch = Vec::with_capacity(n);
        let lower = (0..n)
            .map(|i| model.locations.nearest_other(i, p + 1, &mut scratch))
            .fold(0.0_f64, f64::max);
        let upper = model.locations.max_distance();
        (lower.min(upper), upper)
    }
}

fn to_bandwidth(x: f64, adaptive: bool) -> Bandwidth {
    if adaptive {
        Bandwidth::Adaptive(x.round().max(1.0) as usize)
    } else {
        Bandwidth::Fixed(x)
    }
}

/// Golden-section search for the bandwidth minimizing `criterion`.
pub(crate) fn select_bandwidth(
    model: &LocalModel,
    criterion: Criterion,
    adaptive: bool,
    params: &SearchParams,
    exec: &Execution,
) -> Result<(Bandwidth, SearchReport)> {
    let (lower, upper) = bounds(model, adaptive);
    debug!(lower, upper, adaptive, %criterion, "bandwidth search interval");

    let tol = if adaptive {
        1.0
    } else {
        params.tolerance * (upper - lower)
    };
    let round = |v: f64| if adaptive { v.round() } else { v };

    let mut memo: HashMap<u64, f64> = HashMap::new();
    let mut best: Option<(f64, f64)> = None;

    let mut eval = |x: f64| -> Result<f64> {
        exec.checkpoint()?;
        if let Some(&s) = memo.get(&x.to_bits()) {
            return Ok(s);
        }
        let s = score(model, to_bandwidth(x, adaptive), criterion, exec)?;
        debug!(bandwidth = x, score = s, "bandwidth candidate");
        memo.insert(x.to_bits(), s);
        if s.is_finite() && best.map_or(true, |(_, bs)| s < bs) {
            best = Some((x, s));
        }
        Ok(s)
    };

    let (mut a, mut b) = (lower, upper);
    let mut c = round(b - GOLDEN * (b - a));
    let mut d = round(a + GOLDEN * (b - a));
    let mut fc = eval(c)?;
    let mut fd = eval(d)?;
    let mut iterations = 0;
    let mut converged = false;

    loop {
        if b - a <= tol {
            converged = true;
            break;
        }
        if iterations >= params.max_iterations {
            break;
        }
        iterations += 1;

        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = round(b - GOLDEN * (b - a));
            fc = eval(c)?;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = round(a + GOLDEN * (b - a));
            fd = eval(d)?;
        }
    }

    // Integer candidates left inside the final bracket
    if adaptive {
        let mut k = a.floor();
        while k <= b.ceil() {
            if k >= lower && k <= upper {
                eval(k)?;
            }
            k += 1.0;
        }
    }

    let evaluations = memo.len();
    let (x, s) = best.ok_or_else(|| {
        Error::BandwidthSearchFailed(format!(
            "no candidate in [{}, {}] gave a finite {} for every location",
            lower, upper, criterion
        ))
    })?;

    if !converged {
        warn!(
            iterations,
            bandwidth = x,
            "bandwidth search hit the iteration cap; keeping the best candidate"
        );
    }

    Ok((
        to_bandwidth(x, adaptive),
        SearchReport {
            criterion,
            lower,
            upper,
            score: s,
            iterations,
            evaluations,
            converged,
        },
    ))
}
