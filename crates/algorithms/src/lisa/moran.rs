//! Local Moran's I and its conditional permutation test
//!
//! I_i = z1_i · Σ_j w_ij z2_j. Under conditional randomization z1_i stays at
//! i while the k_i neighbor values are drawn without replacement from the
//! other n − 1 observations.
//!
//! Reference:
//! Anselin, L. (1995). Local Indicators of Spatial Association - LISA.
//! Geographical Analysis, 27(2), 93-115.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use geolocus_core::{Error, Result};

use crate::weights::SpatialWeights;

/// Permutation test controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationParams {
    /// Number of conditional permutations R
    pub permutations: usize,
    /// Run seed; each observation derives its own stream from it
    pub seed: u64,
}

impl Default for PermutationParams {
    fn default() -> Self {
        Self {
            permutations: 999,
            seed: 123_456_789,
        }
    }
}

impl PermutationParams {
    pub fn validate(&self) -> Result<()> {
        if self.permutations == 0 {
            return Err(Error::invalid("permutations", self.permutations, "must be at least 1"));
        }
        Ok(())
    }
}

/// Result of the permutation test at one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationOutcome {
    /// Two-sided folded pseudo p-value
    pub p_value: f64,
    /// Mean of the reference distribution
    pub mean: f64,
    /// Variance of the reference distribution
    pub variance: f64,
}

impl PermutationOutcome {
    /// A reference distribution without spread carries no evidence
    pub fn is_degenerate(&self) -> bool {
        !(self.variance > 0.0)
    }
}

/// Local statistic at `i`
pub fn local_statistic(i: usize, z1: &[f64], z2: &[f64], weights: &SpatialWeights) -> f64 {
    if weights.is_isolate(i) {
        return f64::NAN;
    }
    z1[i] * weights.lag_at(i, z2)
}

/// SplitMix64 finalizer
fn mix(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Seed of observation `i`'s random stream
pub(crate) fn stream_seed(seed: u64, i: usize) -> u64 {
    mix(seed.wrapping_add((i as u64).wrapping_add(1).wrapping_mul(0x9e3779b97f4a7c15)))
}

/// Conditional permutation test for observation `i` with observed statistic
/// `observed`. Ties with the observed value count as extreme on both sides.
pub fn permutation_test(
    i: usize,
    z1: &[f64],
    z2: &[f64],
    weights: &SpatialWeights,
    observed: f64,
    params: &PermutationParams,
) -> PermutationOutcome {
    let n = z2.len();
    let nbr_weights = weights.weights(i);
    let k = nbr_weights.len();
    let r = params.permutations;
    let mut rng = StdRng::seed_from_u64(stream_seed(params.seed, i));

    let mut upper = 0usize;
    let mut lower = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;

    for draw in 0..r {
        let sample = index::sample(&mut rng, n - 1, k);
        let lag: f64 = sample
            .iter()
            .zip(nbr_weights)
            .map(|(idx, &w)| {
                // Skip over i itself
                let j = if idx >= i { idx + 1 } else { idx };
                w * z2[j]
            })
            .sum();
        let stat = z1[i] * lag;

        if stat >= observed {
            upper += 1;
        }
        if stat <= observed {
            lower += 1;
        }

        let delta = stat - mean;
        mean += delta / (draw + 1) as f64;
        m2 += delta * (stat - mean);
    }

    let denom = (r + 1) as f64;
    let p_upper = (1 + upper) as f64 / denom;
    let p_lower = (1 + lower) as f64 / denom;

    PermutationOutcome {
        p_value: (2.0 * p_upper.min(p_lower)).min(1.0),
        mean,
        variance: if r > 1 { m2 / (r - 1) as f64 } else { 0.0 },
    }
}
