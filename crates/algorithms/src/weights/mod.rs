//! Spatial weights
//!
//! - **contiguity**: queen/rook neighbors of polygons, higher orders by
//!   breadth-first expansion
//! - **distance**: Euclidean distances between observation coordinates,
//!   kernel weight rows for geographically weighted models
//!
//! [`SpatialWeights`] is the shared, read-only neighbor structure. Rows are
//! sorted by neighbor index, never contain the observation itself, and an
//! empty row marks an isolate.

mod contiguity;
mod distance;

pub use contiguity::{contiguity_weights, Contiguity, ContiguityParams};
pub use distance::{centroids, DistanceWeights};

use geolocus_core::{Error, Result};

/// Neighbor lists with per-neighbor weights
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialWeights {
    neighbors: Vec<Vec<usize>>,
    weights: Vec<Vec<f64>>,
    row_standardized: bool,
}

impl SpatialWeights {
    /// Binary weights (1 per neighbor) from neighbor lists.
    ///
    /// Lists are sorted and deduplicated. Self references and out-of-range
    /// indices are rejected.
    pub fn from_neighbors(neighbors: Vec<Vec<usize>>) -> Result<Self> {
        let weights = neighbors.iter().map(|row| vec![1.0; row.len()]).collect();
        Self::from_parts(neighbors, weights)
    }

    /// Weights from parallel neighbor/weight lists.
    pub fn from_parts(neighbors: Vec<Vec<usize>>, weights: Vec<Vec<f64>>) -> Result<Self> {
        let n = neighbors.len();
        if weights.len() != n {
            return Err(Error::Algorithm(format!(
                "{} neighbor rows but {} weight rows",
                n,
                weights.len()
            )));
        }

        let mut clean_neighbors = Vec::with_capacity(n);
        let mut clean_weights = Vec::with_capacity(n);

        for (i, (nbrs, ws)) in neighbors.into_iter().zip(weights).enumerate() {
            if nbrs.len() != ws.len() {
                return Err(Error::Algorithm(format!(
                    "observation {}: {} neighbors but {} weights",
                    i,
                    nbrs.len(),
                    ws.len()
                )));
            }
            let mut pairs: Vec<(usize, f64)> = nbrs.into_iter().zip(ws).collect();
            for &(j, w) in &pairs {
                if j == i {
                    return Err(Error::Algorithm(format!(
                        "observation {} lists itself as a neighbor",
                        i
                    )));
                }
                if j >= n {
                    return Err(Error::Algorithm(format!(
                        "observation {}: neighbor index {} out of range (n = {})",
                        i, j, n
                    )));
                }
                if !w.is_finite() || w < 0.0 {
                    return Err(Error::Algorithm(format!(
                        "observation {}: invalid weight {} for neighbor {}",
                        i, w, j
                    )));
                }
            }
            pairs.sort_by_key(|&(j, _)| j);
            pairs.dedup_by_key(|p| p.0);
            let (nb, wt): (Vec<usize>, Vec<f64>) = pairs.into_iter().unzip();
            clean_neighbors.push(nb);
            clean_weights.push(wt);
        }

        Ok(Self {
            neighbors: clean_neighbors,
            weights: clean_weights,
            row_standardized: false,
        })
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Sorted neighbor indices of observation `i`
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Weights aligned with [`neighbors`](Self::neighbors)
    pub fn weights(&self, i: usize) -> &[f64] {
        &self.weights[i]
    }

    /// Number of neighbors of observation `i`
    pub fn cardinality(&self, i: usize) -> usize {
        self.neighbors[i].len()
    }

    pub fn is_isolate(&self, i: usize) -> bool {
        self.neighbors[i].is_empty()
    }

    /// Indices of observations without neighbors
    pub fn isolates(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.is_isolate(i)).collect()
    }

    pub fn is_row_standardized(&self) -> bool {
        self.row_standardized
    }

    /// Copy with each row scaled to sum to 1. Isolates stay empty.
    pub fn row_standardized(&self) -> Self {
        let weights = self
            .weights
            .iter()
            .map(|row| {
                let sum: f64 = row.iter().sum();
                if sum > 0.0 {
                    row.iter().map(|w| w / sum).collect()
                } else {
                    row.clone()
                }
            })
            .collect();

        Self {
            neighbors: self.neighbors.clone(),
            weights,
            row_standardized: true,
        }
    }

    /// Weighted sum of neighbor values: Σ_j w_ij · values_j.
    ///
    /// NaN for isolates.
    pub fn lag_at(&self, i: usize, values: &[f64]) -> f64 {
        if self.is_isolate(i) {
            return f64::NAN;
        }
        self.neighbors[i]
            .iter()
            .zip(&self.weights[i])
            .map(|(&j, &w)| w * values[j])
            .sum()
    }

    /// Spatial lag of every observation
    pub fn spatial_lag(&self, values: &[f64]) -> Vec<f64> {
        (0..self.len()).map(|i| self.lag_at(i, values)).collect()
    }

    /// Smallest, largest and mean neighbor count
    pub fn cardinality_summary(&self) -> (usize, usize, f64) {
        let counts = self.neighbors.iter().map(Vec::len);
        let min = counts.clone().min().unwrap_or(0);
        let max = counts.clone().max().unwrap_or(0);
        let mean = if self.is_empty() {
            0.0
        } else {
            counts.sum::<usize>() as f64 / self.len() as f64
        };
        (min, max, mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> SpatialWeights {
        let neighbors = (0..n)
            .map(|i| {
                let mut v = Vec::new();
                if i > 0 {
                    v.push(i - 1);
                }
                if i + 1 < n {
                    v.push(i + 1);
                }
                v
            })
            .collect();
        SpatialWeights::from_neighbors(neighbors).unwrap()
    }

    #[test]
    fn test_rejects_self_loop() {
        let err = SpatialWeights::from_neighbors(vec![vec![0], vec![]]).unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(SpatialWeights::from_neighbors(vec![vec![5], vec![0]]).is_err());
    }

    #[test]
    fn test_rejects_negative_weight() {
        assert!(SpatialWeights::from_parts(vec![vec![1], vec![0]], vec![vec![-1.0], vec![1.0]]).is_err());
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let w = SpatialWeights::from_neighbors(vec![vec![2, 1, 2], vec![0], vec![0]]).unwrap();
        assert_eq!(w.neighbors(0), &[1, 2]);
        assert_eq!(w.weights(0), &[1.0, 1.0]);
    }

    #[test]
    fn test_row_standardized_sums_to_one() {
        let mut neighbors: Vec<Vec<usize>> = (0..5).map(|i| if i < 4 { vec![(i + 1) % 4] } else { vec![] }).collect();
        neighbors[0].push(2);
        let w = SpatialWeights::from_neighbors(neighbors).unwrap().row_standardized();
        assert!(w.is_row_standardized());
        for i in 0..w.len() {
            let sum: f64 = w.weights(i).iter().sum();
            if w.is_isolate(i) {
                assert_eq!(sum, 0.0);
            } else {
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
        assert_eq!(w.isolates(), vec![4]);
    }

    #[test]
    fn test_spatial_lag() {
        let w = line(4).row_standardized();
        let lag = w.spatial_lag(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(lag, vec![2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_lag_isolate_is_nan() {
        let w = SpatialWeights::from_neighbors(vec![vec![1], vec![0], vec![]]).unwrap();
        assert!(w.lag_at(2, &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_cardinality_summary() {
        let (min, max, mean) = line(4).cardinality_summary();
        assert_eq!((min, max), (1, 2));
        assert!((mean - 1.5).abs() < 1e-12);
    }
}
