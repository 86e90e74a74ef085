//! Distance-based weights
//!
//! Observations are reduced to a coordinate (the point itself, or the
//! centroid of a line/polygon). Distances are computed one row at a time
//! into a caller-provided buffer, so memory stays linear in N.

use geo::{Centroid, Coord, Geometry};
use geolocus_core::vector::geometry_kind;
use geolocus_core::{Error, Result};

use super::SpatialWeights;
use crate::kernel::{Bandwidth, Kernel};

/// Representative coordinate of every geometry
pub fn centroids(geometries: &[Geometry<f64>]) -> Result<Vec<Coord<f64>>> {
    geometries
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let c = match g {
                Geometry::Point(p) => Some(*p),
                other => other.centroid(),
            };
            c.filter(|p| p.x().is_finite() && p.y().is_finite())
                .map(|p| p.0)
                .ok_or_else(|| {
                    Error::Format(format!(
                        "feature {}: cannot derive a location from an empty {}",
                        i,
                        geometry_kind(g)
                    ))
                })
        })
        .collect()
}

/// Euclidean distances between observation locations
#[derive(Debug, Clone)]
pub struct DistanceWeights {
    coords: Vec<Coord<f64>>,
}

impl DistanceWeights {
    /// Locations from geometries (centroids for non-points)
    pub fn from_geometries(geometries: &[Geometry<f64>]) -> Result<Self> {
        Self::from_coords(centroids(geometries)?)
    }

    pub fn from_coords(coords: Vec<Coord<f64>>) -> Result<Self> {
        if coords.len() < 2 {
            return Err(Error::InsufficientData(format!(
                "distance weights need at least 2 observations, got {}",
                coords.len()
            )));
        }
        Ok(Self { coords })
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn coords(&self) -> &[Coord<f64>] {
        &self.coords
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        let a = self.coords[i];
        let b = self.coords[j];
        (a.x - b.x).hypot(a.y - b.y)
    }

    /// Fill `out` with distances from `i` to every observation (self included).
    pub fn distances_from(&self, i: usize, out: &mut [f64]) {
        let a = self.coords[i];
        for (d, b) in out.iter_mut().zip(&self.coords) {
            *d = (a.x - b.x).hypot(a.y - b.y);
        }
    }

    /// Kernel bandwidth at location `i` given its distance row.
    ///
    /// Adaptive: distance to the K-th nearest location, the location itself
    /// counting as first. If K exceeds N the farthest distance is scaled by K/N.
    pub fn local_bandwidth(bandwidth: Bandwidth, distances: &[f64], scratch: &mut Vec<f64>) -> f64 {
        match bandwidth {
            Bandwidth::Fixed(h) => h,
            Bandwidth::Adaptive(k) => {
                let n = distances.len();
                if k > n {
                    let max = distances.iter().copied().fold(0.0_f64, f64::max);
                    max * k as f64 / n as f64
                } else {
                    kth_smallest(distances, k.max(1) - 1, scratch)
                }
            }
        }
    }

    /// Kernel weights from `i` to every observation; returns the bandwidth used.
    pub fn kernel_row(
        &self,
        i: usize,
        bandwidth: Bandwidth,
        kernel: Kernel,
        out: &mut [f64],
        scratch: &mut Vec<f64>,
    ) -> f64 {
        self.distances_from(i, out);
        let h = Self::local_bandwidth(bandwidth, out, scratch);
        for d in out.iter_mut() {
            *d = kernel.weight(*d, h);
        }
        h
    }

    /// Distance from `i` to its m-th nearest other location (m ≥ 1)
    pub fn nearest_other(&self, i: usize, m: usize, scratch: &mut Vec<f64>) -> f64 {
        let mut row = vec![0.0; self.len()];
        self.distances_from(i, &mut row);
        let m = m.min(self.len() - 1);
        // Position 0 of the sorted row is the location itself
        kth_smallest(&row, m, scratch)
    }

    /// Largest distance between any two locations
    pub fn max_distance(&self) -> f64 {
        let mut row = vec![0.0; self.len()];
        let mut max = 0.0_f64;
        for i in 0..self.len() {
            self.distances_from(i, &mut row);
            max = row[i..].iter().copied().fold(max, f64::max);
        }
        max
    }

    /// Neighbor structure of positive kernel weights, self excluded
    pub fn to_spatial_weights(&self, bandwidth: Bandwidth, kernel: Kernel) -> Result<SpatialWeights> {
        bandwidth.validate()?;
        let n = self.len();
        let mut row = vec![0.0; n];
        let mut scratch = Vec::with_capacity(n);
        let mut neighbors = Vec::with_capacity(n);
        let mut weights = Vec::with_capacity(n);

        for i in 0..n {
            self.kernel_row(i, bandwidth, kernel, &mut row, &mut scratch);
            let (nb, wt): (Vec<usize>, Vec<f64>) = row
                .iter()
                .enumerate()
                .filter(|&(j, &w)| j != i && w > 0.0)
                .map(|(j, &w)| (j, w))
                .unzip();
            neighbors.push(nb);
            weights.push(wt);
        }

        SpatialWeights::from_parts(neighbors, weights)
    }
}

/// k-th smallest value (0-based) without sorting the whole row
fn kth_smallest(values: &[f64], k: usize, scratch: &mut Vec<f64>) -> f64 {
    scratch.clear();
    scratch.extend_from_slice(values);
    let k = k.min(scratch.len() - 1);
    let (_, kth, _) = scratch.select_nth_unstable_by(k, |a, b| a.total_cmp(b));
    *kth
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};

    fn line_points(n: usize) -> DistanceWeights {
        DistanceWeights::from_coords((0..n).map(|i| Coord { x: i as f64, y: 0.0 }).collect()).unwrap()
    }

    #[test]
    fn test_centroids() {
        let geoms = vec![
            Geometry::Point(Point::new(3.0, 4.0)),
            Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 2.0, y: 0.0),
                (x: 2.0, y: 2.0),
                (x: 0.0, y: 2.0),
                (x: 0.0, y: 0.0),
            ]),
        ];
        let c = centroids(&geoms).unwrap();
        assert_eq!(c[0], Coord { x: 3.0, y: 4.0 });
        assert!((c[1].x - 1.0).abs() < 1e-12 && (c[1].y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distances_from() {
        let w = line_points(4);
        let mut row = vec![0.0; 4];
        w.distances_from(1, &mut row);
        assert_eq!(row, vec![1.0, 0.0, 1.0, 2.0]);
        assert_eq!(w.max_distance(), 3.0);
    }

    #[test]
    fn test_adaptive_counts_self_first() {
        let mut scratch = Vec::new();
        let row = [1.0, 0.0, 1.0, 2.0];
        // Self, then two at distance 1
        assert_eq!(DistanceWeights::local_bandwidth(Bandwidth::Adaptive(2), &row, &mut scratch), 1.0);
        assert_eq!(DistanceWeights::local_bandwidth(Bandwidth::Adaptive(4), &row, &mut scratch), 2.0);
    }

    #[test]
    fn test_adaptive_beyond_n_scales() {
        let mut scratch = Vec::new();
        let row = [1.0, 0.0, 1.0, 2.0];
        let h = DistanceWeights::local_bandwidth(Bandwidth::Adaptive(8), &row, &mut scratch);
        assert_eq!(h, 4.0);
    }

    #[test]
    fn test_kernel_row_boxcar() {
        let w = line_points(5);
        let mut row = vec![0.0; 5];
        let mut scratch = Vec::new();
        let h = w.kernel_row(0, Bandwidth::Fixed(2.5), Kernel::Boxcar, &mut row, &mut scratch);
        assert_eq!(h, 2.5);
        assert_eq!(row, vec![1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_nearest_other() {
        let w = line_points(5);
        let mut scratch = Vec::new();
        assert_eq!(w.nearest_other(0, 1, &mut scratch), 1.0);
        assert_eq!(w.nearest_other(0, 3, &mut scratch), 3.0);
        assert_eq!(w.nearest_other(2, 2, &mut scratch), 1.0);
    }

    #[test]
    fn test_to_spatial_weights_excludes_self() {
        let w = line_points(4);
        let sw = w.to_spatial_weights(Bandwidth::Fixed(1.5), Kernel::Bisquare).unwrap();
        assert_eq!(sw.neighbors(0), &[1]);
        assert_eq!(sw.neighbors(1), &[0, 2]);
        assert!(sw.isolates().is_empty());
    }

    #[test]
    fn test_needs_two_locations() {
        assert!(DistanceWeights::from_coords(vec![Coord { x: 0.0, y: 0.0 }]).is_err());
    }
}
