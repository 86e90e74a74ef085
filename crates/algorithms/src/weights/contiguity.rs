//! Polygon contiguity weights
//!
//! Two polygons are queen neighbors when they share at least one boundary
//! vertex and rook neighbors when they share at least one boundary edge.
//! Coordinates are snapped to a grid of `precision` before matching so that
//! vertices written with slightly different rounding still meet.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use geo::{Coord, Geometry, Polygon};
use geolocus_core::vector::geometry_kind;
use geolocus_core::{Error, Result};

use super::SpatialWeights;

/// Contiguity rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Contiguity {
    /// Shared vertex
    #[default]
    Queen,
    /// Shared edge
    Rook,
}

impl fmt::Display for Contiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contiguity::Queen => f.write_str("queen"),
            Contiguity::Rook => f.write_str("rook"),
        }
    }
}

impl FromStr for Contiguity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "queen" => Ok(Contiguity::Queen),
            "rook" => Ok(Contiguity::Rook),
            _ => Err(Error::invalid("contiguity", s, "use queen or rook")),
        }
    }
}

/// Parameters for contiguity weights
#[derive(Debug, Clone)]
pub struct ContiguityParams {
    pub rule: Contiguity,
    /// Neighbor order K ≥ 1
    pub order: usize,
    /// Include all orders 1..=K instead of exactly K
    pub include_lower_order: bool,
    /// Scale each row to sum to 1
    pub row_standardize: bool,
    /// Snapping grid for vertex matching
    pub precision: f64,
}

impl Default for ContiguityParams {
    fn default() -> Self {
        Self {
            rule: Contiguity::Queen,
            order: 1,
            include_lower_order: false,
            row_standardize: true,
            precision: 1e-8,
        }
    }
}

impl ContiguityParams {
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(Error::invalid("order", self.order, "must be at least 1"));
        }
        if !self.precision.is_finite() || self.precision <= 0.0 {
            return Err(Error::invalid(
                "precision",
                self.precision,
                "must be a positive finite distance",
            ));
        }
        Ok(())
    }
}

type VertexKey = (i64, i64);

/// Build contiguity weights for polygonal geometries.
pub fn contiguity_weights(geometries: &[Geometry<f64>], params: &ContiguityParams) -> Result<SpatialWeights> {
    params.validate()?;
    let n = geometries.len();
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "contiguity weights need at least 2 observations, got {}",
            n
        )));
    }

    let polygons = geometries
        .iter()
        .enumerate()
        .map(|(i, g)| polygon_parts(i, g))
        .collect::<Result<Vec<_>>>()?;

    let first_order = match params.rule {
        Contiguity::Queen => queen_neighbors(&polygons, params.precision),
        Contiguity::Rook => rook_neighbors(&polygons, params.precision),
    };

    let neighbors = if params.order == 1 {
        first_order
    } else {
        higher_order(&first_order, params.order, params.include_lower_order)
    };

    let weights = SpatialWeights::from_neighbors(neighbors)?;
    Ok(if params.row_standardize {
        weights.row_standardized()
    } else {
        weights
    })
}

fn polygon_parts(index: usize, geom: &Geometry<f64>) -> Result<Vec<Polygon<f64>>> {
    match geom {
        Geometry::Polygon(p) => Ok(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => Ok(mp.0.clone()),
        Geometry::Rect(r) => Ok(vec![r.to_polygon()]),
        Geometry::Triangle(t) => Ok(vec![t.to_polygon()]),
        other => Err(Error::invalid(
            "geometry",
            format!("{} at feature {}", geometry_kind(other), index),
            "contiguity weights need polygon geometries",
        )),
    }
}

#[inline]
fn snap(c: Coord<f64>, precision: f64) -> VertexKey {
    ((c.x / precision).round() as i64, (c.y / precision).round() as i64)
}

/// Snapped ring vertices of every ring of every part
fn rings(parts: &[Polygon<f64>], precision: f64) -> Vec<Vec<VertexKey>> {
    parts
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .map(|ring| ring.coords().map(|&c| snap(c, precision)).collect())
        .collect()
}

fn queen_neighbors(polygons: &[Vec<Polygon<f64>>], precision: f64) -> Vec<Vec<usize>> {
    let mut by_vertex: HashMap<VertexKey, Vec<usize>> = HashMap::new();
    for (i, parts) in polygons.iter().enumerate() {
        let vertices: HashSet<VertexKey> = rings(parts, precision).into_iter().flatten().collect();
        for v in vertices {
            by_vertex.entry(v).or_default().push(i);
        }
    }
    collect_pairs(polygons.len(), by_vertex.into_values())
}

fn rook_neighbors(polygons: &[Vec<Polygon<f64>>], precision: f64) -> Vec<Vec<usize>> {
    let mut by_edge: HashMap<(VertexKey, VertexKey), Vec<usize>> = HashMap::new();
    for (i, parts) in polygons.iter().enumerate() {
        let mut edges = HashSet::new();
        for ring in rings(parts, precision) {
            for pair in ring.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a == b {
                    continue;
                }
                edges.insert(if a < b { (a, b) } else { (b, a) });
            }
        }
        for e in edges {
            by_edge.entry(e).or_default().push(i);
        }
    }
    collect_pairs(polygons.len(), by_edge.into_values())
}

/// Every pair of observations sharing a key becomes a neighbor pair
fn collect_pairs<I>(n: usize, groups: I) -> Vec<Vec<usize>>
where
    I: Iterator<Item = Vec<usize>>,
{
    let mut sets: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    for group in groups {
        if group.len() < 2 {
            continue;
        }
        for &a in &group {
            for &b in &group {
                if a != b {
                    sets[a].insert(b);
                }
            }
        }
    }
    sets.into_iter()
        .map(|s| {
            let mut v: Vec<usize> = s.into_iter().collect();
            v.sort_unstable();
            v
        })
        .collect()
}

/// Breadth-first expansion of a first-order graph to order `k`
fn higher_order(first: &[Vec<usize>], k: usize, include_lower: bool) -> Vec<Vec<usize>> {
    let n = first.len();
    let mut out = Vec::with_capacity(n);
    let mut depth = vec![usize::MAX; n];

    for start in 0..n {
        depth.iter_mut().for_each(|d| *d = usize::MAX);
        depth[start] = 0;
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(cur) = queue.pop_front() {
            let d = depth[cur];
            if d == k {
                continue;
            }
            for &nb in &first[cur] {
                if depth[nb] == usize::MAX {
                    depth[nb] = d + 1;
                    if d + 1 == k || include_lower {
                        found.push(nb);
                    }
                    queue.push_back(nb);
                }
            }
        }

        found.sort_unstable();
        out.push(found);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};

    fn square(x: f64, y: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ])
    }

    fn grid(cols: usize, rows: usize) -> Vec<Geometry<f64>> {
        let mut v = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                v.push(square(c as f64, r as f64));
            }
        }
        v
    }

    fn binary(rule: Contiguity) -> ContiguityParams {
        ContiguityParams {
            rule,
            row_standardize: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_queen_vs_rook_on_grid() {
        let g = grid(3, 3);
        let queen = contiguity_weights(&g, &binary(Contiguity::Queen)).unwrap();
        let rook = contiguity_weights(&g, &binary(Contiguity::Rook)).unwrap();
        // Center cell
        assert_eq!(queen.cardinality(4), 8);
        assert_eq!(rook.cardinality(4), 4);
        // Corner cell
        assert_eq!(queen.neighbors(0), &[1, 3, 4]);
        assert_eq!(rook.neighbors(0), &[1, 3]);
    }

    #[test]
    fn test_corner_touch() {
        let g = vec![square(0.0, 0.0), square(1.0, 1.0)];
        let queen = contiguity_weights(&g, &binary(Contiguity::Queen)).unwrap();
        let rook = contiguity_weights(&g, &binary(Contiguity::Rook)).unwrap();
        assert_eq!(queen.neighbors(0), &[1]);
        assert_eq!(rook.isolates(), vec![0, 1]);
    }

    #[test]
    fn test_snapping_tolerates_rounding() {
        let shifted = Geometry::Polygon(polygon![
            (x: 1.0 + 1e-10, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 1.0),
            (x: 1.0 - 1e-10, y: 1.0),
            (x: 1.0 + 1e-10, y: 0.0),
        ]);
        let g = vec![square(0.0, 0.0), shifted];
        let rook = contiguity_weights(&g, &binary(Contiguity::Rook)).unwrap();
        assert_eq!(rook.neighbors(0), &[1]);
    }

    #[test]
    fn test_second_order_exact() {
        let g = grid(5, 1);
        let params = ContiguityParams {
            order: 2,
            ..binary(Contiguity::Rook)
        };
        let w = contiguity_weights(&g, &params).unwrap();
        assert_eq!(w.neighbors(0), &[2]);
        assert_eq!(w.neighbors(2), &[0, 4]);
        assert_eq!(w.neighbors(4), &[2]);
    }

    #[test]
    fn test_second_order_inclusive() {
        let g = grid(5, 1);
        let params = ContiguityParams {
            order: 2,
            include_lower_order: true,
            ..binary(Contiguity::Rook)
        };
        let w = contiguity_weights(&g, &params).unwrap();
        assert_eq!(w.neighbors(0), &[1, 2]);
        assert_eq!(w.neighbors(2), &[0, 1, 3, 4]);
    }

    #[test]
    fn test_row_standardized_default() {
        let w = contiguity_weights(&grid(3, 3), &ContiguityParams::default()).unwrap();
        assert!(w.is_row_standardized());
        assert!(w.weights(4).iter().all(|&v| (v - 0.125).abs() < 1e-12));
    }

    #[test]
    fn test_rejects_points() {
        let g = vec![Geometry::Point(Point::new(0.0, 0.0)), Geometry::Point(Point::new(1.0, 0.0))];
        let err = contiguity_weights(&g, &ContiguityParams::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "geometry", .. }));
    }

    #[test]
    fn test_insufficient_data() {
        let err = contiguity_weights(&grid(1, 1), &ContiguityParams::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData(_)));
    }

    #[test]
    fn test_rejects_zero_order() {
        let params = ContiguityParams {
            order: 0,
            ..Default::default()
        };
        assert!(contiguity_weights(&grid(2, 1), &params).is_err());
    }

    #[test]
    fn test_parse_rule() {
        assert_eq!("Rook".parse::<Contiguity>().unwrap(), Contiguity::Rook);
        assert!("bishop".parse::<Contiguity>().is_err());
    }
}
