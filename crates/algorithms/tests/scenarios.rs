//! End-to-end scenarios for GWR and LISA on small synthetic datasets.
//!
//! Fixtures are generated with a fixed LCG so every run sees the same data.

use geo::{polygon, Geometry, Point};
use geolocus_algorithms::assemble::{gwr_table, lisa_table};
use geolocus_algorithms::gwr::{gwr, global_ols, BandwidthSpec, Criterion, GwrParams, LocalStatus};
use geolocus_algorithms::kernel::{Bandwidth, Kernel};
use geolocus_algorithms::lisa::{lisa, LisaCluster, LisaParams, LisaVariables, PermutationParams};
use geolocus_algorithms::weights::{contiguity_weights, Contiguity, ContiguityParams, DistanceWeights};
use geolocus_core::{AttributeTable, AttributeValue, Dataset};
use geolocus_parallel::Execution;
use ndarray::{Array1, Array2};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn square(x: f64, y: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: x, y: y),
        (x: x + 1.0, y: y),
        (x: x + 1.0, y: y + 1.0),
        (x: x, y: y + 1.0),
        (x: x, y: y),
    ])
}

fn grid_squares(side: usize) -> Vec<Geometry<f64>> {
    (0..side * side)
        .map(|i| square((i % side) as f64, (i / side) as f64))
        .collect()
}

fn dataset(geoms: Vec<Geometry<f64>>, columns: &[(&str, Vec<f64>)]) -> Dataset {
    let mut table = AttributeTable::with_rows(geoms.len());
    for (name, values) in columns {
        table.push_f64_column(*name, values).unwrap();
    }
    Dataset::new(geoms, table).unwrap()
}

/// Points on a jittered grid with y = 1 + 2·x1 − 0.5·x2 + noise
fn regression_points(side: usize, seed: u64) -> Dataset {
    let mut rng = Lcg(seed);
    let n = side * side;
    let mut geoms = Vec::with_capacity(n);
    let (mut y, mut x1, mut x2) = (Vec::new(), Vec::new(), Vec::new());
    for i in 0..n {
        let px = (i % side) as f64 + 0.3 * rng.next_f64();
        let py = (i / side) as f64 + 0.3 * rng.next_f64();
        geoms.push(Geometry::Point(Point::new(px, py)));
        let a = 10.0 * rng.next_f64();
        let b = 5.0 * rng.next_f64();
        x1.push(a);
        x2.push(b);
        y.push(1.0 + 2.0 * a - 0.5 * b + rng.next_f64() - 0.5);
    }
    dataset(geoms, &[("y", y), ("x1", x1), ("x2", x2)])
}

fn manual(bandwidth: Bandwidth, kernel: Kernel, independents: &[&str]) -> GwrParams {
    GwrParams {
        dependent: "y".into(),
        independents: independents.iter().map(|s| s.to_string()).collect(),
        kernel,
        bandwidth: BandwidthSpec::Manual(bandwidth),
        execution: Execution::sequential(),
        ..Default::default()
    }
}

fn design(ds: &Dataset, independents: &[&str]) -> (Array2<f64>, Array1<f64>) {
    let n = ds.len();
    let mut x = Array2::<f64>::ones((n, independents.len() + 1));
    for (c, name) in independents.iter().enumerate() {
        for (i, v) in ds.table().numeric_column(name).unwrap().into_iter().enumerate() {
            x[(i, c + 1)] = v;
        }
    }
    let y = Array1::from(ds.table().numeric_column("y").unwrap());
    (x, y)
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

#[test]
fn row_standardized_rows_sum_to_one() {
    let mut geoms = grid_squares(4);
    geoms.push(square(50.0, 50.0));
    let w = contiguity_weights(&geoms, &ContiguityParams::default()).unwrap();

    assert_eq!(w.isolates(), vec![16]);
    for i in 0..w.len() {
        let sum: f64 = w.weights(i).iter().sum();
        if w.is_isolate(i) {
            assert!(w.weights(i).is_empty());
        } else {
            assert!((sum - 1.0).abs() < 1e-12, "row {} sums to {}", i, sum);
        }
        assert!(!w.neighbors(i).contains(&i));
    }
}

#[test]
fn kernels_are_one_at_zero_and_boxcar_cuts_at_bandwidth() {
    let locations = DistanceWeights::from_geometries(&grid_squares(3)).unwrap();
    let mut row = vec![0.0; locations.len()];
    let mut scratch = Vec::new();
    for kernel in Kernel::ALL {
        locations.kernel_row(4, Bandwidth::Fixed(1.0), kernel, &mut row, &mut scratch);
        assert_eq!(row[4], 1.0, "{}", kernel);
        // Rook neighbors at d = 1, diagonals at d = √2
        assert!(row[1] >= row[0], "{}", kernel);
    }
    locations.kernel_row(4, Bandwidth::Fixed(0.9), Kernel::Boxcar, &mut row, &mut scratch);
    assert_eq!(row.iter().filter(|&&w| w > 0.0).count(), 1);
    locations.kernel_row(4, Bandwidth::Fixed(1.2), Kernel::Boxcar, &mut row, &mut scratch);
    assert_eq!(row.iter().filter(|&&w| w > 0.0).count(), 5);
}

// ---------------------------------------------------------------------------
// LISA
// ---------------------------------------------------------------------------

#[test]
fn five_squares_in_a_line() {
    let geoms = (0..5).map(|i| square(i as f64, 0.0)).collect();
    let ds = dataset(geoms, &[("v", vec![1.0, 2.0, 3.0, 4.0, 5.0])]);
    let params = LisaParams {
        variables: LisaVariables::Univariate("v".into()),
        execution: Execution::sequential(),
        ..Default::default()
    };
    let out = lisa(&ds, &params).unwrap();

    for i in 1..4 {
        assert!(out.locals[i].statistic >= 0.0, "interior {} has negative I", i);
    }
    assert!(out.locals[1].statistic > 0.0);
    assert!(out.locals[3].statistic > 0.0);
    assert_ne!(out.locals[0].cluster, LisaCluster::Isolated);
    assert_ne!(out.locals[4].cluster, LisaCluster::Isolated);
    assert_eq!(out.locals[0].neighbors, 1);
}

#[test]
fn corner_touch_is_isolated_under_rook_only() {
    let geoms = vec![
        square(0.0, 0.0),
        square(1.0, 0.0),
        square(2.0, 0.0),
        square(3.0, 1.0),
    ];
    let ds = dataset(geoms, &[("v", vec![4.0, 1.0, 7.0, 2.0])]);
    let mut params = LisaParams {
        variables: LisaVariables::Univariate("v".into()),
        execution: Execution::sequential(),
        ..Default::default()
    };
    params.weights.rule = Contiguity::Rook;

    let out = lisa(&ds, &params).unwrap();
    assert_eq!(out.locals[3].cluster, LisaCluster::Isolated);
    assert!(out.locals[3].statistic.is_nan());
    assert_eq!(out.count(LisaCluster::Isolated), 1);

    let table = lisa_table(ds.table(), &out).unwrap();
    assert!(table.value("LISA_I", 3).unwrap().is_missing());
    assert_eq!(table.value("LISA_cluster", 3), Some(&AttributeValue::Int(6)));
    assert_eq!(
        table.value("LISA_category", 3),
        Some(&AttributeValue::String("Isolated".into()))
    );

    params.weights.rule = Contiguity::Queen;
    let out = lisa(&ds, &params).unwrap();
    assert_ne!(out.locals[3].cluster, LisaCluster::Isolated);
    assert_eq!(out.locals[3].neighbors, 1);
}

#[test]
fn permutation_p_values_are_uniform_under_randomness() {
    let geoms = grid_squares(10);
    let trials = 20;
    let mut p_values = Vec::with_capacity(trials * geoms.len());

    for trial in 0..trials {
        let mut rng = Lcg(1000 + trial as u64);
        let values: Vec<f64> = (0..geoms.len()).map(|_| rng.next_f64()).collect();
        let ds = dataset(geoms.clone(), &[("v", values)]);
        let params = LisaParams {
            variables: LisaVariables::Univariate("v".into()),
            permutations: PermutationParams {
                permutations: 199,
                seed: trial as u64,
            },
            ..Default::default()
        };
        let out = lisa(&ds, &params).unwrap();
        p_values.extend(out.locals.iter().map(|l| l.p_value));
    }

    assert!(p_values.iter().all(|p| *p > 0.0 && *p <= 1.0));
    let mean = p_values.iter().sum::<f64>() / p_values.len() as f64;
    let small = p_values.iter().filter(|&&p| p <= 0.05).count() as f64 / p_values.len() as f64;
    assert!((mean - 0.5).abs() < 0.05, "mean p = {}", mean);
    assert!((0.02..=0.09).contains(&small), "share of p <= 0.05 = {}", small);
}

#[test]
fn clustered_pattern_is_detected() {
    // High values in the lower-left quadrant, low elsewhere
    let side = 8;
    let geoms = grid_squares(side);
    let mut rng = Lcg(3);
    let values: Vec<f64> = (0..side * side)
        .map(|i| {
            let (c, r) = (i % side, i / side);
            let base = if c < 4 && r < 4 { 10.0 } else { 0.0 };
            base + rng.next_f64()
        })
        .collect();
    let ds = dataset(geoms, &[("v", values)]);
    let params = LisaParams {
        variables: LisaVariables::Univariate("v".into()),
        ..Default::default()
    };
    let out = lisa(&ds, &params).unwrap();
    // Interior of the hot quadrant
    assert_eq!(out.locals[side + 1].cluster, LisaCluster::HighHigh);
    assert_eq!(out.locals[2 * side + 2].cluster, LisaCluster::HighHigh);
    assert!(out.count(LisaCluster::HighHigh) >= 4);
}

// ---------------------------------------------------------------------------
// GWR
// ---------------------------------------------------------------------------

#[test]
fn infinite_bandwidth_reproduces_global_ols() {
    let ds = regression_points(6, 11);
    let vars = ["x1", "x2"];
    let (x, y) = design(&ds, &vars);
    let ols = global_ols(x.view(), y.view()).unwrap();

    let out = gwr(&ds, &manual(Bandwidth::Fixed(f64::INFINITY), Kernel::Gaussian, &vars)).unwrap();
    for local in &out.locals {
        assert_eq!(local.status, LocalStatus::Ok);
        for (b, g) in local.coefficients.iter().zip(&ols.coefficients) {
            assert!((b - g).abs() < 1e-8, "local {} vs global {}", b, g);
        }
    }
    let global = out.global.as_ref().unwrap();
    assert!((out.diagnostics.rss - global.rss).abs() < 1e-8);
    assert!((out.diagnostics.tr_s - 3.0).abs() < 1e-8);
}

#[test]
fn all_inclusive_bandwidth_gives_equal_coefficients() {
    let ds = regression_points(5, 21);
    let n = ds.len();
    let out = gwr(&ds, &manual(Bandwidth::Adaptive(2 * n), Kernel::Boxcar, &["x1"])).unwrap();
    let global = out.global.as_ref().unwrap();

    let first = &out.locals[0].coefficients;
    for local in &out.locals {
        for c in 0..2 {
            assert!((local.coefficients[c] - first[c]).abs() < 1e-9);
            assert!((local.coefficients[c] - global.coefficients[c]).abs() < 1e-9);
        }
    }
    // Slope close to the generating value
    assert!((global.coefficients[1] - 2.0).abs() < 0.1);
}

#[test]
fn bandwidth_search_end_to_end() {
    let ds = regression_points(6, 5);
    let params = GwrParams {
        dependent: "y".into(),
        independents: vec!["x1".into(), "x2".into()],
        kernel: Kernel::Bisquare,
        bandwidth: BandwidthSpec::Search {
            criterion: Criterion::Aicc,
            adaptive: true,
        },
        ..Default::default()
    };
    let out = gwr(&ds, &params).unwrap();
    let search = out.search.as_ref().unwrap();
    assert!(out.bandwidth.is_adaptive());
    assert!(out.bandwidth.value() >= search.lower && out.bandwidth.value() <= search.upper);
    assert!(search.score.is_finite());
    assert!(out.diagnostics.aicc.is_finite());
}

// ---------------------------------------------------------------------------
// Output tables
// ---------------------------------------------------------------------------

#[test]
fn original_columns_survive_unmodified() {
    let mut ds = regression_points(4, 8);
    let mut table = ds.table().clone();
    let labels: Vec<AttributeValue> = (0..ds.len()).map(|i| AttributeValue::from(format!("f{}", i).as_str())).collect();
    table.push_column("label", labels).unwrap();
    table.push_f64_column("GWR_yhat", &vec![-1.0; ds.len()]).unwrap();
    ds = ds.with_table(table).unwrap();
    let before = ds.table().clone();

    let out = gwr(&ds, &manual(Bandwidth::Fixed(3.0), Kernel::Gaussian, &["x1"])).unwrap();
    let result = gwr_table(ds.table(), &out).unwrap();

    assert_eq!(ds.table(), &before);
    for (i, col) in before.columns().iter().enumerate() {
        assert_eq!(&result.columns()[i], col);
    }
    assert!(result.contains("GWR_yhat_1"));
    for name in ["GWR_residual", "GWR_localR2", "GWR_Intercept", "GWR_x1", "GWR_se_Intercept", "GWR_se_x1"] {
        assert!(result.contains(name), "missing {}", name);
    }
    assert_eq!(result.num_columns(), before.num_columns() + 7);
}
