//! Joining local results onto attribute tables, and run summaries
//!
//! Output tables are built from a clone of the caller's table: every
//! original column keeps its name, order and values, and result columns are
//! appended after them.

use std::fmt;

use geolocus_core::{AttributeTable, AttributeValue, Error, Result};

use crate::gwr::{GwrOutput, LocalStatus};
use crate::lisa::{LisaCluster, LisaOutput};

/// First free name among `base`, `base_1`, `base_2`, …
pub fn unique_column_name(table: &AttributeTable, base: &str) -> String {
    if !table.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !table.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn append_f64(table: &mut AttributeTable, base: &str, values: &[f64]) -> Result<String> {
    let name = unique_column_name(table, base);
    table.push_f64_column(name.clone(), values)?;
    Ok(name)
}

fn check_rows(table: &AttributeTable, results: usize) -> Result<()> {
    if table.rows() != results {
        return Err(Error::LengthMismatch {
            name: "results".into(),
            expected: table.rows(),
            actual: results,
        });
    }
    Ok(())
}

/// Copy of `original` with GWR columns appended: `GWR_yhat`,
/// `GWR_residual`, `GWR_localR2`, `GWR_<coef>` and `GWR_se_<coef>`.
pub fn gwr_table(original: &AttributeTable, output: &GwrOutput) -> Result<AttributeTable> {
    check_rows(original, output.locals.len())?;
    let mut table = original.clone();
    let locals = &output.locals;

    let column = |f: &dyn Fn(usize) -> f64| (0..locals.len()).map(f).collect::<Vec<f64>>();

    append_f64(&mut table, "GWR_yhat", &column(&|i| locals[i].fitted))?;
    append_f64(&mut table, "GWR_residual", &column(&|i| locals[i].residual))?;
    append_f64(&mut table, "GWR_localR2", &column(&|i| locals[i].local_r2))?;
    for (c, name) in output.coefficient_names.iter().enumerate() {
        append_f64(&mut table, &format!("GWR_{}", name), &column(&|i| locals[i].coefficients[c]))?;
    }
    for (c, name) in output.coefficient_names.iter().enumerate() {
        append_f64(&mut table, &format!("GWR_se_{}", name), &column(&|i| locals[i].std_errors[c]))?;
    }

    Ok(table)
}

/// Copy of `original` with `LISA_I`, `LISA_pvalue`, `LISA_cluster` (code)
/// and `LISA_category` (label) appended.
pub fn lisa_table(original: &AttributeTable, output: &LisaOutput) -> Result<AttributeTable> {
    check_rows(original, output.locals.len())?;
    let mut table = original.clone();
    let locals = &output.locals;

    let stats: Vec<f64> = locals.iter().map(|l| l.statistic).collect();
    let p: Vec<f64> = locals.iter().map(|l| l.p_value).collect();
    append_f64(&mut table, "LISA_I", &stats)?;
    append_f64(&mut table, "LISA_pvalue", &p)?;

    let name = unique_column_name(&table, "LISA_cluster");
    table.push_column(
        name,
        locals.iter().map(|l| AttributeValue::Int(l.cluster.code())).collect(),
    )?;
    let name = unique_column_name(&table, "LISA_category");
    table.push_column(
        name,
        locals.iter().map(|l| AttributeValue::from(l.cluster.label())).collect(),
    )?;

    Ok(table)
}

// ─── Summaries ──────────────────────────────────────────────────────────

/// Mean, median and range of the finite values of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl DescriptiveStats {
    /// `None` when no value is finite
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        if v.is_empty() {
            return None;
        }
        v.sort_by(f64::total_cmp);
        let count = v.len();
        let median = if count % 2 == 1 {
            v[count / 2]
        } else {
            (v[count / 2 - 1] + v[count / 2]) / 2.0
        };
        Some(Self {
            count,
            mean: v.iter().sum::<f64>() / count as f64,
            median,
            min: v[0],
            max: v[count - 1],
        })
    }
}

impl fmt::Display for DescriptiveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean {:.4}  median {:.4}  min {:.4}  max {:.4}",
            self.mean, self.median, self.min, self.max
        )
    }
}

/// Reporting view of a GWR run
#[derive(Debug, Clone)]
pub struct GwrSummary<'a> {
    output: &'a GwrOutput,
    local_r2: Option<DescriptiveStats>,
    coefficients: Vec<(&'a str, Option<DescriptiveStats>)>,
}

impl<'a> GwrSummary<'a> {
    pub fn new(output: &'a GwrOutput) -> Self {
        let r2: Vec<f64> = output.locals.iter().map(|l| l.local_r2).collect();
        let coefficients = output
            .coefficient_names
            .iter()
            .enumerate()
            .map(|(c, name)| (name.as_str(), DescriptiveStats::from_values(&output.coefficient(c))))
            .collect();
        Self {
            output,
            local_r2: DescriptiveStats::from_values(&r2),
            coefficients,
        }
    }

    pub fn local_r2(&self) -> Option<&DescriptiveStats> {
        self.local_r2.as_ref()
    }

    pub fn coefficients(&self) -> &[(&'a str, Option<DescriptiveStats>)] {
        &self.coefficients
    }
}

fn write_stats(f: &mut fmt::Formatter<'_>, label: &str, stats: Option<&DescriptiveStats>) -> fmt::Result {
    match stats {
        Some(s) => writeln!(f, "  {:<16} {}", label, s),
        None => writeln!(f, "  {:<16} (no finite values)", label),
    }
}

impl fmt::Display for GwrSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.output;
        let d = &out.diagnostics;

        writeln!(f, "GWR")?;
        writeln!(f, "  Kernel: {}", out.kernel)?;
        writeln!(f, "  Bandwidth: {}", out.bandwidth)?;
        if let Some(s) = &out.search {
            writeln!(
                f,
                "  Selected by {} (score {:.4}, {} candidates, {} iterations{})",
                s.criterion,
                s.score,
                s.evaluations,
                s.iterations,
                if s.converged { "" } else { ", iteration cap reached" }
            )?;
        }
        if let Some(r) = &out.robust {
            writeln!(
                f,
                "  Robust fit: {} iterations, {}, {} observation(s) fully down-weighted",
                r.iterations,
                if r.converged { "converged" } else { "not converged" },
                r.downweighted
            )?;
        }
        if out.standardized {
            writeln!(f, "  Variables standardized (coefficients in standard units)")?;
        }

        writeln!(f, "\nDiagnostics ({} of {} locations):", d.observations, out.locals.len())?;
        writeln!(f, "  RSS: {:.4}", d.rss)?;
        writeln!(f, "  Effective parameters tr(S): {:.4}", d.tr_s)?;
        writeln!(f, "  Effective degrees of freedom: {:.4}", d.edf)?;
        writeln!(f, "  Sigma: {:.4}", d.sigma2.sqrt())?;
        writeln!(f, "  AIC: {:.4}", d.aic)?;
        writeln!(f, "  AICc: {:.4}", d.aicc)?;
        writeln!(f, "  R²: {:.4}", d.r2)?;
        writeln!(f, "  Adjusted R²: {:.4}", d.adj_r2)?;

        match &out.global {
            Some(g) => {
                writeln!(f, "\nGlobal OLS:")?;
                for (name, (b, se)) in out
                    .coefficient_names
                    .iter()
                    .zip(g.coefficients.iter().zip(&g.std_errors))
                {
                    writeln!(f, "  {:<16} {:>12.6}  (se {:.6})", name, b, se)?;
                }
                writeln!(f, "  R²: {:.4}  Adjusted R²: {:.4}", g.r2, g.adj_r2)?;
                writeln!(f, "  AIC: {:.4}  AICc: {:.4}", g.aic, g.aicc)?;
            }
            None => writeln!(f, "\nGlobal OLS: singular design, not available")?,
        }

        writeln!(f, "\nLocal estimates:")?;
        write_stats(f, "Local R²", self.local_r2.as_ref())?;
        for (name, stats) in &self.coefficients {
            write_stats(f, name, stats.as_ref())?;
        }

        let isolates = out.count(LocalStatus::Isolate);
        let rank_deficient = out.count(LocalStatus::RankDeficient);
        let not_converged = out.count(LocalStatus::NotConverged);
        if isolates + rank_deficient + not_converged > 0 {
            writeln!(f, "\nFlagged locations:")?;
            writeln!(f, "  Isolated: {}", isolates)?;
            writeln!(f, "  Rank-deficient: {}", rank_deficient)?;
            writeln!(f, "  Not converged: {}", not_converged)?;
        }
        Ok(())
    }
}

/// Count, share and mean I of one cluster category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryCount {
    pub cluster: LisaCluster,
    pub count: usize,
    pub percent: f64,
    /// Mean local I over the category (NaN when empty or undefined)
    pub mean_statistic: f64,
}

/// Reporting view of a LISA run
#[derive(Debug, Clone)]
pub struct LisaSummary<'a> {
    output: &'a LisaOutput,
    statistic: Option<DescriptiveStats>,
    categories: Vec<CategoryCount>,
}

impl<'a> LisaSummary<'a> {
    pub fn new(output: &'a LisaOutput) -> Self {
        let n = output.locals.len();
        let stats: Vec<f64> = output.locals.iter().map(|l| l.statistic).collect();
        let categories = LisaCluster::ALL
            .iter()
            .map(|&cluster| {
                let members: Vec<f64> = output
                    .locals
                    .iter()
                    .filter(|l| l.cluster == cluster)
                    .map(|l| l.statistic)
                    .collect();
                let finite: Vec<f64> = members.iter().copied().filter(|v| v.is_finite()).collect();
                CategoryCount {
                    cluster,
                    count: members.len(),
                    percent: if n > 0 {
                        100.0 * members.len() as f64 / n as f64
                    } else {
                        0.0
                    },
                    mean_statistic: if finite.is_empty() {
                        f64::NAN
                    } else {
                        finite.iter().sum::<f64>() / finite.len() as f64
                    },
                }
            })
            .collect();
        Self {
            output,
            statistic: DescriptiveStats::from_values(&stats),
            categories,
        }
    }

    pub fn categories(&self) -> &[CategoryCount] {
        &self.categories
    }

    pub fn statistic(&self) -> Option<&DescriptiveStats> {
        self.statistic.as_ref()
    }
}

impl fmt::Display for LisaSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.output;
        writeln!(f, "LISA (local Moran's I)")?;
        writeln!(f, "  Variables: {}", out.variables.names().join(" → "))?;
        writeln!(
            f,
            "  Permutations: {}  Significance: {}",
            out.permutations, out.significance
        )?;
        let (min, max, mean) = out.cardinality;
        writeln!(f, "  Neighbors per observation: min {}  max {}  mean {:.2}", min, max, mean)?;
        write_stats(f, "Local I", self.statistic.as_ref())?;

        writeln!(f, "\nCategories:")?;
        for c in &self.categories {
            write!(f, "  {} {:<16} {:>6} ({:5.1}%)", c.cluster.code(), c.cluster.label(), c.count, c.percent)?;
            if c.mean_statistic.is_finite() {
                write!(f, "  mean I {:.4}", c.mean_statistic)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_column_name() {
        let mut t = AttributeTable::with_rows(1);
        assert_eq!(unique_column_name(&t, "LISA_I"), "LISA_I");
        t.push_f64_column("LISA_I", &[1.0]).unwrap();
        assert_eq!(unique_column_name(&t, "LISA_I"), "LISA_I_1");
        t.push_f64_column("LISA_I_1", &[1.0]).unwrap();
        assert_eq!(unique_column_name(&t, "LISA_I"), "LISA_I_2");
    }

    #[test]
    fn test_descriptive_stats() {
        let s = DescriptiveStats::from_values(&[3.0, f64::NAN, 1.0, 2.0, 10.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 10.0);
        assert_eq!(s.mean, 4.0);
        assert!(DescriptiveStats::from_values(&[f64::NAN]).is_none());
    }
}
