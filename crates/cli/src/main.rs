//! GeoLocus CLI - Local spatial statistics for vector datasets

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use geolocus_algorithms::assemble::{gwr_table, lisa_table, GwrSummary, LisaSummary};
use geolocus_algorithms::gwr::{gwr, BandwidthSpec, Criterion, GwrParams, RobustParams, SearchParams};
use geolocus_algorithms::kernel::{Bandwidth, Kernel};
use geolocus_algorithms::lisa::{lisa, LisaParams, LisaVariables, PermutationParams};
use geolocus_algorithms::weights::{Contiguity, ContiguityParams};
use geolocus_core::io::{legacy_field_mapping, read_geojson, write_geojson, LEGACY_FIELD_LEN};
use geolocus_core::{AttributeTable, Dataset};
use geolocus_parallel::{available_threads, Execution, ProcessingMode};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geolocus")]
#[command(author, version, about = "Local spatial statistics: GWR and LISA", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads (1 = sequential; default: all cores)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    /// Shorten output field names to 10 characters without collisions
    #[arg(long, global = true)]
    legacy_field_names: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a GeoJSON dataset
    Info {
        /// Input GeoJSON file
        input: PathBuf,
    },
    /// Geographically weighted regression
    Gwr {
        /// Input GeoJSON file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Dependent variable
        #[arg(short = 'y', long)]
        dependent: String,
        /// Independent variable(s), in model order
        #[arg(short = 'x', long = "independent", required = true, num_args = 1..)]
        independents: Vec<String>,
        /// Kernel: gaussian, exponential, bisquare, tricube, boxcar
        #[arg(short, long, default_value = "gaussian")]
        kernel: String,
        /// Bandwidth selection: cv, aicc or none (manual)
        #[arg(short, long, default_value = "cv")]
        approach: String,
        /// Adaptive (nearest-neighbor) bandwidth instead of a fixed distance
        #[arg(long)]
        adaptive: bool,
        /// Manual fixed bandwidth distance (with --approach none)
        #[arg(short, long)]
        bandwidth: Option<f64>,
        /// Manual neighbor count (with --approach none --adaptive)
        #[arg(short, long)]
        neighbors: Option<usize>,
        /// Z-score all model variables before fitting
        #[arg(long)]
        standardize: bool,
        /// Iteratively down-weight outlying residuals
        #[arg(long)]
        robust: bool,
        /// Robust fit iteration cap
        #[arg(long, default_value = "20")]
        robust_iterations: usize,
        /// Robust fit convergence tolerance
        #[arg(long, default_value = "1e-5")]
        robust_tolerance: f64,
        /// Bandwidth search iteration cap
        #[arg(long, default_value = "200")]
        max_iterations: usize,
        /// Bandwidth search relative tolerance (fixed bandwidths)
        #[arg(long, default_value = "1e-4")]
        tolerance: f64,
    },
    /// Local Moran's I (LISA) on polygon contiguity
    Lisa {
        /// Input GeoJSON file (polygons)
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Variable to analyse
        #[arg(long)]
        variable: String,
        /// Second variable for bivariate LISA (its spatial lag is used)
        #[arg(short, long)]
        lag_variable: Option<String>,
        /// Contiguity rule: queen or rook
        #[arg(short, long, default_value = "queen")]
        contiguity: String,
        /// Contiguity order
        #[arg(short, long, default_value = "1")]
        order: usize,
        /// Also include neighbors of lower orders
        #[arg(long)]
        include_lower_order: bool,
        /// Keep binary weights instead of row-standardizing
        #[arg(long)]
        binary: bool,
        /// Divide deviations by the sample standard deviation
        #[arg(long)]
        standardize: bool,
        /// Significance level for cluster classification
        #[arg(short, long, default_value = "0.05")]
        significance: f64,
        /// Number of conditional permutations
        #[arg(short, long, default_value = "999")]
        permutations: usize,
        /// Random seed for permutations
        #[arg(long, default_value = "123456789")]
        seed: u64,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn execution(threads: Option<usize>) -> Execution {
    let mode = match threads {
        None => ProcessingMode::Parallel,
        Some(0) | Some(1) => ProcessingMode::Sequential,
        Some(n) => ProcessingMode::ParallelWith(n),
    };
    Execution::new(mode)
}

fn read_dataset(path: &PathBuf) -> Result<Dataset> {
    let pb = spinner("Reading dataset...");
    let dataset = read_geojson(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} features, {} fields", dataset.len(), dataset.table().num_columns());
    Ok(dataset)
}

/// Fail early unless `path` can be created: its directory must exist and
/// accept new files, and the path itself must not be a directory.
fn check_output(path: &Path) -> Result<()> {
    if path.is_dir() {
        anyhow::bail!("Output {} is a directory", path.display());
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        anyhow::bail!(
            "Output {} is not writable: directory {} does not exist",
            path.display(),
            dir.display()
        );
    }
    tempfile::tempfile_in(dir)
        .with_context(|| format!("Output {} is not writable", path.display()))?;
    Ok(())
}

/// Write `table` alongside the input geometries, shortening names on request
fn write_result(
    dataset: &Dataset,
    table: AttributeTable,
    selected: &[String],
    legacy: bool,
    path: &PathBuf,
) -> Result<()> {
    let table = if legacy {
        let mapping = legacy_field_mapping(table.names(), selected, LEGACY_FIELD_LEN);
        table.renamed(&mapping).context("Failed to shorten field names")?
    } else {
        table
    };
    let out = dataset.with_table(table)?;

    let pb = spinner("Writing output...");
    write_geojson(&out, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_bandwidth(
    approach: &str,
    adaptive: bool,
    bandwidth: Option<f64>,
    neighbors: Option<usize>,
) -> Result<BandwidthSpec> {
    if approach.eq_ignore_ascii_case("none") {
        let manual = if adaptive {
            Bandwidth::Adaptive(neighbors.context("--approach none --adaptive needs --neighbors")?)
        } else {
            Bandwidth::Fixed(bandwidth.context("--approach none needs --bandwidth")?)
        };
        return Ok(BandwidthSpec::Manual(manual));
    }
    let criterion: Criterion = approach.parse()?;
    Ok(BandwidthSpec::Search {
        criterion,
        adaptive,
    })
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let exec = execution(cli.threads);
    debug!(threads = exec.threads(), available = available_threads(), "execution");

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let dataset = read_dataset(&input)?;
            let table = dataset.table();
            println!("Dataset: {}", input.display());
            println!("  Features: {}", dataset.len());
            for (kind, count) in dataset.geometry_kinds() {
                println!("  {}: {}", kind, count);
            }
            println!("  Fields: {}", table.num_columns());
            for name in table.names() {
                println!("    {:<24} {}", name, table.column_type(name).unwrap_or("null"));
            }
        }

        // ── GWR ──────────────────────────────────────────────────────
        Commands::Gwr {
            input,
            output,
            dependent,
            independents,
            kernel,
            approach,
            adaptive,
            bandwidth,
            neighbors,
            standardize,
            robust,
            robust_iterations,
            robust_tolerance,
            max_iterations,
            tolerance,
        } => {
            let kernel: Kernel = kernel.parse()?;
            let bandwidth = parse_bandwidth(&approach, adaptive, bandwidth, neighbors)?;
            let params = GwrParams {
                dependent: dependent.clone(),
                independents: independents.clone(),
                kernel,
                bandwidth,
                standardize,
                robust: robust.then_some(RobustParams {
                    max_iterations: robust_iterations,
                    tolerance: robust_tolerance,
                }),
                search: SearchParams {
                    max_iterations,
                    tolerance,
                },
                execution: exec,
            };

            check_output(&output)?;
            let dataset = read_dataset(&input)?;
            let start = Instant::now();
            let pb = spinner("Fitting GWR...");
            let result = gwr(&dataset, &params);
            pb.finish_and_clear();
            let result = result.context("GWR failed")?;
            let elapsed = start.elapsed();

            let table = gwr_table(dataset.table(), &result)?;
            let selected: Vec<String> = std::iter::once(dependent).chain(independents).collect();
            write_result(&dataset, table, &selected, cli.legacy_field_names, &output)?;
            println!("{}", GwrSummary::new(&result));
            done("GWR", &output, elapsed);
        }

        // ── LISA ─────────────────────────────────────────────────────
        Commands::Lisa {
            input,
            output,
            variable,
            lag_variable,
            contiguity,
            order,
            include_lower_order,
            binary,
            standardize,
            significance,
            permutations,
            seed,
        } => {
            let rule: Contiguity = contiguity.parse()?;
            let variables = match lag_variable {
                Some(lag) => LisaVariables::Bivariate {
                    focal: variable,
                    lag,
                },
                None => LisaVariables::Univariate(variable),
            };
            let selected: Vec<String> = variables.names().iter().map(|s| s.to_string()).collect();
            let params = LisaParams {
                variables,
                standardize,
                weights: ContiguityParams {
                    rule,
                    order,
                    include_lower_order,
                    row_standardize: !binary,
                    ..Default::default()
                },
                significance,
                permutations: PermutationParams { permutations, seed },
                execution: exec,
            };

            check_output(&output)?;
            let dataset = read_dataset(&input)?;
            let start = Instant::now();
            let pb = spinner("Computing local Moran's I...");
            let result = lisa(&dataset, &params);
            pb.finish_and_clear();
            let result = result.context("LISA failed")?;
            let elapsed = start.elapsed();

            let table = lisa_table(dataset.table(), &result)?;
            write_result(&dataset, table, &selected, cli.legacy_field_names, &output)?;
            println!("{}", LisaSummary::new(&result));
            done("LISA", &output, elapsed);
        }
    }

    Ok(())
}
