//! morpho-bench: CLI tool for population profile comparison and diagnostics.
//!
//! Loads a JSON file of outlines, builds a profiled outline for each, and
//! runs the population aggregate (median, similarity ranking, normalized
//! variability), printing a report. Useful for:
//!
//! - Comparing profile kinds and alignment landmarks on real outlines
//! - Tuning the angle window and comparison length
//! - Trying a consensus segmentation across a population
//!
//! # Input
//!
//! A JSON array of outlines:
//!
//! ```text
//! [
//!   { "points": [{"x": 0.0, "y": 0.0}, ...], "landmarks": {"orientation": 12} },
//!   ...
//! ]
//! ```
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin morpho-bench -- [OPTIONS] <OUTLINES_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use morpho_profile::{
    AggregateDiagnostics, EngineConfig, Landmark, Point, Population, ProfileKind, ProfiledOutline,
    SegmentPartition, SegmentedProfile, Similarity,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Population profile comparison and diagnostics for morpho.
///
/// Builds profiles for every outline in a file, compares them against
/// the population median and prints timing and ranking diagnostics.
#[derive(Parser)]
#[command(name = "morpho-bench", version)]
struct Cli {
    /// Path to the JSON outlines file.
    outlines_path: PathBuf,

    /// Angle window as a fraction of the outline length.
    #[arg(long, default_value_t = EngineConfig::DEFAULT_WINDOW_PROPORTION)]
    window_proportion: f64,

    /// Minimum segment length in points.
    #[arg(long, default_value_t = EngineConfig::DEFAULT_MIN_SEGMENT_LENGTH)]
    min_segment_length: usize,

    /// Length profiles are resampled to before comparison.
    #[arg(long, default_value_t = EngineConfig::DEFAULT_COMPARISON_LENGTH)]
    comparison_length: usize,

    /// How far a boundary may move when fitting segments.
    #[arg(long, default_value_t = EngineConfig::DEFAULT_FIT_SEARCH_RADIUS)]
    fit_search_radius: usize,

    /// Profile kind to compare.
    #[arg(long, value_enum, default_value_t = Kind::Angle)]
    kind: Kind,

    /// Landmark every profile is aligned to.
    #[arg(long, default_value = "reference")]
    landmark: String,

    /// Split the most similar outline into this many equal segments and
    /// fit them onto every outline.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    segments: usize,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output the report as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Engine config as a JSON file.
    ///
    /// When provided, the individual engine parameter flags are ignored.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short)]
    verbose: bool,
}

/// Profile kind selection.
#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    /// Interior angle at each point.
    Angle,
    /// Distance to the opposite point.
    Diameter,
    /// Distance to the centroid.
    Radius,
}

impl From<Kind> for ProfileKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Angle => Self::Angle,
            Kind::Diameter => Self::Diameter,
            Kind::Radius => Self::Radius,
        }
    }
}

/// One outline as read from the input file.
#[derive(Deserialize)]
struct OutlineInput {
    points: Vec<Point>,
    #[serde(default)]
    landmarks: BTreeMap<Landmark, usize>,
}

/// JSON output of one run.
#[derive(Serialize)]
struct BenchReport<'a> {
    diagnostics: &'a AggregateDiagnostics,
    ranking: &'a [Similarity],
    median: &'a [f64],
    segment_counts: Vec<usize>,
}

/// Build an [`EngineConfig`] from CLI arguments.
///
/// If `--config` is provided, the file is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<EngineConfig, String> {
    let config = if let Some(ref path) = cli.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        serde_json::from_str(&text).map_err(|e| format!("Error parsing --config: {e}"))?
    } else {
        EngineConfig {
            window_proportion: cli.window_proportion,
            min_segment_length: cli.min_segment_length,
            comparison_length: cli.comparison_length,
            fit_search_radius: cli.fit_search_radius,
        }
    };
    config.validate().map_err(|e| format!("Invalid config: {e}"))?;
    Ok(config)
}

/// Read outlines and build profiled outlines, skipping unusable ones.
fn load_outlines(path: &Path, config: &EngineConfig) -> Result<Vec<ProfiledOutline>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let inputs: Vec<OutlineInput> =
        serde_json::from_str(&text).map_err(|e| format!("Error parsing outlines: {e}"))?;

    let mut outlines = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let mut outline = match ProfiledOutline::new(input.points, config) {
            Ok(outline) => outline,
            Err(e) => {
                tracing::warn!(outline = index, error = %e, "skipping outline");
                continue;
            }
        };
        for (landmark, point) in input.landmarks {
            if let Err(e) = outline.set_landmark(landmark.clone(), point) {
                tracing::warn!(outline = index, %landmark, error = %e, "ignoring landmark");
            }
        }
        outlines.push(outline);
    }
    Ok(outlines)
}

/// Split the most similar member's profile into `count` equal segments
/// and fit them onto every member.
fn assign_equal_segments(
    population: &mut Population<ProfiledOutline>,
    kind: ProfileKind,
    landmark: &Landmark,
    count: usize,
) -> Result<usize, String> {
    let best = population
        .most_similar(kind, landmark)
        .map_err(|e| format!("Ranking error: {e}"))?
        .ok_or_else(|| "No outline could be ranked".to_string())?;
    let template = population.members()[best]
        .profile(kind, landmark)
        .map_err(|e| format!("Template error: {e}"))?;
    let total = template.len();
    let starts: Vec<usize> = (0..count).map(|i| i * total / count).collect();
    let partition =
        SegmentPartition::from_starts(total, population.config().min_segment_length, &starts)
            .map_err(|e| format!("Cannot split template into {count} segments: {e}"))?;
    let (values, _) = template.into_parts();
    let template =
        SegmentedProfile::new(values, partition).map_err(|e| format!("Template error: {e}"))?;
    Ok(population.assign_segments(kind, landmark, &template))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let outlines = match load_outlines(&cli.outlines_path, &config) {
        Ok(outlines) => outlines,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let kind = ProfileKind::from(cli.kind);
    let landmark = Landmark::from(cli.landmark.as_str());

    eprintln!(
        "Outlines: {} ({} usable)",
        cli.outlines_path.display(),
        outlines.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Profile: {kind} from {landmark}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut population = match Population::from_members(outlines, config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.segments > 1 {
        match assign_equal_segments(&mut population, kind, &landmark, cli.segments) {
            Ok(applied) => eprintln!(
                "Segments: {} fitted onto {applied} of {} outlines",
                cli.segments,
                population.len(),
            ),
            Err(msg) => {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
        }
    }

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }
        population.invalidate();

        match population.aggregate(kind, &landmark) {
            Ok(summary) => {
                if cli.json {
                    let report = BenchReport {
                        diagnostics: &summary.diagnostics,
                        ranking: summary.ranking.as_slice(),
                        median: summary.median.values(),
                        segment_counts: population
                            .members()
                            .iter()
                            .map(|m| m.segments().len())
                            .collect(),
                    };
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing report: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", summary.diagnostics.report());
                }
                all_diagnostics.push(summary.diagnostics);
            }
            Err(e) => {
                eprintln!("Aggregate error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Function pointer type for extracting a step duration from diagnostics.
type StepExtractor = fn(&AggregateDiagnostics) -> std::time::Duration;

/// Print aggregated timing across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[AggregateDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Step", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let step_extractors: &[(&str, StepExtractor)] = &[
        ("Median", |d| d.median_duration),
        ("Ranking", |d| d.ranking_duration),
        ("Variability", |d| d.variability_duration),
    ];

    for (name, extractor) in step_extractors {
        let step_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {step_mean:>10.3}ms");
    }
}
