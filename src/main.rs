use std::path::PathBuf;

use anyhow::Context;
use atmos_conductance::logging::init_logging;
use atmos_conductance::{run_analysis, AnalysisConfig, RunOptions, PARAMETER_NAMES};
use clap::Parser;

/// Latin hypercube PRCC sensitivity analysis of atmospheric conductance
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON config file; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output base directory; each run gets a timestamped subdirectory
    #[arg(short, long, default_value = "output-atmos-conductance")]
    output: PathBuf,

    /// Number of Latin hypercube samples
    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Bootstrap replicates for PRCC confidence bounds (0 disables them)
    #[arg(long)]
    bootstrap: Option<usize>,

    /// Skip SVG figure generation
    #[arg(long, default_value_t = false)]
    no_plots: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level).context("failed to initialize logging")?;

    let mut cfg = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(v) = cli.samples {
        cfg.samples = v;
    }
    if let Some(v) = cli.seed {
        cfg.seed = v;
    }
    if let Some(v) = cli.bootstrap {
        cfg.bootstrap_replicates = v;
    }

    let options = RunOptions {
        plots: !cli.no_plots,
    };
    let (result, summary) = run_analysis(&cfg, &cli.output, options)?;

    println!("Atmospheric conductance sensitivity analysis");
    println!("============================================");
    for (name, dist) in PARAMETER_NAMES.iter().zip(cfg.distributions()) {
        println!("  {name:<10} ~ {}", dist.label());
    }
    println!("Samples: {} | Seed: {}", summary.samples, cfg.seed);
    println!("Nominal conductance: {:.3} mm/s", summary.nominal_conductance);
    let stats = &summary.conductance;
    println!(
        "Conductance mean {:.3} mm/s | sd {:.3} | 5-95%: {:.3} .. {:.3}",
        stats.mean, stats.std_dev, stats.p05, stats.p95
    );
    println!();
    print!("{}", result.sensitivity);
    println!();

    let files = &summary.outputs;
    println!("Run directory: {}", files.output_dir.display());
    println!("Samples CSV: {}", files.samples_csv_path.display());
    println!("Sensitivity CSV: {}", files.sensitivity_csv_path.display());
    println!("Summary: {}", files.summary_path.display());
    if let Some(path) = &files.plot_distribution_path {
        println!("Distribution plot: {}", path.display());
    }
    if let Some(path) = &files.plot_scatter_path {
        println!("Scatter plot: {}", path.display());
    }

    Ok(())
}
