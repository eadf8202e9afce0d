//! Atmospheric conductance sensitivity analysis
//!
//! Latin hypercube sampling of four uncertain parameters (windspeed, vegetation
//! height, displacement and roughness scalars), evaluation of a closed-form
//! conductance model at every sample, and partial rank correlation
//! coefficients (PRCC) with bootstrap confidence bounds summarising how the
//! output responds to each input.

pub mod config;
pub mod distribution;
pub mod logging;
pub mod model;
pub mod output;
pub mod sampler;
pub mod sensitivity;
pub mod stats;

use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

pub use config::{AnalysisConfig, PARAMETER_NAMES};
pub use distribution::Distribution;
pub use model::{evaluate_samples, ConductanceInputs, ConductanceModel, DomainError};
pub use output::{OutputFiles, RunSummary};
pub use sampler::{latin_hypercube, sample_parameters, ParameterSamples};
pub use sensitivity::{prcc, prcc_with_bootstrap, SensitivityRow, SensitivityTable};
pub use stats::OutputStats;

/// Salt separating the bootstrap RNG stream from the sampling stream.
const BOOTSTRAP_STREAM_SALT: u64 = 0xB007_57A9_0000_0001;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),
    #[error("model domain error at sample {row}: {source}")]
    Domain {
        row: usize,
        #[source]
        source: DomainError,
    },
    #[error("degenerate sensitivity problem: {0}")]
    Degenerate(String),
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plot error: {0}")]
    Plot(String),
}

/// Everything computed by one analysis run, before anything is written.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub samples: ParameterSamples,
    /// Conductance per sample row [mm/s]
    pub conductance: Vec<f64>,
    pub nominal_conductance: f64,
    pub conductance_stats: OutputStats,
    pub sensitivity: SensitivityTable,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub plots: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { plots: true }
    }
}

/// Sample, evaluate and summarise without touching the filesystem.
///
/// Any sample count from one upwards is accepted; sensitivity coefficients
/// stay undefined until there are more samples than parameters plus one.
pub fn analyze(cfg: &AnalysisConfig) -> Result<AnalysisResult, AnalysisError> {
    cfg.validate()?;

    let model = ConductanceModel::new(cfg.zm_add_cm);
    let nominal_conductance = model
        .conductance(&cfg.nominal_inputs())
        .map_err(|source| {
            AnalysisError::InvalidArgument(format!(
                "nominal parameters outside model domain: {source}"
            ))
        })?;

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let samples = sample_parameters(&cfg.distributions(), cfg.samples, &mut rng)?;
    let conductance = evaluate_samples(&model, &samples.values)?;
    let conductance_stats = OutputStats::from_values(&conductance);
    tracing::debug!(
        mean = conductance_stats.mean,
        std_dev = conductance_stats.std_dev,
        "model evaluated"
    );

    let mut boot_rng = ChaCha8Rng::seed_from_u64(cfg.seed ^ BOOTSTRAP_STREAM_SALT);
    let sensitivity = prcc_with_bootstrap(
        &PARAMETER_NAMES,
        &samples.values,
        &conductance,
        cfg.bootstrap_replicates,
        cfg.confidence_level,
        &mut boot_rng,
    )?;

    Ok(AnalysisResult {
        samples,
        conductance,
        nominal_conductance,
        conductance_stats,
        sensitivity,
    })
}

/// Run the analysis and write its report into a fresh run directory under
/// `output_dir`.
pub fn run_analysis(
    cfg: &AnalysisConfig,
    output_dir: &Path,
    options: RunOptions,
) -> Result<(AnalysisResult, RunSummary), AnalysisError> {
    let result = analyze(cfg)?;
    let run_dir = output::create_run_dir(output_dir)?;
    let summary = write_report(cfg, &result, &run_dir, options)?;
    tracing::info!(run_dir = %run_dir.display(), "analysis report written");

    Ok((result, summary))
}

/// Write every report file into `run_dir`; the directory is removed again if
/// any write fails.
fn write_report(
    cfg: &AnalysisConfig,
    result: &AnalysisResult,
    run_dir: &Path,
    options: RunOptions,
) -> Result<RunSummary, AnalysisError> {
    let written = write_report_files(cfg, result, OutputFiles::in_dir(run_dir, options.plots));
    if written.is_err() {
        if let Err(err) = fs::remove_dir_all(run_dir) {
            tracing::warn!(
                run_dir = %run_dir.display(),
                error = %err,
                "failed to remove incomplete run directory"
            );
        }
    }
    written
}

fn write_report_files(
    cfg: &AnalysisConfig,
    result: &AnalysisResult,
    files: OutputFiles,
) -> Result<RunSummary, AnalysisError> {
    let records = output::sample_records(&result.samples, &result.conductance);
    output::write_samples_csv(&files.samples_csv_path, &records)?;
    output::write_sensitivity_csv(&files.sensitivity_csv_path, &result.sensitivity)?;
    output::make_plots(&result.samples, &result.conductance, &files)?;

    let summary = RunSummary {
        config: cfg.clone(),
        samples: result.conductance.len(),
        nominal_conductance: result.nominal_conductance,
        conductance: result.conductance_stats.clone(),
        sensitivity: result.sensitivity.rows.clone(),
        outputs: files,
    };
    output::write_summary(&summary.outputs.summary_path, &summary)?;
    Ok(summary)
}
