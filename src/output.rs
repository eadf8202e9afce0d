use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde::Serialize;

use crate::config::{AnalysisConfig, PARAMETER_NAMES};
use crate::sampler::ParameterSamples;
use crate::sensitivity::{SensitivityRow, SensitivityTable};
use crate::stats::OutputStats;
use crate::AnalysisError;

const PARAMETER_UNITS: [&str; 4] = ["windspeed [cm/s]", "height [m]", "k_d [-]", "k_o [-]"];

#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    pub index: usize,
    pub windspeed: f64,
    pub height: f64,
    pub k_d: f64,
    pub k_o: f64,
    pub conductance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFiles {
    pub output_dir: PathBuf,
    pub samples_csv_path: PathBuf,
    pub sensitivity_csv_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_distribution_path: Option<PathBuf>,
    pub plot_scatter_path: Option<PathBuf>,
}

impl OutputFiles {
    pub fn in_dir(output_dir: &Path, with_plots: bool) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            samples_csv_path: output_dir.join("samples.csv"),
            sensitivity_csv_path: output_dir.join("sensitivity.csv"),
            summary_path: output_dir.join("summary.json"),
            plot_distribution_path: with_plots
                .then(|| output_dir.join("conductance_distribution.svg")),
            plot_scatter_path: with_plots.then(|| output_dir.join("parameter_scatter.svg")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub config: AnalysisConfig,
    pub samples: usize,
    /// Conductance at the centre of every parameter distribution [mm/s]
    pub nominal_conductance: f64,
    pub conductance: OutputStats,
    pub sensitivity: Vec<SensitivityRow>,
    pub outputs: OutputFiles,
}

/// Create a timestamped run directory below `base`.
pub fn create_run_dir(base: &Path) -> Result<PathBuf, AnalysisError> {
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let mut run_dir = base.join(&timestamp);
    let mut counter = 1_u32;

    while run_dir.exists() {
        run_dir = base.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&run_dir)?;
    Ok(run_dir)
}

pub fn sample_records(samples: &ParameterSamples, conductance: &[f64]) -> Vec<SampleRecord> {
    conductance
        .iter()
        .enumerate()
        .map(|(index, &value)| SampleRecord {
            index,
            windspeed: samples.values[(index, 0)],
            height: samples.values[(index, 1)],
            k_d: samples.values[(index, 2)],
            k_o: samples.values[(index, 3)],
            conductance: value,
        })
        .collect()
}

pub fn write_samples_csv(path: &Path, records: &[SampleRecord]) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_sensitivity_csv(path: &Path, table: &SensitivityTable) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in &table.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(summary)?;
    fs::write(path, data)?;
    Ok(())
}

fn plot_err<E: std::fmt::Display>(err: E) -> AnalysisError {
    AnalysisError::Plot(err.to_string())
}

fn padded_range(values: &[f64]) -> Range<f64> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = if hi > lo {
        0.05 * (hi - lo)
    } else {
        lo.abs().max(1.0) * 0.05
    };
    (lo - pad)..(hi + pad)
}

pub fn make_plots(
    samples: &ParameterSamples,
    conductance: &[f64],
    files: &OutputFiles,
) -> Result<(), AnalysisError> {
    if let Some(path) = &files.plot_distribution_path {
        plot_distribution(conductance, path)?;
    }
    if let Some(path) = &files.plot_scatter_path {
        plot_parameter_scatter(samples, conductance, path)?;
    }
    Ok(())
}

fn plot_distribution(conductance: &[f64], path: &Path) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let range = padded_range(conductance);
    // Sturges' rule
    let bins = ((conductance.len().max(1) as f64).log2().ceil() as usize + 1).max(1);
    let width = (range.end - range.start) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &value in conductance {
        let idx = (((value - range.start) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1) as f64;
    let mean = crate::stats::mean(conductance);

    let root = SVGBackend::new(path, (1024, 640)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Atmospheric Conductance Uncertainty", ("sans-serif", 28).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(range.clone(), 0.0..max_count * 1.1)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Conductance [mm/s]")
        .y_desc("Samples")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, &count)| {
            let x0 = range.start + i as f64 * width;
            Rectangle::new([(x0, 0.0), (x0 + width, count as f64)], BLUE.mix(0.5).filled())
        }))
        .map_err(plot_err)?
        .label("Samples per bin")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], BLUE.mix(0.5).filled()));

    chart
        .draw_series(LineSeries::new(
            vec![(mean, 0.0), (mean, max_count * 1.1)],
            RED.stroke_width(2),
        ))
        .map_err(plot_err)?
        .label(format!("Mean {mean:.2} mm/s"))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn plot_parameter_scatter(
    samples: &ParameterSamples,
    conductance: &[f64],
    path: &Path,
) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = SVGBackend::new(path, (1280, 960)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let root = root
        .titled("Conductance vs. Sampled Parameters", ("sans-serif", 28))
        .map_err(plot_err)?;

    let y_range = padded_range(conductance);
    for (col, area) in root.split_evenly((2, 2)).iter().enumerate() {
        let xs = samples.column(col);
        let mut chart = ChartBuilder::on(area)
            .caption(PARAMETER_NAMES[col], ("sans-serif", 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(padded_range(&xs), y_range.clone())
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .x_desc(PARAMETER_UNITS[col])
            .y_desc("Conductance [mm/s]")
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(
                xs.iter()
                    .zip(conductance)
                    .map(|(&x, &y)| Circle::new((x, y), 3, BLUE.mix(0.7).filled())),
            )
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    Ok(())
}
