use std::fs;

use atmos_conductance::{run_analysis, AnalysisConfig, RunOptions};

fn small_config() -> AnalysisConfig {
    AnalysisConfig {
        samples: 30,
        bootstrap_replicates: 20,
        ..Default::default()
    }
}

#[test]
fn writes_tables_and_summary() {
    let tmp = tempfile::tempdir().unwrap();
    let (result, summary) =
        run_analysis(&small_config(), tmp.path(), RunOptions { plots: false }).unwrap();

    let files = &summary.outputs;
    assert!(files.output_dir.starts_with(tmp.path()));
    assert!(files.plot_distribution_path.is_none());

    let samples_csv = fs::read_to_string(&files.samples_csv_path).unwrap();
    let mut lines = samples_csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "index,windspeed,height,k_d,k_o,conductance"
    );
    assert_eq!(lines.count(), 30);

    let sensitivity_csv = fs::read_to_string(&files.sensitivity_csv_path).unwrap();
    assert_eq!(sensitivity_csv.lines().count(), 5);
    assert!(sensitivity_csv.starts_with("parameter,original,bias,std_error,ci_lower,ci_upper"));

    let summary_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&files.summary_path).unwrap()).unwrap();
    assert_eq!(summary_json["samples"], 30);
    assert_eq!(summary_json["sensitivity"].as_array().unwrap().len(), 4);
    assert_eq!(result.conductance.len(), 30);
}

#[test]
fn writes_svg_figures() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, summary) = run_analysis(&small_config(), tmp.path(), RunOptions::default()).unwrap();

    for path in [
        summary.outputs.plot_distribution_path.as_ref().unwrap(),
        summary.outputs.plot_scatter_path.as_ref().unwrap(),
    ] {
        let svg = fs::read_to_string(path).unwrap();
        assert!(svg.contains("<svg"), "{} is not an SVG", path.display());
    }
}

#[test]
fn repeated_runs_get_distinct_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = small_config();
    let (_, first) = run_analysis(&cfg, tmp.path(), RunOptions { plots: false }).unwrap();
    let (_, second) = run_analysis(&cfg, tmp.path(), RunOptions { plots: false }).unwrap();
    assert_ne!(first.outputs.output_dir, second.outputs.output_dir);
}

#[test]
fn invalid_config_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = AnalysisConfig {
        samples: 0,
        ..Default::default()
    };
    assert!(run_analysis(&cfg, tmp.path(), RunOptions::default()).is_err());
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}
