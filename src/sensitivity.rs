//! Partial rank correlation coefficients (PRCC)
//!
//! Every input column and the output are rank-transformed. For input `j`, both
//! its ranks and the output ranks are regressed on an intercept plus the
//! ranks of all other inputs; the PRCC is the Pearson correlation of the two
//! residual vectors. A coefficient is undefined (`None`) when either residual
//! vector has no variance, or when there are not more than `P + 1` samples.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::Serialize;

use crate::distribution::standard_normal_quantile;
use crate::stats::{mean, pearson, rank, std_dev};
use crate::AnalysisError;

/// Residual sum of squares below this fraction of the total is treated as zero.
const RESIDUAL_TOLERANCE: f64 = 1e-12;

/// One row of the sensitivity table
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityRow {
    pub parameter: String,
    /// PRCC of the full sample
    pub original: Option<f64>,
    /// Bootstrap bias estimate `mean(t*) - t0`
    pub bias: Option<f64>,
    /// Bootstrap standard error
    pub std_error: Option<f64>,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
    /// Bootstrap replicates in which this coefficient was defined
    pub replicates_used: usize,
}

/// PRCC per parameter, in sample-matrix column order
#[derive(Debug, Clone, Serialize)]
pub struct SensitivityTable {
    pub confidence_level: f64,
    /// Requested bootstrap replicates
    pub bootstrap_replicates: usize,
    pub rows: Vec<SensitivityRow>,
}

impl SensitivityTable {
    pub fn get(&self, parameter: &str) -> Option<&SensitivityRow> {
        self.rows.iter().find(|row| row.parameter == parameter)
    }

    pub fn coefficients(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.original).collect()
    }
}

impl fmt::Display for SensitivityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn cell(value: Option<f64>) -> String {
            value.map(|v| format!("{v:>11.5}")).unwrap_or_else(|| format!("{:>11}", "-"))
        }

        writeln!(
            f,
            "PRCC ({} bootstrap replicates, {:.0}% confidence)",
            self.bootstrap_replicates,
            self.confidence_level * 100.0
        )?;
        writeln!(
            f,
            "{:<12}{:>11}{:>11}{:>11}{:>11}{:>11}",
            "", "original", "bias", "std. error", "min. c.i.", "max. c.i."
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<12}{}{}{}{}{}",
                row.parameter,
                cell(row.original),
                cell(row.bias),
                cell(row.std_error),
                cell(row.ci_lower),
                cell(row.ci_upper)
            )?;
        }
        Ok(())
    }
}

fn check_inputs(inputs: &DMatrix<f64>, output: &[f64]) -> Result<(), AnalysisError> {
    let (n, p) = inputs.shape();
    if output.len() != n {
        return Err(AnalysisError::LengthMismatch {
            context: "output vector",
            expected: n,
            got: output.len(),
        });
    }
    if p == 0 {
        return Err(AnalysisError::InvalidArgument(
            "at least one input column is required".to_string(),
        ));
    }
    if inputs.iter().chain(output).any(|v| !v.is_finite()) {
        return Err(AnalysisError::InvalidArgument(
            "inputs and output must be finite".to_string(),
        ));
    }
    Ok(())
}

fn rank_columns(inputs: &DMatrix<f64>) -> DMatrix<f64> {
    let (n, p) = inputs.shape();
    let mut ranked = DMatrix::zeros(n, p);
    for col in 0..p {
        let column: Vec<f64> = inputs.column(col).iter().copied().collect();
        for (row, r) in rank(&column).into_iter().enumerate() {
            ranked[(row, col)] = r;
        }
    }
    ranked
}

/// Residuals of the least-squares fit of `target` on `design`.
fn residuals(design: &DMatrix<f64>, target: &DVector<f64>) -> Result<DVector<f64>, AnalysisError> {
    let svd = design.clone().svd(true, true);
    let beta = svd
        .solve(target, 1e-12)
        .map_err(|msg| AnalysisError::Degenerate(format!("least squares failed: {msg}")))?;
    Ok(target - design * beta)
}

fn has_variance(residual: &DVector<f64>, target: &DVector<f64>) -> bool {
    let m = target.mean();
    let total: f64 = target.iter().map(|v| (v - m) * (v - m)).sum();
    total > 0.0 && residual.norm_squared() > RESIDUAL_TOLERANCE * total
}

/// Partial correlation of every column of `x` with `y`, controlling for the
/// other columns. No rank transform is applied here.
pub fn partial_correlations(
    x: &DMatrix<f64>,
    y: &[f64],
) -> Result<Vec<Option<f64>>, AnalysisError> {
    check_inputs(x, y)?;
    let (n, p) = x.shape();
    if n <= p + 1 {
        tracing::debug!(n, p, "too few samples for partial correlations");
        return Ok(vec![None; p]);
    }
    let y = DVector::from_column_slice(y);

    let mut coefficients = Vec::with_capacity(p);
    for j in 0..p {
        // intercept + every column except j
        let design = DMatrix::from_fn(n, p, |row, col| {
            if col == 0 {
                1.0
            } else {
                let src = if col <= j { col - 1 } else { col };
                x[(row, src)]
            }
        });
        let xj = DVector::from_iterator(n, x.column(j).iter().copied());

        let res_x = residuals(&design, &xj)?;
        let res_y = residuals(&design, &y)?;
        let coefficient = if has_variance(&res_x, &xj) && has_variance(&res_y, &y) {
            pearson(res_x.as_slice(), res_y.as_slice()).map(|c| c.clamp(-1.0, 1.0))
        } else {
            None
        };
        if coefficient.is_none() {
            tracing::debug!(column = j, "partial correlation undefined");
        }
        coefficients.push(coefficient);
    }
    Ok(coefficients)
}

/// Partial rank correlation coefficient of every input column with the output.
pub fn prcc(inputs: &DMatrix<f64>, output: &[f64]) -> Result<Vec<Option<f64>>, AnalysisError> {
    check_inputs(inputs, output)?;
    partial_correlations(&rank_columns(inputs), &rank(output))
}

/// PRCC with bootstrap bias, standard error and normal-approximation
/// confidence bounds.
pub fn prcc_with_bootstrap<R: Rng + ?Sized>(
    names: &[&str],
    inputs: &DMatrix<f64>,
    output: &[f64],
    replicates: usize,
    confidence_level: f64,
    rng: &mut R,
) -> Result<SensitivityTable, AnalysisError> {
    if names.len() != inputs.ncols() {
        return Err(AnalysisError::LengthMismatch {
            context: "parameter names",
            expected: inputs.ncols(),
            got: names.len(),
        });
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "confidence level must be in (0, 1), got {confidence_level}"
        )));
    }

    let original = prcc(inputs, output)?;
    let (n, p) = inputs.shape();

    // per parameter, the coefficients of the replicates where it was defined
    let mut draws: Vec<Vec<f64>> = vec![Vec::with_capacity(replicates); p];
    let mut incomplete = 0usize;
    let rounds = if original.iter().any(Option::is_some) {
        replicates
    } else {
        0
    };
    let mut picks = vec![0usize; n];
    let mut resampled_y = vec![0.0; n];
    for _ in 0..rounds {
        for pick in picks.iter_mut() {
            *pick = rng.gen_range(0..n);
        }
        let resampled_x = DMatrix::from_fn(n, p, |row, col| inputs[(picks[row], col)]);
        for (slot, &pick) in resampled_y.iter_mut().zip(&picks) {
            *slot = output[pick];
        }

        match prcc(&resampled_x, &resampled_y) {
            Ok(coefficients) => {
                if coefficients.iter().any(Option::is_none) {
                    incomplete += 1;
                }
                for (draw, c) in draws.iter_mut().zip(coefficients) {
                    draw.extend(c);
                }
            }
            Err(err) => {
                incomplete += 1;
                tracing::debug!(error = %err, "bootstrap replicate failed");
            }
        }
    }
    if incomplete > 0 {
        tracing::warn!(
            incomplete,
            replicates,
            "skipped undefined coefficients in degenerate bootstrap replicates"
        );
    }

    let z = standard_normal_quantile(0.5 * (1.0 + confidence_level));
    tracing::debug!(replicates, incomplete, "bootstrap PRCC complete");

    let rows = names
        .iter()
        .zip(&original)
        .zip(&draws)
        .map(|((name, &t0), draw)| {
            let mut row = SensitivityRow {
                parameter: name.to_string(),
                original: t0,
                bias: None,
                std_error: None,
                ci_lower: None,
                ci_upper: None,
                replicates_used: draw.len(),
            };
            if let Some(t0) = t0.filter(|_| draw.len() >= 2) {
                let bias = mean(draw) - t0;
                let se = std_dev(draw);
                let centre = t0 - bias;
                row.bias = Some(bias);
                row.std_error = Some(se);
                row.ci_lower = Some((centre - z * se).clamp(-1.0, 1.0));
                row.ci_upper = Some((centre + z * se).clamp(-1.0, 1.0));
            }
            row
        })
        .collect();

    Ok(SensitivityTable {
        confidence_level,
        bootstrap_replicates: replicates,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::latin_hypercube;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn design(n: usize, p: usize, seed: u64) -> DMatrix<f64> {
        latin_hypercube(n, p, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_monotone_relation_gives_unit_prcc() {
        let x = design(60, 3, 1);
        let y: Vec<f64> = (0..60).map(|i| x[(i, 0)].powi(3)).collect();
        let coefficients = prcc(&x, &y).unwrap();
        assert!((coefficients[0].unwrap() - 1.0).abs() < 1e-9, "{coefficients:?}");
        // the output ranks are fully explained whenever column 0 is controlled for
        assert_eq!(coefficients[1], None);
        assert_eq!(coefficients[2], None);
    }

    #[test]
    fn test_decreasing_relation_gives_negative_prcc() {
        let x = design(60, 2, 2);
        let y: Vec<f64> = (0..60).map(|i| (-5.0 * x[(i, 1)]).exp()).collect();
        let coefficients = prcc(&x, &y).unwrap();
        assert!((coefficients[1].unwrap() + 1.0).abs() < 1e-9, "{coefficients:?}");
        assert_eq!(coefficients[0], None);
    }

    #[test]
    fn test_coefficients_in_unit_interval() {
        let x = design(80, 4, 3);
        let y: Vec<f64> = (0..80)
            .map(|i| x[(i, 0)] + 0.3 * x[(i, 1)] * x[(i, 2)] - 0.1 * x[(i, 3)].sin())
            .collect();
        for c in prcc(&x, &y).unwrap() {
            let c = c.expect("noisy relation has defined coefficients");
            assert!((-1.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn test_single_input_is_spearman() {
        let x = DMatrix::from_column_slice(5, 1, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        let coefficients = prcc(&x, &y).unwrap();
        let expected = pearson(&rank(x.as_slice()), &rank(&y)).unwrap();
        assert!((coefficients[0].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_samples_leaves_coefficients_undefined() {
        let x = design(4, 3, 4);
        let y = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(prcc(&x, &y).unwrap(), vec![None; 3]);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let x = design(10, 2, 14);
        let mut y = vec![1.0; 10];
        y[3] = f64::NAN;
        assert!(matches!(prcc(&x, &y), Err(AnalysisError::InvalidArgument(_))));
    }

    #[test]
    fn test_length_mismatch() {
        let x = design(10, 2, 5);
        let y = vec![0.0; 9];
        assert!(matches!(
            prcc(&x, &y),
            Err(AnalysisError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_constant_output_has_no_coefficients() {
        let x = design(20, 2, 6);
        let y = vec![3.0; 20];
        assert_eq!(prcc(&x, &y).unwrap(), vec![None, None]);

        let mut rng = ChaCha8Rng::seed_from_u64(60);
        let table = prcc_with_bootstrap(&["a", "b"], &x, &y, 25, 0.95, &mut rng).unwrap();
        for row in &table.rows {
            assert_eq!(row.original, None);
            assert_eq!(row.replicates_used, 0);
            assert_eq!(row.ci_lower, None);
        }
    }

    #[test]
    fn test_bootstrap_table() {
        let x = design(100, 2, 7);
        let mut noise = ChaCha8Rng::seed_from_u64(70);
        let y: Vec<f64> = (0..100)
            .map(|i| x[(i, 0)] + 0.2 * noise.gen::<f64>())
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let table = prcc_with_bootstrap(&["a", "b"], &x, &y, 50, 0.95, &mut rng).unwrap();

        assert_eq!(table.rows.len(), 2);
        let a = table.get("a").unwrap();
        assert!(a.original.unwrap() > 0.8);
        assert_eq!(a.replicates_used, 50);
        let (lo, hi) = (a.ci_lower.unwrap(), a.ci_upper.unwrap());
        assert!(lo <= hi);
        assert!((-1.0..=1.0).contains(&lo) && (-1.0..=1.0).contains(&hi));
        assert!(a.std_error.unwrap() >= 0.0);
    }

    #[test]
    fn test_zero_replicates_has_no_bounds() {
        let x = design(30, 2, 9);
        let y: Vec<f64> = (0..30).map(|i| x[(i, 0)] - x[(i, 1)]).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let table = prcc_with_bootstrap(&["a", "b"], &x, &y, 0, 0.95, &mut rng).unwrap();
        assert!(table.rows.iter().all(|row| row.ci_lower.is_none()));
        assert_eq!(table.bootstrap_replicates, 0);
    }

    #[test]
    fn test_table_display_lists_every_parameter() {
        let x = design(30, 2, 12);
        let y: Vec<f64> = (0..30).map(|i| x[(i, 0)] + x[(i, 1)]).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let table = prcc_with_bootstrap(&["alpha", "beta"], &x, &y, 20, 0.9, &mut rng).unwrap();
        let text = table.to_string();
        assert!(text.contains("alpha"));
        assert!(text.contains("beta"));
        assert!(text.contains("min. c.i."));
    }

    #[test]
    fn test_constant_column_skipped_in_every_replicate() {
        let n = 25;
        let varied = design(n, 1, 15);
        let x = DMatrix::from_fn(n, 2, |row, col| match col {
            0 => varied[(row, 0)],
            _ => 4.0,
        });
        let y: Vec<f64> = (0..n).map(|i| x[(i, 0)].sqrt()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(16);
        let table = prcc_with_bootstrap(&["a", "b"], &x, &y, 30, 0.95, &mut rng).unwrap();

        let a = table.get("a").unwrap();
        assert!((a.original.unwrap() - 1.0).abs() < 1e-9);
        assert!(a.replicates_used >= 2);
        assert!(a.ci_lower.is_some() && a.ci_upper.is_some());

        let b = table.get("b").unwrap();
        assert_eq!(b.original, None);
        assert_eq!(b.replicates_used, 0);
        assert_eq!((b.bias, b.std_error, b.ci_lower), (None, None, None));
        assert_eq!(table.bootstrap_replicates, 30);
        let text = table.to_string();
        let b_line = text.lines().find(|line| line.starts_with('b')).unwrap();
        assert!(b_line.split_whitespace().skip(1).all(|cell| cell == "-"));
    }

    #[test]
    fn test_single_replicate_gives_no_bounds() {
        let x = design(30, 2, 17);
        let y: Vec<f64> = (0..30).map(|i| x[(i, 0)] + 0.5 * x[(i, 1)]).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(18);
        let table = prcc_with_bootstrap(&["a", "b"], &x, &y, 1, 0.95, &mut rng).unwrap();
        for row in &table.rows {
            assert!(row.original.is_some());
            assert!(row.replicates_used <= 1);
            assert_eq!((row.bias, row.ci_lower, row.ci_upper), (None, None, None));
        }
    }

    #[test]
    fn test_smallest_design_with_residual_freedom() {
        // N = P + 2, the smallest design with a residual degree of freedom
        for seed in 0..20 {
            let x = design(6, 4, 100 + seed);
            let y: Vec<f64> = (0..6).map(|i| x[(i, 0)] * 2.0 + x[(i, 3)]).collect();
            let coefficients = prcc(&x, &y).unwrap();
            assert_eq!(coefficients.len(), 4);
            for c in coefficients.into_iter().flatten() {
                assert!((-1.0..=1.0).contains(&c));
            }
        }
    }
}
