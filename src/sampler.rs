//! Latin hypercube sampler
//!
//! Draws a stratified design over the unit hypercube and maps every column
//! through the inverse CDF of its parameter distribution.

use nalgebra::DMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::Open01;

use crate::distribution::Distribution;
use crate::AnalysisError;

/// A Latin hypercube design and the parameter values derived from it
#[derive(Debug, Clone)]
pub struct ParameterSamples {
    /// N x P design on the open unit hypercube
    pub unit: DMatrix<f64>,
    /// N x P parameter values (inverse CDF of `unit`, column by column)
    pub values: DMatrix<f64>,
}

impl ParameterSamples {
    pub fn column(&self, col: usize) -> Vec<f64> {
        self.values.column(col).iter().copied().collect()
    }
}

/// Unit-hypercube Latin hypercube design with `n` rows and `p` columns.
///
/// Row `i` of column `j` lies in stratum `perm_j(i)`, i.e. in
/// `(perm_j(i) / n, (perm_j(i) + 1) / n)`, where every `perm_j` is an
/// independent random permutation of `0..n`.
pub fn latin_hypercube<R: Rng + ?Sized>(
    n: usize,
    p: usize,
    rng: &mut R,
) -> Result<DMatrix<f64>, AnalysisError> {
    if n == 0 {
        return Err(AnalysisError::InvalidArgument(
            "sample count must be greater than zero".to_string(),
        ));
    }
    if p == 0 {
        return Err(AnalysisError::InvalidArgument(
            "parameter count must be greater than zero".to_string(),
        ));
    }

    let mut design = DMatrix::zeros(n, p);
    let mut strata: Vec<usize> = (0..n).collect();
    let scale = 1.0 / n as f64;

    for col in 0..p {
        strata.shuffle(rng);
        for (row, &stratum) in strata.iter().enumerate() {
            let jitter: f64 = rng.sample(Open01);
            // stays strictly inside (0, 1) even after rounding
            let u = ((stratum as f64 + jitter) * scale)
                .clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON / 2.0);
            design[(row, col)] = u;
        }
    }

    Ok(design)
}

/// Latin hypercube sample of the given parameter distributions.
pub fn sample_parameters<R: Rng + ?Sized>(
    distributions: &[Distribution],
    n: usize,
    rng: &mut R,
) -> Result<ParameterSamples, AnalysisError> {
    for dist in distributions {
        dist.validate()?;
    }

    let unit = latin_hypercube(n, distributions.len(), rng)?;
    let mut values = DMatrix::zeros(n, distributions.len());
    for (col, dist) in distributions.iter().enumerate() {
        for row in 0..n {
            values[(row, col)] = dist.inverse_cdf(unit[(row, col)])?;
        }
    }

    tracing::debug!(
        samples = n,
        parameters = distributions.len(),
        "latin hypercube sample drawn"
    );

    Ok(ParameterSamples { unit, values })
}
