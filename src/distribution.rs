//! Parameter distributions
//!
//! Marginal distributions of the uncertain model parameters and their inverse
//! cumulative distribution functions, used to map unit-hypercube samples onto
//! parameter space.

use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Marginal distribution of one uncertain parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Gaussian with the given mean and standard deviation
    Normal { mean: f64, std_dev: f64 },
    /// Uniform over `[lower, upper]`
    Uniform { lower: f64, upper: f64 },
}

impl Distribution {
    pub fn normal(mean: f64, std_dev: f64) -> Self {
        Self::Normal { mean, std_dev }
    }

    pub fn uniform(lower: f64, upper: f64) -> Self {
        Self::Uniform { lower, upper }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        match *self {
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() {
                    return Err(AnalysisError::InvalidDistribution(format!(
                        "normal parameters must be finite (mean={mean}, std_dev={std_dev})"
                    )));
                }
                if std_dev <= 0.0 {
                    return Err(AnalysisError::InvalidDistribution(format!(
                        "normal std_dev must be > 0, got {std_dev}"
                    )));
                }
            }
            Self::Uniform { lower, upper } => {
                if !lower.is_finite() || !upper.is_finite() {
                    return Err(AnalysisError::InvalidDistribution(format!(
                        "uniform bounds must be finite (lower={lower}, upper={upper})"
                    )));
                }
                if lower >= upper {
                    return Err(AnalysisError::InvalidDistribution(format!(
                        "uniform lower bound {lower} must be below upper bound {upper}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Quantile function evaluated at probability `u`, which must lie in `(0, 1)`.
    pub fn inverse_cdf(&self, u: f64) -> Result<f64, AnalysisError> {
        if !(u > 0.0 && u < 1.0) {
            return Err(AnalysisError::InvalidArgument(format!(
                "probability must lie in (0, 1), got {u}"
            )));
        }
        Ok(match *self {
            Self::Normal { mean, std_dev } => mean + std_dev * standard_normal_quantile(u),
            Self::Uniform { lower, upper } => lower + u * (upper - lower),
        })
    }

    /// Central value: the mean of a normal, the midpoint of a uniform.
    pub fn center(&self) -> f64 {
        match *self {
            Self::Normal { mean, .. } => mean,
            Self::Uniform { lower, upper } => 0.5 * (lower + upper),
        }
    }

    pub fn label(&self) -> String {
        match *self {
            Self::Normal { mean, std_dev } => format!("Normal({mean}, {std_dev})"),
            Self::Uniform { lower, upper } => format!("Uniform({lower}, {upper})"),
        }
    }
}

/// Standard normal quantile (Wichura, AS241 `PPND16`).
///
/// Accurate to about 1e-16 relative error over the open unit interval.
/// Returns infinities at the endpoints and NaN outside `[0, 1]`.
pub fn standard_normal_quantile(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let q = p - 0.5;
    if q.abs() <= 0.425 {
        let r = 0.180625 - q * q;
        let num = ((((((2_509.080_928_730_122_7 * r + 33_430.575_583_588_128) * r
            + 67_265.770_927_008_7)
            * r
            + 45_921.953_931_549_87)
            * r
            + 13_731.693_765_509_461)
            * r
            + 1_971.590_950_306_551_3)
            * r
            + 133.141_667_891_784_38)
            * r
            + 3.387_132_872_796_366_5;
        let den = ((((((5_226.495_278_852_545 * r + 28_729.085_735_721_943) * r
            + 39_307.895_800_092_71)
            * r
            + 21_213.794_301_586_596)
            * r
            + 5_394.196_021_424_751)
            * r
            + 687.187_007_492_057_9)
            * r
            + 42.313_330_701_600_91)
            * r
            + 1.0;
        return q * num / den;
    }

    let tail = if q < 0.0 { p } else { 1.0 - p };
    let mut r = (-tail.ln()).sqrt();
    let value = if r <= 5.0 {
        r -= 1.6;
        let num = ((((((7.745_450_142_783_414e-4 * r + 2.272_384_498_926_918_4e-2) * r
            + 2.417_807_251_774_506e-1)
            * r
            + 1.270_458_252_452_368_4)
            * r
            + 3.647_848_324_763_204_6)
            * r
            + 5.769_497_221_460_691)
            * r
            + 4.630_337_846_156_545)
            * r
            + 1.423_437_110_749_683_6;
        let den = ((((((1.050_750_071_644_416_8e-9 * r + 5.475_938_084_995_345e-4) * r
            + 1.519_866_656_361_645_7e-2)
            * r
            + 1.481_039_764_274_800_8e-1)
            * r
            + 6.897_673_349_851e-1)
            * r
            + 1.676_384_830_183_803_8)
            * r
            + 2.053_191_626_637_759)
            * r
            + 1.0;
        num / den
    } else {
        r -= 5.0;
        let num = ((((((2.010_334_399_292_288_1e-7 * r + 2.711_555_568_743_487_6e-5) * r
            + 1.242_660_947_388_078_4e-3)
            * r
            + 2.653_218_952_657_612_3e-2)
            * r
            + 2.965_605_718_285_048_7e-1)
            * r
            + 1.784_826_539_917_291_3)
            * r
            + 5.463_784_911_164_114)
            * r
            + 6.657_904_643_501_103;
        let den = ((((((2.044_263_103_389_939_7e-15 * r + 1.421_511_758_316_445_9e-7) * r
            + 1.846_318_317_510_054_8e-5)
            * r
            + 7.868_691_311_456_133e-4)
            * r
            + 1.487_536_129_085_061_5e-2)
            * r
            + 1.369_298_809_227_358e-1)
            * r
            + 5.998_322_065_558_879e-1)
            * r
            + 1.0;
        num / den
    };

    if q < 0.0 {
        -value
    } else {
        value
    }
}
