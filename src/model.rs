//! Atmospheric conductance model
//!
//! Closed-form conductance of a vegetated surface from windspeed, vegetation
//! height and the displacement/roughness scalars of the log wind profile.

use nalgebra::DMatrix;
use thiserror::Error;

use crate::AnalysisError;

/// Default height of the wind measurement above the vegetation [cm]
pub const DEFAULT_ZM_ADD_CM: f64 = 200.0;

/// Non-physical model inputs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("{0} is not finite")]
    NonFinite(&'static str),
    #[error("windspeed must be >= 0 cm/s, got {0}")]
    NegativeWindspeed(f64),
    #[error("height must be > 0 m, got {0}")]
    NonPositiveHeight(f64),
    #[error("roughness scalar k_o must be > 0, got {0}")]
    NonPositiveRoughness(f64),
    #[error("displacement scalar k_d must be >= 0, got {0}")]
    NegativeDisplacement(f64),
    #[error("reference height {zm} cm is not above the displacement height {zd} cm")]
    ReferenceBelowDisplacement { zm: f64, zd: f64 },
    #[error("log wind profile vanishes (zm - zd equals roughness length {zo} cm)")]
    DegenerateProfile { zo: f64 },
}

/// One row of model inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConductanceInputs {
    /// Windspeed [cm/s]
    pub windspeed: f64,
    /// Vegetation height [m]
    pub height: f64,
    /// Zero-plane displacement scalar
    pub k_d: f64,
    /// Roughness length scalar
    pub k_o: f64,
}

/// Sample row in `windspeed, height, k_d, k_o` order
impl From<[f64; 4]> for ConductanceInputs {
    fn from([windspeed, height, k_d, k_o]: [f64; 4]) -> Self {
        Self {
            windspeed,
            height,
            k_d,
            k_o,
        }
    }
}

/// Atmospheric conductance model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConductanceModel {
    /// Height of the wind measurement above the vegetation [cm]
    pub zm_add_cm: f64,
}

impl Default for ConductanceModel {
    fn default() -> Self {
        Self::new(DEFAULT_ZM_ADD_CM)
    }
}

impl ConductanceModel {
    pub fn new(zm_add_cm: f64) -> Self {
        Self { zm_add_cm }
    }

    /// Conductance [mm/s]
    ///
    /// `Ca = v / (6.25 ln((zm - zd) / zo)^2)` with `zd = k_d h`, `zo = k_o h`
    /// and `zm = h + zm_add`, all heights in cm.
    pub fn conductance(&self, inputs: &ConductanceInputs) -> Result<f64, DomainError> {
        let ConductanceInputs {
            windspeed,
            height,
            k_d,
            k_o,
        } = *inputs;

        for (name, value) in [
            ("windspeed", windspeed),
            ("height", height),
            ("k_d", k_d),
            ("k_o", k_o),
            ("zm_add", self.zm_add_cm),
        ] {
            if !value.is_finite() {
                return Err(DomainError::NonFinite(name));
            }
        }
        if windspeed < 0.0 {
            return Err(DomainError::NegativeWindspeed(windspeed));
        }
        if height <= 0.0 {
            return Err(DomainError::NonPositiveHeight(height));
        }
        if k_o <= 0.0 {
            return Err(DomainError::NonPositiveRoughness(k_o));
        }
        if k_d < 0.0 {
            return Err(DomainError::NegativeDisplacement(k_d));
        }

        let height_cm = height * 100.0;
        let zd = k_d * height_cm;
        let zo = k_o * height_cm;
        let zm = height_cm + self.zm_add_cm;

        if zm <= zd {
            return Err(DomainError::ReferenceBelowDisplacement { zm, zd });
        }

        let log_profile = ((zm - zd) / zo).ln();
        let denom = 6.25 * log_profile * log_profile;
        if denom == 0.0 || !denom.is_finite() {
            return Err(DomainError::DegenerateProfile { zo });
        }

        // cm/s -> mm/s
        Ok(windspeed / denom * 10.0)
    }
}

/// Evaluate the model for every row of an N x 4 sample matrix.
pub fn evaluate_samples(
    model: &ConductanceModel,
    samples: &DMatrix<f64>,
) -> Result<Vec<f64>, AnalysisError> {
    let mut outputs = Vec::with_capacity(samples.nrows());
    let mut row_buf = [0.0; 4];

    if samples.ncols() != row_buf.len() {
        return Err(AnalysisError::LengthMismatch {
            context: "sample matrix columns",
            expected: row_buf.len(),
            got: samples.ncols(),
        });
    }

    for row in 0..samples.nrows() {
        for (col, slot) in row_buf.iter_mut().enumerate() {
            *slot = samples[(row, col)];
        }
        let inputs = ConductanceInputs::from(row_buf);
        let value = model
            .conductance(&inputs)
            .map_err(|source| AnalysisError::Domain { row, source })?;
        outputs.push(value);
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> ConductanceInputs {
        ConductanceInputs {
            windspeed: 250.0,
            height: 10.0,
            k_d: 0.7,
            k_o: 0.1,
        }
    }

    #[test]
    fn test_nominal_value() {
        // h = 1000 cm: zm = 1200, zd = 700, zo = 100 -> ln(5)
        let expected = 250.0 / (6.25 * 5.0_f64.ln().powi(2)) * 10.0;
        let value = ConductanceModel::default().conductance(&nominal()).unwrap();
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_from_sample_row_order() {
        assert_eq!(ConductanceInputs::from([250.0, 10.0, 0.7, 0.1]), nominal());
    }

    #[test]
    fn test_deterministic() {
        let model = ConductanceModel::default();
        let a = model.conductance(&nominal()).unwrap();
        let b = model.conductance(&nominal()).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_linear_in_windspeed() {
        let model = ConductanceModel::default();
        let base = model.conductance(&nominal()).unwrap();
        let doubled = model
            .conductance(&ConductanceInputs {
                windspeed: 500.0,
                ..nominal()
            })
            .unwrap();
        assert!((doubled - 2.0 * base).abs() < 1e-9);
    }

    #[test]
    fn test_zero_windspeed_gives_zero() {
        let value = ConductanceModel::default()
            .conductance(&ConductanceInputs {
                windspeed: 0.0,
                ..nominal()
            })
            .unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_non_physical_inputs_are_domain_errors() {
        let model = ConductanceModel::default();
        let cases = [
            // windspeed, height, k_d, k_o
            [250.0, 0.0, 0.7, 0.1],
            [250.0, -1.0, 0.7, 0.1],
            [-5.0, 10.0, 0.7, 0.1],
            [250.0, 10.0, 0.7, 0.0],
            [250.0, 10.0, -0.1, 0.1],
            [250.0, 10.0, 5.0, 0.1],
            [250.0, f64::NAN, 0.7, 0.1],
        ]
        .map(ConductanceInputs::from);
        for inputs in cases {
            assert!(model.conductance(&inputs).is_err(), "{inputs:?} should fail");
        }
    }

    #[test]
    fn test_vanishing_log_profile() {
        // zm - zd = zo  <=>  h + 200 - k_d h = k_o h; with h = 1000 cm, k_d = 0.7: k_o = 0.5
        let inputs = ConductanceInputs {
            k_o: 0.5,
            ..nominal()
        };
        assert!(matches!(
            ConductanceModel::default().conductance(&inputs),
            Err(DomainError::DegenerateProfile { .. })
        ));
    }

    #[test]
    fn test_evaluate_samples_reports_row() {
        let samples = DMatrix::from_row_slice(
            3,
            4,
            &[
                250.0, 10.0, 0.7, 0.1, //
                240.0, 10.2, 0.7, 0.1, //
                250.0, -1.0, 0.7, 0.1,
            ],
        );
        match evaluate_samples(&ConductanceModel::default(), &samples) {
            Err(AnalysisError::Domain { row, source }) => {
                assert_eq!(row, 2);
                assert_eq!(source, DomainError::NonPositiveHeight(-1.0));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_samples_length() {
        let samples = DMatrix::from_fn(7, 4, |_, col| [250.0, 10.0, 0.7, 0.1][col]);
        let outputs = evaluate_samples(&ConductanceModel::default(), &samples).unwrap();
        assert_eq!(outputs.len(), 7);
        assert!(outputs.iter().all(|v| v.is_finite()));
    }
}
