use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::model::{ConductanceInputs, DEFAULT_ZM_ADD_CM};
use crate::AnalysisError;

/// Parameter names in sample-matrix column order.
pub const PARAMETER_NAMES: [&str; 4] = ["windspeed", "height", "k_d", "k_o"];

/// Runtime configuration for the conductance sensitivity analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of Latin hypercube samples
    pub samples: usize,
    /// RNG seed for reproducibility
    pub seed: u64,
    /// Bootstrap replicates for PRCC confidence bounds (0 disables them)
    pub bootstrap_replicates: usize,
    /// Confidence level of the bootstrap bounds
    pub confidence_level: f64,
    /// Height of the wind measurement above the vegetation [cm]
    pub zm_add_cm: f64,
    /// Windspeed [cm/s]
    pub windspeed: Distribution,
    /// Vegetation height [m]
    pub height: Distribution,
    /// Zero-plane displacement scalar
    pub k_d: Distribution,
    /// Roughness length scalar
    pub k_o: Distribution,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            samples: 100,
            seed: 0x00CA_7A05,
            bootstrap_replicates: 100,
            confidence_level: 0.95,
            zm_add_cm: DEFAULT_ZM_ADD_CM,
            windspeed: Distribution::normal(250.0, 30.0),
            height: Distribution::uniform(9.5, 10.5),
            k_d: Distribution::normal(0.7, 0.007),
            k_o: Distribution::normal(0.1, 0.001),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.samples == 0 {
            return Err(AnalysisError::InvalidArgument(
                "samples must be greater than zero".to_string(),
            ));
        }

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalysisError::InvalidArgument(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }

        if !self.zm_add_cm.is_finite() || self.zm_add_cm < 0.0 {
            return Err(AnalysisError::InvalidArgument(format!(
                "zm_add_cm must be finite and non-negative, got {}",
                self.zm_add_cm
            )));
        }

        for (name, dist) in PARAMETER_NAMES.iter().zip(self.distributions()) {
            dist.validate().map_err(|err| match err {
                AnalysisError::InvalidDistribution(reason) => {
                    AnalysisError::InvalidDistribution(format!("{name}: {reason}"))
                }
                other => other,
            })?;
        }

        Ok(())
    }

    /// Distributions in sample-matrix column order.
    pub fn distributions(&self) -> [Distribution; 4] {
        [self.windspeed, self.height, self.k_d, self.k_o]
    }

    /// Model inputs at the centre of every distribution.
    pub fn nominal_inputs(&self) -> ConductanceInputs {
        ConductanceInputs {
            windspeed: self.windspeed.center(),
            height: self.height.center(),
            k_d: self.k_d.center(),
            k_o: self.k_o.center(),
        }
    }

    /// Load a config from JSON; fields missing from the file keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, AnalysisError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }
}
