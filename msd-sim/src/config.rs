use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::energy::Parameters;
use crate::geometry::Geometry;
use crate::molecule::MolType;
use crate::vector::DVec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum FlipStrategy {
    /// Negate the spin.
    UpDown,
    /// Resample the spin direction uniformly on the sphere.
    #[default]
    Continuous,
}

impl TryFrom<&str> for FlipStrategy {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "up-down" | "updown" | "up_down_model" => Ok(Self::UpDown),
            "continuous" | "continuous_spin_model" => Ok(Self::Continuous),
            _ => Err(format!(
                "unknown flip_strategy '{s}', expected 'up-down' or 'continuous'"
            )),
        }
    }
}

impl TryFrom<String> for FlipStrategy {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

/// State every site is reset to by `reinitialize`. Spins are rescaled to the
/// regional magnitude, fluxes clamped to the regional bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialState {
    pub spin: DVec3,
    pub flux: DVec3,
}

impl Default for InitialState {
    fn default() -> Self {
        Self {
            spin: DVec3::Y,
            flux: DVec3::ZERO,
        }
    }
}

/// Everything needed to build a device with a factory-made molecule.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(flatten)]
    pub geometry: Geometry,
    pub mol_type: MolType,
    #[serde(rename = "initial")]
    pub initial_state: InitialState,
}

fn validate_run_config(cfg: &RunConfig) -> Result<(), ValidationError> {
    if cfg.sampling_steps > 0 && cfg.freq < 1 {
        return Err(ValidationError::new("freq must be >= 1 when sampling"));
    }
    Ok(())
}

/// One equilibrate-then-sample run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_run_config"))]
#[serde(default)]
pub struct RunConfig {
    pub equilibration_steps: u64,
    pub sampling_steps: u64,
    pub freq: u64,
    pub flip: FlipStrategy,
}

fn validate_sweep_config(cfg: &SweepConfig) -> Result<(), ValidationError> {
    if cfg.points < 1 {
        return Err(ValidationError::new("points must be >= 1"));
    }
    if cfg.workers < 1 {
        return Err(ValidationError::new("workers must be >= 1"));
    }
    if cfg.parameters.kt < 0.0 || cfg.kt_stop.is_some_and(|kt| kt < 0.0) {
        return Err(ValidationError::new("kT must be >= 0"));
    }
    Ok(())
}

/// A parameter sweep: `points` independent simulations with kT and B
/// interpolated linearly from `parameters` to the optional stop values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_sweep_config"))]
#[serde(default)]
pub struct SweepConfig {
    pub device: DeviceConfig,
    pub parameters: Parameters,
    pub points: usize,
    pub kt_stop: Option<f64>,
    pub field_stop: Option<DVec3>,
    #[validate]
    pub run: RunConfig,
    /// Seed of the first point; later points use `seed + i`.
    pub seed: Option<u64>,
    pub workers: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            parameters: Parameters::default(),
            points: 1,
            kt_stop: None,
            field_stop: None,
            run: RunConfig::default(),
            seed: None,
            workers: 1,
        }
    }
}

impl SweepConfig {
    /// Parameters of sweep point `i`.
    pub fn point(&self, i: usize) -> Parameters {
        let frac = if self.points > 1 {
            i as f64 / (self.points - 1) as f64
        } else {
            0.0
        };
        let mut p = self.parameters;
        if let Some(stop) = self.kt_stop {
            p.kt += (stop - p.kt) * frac;
        }
        if let Some(stop) = self.field_stop {
            p.field += (stop - p.field) * frac;
        }
        p
    }
}
