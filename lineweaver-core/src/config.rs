//! # Session Configuration
//!
//! Tunable settings read from an optional TOML file. Every section and key is
//! optional; missing ones fall back to the defaults below.
//!
//! ```toml
//! grid = "spectrum"        # or "legacy"
//!
//! [scan]
//! shift_start = -0.08
//! shift_stop = 0.09
//! shift_step = 0.01
//! ynorm = true
//!
//! [solver]
//! max_iterations = 200
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AnnotatorError, Result};
use crate::model::ScanConfig;
use crate::solver::SolverOptions;
use crate::spectrum::{Spectrum, arange};

/// Grid the model curves are evaluated on for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationGrid {
    /// The loaded spectrum's own x coordinates.
    #[default]
    Spectrum,
    /// Fixed descending grid from 0.65 down to -8 in steps of 0.017595,
    /// independent of the loaded spectrum.
    Legacy,
}

pub const LEGACY_GRID_START: f64 = 0.65;
pub const LEGACY_GRID_STOP: f64 = -8.0;
pub const LEGACY_GRID_STEP: f64 = -0.017595;

/// Upper limit on the number of center shifts one fit sweeps.
pub const MAX_SHIFTS: usize = 10_000;

impl EvaluationGrid {
    pub fn points(self, spectrum: &Spectrum) -> Vec<f64> {
        match self {
            EvaluationGrid::Spectrum => spectrum.x().to_vec(),
            EvaluationGrid::Legacy => arange(LEGACY_GRID_START, LEGACY_GRID_STOP, LEGACY_GRID_STEP),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    pub grid: EvaluationGrid,
    pub scan: ScanConfig,
    pub solver: SolverOptions,
}

impl AnnotatorConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| AnnotatorError::Config(format!("Parse TOML failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnnotatorError::Config(format!("Read {} failed: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let ScanConfig {
            shift_start,
            shift_stop,
            shift_step,
            ..
        } = self.scan;
        if !shift_step.is_finite() || shift_step == 0.0 {
            return Err(AnnotatorError::Config("scan.shift_step must be non-zero".to_string()));
        }
        if !shift_start.is_finite() || !shift_stop.is_finite() {
            return Err(AnnotatorError::Config("scan.shift_start and scan.shift_stop must be finite".to_string()));
        }
        let shifts = ((shift_stop - shift_start) / shift_step).ceil();
        if !shifts.is_finite() || shifts > MAX_SHIFTS as f64 {
            return Err(AnnotatorError::Config(format!(
                "scan sweeps {shifts} shifts, more than the limit of {MAX_SHIFTS}"
            )));
        }
        if self.solver.max_iterations == 0 {
            return Err(AnnotatorError::Config("solver.max_iterations must be positive".to_string()));
        }
        Ok(())
    }
}
