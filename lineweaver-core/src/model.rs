//! # Composite Model Specification and Fitting Backend
//!
//! The annotator never evaluates or fits a model itself. It describes the
//! composite structure with a [`ModelSpec`] and hands that to a
//! [`FitBackend`], which owns the opaque model object and provides evaluation,
//! per-component evaluation, parameter setting and pointwise fitting.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::family::{BackgroundFamily, ComponentId, LineshapeFamily, MAX_BACKGROUNDS, MAX_LINESHAPES};
use crate::inits::ParameterGroup;
use crate::params::Parameters;
use crate::spectrum::arange;

/// User-selected structure of the composite model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub lineshape: LineshapeFamily,
    pub lineshape_count: usize,
    /// Selected background family. Stays selectable while `background_count`
    /// is zero but then has no effect on the model.
    pub background: BackgroundFamily,
    pub background_count: usize,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            lineshape: LineshapeFamily::ALL[0],
            lineshape_count: 1,
            background: BackgroundFamily::ALL[0],
            background_count: 0,
        }
    }
}

impl ModelSpec {
    /// Forces the counts into the selector ranges (1..=20 and 0..=2).
    pub fn clamped(mut self) -> Self {
        self.lineshape_count = self.lineshape_count.clamp(1, MAX_LINESHAPES);
        self.background_count = self.background_count.min(MAX_BACKGROUNDS);
        self
    }

    pub fn peaks(&self) -> PeakRequest {
        PeakRequest {
            family: self.lineshape,
            count: self.lineshape_count,
        }
    }

    /// Background requested from the backend: `None` whenever the count is
    /// zero, whatever family is selected.
    pub fn background_request(&self) -> Option<BackgroundFamily> {
        (self.background_count > 0).then_some(self.background)
    }

    /// `lp1..lpN`, then a single `bg1` when a background is requested.
    pub fn components(&self) -> Vec<ComponentId> {
        let mut components: Vec<ComponentId> = (1..=self.lineshape_count)
            .map(|i| ComponentId::lineshape(self.lineshape, i))
            .collect();
        if let Some(bg) = self.background_request() {
            components.push(ComponentId::background(bg, 1));
        }
        components
    }
}

/// `{family: count}` half of a model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakRequest {
    pub family: LineshapeFamily,
    pub count: usize,
}

/// One evaluated sub-curve of the composite model.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentCurve {
    /// Component label, e.g. `lp1` or `bg1`.
    pub name: String,
    pub y: Vec<f64>,
}

/// Shift sweep and normalisation used by the run-fit trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub shift_start: f64,
    pub shift_stop: f64,
    pub shift_step: f64,
    pub ynorm: bool,
    pub jitter_init: bool,
    pub verbose: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            shift_start: -0.08,
            shift_stop: 0.09,
            shift_step: 0.01,
            ynorm: true,
            jitter_init: false,
            verbose: true,
        }
    }
}

impl ScanConfig {
    /// The half-open shift grid `[shift_start, shift_stop)`.
    pub fn shifts(&self) -> Vec<f64> {
        arange(self.shift_start, self.shift_stop, self.shift_step)
    }
}

/// Arguments of a pointwise fit.
#[derive(Debug, Clone)]
pub struct FitRequest<'a, M> {
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub model: &'a M,
    pub params: &'a Parameters,
    pub jitter_init: bool,
    pub shifts: &'a [f64],
    pub verbose: bool,
    pub ynorm: bool,
}

/// Result of a pointwise fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// Best-fit parameters in the units of the supplied y data.
    pub params: Parameters,
    /// Chi-square of the fit, in normalised units when `ynorm` was set.
    pub chi_square: f64,
    pub reduced_chi_square: f64,
    /// Shift of the starting centers that produced the best fit.
    pub best_shift: f64,
    pub iterations: usize,
    /// Factor the data was divided by before fitting (1.0 without `ynorm`).
    pub y_scale: f64,
    pub converged: bool,
}

/// The external fitting capability.
///
/// Implementations own the composite model type. Every entry point takes the
/// model explicitly so callers can hold it next to their own session state.
pub trait FitBackend {
    type Model: Clone;

    /// Builds the composite model; `background` is `None` for no background term.
    fn model_generator(
        &self,
        peaks: PeakRequest,
        background: Option<BackgroundFamily>,
    ) -> Result<Self::Model>;

    /// Default parameter container of `model`.
    fn make_params(&self, model: &Self::Model) -> Parameters;

    /// Composite curve at `x`.
    fn eval(&self, model: &Self::Model, x: &[f64], params: &Parameters) -> Result<Vec<f64>>;

    /// Per-component curves at `x`, in component order.
    fn eval_components(
        &self,
        model: &Self::Model,
        x: &[f64],
        params: &Parameters,
    ) -> Result<Vec<ComponentCurve>>;

    /// Applies initial-condition groups to `params` in place.
    fn varsetter(&self, params: &mut Parameters, groups: &[ParameterGroup]) -> usize {
        params.apply_groups(groups)
    }

    fn pointwise_fitting(&self, request: FitRequest<'_, Self::Model>) -> Result<FitOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_background_count_requests_no_background() {
        for family in BackgroundFamily::ALL {
            let spec = ModelSpec {
                background: family,
                background_count: 0,
                ..ModelSpec::default()
            };
            assert_eq!(spec.background_request(), None);
            assert!(spec.components().iter().all(|c| c.label().starts_with("lp")));
        }
        let spec = ModelSpec {
            background: BackgroundFamily::Exponential,
            background_count: 2,
            ..ModelSpec::default()
        };
        assert_eq!(spec.background_request(), Some(BackgroundFamily::Exponential));
    }

    #[test]
    fn background_group_uses_its_own_ordinal() {
        let spec = ModelSpec {
            lineshape: LineshapeFamily::Voigt,
            lineshape_count: 3,
            background: BackgroundFamily::Constant,
            background_count: 1,
        };
        let labels: Vec<_> = spec.components().iter().map(|c| c.label()).collect();
        assert_eq!(labels, ["lp1", "lp2", "lp3", "bg1"]);
    }

    #[test]
    fn clamps_counts_into_selector_ranges() {
        let spec = ModelSpec {
            lineshape_count: 0,
            background_count: 7,
            ..ModelSpec::default()
        }
        .clamped();
        assert_eq!(spec.lineshape_count, 1);
        assert_eq!(spec.background_count, 2);
    }

    #[test]
    fn default_scan_sweeps_from_minus_to_plus_eight_hundredths() {
        let scan = ScanConfig::default();
        let shifts = scan.shifts();
        assert_eq!(shifts.len(), 17);
        assert!((shifts[0] + 0.08).abs() < 1e-12);
        assert!((shifts[16] - 0.08).abs() < 1e-12);
        assert!(scan.ynorm);
        assert!(!scan.jitter_init);
    }
}
