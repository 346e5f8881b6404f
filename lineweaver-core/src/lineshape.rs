//! # Built-in Lineshape Backend
//!
//! A self-contained [`FitBackend`]: it evaluates sums of Gaussian, Voigt and
//! Doniach-Sunjic peaks over an optional Gaussian, exponential or constant
//! background, and fits them with the bounded Levenberg-Marquardt solver.
//!
//! ## Curve definitions
//! - Gaussian: `A / (σ√(2π)) · exp(-(x-c)² / 2σ²)`
//! - Voigt: `A · Re[w(z)] / (σ√(2π))`, `z = (x - c + iγ) / (σ√2)`
//! - Doniach-Sunjic: `A · cos(πα/2 + (1-α)·atan(u)) / (1+u²)^((1-α)/2)`,
//!   `u = (x-c)/σ`, with σ = 1 and α = 0 because only amplitude and center
//!   are exposed for this family
//! - Exponential: `A · exp(-x/τ)`
//! - Constant: `c`

use std::f64::consts::{PI, SQRT_2};

use num_complex::Complex64;
use tracing::{debug, info};

use crate::error::{AnnotatorError, Result};
use crate::family::{BackgroundFamily, ComponentId, ComponentKind, LineshapeFamily};
use crate::model::{ComponentCurve, FitBackend, FitOutcome, FitRequest, PeakRequest};
use crate::params::{Parameter, Parameters};
use crate::solver::{SolverOptions, levenberg_marquardt};

const SQRT_2PI: f64 = 2.506_628_274_631_000_7;
const DONIACH_SIGMA: f64 = 1.0;
const DONIACH_ASYMMETRY: f64 = 0.0;

/// Composite model produced by [`LineshapeBackend`]: the ordered component list.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLineshape {
    components: Vec<ComponentId>,
}

impl CompositeLineshape {
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }
}

#[derive(Debug, Clone, Default)]
pub struct LineshapeBackend {
    pub solver: SolverOptions,
}

impl LineshapeBackend {
    pub fn new(solver: SolverOptions) -> Self {
        Self { solver }
    }
}

impl FitBackend for LineshapeBackend {
    type Model = CompositeLineshape;

    fn model_generator(
        &self,
        peaks: PeakRequest,
        background: Option<BackgroundFamily>,
    ) -> Result<CompositeLineshape> {
        if peaks.count == 0 {
            return Err(AnnotatorError::InvalidInput(
                "a composite model needs at least one lineshape".to_string(),
            ));
        }
        let mut components: Vec<ComponentId> = (1..=peaks.count)
            .map(|i| ComponentId::lineshape(peaks.family, i))
            .collect();
        if let Some(bg) = background {
            components.push(ComponentId::background(bg, 1));
        }
        debug!(
            "Generated model: {} x {}, background {:?}",
            peaks.count, peaks.family, background
        );
        Ok(CompositeLineshape { components })
    }

    fn make_params(&self, model: &CompositeLineshape) -> Parameters {
        let mut params = Parameters::new();
        for component in &model.components {
            for label in component.kind.parameter_labels() {
                params.insert(default_parameter(component.parameter_name(label), label));
            }
        }
        params
    }

    fn eval(&self, model: &CompositeLineshape, x: &[f64], params: &Parameters) -> Result<Vec<f64>> {
        let mut total = vec![0.0; x.len()];
        for component in &model.components {
            let curve = eval_component(component, x, params)?;
            for (t, v) in total.iter_mut().zip(curve) {
                *t += v;
            }
        }
        Ok(total)
    }

    fn eval_components(
        &self,
        model: &CompositeLineshape,
        x: &[f64],
        params: &Parameters,
    ) -> Result<Vec<ComponentCurve>> {
        model
            .components
            .iter()
            .map(|component| {
                Ok(ComponentCurve {
                    name: component.label(),
                    y: eval_component(component, x, params)?,
                })
            })
            .collect()
    }

    fn pointwise_fitting(&self, request: FitRequest<'_, CompositeLineshape>) -> Result<FitOutcome> {
        let FitRequest {
            x,
            y,
            model,
            params,
            jitter_init,
            shifts,
            verbose,
            ynorm,
        } = request;

        if x.len() != y.len() {
            return Err(AnnotatorError::LengthMismatch {
                what: "x/y",
                left: x.len(),
                right: y.len(),
            });
        }
        if x.is_empty() {
            return Err(AnnotatorError::InvalidInput("no data to fit".to_string()));
        }
        if jitter_init {
            return Err(AnnotatorError::Unsupported(
                "jittered initial values".to_string(),
            ));
        }

        let y_scale = if ynorm {
            let peak = y
                .iter()
                .filter(|v| v.is_finite())
                .fold(0.0_f64, |m, v| m.max(v.abs()));
            if peak > 0.0 { peak } else { 1.0 }
        } else {
            1.0
        };
        let target: Vec<f64> = y.iter().map(|v| v / y_scale).collect();
        let mut initial = params.clone();
        if y_scale != 1.0 {
            rescale_linear(&mut initial, 1.0 / y_scale);
        }

        let residuals = |p: &Parameters| -> Result<Vec<f64>> {
            let fitted = self.eval(model, x, p)?;
            Ok(fitted.iter().zip(&target).map(|(f, t)| f - t).collect())
        };

        let sweep: &[f64] = if shifts.is_empty() { &[0.0] } else { shifts };
        let mut best: Option<(f64, crate::solver::Minimum)> = None;
        let mut last_error = None;
        for &shift in sweep {
            let start = shifted_centers(model, &initial, shift);
            match levenberg_marquardt(&residuals, &start, &self.solver) {
                Ok(minimum) => {
                    if verbose {
                        debug!(
                            "Shift {:+.3}: chi-square {:.6e} after {} iterations",
                            shift, minimum.chi_square, minimum.iterations
                        );
                    }
                    if best
                        .as_ref()
                        .is_none_or(|(_, b)| minimum.chi_square < b.chi_square)
                    {
                        best = Some((shift, minimum));
                    }
                }
                Err(e) => {
                    debug!("Shift {:+.3} failed: {}", shift, e);
                    last_error = Some(e);
                }
            }
        }

        let Some((best_shift, minimum)) = best else {
            return Err(last_error
                .unwrap_or_else(|| AnnotatorError::Fit("no shift produced a fit".to_string())));
        };

        let dof = x.len().saturating_sub(minimum.params.varying().count()).max(1);
        let mut fitted = minimum.params;
        if y_scale != 1.0 {
            rescale_linear(&mut fitted, y_scale);
        }
        let outcome = FitOutcome {
            reduced_chi_square: minimum.chi_square / dof as f64,
            chi_square: minimum.chi_square,
            params: fitted,
            best_shift,
            iterations: minimum.iterations,
            y_scale,
            converged: minimum.converged,
        };
        if verbose {
            info!(
                "Fit finished: chi-square {:.6e}, best shift {:+.3}, converged {}",
                outcome.chi_square, outcome.best_shift, outcome.converged
            );
        }
        Ok(outcome)
    }
}

/// Starting values used by `make_params`.
fn default_parameter(name: String, label: &str) -> Parameter {
    match label {
        "Amplitude" => Parameter::new(name, 1.0),
        "Sigma" => Parameter::new(name, 1.0).with_min(0.0),
        "Gamma" => Parameter::new(name, 0.0).with_min(0.0),
        "Decay" => Parameter::new(name, 1.0),
        _ => Parameter::new(name, 0.0),
    }
}

/// Multiplies the parameters every curve is linear in (amplitudes and the
/// constant background), bounds included, by `factor`.
fn rescale_linear(params: &mut Parameters, factor: f64) {
    for p in params.iter_mut() {
        if p.name.ends_with("_Amplitude") || p.name.ends_with("_Constant") {
            p.value *= factor;
            p.min = p.min.map(|v| v * factor);
            p.max = p.max.map(|v| v * factor);
        }
    }
}

/// Copy of `params` with every varying lineshape center moved by `shift`.
fn shifted_centers(model: &CompositeLineshape, params: &Parameters, shift: f64) -> Parameters {
    let mut start = params.clone();
    if shift == 0.0 {
        return start;
    }
    for component in &model.components {
        if let ComponentKind::Lineshape(_) = component.kind {
            if let Some(center) = start.get_mut(&component.parameter_name("Center")) {
                if center.vary {
                    let moved = center.value + shift;
                    center.set_value(moved);
                }
            }
        }
    }
    start
}

fn value_of(params: &Parameters, component: &ComponentId, label: &str) -> Result<f64> {
    let name = component.parameter_name(label);
    params.value(&name).ok_or(AnnotatorError::MissingKey(name))
}

/// Evaluates a single component at `x`.
pub fn eval_component(component: &ComponentId, x: &[f64], params: &Parameters) -> Result<Vec<f64>> {
    let p = |label: &str| value_of(params, component, label);
    let curve: Vec<f64> = match component.kind {
        ComponentKind::Lineshape(LineshapeFamily::Gaussian)
        | ComponentKind::Background(BackgroundFamily::Gaussian) => {
            let (a, c, s) = (p("Amplitude")?, p("Center")?, p("Sigma")?);
            x.iter().map(|&v| gaussian(v, a, c, s)).collect()
        }
        ComponentKind::Lineshape(LineshapeFamily::Voigt) => {
            let (a, c, s, g) = (p("Amplitude")?, p("Center")?, p("Sigma")?, p("Gamma")?);
            x.iter().map(|&v| voigt(v, a, c, s, g)).collect()
        }
        ComponentKind::Lineshape(LineshapeFamily::DoniachSunjic) => {
            let (a, c) = (p("Amplitude")?, p("Center")?);
            x.iter()
                .map(|&v| doniach_sunjic(v, a, c, DONIACH_SIGMA, DONIACH_ASYMMETRY))
                .collect()
        }
        ComponentKind::Background(BackgroundFamily::Exponential) => {
            let (a, tau) = (p("Amplitude")?, p("Decay")?);
            x.iter().map(|&v| a * (-v / tau).exp()).collect()
        }
        ComponentKind::Background(BackgroundFamily::Constant) => {
            let c = p("Constant")?;
            vec![c; x.len()]
        }
    };
    Ok(curve)
}

/// Area-normalised Gaussian.
pub fn gaussian(x: f64, amplitude: f64, center: f64, sigma: f64) -> f64 {
    let sigma = sigma.max(f64::MIN_POSITIVE);
    let u = (x - center) / sigma;
    amplitude / (SQRT_2PI * sigma) * (-0.5 * u * u).exp()
}

/// Area-normalised Voigt profile.
pub fn voigt(x: f64, amplitude: f64, center: f64, sigma: f64, gamma: f64) -> f64 {
    let sigma = sigma.max(f64::MIN_POSITIVE);
    // The profile depends on |γ| only; w(z) below needs Im z >= 0.
    let z = Complex64::new(x - center, gamma.abs()) / (sigma * SQRT_2);
    amplitude * faddeeva(z).re / (SQRT_2PI * sigma)
}

/// Doniach-Sunjic asymmetric profile.
pub fn doniach_sunjic(x: f64, amplitude: f64, center: f64, sigma: f64, asymmetry: f64) -> f64 {
    let u = (x - center) / sigma;
    let gm1 = 1.0 - asymmetry;
    let scale = amplitude / sigma.powf(gm1);
    scale * (PI * asymmetry / 2.0 + gm1 * u.atan()).cos() / (1.0 + u * u).powf(gm1 / 2.0)
}

/// Faddeeva function w(z) = exp(-z²) erfc(-iz) for Im z >= 0, using
/// Humlicek's four-region rational approximation (relative error ~1e-4).
pub fn faddeeva(z: Complex64) -> Complex64 {
    let (x, y) = (z.re, z.im);
    let t = Complex64::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        t * 0.5641896 / (t * t + 0.5)
    } else if s >= 5.5 {
        let u = t * t;
        t * (u * 0.5641896 + 1.410474) / (u * (u + 3.0) + 0.75)
    } else if y >= 0.195 * x.abs() - 0.176 {
        let num = t * (t * (t * (t * 0.5642236 + 3.778987) + 11.96482) + 20.20933) + 16.4955;
        let den = t * (t * (t * (t * (t + 6.699398) + 21.69274) + 39.27121) + 38.82363) + 16.4955;
        num / den
    } else {
        let u = t * t;
        let num = t
            * (36183.31
                - u * (3321.9905
                    - u * (1540.787 - u * (219.0313 - u * (35.76683 - u * (1.320522 - u * 0.56419))))));
        let den = 32066.6
            - u * (24322.84
                - u * (9022.228
                    - u * (2186.181 - u * (364.2191 - u * (61.57037 - u * (1.841439 - u))))));
        u.exp() - num / den
    }
}
