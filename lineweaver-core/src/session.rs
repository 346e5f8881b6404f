//! # Annotator Session
//!
//! Everything one annotator window knows: the loaded spectrum, the optional
//! initial conditions, the selected model structure, the tuner controls, the
//! evaluated curves and the last fit. The GUI maps user events onto the
//! methods here and renders from the accessors, so every state transition is
//! testable without a window.
//!
//! Failed loads never clear the previous state. They leave a [`Status::Error`]
//! the display can show and return the error to the caller.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AnnotatorConfig;
use crate::error::{AnnotatorError, Result};
use crate::family::{BackgroundFamily, ComponentId, LineshapeFamily};
use crate::inits::InitialConditions;
use crate::model::{ComponentCurve, FitBackend, FitOutcome, FitRequest, ModelSpec, ScanConfig};
use crate::params::Parameters;
use crate::spectrum::{Spectrum, extent};

/// Plot renderer choice. Only [`PlotBackend::Canvas`] draws anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotBackend {
    #[default]
    Canvas,
    Svg,
    Vega,
}

impl PlotBackend {
    pub const ALL: [PlotBackend; 3] = [PlotBackend::Canvas, PlotBackend::Svg, PlotBackend::Vega];

    pub fn is_implemented(self) -> bool {
        matches!(self, PlotBackend::Canvas)
    }
}

impl fmt::Display for PlotBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlotBackend::Canvas => "canvas",
            PlotBackend::Svg => "svg",
            PlotBackend::Vega => "vega",
        };
        f.write_str(name)
    }
}

/// Last message for the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

/// One tuner slider plus its vary toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterControl {
    /// Full parameter name, e.g. `lp1_Amplitude`.
    pub name: String,
    pub label: &'static str,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Value set by the initial conditions or the user. `None` leaves the
    /// backend's default parameter value in charge.
    pub value: Option<f64>,
    pub vary: bool,
    /// Slider range: the bounds where given, otherwise derived from the data.
    pub range: (f64, f64),
}

/// The controls of one component, under its title.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlGroup {
    pub component: ComponentId,
    pub controls: Vec<ParameterControl>,
}

impl ControlGroup {
    pub fn title(&self) -> String {
        self.component.title()
    }
}

/// Model curves on the evaluation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Curves {
    pub x: Vec<f64>,
    pub composite: Vec<f64>,
    pub components: Vec<ComponentCurve>,
}

/// Everything a fit needs, detached from the session so it can run on a
/// worker thread.
#[derive(Debug, Clone)]
pub struct FitJob<M> {
    /// Session generation the snapshot was taken from.
    pub generation: u64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub model: M,
    pub params: Parameters,
    pub shifts: Vec<f64>,
    pub scan: ScanConfig,
}

impl<M> FitJob<M> {
    pub fn run<B>(&self, backend: &B) -> Result<FitOutcome>
    where
        B: FitBackend<Model = M>,
    {
        backend.pointwise_fitting(FitRequest {
            x: &self.x,
            y: &self.y,
            model: &self.model,
            params: &self.params,
            jitter_init: self.scan.jitter_init,
            shifts: &self.shifts,
            verbose: self.scan.verbose,
            ynorm: self.scan.ynorm,
        })
    }
}

pub struct Session<B: FitBackend> {
    backend: Arc<B>,
    config: AnnotatorConfig,
    spectrum: Spectrum,
    spectrum_source: Option<String>,
    inits: Option<InitialConditions>,
    inits_source: Option<String>,
    spec: ModelSpec,
    model: Option<B::Model>,
    params: Parameters,
    groups: Vec<ControlGroup>,
    curves: Option<Curves>,
    fit: Option<FitOutcome>,
    plot_backend: PlotBackend,
    status: Option<Status>,
    /// Bumped whenever the data or the model structure changes, so a fit
    /// started before the change can be recognised as stale.
    generation: u64,
}

/// Hand-set state of one control, carried across a rebuild.
#[derive(Debug, Clone, Copy)]
struct KeptControl {
    value: Option<f64>,
    vary: bool,
}

impl<B: FitBackend> Session<B> {
    pub fn new(backend: B, config: AnnotatorConfig) -> Self {
        let mut session = Self {
            backend: Arc::new(backend),
            config,
            spectrum: Spectrum::synthetic(),
            spectrum_source: None,
            inits: None,
            inits_source: None,
            spec: ModelSpec::default(),
            model: None,
            params: Parameters::new(),
            groups: Vec::new(),
            curves: None,
            fit: None,
            plot_backend: PlotBackend::default(),
            status: None,
            generation: 0,
        };
        session.rebuild(&HashMap::new());
        session
    }

    /// Drops all loaded data and selections and starts over.
    pub fn refresh(&mut self) {
        info!("Session refreshed");
        self.spectrum = Spectrum::synthetic();
        self.spectrum_source = None;
        self.inits = None;
        self.inits_source = None;
        self.spec = ModelSpec::default();
        self.fit = None;
        self.plot_backend = PlotBackend::default();
        self.status = None;
        self.generation += 1;
        self.rebuild(&HashMap::new());
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Name of the uploaded spectrum, `None` while the synthetic one is shown.
    pub fn spectrum_source(&self) -> Option<&str> {
        self.spectrum_source.as_deref()
    }

    pub fn inits(&self) -> Option<&InitialConditions> {
        self.inits.as_ref()
    }

    pub fn inits_source(&self) -> Option<&str> {
        self.inits_source.as_deref()
    }

    pub fn model_spec(&self) -> ModelSpec {
        self.spec
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn control_groups(&self) -> &[ControlGroup] {
        &self.groups
    }

    pub fn control(&self, name: &str) -> Option<&ParameterControl> {
        self.groups
            .iter()
            .flat_map(|g| &g.controls)
            .find(|c| c.name == name)
    }

    /// Value a control shows: its own value, else the current parameter value.
    pub fn display_value(&self, control: &ParameterControl) -> f64 {
        control
            .value
            .or_else(|| self.params.value(&control.name))
            .unwrap_or(control.range.0)
    }

    pub fn curves(&self) -> Option<&Curves> {
        self.curves.as_ref()
    }

    pub fn last_fit(&self) -> Option<&FitOutcome> {
        self.fit.as_ref()
    }

    pub fn plot_backend(&self) -> PlotBackend {
        self.plot_backend
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn evaluation_grid(&self) -> Vec<f64> {
        self.config.grid.points(&self.spectrum)
    }

    pub fn load_spectrum_text(&mut self, source: &str, text: &str) -> Result<()> {
        match Spectrum::parse(text) {
            Ok(spectrum) => {
                info!("Loaded spectrum '{}' with {} points", source, spectrum.len());
                self.spectrum = spectrum;
                self.spectrum_source = Some(source.to_string());
                self.fit = None;
                self.generation += 1;
                self.status = Some(Status::Info(format!("Loaded data from {source}")));
                let kept = self.user_values();
                self.rebuild(&kept);
                Ok(())
            }
            Err(e) => Err(self.fail(format!("Could not load data from {source}"), e)),
        }
    }

    pub fn load_spectrum_file(&mut self, path: &Path) -> Result<()> {
        let source = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(text) => self.load_spectrum_text(&source, &text),
            Err(e) => Err(self.fail(format!("Could not read {source}"), e.into())),
        }
    }

    /// Decodes an initial-conditions file, adopts the component counts it
    /// implies and seeds the controls from it.
    pub fn load_inits_text(&mut self, source: &str, text: &str) -> Result<()> {
        let inits = match InitialConditions::parse(text) {
            Ok(inits) => inits,
            Err(e) => return Err(self.fail(format!("Could not load initial conditions from {source}"), e)),
        };

        let lineshapes = inits.lineshape_count();
        let backgrounds = inits.background_count();
        info!(
            "Loaded initial conditions '{}': {} lineshapes, {} backgrounds",
            source, lineshapes, backgrounds
        );
        self.spec = ModelSpec {
            lineshape_count: lineshapes,
            background_count: backgrounds,
            ..self.spec
        }
        .clamped();
        if self.spec.lineshape_count != lineshapes || self.spec.background_count != backgrounds {
            warn!(
                "Component counts {}/{} clamped to {}/{}",
                lineshapes, backgrounds, self.spec.lineshape_count, self.spec.background_count
            );
        }

        self.inits = Some(inits);
        self.inits_source = Some(source.to_string());
        self.fit = None;
        self.generation += 1;
        self.status = Some(Status::Info(format!("Loaded initial conditions from {source}")));
        self.rebuild(&HashMap::new());
        Ok(())
    }

    pub fn load_inits_file(&mut self, path: &Path) -> Result<()> {
        let source = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(text) => self.load_inits_text(&source, &text),
            Err(e) => Err(self.fail(format!("Could not read {source}"), e.into())),
        }
    }

    pub fn set_model_spec(&mut self, spec: ModelSpec) {
        let spec = spec.clamped();
        if spec == self.spec {
            return;
        }
        debug!("Model structure changed to {:?}", spec);
        self.spec = spec;
        self.fit = None;
        self.generation += 1;
        let kept = self.user_values();
        self.rebuild(&kept);
    }

    pub fn set_lineshape(&mut self, family: LineshapeFamily) {
        self.set_model_spec(ModelSpec {
            lineshape: family,
            ..self.spec
        });
    }

    pub fn set_lineshape_count(&mut self, count: usize) {
        self.set_model_spec(ModelSpec {
            lineshape_count: count,
            ..self.spec
        });
    }

    pub fn set_background(&mut self, family: BackgroundFamily) {
        self.set_model_spec(ModelSpec {
            background: family,
            ..self.spec
        });
    }

    pub fn set_background_count(&mut self, count: usize) {
        self.set_model_spec(ModelSpec {
            background_count: count,
            ..self.spec
        });
    }

    pub fn set_plot_backend(&mut self, backend: PlotBackend) {
        self.plot_backend = backend;
        if !backend.is_implemented() {
            self.status = Some(Status::Info(format!("The {backend} renderer is not implemented")));
        }
    }

    /// Moves one slider. The value is clamped to the parameter's bounds.
    pub fn set_control_value(&mut self, name: &str, value: f64) -> Result<()> {
        self.params.set_value(name, value)?;
        let stored = self.params.value(name);
        if let Some(control) = self.control_mut(name) {
            control.value = stored;
        }
        self.evaluate();
        Ok(())
    }

    pub fn set_control_vary(&mut self, name: &str, vary: bool) -> Result<()> {
        let param = self
            .params
            .get_mut(name)
            .ok_or_else(|| AnnotatorError::MissingKey(name.to_string()))?;
        param.vary = vary;
        if let Some(control) = self.control_mut(name) {
            control.vary = vary;
        }
        Ok(())
    }

    /// Snapshot of the data, model and current parameters for a fit.
    pub fn fit_job(&self) -> Result<FitJob<B::Model>> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| AnnotatorError::Fit("no model has been generated".to_string()))?;
        Ok(FitJob {
            generation: self.generation,
            x: self.spectrum.x().to_vec(),
            y: self.spectrum.y().to_vec(),
            model,
            params: self.params.clone(),
            shifts: self.config.scan.shifts(),
            scan: self.config.scan.clone(),
        })
    }

    /// Runs the fit on the calling thread.
    pub fn run_fit(&mut self) -> Result<()> {
        let job = match self.fit_job() {
            Ok(job) => job,
            Err(e) => return Err(self.fail("Fit not started".to_string(), e)),
        };
        let outcome = job.run(self.backend.as_ref());
        self.finish_fit(job.generation, outcome)
    }

    /// Takes the result of a fit, whichever thread ran it. A result for an
    /// older `generation` than the session's is discarded.
    pub fn finish_fit(&mut self, generation: u64, outcome: Result<FitOutcome>) -> Result<()> {
        if generation != self.generation {
            info!(
                "Discarding fit from generation {}; session is at {}",
                generation, self.generation
            );
            self.status = Some(Status::Info(
                "Fit result discarded: data or model changed while it ran".to_string(),
            ));
            return Ok(());
        }
        match outcome {
            Ok(outcome) => {
                info!(
                    "Fit finished: chi-square {:.6e}, reduced {:.6e}, shift {:+.3}",
                    outcome.chi_square, outcome.reduced_chi_square, outcome.best_shift
                );
                self.apply_fit_outcome(outcome);
                Ok(())
            }
            Err(e) => Err(self.fail("Fit failed".to_string(), e)),
        }
    }

    /// Adopts fitted parameters into the tuner controls.
    pub fn apply_fit_outcome(&mut self, outcome: FitOutcome) {
        for fitted in outcome.params.iter() {
            if let Some(param) = self.params.get_mut(&fitted.name) {
                param.value = fitted.value;
            }
        }
        for group in &mut self.groups {
            for control in &mut group.controls {
                if let Some(v) = outcome.params.value(&control.name) {
                    control.value = Some(v);
                    widen(&mut control.range, v);
                }
            }
        }
        self.status = Some(Status::Info(format!(
            "Fit converged = {}, reduced chi-square {:.4e}",
            outcome.converged, outcome.reduced_chi_square
        )));
        self.fit = Some(outcome);
        self.evaluate();
    }

    /// Writes the current parameters as an initial-conditions file.
    pub fn save_fit(&mut self, path: &Path) -> Result<()> {
        let snapshot = InitialConditions::from_parameters(&self.spec.components(), &self.params);
        match snapshot.write(path) {
            Ok(()) => {
                self.status = Some(Status::Info(format!("Saved parameters to {}", path.display())));
                Ok(())
            }
            Err(e) => Err(self.fail(format!("Could not save {}", path.display()), e)),
        }
    }

    fn fail(&mut self, context: String, error: AnnotatorError) -> AnnotatorError {
        warn!("{}: {}", context, error);
        self.status = Some(Status::Error(format!("{context}: {error}")));
        error
    }

    fn control_mut(&mut self, name: &str) -> Option<&mut ParameterControl> {
        self.groups
            .iter_mut()
            .flat_map(|g| &mut g.controls)
            .find(|c| c.name == name)
    }

    /// Values and vary toggles of the current controls, to carry across a
    /// rebuild.
    fn user_values(&self) -> HashMap<String, KeptControl> {
        self.groups
            .iter()
            .flat_map(|g| &g.controls)
            .map(|c| {
                let kept = KeptControl {
                    value: c.value,
                    vary: c.vary,
                };
                (c.name.clone(), kept)
            })
            .collect()
    }

    /// Regenerates the model, parameters and controls for the current
    /// structure, then re-evaluates the curves.
    fn rebuild(&mut self, kept: &HashMap<String, KeptControl>) {
        let model = match self
            .backend
            .model_generator(self.spec.peaks(), self.spec.background_request())
        {
            Ok(model) => model,
            Err(e) => {
                self.fail("Model generation failed".to_string(), e);
                self.model = None;
                self.params = Parameters::new();
                self.groups.clear();
                self.curves = None;
                return;
            }
        };

        let mut params = self.backend.make_params(&model);
        if let Some(inits) = &self.inits {
            let applied = self.backend.varsetter(&mut params, &inits.groups);
            debug!("Applied {} initial-condition records", applied);
        }

        let components = self.spec.components();
        let mut groups = Vec::with_capacity(components.len());
        for component in components {
            let record_group = self.inits.as_ref().and_then(|i| i.group_for(&component));
            let mut controls = Vec::new();
            for &label in component.kind.parameter_labels() {
                let name = component.parameter_name(label);
                let record = record_group.and_then(|g| g.record(label));
                let mut control = ParameterControl {
                    min: record.and_then(|r| r.min),
                    max: record.and_then(|r| r.max),
                    value: record.and_then(|r| r.value),
                    vary: record.is_none_or(|r| r.vary),
                    range: (0.0, 1.0),
                    label,
                    name,
                };
                if let Some(k) = kept.get(&control.name) {
                    control.value = k.value.or(control.value);
                    control.vary = k.vary;
                }
                if let Some(param) = params.get_mut(&control.name) {
                    if let Some(v) = control.value {
                        param.set_value(v);
                        control.value = Some(param.value);
                    }
                    param.vary = control.vary;
                }
                let shown = control
                    .value
                    .or_else(|| params.value(&control.name))
                    .unwrap_or(0.0);
                control.range = slider_range(label, control.min, control.max, shown, &self.spectrum);
                controls.push(control);
            }
            groups.push(ControlGroup { component, controls });
        }

        self.model = Some(model);
        self.params = params;
        self.groups = groups;
        self.evaluate();
    }

    fn evaluate(&mut self) {
        let Some(model) = &self.model else {
            self.curves = None;
            return;
        };
        let x = self.evaluation_grid();
        let evaluated = self.backend.eval(model, &x, &self.params).and_then(|composite| {
            let components = self.backend.eval_components(model, &x, &self.params)?;
            Ok((composite, components))
        });
        match evaluated {
            Ok((composite, components)) => {
                self.curves = Some(Curves {
                    x,
                    composite,
                    components,
                })
            }
            Err(e) => {
                self.fail("Model evaluation failed".to_string(), e);
                self.curves = None;
            }
        }
    }
}

/// Slider range for one parameter: explicit bounds win, the rest comes from
/// the spectrum, widened to include `value`.
fn slider_range(label: &str, min: Option<f64>, max: Option<f64>, value: f64, spectrum: &Spectrum) -> (f64, f64) {
    let (x_lo, x_hi) = spectrum.x_extent().unwrap_or((0.0, 1.0));
    let (y_lo, y_hi) = extent(spectrum.y()).unwrap_or((0.0, 1.0));
    let x_span = (x_hi - x_lo).abs().max(f64::EPSILON);
    let y_peak = y_lo.abs().max(y_hi.abs()).max(f64::EPSILON);

    let (lo, hi) = match label {
        "Center" => (x_lo, x_hi),
        "Sigma" | "Gamma" | "Decay" => (0.0, x_span),
        "Amplitude" => (0.0, y_peak * x_span),
        "Constant" => (y_lo.min(0.0), y_hi),
        _ => (0.0, 1.0),
    };
    let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
    let mut range = (finite(min).unwrap_or(lo), finite(max).unwrap_or(hi));
    widen(&mut range, value);
    if range.1 <= range.0 {
        range.1 = range.0 + 1.0;
    }
    range
}

fn widen(range: &mut (f64, f64), value: f64) {
    if value.is_finite() {
        range.0 = range.0.min(value);
        range.1 = range.1.max(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineshape::LineshapeBackend;

    fn session() -> Session<LineshapeBackend> {
        Session::new(LineshapeBackend::default(), AnnotatorConfig::default())
    }

    #[test]
    fn starts_with_synthetic_spectrum_and_one_voigt() {
        let s = session();
        assert_eq!(s.spectrum().len(), 100);
        assert!(s.spectrum_source().is_none());
        assert_eq!(s.model_spec(), ModelSpec::default());
        assert_eq!(s.control_groups().len(), 1);
        let titles: Vec<_> = s.control_groups()[0].controls.iter().map(|c| c.label).collect();
        assert_eq!(titles, ["Amplitude", "Center", "Sigma", "Gamma"]);
        let curves = s.curves().unwrap();
        assert_eq!(curves.x.len(), 100);
        assert_eq!(curves.components.len(), 1);
    }

    #[test]
    fn bad_upload_keeps_previous_spectrum() {
        let mut s = session();
        s.load_spectrum_text("good.json", r#"{"xdata": [0, 1, 2], "ydata": [1, 3, 1]}"#)
            .unwrap();
        assert_eq!(s.spectrum().len(), 3);
        assert!(s.load_spectrum_text("bad.json", "{'xdata': [0, 1]}").is_err());
        assert_eq!(s.spectrum().len(), 3);
        assert_eq!(s.spectrum_source(), Some("good.json"));
        assert!(matches!(s.status(), Some(Status::Error(_))));
    }

    #[test]
    fn inits_set_counts_and_seed_controls() {
        let mut s = session();
        s.load_inits_text(
            "inits.txt",
            "[{'lp1_': {'center': {'value': 0.3, 'min': 0.1, 'max': 0.6}}},
              {'lp2_': {'amplitude': {'value': 2, 'vary': False}}},
              {'bg1_': {'amplitude': {'value': 0.5}}}]",
        )
        .unwrap();
        let spec = s.model_spec();
        assert_eq!((spec.lineshape_count, spec.background_count), (2, 1));

        let center = s.control("lp1_Center").unwrap();
        assert_eq!(center.value, Some(0.3));
        assert_eq!(center.range, (0.1, 0.6));
        assert_eq!(s.params().get("lp1_Center").unwrap().min, Some(0.1));

        let amplitude = s.control("lp2_Amplitude").unwrap();
        assert!(!amplitude.vary);
        assert!(!s.params().get("lp2_Amplitude").unwrap().vary);
        assert_eq!(s.params().value("bg1_Amplitude"), Some(0.5));

        // Unmentioned parameters keep the backend default.
        let sigma = s.control("lp2_Sigma").unwrap();
        assert_eq!(sigma.value, None);
        assert_eq!(s.display_value(sigma), 1.0);
    }

    #[test]
    fn nan_initial_conditions_never_yield_a_nan_slider() {
        let mut s = session();
        assert!(s
            .load_inits_text("nan.txt", "[{'lp1_': {'center': {'min': 'nan', 'value': 'nan'}}}]")
            .is_err());
        assert!(s.inits().is_none());
        let (lo, hi) = s.control("lp1_Center").unwrap().range;
        assert!(lo.is_finite() && hi.is_finite() && lo < hi);

        let (lo, hi) = slider_range("Center", Some(f64::NAN), Some(f64::INFINITY), f64::NAN, s.spectrum());
        assert!(lo.is_finite() && hi.is_finite() && lo < hi);
        assert_eq!((lo, hi), s.spectrum().x_extent().unwrap());
    }

    #[test]
    fn slider_moves_are_clamped_and_reevaluated() {
        let mut s = session();
        let before = s.curves().unwrap().composite.clone();
        s.set_control_value("lp1_Sigma", -3.0).unwrap();
        assert_eq!(s.control("lp1_Sigma").unwrap().value, Some(0.0));
        s.set_control_value("lp1_Sigma", 0.05).unwrap();
        assert_ne!(s.curves().unwrap().composite, before);
        assert!(s.set_control_value("lp9_Sigma", 1.0).is_err());
    }

    #[test]
    fn hand_set_values_survive_structure_changes() {
        let mut s = session();
        s.set_control_value("lp1_Center", 0.4).unwrap();
        s.set_lineshape_count(3);
        assert_eq!(s.control_groups().len(), 3);
        assert_eq!(s.params().value("lp1_Center"), Some(0.4));
        s.set_lineshape(LineshapeFamily::DoniachSunjic);
        assert!(s.control("lp1_Sigma").is_none());
        assert_eq!(s.params().value("lp1_Center"), Some(0.4));
    }

    #[test]
    fn vary_toggles_survive_structure_changes() {
        let mut s = session();
        s.set_control_vary("lp1_Gamma", false).unwrap();
        s.set_lineshape_count(2);
        assert!(!s.control("lp1_Gamma").unwrap().vary);
        assert!(!s.params().get("lp1_Gamma").unwrap().vary);
        assert!(s.control("lp2_Gamma").unwrap().vary);

        s.load_spectrum_text("d.json", r#"{"xdata": [0, 1, 2], "ydata": [1, 2, 1]}"#)
            .unwrap();
        assert!(!s.params().get("lp1_Gamma").unwrap().vary);
        assert_eq!(s.control("lp1_Gamma").unwrap().value, None);
    }

    #[test]
    fn structure_changes_advance_the_generation() {
        let mut s = session();
        let start = s.generation();
        s.set_lineshape_count(1);
        assert_eq!(s.generation(), start);
        s.set_lineshape_count(2);
        assert_eq!(s.generation(), start + 1);
        s.set_control_value("lp1_Center", 0.2).unwrap();
        assert_eq!(s.generation(), start + 1);
        s.refresh();
        assert_eq!(s.generation(), start + 2);
    }

    #[test]
    fn renderer_choice_reports_unimplemented() {
        let mut s = session();
        s.set_plot_backend(PlotBackend::Vega);
        assert_eq!(s.plot_backend(), PlotBackend::Vega);
        assert!(matches!(s.status(), Some(Status::Info(m)) if m.contains("not implemented")));
    }

    #[test]
    fn refresh_restores_defaults() {
        let mut s = session();
        s.load_spectrum_text("d.json", r#"{"xdata": [0, 1], "ydata": [1, 2]}"#)
            .unwrap();
        s.set_background_count(2);
        s.refresh();
        assert!(s.spectrum_source().is_none());
        assert_eq!(s.model_spec(), ModelSpec::default());
        assert!(s.status().is_none());
    }
}
