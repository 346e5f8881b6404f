use std::sync::Mutex;

use lineweaver_core::model::{ComponentCurve, PeakRequest};
use lineweaver_core::{
    AnnotatorConfig, BackgroundFamily, EvaluationGrid, FitBackend, FitOutcome, FitRequest,
    InitialConditions, LineshapeBackend, LineshapeFamily, Parameter, Parameters, Result, Session,
    Status,
};

#[derive(Debug, Clone, PartialEq)]
struct RecordedFit {
    points: usize,
    shifts: Vec<f64>,
    ynorm: bool,
    jitter_init: bool,
    param_names: Vec<String>,
}

/// Backend that evaluates every component as zero and records its calls.
#[derive(Default)]
struct RecordingBackend {
    generated: Mutex<Vec<(PeakRequest, Option<BackgroundFamily>)>>,
    fits: Mutex<Vec<RecordedFit>>,
}

#[derive(Debug, Clone)]
struct FakeModel {
    labels: Vec<String>,
}

impl FitBackend for RecordingBackend {
    type Model = FakeModel;

    fn model_generator(&self, peaks: PeakRequest, background: Option<BackgroundFamily>) -> Result<FakeModel> {
        self.generated.lock().unwrap().push((peaks, background));
        let mut labels: Vec<String> = (1..=peaks.count).map(|i| format!("lp{i}")).collect();
        if background.is_some() {
            labels.push("bg1".to_string());
        }
        Ok(FakeModel { labels })
    }

    fn make_params(&self, model: &FakeModel) -> Parameters {
        let mut params = Parameters::new();
        for label in &model.labels {
            params.insert(Parameter::new(format!("{label}_Amplitude"), 1.0));
            params.insert(Parameter::new(format!("{label}_Center"), 0.0));
        }
        params
    }

    fn eval(&self, _model: &FakeModel, x: &[f64], _params: &Parameters) -> Result<Vec<f64>> {
        Ok(vec![0.0; x.len()])
    }

    fn eval_components(&self, model: &FakeModel, x: &[f64], _params: &Parameters) -> Result<Vec<ComponentCurve>> {
        Ok(model
            .labels
            .iter()
            .map(|name| ComponentCurve {
                name: name.clone(),
                y: vec![0.0; x.len()],
            })
            .collect())
    }

    fn pointwise_fitting(&self, request: FitRequest<'_, FakeModel>) -> Result<FitOutcome> {
        self.fits.lock().unwrap().push(RecordedFit {
            points: request.x.len(),
            shifts: request.shifts.to_vec(),
            ynorm: request.ynorm,
            jitter_init: request.jitter_init,
            param_names: request.params.iter().map(|p| p.name.clone()).collect(),
        });
        let mut params = request.params.clone();
        params.set_value("lp1_Center", 0.25)?;
        Ok(FitOutcome {
            params,
            chi_square: 0.5,
            reduced_chi_square: 0.01,
            best_shift: 0.0,
            iterations: 3,
            y_scale: 1.0,
            converged: true,
        })
    }
}

fn recording_session() -> Session<RecordingBackend> {
    Session::new(RecordingBackend::default(), AnnotatorConfig::default())
}

#[test]
fn run_fit_calls_backend_once_with_default_sweep() {
    let mut session = recording_session();
    session.run_fit().unwrap();

    let backend = session.backend();
    let fits = backend.fits.lock().unwrap();
    assert_eq!(fits.len(), 1);
    let fit = &fits[0];
    assert_eq!(fit.points, 100);
    assert!(fit.ynorm);
    assert!(!fit.jitter_init);
    assert_eq!(fit.shifts.len(), 17);
    assert!((fit.shifts[0] + 0.08).abs() < 1e-12);
    assert!((fit.shifts[16] - 0.08).abs() < 1e-12);
    assert_eq!(fit.param_names, ["lp1_Amplitude", "lp1_Center"]);
    drop(fits);

    assert_eq!(session.params().value("lp1_Center"), Some(0.25));
    assert_eq!(session.control("lp1_Center").unwrap().value, Some(0.25));
    assert!(session.last_fit().is_some());
}

#[test]
fn fit_outcome_from_before_an_upload_is_discarded() {
    let mut session = recording_session();
    let job = session.fit_job().unwrap();
    session
        .load_spectrum_text("new.json", r#"{"xdata": [0, 1, 2], "ydata": [0, 4, 0]}"#)
        .unwrap();

    let backend = session.backend();
    session.finish_fit(job.generation, job.run(backend.as_ref())).unwrap();
    assert_eq!(session.params().value("lp1_Center"), Some(0.0));
    assert!(session.last_fit().is_none());
    assert!(matches!(session.status(), Some(Status::Info(m)) if m.contains("discarded")));

    // A job taken after the change still lands.
    let job = session.fit_job().unwrap();
    session.finish_fit(job.generation, job.run(backend.as_ref())).unwrap();
    assert_eq!(session.params().value("lp1_Center"), Some(0.25));
}

#[test]
fn fit_outcome_from_an_older_model_is_discarded() {
    let mut session = recording_session();
    let job = session.fit_job().unwrap();
    session.set_lineshape_count(3);
    let backend = session.backend();
    session.finish_fit(job.generation, job.run(backend.as_ref())).unwrap();
    assert_eq!(session.params().value("lp1_Center"), Some(0.0));
    assert!(session.last_fit().is_none());
}

#[test]
fn zero_background_count_never_requests_a_background() {
    let mut session = recording_session();
    for family in BackgroundFamily::ALL {
        session.set_background(family);
    }
    session.set_lineshape(LineshapeFamily::Gaussian);
    session.set_background_count(1);
    session.set_background_count(0);

    let backend = session.backend();
    let generated = backend.generated.lock().unwrap();
    let with_zero_count: Vec<_> = generated
        .iter()
        .filter(|(peaks, _)| peaks.family == LineshapeFamily::Voigt)
        .collect();
    assert!(with_zero_count.iter().all(|(_, bg)| bg.is_none()));
    assert_eq!(generated.last().unwrap().1, None);
    assert!(generated.iter().any(|(_, bg)| *bg == Some(BackgroundFamily::Constant)));
}

#[test]
fn initial_conditions_drive_component_counts() {
    let mut session = recording_session();
    session
        .load_inits_text(
            "inits.txt",
            "[{'lp1_': {'amplitude': {'value': 2.0}}},
              {'lp2_': {'center': {'value': -0.3, 'min': -0.5, 'max': 0.0}}},
              {'bg1_': {'amplitude': {'value': 0.1, 'vary': False}}}]",
        )
        .unwrap();

    let spec = session.model_spec();
    assert_eq!(spec.lineshape_count, 2);
    assert_eq!(spec.background_count, 1);
    let titles: Vec<_> = session.control_groups().iter().map(|g| g.component.label()).collect();
    assert_eq!(titles, ["lp1", "lp2", "bg1"]);
    assert_eq!(session.params().value("lp1_Amplitude"), Some(2.0));
    assert_eq!(session.params().value("lp2_Center"), Some(-0.3));
    assert!(!session.params().get("bg1_Amplitude").unwrap().vary);
}

#[test]
fn malformed_initial_conditions_leave_session_untouched() {
    let mut session = recording_session();
    session.set_lineshape_count(4);
    assert!(session.load_inits_text("broken.txt", "[{'lp1_': ").is_err());
    assert_eq!(session.model_spec().lineshape_count, 4);
    assert!(session.inits().is_none());
}

#[test]
fn saved_fit_reloads_as_initial_conditions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fit.json");

    let mut session = Session::new(LineshapeBackend::default(), AnnotatorConfig::default());
    session.set_lineshape(LineshapeFamily::Gaussian);
    session.set_lineshape_count(2);
    session.set_background(BackgroundFamily::Constant);
    session.set_background_count(1);
    session.set_control_value("lp2_Center", 0.6).unwrap();
    session.set_control_vary("bg1_Constant", false).unwrap();
    session.save_fit(&path).unwrap();

    let inits = InitialConditions::read(&path).unwrap();
    assert_eq!(inits.lineshape_count(), 2);
    assert_eq!(inits.background_count(), 1);

    let mut reloaded = Session::new(LineshapeBackend::default(), AnnotatorConfig::default());
    reloaded.set_background(BackgroundFamily::Constant);
    reloaded.set_lineshape(LineshapeFamily::Gaussian);
    reloaded.load_inits_file(&path).unwrap();
    assert_eq!(reloaded.params().value("lp2_Center"), Some(0.6));
    assert!(!reloaded.params().get("bg1_Constant").unwrap().vary);
}

#[test]
fn built_in_backend_fits_an_uploaded_peak() {
    let x: Vec<f64> = (0..120).map(|i| -1.0 + i as f64 * 0.02).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|v| 5.0 * (-(v + 0.2) * (v + 0.2) / (2.0 * 0.1 * 0.1)).exp())
        .collect();
    let text = serde_json::json!({ "xdata": x, "ydata": y }).to_string();

    let mut session = Session::new(LineshapeBackend::default(), AnnotatorConfig::default());
    session.load_spectrum_text("peak.json", &text).unwrap();
    session.set_lineshape(LineshapeFamily::Gaussian);
    session.set_control_value("lp1_Center", -0.15).unwrap();
    session.set_control_value("lp1_Sigma", 0.2).unwrap();
    session.run_fit().unwrap();

    let fit = session.last_fit().unwrap();
    assert!(fit.converged);
    let center = session.params().value("lp1_Center").unwrap();
    let sigma = session.params().value("lp1_Sigma").unwrap();
    assert!((center + 0.2).abs() < 1e-3, "center {center}");
    assert!((sigma - 0.1).abs() < 1e-3, "sigma {sigma}");

    // The composite follows the data after the fit.
    let curves = session.curves().unwrap();
    let peak = curves.composite.iter().cloned().fold(f64::MIN, f64::max);
    assert!((peak - 5.0).abs() < 0.05, "peak {peak}");
}

#[test]
fn legacy_grid_is_used_for_curves_only() {
    let config = AnnotatorConfig {
        grid: EvaluationGrid::Legacy,
        ..AnnotatorConfig::default()
    };
    let session = Session::new(RecordingBackend::default(), config);
    assert_eq!(session.curves().unwrap().x.len(), 492);
    assert_eq!(session.fit_job().unwrap().x.len(), 100);
}
