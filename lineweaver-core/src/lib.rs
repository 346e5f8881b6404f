// lineweaver-core/src/lib.rs

//! The core logic of the lineweaver spectrum annotator.
//! This crate decodes spectra and initial-condition files, describes
//! composite lineshape models, and drives fits through a pluggable
//! backend. It is completely headless and contains no GUI code.

pub mod config;
pub mod error;
pub mod family;
pub mod inits;
pub mod lineshape;
pub mod literal;
pub mod model;
pub mod params;
pub mod session;
pub mod solver;
pub mod spectrum;

pub use config::{AnnotatorConfig, EvaluationGrid};
pub use error::{AnnotatorError, Result};
pub use family::{BackgroundFamily, ComponentId, ComponentKind, LineshapeFamily};
pub use inits::{InitialConditions, ParameterGroup};
pub use lineshape::LineshapeBackend;
pub use model::{FitBackend, FitOutcome, FitRequest, ModelSpec, ScanConfig};
pub use params::{Parameter, ParameterRecord, Parameters};
pub use session::{FitJob, PlotBackend, Session, Status};
pub use spectrum::Spectrum;
