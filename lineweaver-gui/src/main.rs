//! # Lineweaver - Spectrum Annotator GUI
//!
//! Desktop front end for annotating a spectrum with a composite lineshape
//! model: upload data and initial conditions, pick the model structure, tune
//! every parameter by hand and run a shift-swept fit.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Fit Thread**: Spawned per fit so the window stays responsive
//! - **Communication**: Crossbeam channel carrying the fit outcome back
//! - **Updates**: Timer subscription polls the channel only while a fit runs

mod ui;

use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};
use iced::{Element, Subscription, Task, Theme};
use lineweaver_core::{
    AnnotatorConfig, BackgroundFamily, FitOutcome, LineshapeBackend, LineshapeFamily, PlotBackend, Session,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ui::main_display::create_main_view;

/// How often a running fit is polled for its result.
const FIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Command-line arguments for lineweaver
#[derive(Parser, Debug)]
#[command(name = "lineweaver")]
#[command(about = "Interactive multicomponent spectrum annotator")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "LINEWEAVER_CONFIG")]
    config: Option<PathBuf>,

    /// Spectrum to load at startup
    #[arg(short, long, env = "LINEWEAVER_DATA")]
    data: Option<PathBuf>,

    /// Initial-conditions file to load at startup
    #[arg(short, long, env = "LINEWEAVER_INITS")]
    inits: Option<PathBuf>,
}

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lineweaver=info,lineweaver_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting Lineweaver");

    let config = AnnotatorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let backend = LineshapeBackend::new(config.solver.clone());
    let mut session = Session::new(backend, config);

    // Startup files are optional; a bad one is reported in the window.
    if let Some(path) = &args.data {
        if let Err(e) = session.load_spectrum_file(path) {
            warn!("Startup spectrum not loaded: {}", e);
        }
    }
    if let Some(path) = &args.inits {
        if let Err(e) = session.load_inits_file(path) {
            warn!("Startup initial conditions not loaded: {}", e);
        }
    }

    let app = AnnotatorApp::new(session);
    iced::application("Lineweaver", AnnotatorApp::update, AnnotatorApp::view)
        .subscription(AnnotatorApp::subscription)
        .theme(AnnotatorApp::theme)
        .run_with(move || (app, Task::none()))
        .map_err(|e| anyhow!("GUI event loop failed: {e}"))?;

    info!("Lineweaver finished");
    Ok(())
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    // Fitting directives
    UploadData,
    UploadInits,
    LineshapeSelected(LineshapeFamily),
    LineshapeCountSelected(usize),
    BackgroundSelected(BackgroundFamily),
    BackgroundCountSelected(usize),

    // Parameter tuner
    ParameterChanged(String, f64),
    VaryToggled(String, bool),

    // Display panel
    RendererSelected(PlotBackend),

    // Fitting panel
    RunFit,
    SaveFit,
    Refresh,

    /// Timer tick while a fit is running
    Tick,
}

/// A fit running on its own thread.
#[derive(Debug)]
struct FitWorker {
    /// Session generation the fit was started from.
    generation: u64,
    outcome_rx: Receiver<lineweaver_core::Result<FitOutcome>>,
    thread_handle: Option<JoinHandle<()>>,
}

struct AnnotatorApp {
    session: Session<LineshapeBackend>,
    fit_worker: Option<FitWorker>,
}

impl AnnotatorApp {
    fn new(session: Session<LineshapeBackend>) -> Self {
        Self {
            session,
            fit_worker: None,
        }
    }

    fn fit_running(&self) -> bool {
        self.fit_worker.is_some()
    }

    fn update(&mut self, message: Message) {
        debug!("Received message: {:?}", message);

        match message {
            Message::UploadData => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Spectrum", &["txt", "json", "dat"])
                    .pick_file()
                {
                    if let Err(e) = self.session.load_spectrum_file(&path) {
                        warn!("Spectrum upload rejected: {}", e);
                    }
                }
            }
            Message::UploadInits => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Initial conditions", &["txt", "json"])
                    .pick_file()
                {
                    if let Err(e) = self.session.load_inits_file(&path) {
                        warn!("Initial conditions rejected: {}", e);
                    }
                }
            }
            Message::LineshapeSelected(family) => self.session.set_lineshape(family),
            Message::LineshapeCountSelected(count) => self.session.set_lineshape_count(count),
            Message::BackgroundSelected(family) => self.session.set_background(family),
            Message::BackgroundCountSelected(count) => self.session.set_background_count(count),
            Message::ParameterChanged(name, value) => {
                if let Err(e) = self.session.set_control_value(&name, value) {
                    warn!("Slider for {} ignored: {}", name, e);
                }
            }
            Message::VaryToggled(name, vary) => {
                if let Err(e) = self.session.set_control_vary(&name, vary) {
                    warn!("Vary toggle for {} ignored: {}", name, e);
                }
            }
            Message::RendererSelected(backend) => self.session.set_plot_backend(backend),
            Message::RunFit => self.start_fit(),
            Message::SaveFit => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Initial conditions", &["json"])
                    .set_file_name("fit_inits.json")
                    .save_file()
                {
                    if let Err(e) = self.session.save_fit(&path) {
                        warn!("Save fit failed: {}", e);
                    }
                }
            }
            Message::Refresh => {
                if self.fit_running() {
                    info!("Refresh while a fit is running; its result will be discarded");
                    self.detach_fit();
                }
                self.session.refresh();
            }
            Message::Tick => self.poll_fit(),
        }
    }

    /// Snapshots the session and fits it on a worker thread. Ignored while
    /// another fit is still running.
    fn start_fit(&mut self) {
        if self.fit_running() {
            info!("Fit already running; request ignored");
            return;
        }
        let job = match self.session.fit_job() {
            Ok(job) => job,
            Err(e) => {
                let generation = self.session.generation();
                let _ = self.session.finish_fit(generation, Err(e));
                return;
            }
        };
        let backend = self.session.backend();
        let (outcome_tx, outcome_rx) = crossbeam_channel::bounded(1);

        let generation = job.generation;
        info!("Starting fit over {} shifts", job.shifts.len());
        let thread_handle = thread::spawn(move || {
            let outcome = job.run(backend.as_ref());
            if outcome_tx.send(outcome).is_err() {
                debug!("Fit result dropped; the window no longer waits for it");
            }
        });
        self.fit_worker = Some(FitWorker {
            generation,
            outcome_rx,
            thread_handle: Some(thread_handle),
        });
    }

    fn poll_fit(&mut self) {
        let Some(worker) = &mut self.fit_worker else {
            return;
        };
        let outcome = match worker.outcome_rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                Err(lineweaver_core::AnnotatorError::Fit("fit thread exited without a result".to_string()))
            }
        };
        if let Some(handle) = worker.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Fit thread panicked");
            }
        }
        let generation = worker.generation;
        self.fit_worker = None;
        if let Err(e) = self.session.finish_fit(generation, outcome) {
            warn!("{}", e);
        }
    }

    /// Forgets the running fit. The thread finishes on its own and its send
    /// fails silently.
    fn detach_fit(&mut self) {
        if let Some(mut worker) = self.fit_worker.take() {
            drop(worker.thread_handle.take());
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.session, self.fit_running())
    }

    /// Polls for the fit outcome only while a fit is running.
    fn subscription(&self) -> Subscription<Message> {
        if self.fit_running() {
            iced::time::every(FIT_POLL_INTERVAL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
