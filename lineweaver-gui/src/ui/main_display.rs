//! # Main Display Module
//!
//! Layout of the annotator window: four side-by-side columns for the
//! fitting directives, the parameter tuner, the plot and the fitting panel.

use iced::widget::{Space, button, checkbox, column, container, pick_list, row, scrollable, slider, text};
use iced::{Alignment, Color, Element, Length};
use lineweaver_core::family::{MAX_BACKGROUNDS, MAX_LINESHAPES};
use lineweaver_core::session::{ControlGroup, ParameterControl};
use lineweaver_core::{BackgroundFamily, LineshapeBackend, LineshapeFamily, PlotBackend, Session, Status};

use super::spectrum_plot::{Series, SpectrumPlot};
use crate::Message;

/// Number of slider steps across a control's range.
const SLIDER_STEPS: f64 = 500.0;

const ERROR_COLOR: Color = Color {
    r: 0.9,
    g: 0.3,
    b: 0.3,
    a: 1.0,
};

/// Configuration for a single button in the fitting panel
#[derive(Debug, Clone)]
struct ButtonConfig {
    label: &'static str,
    message: Message,
    /// Disabled while a fit is running.
    needs_idle: bool,
}

const FITTING_BUTTONS: &[ButtonConfig] = &[
    ButtonConfig {
        label: "Run fit",
        message: Message::RunFit,
        needs_idle: true,
    },
    ButtonConfig {
        label: "Save fit",
        message: Message::SaveFit,
        needs_idle: true,
    },
    ButtonConfig {
        label: "Refresh",
        message: Message::Refresh,
        needs_idle: false,
    },
];

/// Creates the complete main application view
pub fn create_main_view(session: &Session<LineshapeBackend>, fit_running: bool) -> Element<'static, Message> {
    let title = text("Lineweaver").size(28);

    let content = row![
        panel("Fitting directives", create_directives_panel(session), Length::FillPortion(2)),
        panel("Parameter tuner", create_tuner_panel(session), Length::FillPortion(3)),
        panel("Display panel", create_display_panel(session), Length::FillPortion(6)),
        panel("Fitting panel", create_fitting_panel(session, fit_running), Length::FillPortion(2)),
    ]
    .spacing(10)
    .align_y(Alignment::Start);

    container(column![title, Space::with_height(10), content].padding(20))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn panel(title: &'static str, body: Element<'static, Message>, width: Length) -> Element<'static, Message> {
    container(column![text(title).size(18), Space::with_height(10), body].spacing(5).padding(10))
        .width(width)
        .height(Length::Fill)
        .into()
}

fn create_directives_panel(session: &Session<LineshapeBackend>) -> Element<'static, Message> {
    let spec = session.model_spec();
    let data_label = session.spectrum_source().unwrap_or("synthetic sinc").to_string();
    let inits_label = session.inits_source().unwrap_or("none").to_string();

    let lineshape_counts: Vec<usize> = (1..=MAX_LINESHAPES).collect();
    let background_counts: Vec<usize> = (0..=MAX_BACKGROUNDS).collect();

    column![
        button(text("Upload data").width(Length::Fill))
            .padding([6, 10])
            .on_press(Message::UploadData),
        text(data_label).size(12),
        button(text("Upload initial conditions").width(Length::Fill))
            .padding([6, 10])
            .on_press(Message::UploadInits),
        text(inits_label).size(12),
        Space::with_height(10),
        text("Lineshape").size(14),
        pick_list(&LineshapeFamily::ALL[..], Some(spec.lineshape), Message::LineshapeSelected),
        text("Number of lineshapes").size(14),
        pick_list(lineshape_counts, Some(spec.lineshape_count), Message::LineshapeCountSelected),
        text("Background").size(14),
        pick_list(&BackgroundFamily::ALL[..], Some(spec.background), Message::BackgroundSelected),
        text("Number of backgrounds").size(14),
        pick_list(background_counts, Some(spec.background_count), Message::BackgroundCountSelected),
    ]
    .spacing(6)
    .into()
}

fn create_tuner_panel(session: &Session<LineshapeBackend>) -> Element<'static, Message> {
    let groups = session
        .control_groups()
        .iter()
        .fold(column![].spacing(14), |col, group| col.push(make_group(session, group)));
    scrollable(groups).height(Length::Fill).into()
}

fn make_group(session: &Session<LineshapeBackend>, group: &ControlGroup) -> Element<'static, Message> {
    let controls = group
        .controls
        .iter()
        .fold(column![text(group.title()).size(15)].spacing(4), |col, control| {
            col.push(make_control(control, session.display_value(control)))
        });
    controls.into()
}

fn make_control(control: &ParameterControl, value: f64) -> Element<'static, Message> {
    let (lo, hi) = control.range;
    let step = ((hi - lo) / SLIDER_STEPS).max(f64::EPSILON);
    let name = control.name.clone();
    let toggle_name = control.name.clone();

    column![
        row![
            text(control.label).size(13),
            Space::with_width(Length::Fill),
            text(format!("{value:.4}")).size(13),
        ],
        row![
            slider(lo..=hi, value.clamp(lo, hi), move |v| Message::ParameterChanged(name.clone(), v)).step(step),
            checkbox("vary", control.vary)
                .size(14)
                .text_size(12)
                .on_toggle(move |b| Message::VaryToggled(toggle_name.clone(), b)),
        ]
        .spacing(8)
        .align_y(Alignment::Center),
    ]
    .spacing(2)
    .into()
}

fn create_display_panel(session: &Session<LineshapeBackend>) -> Element<'static, Message> {
    let renderer = session.plot_backend();
    let selector = row![
        text("Renderer").size(14),
        pick_list(&PlotBackend::ALL[..], Some(renderer), Message::RendererSelected),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let body: Element<'static, Message> = if renderer.is_implemented() {
        create_plot(session)
    } else {
        container(text(format!("The {renderer} renderer is not implemented.")).size(16))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    };

    column![selector, container(body).width(Length::Fill).height(Length::Fill)]
        .spacing(8)
        .into()
}

fn create_plot(session: &Session<LineshapeBackend>) -> Element<'static, Message> {
    let spectrum = session.spectrum();
    let data = Series::new("data", spectrum.x(), spectrum.y());

    let (components, composite, x_range) = match session.curves() {
        Some(curves) => (
            curves
                .components
                .iter()
                .map(|c| Series::new(c.name.clone(), &curves.x, &c.y))
                .collect(),
            Some(Series::new("model", &curves.x, &curves.composite)),
            lineweaver_core::spectrum::extent(&curves.x),
        ),
        None => (Vec::new(), None, spectrum.x_extent()),
    };

    SpectrumPlot::new(data, components, composite, x_range).view()
}

fn create_fitting_panel(session: &Session<LineshapeBackend>, fit_running: bool) -> Element<'static, Message> {
    let buttons = FITTING_BUTTONS.iter().fold(column![].spacing(8), |col, config| {
        col.push(make_button(config, fit_running))
    });

    let mut col = column![buttons].spacing(12);
    if fit_running {
        col = col.push(text("Fitting...").size(14));
    }
    if let Some(status) = session.status() {
        col = col.push(match status {
            Status::Info(message) => text(message.clone()).size(13),
            Status::Error(message) => text(message.clone()).size(13).color(ERROR_COLOR),
        });
    }
    if let Some(fit) = session.last_fit() {
        col = col.push(
            column![
                text("Last fit").size(15),
                text(format!("chi-square: {:.4e}", fit.chi_square)).size(13),
                text(format!("reduced: {:.4e}", fit.reduced_chi_square)).size(13),
                text(format!("best shift: {:+.3}", fit.best_shift)).size(13),
                text(format!("iterations: {}", fit.iterations)).size(13),
                text(format!("converged: {}", fit.converged)).size(13),
            ]
            .spacing(3),
        );
    }
    col.into()
}

fn make_button(config: &ButtonConfig, fit_running: bool) -> Element<'static, Message> {
    let button = button(text(config.label).size(14).width(Length::Fill)).padding([6, 10]);
    if config.needs_idle && fit_running {
        button.into()
    } else {
        button.on_press(config.message.clone()).into()
    }
}
