//! # Spectrum Plot Widget
//!
//! Canvas plot of the loaded spectrum overlaid with the model curves: one
//! thin line per component and the composite in a distinct, heavier color.
//! The x axis spans the evaluation grid; the y axis covers every finite value
//! drawn.

use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{self, Frame, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Theme, mouse};

const MARGIN_LEFT: f32 = 60.0;
const MARGIN_RIGHT: f32 = 16.0;
const MARGIN_TOP: f32 = 28.0;
const MARGIN_BOTTOM: f32 = 44.0;
const TICKS: usize = 5;

const fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color { r, g, b, a: 1.0 }
}

const DATA_COLOR: Color = rgb(0.55, 0.75, 0.95);
const COMPOSITE_COLOR: Color = rgb(0.95, 0.35, 0.25);
const COMPONENT_COLORS: [Color; 6] = [
    rgb(0.40, 0.80, 0.45),
    rgb(0.95, 0.80, 0.30),
    rgb(0.75, 0.55, 0.95),
    rgb(0.30, 0.85, 0.85),
    rgb(0.95, 0.55, 0.80),
    rgb(0.70, 0.70, 0.70),
];

/// One named line of the plot.
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(name: impl Into<String>, x: &[f64], y: &[f64]) -> Self {
        Self {
            name: name.into(),
            points: x.iter().copied().zip(y.iter().copied()).collect(),
        }
    }
}

pub struct SpectrumPlot {
    data: Series,
    components: Vec<Series>,
    composite: Option<Series>,
    /// Abscissa range of the evaluation grid.
    x_range: Option<(f64, f64)>,
}

impl SpectrumPlot {
    pub fn new(data: Series, components: Vec<Series>, composite: Option<Series>, x_range: Option<(f64, f64)>) -> Self {
        Self {
            data,
            components,
            composite,
            x_range,
        }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }

    fn all_series(&self) -> impl Iterator<Item = &Series> {
        std::iter::once(&self.data)
            .chain(self.components.iter())
            .chain(self.composite.iter())
    }

    fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let finite = |p: &&(f64, f64)| p.0.is_finite() && p.1.is_finite();
        let x_range = self.x_range.or_else(|| {
            min_max(self.all_series().flat_map(|s| s.points.iter()).filter(finite).map(|p| p.0))
        })?;
        let (x_lo, x_hi) = x_range;
        let in_view = |p: &&(f64, f64)| p.0 >= x_lo.min(x_hi) && p.0 <= x_hi.max(x_lo);
        let y_range = min_max(
            self.all_series()
                .flat_map(|s| s.points.iter())
                .filter(finite)
                .filter(in_view)
                .map(|p| p.1),
        )?;
        Some((widen(x_range), widen(y_range)))
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Pads a degenerate range so it can be mapped to pixels.
fn widen((lo, hi): (f64, f64)) -> (f64, f64) {
    let (lo, hi) = (lo.min(hi), lo.max(hi));
    if hi - lo > f64::EPSILON {
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

fn tick_label(v: f64) -> String {
    if v.abs() >= 1000.0 || (v != 0.0 && v.abs() < 0.01) {
        format!("{v:.1e}")
    } else {
        format!("{v:.2}")
    }
}

impl<Message> canvas::Program<Message> for SpectrumPlot {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let text_color = theme.palette().text;

        let plot_w = bounds.width - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = bounds.height - MARGIN_TOP - MARGIN_BOTTOM;
        if !plot_w.is_finite() || !plot_h.is_finite() || plot_w <= 0.0 || plot_h <= 0.0 {
            return vec![frame.into_geometry()];
        }
        let Some(((x_lo, x_hi), (y_lo, y_hi))) = self.bounds() else {
            return vec![frame.into_geometry()];
        };

        let to_screen = |x: f64, y: f64| {
            Point::new(
                MARGIN_LEFT + ((x - x_lo) / (x_hi - x_lo)) as f32 * plot_w,
                MARGIN_TOP + plot_h - ((y - y_lo) / (y_hi - y_lo)) as f32 * plot_h,
            )
        };

        // Axes box and ticks
        let axes = Path::rectangle(Point::new(MARGIN_LEFT, MARGIN_TOP), iced::Size::new(plot_w, plot_h));
        frame.stroke(&axes, Stroke::default().with_color(text_color).with_width(1.0));
        for i in 0..=TICKS {
            let t = i as f64 / TICKS as f64;
            let xv = x_lo + t * (x_hi - x_lo);
            let yv = y_lo + t * (y_hi - y_lo);
            let xp = to_screen(xv, y_lo);
            let yp = to_screen(x_lo, yv);
            frame.stroke(
                &Path::line(xp, Point::new(xp.x, xp.y + 4.0)),
                Stroke::default().with_color(text_color),
            );
            frame.stroke(
                &Path::line(yp, Point::new(yp.x - 4.0, yp.y)),
                Stroke::default().with_color(text_color),
            );
            frame.fill_text(Text {
                content: tick_label(xv),
                position: Point::new(xp.x, xp.y + 6.0),
                color: text_color,
                size: 11.0.into(),
                horizontal_alignment: Horizontal::Center,
                vertical_alignment: Vertical::Top,
                ..Text::default()
            });
            frame.fill_text(Text {
                content: tick_label(yv),
                position: Point::new(yp.x - 6.0, yp.y),
                color: text_color,
                size: 11.0.into(),
                horizontal_alignment: Horizontal::Right,
                vertical_alignment: Vertical::Center,
                ..Text::default()
            });
        }

        frame.fill_text(Text {
            content: "Energy (eV)".to_string(),
            position: Point::new(MARGIN_LEFT + plot_w / 2.0, bounds.height - 4.0),
            color: text_color,
            size: 14.0.into(),
            horizontal_alignment: Horizontal::Center,
            vertical_alignment: Vertical::Bottom,
            ..Text::default()
        });
        frame.fill_text(Text {
            content: "Normalized intensity (a.u.)".to_string(),
            position: Point::new(4.0, 4.0),
            color: text_color,
            size: 14.0.into(),
            horizontal_alignment: Horizontal::Left,
            vertical_alignment: Vertical::Top,
            ..Text::default()
        });

        let inside = |x: f64| x >= x_lo && x <= x_hi;
        let polyline = |points: &[(f64, f64)]| {
            Path::new(|builder| {
                let mut pen_down = false;
                for &(x, y) in points {
                    if !x.is_finite() || !y.is_finite() || !inside(x) {
                        pen_down = false;
                        continue;
                    }
                    let p = to_screen(x, y);
                    if pen_down {
                        builder.line_to(p);
                    } else {
                        builder.move_to(p);
                        pen_down = true;
                    }
                }
            })
        };

        // Measured data as dots
        for &(x, y) in &self.data.points {
            if x.is_finite() && y.is_finite() && inside(x) {
                frame.fill(&Path::circle(to_screen(x, y), 2.0), DATA_COLOR);
            }
        }

        let mut legend = vec![(self.data.name.clone(), DATA_COLOR)];
        for (i, series) in self.components.iter().enumerate() {
            let color = COMPONENT_COLORS[i % COMPONENT_COLORS.len()];
            frame.stroke(
                &polyline(&series.points),
                Stroke::default().with_color(color).with_width(1.5),
            );
            legend.push((series.name.clone(), color));
        }
        if let Some(composite) = &self.composite {
            frame.stroke(
                &polyline(&composite.points),
                Stroke::default().with_color(COMPOSITE_COLOR).with_width(2.5),
            );
            legend.push((composite.name.clone(), COMPOSITE_COLOR));
        }

        for (row, (name, color)) in legend.into_iter().enumerate() {
            let y = MARGIN_TOP + 10.0 + row as f32 * 16.0;
            let x = MARGIN_LEFT + plot_w - 90.0;
            frame.stroke(
                &Path::line(Point::new(x, y), Point::new(x + 16.0, y)),
                Stroke::default().with_color(color).with_width(2.5),
            );
            frame.fill_text(Text {
                content: name,
                position: Point::new(x + 22.0, y),
                color: text_color,
                size: 12.0.into(),
                vertical_alignment: Vertical::Center,
                ..Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}
