//! # Spectrum Module
//!
//! Holds the x/y data the model is drawn against and fitted to. A spectrum is
//! either decoded from an uploaded literal file with `xdata`/`ydata` keys or,
//! when nothing has been uploaded, the synthetic sinc curve on [0, 1).

use std::f64::consts::PI;

use crate::error::{AnnotatorError, Result};
use crate::literal::{self, Literal};

/// Number of points of the synthetic fallback spectrum.
pub const SYNTHETIC_POINTS: usize = 100;
/// Spacing of the synthetic fallback spectrum.
pub const SYNTHETIC_STEP: f64 = 0.01;

/// A pair of equal-length coordinate sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Spectrum {
    /// Builds a spectrum, rejecting empty or unequal sequences.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(AnnotatorError::LengthMismatch {
                what: "xdata/ydata",
                left: x.len(),
                right: y.len(),
            });
        }
        if x.is_empty() {
            return Err(AnnotatorError::InvalidInput("spectrum has no points".to_string()));
        }
        Ok(Self { x, y })
    }

    /// x = 0.00, 0.01, ..., 0.99 and y = sinc(x).
    pub fn synthetic() -> Self {
        let x: Vec<f64> = (0..SYNTHETIC_POINTS)
            .map(|i| i as f64 * SYNTHETIC_STEP)
            .collect();
        let y = x.iter().map(|&v| sinc(v)).collect();
        Self { x, y }
    }

    /// Decodes a `{'xdata': [...], 'ydata': [...]}` literal document.
    pub fn parse(text: &str) -> Result<Self> {
        let doc = literal::parse(text)?;
        if doc.as_dict().is_none() {
            return Err(AnnotatorError::InvalidInput(format!(
                "spectrum file must contain a mapping, found a {}",
                doc.type_name()
            )));
        }
        let x = numeric_sequence(&doc, "xdata")?;
        let y = numeric_sequence(&doc, "ydata")?;
        Self::new(x, y)
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Smallest and largest finite x.
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        extent(&self.x)
    }
}

fn numeric_sequence(doc: &Literal, key: &str) -> Result<Vec<f64>> {
    let value = doc
        .get(key)
        .ok_or_else(|| AnnotatorError::MissingKey(key.to_string()))?;
    let items = value.as_list().ok_or_else(|| {
        AnnotatorError::InvalidInput(format!("'{key}' must be a sequence, found a {}", value.type_name()))
    })?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_f64().ok_or_else(|| {
                AnnotatorError::InvalidInput(format!(
                    "'{key}'[{i}] must be a number, found a {}",
                    item.type_name()
                ))
            })
        })
        .collect()
}

/// Normalized sinc, sin(pi x) / (pi x), with sinc(0) = 1.
pub fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let arg = PI * x;
        arg.sin() / arg
    }
}

/// Half-open evenly spaced grid: `ceil((stop - start) / step)` points of
/// `start + i * step`. A zero or wrong-signed step yields an empty grid.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step == 0.0 || !step.is_finite() {
        return Vec::new();
    }
    let count = ((stop - start) / step).ceil();
    if !count.is_finite() || count <= 0.0 {
        return Vec::new();
    }
    (0..count as usize).map(|i| start + i as f64 * step).collect()
}

/// (min, max) over the finite entries of `values`.
pub fn extent(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_spectrum_is_sinc_on_unit_interval() {
        let spectrum = Spectrum::synthetic();
        assert_eq!(spectrum.len(), 100);
        assert_eq!(spectrum.x()[0], 0.0);
        assert!((spectrum.x()[99] - 0.99).abs() < 1e-12);
        assert_eq!(spectrum.y()[0], 1.0);
        for (x, y) in spectrum.x().iter().zip(spectrum.y()) {
            assert!((y - sinc(*x)).abs() < 1e-15);
        }
        // sinc(0.5) = 2 / pi
        assert!((spectrum.y()[50] - 2.0 / PI).abs() < 1e-12);
    }

    #[test]
    fn parses_uploaded_spectrum() {
        let spectrum = Spectrum::parse("{'xdata': [0, 0.5, 1.0], 'ydata': (2, 3, 4.5)}").unwrap();
        assert_eq!(spectrum.x(), [0.0, 0.5, 1.0]);
        assert_eq!(spectrum.y(), [2.0, 3.0, 4.5]);
        assert_eq!(spectrum.x_extent(), Some((0.0, 1.0)));
    }

    #[test]
    fn rejects_malformed_spectra() {
        assert!(matches!(
            Spectrum::parse("{'xdata': [1, 2]}"),
            Err(AnnotatorError::MissingKey(k)) if k == "ydata"
        ));
        assert!(matches!(
            Spectrum::parse("{'xdata': [1, 2], 'ydata': [1]}"),
            Err(AnnotatorError::LengthMismatch { left: 2, right: 1, .. })
        ));
        assert!(matches!(
            Spectrum::parse("{'xdata': [1, 'a'], 'ydata': [1, 2]}"),
            Err(AnnotatorError::InvalidInput(_))
        ));
        assert!(matches!(
            Spectrum::parse("[1, 2]"),
            Err(AnnotatorError::InvalidInput(_))
        ));
        assert!(matches!(
            Spectrum::parse("{'xdata': [1, 2"),
            Err(AnnotatorError::Literal(_))
        ));
    }

    #[test]
    fn arange_follows_half_open_ceil_rule() {
        let shifts = arange(-0.08, 0.09, 0.01);
        assert_eq!(shifts.len(), 17);
        assert!((shifts[0] + 0.08).abs() < 1e-12);
        assert!(shifts[8].abs() < 1e-12);
        assert!((shifts[16] - 0.08).abs() < 1e-12);

        let descending = arange(0.65, -8.0, -0.017595);
        assert_eq!(descending.len(), 492);
        assert!(descending.windows(2).all(|w| w[1] < w[0]));

        assert!(arange(0.0, 1.0, 0.0).is_empty());
        assert!(arange(1.0, 0.0, 0.1).is_empty());
    }
}
