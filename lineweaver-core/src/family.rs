//! # Component Families
//!
//! Closed enumerations of the lineshape and background curve families, each
//! with its fixed, ordered table of parameter labels. Components are named by a
//! prefix token plus a 1-based ordinal (`lp1`, `lp2`, ..., `bg1`); parameter
//! names append the label (`lp1_Amplitude`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix token of lineshape components.
pub const LINESHAPE_PREFIX: &str = "lp";
/// Prefix token of background components.
pub const BACKGROUND_PREFIX: &str = "bg";

/// Largest selectable number of lineshape components.
pub const MAX_LINESHAPES: usize = 20;
/// Largest selectable number of background components.
pub const MAX_BACKGROUNDS: usize = 2;

/// Parametric curve families available for spectral peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineshapeFamily {
    Voigt,
    Gaussian,
    #[serde(rename = "Doniach-Sunjic")]
    DoniachSunjic,
}

impl LineshapeFamily {
    /// Selector order.
    pub const ALL: [LineshapeFamily; 3] = [
        LineshapeFamily::Voigt,
        LineshapeFamily::Gaussian,
        LineshapeFamily::DoniachSunjic,
    ];

    pub fn parameter_labels(self) -> &'static [&'static str] {
        match self {
            LineshapeFamily::Gaussian => &["Amplitude", "Center", "Sigma"],
            LineshapeFamily::Voigt => &["Amplitude", "Center", "Sigma", "Gamma"],
            LineshapeFamily::DoniachSunjic => &["Amplitude", "Center"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LineshapeFamily::Gaussian => "Gaussian",
            LineshapeFamily::Voigt => "Voigt",
            LineshapeFamily::DoniachSunjic => "Doniach-Sunjic",
        }
    }
}

impl fmt::Display for LineshapeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parametric curve families available for the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackgroundFamily {
    Gaussian,
    Exponential,
    Constant,
}

impl BackgroundFamily {
    pub const ALL: [BackgroundFamily; 3] = [
        BackgroundFamily::Gaussian,
        BackgroundFamily::Exponential,
        BackgroundFamily::Constant,
    ];

    pub fn parameter_labels(self) -> &'static [&'static str] {
        match self {
            BackgroundFamily::Gaussian => &["Amplitude", "Center", "Sigma"],
            BackgroundFamily::Exponential => &["Amplitude", "Decay"],
            BackgroundFamily::Constant => &["Constant"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackgroundFamily::Gaussian => "Gaussian",
            BackgroundFamily::Exponential => "Exponential",
            BackgroundFamily::Constant => "Constant",
        }
    }
}

impl fmt::Display for BackgroundFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a component models a peak or the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Lineshape(LineshapeFamily),
    Background(BackgroundFamily),
}

impl ComponentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ComponentKind::Lineshape(_) => LINESHAPE_PREFIX,
            ComponentKind::Background(_) => BACKGROUND_PREFIX,
        }
    }

    pub fn parameter_labels(self) -> &'static [&'static str] {
        match self {
            ComponentKind::Lineshape(family) => family.parameter_labels(),
            ComponentKind::Background(family) => family.parameter_labels(),
        }
    }

    pub fn family_name(self) -> &'static str {
        match self {
            ComponentKind::Lineshape(family) => family.name(),
            ComponentKind::Background(family) => family.name(),
        }
    }
}

/// One term of the composite model: its family and 1-based ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    pub kind: ComponentKind,
    pub ordinal: usize,
}

impl ComponentId {
    pub fn lineshape(family: LineshapeFamily, ordinal: usize) -> Self {
        Self {
            kind: ComponentKind::Lineshape(family),
            ordinal,
        }
    }

    pub fn background(family: BackgroundFamily, ordinal: usize) -> Self {
        Self {
            kind: ComponentKind::Background(family),
            ordinal,
        }
    }

    /// `lp1`, `bg1`, ...
    pub fn label(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.ordinal)
    }

    /// Key of this component's record in an initial-conditions file, e.g. `lp1_`.
    pub fn group_key(&self) -> String {
        format!("{}_", self.label())
    }

    /// Full parameter name, e.g. `lp1_Amplitude`.
    pub fn parameter_name(&self, label: &str) -> String {
        format!("{}{}", self.group_key(), label)
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.kind
            .parameter_labels()
            .iter()
            .map(|label| self.parameter_name(label))
            .collect()
    }

    /// Heading of the control group, e.g. `lp2 Voigt`.
    pub fn title(&self) -> String {
        format!("{} {}", self.label(), self.kind.family_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voigt_declares_four_parameters() {
        assert_eq!(
            LineshapeFamily::Voigt.parameter_labels(),
            ["Amplitude", "Center", "Sigma", "Gamma"]
        );
        assert_eq!(BackgroundFamily::Constant.parameter_labels(), ["Constant"]);
    }

    #[test]
    fn component_naming() {
        let id = ComponentId::lineshape(LineshapeFamily::Gaussian, 3);
        assert_eq!(id.label(), "lp3");
        assert_eq!(id.group_key(), "lp3_");
        assert_eq!(
            id.parameter_names(),
            ["lp3_Amplitude", "lp3_Center", "lp3_Sigma"]
        );
        let bg = ComponentId::background(BackgroundFamily::Exponential, 1);
        assert_eq!(bg.title(), "bg1 Exponential");
        assert_eq!(bg.parameter_names(), ["bg1_Amplitude", "bg1_Decay"]);
    }
}
