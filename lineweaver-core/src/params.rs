//! # Parameter State
//!
//! Named scalar parameters of the composite model. Each parameter carries a
//! value, optional bounds and a vary flag. The container keeps insertion order
//! so the tuner lists parameters component by component.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnnotatorError, Result};
use crate::inits::ParameterGroup;
use crate::literal::Literal;

/// Decoded initial condition of one parameter. Missing numbers stay `None`;
/// they are never read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub value: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default = "default_vary")]
    pub vary: bool,
}

fn default_vary() -> bool {
    true
}

impl Default for ParameterRecord {
    fn default() -> Self {
        Self {
            value: None,
            min: None,
            max: None,
            vary: true,
        }
    }
}

impl ParameterRecord {
    /// Decodes `{'min': .., 'max': .., 'value': .., 'vary': ..}`. Each numeric
    /// field is coerced on its own; an absent key and an explicit null both
    /// decode to `None`.
    pub fn from_literal(lit: &Literal) -> Result<Self> {
        if lit.as_dict().is_none() {
            return Err(AnnotatorError::InvalidInput(format!(
                "parameter record must be a mapping, found a {}",
                lit.type_name()
            )));
        }
        let field = |key: &str| -> Result<Option<f64>> {
            lit.get(key).map_or(Ok(None), |v| {
                coerce_float(v).map_err(|e| AnnotatorError::InvalidInput(format!("'{key}': {e}")))
            })
        };
        let vary = match lit.get("vary") {
            None | Some(Literal::None) => true,
            Some(Literal::Bool(b)) => *b,
            Some(Literal::Int(i)) => *i != 0,
            Some(other) => {
                return Err(AnnotatorError::InvalidInput(format!(
                    "'vary' must be a boolean, found a {}",
                    other.type_name()
                )));
            }
        };
        let value = match field("value")? {
            Some(v) if !v.is_finite() => {
                return Err(AnnotatorError::InvalidInput(format!("'value' must be finite, found {v}")));
            }
            other => other,
        };
        Ok(Self {
            value,
            min: bound(field("min")?, "min")?,
            max: bound(field("max")?, "max")?,
            vary,
        })
    }
}

/// An infinite bound means unbounded; NaN is rejected.
fn bound(v: Option<f64>, key: &str) -> Result<Option<f64>> {
    match v {
        Some(v) if v.is_nan() => Err(AnnotatorError::InvalidInput(format!("'{key}' is not a number"))),
        Some(v) if v.is_infinite() => Ok(None),
        other => Ok(other),
    }
}

/// Converts a literal to a float, passing null through as `None`.
/// Numeric strings and booleans convert the way a float cast would.
pub fn coerce_float(lit: &Literal) -> Result<Option<f64>> {
    match lit {
        Literal::None => Ok(None),
        Literal::Int(i) => Ok(Some(*i as f64)),
        Literal::Float(f) => Ok(Some(*f)),
        Literal::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Literal::Str(s) => parse_float_text(s.trim())
            .map(Some)
            .ok_or_else(|| AnnotatorError::InvalidInput(format!("'{s}' is not a number"))),
        other => Err(AnnotatorError::InvalidInput(format!(
            "expected a number, found a {}",
            other.type_name()
        ))),
    }
}

fn parse_float_text(s: &str) -> Option<f64> {
    match s.to_ascii_lowercase().as_str() {
        "nan" | "+nan" | "-nan" => Some(f64::NAN),
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        _ => s.parse().ok(),
    }
}

/// A live model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub vary: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            min: None,
            max: None,
            vary: true,
        }
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self.value = self.clamp(self.value);
        self
    }

    /// Clamps `v` into this parameter's bounds.
    pub fn clamp(&self, v: f64) -> f64 {
        let v = self.min.map_or(v, |lo| v.max(lo));
        self.max.map_or(v, |hi| v.min(hi))
    }

    pub fn set_value(&mut self, v: f64) {
        self.value = self.clamp(v);
    }

    /// Applies the present fields of `record`; absent fields leave the
    /// parameter unchanged.
    pub fn apply_record(&mut self, record: &ParameterRecord) {
        if let Some(min) = record.min {
            self.min = Some(min);
        }
        if let Some(max) = record.max {
            self.max = Some(max);
        }
        self.vary = record.vary;
        let value = record.value.unwrap_or(self.value);
        self.set_value(value);
    }

    pub fn to_record(&self) -> ParameterRecord {
        ParameterRecord {
            value: Some(self.value),
            min: self.min,
            max: self.max,
            vary: self.vary,
        }
    }
}

/// Ordered parameter container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    params: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a parameter, keeping the original position on replace.
    pub fn insert(&mut self, param: Parameter) {
        match self.position(&param.name) {
            Some(i) => self.params[i] = param,
            None => self.params.push(param),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name == name)
    }

    /// Value of `name`, or `None` if no such parameter exists.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|p| p.value)
    }

    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        let param = self
            .get_mut(name)
            .ok_or_else(|| AnnotatorError::MissingKey(name.to_string()))?;
        param.set_value(value);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.params.iter_mut()
    }

    pub fn varying(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.vary)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Applies initial-condition groups in place. A group keyed `lp1_` with a
    /// record labelled `amplitude` targets `lp1_Amplitude`; labels match
    /// case-insensitively. Returns how many parameters were updated.
    pub fn apply_groups(&mut self, groups: &[ParameterGroup]) -> usize {
        let mut applied = 0;
        for group in groups {
            for (label, record) in &group.records {
                let target = format!("{}{}", group.key, label);
                match self
                    .params
                    .iter_mut()
                    .find(|p| p.name.eq_ignore_ascii_case(&target))
                {
                    Some(param) => {
                        param.apply_record(record);
                        applied += 1;
                    }
                    None => debug!("No model parameter matches '{}'; skipped", target),
                }
            }
        }
        applied
    }

    /// Copy of `self` with `groups` applied.
    pub fn with_groups(&self, groups: &[ParameterGroup]) -> Self {
        let mut updated = self.clone();
        updated.apply_groups(groups);
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal;

    fn record(text: &str) -> ParameterRecord {
        ParameterRecord::from_literal(&literal::parse(text).unwrap()).unwrap()
    }

    #[test]
    fn missing_numbers_are_absent_not_zero() {
        let r = record("{'vary': False}");
        assert_eq!(r.value, None);
        assert_eq!(r.min, None);
        assert_eq!(r.max, None);
        assert!(!r.vary);

        let r = record("{'min': None, 'max': 2, 'value': '1.5'}");
        assert_eq!(r.min, None);
        assert_eq!(r.max, Some(2.0));
        assert_eq!(r.value, Some(1.5));
    }

    #[test]
    fn vary_defaults_to_true() {
        assert!(record("{}").vary);
        assert!(record("{'value': 3}").vary);
        assert!(record("{'vary': None}").vary);
    }

    #[test]
    fn rejects_non_numeric_bounds() {
        let lit = literal::parse("{'min': [1]}").unwrap();
        assert!(ParameterRecord::from_literal(&lit).is_err());
        let lit = literal::parse("{'value': 'wide'}").unwrap();
        assert!(ParameterRecord::from_literal(&lit).is_err());
    }

    #[test]
    fn non_finite_fields_never_reach_a_record() {
        let r = record("{'min': '-inf', 'max': inf, 'value': 0.5}");
        assert_eq!(r.min, None);
        assert_eq!(r.max, None);
        for text in [
            "{'min': 'nan', 'value': 'nan'}",
            "{'min': 'nan'}",
            "{'max': nan}",
            "{'value': inf}",
        ] {
            let lit = literal::parse(text).unwrap();
            assert!(ParameterRecord::from_literal(&lit).is_err(), "{text}");
        }
    }

    #[test]
    fn set_value_clamps_into_bounds() {
        let mut params = Parameters::new();
        params.insert(Parameter::new("lp1_Sigma", 1.0).with_min(0.0));
        params.set_value("lp1_Sigma", -4.0).unwrap();
        assert_eq!(params.value("lp1_Sigma"), Some(0.0));
        assert!(params.set_value("lp9_Sigma", 1.0).is_err());
    }

    #[test]
    fn apply_groups_mutates_in_place() {
        let mut params = Parameters::new();
        params.insert(Parameter::new("lp1_Amplitude", 1.0));
        params.insert(Parameter::new("lp1_Center", 0.0));
        let group = ParameterGroup {
            key: "lp1_".to_string(),
            records: vec![
                (
                    "center".to_string(),
                    ParameterRecord {
                        value: Some(0.3),
                        min: Some(0.1),
                        max: None,
                        vary: false,
                    },
                ),
                ("unknown".to_string(), ParameterRecord::default()),
            ],
        };
        let copy = params.with_groups(std::slice::from_ref(&group));
        assert_eq!(params.value("lp1_Center"), Some(0.0));
        assert_eq!(copy.value("lp1_Center"), Some(0.3));

        let applied = params.apply_groups(&[group]);
        assert_eq!(applied, 1);
        let center = params.get("lp1_Center").unwrap();
        assert_eq!(center.value, 0.3);
        assert_eq!(center.min, Some(0.1));
        assert!(!center.vary);
        assert_eq!(params.value("lp1_Amplitude"), Some(1.0));
    }
}
