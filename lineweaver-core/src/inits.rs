//! # Initial Conditions
//!
//! An initial-conditions file seeds a fitting session with parameter values,
//! bounds and vary flags from an earlier fit. It is an ordered sequence of
//! single-key mappings:
//!
//! ```text
//! [{'lp1_': {'amplitude': {'value': 1.2, 'min': 0, 'max': None, 'vary': True},
//!            'center':    {'value': -0.4}}},
//!  {'bg1_': {'constant':  {'value': 0.05, 'vary': False}}}]
//! ```
//!
//! Component counts are inferred from the keys: every key containing `lp`
//! counts as one lineshape, every key containing `bg` as one background.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::error::{AnnotatorError, Result};
use crate::family::{BACKGROUND_PREFIX, ComponentId, LINESHAPE_PREFIX};
use crate::literal::{self, Literal};
use crate::params::{ParameterRecord, Parameters};

/// The records of one component, keyed like `lp1_`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGroup {
    pub key: String,
    /// (lowercase parameter label, record), in file order.
    pub records: Vec<(String, ParameterRecord)>,
}

impl ParameterGroup {
    /// Record for `label`, matched case-insensitively.
    pub fn record(&self, label: &str) -> Option<&ParameterRecord> {
        self.records
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, r)| r)
    }
}

/// A decoded initial-conditions file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialConditions {
    pub groups: Vec<ParameterGroup>,
}

impl InitialConditions {
    pub fn parse(text: &str) -> Result<Self> {
        let doc = literal::parse(text)?;
        let entries = doc.as_list().ok_or_else(|| {
            AnnotatorError::InvalidInput(format!(
                "initial conditions must be a sequence of mappings, found a {}",
                doc.type_name()
            ))
        })?;

        let groups = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| parse_group(i, entry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { groups })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let inits = Self::parse(&text)?;
        info!(
            "Loaded {} parameter groups from {}",
            inits.groups.len(),
            path.display()
        );
        Ok(inits)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.key.as_str())
    }

    /// Number of keys containing the lineshape token, in any order.
    pub fn lineshape_count(&self) -> usize {
        self.keys().filter(|k| k.contains(LINESHAPE_PREFIX)).count()
    }

    /// Number of keys containing the background token, in any order.
    pub fn background_count(&self) -> usize {
        self.keys().filter(|k| k.contains(BACKGROUND_PREFIX)).count()
    }

    /// The first group whose key contains the component's group key.
    pub fn group_for(&self, component: &ComponentId) -> Option<&ParameterGroup> {
        let wanted = component.group_key();
        self.groups.iter().find(|g| g.key.contains(&wanted))
    }

    /// Snapshot of `params` for the given components, in component order.
    /// Parameters missing from `params` are written as empty records.
    pub fn from_parameters(components: &[ComponentId], params: &Parameters) -> Self {
        let groups = components
            .iter()
            .map(|component| ParameterGroup {
                key: component.group_key(),
                records: component
                    .kind
                    .parameter_labels()
                    .iter()
                    .map(|label| {
                        let record = params
                            .get(&component.parameter_name(label))
                            .map(|p| p.to_record())
                            .unwrap_or_default();
                        (label.to_lowercase(), record)
                    })
                    .collect(),
            })
            .collect();
        Self { groups }
    }

    /// JSON rendering that `parse` accepts.
    pub fn to_json_pretty(&self) -> Result<String> {
        let entries = self
            .groups
            .iter()
            .map(|group| {
                let records = group
                    .records
                    .iter()
                    .map(|(label, record)| Ok((label.clone(), serde_json::to_value(record)?)))
                    .collect::<Result<Map<String, Value>>>()?;
                let mut entry = Map::new();
                entry.insert(group.key.clone(), Value::Object(records));
                Ok(Value::Object(entry))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::to_string_pretty(&Value::Array(entries))?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        info!("Wrote {} parameter groups to {}", self.groups.len(), path.display());
        Ok(())
    }
}

fn parse_group(index: usize, entry: &Literal) -> Result<ParameterGroup> {
    let pairs = entry.as_dict().ok_or_else(|| {
        AnnotatorError::InvalidInput(format!(
            "entry {index} must be a mapping, found a {}",
            entry.type_name()
        ))
    })?;
    let [(key, body)] = pairs else {
        return Err(AnnotatorError::InvalidInput(format!(
            "entry {index} must have exactly one key, found {}",
            pairs.len()
        )));
    };
    let key = key
        .as_str()
        .ok_or_else(|| AnnotatorError::InvalidInput(format!("entry {index} key must be a string")))?;
    let fields = body.as_dict().ok_or_else(|| {
        AnnotatorError::InvalidInput(format!(
            "'{key}' must map parameter labels to records, found a {}",
            body.type_name()
        ))
    })?;

    let records = fields
        .iter()
        .map(|(label, record)| {
            let label = label.as_str().ok_or_else(|| {
                AnnotatorError::InvalidInput(format!("'{key}' has a non-string parameter label"))
            })?;
            let record = ParameterRecord::from_literal(record).map_err(|e| {
                AnnotatorError::InvalidInput(format!("'{key}{label}': {e}"))
            })?;
            Ok((label.to_lowercase(), record))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ParameterGroup {
        key: key.to_string(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::{BackgroundFamily, LineshapeFamily};
    use crate::params::Parameter;

    const SAMPLE: &str = "[
        {'bg1_': {'constant': {'value': 0.1, 'vary': False}}},
        {'lp2_': {'amplitude': {'value': 2}, 'center': {'min': -1, 'max': 1, 'value': 0.2}}},
        {'lp1_': {'Amplitude': {'min': 0}, 'center': {}}},
    ]";

    #[test]
    fn infers_counts_regardless_of_order() {
        let inits = InitialConditions::parse(SAMPLE).unwrap();
        assert_eq!(inits.lineshape_count(), 2);
        assert_eq!(inits.background_count(), 1);
        assert_eq!(inits.keys().collect::<Vec<_>>(), ["bg1_", "lp2_", "lp1_"]);
    }

    #[test]
    fn finds_group_by_component() {
        let inits = InitialConditions::parse(SAMPLE).unwrap();
        let lp1 = ComponentId::lineshape(LineshapeFamily::Gaussian, 1);
        let group = inits.group_for(&lp1).unwrap();
        assert_eq!(group.key, "lp1_");
        let amplitude = group.record("Amplitude").unwrap();
        assert_eq!(amplitude.min, Some(0.0));
        assert_eq!(amplitude.value, None);
        assert!(amplitude.vary);
        assert!(inits.group_for(&ComponentId::lineshape(LineshapeFamily::Gaussian, 3)).is_none());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(InitialConditions::parse("{'lp1_': {}}").is_err());
        assert!(InitialConditions::parse("[{'lp1_': {}, 'lp2_': {}}]").is_err());
        assert!(InitialConditions::parse("[{'lp1_': [1, 2]}]").is_err());
        assert!(InitialConditions::parse("[{'lp1_': {'center': {'min': 'low'}}}]").is_err());
        assert!(InitialConditions::parse("[").is_err());
    }

    #[test]
    fn snapshot_parses_back() {
        let components = [
            ComponentId::lineshape(LineshapeFamily::DoniachSunjic, 1),
            ComponentId::background(BackgroundFamily::Constant, 1),
        ];
        let mut params = Parameters::new();
        params.insert(Parameter::new("lp1_Amplitude", 3.0).with_min(0.0));
        params.insert(Parameter::new("lp1_Center", -0.25));
        params.insert(Parameter::new("bg1_Constant", 0.5));

        let snapshot = InitialConditions::from_parameters(&components, &params);
        let text = snapshot.to_json_pretty().unwrap();
        let reread = InitialConditions::parse(&text).unwrap();

        assert_eq!(reread.lineshape_count(), 1);
        assert_eq!(reread.background_count(), 1);
        let lp1 = reread.group_for(&components[0]).unwrap();
        assert_eq!(lp1.record("amplitude").unwrap().value, Some(3.0));
        assert_eq!(lp1.record("amplitude").unwrap().min, Some(0.0));
        assert_eq!(lp1.record("amplitude").unwrap().max, None);
        assert_eq!(lp1.record("center").unwrap().value, Some(-0.25));
    }
}
