//! The editable value tree

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{QuotaError, Result};
use crate::scheme::StructuralScheme;

/// Value seeded into every parameter of a zero tree
pub const ZERO_VALUE: &str = "0";

/// A parameter's raw value and its unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterValue {
    pub value: String,
    pub units: String,
}

impl ParameterValue {
    pub fn new(value: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            units: units.into(),
        }
    }

    /// Kubernetes quantity string, e.g. `500m`
    pub fn quantity(&self) -> String {
        format!("{}{}", self.value, self.units)
    }
}

/// Parameter values of one resource object
pub type ObjectValue = BTreeMap<String, ParameterValue>;

/// The full editable quota
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueTree {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub quota: BTreeMap<String, ObjectValue>,
}

/// Quota body as served by the backend
///
/// Either a full [`ValueTree`] or the bare `{object: {parameter: value}}`
/// map, which carries no labels.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QuotaDocument {
    Tree(ValueTree),
    Bare(BTreeMap<String, ObjectValue>),
}

impl From<QuotaDocument> for ValueTree {
    fn from(document: QuotaDocument) -> Self {
        match document {
            QuotaDocument::Tree(tree) => tree,
            QuotaDocument::Bare(quota) => ValueTree {
                labels: BTreeMap::new(),
                quota,
            },
        }
    }
}

/// Keys of a seed tree that disagree with the scheme
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedDrift {
    /// Paths present in the tree but not declared by the scheme
    pub stale: Vec<String>,
    /// Paths declared by the scheme but absent from the tree
    pub missing: Vec<String>,
}

impl SeedDrift {
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.missing.is_empty()
    }
}

impl ValueTree {
    /// Tree with every declared key present and zeroed
    pub fn zeroed(scheme: &StructuralScheme) -> Self {
        let labels = scheme
            .labels
            .keys()
            .map(|label| (label.clone(), String::new()))
            .collect();

        let quota = scheme
            .quota
            .iter()
            .map(|(object, params)| {
                let values = params
                    .iter()
                    .map(|(name, spec)| {
                        (
                            name.clone(),
                            ParameterValue::new(ZERO_VALUE, spec.units.default_unit()),
                        )
                    })
                    .collect();
                (object.clone(), values)
            })
            .collect();

        Self { labels, quota }
    }

    /// Parse a tree from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| QuotaError::parse_error(format!("Invalid quota value: {}", e)))
    }

    /// JSON form handed to the validator and the backend
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| QuotaError::SerializationError(e.to_string()))
    }

    pub fn parameter(&self, object: &str, parameter: &str) -> Option<&ParameterValue> {
        self.quota.get(object).and_then(|values| values.get(parameter))
    }

    /// Compare the tree's keys against a scheme
    pub fn drift(&self, scheme: &StructuralScheme) -> SeedDrift {
        let mut drift = SeedDrift::default();

        for label in self.labels.keys() {
            if !scheme.has_label(label) {
                drift.stale.push(format!("labels.{}", label));
            }
        }
        for label in scheme.labels.keys() {
            if !self.labels.contains_key(label) {
                drift.missing.push(format!("labels.{}", label));
            }
        }

        for (object, values) in &self.quota {
            match scheme.object(object) {
                None => drift.stale.push(format!("quota.{}", object)),
                Some(params) => drift.stale.extend(
                    values
                        .keys()
                        .filter(|name| !params.contains_key(*name))
                        .map(|name| format!("quota.{}.{}", object, name)),
                ),
            }
        }
        for (object, params) in &scheme.quota {
            match self.quota.get(object) {
                None => drift.missing.push(format!("quota.{}", object)),
                Some(values) => drift.missing.extend(
                    params
                        .keys()
                        .filter(|name| !values.contains_key(*name))
                        .map(|name| format!("quota.{}.{}", object, name)),
                ),
            }
        }

        drift
    }
}
