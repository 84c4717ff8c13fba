//! Structural and validation schemes
//!
//! The structural scheme declares which resource objects, parameters and
//! labels exist. The validation scheme is a JSON-Schema-shaped document that
//! mirrors the same nesting and is only ever handed to a [`Validator`].
//!
//! [`Validator`]: crate::validation::Validator

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use crate::error::{QuotaError, Result};
use crate::validation::Violation;

/// Resource object names must be DNS-1123 subdomains
const OBJECT_NAME_PATTERN: &str =
    r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";

/// Kubernetes label value syntax
const LABEL_VALUE_PATTERN: &str = r"^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$";

const LABEL_VALUE_MAX_LENGTH: u64 = 63;

/// Unit suffixes a Kubernetes quantity may carry; `""` means none
pub const VALID_UNITS: &[&str] = &[
    "", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P", "E",
];

/// Fewest entries a selectable unit list may have
pub const MIN_SELECTABLE_UNITS: usize = 2;

const INT_VALUE_PATTERN: &str = r"^[0-9]+$";
const FLOAT_VALUE_PATTERN: &str = r"^[0-9]+(\.[0-9]+)?$";

/// Numeric kind of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Int,
    Float,
}

impl ParameterType {
    /// Pattern a value of this type must match
    pub fn value_pattern(&self) -> &'static str {
        match self {
            ParameterType::Int => INT_VALUE_PATTERN,
            ParameterType::Float => FLOAT_VALUE_PATTERN,
        }
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterType::Int => write!(f, "int"),
            ParameterType::Float => write!(f, "float"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawUnits {
    One(String),
    Many(Vec<String>),
}

/// Unit declaration of a parameter
///
/// On the wire this is `""`, a bare string, or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUnits", into = "RawUnits")]
pub enum Units {
    /// Unit-less value
    None,
    /// Fixed, read-only unit
    Fixed(String),
    /// User-selectable units; the first entry is the default
    Selectable(Vec<String>),
}

impl From<RawUnits> for Units {
    fn from(raw: RawUnits) -> Self {
        match raw {
            RawUnits::One(unit) if unit.is_empty() => Units::None,
            RawUnits::One(unit) => Units::Fixed(unit),
            RawUnits::Many(units) => Units::Selectable(units),
        }
    }
}

impl From<Units> for RawUnits {
    fn from(units: Units) -> Self {
        match units {
            Units::None => RawUnits::One(String::new()),
            Units::Fixed(unit) => RawUnits::One(unit),
            Units::Selectable(units) => RawUnits::Many(units),
        }
    }
}

impl Default for Units {
    fn default() -> Self {
        Units::None
    }
}

impl Units {
    /// Unit a freshly seeded parameter starts with
    pub fn default_unit(&self) -> &str {
        match self {
            Units::None => "",
            Units::Fixed(unit) => unit,
            Units::Selectable(units) => units.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Every unit a value may carry
    pub fn allowed(&self) -> Vec<String> {
        match self {
            Units::None => vec![String::new()],
            Units::Fixed(unit) => vec![unit.clone()],
            Units::Selectable(units) => units.clone(),
        }
    }

    pub fn is_selectable(&self) -> bool {
        matches!(self, Units::Selectable(_))
    }
}

/// Declaration of a single parameter inside a resource object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Display name
    pub name: String,
    /// Numeric kind
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// Unit declaration
    #[serde(default)]
    pub units: Units,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, kind: ParameterType, units: Units) -> Self {
        Self {
            name: name.into(),
            kind,
            units,
        }
    }

    /// Display name with the fixed unit appended, e.g. `Memory (Gi)`
    pub fn display_label(&self) -> String {
        match &self.units {
            Units::Fixed(unit) => format!("{} ({})", self.name, unit),
            Units::None | Units::Selectable(_) => self.name.clone(),
        }
    }
}

/// Parameters of one resource object, keyed by parameter name
pub type ObjectSpec = IndexMap<String, ParameterSpec>;

/// Shape every value tree must conform to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralScheme {
    /// Label name to display name
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    /// Resource object name to its parameters
    pub quota: IndexMap<String, ObjectSpec>,
}

impl StructuralScheme {
    /// Parse a scheme from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| QuotaError::parse_error(format!("Invalid structural scheme: {}", e)))
    }

    /// Number of resource objects
    pub fn object_count(&self) -> usize {
        self.quota.len()
    }

    /// Parameters declared for a resource object
    pub fn object(&self, name: &str) -> Option<&ObjectSpec> {
        self.quota.get(name)
    }

    /// Declared parameter count of a resource object
    pub fn parameter_count(&self, object: &str) -> Option<usize> {
        self.quota.get(object).map(|params| params.len())
    }

    pub fn parameter(&self, object: &str, parameter: &str) -> Option<&ParameterSpec> {
        self.quota.get(object).and_then(|params| params.get(parameter))
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Structural problems that make the scheme unusable
    ///
    /// An empty result means the scheme is well formed.
    pub fn check(&self) -> Result<Vec<Violation>> {
        let name_re = Regex::new(OBJECT_NAME_PATTERN)
            .map_err(|e| QuotaError::InternalError(format!("Invalid object name pattern: {}", e)))?;
        let mut issues = Vec::new();

        if self.quota.is_empty() {
            issues.push(Violation::new("Scheme declares no resource objects", "$.quota"));
        }

        for (object, params) in &self.quota {
            let path = format!("$.quota.{}", object);
            if !name_re.is_match(object) {
                issues.push(Violation::new(
                    format!("Resource object name '{}' is not a valid DNS-1123 subdomain", object),
                    &path,
                ));
            }
            if params.is_empty() {
                issues.push(Violation::new(
                    format!("Resource object '{}' declares no parameters", object),
                    &path,
                ));
            }

            for (parameter, spec) in params {
                let param_path = format!("{}.{}.units", path, parameter);
                match &spec.units {
                    Units::None => {}
                    Units::Fixed(unit) => {
                        if !VALID_UNITS.contains(&unit.as_str()) {
                            issues.push(unknown_unit(unit, &param_path));
                        }
                    }
                    Units::Selectable(units) => {
                        if units.len() < MIN_SELECTABLE_UNITS {
                            issues.push(Violation::new(
                                format!(
                                    "Selectable units list needs at least {} entries, found {}",
                                    MIN_SELECTABLE_UNITS,
                                    units.len()
                                ),
                                &param_path,
                            ));
                        }
                        let unique: BTreeSet<&String> = units.iter().collect();
                        if unique.len() != units.len() {
                            issues.push(Violation::new(
                                "Selectable units list contains duplicates",
                                &param_path,
                            ));
                        }
                        for unit in units.iter().filter(|u| !VALID_UNITS.contains(&u.as_str())) {
                            issues.push(unknown_unit(unit, &param_path));
                        }
                    }
                }
            }
        }

        Ok(issues)
    }
}

fn unknown_unit(unit: &str, path: &str) -> Violation {
    Violation::new(
        format!("'{}' is not a Kubernetes quantity suffix", unit),
        path,
    )
}

/// JSON-Schema-shaped validation document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationScheme(Value);

impl ValidationScheme {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    /// Parse a validation scheme from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| QuotaError::parse_error(format!("Invalid validation scheme: {}", e)))?;
        Ok(Self(document))
    }

    /// The raw document
    pub fn document(&self) -> &Value {
        &self.0
    }

    /// Fragment addressing a single parameter's `{value, units}` pair
    pub fn parameter_fragment(&self, object: &str, parameter: &str) -> Option<&Value> {
        self.0
            .pointer("/properties/quota/properties")
            .and_then(|objects| objects.get(object))
            .and_then(|object| object.get("properties"))
            .and_then(|params| params.get(parameter))
    }

    /// Fragment addressing a single label's string value
    pub fn label_fragment(&self, label: &str) -> Option<&Value> {
        self.0
            .pointer("/properties/labels/properties")
            .and_then(|labels| labels.get(label))
    }

    /// Generate the validation document the backend serves for a scheme
    ///
    /// Every object, parameter and label is required and no other keys are
    /// accepted at any level.
    pub fn derive(scheme: &StructuralScheme) -> Self {
        let mut objects = Map::new();
        for (object, params) in &scheme.quota {
            let mut properties = Map::new();
            for (parameter, spec) in params {
                properties.insert(
                    parameter.clone(),
                    json!({
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["value", "units"],
                        "properties": {
                            "value": { "type": "string", "pattern": spec.kind.value_pattern() },
                            "units": { "type": "string", "enum": spec.units.allowed() }
                        }
                    }),
                );
            }
            objects.insert(
                object.clone(),
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": params.keys().collect::<Vec<_>>(),
                    "properties": properties
                }),
            );
        }

        let mut labels = Map::new();
        for label in scheme.labels.keys() {
            labels.insert(
                label.clone(),
                json!({
                    "type": "string",
                    "maxLength": LABEL_VALUE_MAX_LENGTH,
                    "pattern": LABEL_VALUE_PATTERN
                }),
            );
        }

        Self(json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["labels", "quota"],
            "properties": {
                "labels": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": scheme.labels.keys().collect::<Vec<_>>(),
                    "properties": labels
                },
                "quota": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": scheme.quota.keys().collect::<Vec<_>>(),
                    "properties": objects
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute_scheme() -> StructuralScheme {
        StructuralScheme::from_json(
            r#"{
                "labels": {"team": "Team"},
                "quota": {
                    "compute": {
                        "cpu": {"name": "CPU", "type": "float", "units": ["m", "k"]},
                        "memory": {"name": "Memory", "type": "int", "units": ""}
                    },
                    "storage": {
                        "requests.storage": {"name": "Storage", "type": "int", "units": "Gi"}
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_units_parse_all_shapes() {
        let scheme = compute_scheme();
        assert_eq!(
            scheme.parameter("compute", "cpu").unwrap().units,
            Units::Selectable(vec!["m".to_string(), "k".to_string()])
        );
        assert_eq!(scheme.parameter("compute", "memory").unwrap().units, Units::None);
        assert_eq!(
            scheme.parameter("storage", "requests.storage").unwrap().units,
            Units::Fixed("Gi".to_string())
        );
    }

    #[test]
    fn test_units_serialize_back_to_wire_shape() {
        let json = serde_json::to_value(Units::None).unwrap();
        assert_eq!(json, json!(""));
        let json = serde_json::to_value(Units::Selectable(vec!["m".into(), "k".into()])).unwrap();
        assert_eq!(json, json!(["m", "k"]));
    }

    #[test]
    fn test_default_unit() {
        assert_eq!(Units::None.default_unit(), "");
        assert_eq!(Units::Fixed("Gi".into()).default_unit(), "Gi");
        assert_eq!(Units::Selectable(vec!["m".into(), "k".into()]).default_unit(), "m");
        assert_eq!(Units::Selectable(vec![]).default_unit(), "");
    }

    #[test]
    fn test_labels_default_to_empty() {
        let scheme = StructuralScheme::from_json(
            r#"{"quota": {"pods": {"pods": {"name": "Pods", "type": "int", "units": ""}}}}"#,
        )
        .unwrap();
        assert!(scheme.labels.is_empty());
        assert_eq!(scheme.parameter_count("pods"), Some(1));
    }

    #[test]
    fn test_unknown_parameter_type_is_rejected() {
        let result = StructuralScheme::from_json(
            r#"{"quota": {"pods": {"pods": {"name": "Pods", "type": "string", "units": ""}}}}"#,
        );
        assert!(matches!(result, Err(QuotaError::ParseError(_))));
    }

    #[test]
    fn test_check_well_formed_scheme() {
        assert!(compute_scheme().check().unwrap().is_empty());
    }

    #[test]
    fn test_check_reports_problems() {
        let mut scheme = compute_scheme();
        scheme.quota.insert("Bad_Name".to_string(), ObjectSpec::new());
        scheme.quota.get_mut("compute").unwrap().insert(
            "gpu".to_string(),
            ParameterSpec::new("GPU", ParameterType::Int, Units::Selectable(vec!["m".into(), "m".into()])),
        );

        let issues = scheme.check().unwrap();
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().any(|i| i.message.contains("DNS-1123")));
        assert!(issues.iter().any(|i| i.message.contains("declares no parameters")));
        assert!(issues.iter().any(|i| i.path == "$.quota.compute.gpu.units"));
    }

    #[test]
    fn test_check_rejects_unknown_units() {
        let scheme = StructuralScheme::from_json(
            r#"{"quota": {"shipping": {
                "weight": {"name": "Weight", "type": "int", "units": ["kg", "Mi"]},
                "distance": {"name": "Distance", "type": "int", "units": "furlongs"}
            }}}"#,
        )
        .unwrap();

        let issues = scheme.check().unwrap();
        assert_eq!(issues.len(), 2);
        let weight = issues.iter().find(|i| i.message.contains("'kg'")).unwrap();
        assert_eq!(weight.path, "$.quota.shipping.weight.units");
        let distance = issues.iter().find(|i| i.message.contains("'furlongs'")).unwrap();
        assert_eq!(distance.path, "$.quota.shipping.distance.units");
    }

    #[test]
    fn test_check_selectable_needs_two_units() {
        let scheme = StructuralScheme::from_json(
            r#"{"quota": {"compute": {
                "cpu": {"name": "CPU", "type": "float", "units": ["m"]},
                "memory": {"name": "Memory", "type": "int", "units": []}
            }}}"#,
        )
        .unwrap();

        let issues = scheme.check().unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.message.contains("at least 2 entries")));
    }

    #[test]
    fn test_check_accepts_every_quantity_suffix() {
        let mut params = ObjectSpec::new();
        for unit in VALID_UNITS {
            let units: Units = serde_json::from_value(json!(unit)).unwrap();
            params.insert(
                format!("p{}", params.len()),
                ParameterSpec::new("P", ParameterType::Int, units),
            );
        }
        params.insert(
            "memory".to_string(),
            ParameterSpec::new(
                "Memory",
                ParameterType::Int,
                Units::Selectable(vec!["Mi".into(), "Gi".into()]),
            ),
        );
        let mut scheme = StructuralScheme::default();
        scheme.quota.insert("compute".to_string(), params);

        assert!(scheme.check().unwrap().is_empty());
    }

    #[test]
    fn test_scheme_keeps_document_order() {
        let scheme = StructuralScheme::from_json(
            r#"{
                "labels": {"team": "Team", "owner": "Owner", "cost-center": "Cost center"},
                "quota": {
                    "storage": {"requests.storage": {"name": "Storage", "type": "int", "units": "Gi"}},
                    "compute": {
                        "memory": {"name": "Memory", "type": "int", "units": "Mi"},
                        "cpu": {"name": "CPU", "type": "float", "units": ["m", "k"]}
                    }
                }
            }"#,
        )
        .unwrap();

        let labels: Vec<&str> = scheme.labels.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["team", "owner", "cost-center"]);
        let objects: Vec<&str> = scheme.quota.keys().map(String::as_str).collect();
        assert_eq!(objects, vec!["storage", "compute"]);
        let params: Vec<&str> = scheme.quota["compute"].keys().map(String::as_str).collect();
        assert_eq!(params, vec!["memory", "cpu"]);
    }

    #[test]
    fn test_check_empty_scheme() {
        let issues = StructuralScheme::default().check().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "$.quota");
    }

    #[test]
    fn test_derive_fragments() {
        let validation = ValidationScheme::derive(&compute_scheme());

        let cpu = validation.parameter_fragment("compute", "cpu").unwrap();
        assert_eq!(cpu["properties"]["units"]["enum"], json!(["m", "k"]));
        assert_eq!(cpu["properties"]["value"]["pattern"], json!(FLOAT_VALUE_PATTERN));

        let memory = validation.parameter_fragment("compute", "memory").unwrap();
        assert_eq!(memory["properties"]["units"]["enum"], json!([""]));

        let team = validation.label_fragment("team").unwrap();
        assert_eq!(team["type"], json!("string"));

        assert!(validation.parameter_fragment("compute", "gpu").is_none());
        assert!(validation.label_fragment("owner").is_none());
    }

    #[test]
    fn test_derive_requires_every_object() {
        let validation = ValidationScheme::derive(&compute_scheme());
        assert_eq!(
            validation.document()["properties"]["quota"]["required"],
            json!(["compute", "storage"])
        );
    }

    #[test]
    fn test_display_label() {
        let scheme = compute_scheme();
        assert_eq!(
            scheme.parameter("storage", "requests.storage").unwrap().display_label(),
            "Storage (Gi)"
        );
        assert_eq!(scheme.parameter("compute", "cpu").unwrap().display_label(), "CPU");
    }
}
