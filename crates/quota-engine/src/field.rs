//! Editor for a single scalar field
//!
//! A field is either a parameter (numeric value plus unit) or a label (free
//! text). Every keystroke is accepted; validity is observable state, not an
//! error.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{QuotaError, Result};
use crate::scheme::{ParameterSpec, Units};
use crate::validation::{Validator, Violation};

/// What a field edits
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A resource object parameter
    Parameter(ParameterSpec),
    /// A free-text label with its display name and autocomplete values
    Label {
        display_name: String,
        options: Vec<String>,
    },
}

/// A field's new state, reported to its owner after every edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub value: String,
    pub units: String,
}

pub struct FieldEditor {
    name: String,
    kind: FieldKind,
    value: String,
    units: String,
    fragment: Value,
    validator: Arc<dyn Validator>,
    violations: Vec<Violation>,
}

impl FieldEditor {
    /// Editor for a parameter, starting from `value` and `units`
    ///
    /// A missing fragment makes every value valid.
    pub fn parameter(
        name: impl Into<String>,
        spec: ParameterSpec,
        value: impl Into<String>,
        units: impl Into<String>,
        fragment: Option<&Value>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        let mut editor = Self {
            name: name.into(),
            kind: FieldKind::Parameter(spec),
            value: value.into(),
            units: units.into(),
            fragment: fragment.cloned().unwrap_or_else(|| json!({})),
            validator,
            violations: Vec::new(),
        };
        editor.revalidate();
        editor
    }

    /// Editor for a label
    pub fn label(
        name: impl Into<String>,
        display_name: impl Into<String>,
        options: Vec<String>,
        value: impl Into<String>,
        fragment: Option<&Value>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        let mut editor = Self {
            name: name.into(),
            kind: FieldKind::Label {
                display_name: display_name.into(),
                options,
            },
            value: value.into(),
            units: String::new(),
            fragment: fragment.cloned().unwrap_or_else(|| json!({})),
            validator,
            violations: Vec::new(),
        };
        editor.revalidate();
        editor
    }

    /// Store a raw value and revalidate
    pub fn edit(&mut self, raw: impl Into<String>) -> FieldChange {
        self.value = raw.into();
        self.revalidate();
        self.change()
    }

    /// Store a chosen unit and revalidate the new `(value, unit)` pair
    pub fn select_unit(&mut self, unit: impl Into<String>) -> Result<FieldChange> {
        if !self.units_selectable() {
            return Err(QuotaError::UnitsNotSelectable(self.name.clone()));
        }
        self.units = unit.into();
        self.revalidate();
        Ok(self.change())
    }

    /// Overwrite the stored state without reporting upward
    pub fn reset(&mut self, value: impl Into<String>, units: impl Into<String>) {
        self.value = value.into();
        if matches!(self.kind, FieldKind::Parameter(_)) {
            self.units = units.into();
        }
        self.revalidate();
    }

    fn revalidate(&mut self) {
        let candidate = match &self.kind {
            FieldKind::Parameter(_) => json!({ "value": self.value, "units": self.units }),
            FieldKind::Label { .. } => Value::String(self.value.clone()),
        };
        self.violations = self.validator.validate(&candidate, &self.fragment);
        if !self.violations.is_empty() {
            tracing::trace!(
                field = %self.name,
                violations = self.violations.len(),
                "Field is invalid"
            );
        }
    }

    fn change(&self) -> FieldChange {
        FieldChange {
            field: self.name.clone(),
            value: self.value.clone(),
            units: self.units.clone(),
        }
    }

    fn units_selectable(&self) -> bool {
        match &self.kind {
            FieldKind::Parameter(spec) => spec.units.is_selectable(),
            FieldKind::Label { .. } => false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Text shown next to the input
    pub fn display_label(&self) -> String {
        match &self.kind {
            FieldKind::Parameter(spec) => spec.display_label(),
            FieldKind::Label { display_name, .. } => display_name.clone(),
        }
    }

    /// Units the user can pick from, empty unless selectable
    pub fn unit_choices(&self) -> &[String] {
        match &self.kind {
            FieldKind::Parameter(ParameterSpec {
                units: Units::Selectable(units),
                ..
            }) => units,
            _ => &[],
        }
    }

    /// Label options starting with the current value
    ///
    /// Suggestions are hints only and never constrain the value.
    pub fn suggestions(&self) -> Vec<&str> {
        match &self.kind {
            FieldKind::Label { options, .. } => options
                .iter()
                .filter(|option| option.starts_with(self.value.as_str()) && **option != self.value)
                .map(String::as_str)
                .collect(),
            FieldKind::Parameter(_) => Vec::new(),
        }
    }
}

impl std::fmt::Debug for FieldEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldEditor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("units", &self.units)
            .field("violations", &self.violations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::ParameterType;
    use crate::validation::SchemaValidator;

    fn cpu_fragment() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["value", "units"],
            "properties": {
                "value": {"type": "string", "pattern": "^[0-9]+$"},
                "units": {"type": "string", "enum": ["m", "k"]}
            }
        })
    }

    fn cpu_editor() -> FieldEditor {
        FieldEditor::parameter(
            "cpu",
            ParameterSpec::new("CPU", ParameterType::Int, Units::Selectable(vec!["m".into(), "k".into()])),
            "0",
            "m",
            Some(&cpu_fragment()),
            Arc::new(SchemaValidator::new()),
        )
    }

    #[test]
    fn test_edit_reports_change() {
        let mut editor = cpu_editor();
        let change = editor.edit("500");
        assert_eq!(
            change,
            FieldChange {
                field: "cpu".to_string(),
                value: "500".to_string(),
                units: "m".to_string()
            }
        );
        assert!(editor.is_valid());
    }

    #[test]
    fn test_invalid_value_is_accepted_and_flagged() {
        let mut editor = cpu_editor();
        let change = editor.edit("5x");
        assert_eq!(change.value, "5x");
        assert_eq!(editor.value(), "5x");
        assert!(!editor.is_valid());
        assert_eq!(editor.violations()[0].path, "$.value");

        editor.edit("5");
        assert!(editor.is_valid());
    }

    #[test]
    fn test_select_unit_revalidates() {
        let mut editor = cpu_editor();
        let change = editor.select_unit("Gi").unwrap();
        assert_eq!(change.units, "Gi");
        assert!(!editor.is_valid());

        editor.select_unit("k").unwrap();
        assert!(editor.is_valid());
    }

    #[test]
    fn test_select_unit_on_fixed_units() {
        let mut editor = FieldEditor::parameter(
            "storage",
            ParameterSpec::new("Storage", ParameterType::Int, Units::Fixed("Gi".into())),
            "0",
            "Gi",
            None,
            Arc::new(SchemaValidator::new()),
        );
        assert!(matches!(
            editor.select_unit("Mi"),
            Err(QuotaError::UnitsNotSelectable(_))
        ));
        assert_eq!(editor.units(), "Gi");
        assert!(editor.unit_choices().is_empty());
    }

    #[test]
    fn test_missing_fragment_is_valid() {
        let mut editor = FieldEditor::parameter(
            "pods",
            ParameterSpec::new("Pods", ParameterType::Int, Units::None),
            "",
            "",
            None,
            Arc::new(SchemaValidator::new()),
        );
        editor.edit("anything");
        assert!(editor.is_valid());
    }

    #[test]
    fn test_label_suggestions() {
        let mut editor = FieldEditor::label(
            "team",
            "Team",
            vec!["platform".into(), "payments".into(), "data".into()],
            "",
            Some(&json!({"type": "string", "maxLength": 63})),
            Arc::new(SchemaValidator::new()),
        );
        assert_eq!(editor.suggestions().len(), 3);

        editor.edit("p");
        assert_eq!(editor.suggestions(), vec!["platform", "payments"]);

        editor.edit("platform");
        assert!(editor.suggestions().is_empty());

        editor.edit("anything-else");
        assert!(editor.is_valid());
        assert!(matches!(
            editor.select_unit("m"),
            Err(QuotaError::UnitsNotSelectable(_))
        ));
    }

    #[test]
    fn test_label_validation() {
        let mut editor = FieldEditor::label(
            "team",
            "Team",
            Vec::new(),
            "",
            Some(&json!({"type": "string", "maxLength": 3})),
            Arc::new(SchemaValidator::new()),
        );
        editor.edit("toolong");
        assert!(!editor.is_valid());
        assert_eq!(editor.display_label(), "Team");
    }
}
