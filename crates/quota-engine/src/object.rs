//! Editor for one resource object

use indexmap::IndexMap;
use std::sync::Arc;

use crate::error::{QuotaError, Result};
use crate::field::{FieldChange, FieldEditor};
use crate::scheme::{ObjectSpec, ValidationScheme};
use crate::validation::Validator;
use crate::value::{ObjectValue, ParameterValue};

/// A resource object's whole local mapping after an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectChange {
    pub object: String,
    pub parameters: ObjectValue,
}

/// Owns the field editors of one resource object
///
/// Parameters with an empty value are left out of the local mapping, so the
/// engine sees a partial object until every field is filled again.
#[derive(Debug)]
pub struct ObjectEditor {
    name: String,
    fields: IndexMap<String, FieldEditor>,
    values: ObjectValue,
}

impl ObjectEditor {
    /// Build the editor from the object's declaration and its current value
    pub fn new(
        name: impl Into<String>,
        spec: &ObjectSpec,
        current: Option<&ObjectValue>,
        validation: &ValidationScheme,
        validator: Arc<dyn Validator>,
    ) -> Self {
        let name = name.into();
        let mut fields = IndexMap::new();
        let mut values = ObjectValue::new();

        for (parameter, param_spec) in spec {
            let seed = current.and_then(|values| values.get(parameter));
            let (value, units) = match seed {
                Some(seed) => (seed.value.clone(), seed.units.clone()),
                None => (String::new(), param_spec.units.default_unit().to_string()),
            };
            if let Some(seed) = seed.filter(|seed| !seed.value.is_empty()) {
                values.insert(parameter.clone(), seed.clone());
            }

            fields.insert(
                parameter.clone(),
                FieldEditor::parameter(
                    parameter.clone(),
                    param_spec.clone(),
                    value,
                    units,
                    validation.parameter_fragment(&name, parameter),
                    Arc::clone(&validator),
                ),
            );
        }

        Self {
            name,
            fields,
            values,
        }
    }

    /// Fold a field change into the local mapping and report the whole object
    pub fn edit(&mut self, change: FieldChange) -> ObjectChange {
        if change.value.is_empty() {
            self.values.remove(&change.field);
        } else {
            self.values.insert(
                change.field,
                ParameterValue::new(change.value, change.units),
            );
        }

        ObjectChange {
            object: self.name.clone(),
            parameters: self.values.clone(),
        }
    }

    /// Type into a parameter's field
    pub fn edit_value(&mut self, parameter: &str, raw: impl Into<String>) -> Result<ObjectChange> {
        let change = self.field_mut(parameter)?.edit(raw);
        Ok(self.edit(change))
    }

    /// Pick a unit for a parameter's field
    pub fn select_unit(&mut self, parameter: &str, unit: impl Into<String>) -> Result<ObjectChange> {
        let change = self.field_mut(parameter)?.select_unit(unit)?;
        Ok(self.edit(change))
    }

    /// Replace local state with a mapping applied directly by the host
    pub fn replace_values(&mut self, parameters: &ObjectValue) {
        for (name, field) in self.fields.iter_mut() {
            match parameters.get(name) {
                Some(value) => field.reset(value.value.clone(), value.units.clone()),
                None => field.reset(String::new(), field.units().to_string()),
            }
        }
        self.values = parameters
            .iter()
            .filter(|(_, value)| !value.value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
    }

    fn field_mut(&mut self, parameter: &str) -> Result<&mut FieldEditor> {
        self.fields
            .get_mut(parameter)
            .ok_or_else(|| QuotaError::unknown_parameter(&self.name, parameter))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, parameter: &str) -> Option<&FieldEditor> {
        self.fields.get(parameter)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldEditor> {
        self.fields.values()
    }

    /// Current local mapping
    pub fn values(&self) -> &ObjectValue {
        &self.values
    }

    /// Whether every parameter has a value
    pub fn is_filled(&self) -> bool {
        self.values.len() == self.fields.len()
    }

    /// Whether every field passes its own validation
    pub fn is_valid(&self) -> bool {
        self.fields.values().all(FieldEditor::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{ParameterSpec, ParameterType, StructuralScheme, Units};
    use crate::validation::SchemaValidator;

    fn scheme() -> StructuralScheme {
        let mut scheme = StructuralScheme::default();
        let mut compute = ObjectSpec::new();
        compute.insert(
            "cpu".to_string(),
            ParameterSpec::new("CPU", ParameterType::Float, Units::Selectable(vec!["m".into(), "k".into()])),
        );
        compute.insert(
            "memory".to_string(),
            ParameterSpec::new("Memory", ParameterType::Int, Units::None),
        );
        scheme.quota.insert("compute".to_string(), compute);
        scheme
    }

    fn editor(current: Option<&ObjectValue>) -> ObjectEditor {
        let scheme = scheme();
        ObjectEditor::new(
            "compute",
            scheme.object("compute").unwrap(),
            current,
            &ValidationScheme::derive(&scheme),
            Arc::new(SchemaValidator::new()),
        )
    }

    fn zero() -> ObjectValue {
        let mut values = ObjectValue::new();
        values.insert("cpu".to_string(), ParameterValue::new("0", "m"));
        values.insert("memory".to_string(), ParameterValue::new("0", ""));
        values
    }

    #[test]
    fn test_forwards_whole_mapping() {
        let current = zero();
        let mut editor = editor(Some(&current));
        let change = editor.edit_value("cpu", "500").unwrap();

        assert_eq!(change.object, "compute");
        assert_eq!(change.parameters.len(), 2);
        assert_eq!(change.parameters["cpu"], ParameterValue::new("500", "m"));
        assert_eq!(change.parameters["memory"], ParameterValue::new("0", ""));
    }

    #[test]
    fn test_empty_value_removes_parameter() {
        let current = zero();
        let mut editor = editor(Some(&current));
        let change = editor.edit_value("memory", "").unwrap();
        assert_eq!(change.parameters.len(), 1);
        assert!(!editor.is_filled());

        let change = editor.edit_value("memory", "2").unwrap();
        assert_eq!(change.parameters.len(), 2);
        assert!(editor.is_filled());
    }

    #[test]
    fn test_without_current_value_starts_empty() {
        let mut editor = editor(None);
        assert!(editor.values().is_empty());
        assert_eq!(editor.field("cpu").unwrap().units(), "m");

        let change = editor.edit_value("cpu", "1").unwrap();
        assert_eq!(change.parameters.len(), 1);
    }

    #[test]
    fn test_select_unit_keeps_value() {
        let current = zero();
        let mut editor = editor(Some(&current));
        editor.edit_value("cpu", "2").unwrap();
        let change = editor.select_unit("cpu", "k").unwrap();
        assert_eq!(change.parameters["cpu"], ParameterValue::new("2", "k"));
    }

    #[test]
    fn test_unknown_parameter() {
        let mut editor = editor(None);
        assert!(matches!(
            editor.edit_value("gpu", "1"),
            Err(QuotaError::UnknownParameter { .. })
        ));
        assert!(matches!(
            editor.select_unit("memory", "Mi"),
            Err(QuotaError::UnitsNotSelectable(_))
        ));
    }

    #[test]
    fn test_invalid_field_still_forwarded() {
        let current = zero();
        let mut editor = editor(Some(&current));
        let change = editor.edit_value("memory", "1.5").unwrap();
        assert_eq!(change.parameters["memory"].value, "1.5");
        assert!(!editor.is_valid());
    }

    #[test]
    fn test_replace_values() {
        let current = zero();
        let mut editor = editor(Some(&current));
        let mut partial = ObjectValue::new();
        partial.insert("cpu".to_string(), ParameterValue::new("3", "k"));

        editor.replace_values(&partial);
        assert_eq!(editor.values(), &partial);
        assert_eq!(editor.field("cpu").unwrap().units(), "k");
        assert_eq!(editor.field("memory").unwrap().value(), "");
    }
}
