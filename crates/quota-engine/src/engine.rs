//! The quota engine state machine
//!
//! `Loading` fetches the structural scheme, the validation scheme and the
//! label options one after another, seeds the value tree and moves to
//! `Ready`. Any failed lookup moves to the terminal `Failed` state. In
//! `Ready` every edit revalidates the whole tree and notifies the host with
//! the tree and its completeness, strictly in call order.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{QuotaError, Result};
use crate::field::FieldEditor;
use crate::object::ObjectEditor;
use crate::scheme::{StructuralScheme, ValidationScheme};
use crate::source::SchemeSource;
use crate::telemetry::EngineMetrics;
use crate::validation::{SchemaValidator, Validator, Violation};
use crate::value::{ObjectValue, ValueTree};

/// Lifecycle of an engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Loading,
    Ready,
    /// Terminal; carries the message surfaced to the host
    Failed(String),
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Loading => write!(f, "loading"),
            EngineState::Ready => write!(f, "ready"),
            EngineState::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Callbacks the engine reports to
pub trait EngineHost: Send {
    /// Number of resource objects, known once the structural scheme arrives
    fn on_scheme_width(&mut self, object_count: usize);

    /// A loading lookup failed; the engine is now `Failed`
    fn on_error(&mut self, message: &str);

    /// The tree changed (or was first initialized)
    fn on_change(&mut self, tree: &ValueTree, is_complete: bool);
}

type WidthCallback = Box<dyn FnMut(usize) + Send>;
type ErrorCallback = Box<dyn FnMut(&str) + Send>;
type ChangeCallback = Box<dyn FnMut(&ValueTree, bool) + Send>;

/// Host built from closures; unset callbacks are no-ops
#[derive(Default)]
pub struct CallbackHost {
    on_scheme_width: Option<WidthCallback>,
    on_error: Option<ErrorCallback>,
    on_change: Option<ChangeCallback>,
}

impl CallbackHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheme_width(mut self, f: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_scheme_width = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn with_change(mut self, f: impl FnMut(&ValueTree, bool) + Send + 'static) -> Self {
        self.on_change = Some(Box::new(f));
        self
    }
}

impl EngineHost for CallbackHost {
    fn on_scheme_width(&mut self, object_count: usize) {
        if let Some(f) = self.on_scheme_width.as_mut() {
            f(object_count);
        }
    }

    fn on_error(&mut self, message: &str) {
        if let Some(f) = self.on_error.as_mut() {
            f(message);
        }
    }

    fn on_change(&mut self, tree: &ValueTree, is_complete: bool) {
        if let Some(f) = self.on_change.as_mut() {
            f(tree, is_complete);
        }
    }
}

/// Top-level field an edit addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    Labels,
    Quota,
}

impl EditField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditField::Labels => "labels",
            EditField::Quota => "quota",
        }
    }
}

impl std::fmt::Display for EditField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EditField {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "labels" => Ok(EditField::Labels),
            "quota" => Ok(EditField::Quota),
            other => Err(QuotaError::invalid_input(format!(
                "Unknown field '{}', expected 'labels' or 'quota'",
                other
            ))),
        }
    }
}

/// An edit applied to the value tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Replace a resource object; dropped unless every parameter is present
    Quota {
        object: String,
        parameters: ObjectValue,
    },
    /// Set a label; always stored
    Label { name: String, value: String },
}

impl Edit {
    pub fn field(&self) -> EditField {
        match self {
            Edit::Quota { .. } => EditField::Quota,
            Edit::Label { .. } => EditField::Labels,
        }
    }

    /// Build an edit from a field, a name and a JSON sub-value
    pub fn from_parts(field: EditField, name: impl Into<String>, value: Value) -> Result<Self> {
        let name = name.into();
        match field {
            EditField::Quota => {
                let parameters: ObjectValue = serde_json::from_value(value).map_err(|e| {
                    QuotaError::invalid_input(format!("Invalid value for '{}': {}", name, e))
                })?;
                Ok(Edit::Quota {
                    object: name,
                    parameters,
                })
            }
            EditField::Labels => match value {
                Value::String(value) => Ok(Edit::Label { name, value }),
                other => Err(QuotaError::invalid_input(format!(
                    "Label '{}' must be a string, got {}",
                    name, other
                ))),
            },
        }
    }
}

/// Construction parameters
#[derive(Clone)]
pub struct EngineOptions {
    /// Seed copied verbatim instead of the zero tree
    pub current_value: Option<ValueTree>,
    pub validator: Arc<dyn Validator>,
    pub metrics: Option<Arc<EngineMetrics>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            current_value: None,
            validator: Arc::new(SchemaValidator::new()),
            metrics: None,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current_value(mut self, tree: Option<ValueTree>) -> Self {
        self.current_value = tree;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum LoadStage {
    StructuralScheme,
    ValidationScheme,
    LabelOptions,
    Initialize,
}

impl LoadStage {
    fn as_str(&self) -> &'static str {
        match self {
            LoadStage::StructuralScheme => "structural_scheme",
            LoadStage::ValidationScheme => "validation_scheme",
            LoadStage::LabelOptions => "label_options",
            LoadStage::Initialize => "initialize",
        }
    }
}

/// Schema-driven quota editor
pub struct QuotaEngine<H: EngineHost> {
    state: EngineState,
    host: H,
    validator: Arc<dyn Validator>,
    metrics: Option<Arc<EngineMetrics>>,
    seed: Option<ValueTree>,
    scheme: StructuralScheme,
    validation: ValidationScheme,
    label_options: BTreeMap<String, Vec<String>>,
    tree: ValueTree,
    objects: IndexMap<String, ObjectEditor>,
    labels: IndexMap<String, FieldEditor>,
    violations: Vec<Violation>,
    complete: bool,
}

impl<H: EngineHost> QuotaEngine<H> {
    /// Create an engine in the `Loading` state
    pub fn new(host: H, options: EngineOptions) -> Self {
        Self {
            state: EngineState::Loading,
            host,
            validator: options.validator,
            metrics: options.metrics,
            seed: options.current_value,
            scheme: StructuralScheme::default(),
            validation: ValidationScheme::new(Value::Object(Default::default())),
            label_options: BTreeMap::new(),
            tree: ValueTree::default(),
            objects: IndexMap::new(),
            labels: IndexMap::new(),
            violations: Vec::new(),
            complete: false,
        }
    }

    /// Run the loading sequence against a source
    ///
    /// On failure the engine becomes `Failed`, the host receives the message
    /// through `on_error` and the same message is returned as a fetch error.
    pub async fn load<S: SchemeSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        if self.state != EngineState::Loading {
            return Err(QuotaError::InvalidState(format!(
                "load requires the loading state, engine is {}",
                self.state
            )));
        }

        match self.run_loading(source).await {
            Ok(()) => Ok(()),
            Err((stage, err)) => {
                let message = err.to_string();
                tracing::error!(stage = stage.as_str(), error = %message, "Quota engine failed to load");
                if let Some(metrics) = &self.metrics {
                    metrics.record_load_failure(stage.as_str());
                }
                self.state = EngineState::Failed(message.clone());
                self.host.on_error(&message);
                Err(QuotaError::Fetch(message))
            }
        }
    }

    async fn run_loading<S: SchemeSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> std::result::Result<(), (LoadStage, QuotaError)> {
        tracing::debug!("Fetching structural scheme");
        let scheme = source
            .fetch_structural_scheme()
            .await
            .map_err(|e| (LoadStage::StructuralScheme, e))?;
        self.host.on_scheme_width(scheme.object_count());

        let tree = match self.seed.take() {
            Some(seed) => {
                let drift = seed.drift(&scheme);
                if !drift.is_empty() {
                    tracing::warn!(
                        stale = ?drift.stale,
                        missing = ?drift.missing,
                        "Current value does not match the quota scheme, using it as is"
                    );
                }
                seed
            }
            None => ValueTree::zeroed(&scheme),
        };

        tracing::debug!("Fetching validation scheme");
        let validation = source
            .fetch_validation_scheme()
            .await
            .map_err(|e| (LoadStage::ValidationScheme, e))?;

        let mut label_options = BTreeMap::new();
        for label in scheme.labels.keys() {
            tracing::debug!(label = %label, "Fetching label options");
            let options = source
                .fetch_label_options(label)
                .await
                .map_err(|e| (LoadStage::LabelOptions, e))?;
            label_options.insert(label.clone(), options);
        }

        self.objects = scheme
            .quota
            .iter()
            .map(|(object, spec)| {
                let editor = ObjectEditor::new(
                    object.clone(),
                    spec,
                    tree.quota.get(object),
                    &validation,
                    Arc::clone(&self.validator),
                );
                (object.clone(), editor)
            })
            .collect();

        self.labels = scheme
            .labels
            .iter()
            .map(|(label, display_name)| {
                let editor = FieldEditor::label(
                    label.clone(),
                    display_name.clone(),
                    label_options.get(label).cloned().unwrap_or_default(),
                    tree.labels.get(label).cloned().unwrap_or_default(),
                    validation.label_fragment(label),
                    Arc::clone(&self.validator),
                );
                (label.clone(), editor)
            })
            .collect();

        self.scheme = scheme;
        self.validation = validation;
        self.label_options = label_options;
        self.tree = tree;
        self.revalidate().map_err(|e| (LoadStage::Initialize, e))?;
        self.state = EngineState::Ready;

        tracing::info!(
            objects = self.scheme.object_count(),
            labels = self.scheme.labels.len(),
            complete = self.complete,
            "Quota engine ready"
        );
        self.host.on_change(&self.tree, self.complete);
        Ok(())
    }

    /// Apply an edit addressed by field and name
    ///
    /// Quota objects are stored only when every declared parameter is
    /// present, otherwise removed. Labels are always stored. Returns the new
    /// completeness.
    pub fn apply_edit(&mut self, edit: Edit) -> Result<bool> {
        self.ensure_ready()?;

        match &edit {
            Edit::Quota { object, parameters } => {
                let declared = self
                    .scheme
                    .object(object)
                    .ok_or_else(|| QuotaError::UnknownObject(object.clone()))?;
                if let Some(unknown) = parameters.keys().find(|name| !declared.contains_key(*name)) {
                    return Err(QuotaError::unknown_parameter(object, unknown));
                }
                if let Some(editor) = self.objects.get_mut(object) {
                    editor.replace_values(parameters);
                }
            }
            Edit::Label { name, value } => {
                let editor = self
                    .labels
                    .get_mut(name)
                    .ok_or_else(|| QuotaError::UnknownLabel(name.clone()))?;
                editor.reset(value.clone(), "");
            }
        }

        self.commit(edit)
    }

    /// Type into a parameter through its object and field editors
    pub fn edit_parameter(
        &mut self,
        object: &str,
        parameter: &str,
        raw: impl Into<String>,
    ) -> Result<bool> {
        self.ensure_ready()?;
        let change = self.object_mut(object)?.edit_value(parameter, raw)?;
        self.commit(Edit::Quota {
            object: change.object,
            parameters: change.parameters,
        })
    }

    /// Pick a unit through its object and field editors
    pub fn select_unit(
        &mut self,
        object: &str,
        parameter: &str,
        unit: impl Into<String>,
    ) -> Result<bool> {
        self.ensure_ready()?;
        let change = self.object_mut(object)?.select_unit(parameter, unit)?;
        self.commit(Edit::Quota {
            object: change.object,
            parameters: change.parameters,
        })
    }

    /// Type into a label through its field editor
    pub fn edit_label(&mut self, name: &str, raw: impl Into<String>) -> Result<bool> {
        self.ensure_ready()?;
        let change = self
            .labels
            .get_mut(name)
            .ok_or_else(|| QuotaError::UnknownLabel(name.to_string()))?
            .edit(raw);
        self.commit(Edit::Label {
            name: change.field,
            value: change.value,
        })
    }

    fn commit(&mut self, edit: Edit) -> Result<bool> {
        let field = edit.field();
        let stored = match edit {
            Edit::Quota { object, parameters } => {
                let declared = self.scheme.parameter_count(&object).unwrap_or_default();
                if parameters.len() == declared {
                    tracing::debug!(object = %object, "Storing resource object");
                    self.tree.quota.insert(object, parameters);
                    true
                } else {
                    tracing::debug!(
                        object = %object,
                        filled = parameters.len(),
                        declared = declared,
                        "Dropping partially filled resource object"
                    );
                    self.tree.quota.remove(&object);
                    false
                }
            }
            Edit::Label { name, value } => {
                tracing::debug!(label = %name, "Storing label");
                self.tree.labels.insert(name, value);
                true
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_edit(field.as_str(), stored);
        }

        self.revalidate()?;
        self.host.on_change(&self.tree, self.complete);
        Ok(self.complete)
    }

    fn revalidate(&mut self) -> Result<()> {
        let start = Instant::now();
        let document = self.tree.to_json()?;
        self.violations = self.validator.validate(&document, self.validation.document());
        self.complete = self.violations.is_empty();

        if let Some(metrics) = &self.metrics {
            metrics.record_validation(self.complete, start.elapsed().as_secs_f64());
        }
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        match &self.state {
            EngineState::Ready => Ok(()),
            EngineState::Loading => Err(QuotaError::NotReady("engine is still loading".to_string())),
            EngineState::Failed(message) => Err(QuotaError::NotReady(format!(
                "engine failed to load: {}",
                message
            ))),
        }
    }

    fn object_mut(&mut self, object: &str) -> Result<&mut ObjectEditor> {
        self.objects
            .get_mut(object)
            .ok_or_else(|| QuotaError::UnknownObject(object.to_string()))
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    /// Failure message once `Failed`
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            EngineState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn tree(&self) -> &ValueTree {
        &self.tree
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Violations of the last full-tree validation
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// The tree, only when it may be submitted
    pub fn submittable_tree(&self) -> Option<&ValueTree> {
        (self.is_ready() && self.complete).then_some(&self.tree)
    }

    pub fn scheme(&self) -> &StructuralScheme {
        &self.scheme
    }

    pub fn validation_scheme(&self) -> &ValidationScheme {
        &self.validation
    }

    pub fn label_options(&self, label: &str) -> &[String] {
        self.label_options
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn object(&self, name: &str) -> Option<&ObjectEditor> {
        self.objects.get(name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectEditor> {
        self.objects.values()
    }

    pub fn label(&self, name: &str) -> Option<&FieldEditor> {
        self.labels.get(name)
    }

    pub fn labels(&self) -> impl Iterator<Item = &FieldEditor> {
        self.labels.values()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}
