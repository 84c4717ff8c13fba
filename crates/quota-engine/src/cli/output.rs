//! Output formatting for the quota editor CLI
//!
//! JSON and YAML for machines, a colored table for people.

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use crate::engine::{EngineHost, QuotaEngine};
use crate::error::{QuotaError, Result};
use crate::field::{FieldEditor, FieldKind};
use crate::scheme::StructuralScheme;
use crate::validation::Violation;
use crate::value::{ParameterValue, ValueTree};

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// A violation as printed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationOutput {
    pub path: String,
    pub message: String,
}

impl From<&Violation> for ViolationOutput {
    fn from(violation: &Violation) -> Self {
        Self {
            path: violation.path.clone(),
            message: violation.message.clone(),
        }
    }
}

/// One editable field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOutput {
    pub name: String,
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub units: String,
    /// Value with its unit suffix, for filled parameters
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quantity: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub messages: Vec<String>,
}

impl From<&FieldEditor> for FieldOutput {
    fn from(field: &FieldEditor) -> Self {
        Self {
            name: field.name().to_string(),
            label: field.display_label(),
            value: field.value().to_string(),
            units: field.units().to_string(),
            quantity: match field.kind() {
                FieldKind::Parameter(_) if !field.value().is_empty() => {
                    Some(ParameterValue::new(field.value(), field.units()).quantity())
                }
                _ => None,
            },
            valid: field.is_valid(),
            messages: field.violations().iter().map(|v| v.message.clone()).collect(),
        }
    }
}

/// One resource object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectOutput {
    pub name: String,
    /// Whether the object is present in the tree
    pub stored: bool,
    pub fields: Vec<FieldOutput>,
}

/// Engine state as printed by `init` and `edit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOutput {
    pub state: String,
    pub complete: bool,
    #[serde(default)]
    pub submitted: bool,
    pub summary: String,
    pub labels: Vec<FieldOutput>,
    pub objects: Vec<ObjectOutput>,
    pub violations: Vec<ViolationOutput>,
    pub tree: ValueTree,
}

impl EngineOutput {
    pub fn from_engine<H: EngineHost>(engine: &QuotaEngine<H>) -> Self {
        let tree = engine.tree().clone();
        let violations: Vec<ViolationOutput> =
            engine.violations().iter().map(ViolationOutput::from).collect();

        let objects = engine
            .objects()
            .map(|object| ObjectOutput {
                name: object.name().to_string(),
                stored: tree.quota.contains_key(object.name()),
                fields: object.fields().map(FieldOutput::from).collect(),
            })
            .collect();

        let summary = if engine.is_complete() {
            "Quota is complete".to_string()
        } else {
            format!("Quota is incomplete with {} violation(s)", violations.len())
        };

        Self {
            state: engine.state().to_string(),
            complete: engine.is_complete(),
            submitted: false,
            summary,
            labels: engine.labels().map(FieldOutput::from).collect(),
            objects,
            violations,
            tree,
        }
    }

    pub fn with_submitted(mut self, submitted: bool) -> Self {
        self.submitted = submitted;
        self
    }

    /// Render output in the specified format
    pub fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => render_json(self),
            OutputFormat::Yaml => render_yaml(self),
            OutputFormat::Table => self.render_table(),
        }
    }

    fn render_table(&self) -> Result<()> {
        let mut stdout = io::stdout();

        writeln!(stdout).ok();
        writeln!(stdout, "{}", "Quota".cyan().bold()).ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();
        writeln!(stdout).ok();

        let status = if self.complete {
            "+".green()
        } else {
            "x".red()
        };
        writeln!(stdout, "{} {}", status, self.summary).ok();
        if self.submitted {
            writeln!(stdout, "{} Submitted", "+".green()).ok();
        }
        writeln!(stdout).ok();

        if !self.labels.is_empty() {
            writeln!(stdout, "{}", "Labels:".cyan().bold()).ok();
            for label in &self.labels {
                write_field(&mut stdout, label, "  ");
            }
            writeln!(stdout).ok();
        }

        writeln!(stdout, "{}", "Resources:".cyan().bold()).ok();
        writeln!(stdout, "{}", "-".repeat(60)).ok();
        for object in &self.objects {
            let marker = if object.stored {
                "stored".green()
            } else {
                "dropped".yellow()
            };
            writeln!(stdout, "  {} [{}]", object.name.bold(), marker).ok();
            for field in &object.fields {
                write_field(&mut stdout, field, "    ");
            }
        }
        writeln!(stdout).ok();

        if !self.violations.is_empty() {
            writeln!(stdout, "{}", "Violations:".cyan().bold()).ok();
            for violation in &self.violations {
                writeln!(
                    stdout,
                    "  {} {}: {}",
                    "!".yellow(),
                    violation.path.dimmed(),
                    violation.message
                )
                .ok();
            }
            writeln!(stdout).ok();
        }

        Ok(())
    }
}

fn write_field(stdout: &mut io::Stdout, field: &FieldOutput, indent: &str) {
    let icon = if field.valid { "+".green() } else { "x".red() };
    let value = field.quantity.as_deref().unwrap_or(&field.value);
    writeln!(stdout, "{}{} {:<24} {}", indent, icon, field.label, value).ok();
    for message in &field.messages {
        writeln!(stdout, "{}    {}", indent, message.red()).ok();
    }
}

/// Result of `check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutput {
    pub scheme: String,
    pub valid: bool,
    pub objects: usize,
    pub labels: usize,
    /// Parameter count per resource object
    pub parameters: BTreeMap<String, usize>,
    pub problems: Vec<ViolationOutput>,
    pub summary: String,
}

impl CheckOutput {
    pub fn new(path: &Path, scheme: &StructuralScheme, problems: &[Violation]) -> Self {
        let valid = problems.is_empty();
        let summary = if valid {
            "Quota scheme is valid".to_string()
        } else {
            format!("Quota scheme has {} problem(s)", problems.len())
        };
        Self {
            scheme: path.display().to_string(),
            valid,
            objects: scheme.object_count(),
            labels: scheme.labels.len(),
            parameters: scheme
                .quota
                .iter()
                .map(|(name, spec)| (name.clone(), spec.len()))
                .collect(),
            problems: problems.iter().map(ViolationOutput::from).collect(),
            summary,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => render_json(self),
            OutputFormat::Yaml => render_yaml(self),
            OutputFormat::Table => self.render_table(),
        }
    }

    fn render_table(&self) -> Result<()> {
        let mut stdout = io::stdout();

        writeln!(stdout).ok();
        writeln!(stdout, "{}", "Quota Scheme Check".cyan().bold()).ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();
        writeln!(stdout).ok();
        writeln!(stdout, "  Scheme:  {}", self.scheme).ok();
        writeln!(stdout, "  Objects: {}", self.objects).ok();
        writeln!(stdout, "  Labels:  {}", self.labels).ok();
        writeln!(stdout).ok();

        let status = if self.valid { "+".green() } else { "x".red() };
        writeln!(stdout, "{} {}", status, self.summary).ok();

        if !self.problems.is_empty() {
            writeln!(stdout, "{}", "-".repeat(60)).ok();
            for problem in &self.problems {
                writeln!(stdout, "  {} {}: {}", "x".red(), problem.path, problem.message).ok();
            }
        }
        writeln!(stdout).ok();
        Ok(())
    }
}

fn render_json<T: Serialize>(output: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| QuotaError::SerializationError(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn render_yaml<T: Serialize>(output: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(output)
        .map_err(|e| QuotaError::SerializationError(e.to_string()))?;
    println!("{}", yaml);
    Ok(())
}
