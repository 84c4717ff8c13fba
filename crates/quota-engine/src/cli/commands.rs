//! CLI command definitions for the quota engine

use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use super::output::{CheckOutput, EngineOutput, OutputFormat};
use super::ExitCode;
use crate::client::HttpSchemeSource;
use crate::config::{ClientConfig, ENV_TIMEOUT_MS, ENV_TOKEN, ENV_URL};
use crate::engine::{CallbackHost, EngineOptions, QuotaEngine};
use crate::error::{QuotaError, Result};
use crate::scheme::{StructuralScheme, ValidationScheme};
use crate::source::{FileSchemeSource, SchemeSource};
use crate::telemetry::EngineMetricsRegistry;
use crate::value::ValueTree;

/// Quota editor CLI
///
/// Load the quota scheme, seed or fetch a quota, apply edits and check
/// whether the result may be submitted.
#[derive(Parser, Debug)]
#[command(name = "quota-edit")]
#[command(about = "Edit and validate resource quotas against a quota scheme", long_about = None)]
#[command(version)]
pub struct QuotaCli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: QuotaCommands,
}

impl QuotaCli {
    /// Log level selected by `-v` and `-q`
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// Where schemes and the current quota come from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Directory holding scheme.json, validation.json and labels.json
    ///
    /// Takes precedence over --url.
    #[arg(long)]
    pub scheme_dir: Option<PathBuf>,

    /// Base URL of the quota manager backend
    #[arg(long, env = ENV_URL)]
    pub url: Option<String>,

    /// Access token sent with every backend request
    #[arg(long, env = ENV_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Backend request timeout in milliseconds
    #[arg(long, env = ENV_TIMEOUT_MS)]
    pub timeout_ms: Option<u64>,

    /// Project whose current quota seeds the editor (backend only)
    #[arg(short, long)]
    pub project: Option<String>,

    /// File (JSON or YAML) with the current quota, instead of the zero quota
    #[arg(long)]
    pub current: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum QuotaCommands {
    /// Load the scheme and print the initial quota
    Init {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,
    },

    /// Apply edits and print the resulting quota
    ///
    /// Units are applied first, then values, then labels.
    Edit {
        #[command(flatten)]
        source: SourceArgs,

        /// Select a unit, e.g. compute.cpu=m
        #[arg(long = "unit", value_name = "OBJECT.PARAMETER=UNIT")]
        units: Vec<String>,

        /// Set a value, e.g. compute.cpu=500; an empty value clears it
        #[arg(long = "set", value_name = "OBJECT.PARAMETER=VALUE")]
        sets: Vec<String>,

        /// Set a label, e.g. team=platform
        #[arg(long = "label", value_name = "NAME=VALUE")]
        labels: Vec<String>,

        /// Submit the quota to the backend when it is complete
        #[arg(long)]
        submit: bool,

        /// Print engine metrics after the result
        #[arg(long)]
        metrics: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,
    },

    /// Print the validation scheme derived from a structural scheme
    Derive {
        /// Path to the structural scheme
        #[arg(short, long)]
        scheme: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: Option<OutputFormat>,
    },

    /// Report structural problems of a scheme
    Check {
        /// Path to the structural scheme
        #[arg(short, long)]
        scheme: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,
    },
}

/// Edits requested on the command line
#[derive(Debug, Clone, Default)]
pub struct EditArgs {
    pub units: Vec<String>,
    pub sets: Vec<String>,
    pub labels: Vec<String>,
    pub submit: bool,
    pub metrics: bool,
}

/// A parsed `OBJECT.PARAMETER=VALUE` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterAssignment {
    pub object: String,
    pub parameter: String,
    pub value: String,
}

impl std::str::FromStr for ParameterAssignment {
    type Err = QuotaError;

    fn from_str(s: &str) -> Result<Self> {
        let (path, value) = s.split_once('=').ok_or_else(|| {
            QuotaError::invalid_input(format!("Expected OBJECT.PARAMETER=VALUE, got '{}'", s))
        })?;
        let (object, parameter) = path
            .split_once('.')
            .filter(|(object, parameter)| !object.is_empty() && !parameter.is_empty())
            .ok_or_else(|| {
                QuotaError::invalid_input(format!("Expected OBJECT.PARAMETER, got '{}'", path))
            })?;
        Ok(Self {
            object: object.to_string(),
            parameter: parameter.to_string(),
            value: value.to_string(),
        })
    }
}

/// Parse a `NAME=VALUE` label argument
pub fn parse_label(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(QuotaError::invalid_input(format!(
            "Expected NAME=VALUE, got '{}'",
            s
        ))),
    }
}

enum LoadedSource {
    Files(FileSchemeSource),
    Remote(HttpSchemeSource),
}

impl LoadedSource {
    fn open(args: &SourceArgs) -> Result<Self> {
        if let Some(dir) = &args.scheme_dir {
            if args.project.is_some() {
                tracing::warn!("--project is ignored with --scheme-dir");
            }
            return Ok(LoadedSource::Files(FileSchemeSource::new(dir)));
        }

        let env = ClientConfig::from_env();
        let mut builder = ClientConfig::builder().base_url(args.url.clone().unwrap_or(env.base_url));
        if let Some(token) = args.token.clone().or(env.token) {
            builder = builder.token(token);
        }
        let config = builder
            .timeout_ms(args.timeout_ms.unwrap_or(env.timeout_ms))
            .build();
        Ok(LoadedSource::Remote(HttpSchemeSource::new(config)?))
    }

    fn as_source(&self) -> &dyn SchemeSource {
        match self {
            LoadedSource::Files(source) => source,
            LoadedSource::Remote(source) => source,
        }
    }

    fn remote(&self) -> Option<&HttpSchemeSource> {
        match self {
            LoadedSource::Remote(source) => Some(source),
            LoadedSource::Files(_) => None,
        }
    }
}

async fn current_value(args: &SourceArgs, source: &LoadedSource) -> Result<Option<ValueTree>> {
    if let Some(path) = &args.current {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            QuotaError::file_error(format!(
                "Failed to read current quota '{}': {}",
                path.display(),
                e
            ))
        })?;
        return parse_document(path, &content).map(Some);
    }

    match (source.remote(), &args.project) {
        (Some(remote), Some(project)) => Ok(Some(remote.fetch_quota(project).await?)),
        _ => Ok(None),
    }
}

fn cli_host() -> CallbackHost {
    CallbackHost::new()
        .with_scheme_width(|objects| tracing::debug!(objects, "Quota scheme loaded"))
        .with_error(|message| tracing::debug!(error = %message, "Quota engine failed"))
        .with_change(|_, complete| tracing::debug!(complete, "Quota changed"))
}

async fn load_engine(
    args: &SourceArgs,
    source: &LoadedSource,
    options: EngineOptions,
) -> Result<QuotaEngine<CallbackHost>> {
    let current = current_value(args, source).await?;
    let mut engine = QuotaEngine::new(cli_host(), options.with_current_value(current));
    engine.load(source.as_source()).await?;
    Ok(engine)
}

/// Execute the init command
pub async fn execute_init(source: SourceArgs, format: Option<OutputFormat>) -> Result<ExitCode> {
    let loaded = LoadedSource::open(&source)?;
    let engine = load_engine(&source, &loaded, EngineOptions::default()).await?;

    EngineOutput::from_engine(&engine).render(format.unwrap_or_default())?;
    Ok(ExitCode::from_completeness(engine.is_complete()))
}

/// Execute the edit command
pub async fn execute_edit(
    source: SourceArgs,
    edits: EditArgs,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let units = edits
        .units
        .iter()
        .map(|s| s.parse::<ParameterAssignment>())
        .collect::<Result<Vec<_>>>()?;
    let sets = edits
        .sets
        .iter()
        .map(|s| s.parse::<ParameterAssignment>())
        .collect::<Result<Vec<_>>>()?;
    let labels = edits
        .labels
        .iter()
        .map(|s| parse_label(s))
        .collect::<Result<Vec<_>>>()?;

    let loaded = LoadedSource::open(&source)?;
    if edits.submit && (loaded.remote().is_none() || source.project.is_none()) {
        return Err(QuotaError::invalid_input(
            "--submit requires --url and --project",
        ));
    }

    let registry = if edits.metrics {
        Some(EngineMetricsRegistry::new().map_err(|e| QuotaError::InternalError(e.to_string()))?)
    } else {
        None
    };
    let mut options = EngineOptions::default();
    if let Some(registry) = &registry {
        options = options.with_metrics(registry.engine());
    }

    let mut engine = load_engine(&source, &loaded, options).await?;

    for unit in &units {
        engine.select_unit(&unit.object, &unit.parameter, unit.value.as_str())?;
    }
    for set in &sets {
        engine.edit_parameter(&set.object, &set.parameter, set.value.as_str())?;
    }
    for (name, value) in &labels {
        engine.edit_label(name, value.as_str())?;
    }

    let mut submitted = false;
    if edits.submit {
        match (engine.submittable_tree(), loaded.remote(), &source.project) {
            (Some(tree), Some(remote), Some(project)) => {
                remote.update_quota(project, tree).await?;
                submitted = true;
            }
            _ => tracing::warn!("Quota is incomplete, not submitting"),
        }
    }

    EngineOutput::from_engine(&engine)
        .with_submitted(submitted)
        .render(format.unwrap_or_default())?;

    if let Some(registry) = &registry {
        let text = registry
            .encode_text()
            .map_err(|e| QuotaError::InternalError(e.to_string()))?;
        println!("{}", text);
    }

    Ok(ExitCode::from_completeness(engine.is_complete()))
}

/// Execute the derive command
pub fn execute_derive(scheme: PathBuf, format: Option<OutputFormat>) -> Result<ExitCode> {
    let scheme = read_scheme(&scheme)?;
    let derived = ValidationScheme::derive(&scheme);

    match format.unwrap_or(OutputFormat::Json) {
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(derived.document())?),
        OutputFormat::Json | OutputFormat::Table => {
            println!("{}", serde_json::to_string_pretty(derived.document())?)
        }
    }
    Ok(ExitCode::Success)
}

/// Execute the check command
pub fn execute_check(scheme: PathBuf, format: Option<OutputFormat>) -> Result<ExitCode> {
    let parsed = read_scheme(&scheme)?;
    let problems = parsed.check()?;

    let output = CheckOutput::new(&scheme, &parsed, &problems);
    output.render(format.unwrap_or_default())?;
    Ok(ExitCode::from_completeness(problems.is_empty()))
}

fn read_scheme(path: &Path) -> Result<StructuralScheme> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        QuotaError::file_error(format!(
            "Failed to read scheme file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_document(path, &content)
}

/// Parse a document as YAML or JSON based on its extension
fn parse_document<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| {
            QuotaError::parse_error(format!("Invalid YAML in '{}': {}", path.display(), e))
        }),
        _ => serde_json::from_str(content).map_err(|e| {
            QuotaError::parse_error(format!("Invalid JSON in '{}': {}", path.display(), e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        QuotaCli::command().debug_assert();
    }

    #[test]
    fn test_parse_assignment() {
        let assignment: ParameterAssignment = "compute.cpu=500".parse().unwrap();
        assert_eq!(assignment.object, "compute");
        assert_eq!(assignment.parameter, "cpu");
        assert_eq!(assignment.value, "500");

        let cleared: ParameterAssignment = "compute.cpu=".parse().unwrap();
        assert_eq!(cleared.value, "");

        assert!("compute=1".parse::<ParameterAssignment>().is_err());
        assert!(".cpu=1".parse::<ParameterAssignment>().is_err());
        assert!("compute.cpu".parse::<ParameterAssignment>().is_err());
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(
            parse_label("team=platform").unwrap(),
            ("team".to_string(), "platform".to_string())
        );
        assert_eq!(parse_label("team=").unwrap().1, "");
        assert!(parse_label("=x").is_err());
        assert!(parse_label("team").is_err());
    }

    #[test]
    fn test_log_level() {
        let cli = QuotaCli::parse_from(["quota-edit", "-vv", "check", "--scheme", "s.json"]);
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);

        let cli = QuotaCli::parse_from(["quota-edit", "-q", "check", "--scheme", "s.json"]);
        assert_eq!(cli.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_edit_arguments() {
        let cli = QuotaCli::parse_from([
            "quota-edit",
            "edit",
            "--scheme-dir",
            "schemes",
            "--unit",
            "compute.cpu=k",
            "--set",
            "compute.cpu=2",
            "--set",
            "compute.memory=4",
            "--label",
            "team=data",
        ]);
        match cli.command {
            QuotaCommands::Edit {
                source,
                units,
                sets,
                labels,
                submit,
                ..
            } => {
                assert_eq!(source.scheme_dir, Some(PathBuf::from("schemes")));
                assert_eq!(units, vec!["compute.cpu=k"]);
                assert_eq!(sets.len(), 2);
                assert_eq!(labels, vec!["team=data"]);
                assert!(!submit);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_document_by_extension() {
        let tree: ValueTree = parse_document(
            Path::new("current.yaml"),
            "labels:\n  team: data\nquota: {}\n",
        )
        .unwrap();
        assert_eq!(tree.labels["team"], "data");

        let tree: ValueTree =
            parse_document(Path::new("current.json"), r#"{"labels": {}, "quota": {}}"#).unwrap();
        assert!(tree.quota.is_empty());

        assert!(matches!(
            parse_document::<ValueTree>(Path::new("current.json"), "{"),
            Err(QuotaError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_requires_remote_source() {
        let source = SourceArgs {
            scheme_dir: Some(PathBuf::from("schemes")),
            ..Default::default()
        };
        let edits = EditArgs {
            submit: true,
            ..Default::default()
        };
        let err = execute_edit(source, edits, None).await.unwrap_err();
        assert!(matches!(err, QuotaError::InvalidInput(_)));
    }
}
