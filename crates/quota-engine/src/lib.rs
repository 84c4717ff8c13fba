//! Quota Engine
//!
//! Schema-driven editing and validation of resource quotas. The engine loads
//! a structural scheme and a validation scheme, keeps an editable value tree
//! and reports after every edit whether the tree may be submitted.
//!
//! ## Features
//!
//! - **All-or-nothing objects**: a resource object is stored only while every
//!   declared parameter has a value
//! - **Whole-tree validation**: completeness is recomputed after each edit
//! - **Pluggable validator**: any [`Validator`] can replace the default
//!   JSON Schema validator
//! - **Scheme sources**: backend over HTTP or a local scheme directory
//! - **Telemetry**: `tracing` logs and optional Prometheus metrics
//!
//! ## Architecture
//!
//! 1. **Scheme** (`scheme`): structural scheme, validation scheme and their
//!    tooling (checks, derivation, fragment lookup).
//!
//! 2. **Value** (`value`): the value tree and its zero initialization.
//!
//! 3. **Editors** (`field`, `object`): field and resource object editors that
//!    report changes upward.
//!
//! 4. **Engine** (`engine`): the `Loading` / `Ready` / `Failed` state machine
//!    and the host callbacks.
//!
//! 5. **Sources** (`source`, `client`): where schemes and quotas come from.
//!
//! 6. **CLI** (`cli`): the `quota-edit` binary.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Print the zero quota for a scheme directory
//! quota-edit init --scheme-dir ./schemes
//!
//! # Edit a project's quota on the backend and submit it
//! quota-edit edit --url https://quota.example.com --project shop \
//!     --unit compute.cpu=m --set compute.cpu=500 --label team=platform --submit
//!
//! # Derive the validation scheme for a structural scheme
//! quota-edit derive --scheme scheme.json
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use quota_engine::{CallbackHost, EngineOptions, FileSchemeSource, QuotaEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = CallbackHost::new()
//!         .with_error(|message| eprintln!("failed: {}", message))
//!         .with_change(|tree, complete| println!("{} objects, complete: {}", tree.quota.len(), complete));
//!
//!     let mut engine = QuotaEngine::new(host, EngineOptions::default());
//!     engine.load(&FileSchemeSource::new("./schemes")).await.unwrap();
//!
//!     engine.edit_parameter("compute", "cpu", "500").unwrap();
//!     if let Some(tree) = engine.submittable_tree() {
//!         println!("{}", serde_json::to_string(tree).unwrap());
//!     }
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod object;
pub mod scheme;
pub mod source;
pub mod telemetry;
pub mod validation;
pub mod value;

pub use client::{ClientError, HttpSchemeSource};
pub use config::ClientConfig;
pub use engine::{
    CallbackHost, Edit, EditField, EngineHost, EngineOptions, EngineState, QuotaEngine,
};
pub use error::{QuotaError, Result};
pub use field::{FieldChange, FieldEditor, FieldKind};
pub use object::{ObjectChange, ObjectEditor};
pub use scheme::{
    ObjectSpec, ParameterSpec, ParameterType, StructuralScheme, Units, ValidationScheme,
};
pub use source::{FileSchemeSource, SchemeSource};
pub use telemetry::{EngineMetrics, EngineMetricsRegistry};
pub use validation::{SchemaValidator, Validator, Violation};
pub use value::{ObjectValue, ParameterValue, QuotaDocument, SeedDrift, ValueTree};

pub use cli::{ExitCode, OutputFormat, QuotaCli, QuotaCommands};

/// Engine version (from Cargo.toml)
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the CLI application
///
/// This is the main entry point for the CLI binary.
pub fn run_cli(cli: QuotaCli) -> ExitCode {
    match cli::run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!ENGINE_VERSION.is_empty());
    }
}
