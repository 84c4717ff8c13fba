//! CLI host for the quota engine
//!
//! Loads an engine from a scheme directory or the backend, applies edits
//! given on the command line and prints the resulting tree.

pub mod commands;
pub mod output;

pub use commands::{QuotaCli, QuotaCommands};
pub use output::{EngineOutput, OutputFormat};

use crate::error::{QuotaError, Result};

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// The tree is complete, or the command succeeded
    Success = 0,
    /// The tree is incomplete, or the scheme has problems
    Incomplete = 1,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// A scheme lookup failed
    FetchError = 5,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    pub fn from_completeness(complete: bool) -> Self {
        if complete {
            ExitCode::Success
        } else {
            ExitCode::Incomplete
        }
    }

    pub fn from_error(err: &QuotaError) -> Self {
        match err {
            QuotaError::Fetch(_) => ExitCode::FetchError,
            QuotaError::FileError(_) => ExitCode::FileError,
            e if e.is_user_error() => ExitCode::InvalidInput,
            _ => ExitCode::InternalError,
        }
    }
}

/// Run the CLI on a current-thread runtime and return the exit code
pub fn run(cli: QuotaCli) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| QuotaError::InternalError(format!("Failed to start runtime: {}", e)))?;

    match cli.command {
        QuotaCommands::Init { source, format } => {
            runtime.block_on(commands::execute_init(source, format))
        }
        QuotaCommands::Edit {
            source,
            units,
            sets,
            labels,
            submit,
            metrics,
            format,
        } => runtime.block_on(commands::execute_edit(
            source,
            commands::EditArgs {
                units,
                sets,
                labels,
                submit,
                metrics,
            },
            format,
        )),
        QuotaCommands::Derive { scheme, format } => commands::execute_derive(scheme, format),
        QuotaCommands::Check { scheme, format } => commands::execute_check(scheme, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Incomplete), 1);
        assert_eq!(i32::from(ExitCode::FetchError), 5);
        assert_eq!(i32::from(ExitCode::InternalError), 10);
    }

    #[test]
    fn test_exit_code_from_error() {
        assert_eq!(
            ExitCode::from_error(&QuotaError::fetch("scheme unavailable")),
            ExitCode::FetchError
        );
        assert_eq!(
            ExitCode::from_error(&QuotaError::file_error("missing")),
            ExitCode::FileError
        );
        assert_eq!(
            ExitCode::from_error(&QuotaError::UnknownLabel("team".into())),
            ExitCode::InvalidInput
        );
        assert_eq!(
            ExitCode::from_error(&QuotaError::NotReady("loading".into())),
            ExitCode::InternalError
        );
    }

    #[test]
    fn test_exit_code_from_completeness() {
        assert_eq!(ExitCode::from_completeness(true), ExitCode::Success);
        assert_eq!(ExitCode::from_completeness(false), ExitCode::Incomplete);
    }
}
