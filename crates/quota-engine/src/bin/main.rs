//! Quota editor CLI
//!
//! # Usage
//!
//! ```bash
//! # Print the initial quota for a scheme directory
//! quota-edit init --scheme-dir ./schemes
//!
//! # Apply edits; units first, then values, then labels
//! quota-edit edit --scheme-dir ./schemes --set compute.cpu=500 --label team=data
//!
//! # Check a structural scheme
//! quota-edit check --scheme scheme.json
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success - the quota is complete
//! - 1: The quota is incomplete, or the scheme has problems
//! - 3: Invalid input or arguments
//! - 4: File not found or inaccessible
//! - 5: A scheme lookup failed
//! - 10: Internal error

use clap::Parser;
use quota_engine::{run_cli, QuotaCli};

fn main() {
    let cli = QuotaCli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(cli.log_level().into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = run_cli(cli);
    std::process::exit(exit_code.into());
}
