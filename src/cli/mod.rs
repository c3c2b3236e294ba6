//! Command line interface for lambda_rust_bundler.
//!
//! Parses arguments into [`BundlingProps`](crate::bundling::BundlingProps),
//! then prints the resolved plan or runs the bundle.

mod args;
mod bundle;
mod output;

pub use args::{Args, DEFAULT_DOCKERFILE, RuntimeConfig};
pub use bundle::execute_bundle;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub fn run() -> Result<i32> {
    let args = Args::parse_args();
    let config = RuntimeConfig::from(&args);
    execute_bundle(&args, &config)
}

/// Print an error and its recovery suggestions to the terminal.
pub fn report_error(output: &OutputManager, error: &crate::error::BundleError) {
    output.error(&format!("Fatal error: {error}"));

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        output.error("Recovery suggestions:");
        for suggestion in suggestions {
            output.error(&format!("  • {suggestion}"));
        }
    }
}
