//! Lambda Rust Bundler - builds Rust Lambda functions with cargo-lambda.
//!
//! Exit code 0 on success, 1 on any error.

use lambda_rust_bundler::cli;
use lambda_rust_bundler::cli::OutputManager;
use std::process;

fn main() {
    env_logger::init();

    match cli::run() {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false);
            cli::report_error(&output, &e);
            process::exit(1);
        }
    }
}
