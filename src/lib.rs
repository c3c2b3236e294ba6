//! # Lambda Rust Bundler
//!
//! Builds Rust AWS Lambda functions into deployable directories with
//! [cargo-lambda](https://www.cargo-lambda.info/), either directly on the host
//! or inside a build container when the tool is missing.
//!
//! ## Features
//!
//! - **Cached tool probe**: `cargo lambda --version` runs at most once per process
//! - **Automatic fallback**: builds move into a container when the host can't build
//! - **Cross-platform commands**: POSIX and Windows shells on the host, bash in the container
//! - **All-or-nothing output**: builds are staged and only published on success
//!
//! ## Usage
//!
//! ```bash
//! lambda_rust_bundler functions/handler --out-dir cdk.out/handler
//! lambda_rust_bundler . --out-dir out --architecture arm64 --force-container
//! lambda_rust_bundler . --out-dir out --plan-only
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundling;
pub mod cli;
pub mod docker;
pub mod error;

pub use bundling::{
    Architecture, BundleOutcome, Bundling, BundlingProps, BundlingStrategy, ContainerRuntime,
    ExecutionPlan, TargetPlatform, TargetTriple, ToolAvailability, ToolProbe,
};
pub use cli::Args;
pub use docker::DockerRuntime;
pub use error::{BundleError, Result};
