//! Error types for bundling operations.
//!
//! Every fatal condition is returned as a [`BundleError`] instead of halting the
//! process, so test harnesses and higher-level pipelines can decide what to do.
//! Tool unavailability is deliberately absent: it is a soft condition carried by
//! [`ToolAvailability`](crate::bundling::ToolAvailability) and handled by
//! falling back to container bundling.

use std::{
    fmt::Display,
    io,
    path::PathBuf,
};
use thiserror::Error;

/// Result type alias for bundling operations
pub type Result<T> = std::result::Result<T, BundleError>;

/// Main error type for all bundling operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BundleError {
    /// Invalid build parameters (unsupported platform tag, malformed target triple, ...)
    ///
    /// Always raised before any subprocess is spawned.
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Reason for the error
        reason: String,
    },

    /// The build command ran and exited unsuccessfully
    #[error("Build failed ({}): {}", exit_description(.status), .command)]
    BuildFailure {
        /// Command line that was executed
        command: String,
        /// Exit code, `None` when the process was terminated by a signal
        status: Option<i32>,
        /// Standard error of the build, already streamed to the terminal
        stderr: String,
    },

    /// A subprocess could not be started at all
    #[error("Failed to run command {command}: {source}")]
    Spawn {
        /// Program that failed to start
        command: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The containerized-build subsystem failed outside of the build itself
    #[error("Container runtime error: {reason}")]
    ContainerRuntime {
        /// Reason for the error
        reason: String,
    },

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "creating staging directory")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Generic(String),
}

fn exit_description(status: &Option<i32>) -> String {
    match *status {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl BundleError {
    /// Shorthand for [`BundleError::Configuration`]
    pub fn configuration(reason: impl Into<String>) -> Self {
        BundleError::Configuration {
            reason: reason.into(),
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            BundleError::Configuration { .. } => vec![
                "Supported platforms: linux, macos, windows, container".to_string(),
                "Target triples look like aarch64-unknown-linux-gnu".to_string(),
            ],
            BundleError::BuildFailure { .. } => vec![
                "Run the printed command by hand to reproduce the failure".to_string(),
                "Check that the crate builds with: cargo lambda build --release".to_string(),
            ],
            BundleError::Spawn { command, .. } if command.starts_with("docker") => vec![
                "Install Docker: https://docs.docker.com/get-docker/".to_string(),
                "Or install cargo-lambda to build on the host: pip3 install cargo-lambda"
                    .to_string(),
            ],
            BundleError::ContainerRuntime { .. } => vec![
                "Check that the Docker daemon is running: docker info".to_string(),
                "Pass --image or --image-context to choose a different build image".to_string(),
            ],
            BundleError::Context(_, inner) => inner.recovery_suggestions(),
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Whether the failure came from the build itself rather than the setup around it
    pub fn is_build_failure(&self) -> bool {
        match self {
            BundleError::BuildFailure { .. } => true,
            BundleError::Context(_, inner) => inner.is_build_failure(),
            _ => false,
        }
    }
}

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with [`BundleError`].
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| BundleError::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| BundleError::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| BundleError::Generic(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| BundleError::Generic(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| BundleError::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`BundleError::Generic`] and returns immediately.
///
/// ```ignore
/// bail!("staging directory is empty");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::error::BundleError::Generic($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::error::BundleError::Generic($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::BundleError::Generic(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_failure_message_names_status_and_command() {
        let err = BundleError::BuildFailure {
            command: "cargo lambda build".to_string(),
            status: Some(101),
            stderr: "error[E0425]: cannot find value\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Build failed (exit code 101): cargo lambda build"
        );
    }

    #[test]
    fn build_failure_message_leaves_out_streamed_stderr() {
        let err = BundleError::BuildFailure {
            command: "bash -c exit".to_string(),
            status: None,
            stderr: "linker `cc` not found".to_string(),
        };
        let message = err.to_string();
        assert_eq!(message, "Build failed (terminated by signal): bash -c exit");
        assert!(!message.contains("linker"));
    }

    #[test]
    fn context_preserves_build_failure_classification() {
        let failed: Result<()> = Err(BundleError::BuildFailure {
            command: "x".to_string(),
            status: Some(1),
            stderr: String::new(),
        });
        let err = failed.context("bundling handler").unwrap_err();
        assert!(err.is_build_failure());
        assert!(
            err.recovery_suggestions()
                .iter()
                .any(|s| s.contains("cargo lambda build"))
        );
        assert!(err.to_string().starts_with("bundling handler: "));
    }

    #[test]
    fn fs_context_records_path() {
        let io_result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = io_result
            .fs_context("reading output directory", "/out")
            .unwrap_err();
        assert_eq!(err.to_string(), "reading output directory /out: gone");
    }

    #[test]
    fn configuration_errors_have_suggestions() {
        let err = BundleError::configuration("unsupported target platform 'beos'");
        assert!(!err.recovery_suggestions().is_empty());
        assert!(!err.is_build_failure());
    }
}
