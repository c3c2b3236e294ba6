//! Native toolchain detection.
//!
//! Checks whether `cargo lambda` is installed on the host and recent enough to
//! build natively. The answer is cached process-wide in a [`ToolProbe`].
//!
//! # Lifecycle
//!
//! A probe starts out [`ToolAvailability::Unknown`]. The first call to
//! [`ToolProbe::availability`] runs the probe function and stores the result;
//! that is the only write. Every later call reads the stored value, even if
//! `cargo lambda` has been installed or removed in the meantime. Tests that
//! need a fresh answer call [`ToolProbe::reset`].

use semver::Version;
use serde::Serialize;
use std::process::Command;
use std::sync::{LazyLock, Mutex, MutexGuard};

/// Oldest cargo-lambda release whose `build` flags match what the command builder emits.
pub const MIN_CARGO_LAMBDA_VERSION: Version = Version::new(1, 0, 0);

/// Whether the native build tool can be used on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolAvailability {
    /// Not probed yet
    Unknown,
    /// `cargo lambda` is installed and meets [`MIN_CARGO_LAMBDA_VERSION`]
    Available,
    /// Missing, broken or too old
    Unavailable,
}

impl ToolAvailability {
    /// True only for [`ToolAvailability::Available`]
    pub fn is_available(self) -> bool {
        self == ToolAvailability::Available
    }
}

type ProbeFn = Box<dyn Fn() -> ToolAvailability + Send + Sync>;

static CARGO_LAMBDA: LazyLock<ToolProbe> = LazyLock::new(|| ToolProbe::with_probe(probe_cargo_lambda));

/// Cached, write-once availability check for a build tool.
pub struct ToolProbe {
    state: Mutex<ToolAvailability>,
    probe: ProbeFn,
}

impl std::fmt::Debug for ToolProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolProbe")
            .field("state", &self.cached())
            .finish_non_exhaustive()
    }
}

impl ToolProbe {
    /// The process-wide probe for `cargo lambda`.
    pub fn cargo_lambda() -> &'static ToolProbe {
        &CARGO_LAMBDA
    }

    /// Creates an isolated probe around a custom probe function.
    pub fn with_probe<F>(probe: F) -> Self
    where
        F: Fn() -> ToolAvailability + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(ToolAvailability::Unknown),
            probe: Box::new(probe),
        }
    }

    /// Returns the cached availability, probing on first use.
    ///
    /// A probe function that itself reports `Unknown` is treated as `Unavailable`
    /// so the cache is always resolved after this call.
    pub fn availability(&self) -> ToolAvailability {
        let mut state = self.lock();
        if *state == ToolAvailability::Unknown {
            let resolved = match (self.probe)() {
                ToolAvailability::Unknown => ToolAvailability::Unavailable,
                other => other,
            };
            log::debug!("cargo-lambda availability resolved to {:?}", resolved);
            *state = resolved;
        }
        *state
    }

    /// Returns the cached value without probing.
    pub fn cached(&self) -> ToolAvailability {
        *self.lock()
    }

    /// Forgets the cached answer. Intended for test isolation only.
    pub fn reset(&self) {
        *self.lock() = ToolAvailability::Unknown;
    }

    // A panic inside a probe function leaves the state untouched, so a poisoned
    // lock still holds a valid value.
    fn lock(&self) -> MutexGuard<'_, ToolAvailability> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Probes the host for `cargo lambda --version`.
///
/// Any failure along the way (missing cargo, spawn error, nonzero exit,
/// unparsable output, version too old) yields `Unavailable`.
pub fn probe_cargo_lambda() -> ToolAvailability {
    let cargo = match which::which("cargo") {
        Ok(path) => path,
        Err(e) => {
            log::debug!("cargo not found in PATH: {}. Bundling will use a container.", e);
            return ToolAvailability::Unavailable;
        }
    };

    let output = match Command::new(&cargo).args(["lambda", "--version"]).output() {
        Ok(output) => output,
        Err(e) => {
            log::warn!(
                "cargo found at {} but failed to execute: {}. Bundling will use a container.",
                cargo.display(),
                e
            );
            return ToolAvailability::Unavailable;
        }
    };

    if !output.status.success() {
        log::debug!(
            "cargo lambda --version failed (exit code: {:?}). Stderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return ToolAvailability::Unavailable;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_tool_version(&stdout) {
        Some(version) if version >= MIN_CARGO_LAMBDA_VERSION => {
            log::info!("✓ cargo-lambda available: {}", version);
            ToolAvailability::Available
        }
        Some(version) => {
            log::warn!(
                "cargo-lambda {} is older than the required {}. Bundling will use a container.",
                version,
                MIN_CARGO_LAMBDA_VERSION
            );
            ToolAvailability::Unavailable
        }
        None => {
            log::warn!(
                "Could not parse cargo-lambda version from '{}'. Bundling will use a container.",
                stdout.trim()
            );
            ToolAvailability::Unavailable
        }
    }
}

/// Extracts the first semver-shaped token from version output.
///
/// Accepts output such as `cargo-lambda 1.6.3 (a1b2c3d 2024-10-01Z)` or `v1.2.0`.
pub fn parse_tool_version(output: &str) -> Option<Version> {
    output
        .split_whitespace()
        .map(|token| token.trim_start_matches('v'))
        .find_map(|token| Version::parse(token).ok())
}
