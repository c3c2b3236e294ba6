//! Resolved execution plans.
//!
//! A plan is built once per request and never mutated. Host plans are run by
//! [`run_on_host`](super::host::run_on_host); container plans are handed to a
//! [`ContainerRuntime`], the external containerized-build subsystem.

use super::command::ShellInvocation;
use super::environment::BuildEnvironment;
use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Image used when the caller does not configure one.
pub const DEFAULT_BUILD_IMAGE: &str = "ghcr.io/cargo-lambda/cargo-lambda";

/// Mount point of the crate directory inside the container.
pub const CONTAINER_INPUT_DIR: &str = "/asset-input";

/// Mount point of the output directory inside the container.
pub const CONTAINER_OUTPUT_DIR: &str = "/asset-output";

/// How and where a build command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExecutionPlan {
    /// Run on the calling machine
    Host(HostPlan),
    /// Run inside the build container
    Container(ContainerPlan),
}

impl ExecutionPlan {
    /// The shell command string carried by either variant
    pub fn command(&self) -> &str {
        match self {
            ExecutionPlan::Host(plan) => &plan.command,
            ExecutionPlan::Container(plan) => &plan.command,
        }
    }

    /// Build environment carried by either variant
    pub fn environment(&self) -> &BuildEnvironment {
        match self {
            ExecutionPlan::Host(plan) => &plan.environment,
            ExecutionPlan::Container(plan) => &plan.environment,
        }
    }

    /// Whether this plan runs in a container
    pub fn is_container(&self) -> bool {
        matches!(self, ExecutionPlan::Container(_))
    }
}

/// A build that runs as a local subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostPlan {
    /// Shell that interprets `command`
    pub shell: ShellInvocation,
    /// Full command string
    pub command: String,
    /// Variables layered on the ambient environment
    pub environment: BuildEnvironment,
    /// Directory the subprocess starts in
    pub working_dir: PathBuf,
}

/// Image the container build runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSpec {
    /// Pull from a registry
    Registry {
        /// Image reference, e.g. `ghcr.io/cargo-lambda/cargo-lambda:latest`
        reference: String,
    },
    /// Build from a local Dockerfile directory
    BuildContext {
        /// Build context directory
        path: PathBuf,
        /// Dockerfile name relative to the context
        dockerfile: String,
        /// `--build-arg` values
        build_args: BuildEnvironment,
    },
}

impl Default for ImageSpec {
    fn default() -> Self {
        ImageSpec::Registry {
            reference: DEFAULT_BUILD_IMAGE.to_string(),
        }
    }
}

/// Host directory bound into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    /// Directory on the host
    pub source: PathBuf,
    /// Path inside the container
    pub target: String,
}

/// Everything the containerized-build subsystem needs to run one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerPlan {
    /// Image to run (or build, then run)
    pub image: ImageSpec,
    /// Command string, also present inside `argv`
    pub command: String,
    /// In-container argument vector (`bash -c <command>`)
    pub argv: Vec<String>,
    /// Extra environment for the container
    pub environment: BuildEnvironment,
    /// `uid:gid` to run as; `None` keeps the image's default user
    pub user: Option<String>,
    /// Working directory inside the container
    pub working_dir: String,
    /// Bind mounts (entry → input dir, output → output dir)
    pub mounts: Vec<Mount>,
}

impl ContainerPlan {
    /// Host directory mounted at [`CONTAINER_OUTPUT_DIR`], if any
    pub fn output_mount(&self) -> Option<&Path> {
        self.mounts
            .iter()
            .find(|m| m.target == CONTAINER_OUTPUT_DIR)
            .map(|m| m.source.as_path())
    }
}

/// External subsystem that builds images and runs container plans.
///
/// The orchestrator only ever talks to containers through this trait.
pub trait ContainerRuntime {
    /// Makes `image` runnable and returns the reference to pass to [`run`](Self::run).
    fn ensure_image(&self, image: &ImageSpec) -> Result<String>;

    /// Runs `plan` in `image` and blocks until the container exits.
    ///
    /// A nonzero exit must be reported as
    /// [`BundleError::BuildFailure`](crate::error::BundleError::BuildFailure).
    fn run(&self, image: &str, plan: &ContainerPlan) -> Result<()>;
}

/// `uid:gid` of the invoking user, so files written to the output mount are
/// owned by them. Windows containers keep the image's user.
pub fn current_user() -> Option<String> {
    #[cfg(unix)]
    {
        Some(format!("{}:{}", users::get_current_uid(), users::get_current_gid()))
    }
    #[cfg(not(unix))]
    {
        None
    }
}
