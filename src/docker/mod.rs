//! Docker-backed [`ContainerRuntime`].
//!
//! Drives the `docker` CLI (or a compatible one such as `podman` or `finch`)
//! as a subprocess: images are built with `docker build`, builds run with
//! `docker run --rm`.

mod guard;
pub mod image;

pub use image::{BUILT_IMAGE_PREFIX, check_docker_available, image_tag_for_context};

use crate::bundling::{ContainerPlan, ContainerRuntime, ImageSpec, run_streaming};
use crate::error::{BundleError, Result};
use guard::ContainerGuard;
use std::process::Command;

/// Default container CLI.
pub const DEFAULT_CONTAINER_PROGRAM: &str = "docker";

/// Runs container plans through a docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerRuntime {
    /// Uses `docker` from `PATH`.
    pub fn new() -> Self {
        Self::with_program(DEFAULT_CONTAINER_PROGRAM)
    }

    /// Uses another docker-compatible CLI.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// CLI this runtime invokes
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ContainerRuntime for DockerRuntime {
    fn ensure_image(&self, image: &ImageSpec) -> Result<String> {
        check_docker_available(&self.program)?;
        image::ensure_image(&self.program, image)
    }

    fn run(&self, image: &str, plan: &ContainerPlan) -> Result<()> {
        let name = format!("{}-{}", BUILT_IMAGE_PREFIX, uuid::Uuid::new_v4().simple());
        let args = run_args(&name, image, plan);

        log::info!("Running in container {} ({}): {}", name, image, plan.command);
        log::debug!("{} {}", self.program, args.join(" "));

        let _guard = ContainerGuard {
            program: &self.program,
            name,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        let (status, stderr) = run_streaming(&mut cmd, &format!("{} run", self.program))?;

        if !status.success() {
            return Err(BundleError::BuildFailure {
                command: plan.command.clone(),
                status: status.code(),
                stderr,
            });
        }

        Ok(())
    }
}

/// Arguments for `docker run`, in order.
///
/// Bind mounts use `:delegated` consistency, which speeds up writes to the
/// output directory on macOS and is ignored elsewhere.
pub fn run_args(name: &str, image: &str, plan: &ContainerPlan) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        name.to_string(),
    ];

    for mount in &plan.mounts {
        args.push("-v".to_string());
        args.push(format!(
            "{}:{}:delegated",
            mount.source.display(),
            mount.target
        ));
    }

    args.push("-w".to_string());
    args.push(plan.working_dir.clone());

    if let Some(user) = &plan.user {
        args.push("-u".to_string());
        args.push(user.clone());
    }

    for (key, value) in plan.environment.iter() {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    args.push(image.to_string());
    args.extend(plan.argv.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundling::{BuildEnvironment, CONTAINER_INPUT_DIR, CONTAINER_OUTPUT_DIR, Mount};
    use std::path::PathBuf;

    fn plan() -> ContainerPlan {
        let command = "cargo lambda build --release".to_string();
        ContainerPlan {
            image: ImageSpec::default(),
            argv: vec!["bash".to_string(), "-c".to_string(), command.clone()],
            command,
            environment: BuildEnvironment::merged([("CARGO_TERM_COLOR", "always")], []),
            user: Some("1000:1000".to_string()),
            working_dir: CONTAINER_INPUT_DIR.to_string(),
            mounts: vec![
                Mount {
                    source: PathBuf::from("/src/handler"),
                    target: CONTAINER_INPUT_DIR.to_string(),
                },
                Mount {
                    source: PathBuf::from("/out/handler"),
                    target: CONTAINER_OUTPUT_DIR.to_string(),
                },
            ],
        }
    }

    #[test]
    fn run_args_place_image_before_command() {
        let args = run_args("bundle-1", "ghcr.io/cargo-lambda/cargo-lambda", &plan());
        assert_eq!(args[..4], ["run", "--rm", "--name", "bundle-1"].map(String::from));

        let image_pos = args
            .iter()
            .position(|a| a == "ghcr.io/cargo-lambda/cargo-lambda")
            .unwrap();
        assert_eq!(
            args[image_pos + 1..],
            ["bash", "-c", "cargo lambda build --release"].map(String::from)
        );
    }

    #[test]
    fn run_args_carry_mounts_user_and_environment() {
        let args = run_args("n", "img", &plan());
        let pairs: Vec<_> = args.windows(2).map(|w| (w[0].as_str(), w[1].as_str())).collect();
        assert!(pairs.contains(&("-v", "/src/handler:/asset-input:delegated")));
        assert!(pairs.contains(&("-v", "/out/handler:/asset-output:delegated")));
        assert!(pairs.contains(&("-w", "/asset-input")));
        assert!(pairs.contains(&("-u", "1000:1000")));
        assert!(pairs.contains(&("-e", "CARGO_TERM_COLOR=always")));
    }

    #[test]
    fn image_default_user_is_kept_without_user() {
        let mut p = plan();
        p.user = None;
        assert!(!run_args("n", "img", &p).iter().any(|a| a == "-u"));
    }

    #[test]
    fn runtime_program_defaults_to_docker() {
        assert_eq!(DockerRuntime::new().program(), DEFAULT_CONTAINER_PROGRAM);
        assert_eq!(DockerRuntime::with_program("podman").program(), "podman");
    }

    #[test]
    fn unavailable_cli_is_a_spawn_error() {
        let runtime = DockerRuntime::with_program("docker-cli-that-does-not-exist");
        assert!(matches!(
            runtime.run("img", &plan()),
            Err(BundleError::Spawn { .. })
        ));
        assert!(matches!(
            runtime.ensure_image(&ImageSpec::default()),
            Err(BundleError::Spawn { .. })
        ));
    }
}
