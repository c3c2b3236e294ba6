//! Bundling orchestration.
//!
//! Decides whether a Rust Lambda function is compiled by `cargo lambda` on the
//! host or inside a build container, builds the command for that path and
//! runs it.
//!
//! # Overview
//!
//! 1. [`ToolProbe`] answers, once per process, whether `cargo lambda` works here
//! 2. [`select_strategy`] picks host or container for the request
//! 3. [`build_command`] renders the command string for the chosen platform
//! 4. [`run_on_host`] runs it, or a [`ContainerRuntime`] runs the [`ContainerPlan`]
//!
//! # Example
//!
//! ```no_run
//! use lambda_rust_bundler::bundling::{Architecture, Bundling, BundlingProps, ToolProbe};
//! use lambda_rust_bundler::docker::DockerRuntime;
//!
//! # fn example() -> lambda_rust_bundler::Result<()> {
//! let props = BundlingProps::new("functions/handler", Architecture::Arm64.target_triple())?;
//! let bundling = Bundling::new(props, ToolProbe::cargo_lambda())?;
//! let outcome = bundling.bundle("cdk.out/handler".as_ref(), &DockerRuntime::new())?;
//! println!("{} ({:?})", outcome.asset_hash, outcome.strategy);
//! # Ok(())
//! # }
//! ```

mod command;
mod environment;
mod hash;
mod host;
mod plan;
mod probe;
mod strategy;

pub use command::{
    Architecture, BuildOptions, BuildRequest, CONTAINER_PLATFORM_TAG, CommandHooks,
    PARITY_COMPILER, ShellInvocation, TargetPlatform, TargetTriple, build_command,
};
pub use environment::{BuildEnvironment, parse_pair};
pub use hash::{AssetHashType, hash_directory};
pub use host::run_on_host;
pub(crate) use host::run_streaming;
pub use plan::{
    CONTAINER_INPUT_DIR, CONTAINER_OUTPUT_DIR, ContainerPlan, ContainerRuntime,
    DEFAULT_BUILD_IMAGE, ExecutionPlan, HostPlan, ImageSpec, Mount, current_user,
};
pub use probe::{
    MIN_CARGO_LAMBDA_VERSION, ToolAvailability, ToolProbe, parse_tool_version, probe_cargo_lambda,
};
pub use strategy::{BundlingStrategy, select_strategy};

use crate::bail;
use crate::error::{BundleError, ErrorExt, Result};
use path_absolutize::Absolutize;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything needed to bundle one function.
#[derive(Debug, Clone)]
pub struct BundlingProps {
    /// Crate directory containing Cargo.toml
    pub entry: PathBuf,
    /// Binary to build; inferred by cargo when `None`
    pub bin: Option<String>,
    /// Compilation target
    pub target: TargetTriple,
    /// Platform used for host builds; [`TargetPlatform::Container`] forces the container
    pub platform: TargetPlatform,
    /// Skip host builds even when `cargo lambda` is available
    pub force_container: bool,
    /// Build environment
    pub environment: BuildEnvironment,
    /// Profile, features, hooks, extra flags
    pub options: BuildOptions,
    /// Build image for container bundling
    pub image: ImageSpec,
    /// Fingerprint mode for the finished bundle
    pub asset_hash: AssetHashType,
}

impl BundlingProps {
    /// Props for `entry` and `target` on the host platform, defaults for everything else.
    pub fn new(entry: impl Into<PathBuf>, target: TargetTriple) -> Result<Self> {
        Ok(Self::with_platform(entry, target, TargetPlatform::host()?))
    }

    /// Props for an already resolved `platform`; never consults the host OS.
    pub fn with_platform(
        entry: impl Into<PathBuf>,
        target: TargetTriple,
        platform: TargetPlatform,
    ) -> Self {
        Self {
            entry: entry.into(),
            bin: None,
            target,
            platform,
            force_container: false,
            environment: BuildEnvironment::new(),
            options: BuildOptions::default(),
            image: ImageSpec::default(),
            asset_hash: AssetHashType::default(),
        }
    }
}

/// Result of a successful bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleOutcome {
    /// Directory holding the deployable payload
    pub output_dir: PathBuf,
    /// Where the build actually ran (after any fallback)
    pub strategy: BundlingStrategy,
    /// Fingerprint per [`BundlingProps::asset_hash`]
    pub asset_hash: String,
}

/// Bundling orchestrator for one function.
///
/// Availability is resolved when the orchestrator is created and the strategy
/// is fixed from then on.
#[derive(Debug)]
pub struct Bundling<'a> {
    props: BundlingProps,
    probe: &'a ToolProbe,
    strategy: BundlingStrategy,
}

impl<'a> Bundling<'a> {
    /// Resolves tool availability through `probe` and selects a strategy.
    pub fn new(props: BundlingProps, probe: &'a ToolProbe) -> Result<Self> {
        let forced = props.force_container || props.platform == TargetPlatform::Container;
        let availability = probe.availability();
        let strategy = select_strategy(forced, availability);

        log::info!(
            "Bundling {} for {} via {:?} (cargo-lambda {:?}{})",
            props.entry.display(),
            props.target,
            strategy,
            availability,
            if forced { ", container forced" } else { "" }
        );

        Ok(Self {
            props,
            probe,
            strategy,
        })
    }

    /// The selected strategy
    pub fn strategy(&self) -> BundlingStrategy {
        self.strategy
    }

    /// Bundling configuration
    pub fn props(&self) -> &BundlingProps {
        &self.props
    }

    /// Resolves the plan for the selected strategy, writing to `out_dir`.
    pub fn plan(&self, out_dir: &Path) -> Result<ExecutionPlan> {
        match self.strategy {
            BundlingStrategy::RunOnHost => self.host_plan(out_dir).map(ExecutionPlan::Host),
            BundlingStrategy::RunInContainer => {
                self.container_plan(out_dir).map(ExecutionPlan::Container)
            }
        }
    }

    /// Plan for running on this machine.
    pub fn host_plan(&self, out_dir: &Path) -> Result<HostPlan> {
        let platform = match self.props.platform {
            TargetPlatform::Container => TargetPlatform::host()?,
            platform => platform,
        };
        let entry = absolute(&self.props.entry)?;
        let out_dir = absolute(out_dir)?;
        let request = BuildRequest {
            entry: entry.clone(),
            bin: self.props.bin.clone(),
            target: self.props.target.clone(),
            out_dir,
            platform,
        };
        let command = build_command(&request, &self.props.options)?;

        Ok(HostPlan {
            shell: platform.shell(),
            command,
            environment: self.props.environment.clone(),
            working_dir: entry,
        })
    }

    /// Plan for the containerized-build subsystem.
    pub fn container_plan(&self, out_dir: &Path) -> Result<ContainerPlan> {
        let request = BuildRequest {
            entry: PathBuf::from(CONTAINER_INPUT_DIR),
            bin: self.props.bin.clone(),
            target: self.props.target.clone(),
            out_dir: PathBuf::from(CONTAINER_OUTPUT_DIR),
            platform: TargetPlatform::Container,
        };
        let command = build_command(&request, &self.props.options)?;

        Ok(ContainerPlan {
            image: self.props.image.clone(),
            argv: TargetPlatform::Container.shell().argv(&command),
            command,
            environment: self.props.environment.clone(),
            user: current_user(),
            working_dir: CONTAINER_INPUT_DIR.to_string(),
            mounts: vec![
                Mount {
                    source: absolute(&self.props.entry)?,
                    target: CONTAINER_INPUT_DIR.to_string(),
                },
                Mount {
                    source: absolute(out_dir)?,
                    target: CONTAINER_OUTPUT_DIR.to_string(),
                },
            ],
        })
    }

    /// Builds the function into `out_dir`.
    ///
    /// The build writes to a staging directory next to `out_dir`. The staging
    /// directory is hashed and only then swapped in for `out_dir`; a previous
    /// bundle is moved aside first and restored if the swap fails. On any
    /// failure the staging directory is removed and `out_dir` keeps its
    /// previous contents.
    pub fn bundle(&self, out_dir: &Path, runtime: &dyn ContainerRuntime) -> Result<BundleOutcome> {
        let staging = sibling_dir(out_dir, "staging")?;
        std::fs::create_dir_all(&staging).fs_context("creating staging directory", &staging)?;

        let published = self.execute(&staging, runtime).and_then(|strategy| {
            ensure_not_empty(&staging)?;
            let asset_hash = self.props.asset_hash.compute(&staging)?;
            publish(&staging, out_dir)?;
            Ok((strategy, asset_hash))
        });

        let (strategy, asset_hash) = match published {
            Ok(published) => published,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    log::warn!(
                        "Failed to remove staging directory {}: {}",
                        staging.display(),
                        cleanup
                    );
                }
                return Err(e);
            }
        };

        log::info!("Bundle ready at {} ({})", out_dir.display(), asset_hash);

        Ok(BundleOutcome {
            output_dir: out_dir.to_path_buf(),
            strategy,
            asset_hash,
        })
    }

    fn execute(&self, out_dir: &Path, runtime: &dyn ContainerRuntime) -> Result<BundlingStrategy> {
        if self.strategy == BundlingStrategy::RunOnHost {
            if self.probe.availability().is_available() {
                run_on_host(&self.host_plan(out_dir)?)?;
                return Ok(BundlingStrategy::RunOnHost);
            }
            log::warn!("Rust build cannot run locally. Switching to container bundling.");
        }

        let plan = self.container_plan(out_dir)?;
        let image = runtime.ensure_image(&plan.image)?;
        runtime.run(&image, &plan)?;
        Ok(BundlingStrategy::RunInContainer)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .fs_context("resolving absolute path", path)?
        .into_owned())
}

fn sibling_dir(out_dir: &Path, tag: &str) -> Result<PathBuf> {
    let out_dir = absolute(out_dir)?;
    let (Some(parent), Some(name)) = (out_dir.parent(), out_dir.file_name()) else {
        return Err(BundleError::configuration(format!(
            "output directory {} has no parent directory",
            out_dir.display()
        )));
    };
    Ok(parent.join(format!(
        "{}.{}-{}",
        name.to_string_lossy(),
        tag,
        uuid::Uuid::new_v4()
    )))
}

/// Moves a finished staging directory to `out_dir`.
///
/// An existing bundle is renamed aside and only deleted once the new one is in
/// place. If the final rename fails the old bundle is put back.
fn publish(staging: &Path, out_dir: &Path) -> Result<()> {
    if !out_dir.exists() {
        return std::fs::rename(staging, out_dir).fs_context("publishing bundle", out_dir);
    }
    if !out_dir.is_dir() {
        return Err(BundleError::configuration(format!(
            "output path {} exists and is not a directory",
            out_dir.display()
        )));
    }

    let previous = sibling_dir(out_dir, "previous")?;
    std::fs::rename(out_dir, &previous).fs_context("moving previous bundle aside", out_dir)?;

    if let Err(e) = std::fs::rename(staging, out_dir) {
        if let Err(restore) = std::fs::rename(&previous, out_dir) {
            log::warn!(
                "Failed to restore previous bundle from {}: {}",
                previous.display(),
                restore
            );
        }
        return Err(BundleError::Fs {
            context: "publishing bundle",
            path: out_dir.to_path_buf(),
            error: e,
        });
    }

    if let Err(e) = std::fs::remove_dir_all(&previous) {
        log::warn!(
            "Failed to remove previous bundle {}: {}",
            previous.display(),
            e
        );
    }
    Ok(())
}

fn ensure_not_empty(dir: &Path) -> Result<()> {
    let mut entries = std::fs::read_dir(dir).fs_context("reading staging directory", dir)?;
    if entries.next().is_none() {
        bail!(
            "Build reported success but produced no files in {}",
            dir.display()
        );
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn props(force_container: bool) -> BundlingProps {
        let mut props = BundlingProps::with_platform(
            "/proj",
            TargetTriple::new("aarch64-unknown-linux-gnu").unwrap(),
            TargetPlatform::Linux,
        );
        props.bin = Some("handler".to_string());
        props.force_container = force_container;
        props
    }

    #[test]
    fn available_tool_yields_host_plan() {
        let probe = ToolProbe::with_probe(|| ToolAvailability::Available);
        let bundling = Bundling::new(props(false), &probe).unwrap();
        let plan = bundling.plan(Path::new("/out")).unwrap();

        let ExecutionPlan::Host(host) = plan else {
            panic!("expected host plan");
        };
        assert_eq!(host.shell, ShellInvocation::Bash);
        assert_eq!(host.working_dir, PathBuf::from("/proj"));
        assert!(host.command.starts_with("cd /proj && cargo lambda build"));
        assert!(host.command.contains("--lambda-dir /out"));
    }

    #[test]
    fn unavailable_tool_yields_container_plan_without_host_prefix() {
        let probe = ToolProbe::with_probe(|| ToolAvailability::Unavailable);
        let bundling = Bundling::new(props(false), &probe).unwrap();
        assert_eq!(bundling.strategy(), BundlingStrategy::RunInContainer);

        let ExecutionPlan::Container(container) = bundling.plan(Path::new("/out")).unwrap() else {
            panic!("expected container plan");
        };
        assert!(container.command.starts_with("cargo lambda build"));
        assert_eq!(container.argv[..2], ["bash".to_string(), "-c".to_string()]);
        assert_eq!(container.working_dir, CONTAINER_INPUT_DIR);
        assert_eq!(container.output_mount(), Some(Path::new("/out")));
        assert!(container.command.contains("--lambda-dir /asset-output"));
    }

    #[test]
    fn container_platform_tag_forces_container() {
        let probe = ToolProbe::with_probe(|| ToolAvailability::Available);
        let mut p = props(false);
        p.platform = TargetPlatform::Container;
        let bundling = Bundling::new(p, &probe).unwrap();
        assert_eq!(bundling.strategy(), BundlingStrategy::RunInContainer);
    }

    #[test]
    fn strategy_is_fixed_at_construction() {
        let probe = ToolProbe::with_probe(|| ToolAvailability::Available);
        let bundling = Bundling::new(props(false), &probe).unwrap();
        probe.reset();
        assert_eq!(bundling.strategy(), BundlingStrategy::RunOnHost);
    }

    #[test]
    fn staging_dir_is_a_sibling() {
        let staging = sibling_dir(Path::new("/tmp/bundles/handler"), "staging").unwrap();
        assert_eq!(staging.parent(), Some(Path::new("/tmp/bundles")));
        assert!(
            staging
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("handler.staging-")
        );
    }

    #[test]
    fn root_output_directory_is_rejected() {
        assert!(matches!(
            sibling_dir(Path::new("/"), "staging"),
            Err(BundleError::Configuration { .. })
        ));
    }

    #[test]
    fn plan_accessors_agree_with_variants() {
        let mut p = props(false);
        p.environment.insert("CARGO_TERM_COLOR", "always");

        let available = ToolProbe::with_probe(|| ToolAvailability::Available);
        let host = Bundling::new(p.clone(), &available)
            .unwrap()
            .plan(Path::new("/out"))
            .unwrap();
        assert!(!host.is_container());
        assert!(host.command().starts_with("cd /proj && "));
        assert_eq!(host.environment().get("CARGO_TERM_COLOR"), Some("always"));

        let missing = ToolProbe::with_probe(|| ToolAvailability::Unavailable);
        let container = Bundling::new(p, &missing)
            .unwrap()
            .plan(Path::new("/out"))
            .unwrap();
        assert!(container.is_container());
        assert!(container.command().starts_with("cargo lambda build"));
        assert_eq!(container.environment(), host.environment());
    }

    #[test]
    fn publish_swaps_in_new_bundle_and_drops_previous() {
        let work = tempfile::TempDir::new().unwrap();
        let out = work.path().join("out");
        let staging = work.path().join("out.staging-test");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("bootstrap"), b"old").unwrap();
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("bootstrap"), b"new").unwrap();

        publish(&staging, &out).unwrap();

        assert_eq!(std::fs::read(out.join("bootstrap")).unwrap(), b"new");
        let names: Vec<_> = std::fs::read_dir(work.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out".to_string()]);
    }

    #[test]
    fn publish_refuses_to_replace_a_file() {
        let work = tempfile::TempDir::new().unwrap();
        let out = work.path().join("out");
        let staging = work.path().join("out.staging-test");
        std::fs::write(&out, b"not a directory").unwrap();
        std::fs::create_dir_all(&staging).unwrap();

        assert!(matches!(
            publish(&staging, &out),
            Err(BundleError::Configuration { .. })
        ));
        assert_eq!(std::fs::read(&out).unwrap(), b"not a directory");
    }
}
