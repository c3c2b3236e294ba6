//! Command line argument parsing and validation.

use crate::bundling::{
    Architecture, AssetHashType, BuildEnvironment, BuildOptions, BundlingProps, CommandHooks,
    DEFAULT_BUILD_IMAGE, ImageSpec, TargetPlatform, TargetTriple,
};
use crate::error::{BundleError, Result};
use clap::Parser;
use std::path::PathBuf;

/// Dockerfile looked up inside `--image-context`.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Build a Rust Lambda function with cargo-lambda, on the host or in a container
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lambda_rust_bundler",
    version,
    about = "Build a Rust Lambda function with cargo-lambda, on the host or in a container",
    long_about = "Build a Rust AWS Lambda function into a deployable directory.

cargo lambda is used directly when it is installed (version 1.0.0 or newer);
otherwise the build runs in a container image that has it.

Usage:
  lambda_rust_bundler functions/handler --out-dir cdk.out/handler
  lambda_rust_bundler . --out-dir out --architecture arm64 --bin api
  lambda_rust_bundler . --out-dir out --force-container --plan-only"
)]
pub struct Args {
    /// Crate directory containing Cargo.toml
    #[arg(index = 1, value_name = "ENTRY")]
    pub entry: PathBuf,

    /// Directory that receives the bundle
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Binary to build (cargo infers it when omitted)
    #[arg(long)]
    pub bin: Option<String>,

    /// Explicit target triple; overrides --architecture
    #[arg(long, value_name = "TRIPLE")]
    pub target: Option<String>,

    /// Lambda architecture
    #[arg(long, default_value = "x86_64", value_name = "ARCH")]
    pub architecture: Architecture,

    /// Platform tag for host builds: linux, macos, windows or container
    #[arg(long, value_name = "TAG")]
    pub platform: Option<String>,

    /// Always build in a container
    #[arg(long, env = "LAMBDA_BUNDLER_FORCE_CONTAINER")]
    pub force_container: bool,

    /// Registry image for container builds
    #[arg(
        long,
        env = "LAMBDA_BUNDLER_IMAGE",
        value_name = "IMAGE",
        conflicts_with = "image_context"
    )]
    pub image: Option<String>,

    /// Directory with a Dockerfile to build the container image from
    #[arg(long, value_name = "DIR")]
    pub image_context: Option<PathBuf>,

    /// Image build argument (KEY=VALUE), repeatable
    #[arg(long = "build-arg", value_name = "KEY=VALUE", requires = "image_context")]
    pub build_args: Vec<String>,

    /// Build environment variable (KEY=VALUE), repeatable
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Cargo features, comma separated or repeated
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Cargo build profile
    #[arg(long, default_value = "release")]
    pub profile: String,

    /// Build a Lambda extension instead of a function
    #[arg(long)]
    pub extension: bool,

    /// Extra flag passed to `cargo lambda build`, repeatable
    #[arg(long = "cargo-lambda-flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub cargo_lambda_flags: Vec<String>,

    /// Shell command run before the build, repeatable
    #[arg(long, value_name = "CMD")]
    pub before_bundling: Vec<String>,

    /// Shell command run after the build, repeatable
    #[arg(long, value_name = "CMD")]
    pub after_bundling: Vec<String>,

    /// Custom asset fingerprint instead of hashing the output
    #[arg(long, value_name = "FINGERPRINT")]
    pub asset_hash: Option<String>,

    /// Print the resolved execution plan as JSON and exit
    #[arg(long)]
    pub plan_only: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Target triple from `--target`, else from `--architecture`.
    pub fn target_triple(&self) -> Result<TargetTriple> {
        match &self.target {
            Some(triple) => TargetTriple::new(triple.as_str()),
            None => Ok(self.architecture.target_triple()),
        }
    }

    /// Platform from `--platform`, else the host OS.
    pub fn target_platform(&self) -> Result<TargetPlatform> {
        resolve_platform(
            self.platform.as_deref(),
            self.force_container,
            std::env::consts::OS,
        )
    }

    /// Build image from `--image` / `--image-context`.
    pub fn image_spec(&self) -> Result<ImageSpec> {
        if let Some(context) = &self.image_context {
            return Ok(ImageSpec::BuildContext {
                path: context.clone(),
                dockerfile: DEFAULT_DOCKERFILE.to_string(),
                build_args: BuildEnvironment::parse_pairs(
                    self.build_args.iter().map(String::as_str),
                )?,
            });
        }
        match self.image.as_deref().map(str::trim) {
            Some("") => Err(BundleError::configuration("--image must not be empty")),
            Some(reference) => Ok(ImageSpec::Registry {
                reference: reference.to_string(),
            }),
            None => Ok(ImageSpec::Registry {
                reference: DEFAULT_BUILD_IMAGE.to_string(),
            }),
        }
    }

    /// Converts the arguments into bundling configuration.
    ///
    /// Every malformed value is reported here, before anything is spawned.
    pub fn to_props(&self) -> Result<BundlingProps> {
        let platform = self.target_platform()?;
        let mut props = BundlingProps::with_platform(&self.entry, self.target_triple()?, platform);
        props.bin = self.bin.clone();
        props.force_container = self.force_container;
        props.environment = BuildEnvironment::parse_pairs(self.env.iter().map(String::as_str))?;
        props.image = self.image_spec()?;
        props.options = BuildOptions {
            profile: self.profile.clone(),
            features: self.features.clone(),
            extension: self.extension,
            cargo_lambda_flags: self.cargo_lambda_flags.clone(),
            hooks: CommandHooks {
                before_bundling: self.before_bundling.clone(),
                after_bundling: self.after_bundling.clone(),
            },
        };
        if let Some(fingerprint) = &self.asset_hash {
            props.asset_hash = AssetHashType::Custom(fingerprint.clone());
        }
        Ok(props)
    }
}

/// An explicit tag wins. Otherwise the host OS is used; when the container is
/// forced the host OS does not have to be a supported build platform.
fn resolve_platform(
    tag: Option<&str>,
    force_container: bool,
    host_os: &str,
) -> Result<TargetPlatform> {
    if let Some(tag) = tag {
        return TargetPlatform::from_tag(tag);
    }
    match TargetPlatform::from_tag(host_os) {
        Ok(platform) if platform != TargetPlatform::Container => Ok(platform),
        _ if force_container => Ok(TargetPlatform::Container),
        Ok(_) => Err(BundleError::configuration(
            "host operating system cannot be the container platform",
        )),
        Err(e) => Err(e),
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(quiet),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print progress message
    pub fn progress_println(&self, message: &str) {
        let _ = self.output.progress(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.quiet)
    }
}
