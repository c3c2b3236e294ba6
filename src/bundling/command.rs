//! `cargo lambda build` command construction.
//!
//! Produces one shell command string per build. The string is never split into
//! an argument vector here: host shells disagree on quoting and separators, so
//! the platform decides how each argument is quoted and how the command is
//! prefixed, and the executor hands the whole string to that platform's shell.

use crate::error::{BundleError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Tag for the containerized build platform.
pub const CONTAINER_PLATFORM_TAG: &str = "container";

/// Compiler wrapper passed to every build so host and container builds
/// cross-compile the same way.
pub const PARITY_COMPILER: &str = "cargo-zigbuild";

/// Where a build command is going to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    /// Linux host
    Linux,
    /// macOS host
    MacOs,
    /// Windows host (`cmd.exe` conventions)
    Windows,
    /// Inside the build container
    Container,
}

impl TargetPlatform {
    /// Parses a platform tag.
    ///
    /// Host tags are the values of `std::env::consts::OS` (`linux`, `macos`,
    /// `windows`); [`CONTAINER_PLATFORM_TAG`] selects the container.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "linux" => Ok(TargetPlatform::Linux),
            "macos" => Ok(TargetPlatform::MacOs),
            "windows" => Ok(TargetPlatform::Windows),
            CONTAINER_PLATFORM_TAG => Ok(TargetPlatform::Container),
            other => Err(BundleError::configuration(format!(
                "Unsupported target platform '{}' (expected linux, macos, windows or {})",
                other, CONTAINER_PLATFORM_TAG
            ))),
        }
    }

    /// The platform of the machine running this process.
    pub fn host() -> Result<Self> {
        match Self::from_tag(std::env::consts::OS)? {
            TargetPlatform::Container => Err(BundleError::configuration(
                "host operating system cannot be the container platform",
            )),
            platform => Ok(platform),
        }
    }

    /// The tag this platform parses from.
    pub fn tag(self) -> &'static str {
        match self {
            TargetPlatform::Linux => "linux",
            TargetPlatform::MacOs => "macos",
            TargetPlatform::Windows => "windows",
            TargetPlatform::Container => CONTAINER_PLATFORM_TAG,
        }
    }

    /// Shell program and flag that execute a command string on this platform.
    pub fn shell(self) -> ShellInvocation {
        match self {
            TargetPlatform::Windows => ShellInvocation::Cmd,
            TargetPlatform::Linux | TargetPlatform::MacOs | TargetPlatform::Container => {
                ShellInvocation::Bash
            }
        }
    }

    fn prefix(self, entry: &Path) -> Option<String> {
        let entry = entry.to_string_lossy();
        match self {
            TargetPlatform::Container => None,
            TargetPlatform::Windows => Some(format!("cd /d {} && ", quote_cmd(&entry))),
            TargetPlatform::Linux | TargetPlatform::MacOs => {
                Some(format!("cd {} && ", quote_posix(&entry)))
            }
        }
    }

    fn quote(self, arg: &str) -> String {
        match self {
            TargetPlatform::Windows => quote_cmd(arg),
            _ => quote_posix(arg),
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TargetPlatform {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s)
    }
}

/// Shell used to execute a command string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellInvocation {
    /// `bash -c <command>`
    Bash,
    /// `cmd /c <command>`, arguments passed verbatim
    Cmd,
}

impl ShellInvocation {
    /// Program name
    pub fn program(self) -> &'static str {
        match self {
            ShellInvocation::Bash => "bash",
            ShellInvocation::Cmd => "cmd",
        }
    }

    /// Flag that makes the program run the following command string
    pub fn flag(self) -> &'static str {
        match self {
            ShellInvocation::Bash => "-c",
            ShellInvocation::Cmd => "/c",
        }
    }

    /// Argument vector running `command` through this shell
    pub fn argv(self, command: &str) -> Vec<String> {
        vec![
            self.program().to_string(),
            self.flag().to_string(),
            command.to_string(),
        ]
    }
}

/// Lambda CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// x86_64 / amd64
    #[default]
    X86_64,
    /// Graviton (aarch64)
    Arm64,
}

impl Architecture {
    /// Linux GNU target triple for this architecture
    pub fn target_triple(self) -> TargetTriple {
        match self {
            Architecture::X86_64 => TargetTriple("x86_64-unknown-linux-gnu".to_string()),
            Architecture::Arm64 => TargetTriple("aarch64-unknown-linux-gnu".to_string()),
        }
    }
}

impl FromStr for Architecture {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x86_64" | "x86-64" | "amd64" => Ok(Architecture::X86_64),
            "arm64" | "aarch64" => Ok(Architecture::Arm64),
            other => Err(BundleError::configuration(format!(
                "Unsupported architecture '{}' (expected x86_64 or arm64)",
                other
            ))),
        }
    }
}

/// Validated compiler target triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetTriple(String);

impl TargetTriple {
    /// Validates a triple: non-empty, no whitespace or quotes, at least three `-` segments.
    pub fn new(triple: impl Into<String>) -> Result<Self> {
        let triple = triple.into();
        let well_formed = !triple.is_empty()
            && !triple
                .chars()
                .any(|c| c.is_whitespace() || c == '\'' || c == '"')
            && triple.split('-').count() >= 3
            && triple.split('-').all(|segment| !segment.is_empty());

        if well_formed {
            Ok(TargetTriple(triple))
        } else {
            Err(BundleError::configuration(format!(
                "Malformed target triple '{}' (expected something like aarch64-unknown-linux-gnu)",
                triple
            )))
        }
    }

    /// The triple as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetTriple {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Parameters of a single build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Crate directory (containing Cargo.toml). Not checked for existence.
    pub entry: PathBuf,
    /// Binary to build; cargo infers it from the manifest when absent
    pub bin: Option<String>,
    /// Compilation target
    pub target: TargetTriple,
    /// Directory that receives the built artifacts
    pub out_dir: PathBuf,
    /// Where the command will run
    pub platform: TargetPlatform,
}

/// Shell snippets chained around the build command with `&&`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandHooks {
    /// Run before `cargo lambda build`
    pub before_bundling: Vec<String>,
    /// Run after a successful build
    pub after_bundling: Vec<String>,
}

/// Build settings shared by every request of a bundling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Cargo profile; `release` maps to `--release`
    pub profile: String,
    /// Cargo features to enable
    pub features: Vec<String>,
    /// Build a Lambda extension instead of a function
    pub extension: bool,
    /// Extra flags appended verbatim to `cargo lambda build`
    pub cargo_lambda_flags: Vec<String>,
    /// Commands run before and after the build
    pub hooks: CommandHooks,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            profile: "release".to_string(),
            features: Vec::new(),
            extension: false,
            cargo_lambda_flags: Vec::new(),
            hooks: CommandHooks::default(),
        }
    }
}

/// Builds the shell command string for `request`.
///
/// The result contains the target triple and the output directory exactly once
/// each (hooks aside). Host platforms get a `cd` into the entry directory;
/// the container platform gets no prefix because the container's working
/// directory already is the mounted entry.
pub fn build_command(request: &BuildRequest, options: &BuildOptions) -> Result<String> {
    let platform = request.platform;

    if let Some(bin) = &request.bin
        && bin.trim().is_empty()
    {
        return Err(BundleError::configuration("binary name must not be empty"));
    }

    let mut args: Vec<String> = vec!["cargo".into(), "lambda".into(), "build".into()];

    if options.profile == "release" {
        args.push("--release".into());
    } else {
        args.push("--profile".into());
        args.push(platform.quote(&options.profile));
    }

    args.push("--target".into());
    args.push(platform.quote(request.target.as_str()));

    args.push("--lambda-dir".into());
    args.push(platform.quote(&request.out_dir.to_string_lossy()));

    if let Some(bin) = &request.bin {
        let bin = platform.quote(bin);
        args.push("--bin".into());
        args.push(bin.clone());
        args.push("--flatten".into());
        args.push(bin);
    }

    if options.extension {
        args.push("--extension".into());
    }

    if !options.features.is_empty() {
        args.push("--features".into());
        args.push(platform.quote(&options.features.join(",")));
    }

    args.push("--compiler".into());
    args.push(PARITY_COMPILER.into());

    args.extend(options.cargo_lambda_flags.iter().cloned());

    let build = args.join(" ");

    let chained = options
        .hooks
        .before_bundling
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(build.as_str()))
        .chain(options.hooks.after_bundling.iter().map(String::as_str))
        .filter(|step| !step.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" && ");

    let command = match platform.prefix(&request.entry) {
        Some(prefix) => format!("{}{}", prefix, chained),
        None => chained,
    };

    log::debug!("Bundling command for {}: {}", platform, command);
    Ok(command)
}

/// Quotes an argument for `bash -c` when it contains shell metacharacters.
fn quote_posix(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Quotes an argument for `cmd /c`. cmd has no escape for `"` inside quotes,
/// so embedded quotes are doubled.
fn quote_cmd(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || r"-_./\=:,+@".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(platform: TargetPlatform) -> BuildRequest {
        BuildRequest {
            entry: PathBuf::from("/proj"),
            bin: Some("handler".to_string()),
            target: TargetTriple::new("aarch64-unknown-linux-gnu").unwrap(),
            out_dir: PathBuf::from("/out"),
            platform,
        }
    }

    #[test]
    fn linux_command_contains_triple_out_dir_and_binary() {
        let cmd = build_command(&request(TargetPlatform::Linux), &BuildOptions::default()).unwrap();
        assert_eq!(
            cmd,
            "cd /proj && cargo lambda build --release --target aarch64-unknown-linux-gnu \
             --lambda-dir /out --bin handler --flatten handler --compiler cargo-zigbuild"
        );
    }

    #[test]
    fn container_command_has_no_prefix() {
        let cmd =
            build_command(&request(TargetPlatform::Container), &BuildOptions::default()).unwrap();
        assert!(cmd.starts_with("cargo lambda build"));
        assert!(!cmd.contains("cd "));
    }

    #[test]
    fn windows_command_uses_cmd_conventions() {
        let mut req = request(TargetPlatform::Windows);
        req.entry = PathBuf::from(r"C:\Users\dev\my fn");
        req.out_dir = PathBuf::from(r"C:\out");
        let cmd = build_command(&req, &BuildOptions::default()).unwrap();
        assert!(cmd.starts_with(r#"cd /d "C:\Users\dev\my fn" && cargo lambda build"#));
        assert!(cmd.contains(r"--lambda-dir C:\out "));
    }

    #[test]
    fn posix_paths_with_spaces_are_single_quoted() {
        let mut req = request(TargetPlatform::MacOs);
        req.entry = PathBuf::from("/Users/dev/it's here");
        let cmd = build_command(&req, &BuildOptions::default()).unwrap();
        assert!(cmd.starts_with(r"cd '/Users/dev/it'\''s here' && "));
    }

    #[test]
    fn triple_and_out_dir_appear_exactly_once_on_every_platform() {
        for platform in [
            TargetPlatform::Linux,
            TargetPlatform::MacOs,
            TargetPlatform::Windows,
            TargetPlatform::Container,
        ] {
            let cmd = build_command(&request(platform), &BuildOptions::default()).unwrap();
            assert_eq!(cmd.matches("aarch64-unknown-linux-gnu").count(), 1, "{}", cmd);
            assert_eq!(cmd.matches("/out").count(), 1, "{}", cmd);
        }
    }

    #[test]
    fn omitted_binary_leaves_inference_to_cargo() {
        let mut req = request(TargetPlatform::Container);
        req.bin = None;
        let cmd = build_command(&req, &BuildOptions::default()).unwrap();
        assert!(!cmd.contains("--bin"));
        assert!(!cmd.contains("--flatten"));
    }

    #[test]
    fn empty_binary_name_is_rejected() {
        let mut req = request(TargetPlatform::Container);
        req.bin = Some("  ".to_string());
        assert!(matches!(
            build_command(&req, &BuildOptions::default()),
            Err(BundleError::Configuration { .. })
        ));
    }

    #[test]
    fn options_add_profile_features_extension_and_flags() {
        let options = BuildOptions {
            profile: "lambda".to_string(),
            features: vec!["tracing".to_string(), "json".to_string()],
            extension: true,
            cargo_lambda_flags: vec!["--locked".to_string()],
            hooks: CommandHooks::default(),
        };
        let cmd = build_command(&request(TargetPlatform::Container), &options).unwrap();
        assert!(cmd.contains("--profile lambda"));
        assert!(!cmd.contains("--release"));
        assert!(cmd.contains("--features tracing,json"));
        assert!(cmd.contains("--extension"));
        assert!(cmd.ends_with("--compiler cargo-zigbuild --locked"));
    }

    #[test]
    fn hooks_are_chained_around_the_build() {
        let options = BuildOptions {
            hooks: CommandHooks {
                before_bundling: vec!["echo before".to_string()],
                after_bundling: vec!["echo after".to_string(), "  ".to_string()],
            },
            ..BuildOptions::default()
        };
        let cmd = build_command(&request(TargetPlatform::Linux), &options).unwrap();
        assert!(cmd.starts_with("cd /proj && echo before && cargo lambda build"));
        assert!(cmd.ends_with("--compiler cargo-zigbuild && echo after"));
    }

    #[test]
    fn unsupported_platform_tag_is_a_configuration_error() {
        let err = TargetPlatform::from_tag("solaris").unwrap_err();
        assert!(matches!(err, BundleError::Configuration { .. }));
        assert!(err.to_string().contains("solaris"));
    }

    #[test]
    fn platform_tags_round_trip() {
        for tag in ["linux", "macos", "windows", "container"] {
            assert_eq!(TargetPlatform::from_tag(tag).unwrap().tag(), tag);
        }
    }

    #[test]
    fn architecture_maps_to_linux_triples() {
        assert_eq!(
            "arm64".parse::<Architecture>().unwrap().target_triple().as_str(),
            "aarch64-unknown-linux-gnu"
        );
        assert_eq!(
            "amd64".parse::<Architecture>().unwrap().target_triple().as_str(),
            "x86_64-unknown-linux-gnu"
        );
        assert!("sparc".parse::<Architecture>().is_err());
    }

    #[test]
    fn malformed_triples_are_rejected() {
        assert!(TargetTriple::new("").is_err());
        assert!(TargetTriple::new("aarch64").is_err());
        assert!(TargetTriple::new("x86_64--linux").is_err());
        assert!(TargetTriple::new("x86_64-unknown-linux-gnu; rm -rf /").is_err());
        assert!(TargetTriple::new("aarch64-apple-darwin").is_ok());
    }

    #[test]
    fn shell_invocations() {
        assert_eq!(TargetPlatform::Windows.shell().argv("x"), vec!["cmd", "/c", "x"]);
        assert_eq!(TargetPlatform::Container.shell().argv("x"), vec!["bash", "-c", "x"]);
    }
}
