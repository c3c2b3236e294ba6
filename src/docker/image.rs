//! Build image resolution.

use crate::bundling::ImageSpec;
use crate::error::{BundleError, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Prefix of tags given to images built from a local context.
pub const BUILT_IMAGE_PREFIX: &str = "lambda-rust-bundler";

/// Quick daemon availability check shouldn't take long.
pub const DOCKER_INFO_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(target_os = "macos")]
const DOCKER_START_HELP: &str = "Start Docker Desktop from Applications or Spotlight";

#[cfg(target_os = "linux")]
const DOCKER_START_HELP: &str = "Start Docker daemon: sudo systemctl start docker";

#[cfg(target_os = "windows")]
const DOCKER_START_HELP: &str = "Start Docker Desktop from the Start menu";

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const DOCKER_START_HELP: &str = "Start the Docker daemon";

/// Checks that the container CLI is installed and its daemon responds.
pub fn check_docker_available(program: &str) -> Result<()> {
    let mut child = Command::new(program)
        .arg("info")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| BundleError::Spawn {
            command: format!("{} info", program),
            source: e,
        })?;

    match child.wait_timeout(DOCKER_INFO_TIMEOUT) {
        Ok(Some(status)) if status.success() => Ok(()),
        Ok(Some(status)) => Err(BundleError::ContainerRuntime {
            reason: format!(
                "{} daemon is not responding (exit code: {}). {}",
                program,
                status.code().unwrap_or(-1),
                DOCKER_START_HELP
            ),
        }),
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(BundleError::ContainerRuntime {
                reason: format!(
                    "{} info timed out after {} seconds. {}",
                    program,
                    DOCKER_INFO_TIMEOUT.as_secs(),
                    DOCKER_START_HELP
                ),
            })
        }
        Err(e) => Err(BundleError::ContainerRuntime {
            reason: format!("waiting for {} info failed: {}", program, e),
        }),
    }
}

/// Deterministic tag for an image built from `context`.
///
/// The same context directory always maps to the same tag, so rebuilding
/// reuses the layer cache instead of piling up untagged images.
pub fn image_tag_for_context(context: &Path) -> String {
    let id = uuid::Uuid::new_v5(
        &uuid::Uuid::NAMESPACE_URL,
        context.to_string_lossy().as_bytes(),
    );
    format!("{}-{}", BUILT_IMAGE_PREFIX, id.simple())
}

/// Arguments for `docker build`.
pub fn build_args(tag: &str, context: &Path, dockerfile: &str, spec: &ImageSpec) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "-t".to_string(),
        tag.to_string(),
        "-f".to_string(),
        context.join(dockerfile).to_string_lossy().into_owned(),
    ];
    if let ImageSpec::BuildContext { build_args, .. } = spec {
        for (key, value) in build_args.iter() {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
    }
    args.push(context.to_string_lossy().into_owned());
    args
}

/// Makes the image runnable and returns its reference.
///
/// Registry images are returned unchanged; `docker run` pulls them when
/// missing. Build contexts are built (layer cache permitting) every time.
pub fn ensure_image(program: &str, spec: &ImageSpec) -> Result<String> {
    let (context, dockerfile) = match spec {
        ImageSpec::Registry { reference } => return Ok(reference.clone()),
        ImageSpec::BuildContext {
            path, dockerfile, ..
        } => (path, dockerfile),
    };

    if !context.join(dockerfile).is_file() {
        return Err(BundleError::ContainerRuntime {
            reason: format!(
                "Dockerfile not found at {}",
                context.join(dockerfile).display()
            ),
        });
    }

    let tag = image_tag_for_context(context);
    let args = build_args(&tag, context, dockerfile, spec);
    log::info!("Building image {} from {}", tag, context.display());

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| BundleError::Spawn {
            command: format!("{} build", program),
            source: e,
        })?;

    if !output.status.success() {
        return Err(BundleError::ContainerRuntime {
            reason: format!(
                "image build failed with exit code {}:\n{}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(tag)
}
