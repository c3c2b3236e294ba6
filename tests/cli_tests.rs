//! Command line contract: plan dump, argument errors and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bundler() -> Command {
    let mut cmd = Command::cargo_bin("lambda_rust_bundler").unwrap();
    cmd.env_remove("LAMBDA_BUNDLER_FORCE_CONTAINER")
        .env_remove("LAMBDA_BUNDLER_IMAGE");
    cmd
}

#[test]
fn plan_only_prints_container_plan_with_triple() {
    let work = TempDir::new().unwrap();
    bundler()
        .current_dir(work.path())
        .arg(work.path())
        .args(["--out-dir", "out", "--force-container", "--architecture", "arm64"])
        .args(["--bin", "handler", "--plan-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""mode": "container""#))
        .stdout(predicate::str::contains("aarch64-unknown-linux-gnu"))
        .stdout(predicate::str::contains("--lambda-dir /asset-output"))
        .stdout(predicate::str::contains("ghcr.io/cargo-lambda/cargo-lambda"));
}

#[test]
fn force_container_can_come_from_environment() {
    let work = TempDir::new().unwrap();
    bundler()
        .current_dir(work.path())
        .env("LAMBDA_BUNDLER_FORCE_CONTAINER", "true")
        .env("LAMBDA_BUNDLER_IMAGE", "registry.example.com/rust-lambda:1")
        .arg(work.path())
        .args(["--out-dir", "out", "--plan-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""mode": "container""#))
        .stdout(predicate::str::contains("registry.example.com/rust-lambda:1"));
}

#[test]
fn unsupported_platform_fails_with_exit_code_one() {
    let work = TempDir::new().unwrap();
    bundler()
        .current_dir(work.path())
        .arg(work.path())
        .args(["--out-dir", "out", "--platform", "solaris", "--plan-only"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported target platform 'solaris'"))
        .stderr(predicate::str::contains("Recovery suggestions"));
}

#[test]
fn malformed_target_triple_fails_before_building() {
    let work = TempDir::new().unwrap();
    bundler()
        .current_dir(work.path())
        .arg(work.path())
        .args(["--out-dir", "out", "--target", "aarch64 linux", "--force-container"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Malformed target triple"));
    assert!(!work.path().join("out").exists());
}

#[test]
fn out_dir_is_required() {
    bundler()
        .arg(".")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out-dir"));
}
