//! Native (host) build execution.

use super::command::ShellInvocation;
use super::plan::HostPlan;
use crate::error::{BundleError, Result};
use std::io::{BufRead, BufReader, Write};
use std::process::{Command, ExitStatus, Stdio};

/// Runs a host plan to completion.
///
/// Blocks until the shell exits; there is no timeout. Standard output is
/// inherited. Standard error is echoed to this process's standard error as it
/// arrives and also kept for the error value. A nonzero exit becomes
/// [`BundleError::BuildFailure`]. On success the artifacts are expected in the
/// output directory named by the command.
pub fn run_on_host(plan: &HostPlan) -> Result<()> {
    let mut cmd = shell_command(plan.shell, &plan.command);
    cmd.current_dir(&plan.working_dir).envs(plan.environment.iter());

    log::info!(
        "Running on host in {}: {}",
        plan.working_dir.display(),
        plan.command
    );

    let (status, stderr) = run_streaming(&mut cmd, plan.shell.program())?;

    if !status.success() {
        return Err(BundleError::BuildFailure {
            command: plan.command.clone(),
            status: status.code(),
            stderr,
        });
    }

    Ok(())
}

/// Spawns `cmd` with stdin closed and stdout inherited, forwarding stderr line
/// by line while it runs. Returns the exit status and the collected stderr.
pub(crate) fn run_streaming(cmd: &mut Command, program: &str) -> Result<(ExitStatus, String)> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BundleError::Spawn {
            command: program.to_string(),
            source: e,
        })?;

    let mut captured = String::new();
    if let Some(stderr) = child.stderr.take() {
        let mut terminal = std::io::stderr();
        for line in BufReader::new(stderr).split(b'\n') {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::debug!("Stopped reading stderr of {}: {}", program, e);
                    break;
                }
            };
            // Forwarding is best effort; a closed stderr must not mask the build result.
            let _ = terminal.write_all(&line);
            let _ = terminal.write_all(b"\n");
            captured.push_str(&String::from_utf8_lossy(&line));
            captured.push('\n');
        }
    }

    let status = child.wait().map_err(|e| BundleError::Spawn {
        command: program.to_string(),
        source: e,
    })?;
    Ok((status, captured))
}

fn shell_command(shell: ShellInvocation, command: &str) -> Command {
    let mut cmd = Command::new(shell.program());
    cmd.arg(shell.flag());

    // cmd.exe does its own parsing; quoting the string again would break it.
    #[cfg(windows)]
    {
        if shell == ShellInvocation::Cmd {
            use std::os::windows::process::CommandExt;
            cmd.raw_arg(command);
            return cmd;
        }
    }

    cmd.arg(command);
    cmd
}
