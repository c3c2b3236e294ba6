//! RAII guard for container cleanup.

use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// How long `docker rm -f` may take before it is killed.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Force-removes a named container when dropped.
///
/// `docker run --rm` already removes the container on a normal exit; the guard
/// covers panics and early returns between spawn and exit. Removing a container
/// that is already gone is harmless.
pub(super) struct ContainerGuard<'a> {
    pub(super) program: &'a str,
    pub(super) name: String,
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        let mut child = match Command::new(self.program)
            .args(["rm", "-f", &self.name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(_) => return,
        };

        match child.wait_timeout(CLEANUP_TIMEOUT) {
            Ok(Some(_)) => {}
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "Timed out cleaning up container '{}' after {} seconds. \
                     The container daemon may be down.",
                    self.name,
                    CLEANUP_TIMEOUT.as_secs()
                );
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}
