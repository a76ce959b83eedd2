//! External commands (report generator, formatter)
//!
//! Commands inherit the driver's environment and standard streams, so
//! their output interleaves with the driver's own.
//!
//! Command lines are split on whitespace and run without a shell: no
//! quoting, globbing or pipes.

use std::path::Path;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Error, Result, SubprocessError};

/// Run a whitespace-separated command line in `cwd` and wait for it.
///
/// When `shutdown` fires the child gets SIGTERM (a plain kill off unix)
/// and is waited for; the run then fails as interrupted. Nothing is
/// spawned once shutdown has been requested.
pub async fn run_command(
    command_line: &str,
    cwd: &Path,
    shutdown: &CancellationToken,
) -> Result<()> {
    let mut parts = command_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| ConfigError::Invalid("empty command".to_string()))?;

    let interrupted = || SubprocessError::Interrupted {
        command: command_line.to_string(),
    };

    if shutdown.is_cancelled() {
        return Err(interrupted().into());
    }

    debug!("Running `{}` in {}", command_line, cwd.display());

    let mut child = Command::new(program)
        .args(parts)
        .current_dir(cwd)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| SubprocessError::Spawn {
            command: command_line.to_string(),
            source,
        })?;

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| Error::io(program, e))?,
        _ = shutdown.cancelled() => {
            info!("Stopping `{}`...", command_line);
            terminate(&mut child);
            child.wait().await.map_err(|e| Error::io(program, e))?;
            return Err(interrupted().into());
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(SubprocessError::Exited {
            command: command_line.to_string(),
            code: status.code(),
        }
        .into())
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // No pid means it already exited
    let Some(pid) = child.id() else {
        return;
    };

    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("Failed to signal process {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to stop child process: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::error::ErrorKind;

    async fn run(command_line: &str, cwd: &Path) -> Result<()> {
        run_command(command_line, cwd, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_success() {
        let dir = tempfile::tempdir().unwrap();
        run("true", dir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_runs_in_cwd_with_args() {
        let dir = tempfile::tempdir().unwrap();
        run("touch marker", dir.path()).await.unwrap();
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("false", dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Subprocess);
        assert!(matches!(
            err,
            Error::Subprocess(SubprocessError::Exited { code: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("definitely-not-a-real-program-xyz", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Subprocess(SubprocessError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = run("  ", dir.path()).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_terminates_running_child() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = run_command("sleep 30", dir.path(), &shutdown)
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(10), "took {:?}", start.elapsed());
        assert!(matches!(
            err,
            Error::Subprocess(SubprocessError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_nothing_spawned_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = run_command("touch marker", dir.path(), &shutdown)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Subprocess(SubprocessError::Interrupted { .. })
        ));
        assert!(!dir.path().join("marker").exists());
    }
}
