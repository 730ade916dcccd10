//! Ledger cluster start and stop through operator-supplied shell commands.

use std::path::Path;
use std::process::{Command, ExitStatus};
use std::time::Duration;

use rwfuzz_explore::targets;

use crate::config::ClusterConfig;

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("cannot run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
}

#[derive(Debug, Clone)]
pub struct ClusterControl {
    config: ClusterConfig,
}

impl ClusterControl {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Run the start command. `Ok(false)` when none is configured.
    pub fn start(&self) -> Result<bool, ClusterError> {
        self.run(self.config.start_command.as_deref(), "start")
    }

    /// Run the stop command. `Ok(false)` when none is configured.
    pub fn stop(&self) -> Result<bool, ClusterError> {
        self.run(self.config.stop_command.as_deref(), "stop")
    }

    /// Stop, logging instead of returning a failure.
    pub fn stop_logged(&self) {
        if let Err(err) = self.stop() {
            tracing::warn!(target: targets::EXECUTION, error = %err, "cluster stop failed");
        }
    }

    /// Pause so a fresh cluster or deploy can settle.
    pub fn settle(&self) {
        std::thread::sleep(Duration::from_secs(self.config.settle_secs));
    }

    fn run(&self, command: Option<&str>, action: &str) -> Result<bool, ClusterError> {
        let Some(command) = command else {
            return Ok(false);
        };
        tracing::info!(target: targets::EXECUTION, action, command, "running cluster command");
        run_shell(command, self.config.working_dir.as_deref())?;
        Ok(true)
    }
}

fn run_shell(command: &str, dir: Option<&Path>) -> Result<(), ClusterError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let status = cmd.status().map_err(|source| ClusterError::Spawn {
        command: command.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(ClusterError::Failed {
            command: command.to_string(),
            status,
        });
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn control(start: Option<&str>, stop: Option<&str>, dir: Option<&Path>) -> ClusterControl {
        ClusterControl::new(ClusterConfig {
            start_command: start.map(str::to_string),
            stop_command: stop.map(str::to_string),
            working_dir: dir.map(Path::to_path_buf),
            settle_secs: 0,
        })
    }

    #[test]
    fn test_unconfigured_commands_are_skipped() {
        let control = control(None, None, None);
        assert!(!control.start().unwrap());
        assert!(!control.stop().unwrap());
    }

    #[test]
    fn test_commands_run_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let control = control(Some("touch started"), Some("test -f started"), Some(dir.path()));
        assert!(control.start().unwrap());
        assert!(dir.path().join("started").exists());
        assert!(control.stop().unwrap());
    }

    #[test]
    fn test_failing_command_reports_status() {
        let control = control(Some("exit 3"), None, None);
        match control.start() {
            Err(ClusterError::Failed { status, .. }) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
