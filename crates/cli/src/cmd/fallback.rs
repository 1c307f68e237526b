//! Default build path, used when the engine cannot handle a request.
//!
//! Runs a project's own build command line through the platform shell, the
//! way the host would have run it.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

use fbtools_lib::host::ProjectInfo;

use crate::output::print_info;

/// Get the shell command and argument for the current platform.
///
/// The system shell is used rather than `$SHELL` so that user profiles are not
/// sourced.
fn get_shell() -> (String, Vec<String>) {
  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}

/// Run `command_line` through the shell in `working_dir`, with inherited stdio.
pub async fn run_shell(command_line: &str, working_dir: &Path) -> Result<ExitStatus> {
  let (shell, args) = get_shell();
  debug!(shell = %shell, command = %command_line, working_dir = %working_dir.display(), "running shell command");

  Command::new(&shell)
    .args(&args)
    .arg(command_line)
    .current_dir(working_dir)
    .status()
    .await
    .with_context(|| format!("Failed to run '{command_line}'"))
}

/// Build `project` with its own build command line.
pub async fn run_default_build(project: &ProjectInfo) -> Result<ExitStatus> {
  print_info(&format!("Running default build for {}", project.name));
  run_shell(&project.build_command, &project.dir).await
}
