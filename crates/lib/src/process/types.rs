//! Types for build process control.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A logical build surface. Each channel runs at most one process at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
  /// Single-file compilation through the transient config.
  SingleFile,
  /// Build of a multi-project selection.
  Selection,
  /// Build of the startup project ahead of a debug session.
  Startup,
}

impl Channel {
  pub const ALL: [Channel; 3] = [Channel::SingleFile, Channel::Selection, Channel::Startup];

  pub fn as_str(self) -> &'static str {
    match self {
      Channel::SingleFile => "single-file",
      Channel::Selection => "selection",
      Channel::Startup => "startup",
    }
  }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Lifecycle state of a build process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
  NotStarted,
  Running,
  /// The process exited on its own. `code` is `None` if it was ended by a signal.
  Exited { code: Option<i32> },
  /// The process was killed on request.
  Killed,
}

impl ProcessState {
  pub fn is_running(self) -> bool {
    matches!(self, ProcessState::Running)
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, ProcessState::Exited { .. } | ProcessState::Killed)
  }

  /// True only for a clean zero exit.
  pub fn is_success(self) -> bool {
    matches!(self, ProcessState::Exited { code: Some(0) })
  }
}

impl fmt::Display for ProcessState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ProcessState::NotStarted => f.write_str("not started"),
      ProcessState::Running => f.write_str("running"),
      ProcessState::Exited { code: Some(code) } => write!(f, "exited with code {code}"),
      ProcessState::Exited { code: None } => f.write_str("exited by signal"),
      ProcessState::Killed => f.write_str("killed"),
    }
  }
}

/// What to run for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub working_dir: PathBuf,
}

impl BuildCommand {
  pub fn new(program: impl Into<PathBuf>, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args,
      working_dir: working_dir.into(),
    }
  }
}

impl fmt::Display for BuildCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program.display())?;
    for arg in &self.args {
      write!(f, " {arg}")?;
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum ProcessError {
  /// Single-flight violation: the channel already has a live process.
  #[error("a {0} build is already running")]
  AlreadyRunning(Channel),

  #[error("failed to start {program}: {source}")]
  Launch {
    program: PathBuf,
    #[source]
    source: io::Error,
  },
}
