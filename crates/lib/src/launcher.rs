//! Launcher script and build command line helpers.
//!
//! Projects build through a launcher script (`FBuild.bat` by convention) that
//! names the real build executable as its first quoted token. Project build
//! command lines invoke that script followed by the target name.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""(.*?)""#).expect("quoted token regex"));

static COMMAND_TARGET: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#""[^"]*\.(?:bat|cmd|exe|sh)"\s+(?:-\S+\s+)*([\w.][\w.\-]*)"#).expect("command target regex")
});

/// Flag asking the build executable for IDE-friendly diagnostics.
pub const FLAG_IDE: &str = "-ide";
/// Flag suppressing the progress bar.
pub const FLAG_NO_PROGRESS: &str = "-noprogress";
/// Flag enabling machine-readable monitor output.
pub const FLAG_MONITOR: &str = "-monitor";
/// Flag forcing a full rebuild.
pub const FLAG_CLEAN: &str = "-clean";
/// Flag naming the build-description file.
pub const FLAG_CONFIG: &str = "-config";

/// Token through which the launcher script forwards its own arguments.
const FORWARD_ARGS: &str = "%*";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LauncherError {
  #[error("launcher script {0} does not name a quoted executable")]
  NoExecutable(PathBuf),

  #[error("could not find a target name in build command line: {0}")]
  NoTarget(String),
}

/// The real build executable named by a launcher script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
  pub executable: PathBuf,
  /// Options the script passes in addition to its forwarded arguments.
  pub options: Vec<String>,
}

impl Launcher {
  /// Parse a launcher script.
  ///
  /// A relative executable path is resolved against `script_dir`.
  pub fn parse(script_path: &Path, script_text: &str, script_dir: &Path) -> Result<Self, LauncherError> {
    let raw = discover_executable(script_text).ok_or_else(|| LauncherError::NoExecutable(script_path.to_path_buf()))?;
    let options = launcher_options(script_text, raw);
    let executable = script_dir.join(raw);
    Ok(Self { executable, options })
  }
}

/// The first double-quoted token of a launcher script.
pub fn discover_executable(script_text: &str) -> Option<&str> {
  QUOTED.captures(script_text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Options of the launcher script, without the executable and the argument forward.
pub fn launcher_options(script_text: &str, executable: &str) -> Vec<String> {
  script_text
    .replace(&format!("\"{executable}\""), "")
    .replace(FORWARD_ARGS, "")
    .split_whitespace()
    .filter(|token| token.starts_with('-'))
    .map(str::to_string)
    .collect()
}

/// Whether a project build command line goes through the launcher.
pub fn uses_external_build(command_line: &str, marker: &str) -> bool {
  command_line.contains(marker)
}

/// The target name a project build command line asks the launcher to build.
pub fn target_from_command_line(command_line: &str) -> Result<String, LauncherError> {
  COMMAND_TARGET
    .captures(command_line)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_string())
    .ok_or_else(|| LauncherError::NoTarget(command_line.to_string()))
}

/// Arguments for compiling the single-file target from the transient config.
pub fn single_file_args(target: &str, transient_config: &Path) -> Vec<String> {
  vec![
    target.to_string(),
    FLAG_IDE.to_string(),
    FLAG_NO_PROGRESS.to_string(),
    FLAG_CONFIG.to_string(),
    transient_config.display().to_string(),
  ]
}

/// Arguments for building several targets from the solution config.
pub fn multi_target_args(options: &[String], targets: &[String], clean: bool, solution_config: &Path) -> Vec<String> {
  let mut args: Vec<String> = options.to_vec();
  if clean {
    args.push(FLAG_CLEAN.to_string());
  }
  args.extend(targets.iter().cloned());
  args.push(FLAG_IDE.to_string());
  args.push(FLAG_MONITOR.to_string());
  args.push(FLAG_CONFIG.to_string());
  args.push(solution_config.display().to_string());
  args
}
