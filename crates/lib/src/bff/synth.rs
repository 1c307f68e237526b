//! Transient config synthesis.
//!
//! The transient config is the solution document with every project include
//! stripped (except the global settings include), followed by the synthesized
//! single-file target. It is regenerated from scratch on every request, so the
//! external build only parses global settings plus one target.
//!
//! # Layout
//!
//! ```text
//! // Warning! ... generated header
//! <solution bff, project includes removed>
//! //=====...
//! // CompileSingleFile target
//! //=====...
//!
//! ObjectList( 'CompileSingleFile' ) { ... }
//! ```

use std::fs;
use std::io;
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::BuildDescription;
use super::rewrite::SynthesizedTarget;
use crate::consts::APP_NAME;
use crate::settings::Settings;

const RULE: &str = "//=================================================================================================================";

#[derive(Debug, Error)]
pub enum SynthesizeError {
  #[error("failed to write transient config {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A generated build-description file scoped to one single-file request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientConfig {
  pub path: PathBuf,
  pub content: String,
  /// Stale intermediate directory removed while synthesizing, if any.
  pub purged: Option<PathBuf>,
}

/// Drop every `#include` line except the global settings include.
pub fn filter_includes(text: &str, global_include: &str) -> String {
  text
    .lines()
    .filter(|line| !line.contains("#include") || line.contains(global_include))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Render the transient config content.
pub fn compose(solution: &BuildDescription, target: &SynthesizedTarget, settings: &Settings) -> String {
  let mut out = String::new();
  out.push_str(&format!("// Warning! This file was generated by {APP_NAME} for the\n"));
  out.push_str("// purpose of single file compilation. Any changes made here will be lost!\n");
  out.push_str("// Navigate to end of this file to see target for single file compilation.\n");
  out.push_str(&filter_includes(solution.text(), &settings.global_include));
  out.push('\n');
  out.push_str(RULE);
  out.push('\n');
  out.push_str(&format!("// {} target\n", target.name));
  out.push_str(RULE);
  out.push_str("\n\n");
  out.push_str(&target.text);
  out
}

/// Path of the transient config beside the solution document.
pub fn transient_path(solution: &BuildDescription, settings: &Settings) -> PathBuf {
  solution
    .path()
    .parent()
    .unwrap_or_else(|| Path::new("."))
    .join(&settings.transient_config)
}

/// Find the single-file intermediate directory declared by the target.
///
/// The directory is everything up to and including the channel segment of the
/// first intermediate path field, resolved against `project_dir`.
pub fn intermediate_dir(target_text: &str, project_dir: &Path, settings: &Settings) -> Option<PathBuf> {
  let pattern = format!("'(.*{}).*'", regex::escape(&settings.channel_segment()));
  let re = Regex::new(&pattern).ok()?;

  let relative = target_text
    .lines()
    .filter(|line| line.contains(&settings.intermediate_field))
    .find_map(|line| re.captures(line).map(|c| c[1].to_string()))?;

  let native = relative.replace(settings.path_separator(), MAIN_SEPARATOR_STR);
  Some(project_dir.join(native))
}

/// Remove stale single-file intermediates. Failures are logged and ignored.
pub fn purge_intermediate(target_text: &str, project_dir: &Path, settings: &Settings) -> Option<PathBuf> {
  let dir = intermediate_dir(target_text, project_dir, settings)?;

  match fs::remove_dir_all(&dir) {
    Ok(()) => {
      info!(path = %dir.display(), "removed stale single file intermediates");
      Some(dir)
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      debug!(path = %dir.display(), "no stale single file intermediates");
      None
    }
    Err(e) => {
      warn!(path = %dir.display(), error = %e, "failed to remove single file intermediates");
      None
    }
  }
}

/// Write the transient config for `target` and purge its stale intermediates.
///
/// The file is overwritten unconditionally. Intermediate cleanup runs even if
/// the write fails and never affects the result.
pub fn synthesize(
  solution: &BuildDescription,
  target: &SynthesizedTarget,
  project_dir: &Path,
  settings: &Settings,
) -> Result<TransientConfig, SynthesizeError> {
  let path = transient_path(solution, settings);
  let content = compose(solution, target, settings);

  let written = fs::write(&path, &content);
  let purged = purge_intermediate(&target.text, project_dir, settings);

  written.map_err(|source| SynthesizeError::Write {
    path: path.clone(),
    source,
  })?;

  info!(path = %path.display(), bytes = content.len(), "wrote transient config");

  Ok(TransientConfig { path, content, purged })
}
