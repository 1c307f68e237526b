//! Implementation of the `fbt synth` command.
//!
//! Writes the transient single-file config for a source file and reports where
//! it went, without starting a build. Useful to inspect what a compile would run.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use super::load_engine;
use crate::output::{OutputFormat, print_info, print_json, print_success};

#[derive(Debug, Serialize)]
struct SynthReport {
  config: PathBuf,
  project: String,
  target: String,
  source_target: String,
  file: PathBuf,
  command: String,
  working_dir: PathBuf,
  purged: Option<PathBuf>,
}

/// Execute the synth command.
pub fn cmd_synth(manifest: &Path, file: &Path, configuration: &str, format: OutputFormat) -> Result<ExitCode> {
  let engine = load_engine(manifest)?;
  let prepared = engine
    .prepare_single_file(file, configuration)
    .with_context(|| format!("Failed to synthesize config for {}", file.display()))?;

  let report = SynthReport {
    config: prepared.config.path,
    project: prepared.project.name,
    target: prepared.target.name,
    source_target: prepared.target.source_name,
    file: prepared.target.input_file,
    command: prepared.command.to_string(),
    working_dir: prepared.command.working_dir,
    purged: prepared.config.purged,
  };

  if format.is_json() {
    print_json(&report)?;
  } else {
    print_success(&format!("Wrote {}", report.config.display()));
    print_info(&format!("Target: {} (from {})", report.target, report.source_target));
    print_info(&format!("Command: {}", report.command));
    if let Some(purged) = &report.purged {
      print_info(&format!("Removed stale intermediates: {}", purged.display()));
    }
  }

  Ok(ExitCode::SUCCESS)
}
