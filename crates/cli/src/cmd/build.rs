//! Implementation of the `fbt build` command.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};

use fbtools_lib::engine::Outcome;
use fbtools_lib::host::ProjectMetadata;
use fbtools_lib::process::OutputSink;

use super::fallback::run_default_build;
use super::{exit_code, load_engine, wait_for_build};
use crate::output::{print_build_result, print_warning};
use crate::sink::ConsoleSink;

/// Execute the build command.
///
/// Builds every selected project in one external build invocation. Selections
/// the engine cannot handle, including a single project, are built one project
/// at a time with their own build commands, stopping at the first failure.
pub fn cmd_build(manifest: &Path, projects: &[String], configuration: &str, clean: bool) -> Result<ExitCode> {
  let engine = load_engine(manifest)?;
  let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    let started = Instant::now();

    match engine.build_selection(projects, configuration, clean, sink.clone()) {
      Outcome::Started(handle) => {
        let state = wait_for_build(&engine, handle, sink.as_ref()).await;
        print_build_result(state, started.elapsed());
        Ok(exit_code(state))
      }
      Outcome::Completed { state, .. } => Ok(exit_code(state)),
      Outcome::Busy(channel) => bail!("A {channel} build is already running"),
      Outcome::Fallback(reason) => {
        print_warning(&format!("Selection build unavailable: {reason}"));
        for name in projects {
          let project = engine
            .host()
            .project(name, configuration)
            .with_context(|| format!("No default build for {name}"))?;
          if !run_default_build(&project).await?.success() {
            return Ok(ExitCode::FAILURE);
          }
        }
        Ok(ExitCode::SUCCESS)
      }
    }
  })
}
