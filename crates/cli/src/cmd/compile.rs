//! Implementation of the `fbt compile` command.

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

/// Execute the compile command.
///
/// Compiles `file` through the single-file target synthesized from its
/// project's target. If the project cannot be handled, the project's own build
/// runs instead.
pub fn cmd_compile(manifest: &Path, file: &Path, configuration: &str) -> Result<ExitCode> {
  let engine = load_engine(manifest)?;
  let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    let started = Instant::now();

    match engine.compile_single_file(file, configuration, sink.clone()) {
      Outcome::Started(handle) => {
        let state = wait_for_build(&engine, handle, sink.as_ref()).await;
        print_build_result(state, started.elapsed());
        Ok(exit_code(state))
      }
      Outcome::Completed { state, .. } => Ok(exit_code(state)),
      Outcome::Busy(channel) => bail!("A {channel} build is already running"),
      Outcome::Fallback(reason) => {
        print_warning(&format!("Single file compile unavailable: {reason}"));
        let project = engine
          .host()
          .project_for_file(file, configuration)
          .with_context(|| format!("No default build for {}", file.display()))?;
        let status = run_default_build(&project).await?;
        Ok(if status.success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
      }
    }
  })
}
