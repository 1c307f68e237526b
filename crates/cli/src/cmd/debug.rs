//! Implementation of the `fbt debug` command.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tokio::sync::oneshot;

use fbtools_lib::engine::Outcome;
use fbtools_lib::host::{ProjectInfo, ProjectMetadata};
use fbtools_lib::lifecycle::FollowUp;
use fbtools_lib::process::OutputSink;

use super::fallback::{run_default_build, run_shell};
use super::{load_engine, until_done};
use crate::output::{print_build_result, print_info, print_warning};
use crate::sink::ConsoleSink;

/// Execute the debug command.
///
/// Builds `project` and, only if the build succeeds, runs its configured
/// debugger command. The debugger is queued as a follow-up of the build, so
/// a failed or cancelled build never starts it.
pub fn cmd_debug(manifest: &Path, project: &str, configuration: &str) -> Result<ExitCode> {
  let engine = load_engine(manifest)?;
  let info = engine
    .host()
    .project(project, configuration)
    .with_context(|| format!("Cannot debug {project}"))?;
  let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async {
    let started = Instant::now();
    let (launch_tx, mut launch_rx) = oneshot::channel();
    let follow_up = FollowUp::new(format!("debug {project}"), move || {
      let _ = launch_tx.send(());
    });

    let outcome = until_done(
      &engine,
      sink.as_ref(),
      engine.debug_startup(project, configuration, follow_up, sink.clone()),
    )
    .await;

    match outcome {
      Outcome::Completed { state, .. } => {
        print_build_result(state, started.elapsed());
        if launch_rx.try_recv().is_ok() {
          launch_debugger(&info).await
        } else {
          Ok(ExitCode::FAILURE)
        }
      }
      Outcome::Started(_) => bail!("Startup build did not wait for completion"),
      Outcome::Busy(channel) => bail!("A {channel} build is already running"),
      Outcome::Fallback(reason) => {
        print_warning(&format!("Startup build unavailable: {reason}"));
        if run_default_build(&info).await?.success() {
          launch_debugger(&info).await
        } else {
          Ok(ExitCode::FAILURE)
        }
      }
    }
  })
}

async fn launch_debugger(project: &ProjectInfo) -> Result<ExitCode> {
  let Some(debugger) = project.debugger.as_deref() else {
    print_warning(&format!("No debugger configured for {}", project.name));
    return Ok(ExitCode::SUCCESS);
  };

  print_info(&format!("Starting debugger: {debugger}"));
  let status = run_shell(debugger, &project.dir).await?;
  Ok(if status.success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
