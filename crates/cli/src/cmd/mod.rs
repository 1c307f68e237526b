mod build;
mod compile;
mod debug;
mod fallback;
mod synth;

pub use build::cmd_build;
pub use compile::cmd_compile;
pub use debug::cmd_debug;
pub use synth::cmd_synth;

use std::future::Future;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use fbtools_lib::engine::Engine;
use fbtools_lib::host::{Host, Manifest};
use fbtools_lib::process::{BuildHandle, OutputSink, ProcessState};

/// Load the manifest and build an engine around it.
fn load_engine(manifest: &Path) -> Result<Engine<Manifest>> {
  let manifest = Manifest::load(manifest).with_context(|| format!("Failed to load {}", manifest.display()))?;
  let settings = manifest.settings().clone();
  Ok(Engine::new(manifest, settings))
}

/// Drive `build` to its end. Ctrl-C cancels every running build and lets it finish.
async fn until_done<H, F>(engine: &Engine<H>, sink: &dyn OutputSink, build: F) -> F::Output
where
  H: Host,
  F: Future,
{
  tokio::pin!(build);
  tokio::select! {
    output = &mut build => output,
    _ = tokio::signal::ctrl_c() => {
      info!("interrupted, cancelling builds");
      engine.cancel_all(sink).await;
      build.await
    }
  }
}

/// Wait for a started build, honouring Ctrl-C.
async fn wait_for_build<H: Host>(engine: &Engine<H>, mut handle: BuildHandle, sink: &dyn OutputSink) -> ProcessState {
  until_done(engine, sink, handle.wait()).await
}

fn exit_code(state: ProcessState) -> ExitCode {
  if state.is_success() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  }
}
