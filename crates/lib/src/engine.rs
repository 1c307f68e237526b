//! The build engine.
//!
//! One [`Engine`] serves every request kind: single-file compiles, builds of a
//! project selection, and startup builds followed by a debug session. Each
//! request runs on its own [`Channel`], reports to the caller's sink and ends in
//! an [`Outcome`]. Failures never leave the caller empty-handed: they produce
//! [`Outcome::Fallback`] and the caller runs its default build instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{info, warn};

use crate::bff::{
  BuildDescription, LocateError, SynthesizeError, SynthesizedTarget, TargetKind, TransientConfig, locate, rewrite,
  synthesize,
};
use crate::host::{Host, HostError, ProjectInfo, SolutionInfo};
use crate::launcher::{Launcher, LauncherError, multi_target_args, single_file_args, target_from_command_line, uses_external_build};
use crate::lifecycle::{BuildLifecycle, BuildSignal, FollowUp, Phase};
use crate::process::{BuildCommand, BuildHandle, Channel, OutputSink, ProcessController, ProcessError, ProcessState};
use crate::settings::Settings;

/// Broad failure classes. Every class is handled the same way, by falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
  /// The request does not go through the external build.
  NotApplicable,
  Parse,
  Io,
  Launch,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("project '{project}' is not built through {marker}")]
  NotApplicable { project: String, marker: String },

  #[error("a selection build needs at least two projects, got {0}")]
  SelectionTooSmall(usize),

  #[error("no project of the selection is built through the launcher")]
  EmptySelection,

  #[error(transparent)]
  Host(#[from] HostError),

  #[error(transparent)]
  Launcher(#[from] LauncherError),

  #[error(transparent)]
  Locate(#[from] LocateError),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Synthesize(#[from] SynthesizeError),

  #[error(transparent)]
  Process(#[from] ProcessError),
}

impl EngineError {
  pub fn category(&self) -> FailureCategory {
    match self {
      EngineError::NotApplicable { .. } | EngineError::SelectionTooSmall(_) | EngineError::EmptySelection => {
        FailureCategory::NotApplicable
      }
      EngineError::Host(HostError::Read { .. }) => FailureCategory::Io,
      EngineError::Host(HostError::Parse { .. }) => FailureCategory::Parse,
      EngineError::Host(_) => FailureCategory::NotApplicable,
      EngineError::Launcher(LauncherError::NoExecutable(_)) => FailureCategory::Launch,
      EngineError::Launcher(LauncherError::NoTarget(_)) => FailureCategory::Parse,
      EngineError::Locate(_) => FailureCategory::Parse,
      EngineError::Read { .. } | EngineError::Synthesize(_) => FailureCategory::Io,
      EngineError::Process(_) => FailureCategory::Launch,
    }
  }
}

/// How a request ended, from the caller's point of view.
#[derive(Debug)]
pub enum Outcome {
  /// The build is running; await the handle to observe its end.
  Started(BuildHandle),
  /// The build ran to its end.
  Completed { state: ProcessState, follow_up_fired: bool },
  /// The channel already has a live build. Nothing was started.
  Busy(Channel),
  /// The request failed and the caller should run its default build.
  Fallback(EngineError),
}

/// Everything needed to run one single-file compile.
#[derive(Debug, Clone)]
pub struct PreparedCompile {
  pub project: ProjectInfo,
  pub target: SynthesizedTarget,
  pub config: TransientConfig,
  pub command: BuildCommand,
}

fn read_description(path: &Path) -> Result<BuildDescription, EngineError> {
  BuildDescription::read(path).map_err(|source| EngineError::Read {
    path: path.to_path_buf(),
    source,
  })
}

pub struct Engine<H> {
  host: H,
  settings: Settings,
  processes: ProcessController,
  lifecycle: Mutex<BuildLifecycle>,
}

impl<H: Host> Engine<H> {
  pub fn new(host: H, settings: Settings) -> Self {
    let processes = ProcessController::new(settings.kill_grace());
    Self {
      host,
      settings,
      processes,
      lifecycle: Mutex::new(BuildLifecycle::new()),
    }
  }

  pub fn host(&self) -> &H {
    &self.host
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn processes(&self) -> &ProcessController {
    &self.processes
  }

  pub fn is_running(&self, channel: Channel) -> bool {
    self.processes.is_running(channel)
  }

  fn lifecycle(&self) -> MutexGuard<'_, BuildLifecycle> {
    self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Feed a lifecycle signal. Returns `true` if it ran the queued follow-up.
  ///
  /// The follow-up runs after the lifecycle lock is released, so it may call
  /// back into the engine.
  pub fn signal(&self, signal: BuildSignal) -> bool {
    let due = self.lifecycle().handle(&signal);
    match due {
      Some(follow_up) => {
        follow_up.fire();
        true
      }
      None => false,
    }
  }

  pub fn request_follow_up(&self, follow_up: FollowUp) {
    self.lifecycle().request_follow_up(follow_up);
  }

  pub fn phase(&self) -> Phase {
    self.lifecycle().phase()
  }

  pub fn has_pending_follow_up(&self) -> bool {
    self.lifecycle().has_pending()
  }

  fn launcher(&self, solution: &SolutionInfo) -> Result<Launcher, EngineError> {
    let script = solution.launcher_path(&self.settings);
    let text = fs::read_to_string(&script).map_err(|source| EngineError::Read {
      path: script.clone(),
      source,
    })?;
    Ok(Launcher::parse(&script, &text, &solution.dir)?)
  }

  fn ensure_external(&self, project: &ProjectInfo) -> Result<(), EngineError> {
    if uses_external_build(&project.build_command, &self.settings.launcher_marker) {
      Ok(())
    } else {
      Err(EngineError::NotApplicable {
        project: project.name.clone(),
        marker: self.settings.launcher_marker.clone(),
      })
    }
  }

  /// Synthesize the transient config for `file` and the command that compiles it.
  ///
  /// Nothing is started; the transient config is written and stale
  /// single-file intermediates are purged.
  pub fn prepare_single_file(&self, file: &Path, configuration: &str) -> Result<PreparedCompile, EngineError> {
    let file = dunce::canonicalize(file).map_err(|source| EngineError::Read {
      path: file.to_path_buf(),
      source,
    })?;

    let project = self.host.project_for_file(&file, configuration)?;
    self.ensure_external(&project)?;

    let solution = self.host.solution();
    let launcher = self.launcher(&solution)?;
    let target_name = target_from_command_line(&project.build_command)?;

    let project_bff = read_description(&project.bff_path())?;
    let node = locate(&project_bff, &target_name, &TargetKind::PRIORITY)?;
    let target = rewrite(&node, &file, &self.settings);

    let solution_bff = read_description(&solution.bff_path())?;
    let config = synthesize(&solution_bff, &target, &project.dir, &self.settings)?;

    let command = BuildCommand::new(
      launcher.executable,
      single_file_args(&self.settings.single_file_target, &config.path),
      &project.dir,
    );

    info!(file = %file.display(), project = %project.name, target = %target_name, "prepared single file compile");

    Ok(PreparedCompile {
      project,
      target,
      config,
      command,
    })
  }

  /// Compile one source file through the transient config.
  pub fn compile_single_file(&self, file: &Path, configuration: &str, sink: Arc<dyn OutputSink>) -> Outcome {
    if self.is_running(Channel::SingleFile) {
      return Outcome::Busy(Channel::SingleFile);
    }

    sink.clear();
    sink.activate();

    let prepared = match self.prepare_single_file(file, configuration) {
      Ok(prepared) => prepared,
      Err(e) => return self.fallback(e, sink.as_ref()),
    };

    sink.write_line(&format!(
      "Compiling {} as part of {}",
      prepared.target.input_file.display(),
      prepared.target.source_name
    ));
    self.launch(Channel::SingleFile, &prepared.command, sink)
  }

  /// Build several projects in one external build invocation.
  ///
  /// Projects that do not use the launcher, or whose target cannot be read
  /// from their command line, are skipped with a message.
  pub fn build_selection(
    &self,
    projects: &[String],
    configuration: &str,
    clean: bool,
    sink: Arc<dyn OutputSink>,
  ) -> Outcome {
    if self.is_running(Channel::Selection) {
      return Outcome::Busy(Channel::Selection);
    }

    sink.clear();
    sink.activate();

    if projects.len() < 2 {
      return self.fallback(EngineError::SelectionTooSmall(projects.len()), sink.as_ref());
    }

    let solution = self.host.solution();
    let launcher = match self.launcher(&solution) {
      Ok(launcher) => launcher,
      Err(e) => return self.fallback(e, sink.as_ref()),
    };

    let mut targets = Vec::with_capacity(projects.len());
    for name in projects {
      let project = match self.host.project(name, configuration) {
        Ok(project) => project,
        Err(e) => {
          warn!(project = %name, error = %e, "skipping project");
          sink.write_line(&format!("Skipping {name}: {e}"));
          continue;
        }
      };

      if self.ensure_external(&project).is_err() {
        warn!(project = %name, "skipping project not built through the launcher");
        sink.write_line(&format!(
          "Skipping {name}: not built through {}",
          self.settings.launcher_marker
        ));
        continue;
      }

      match target_from_command_line(&project.build_command) {
        Ok(target) => targets.push(target),
        Err(e) => {
          warn!(project = %name, error = %e, "skipping project");
          sink.write_line(&format!("Error: {e}"));
        }
      }
    }

    if targets.is_empty() {
      return self.fallback(EngineError::EmptySelection, sink.as_ref());
    }

    let args = multi_target_args(&launcher.options, &targets, clean, &solution.bff_path());
    let command = BuildCommand::new(launcher.executable, args, &solution.dir);

    sink.write_line(&format!("Building {}", targets.join(", ")));
    self.launch(Channel::Selection, &command, sink)
  }

  /// Build the startup project, then run `follow_up` if the build succeeded.
  ///
  /// Resolves once the build has ended.
  pub async fn debug_startup(
    &self,
    project: &str,
    configuration: &str,
    follow_up: FollowUp,
    sink: Arc<dyn OutputSink>,
  ) -> Outcome {
    if self.is_running(Channel::Startup) {
      return Outcome::Busy(Channel::Startup);
    }

    sink.clear();
    sink.activate();

    let (project, command) = match self.startup_command(project, configuration) {
      Ok(prepared) => prepared,
      Err(e) => return self.fallback(e, sink.as_ref()),
    };

    self.signal(BuildSignal::Begin);
    self.request_follow_up(follow_up);

    sink.write_line(&format!("Building {} before debugging", project.name));
    let handle = match self.processes.start(Channel::Startup, &command, sink.clone()) {
      Ok(handle) => handle,
      Err(e) => {
        self.signal(BuildSignal::UnitDone {
          unit: project.name.clone(),
          success: false,
        });
        self.signal(BuildSignal::Done);
        return match e {
          ProcessError::AlreadyRunning(channel) => Outcome::Busy(channel),
          e => self.fallback(e.into(), sink.as_ref()),
        };
      }
    };

    self.run_to_completion(&project.name, handle).await
  }

  fn startup_command(&self, name: &str, configuration: &str) -> Result<(ProjectInfo, BuildCommand), EngineError> {
    let project = self.host.project(name, configuration)?;
    self.ensure_external(&project)?;

    let solution = self.host.solution();
    let launcher = self.launcher(&solution)?;
    let target = target_from_command_line(&project.build_command)?;

    let args = multi_target_args(&launcher.options, &[target], false, &solution.bff_path());
    let command = BuildCommand::new(launcher.executable, args, &solution.dir);
    Ok((project, command))
  }

  /// Wait for `handle` and report its end to the lifecycle as one unit of one build.
  pub async fn run_to_completion(&self, unit: &str, mut handle: BuildHandle) -> Outcome {
    let state = handle.wait().await;
    self.signal(BuildSignal::UnitDone {
      unit: unit.to_string(),
      success: state.is_success(),
    });
    let follow_up_fired = self.signal(BuildSignal::Done);

    info!(unit, state = %state, follow_up_fired, "build finished");
    Outcome::Completed { state, follow_up_fired }
  }

  /// Kill every running build and drop any queued follow-up.
  ///
  /// Returns how many processes were killed.
  pub async fn cancel_all(&self, sink: &dyn OutputSink) -> usize {
    let killed = self.processes.kill_all().await;
    self.signal(BuildSignal::CancelRequested);

    if killed > 0 {
      sink.write_line("Build has been canceled by user.");
    }
    info!(killed, "cancelled builds");
    killed
  }

  fn launch(&self, channel: Channel, command: &BuildCommand, sink: Arc<dyn OutputSink>) -> Outcome {
    match self.processes.start(channel, command, sink.clone()) {
      Ok(handle) => Outcome::Started(handle),
      Err(ProcessError::AlreadyRunning(channel)) => Outcome::Busy(channel),
      Err(e) => self.fallback(e.into(), sink.as_ref()),
    }
  }

  fn fallback(&self, error: EngineError, sink: &dyn OutputSink) -> Outcome {
    warn!(category = ?error.category(), error = %error, "falling back to default build");
    sink.write_line(&format!("Error: {error}"));
    sink.write_line("Falling back to default build...");
    Outcome::Fallback(error)
  }
}
