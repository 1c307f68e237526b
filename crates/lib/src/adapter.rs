//! Glue between host callbacks and the engine.
//!
//! [`HostEventAdapter`] turns host build notifications into [`BuildSignal`]s.
//! [`CommandInterceptor`] sits in front of a host command and decides whether
//! the host's own action still runs. Both adapters share one engine; they only
//! differ in [`InterceptMode`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::engine::{Engine, Outcome};
use crate::host::{Confirm, Host};
use crate::lifecycle::{BuildSignal, FollowUp};
use crate::process::{Channel, OutputSink};

/// Forwards host build events into the engine's lifecycle.
pub struct HostEventAdapter<H> {
  engine: Arc<Engine<H>>,
  host_build_running: AtomicBool,
  /// Follow-up to queue once the host's next build has begun.
  deferred: Mutex<Option<FollowUp>>,
}

impl<H: Host> HostEventAdapter<H> {
  pub fn new(engine: Arc<Engine<H>>) -> Self {
    Self {
      engine,
      host_build_running: AtomicBool::new(false),
      deferred: Mutex::new(None),
    }
  }

  pub fn engine(&self) -> &Arc<Engine<H>> {
    &self.engine
  }

  pub fn is_host_build_running(&self) -> bool {
    self.host_build_running.load(Ordering::SeqCst)
  }

  /// Queue `follow_up` against the host build that is about to start.
  pub fn defer_follow_up(&self, follow_up: FollowUp) {
    *self.deferred.lock().unwrap_or_else(PoisonError::into_inner) = Some(follow_up);
  }

  /// The host started a build. Builds of our own channels are killed first.
  pub async fn build_begin(&self) {
    self.host_build_running.store(true, Ordering::SeqCst);

    let killed = self.engine.processes().kill_all().await;
    if killed > 0 {
      info!(killed, "host build started, killed running builds");
    }

    self.engine.signal(BuildSignal::Begin);

    let deferred = self.deferred.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(follow_up) = deferred {
      self.engine.request_follow_up(follow_up);
    }
  }

  pub fn unit_done(&self, unit: &str, success: bool) {
    self.engine.signal(BuildSignal::UnitDone {
      unit: unit.to_string(),
      success,
    });
  }

  /// The host build ended. Returns `true` if a follow-up ran.
  pub fn build_done(&self) -> bool {
    self.host_build_running.store(false, Ordering::SeqCst);
    self.engine.signal(BuildSignal::Done)
  }

  pub fn cancel_requested(&self) {
    self.deferred.lock().unwrap_or_else(PoisonError::into_inner).take();
    self.engine.signal(BuildSignal::CancelRequested);
  }
}

/// How an interceptor treats the host's own action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptMode {
  /// Run the engine instead of the host action, unless the engine falls back.
  PreemptDefault,
  /// Let the host action run and only observe its lifecycle.
  ListenOnly,
}

/// What the host should do with its own action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  CancelDefault,
  RunDefault,
}

/// A host command the interceptor can take over.
#[derive(Debug)]
pub enum CommandRequest {
  CompileFile {
    file: PathBuf,
    configuration: String,
  },
  BuildSelection {
    projects: Vec<String>,
    configuration: String,
    clean: bool,
  },
  DebugStartup {
    project: String,
    configuration: String,
    follow_up: FollowUp,
  },
}

impl CommandRequest {
  pub fn channel(&self) -> Channel {
    match self {
      CommandRequest::CompileFile { .. } => Channel::SingleFile,
      CommandRequest::BuildSelection { .. } => Channel::Selection,
      CommandRequest::DebugStartup { .. } => Channel::Startup,
    }
  }
}

pub struct CommandInterceptor<H, C> {
  events: Arc<HostEventAdapter<H>>,
  confirm: C,
  mode: InterceptMode,
}

impl<H: Host, C: Confirm> CommandInterceptor<H, C> {
  pub fn new(events: Arc<HostEventAdapter<H>>, confirm: C, mode: InterceptMode) -> Self {
    Self { events, confirm, mode }
  }

  pub fn mode(&self) -> InterceptMode {
    self.mode
  }

  /// Handle `request` before the host runs its own action.
  ///
  /// A debug request in [`InterceptMode::PreemptDefault`] resolves once the
  /// startup build has ended.
  pub async fn before_execute(&self, request: CommandRequest, sink: Arc<dyn OutputSink>) -> Decision {
    match self.mode {
      InterceptMode::ListenOnly => self.listen(request),
      InterceptMode::PreemptDefault => self.preempt(request, sink).await,
    }
  }

  fn listen(&self, request: CommandRequest) -> Decision {
    if let CommandRequest::DebugStartup { project, follow_up, .. } = request {
      debug!(project = %project, "debug follow-up deferred to host build");
      self.events.defer_follow_up(follow_up);
    }
    Decision::RunDefault
  }

  async fn preempt(&self, request: CommandRequest, sink: Arc<dyn OutputSink>) -> Decision {
    if self.events.is_host_build_running() {
      sink.write_line("A build is already in progress.");
      return Decision::CancelDefault;
    }

    let engine = self.events.engine();
    let channel = request.channel();
    if engine.is_running(channel) {
      if !self.confirm.confirm("A build is already running. Do you want to stop it?") {
        return Decision::CancelDefault;
      }
      engine.processes().kill(channel).await;
    }

    let outcome = match request {
      CommandRequest::CompileFile { file, configuration } => engine.compile_single_file(&file, &configuration, sink),
      CommandRequest::BuildSelection {
        projects,
        configuration,
        clean,
      } => engine.build_selection(&projects, &configuration, clean, sink),
      CommandRequest::DebugStartup {
        project,
        configuration,
        follow_up,
      } => engine.debug_startup(&project, &configuration, follow_up, sink).await,
    };

    match outcome {
      Outcome::Fallback(_) => Decision::RunDefault,
      Outcome::Started(_) | Outcome::Completed { .. } | Outcome::Busy(_) => Decision::CancelDefault,
    }
  }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
  use super::*;
  use crate::host::{FixedAnswer, Manifest};
  use crate::process::SharedBuffer;
  use crate::testutil::{Fixture, counting_follow_up};
  use std::sync::atomic::Ordering;

  fn adapter(fixture: &Fixture) -> Arc<HostEventAdapter<Manifest>> {
    Arc::new(HostEventAdapter::new(Arc::new(fixture.engine())))
  }

  fn compile(fixture: &Fixture) -> CommandRequest {
    CommandRequest::CompileFile {
      file: fixture.source_file(),
      configuration: "Debug|x64".to_string(),
    }
  }

  #[tokio::test]
  async fn preempt_cancels_host_action_on_start() {
    let fixture = Fixture::new();
    let events = adapter(&fixture);
    let interceptor = CommandInterceptor::new(events, FixedAnswer(true), InterceptMode::PreemptDefault);

    let decision = interceptor
      .before_execute(compile(&fixture), Arc::new(SharedBuffer::new()))
      .await;
    assert_eq!(decision, Decision::CancelDefault);
  }

  #[tokio::test]
  async fn preempt_runs_host_action_on_fallback() {
    let fixture = Fixture::new();
    let interceptor = CommandInterceptor::new(adapter(&fixture), FixedAnswer(true), InterceptMode::PreemptDefault);
    let request = CommandRequest::CompileFile {
      file: fixture.tool_file(),
      configuration: "Debug|x64".to_string(),
    };

    let decision = interceptor.before_execute(request, Arc::new(SharedBuffer::new())).await;
    assert_eq!(decision, Decision::RunDefault);
  }

  #[tokio::test]
  async fn declined_confirmation_keeps_running_build() {
    let fixture = Fixture::with_fbuild("exec sleep 30");
    let events = adapter(&fixture);
    let interceptor = CommandInterceptor::new(events.clone(), FixedAnswer(false), InterceptMode::PreemptDefault);
    let sink: Arc<dyn OutputSink> = Arc::new(SharedBuffer::new());

    interceptor.before_execute(compile(&fixture), sink.clone()).await;
    let running = events.engine().processes().command(Channel::SingleFile);
    assert!(events.engine().is_running(Channel::SingleFile));

    let decision = interceptor.before_execute(compile(&fixture), sink.clone()).await;
    assert_eq!(decision, Decision::CancelDefault);
    assert!(events.engine().is_running(Channel::SingleFile));
    assert_eq!(events.engine().processes().command(Channel::SingleFile), running);

    events.engine().processes().kill_all().await;
  }

  #[tokio::test]
  async fn accepted_confirmation_restarts_build() {
    let fixture = Fixture::with_fbuild("exec sleep 30");
    let events = adapter(&fixture);
    let interceptor = CommandInterceptor::new(events.clone(), FixedAnswer(true), InterceptMode::PreemptDefault);
    let sink: Arc<dyn OutputSink> = Arc::new(SharedBuffer::new());

    interceptor.before_execute(compile(&fixture), sink.clone()).await;
    let decision = interceptor.before_execute(compile(&fixture), sink.clone()).await;

    assert_eq!(decision, Decision::CancelDefault);
    assert!(events.engine().is_running(Channel::SingleFile));
    events.engine().processes().kill_all().await;
  }

  #[tokio::test]
  async fn host_build_begin_kills_channel_builds() {
    let fixture = Fixture::with_fbuild("exec sleep 30");
    let events = adapter(&fixture);
    let interceptor = CommandInterceptor::new(events.clone(), FixedAnswer(true), InterceptMode::PreemptDefault);
    let sink: Arc<dyn OutputSink> = Arc::new(SharedBuffer::new());

    interceptor.before_execute(compile(&fixture), sink.clone()).await;
    assert!(events.engine().is_running(Channel::SingleFile));

    events.build_begin().await;
    assert!(!events.engine().is_running(Channel::SingleFile));
    assert!(events.is_host_build_running());

    let decision = interceptor.before_execute(compile(&fixture), sink.clone()).await;
    assert_eq!(decision, Decision::CancelDefault);
    assert!(!events.engine().is_running(Channel::SingleFile));

    events.build_done();
    assert!(!events.is_host_build_running());
  }

  #[tokio::test]
  async fn listen_only_fires_follow_up_after_host_build() {
    let fixture = Fixture::new();
    let events = adapter(&fixture);
    let interceptor = CommandInterceptor::new(events.clone(), FixedAnswer(true), InterceptMode::ListenOnly);
    let (follow_up, count) = counting_follow_up();

    let request = CommandRequest::DebugStartup {
      project: "Game".to_string(),
      configuration: "Debug|x64".to_string(),
      follow_up,
    };
    let decision = interceptor.before_execute(request, Arc::new(SharedBuffer::new())).await;
    assert_eq!(decision, Decision::RunDefault);
    assert!(!events.engine().is_running(Channel::Startup));

    events.build_begin().await;
    events.unit_done("Game", true);
    assert!(events.build_done());
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn listen_only_skips_follow_up_after_failed_unit() {
    let fixture = Fixture::new();
    let events = adapter(&fixture);
    let interceptor = CommandInterceptor::new(events.clone(), FixedAnswer(true), InterceptMode::ListenOnly);
    let (follow_up, count) = counting_follow_up();

    interceptor
      .before_execute(
        CommandRequest::DebugStartup {
          project: "Game".to_string(),
          configuration: "Debug|x64".to_string(),
          follow_up,
        },
        Arc::new(SharedBuffer::new()),
      )
      .await;

    events.build_begin().await;
    events.unit_done("Engine", false);
    events.unit_done("Game", true);
    assert!(!events.build_done());
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn cancel_drops_deferred_follow_up() {
    let fixture = Fixture::new();
    let events = adapter(&fixture);
    let (follow_up, count) = counting_follow_up();

    events.defer_follow_up(follow_up);
    events.cancel_requested();
    events.build_begin().await;
    assert!(!events.build_done());
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }
}
