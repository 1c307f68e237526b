//! External build process control.
//!
//! The [`ProcessController`] runs at most one build process per [`Channel`].
//! For every process it spawns:
//! - two reader tasks forwarding stdout and stderr lines to the channel's sink
//! - one supervisor task owning the child, which waits for exit or a kill request
//!
//! Killing is best effort: the supervisor sends a terminate signal, waits up to
//! the grace period, and then releases the child whether or not it confirmed
//! termination. Readers are detached at that point, so a sink can still see
//! late output after the process has been released.

pub mod sink;
pub mod types;

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use sink::{NullSink, OutputSink, SharedBuffer};
pub use types::{BuildCommand, Channel, ProcessError, ProcessState};

/// A live or finished process owned by a channel.
struct BuildProcess {
  command: BuildCommand,
  pid: Option<u32>,
  state: watch::Receiver<ProcessState>,
  /// Taken by the first kill; the entry stays until the supervisor publishes the final state.
  kill: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl BuildProcess {
  fn is_live(&self) -> bool {
    // A dropped sender means the supervisor is gone, whatever the last state said.
    self.state.borrow().is_running() && self.state.has_changed().is_ok()
  }
}

/// Handle to a started build process.
#[derive(Debug, Clone)]
pub struct BuildHandle {
  channel: Channel,
  pid: Option<u32>,
  state: watch::Receiver<ProcessState>,
}

impl BuildHandle {
  pub fn channel(&self) -> Channel {
    self.channel
  }

  pub fn pid(&self) -> Option<u32> {
    self.pid
  }

  pub fn state(&self) -> ProcessState {
    *self.state.borrow()
  }

  /// Wait until the process has exited or been killed.
  pub async fn wait(&mut self) -> ProcessState {
    let waited = self.state.wait_for(|state| state.is_terminal()).await.map(|state| *state);
    match waited {
      Ok(state) => state,
      Err(_) => *self.state.borrow(),
    }
  }
}

/// Launches, tracks and kills build processes, one per channel.
pub struct ProcessController {
  processes: Mutex<HashMap<Channel, BuildProcess>>,
  grace: Duration,
}

impl ProcessController {
  /// Create a controller whose kills wait up to `grace` for the process to exit.
  pub fn new(grace: Duration) -> Self {
    Self {
      processes: Mutex::new(HashMap::new()),
      grace,
    }
  }

  fn processes(&self) -> MutexGuard<'_, HashMap<Channel, BuildProcess>> {
    self.processes.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Whether `channel` currently has a live process.
  pub fn is_running(&self, channel: Channel) -> bool {
    self.processes().get(&channel).is_some_and(BuildProcess::is_live)
  }

  /// State of the most recent process on `channel`.
  pub fn state(&self, channel: Channel) -> ProcessState {
    self
      .processes()
      .get(&channel)
      .map(|process| *process.state.borrow())
      .unwrap_or(ProcessState::NotStarted)
  }

  /// The command of the most recent process on `channel`.
  pub fn command(&self, channel: Channel) -> Option<BuildCommand> {
    self.processes().get(&channel).map(|process| process.command.clone())
  }

  /// Start `command` on `channel`, streaming its output into `sink`.
  ///
  /// Must be called from within a tokio runtime.
  ///
  /// # Errors
  ///
  /// - [`ProcessError::AlreadyRunning`] if the channel has a live process. Nothing
  ///   is spawned and the running process is left untouched.
  /// - [`ProcessError::Launch`] if the process could not be spawned.
  pub fn start(
    &self,
    channel: Channel,
    command: &BuildCommand,
    sink: Arc<dyn OutputSink>,
  ) -> Result<BuildHandle, ProcessError> {
    let mut processes = self.processes();

    if processes.get(&channel).is_some_and(BuildProcess::is_live) {
      debug!(channel = %channel, "refusing to start a second build on channel");
      return Err(ProcessError::AlreadyRunning(channel));
    }

    info!(channel = %channel, command = %command, working_dir = %command.working_dir.display(), "starting build process");

    let mut child = Command::new(&command.program)
      .args(&command.args)
      .current_dir(&command.working_dir)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| ProcessError::Launch {
        program: command.program.clone(),
        source,
      })?;

    let pid = child.id();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
      readers.push(tokio::spawn(forward_lines(stdout, sink.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
      readers.push(tokio::spawn(forward_lines(stderr, sink)));
    }

    let (state_tx, state_rx) = watch::channel(ProcessState::Running);
    let (kill_tx, kill_rx) = oneshot::channel();
    let supervisor = tokio::spawn(supervise(channel, child, kill_rx, state_tx, readers, self.grace));

    processes.insert(
      channel,
      BuildProcess {
        command: command.clone(),
        pid,
        state: state_rx.clone(),
        kill: Some((kill_tx, supervisor)),
      },
    );

    Ok(BuildHandle {
      channel,
      pid,
      state: state_rx,
    })
  }

  /// Kill the live process on `channel`, if any.
  ///
  /// Returns `true` if a live process was killed. The channel stays busy
  /// until the process has been released, so a `start` racing with the kill
  /// is rejected. The channel is free again once this returns, and the
  /// process is released exactly once: a second or concurrent call finds
  /// nothing to kill.
  pub async fn kill(&self, channel: Channel) -> bool {
    let (pid, (kill, supervisor)) = {
      let mut processes = self.processes();
      let Some(process) = processes.get_mut(&channel) else {
        return false;
      };
      if !process.is_live() {
        return false;
      }
      let Some(kill) = process.kill.take() else {
        return false;
      };
      (process.pid, kill)
    };

    info!(channel = %channel, pid = ?pid, "killing build process");
    // The supervisor may have finished in the meantime; either way it ends.
    let _ = kill.send(());
    if let Err(e) = supervisor.await {
      warn!(channel = %channel, error = %e, "build supervisor task failed");
    }

    true
  }

  /// Kill every live process. Returns how many were killed.
  pub async fn kill_all(&self) -> usize {
    let mut killed = 0;
    for channel in Channel::ALL {
      if self.kill(channel).await {
        killed += 1;
      }
    }
    killed
  }
}

/// Forward every line of `reader` to `sink`, terminator normalized to `\n`.
async fn forward_lines<R>(reader: R, sink: Arc<dyn OutputSink>)
where
  R: AsyncRead + Unpin,
{
  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();

  loop {
    buf.clear();
    match reader.read_until(b'\n', &mut buf).await {
      Ok(0) => break,
      Ok(_) => {
        let line = String::from_utf8_lossy(&buf);
        sink.write(&format!("{}\n", line.trim_end_matches(['\n', '\r'])));
      }
      Err(e) => {
        debug!(error = %e, "build output stream closed");
        break;
      }
    }
  }
}

/// Own `child` until it exits or a kill is requested, then publish the final state.
async fn supervise(
  channel: Channel,
  mut child: Child,
  mut kill_rx: oneshot::Receiver<()>,
  state_tx: watch::Sender<ProcessState>,
  readers: Vec<JoinHandle<()>>,
  grace: Duration,
) {
  let state = tokio::select! {
    status = child.wait() => {
      // Drain remaining output so it lands before the exit is observed.
      for reader in readers {
        if tokio::time::timeout(grace, reader).await.is_err() {
          debug!(channel = %channel, "output reader still busy after exit, detaching");
        }
      }
      match status {
        Ok(status) => ProcessState::Exited { code: status.code() },
        Err(e) => {
          warn!(channel = %channel, error = %e, "failed to wait for build process");
          ProcessState::Exited { code: None }
        }
      }
    }
    // A dropped sender (controller disposed) counts as a kill request.
    _ = &mut kill_rx => {
      if let Err(e) = child.start_kill() {
        debug!(channel = %channel, error = %e, "terminate signal not delivered");
      }
      match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => debug!(channel = %channel, "build process exited after kill"),
        Err(_) => warn!(
          channel = %channel,
          grace_ms = grace.as_millis() as u64,
          "build process did not exit within grace period, releasing it"
        ),
      }
      ProcessState::Killed
    }
  };

  drop(child);
  state_tx.send_replace(state);
  info!(channel = %channel, state = %state, "build process finished");
}
