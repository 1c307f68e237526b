//! Build lifecycle coordination.
//!
//! [`BuildLifecycle`] tracks whether a build is running, whether every unit of
//! it has succeeded so far, and an optional follow-up action (for example a
//! debugger launch) that runs only when the build it was queued against ends
//! successfully. It is driven by abstract [`BuildSignal`]s, delivered one at a
//! time, and never touches processes itself.
//!
//! The coordinator hands a due follow-up back to its caller instead of running
//! it, so the action can re-enter whatever owns the coordinator.

use std::fmt;

use tracing::{debug, info};

/// Abstract build events fed into the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSignal {
  Begin,
  UnitDone { unit: String, success: bool },
  Done,
  CancelRequested,
}

impl fmt::Display for BuildSignal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildSignal::Begin => f.write_str("build begin"),
      BuildSignal::UnitDone { unit, success } => write!(f, "unit {unit} done (success: {success})"),
      BuildSignal::Done => f.write_str("build done"),
      BuildSignal::CancelRequested => f.write_str("cancel requested"),
    }
  }
}

/// A caller-supplied action run once after a successful build.
pub struct FollowUp {
  label: String,
  action: Box<dyn FnOnce() + Send>,
}

impl FollowUp {
  pub fn new(label: impl Into<String>, action: impl FnOnce() + Send + 'static) -> Self {
    Self {
      label: label.into(),
      action: Box::new(action),
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  /// Run the action, consuming it.
  pub fn fire(self) {
    (self.action)();
  }
}

impl fmt::Debug for FollowUp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FollowUp").field("label", &self.label).finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
  #[default]
  Idle,
  Running,
}

#[derive(Debug)]
pub struct BuildLifecycle {
  phase: Phase,
  pending: Option<FollowUp>,
  success: bool,
}

impl Default for BuildLifecycle {
  fn default() -> Self {
    Self {
      phase: Phase::Idle,
      pending: None,
      success: true,
    }
  }
}

impl BuildLifecycle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn has_pending(&self) -> bool {
    self.pending.is_some()
  }

  pub fn pending_label(&self) -> Option<&str> {
    self.pending.as_ref().map(FollowUp::label)
  }

  /// Whether every unit reported so far succeeded.
  pub fn last_success(&self) -> bool {
    self.success
  }

  /// Queue `follow_up` for the next [`BuildSignal::Done`]. Replaces any queued one.
  pub fn request_follow_up(&mut self, follow_up: FollowUp) {
    if let Some(previous) = self.pending.replace(follow_up) {
      debug!(follow_up = previous.label(), "replaced queued follow-up");
    }
  }

  /// A build started. A follow-up queued before it belonged to another build and is dropped.
  pub fn on_build_begin(&mut self) {
    if let Some(superseded) = self.pending.take() {
      info!(follow_up = superseded.label(), "new build started, cancelling queued follow-up");
    }
    self.phase = Phase::Running;
    self.success = true;
  }

  pub fn on_unit_done(&mut self, unit: &str, success: bool) {
    if self.pending.is_some() && !success {
      debug!(unit, "unit failed, queued follow-up will not run");
      self.success = false;
    }
  }

  /// The build ended. Returns the queued follow-up if it is due; the caller runs it.
  pub fn on_build_done(&mut self) -> Option<FollowUp> {
    self.phase = Phase::Idle;

    let follow_up = self.pending.take()?;

    if !self.success {
      info!(follow_up = follow_up.label(), "build failed, skipping follow-up");
      return None;
    }

    info!(follow_up = follow_up.label(), "build succeeded, follow-up is due");
    Some(follow_up)
  }

  pub fn on_cancel_requested(&mut self) {
    if let Some(cancelled) = self.pending.take() {
      info!(follow_up = cancelled.label(), "build cancelled, dropping queued follow-up");
    }
  }

  /// Dispatch `signal`. Returns the follow-up it made due, if any.
  pub fn handle(&mut self, signal: &BuildSignal) -> Option<FollowUp> {
    debug!(signal = %signal, "lifecycle signal");
    match signal {
      BuildSignal::Begin => self.on_build_begin(),
      BuildSignal::UnitDone { unit, success } => self.on_unit_done(unit, *success),
      BuildSignal::Done => return self.on_build_done(),
      BuildSignal::CancelRequested => self.on_cancel_requested(),
    }
    None
  }
}
