//! Output sinks receiving build output text.
//!
//! A sink may be called concurrently by the stdout and stderr readers of a
//! process, and may keep receiving lines after the process has been released.
//! Implementations therefore take plain text only and synchronize internally.

use std::sync::{Mutex, PoisonError};

/// Destination for line-oriented build output.
pub trait OutputSink: Send + Sync {
  /// Append text. Build output lines arrive with their terminator.
  fn write(&self, text: &str);

  /// Append a message followed by a line terminator.
  fn write_line(&self, message: &str) {
    self.write(&format!("{message}\n"));
  }

  /// Discard previously written text.
  fn clear(&self) {}

  /// Bring the sink to the user's attention.
  fn activate(&self) {}
}

/// In-memory sink, guarded by an append lock.
#[derive(Debug, Default)]
pub struct SharedBuffer {
  text: Mutex<String>,
}

impl SharedBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of everything written so far.
  pub fn contents(&self) -> String {
    self.text.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn lines(&self) -> Vec<String> {
    self.contents().lines().map(str::to_string).collect()
  }
}

impl OutputSink for SharedBuffer {
  fn write(&self, text: &str) {
    self.text.lock().unwrap_or_else(PoisonError::into_inner).push_str(text);
  }

  fn clear(&self) {
    self.text.lock().unwrap_or_else(PoisonError::into_inner).clear();
  }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
  fn write(&self, _text: &str) {}
}
