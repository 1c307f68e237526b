//! Build-description (`.bff`) text engine.
//!
//! This module does targeted structural work on build-description documents,
//! not general parsing:
//! - [`locate`]: find one named target declaration and its brace-balanced span
//! - [`rewrite`]: turn that target into a single-file `ObjectList`
//! - [`synth`]: assemble the transient config around the rewritten target
//!
//! Documents are read fresh for every request and never modified in place.

pub mod locate;
pub mod rewrite;
pub mod scan;
pub mod synth;

use std::fmt;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

pub use locate::{LocateError, locate};
pub use rewrite::{SynthesizedTarget, rewrite};
pub use synth::{SynthesizeError, TransientConfig, synthesize};

/// An immutable build-description document and the path it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescription {
  path: PathBuf,
  text: String,
}

impl BuildDescription {
  pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      text: text.into(),
    }
  }

  /// Read a document from disk.
  pub fn read(path: &Path) -> io::Result<Self> {
    let text = std::fs::read_to_string(path)?;
    Ok(Self::new(path, text))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn text(&self) -> &str {
    &self.text
  }
}

/// Target kinds the engine knows how to rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
  ObjectList,
  Library,
}

impl TargetKind {
  /// Lookup order used when the caller has no better hint.
  pub const PRIORITY: [TargetKind; 2] = [TargetKind::ObjectList, TargetKind::Library];

  /// The declaration keyword, e.g. `ObjectList`.
  pub fn keyword(self) -> &'static str {
    match self {
      TargetKind::ObjectList => "ObjectList",
      TargetKind::Library => "Library",
    }
  }
}

impl fmt::Display for TargetKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.keyword())
  }
}

/// A located target declaration.
///
/// `span` starts at the declaration keyword and ends one past the closing
/// brace that balances the declaration's opening brace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNode {
  pub name: String,
  pub kind: TargetKind,
  pub span: Range<usize>,
  /// Offset of the end of the `Kind( 'Name' )` header, relative to `span.start`.
  pub header_len: usize,
  pub text: String,
}

impl TargetNode {
  /// The `Kind( 'Name' )` header.
  pub fn header(&self) -> &str {
    &self.text[..self.header_len]
  }

  /// Everything after the header, opening brace included.
  pub fn body(&self) -> &str {
    &self.text[self.header_len..]
  }

  pub fn body_lines(&self) -> impl Iterator<Item = &str> {
    self.body().split('\n')
  }
}
