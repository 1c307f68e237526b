//! Console output sink for build output.

use std::io::{self, Write};

use owo_colors::{OwoColorize, Stream};

use fbtools_lib::process::OutputSink;

/// Writes build output to stdout, highlighting diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
  fn write(&self, text: &str) {
    let mut out = io::stdout().lock();
    let lower = text.to_ascii_lowercase();

    // Write errors on stdout are ignored.
    let _ = if lower.contains("error") {
      write!(out, "{}", text.if_supports_color(Stream::Stdout, |s| s.red()))
    } else if lower.contains("warning") {
      write!(out, "{}", text.if_supports_color(Stream::Stdout, |s| s.yellow()))
    } else {
      out.write_all(text.as_bytes())
    };
    let _ = out.flush();
  }
}
