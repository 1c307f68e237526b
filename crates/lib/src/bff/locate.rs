//! Locating named target declarations.
//!
//! A declaration looks like `Kind( 'Name' ) { ...fields... }`. The locator
//! finds every code-region occurrence of the header for the requested kinds,
//! insists on exactly one, and then brace-matches the declaration body.

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::scan::{Region, balanced_block, classify};
use super::{BuildDescription, TargetKind, TargetNode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
  #[error("could not find target '{name}' in {path}")]
  NotFound { name: String, path: String },

  #[error("target '{name}' is declared {count} times in {path}")]
  Ambiguous { name: String, path: String, count: usize },

  #[error("declaration of target '{name}' in {path} has no closing brace")]
  UnterminatedScope { name: String, path: String },
}

/// Locate the single declaration of `name` among the given kinds.
///
/// Kinds are searched in the order given. Occurrences inside quoted literals
/// or comments are ignored.
///
/// # Errors
///
/// - [`LocateError::NotFound`] if no declaration matches
/// - [`LocateError::Ambiguous`] if more than one declaration matches, across all kinds
/// - [`LocateError::UnterminatedScope`] if the matched declaration never closes
pub fn locate(document: &BuildDescription, name: &str, kinds: &[TargetKind]) -> Result<TargetNode, LocateError> {
  let text = document.text();
  let path = document.path().display().to_string();
  let regions = classify(text);

  let mut matches = Vec::new();
  for &kind in kinds {
    let pattern = format!(r#"\b{}\s*\(\s*['"]{}['"]"#, kind.keyword(), regex::escape(name));
    // Both fragments are escaped or fixed, so the pattern always compiles.
    let Ok(re) = Regex::new(&pattern) else {
      continue;
    };
    matches.extend(
      re.find_iter(text)
        .filter(|m| regions[m.start()] == Region::Code)
        .map(|m| (kind, m.start(), m.end())),
    );
  }

  debug!(target_name = %name, path = %path, matches = matches.len(), "located declarations");

  let (kind, start, header_match_end) = match matches.as_slice() {
    [] => {
      return Err(LocateError::NotFound {
        name: name.to_string(),
        path,
      });
    }
    [single] => *single,
    many => {
      return Err(LocateError::Ambiguous {
        name: name.to_string(),
        path,
        count: many.len(),
      });
    }
  };

  let Some((open, close)) = balanced_block(text, &regions, header_match_end) else {
    return Err(LocateError::UnterminatedScope {
      name: name.to_string(),
      path,
    });
  };

  let header_end = text[header_match_end..open]
    .find(')')
    .map(|offset| header_match_end + offset + 1)
    .unwrap_or(header_match_end);

  Ok(TargetNode {
    name: name.to_string(),
    kind,
    span: start..close + 1,
    header_len: header_end - start,
    text: text[start..=close].to_string(),
  })
}
