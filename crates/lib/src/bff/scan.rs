//! Lexical classification of build-description text.
//!
//! Structural characters (`{`, `}`, declaration keywords) only count when they
//! appear in code, not inside a quoted literal or a comment. Literals are
//! delimited by `'` or `"` and use `^` as the escape character.
//!
//! Comments start with `//` anywhere, or with `;` as the first non-blank
//! character of a line. A `;` after code separates fields on one-line
//! declarations and stays code.

/// Lexical state of a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
  Code,
  Literal,
  Comment,
}

/// Classify every byte of `text`.
///
/// Quote delimiters are classified as [`Region::Literal`]. The returned vector
/// has exactly `text.len()` entries.
pub fn classify(text: &str) -> Vec<Region> {
  let bytes = text.as_bytes();
  let mut regions = Vec::with_capacity(bytes.len());
  let mut quote: Option<u8> = None;
  let mut in_comment = false;
  let mut escaped = false;
  let mut line_start = true;
  let mut i = 0;

  while i < bytes.len() {
    let b = bytes[i];

    if in_comment {
      regions.push(Region::Comment);
      if b == b'\n' {
        in_comment = false;
      }
    } else if let Some(q) = quote {
      regions.push(Region::Literal);
      if escaped {
        escaped = false;
      } else if b == b'^' {
        escaped = true;
      } else if b == q {
        quote = None;
      }
    } else {
      match b {
        b'\'' | b'"' => {
          quote = Some(b);
          regions.push(Region::Literal);
        }
        b'/' if bytes.get(i + 1) == Some(&b'/') => {
          in_comment = true;
          regions.push(Region::Comment);
        }
        b';' if line_start => {
          in_comment = true;
          regions.push(Region::Comment);
        }
        _ => regions.push(Region::Code),
      }
    }

    // A newline inside a literal does not start a new line of code.
    if b == b'\n' {
      line_start = quote.is_none();
    } else if !b.is_ascii_whitespace() {
      line_start = false;
    }

    i += 1;
  }

  regions
}

/// Find the span end of the brace block opening at or after `from`.
///
/// Returns `(open, close)` byte offsets of the balancing braces, or `None` if no
/// opening brace exists or the text ends before the depth returns to zero.
pub fn balanced_block(text: &str, regions: &[Region], from: usize) -> Option<(usize, usize)> {
  let bytes = text.as_bytes();
  let open = (from..bytes.len()).find(|&i| bytes[i] == b'{' && regions[i] == Region::Code)?;

  let mut depth = 0usize;
  for (i, &b) in bytes.iter().enumerate().skip(open) {
    if regions[i] != Region::Code {
      continue;
    }
    match b {
      b'{' => depth += 1,
      b'}' => {
        depth -= 1;
        if depth == 0 {
          return Some((open, i));
        }
      }
      _ => {}
    }
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;

  fn code_only(text: &str) -> String {
    text
      .chars()
      .zip(classify(text))
      .map(|(c, r)| if r == Region::Code { c } else { '_' })
      .collect()
  }

  #[test]
  fn literals_and_comments_are_masked() {
    assert_eq!(code_only(".A = '{x}' // }"), ".A = _____ ____");
    assert_eq!(code_only(".B = \"a}b\"{"), ".B = _____{");
  }

  #[test]
  fn caret_escapes_quote_inside_literal() {
    assert_eq!(code_only("'it^'s {' }"), "_________ }");
  }

  #[test]
  fn comment_ends_at_newline() {
    assert_eq!(code_only("// {\n}"), "_____}");
  }

  #[test]
  fn leading_semicolon_starts_comment() {
    assert_eq!(code_only("; it's {\n}"), "_________}");
    assert_eq!(code_only("  ; x'\n.A"), "  _____.A");
  }

  #[test]
  fn semicolon_after_code_is_a_separator() {
    assert_eq!(code_only("{ .A = 'x'; .B = 'y' }"), "{ .A = ___; .B = ___ }");
  }

  #[test]
  fn balanced_block_handles_nesting() {
    let text = "X { .B = { .C = 'y' } } tail";
    let regions = classify(text);
    assert_eq!(balanced_block(text, &regions, 0), Some((2, 22)));
  }

  #[test]
  fn balanced_block_ignores_literal_braces() {
    let text = "X { .A = '}' }";
    let regions = classify(text);
    assert_eq!(balanced_block(text, &regions, 0), Some((2, 13)));
  }

  #[test]
  fn balanced_block_reports_unterminated() {
    let text = "X { .B = { }";
    let regions = classify(text);
    assert_eq!(balanced_block(text, &regions, 0), None);
    assert_eq!(balanced_block("no braces", &classify("no braces"), 0), None);
  }
}
