//! Rewriting a located target into a single-file compile target.
//!
//! The synthesized target keeps the original compiler configuration but:
//! - is always an `ObjectList` named after the reserved single-file target
//! - drops unity and post-build copy references
//! - writes intermediates under a dedicated subdirectory
//! - compiles exactly one input, with caching and distribution disabled

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use super::{TargetKind, TargetNode};
use crate::settings::Settings;

/// Indentation used for injected fields.
const FIELD_INDENT: &str = "    ";

/// A target derived from a [`TargetNode`] that compiles a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedTarget {
  /// Reserved target name.
  pub name: String,
  pub kind: TargetKind,
  /// Name of the target this one was derived from.
  pub source_name: String,
  pub input_file: PathBuf,
  pub text: String,
}

/// Quote a value as a single-quoted bff string literal.
fn quote(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('\'');
  for c in value.chars() {
    if matches!(c, '^' | '\'' | '$') {
      out.push('^');
    }
    out.push(c);
  }
  out.push('\'');
  out
}

/// Remove unity and copy-step assignments from a line that also carries code
/// which must stay, such as the closing line of a one-line declaration.
fn strip_inline_fields<'a>(line: &'a str, settings: &Settings) -> Cow<'a, str> {
  let unity = format!(
    r#"{}\s*=\s*(?:'[^']*'|"[^"]*"|\{{[^{{}}]*\}}|\.\w+)\s*;?\s*"#,
    regex::escape(&settings.unity_field)
  );
  let marker = regex::escape(&settings.copy_step_marker);
  let copy_step = format!(r#"\.\w+\s*=\s*(?:\{{[^{{}}]*{marker}[^{{}}]*\}}|{marker}[^']*')\s*;?\s*"#);

  let mut line = Cow::Borrowed(line);
  for pattern in [unity, copy_step] {
    // Both patterns are built from escaped settings, so they always compile.
    let Ok(re) = Regex::new(&pattern) else {
      continue;
    };
    let stripped = match re.replace_all(&line, "") {
      Cow::Owned(stripped) => Some(stripped),
      Cow::Borrowed(_) => None,
    };
    if let Some(stripped) = stripped {
      line = Cow::Owned(stripped);
    }
  }
  line
}

/// Rewrite `node` so that it compiles only `input_file`.
pub fn rewrite(node: &TargetNode, input_file: &Path, settings: &Settings) -> SynthesizedTarget {
  let header = format!("{}( '{}' )", TargetKind::ObjectList.keyword(), settings.single_file_target);

  let eol = if node.body().contains("\r\n") { "\r\n" } else { "\n" };
  let lines: Vec<&str> = node.body_lines().collect();
  let last = lines.len().saturating_sub(1);
  let mut removed = 0usize;

  let body: Vec<String> = lines
    .iter()
    .enumerate()
    .filter(|(i, line)| {
      // The last line closes the declaration and always stays.
      let discard = *i != last && (line.contains(&settings.unity_field) || line.contains(&settings.copy_step_marker));
      if discard {
        removed += 1;
      }
      !discard
    })
    .map(|(i, line)| {
      let line = if i == last {
        strip_inline_fields(line, settings)
      } else {
        Cow::Borrowed(*line)
      };
      let line = if line.contains(&settings.intermediate_field) {
        line.replace(&settings.intermediate_segment, &settings.channel_intermediate_segment())
      } else {
        line.into_owned()
      };
      line.replace(&settings.current_dir_placeholder, "")
    })
    .collect();

  let body = body.join("\n");
  let input = quote(&input_file.display().to_string());
  let injected = format!(
    "{eol}{eol}{FIELD_INDENT}.CompilerInputFiles = {input}{eol}{FIELD_INDENT}.AllowCaching = false{eol}{FIELD_INDENT}.AllowDistribution = false{eol}"
  );

  let body = match body.rfind('}') {
    Some(close) => format!("{}{}{}", body[..close].trim_end(), injected, &body[close..]),
    None => format!("{body}{injected}"),
  };

  debug!(
    source = %node.name,
    target = %settings.single_file_target,
    removed_lines = removed,
    "rewrote target for single file compile"
  );

  SynthesizedTarget {
    name: settings.single_file_target.clone(),
    kind: TargetKind::ObjectList,
    source_name: node.name.clone(),
    input_file: input_file.to_path_buf(),
    text: format!("{header}{body}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bff::{BuildDescription, locate};

  const PROJECT_BFF: &str = r"Library( 'Engine-Debug' )
{
    .Compiler = 'MSVC'
    .CompilerInputPath = '..\Engine\$_CURRENT_BFF_DIR_$\src\'
    .CompilerInputUnity = 'Engine-Unity'
    .Intermediate = '..\out\int\Engine\'
    .CompilerOutputPath = .Intermediate
    .LibrarianOutput = '..\out\lib\Engine.lib'
    .PreBuildDependencies = { 'Copy_EngineData' }
}";

  fn node() -> TargetNode {
    let document = BuildDescription::new("Engine.bff", PROJECT_BFF);
    locate(&document, "Engine-Debug", &TargetKind::PRIORITY).unwrap()
  }

  fn rewritten() -> SynthesizedTarget {
    rewrite(&node(), Path::new("/src/engine/render.cpp"), &Settings::default())
  }

  #[test]
  fn library_becomes_reserved_object_list() {
    let target = rewritten();
    assert_eq!(target.kind, TargetKind::ObjectList);
    assert_eq!(target.name, "CompileSingleFile");
    assert_eq!(target.source_name, "Engine-Debug");
    assert!(target.text.starts_with("ObjectList( 'CompileSingleFile' )\n{"));
    assert!(!target.text.contains("Library("));
  }

  #[test]
  fn unity_and_copy_lines_are_removed() {
    let target = rewritten();
    assert!(!target.text.contains(".CompilerInputUnity"));
    assert!(!target.text.contains("'Copy_"));
    assert!(target.text.contains(".LibrarianOutput"));
  }

  #[test]
  fn three_fields_are_injected_before_final_brace() {
    let target = rewritten();
    let expected_tail = "\n\n    .CompilerInputFiles = '/src/engine/render.cpp'\n    .AllowCaching = false\n    .AllowDistribution = false\n}";
    assert!(target.text.ends_with(expected_tail), "{}", target.text);
    assert_eq!(target.text.matches(".CompilerInputFiles").count(), 1);
    assert_eq!(target.text.matches('{').count(), target.text.matches('}').count());
  }

  #[test]
  fn intermediate_paths_gain_channel_segment() {
    let target = rewritten();
    assert!(target.text.contains(r"'..\out\int\CompileSingleFile\Engine\'"));
    // Non-intermediate paths are left alone.
    assert!(target.text.contains(r"'..\out\lib\Engine.lib'"));
  }

  #[test]
  fn current_dir_placeholder_is_stripped() {
    let target = rewritten();
    assert!(target.text.contains(r".CompilerInputPath = '..\Engine\src\'"));
    assert!(!target.text.contains("$_CURRENT_BFF_DIR_$"));
  }

  #[test]
  fn intermediate_field_variants_are_rewritten() {
    let text = "ObjectList( 'Tools' )\n{\n  .IntermediateDir = 'build\\int\\Tools\\'\n}";
    let document = BuildDescription::new("Tools.bff", text);
    let node = locate(&document, "Tools", &TargetKind::PRIORITY).unwrap();
    let target = rewrite(&node, Path::new("a.cpp"), &Settings::default());
    assert!(target.text.contains("'build\\int\\CompileSingleFile\\Tools\\'"));
  }

  #[test]
  fn input_path_is_escaped() {
    let target = rewrite(&node(), Path::new("/src/it's$.cpp"), &Settings::default());
    assert!(target.text.contains(".CompilerInputFiles = '/src/it^'s^$.cpp'"));
  }

  #[test]
  fn crlf_line_endings_are_kept_in_injected_fields() {
    let text = PROJECT_BFF.replace('\n', "\r\n");
    let document = BuildDescription::new("Engine.bff", text);
    let node = locate(&document, "Engine-Debug", &TargetKind::PRIORITY).unwrap();
    let target = rewrite(&node, Path::new("a.cpp"), &Settings::default());

    assert!(target.text.ends_with("\r\n    .AllowDistribution = false\r\n}"));
    assert_eq!(target.text.matches('\n').count(), target.text.matches("\r\n").count());
  }

  #[test]
  fn one_line_declaration_drops_unity_and_copy_fields() {
    let text = "Library( 'Foo' ) { .A = 'x'; .CompilerInputUnity = 'Foo-Unity'; .PreBuildDependencies = { 'Copy_Data' }; .B = { .C = 'y' } }";
    let document = BuildDescription::new("Foo.bff", text);
    let node = locate(&document, "Foo", &TargetKind::PRIORITY).unwrap();
    let target = rewrite(&node, Path::new("a.cpp"), &Settings::default());

    assert!(target.text.starts_with("ObjectList( 'CompileSingleFile' ) { .A = 'x'; .B = { .C = 'y' }"));
    assert!(!target.text.contains("Unity"));
    assert!(!target.text.contains("Copy_"));
    assert_eq!(target.text.matches(".CompilerInputFiles").count(), 1);
    assert_eq!(target.text.matches('{').count(), target.text.matches('}').count());
  }

  #[test]
  fn quote_escapes_caret() {
    assert_eq!(quote("a^b"), "'a^^b'");
    assert_eq!(quote("plain"), "'plain'");
  }
}
