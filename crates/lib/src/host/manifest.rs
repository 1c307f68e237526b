//! File-backed host description (`fbtools.toml`).
//!
//! ```toml
//! [solution]
//! dir = "."
//! name = "Game"
//!
//! [[projects]]
//! name = "Engine"
//! dir = "Engine"
//! debugger = "gdb ./bin/engine"
//! [projects.build_commands]
//! "Debug|x64" = '"..\FBuild.bat" Engine-Debug-x64'
//! ```
//!
//! Relative directories resolve against the manifest's own directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::{HostError, ProjectInfo, ProjectMetadata, SolutionInfo, SolutionMetadata};
use crate::settings::Settings;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
  solution: SolutionSection,
  #[serde(default)]
  settings: Settings,
  #[serde(default)]
  projects: Vec<ProjectSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SolutionSection {
  #[serde(default = "current_dir")]
  dir: PathBuf,
  name: String,
}

fn current_dir() -> PathBuf {
  PathBuf::from(".")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectSection {
  name: String,
  dir: PathBuf,
  #[serde(default)]
  debugger: Option<String>,
  #[serde(default)]
  build_commands: BTreeMap<String, String>,
}

/// A solution and its projects, loaded from a manifest file.
#[derive(Debug, Clone)]
pub struct Manifest {
  path: PathBuf,
  solution: SolutionInfo,
  settings: Settings,
  projects: Vec<ProjectSection>,
}

/// Join `path` onto `base` and canonicalize when the result exists.
fn resolve(base: &Path, path: &Path) -> PathBuf {
  let joined = base.join(path);
  dunce::canonicalize(&joined).unwrap_or(joined)
}

impl Manifest {
  /// Load and resolve a manifest file.
  pub fn load(path: &Path) -> Result<Self, HostError> {
    let text = fs::read_to_string(path).map_err(|source| HostError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(path, &text)
  }

  /// Parse manifest text as if it had been read from `path`.
  pub fn parse(path: &Path, text: &str) -> Result<Self, HostError> {
    let file: ManifestFile = toml::from_str(text).map_err(|source| HostError::Parse {
      path: path.to_path_buf(),
      source: Box::new(source),
    })?;

    let base = match path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => current_dir(),
    };
    let base = dunce::canonicalize(&base).unwrap_or(base);

    let solution = SolutionInfo {
      dir: resolve(&base, &file.solution.dir),
      name: file.solution.name,
    };

    let projects: Vec<ProjectSection> = file
      .projects
      .into_iter()
      .map(|project| ProjectSection {
        dir: resolve(&base, &project.dir),
        ..project
      })
      .collect();

    debug!(path = %path.display(), solution = %solution.name, projects = projects.len(), "loaded manifest");

    Ok(Self {
      path: path.to_path_buf(),
      solution,
      settings: file.settings,
      projects,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  pub fn project_names(&self) -> impl Iterator<Item = &str> {
    self.projects.iter().map(|p| p.name.as_str())
  }

  fn info(project: &ProjectSection, configuration: &str) -> Result<ProjectInfo, HostError> {
    let build_command = project
      .build_commands
      .get(configuration)
      .cloned()
      .ok_or_else(|| HostError::NoBuildCommand {
        project: project.name.clone(),
        configuration: configuration.to_string(),
      })?;

    Ok(ProjectInfo {
      name: project.name.clone(),
      dir: project.dir.clone(),
      build_command,
      debugger: project.debugger.clone(),
    })
  }
}

impl ProjectMetadata for Manifest {
  fn project(&self, name: &str, configuration: &str) -> Result<ProjectInfo, HostError> {
    let project = self
      .projects
      .iter()
      .find(|p| p.name == name)
      .ok_or_else(|| HostError::UnknownProject(name.to_string()))?;
    Self::info(project, configuration)
  }

  fn project_for_file(&self, file: &Path, configuration: &str) -> Result<ProjectInfo, HostError> {
    let file = dunce::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());

    let project = self
      .projects
      .iter()
      .filter(|p| file.starts_with(&p.dir))
      .max_by_key(|p| p.dir.components().count())
      .ok_or_else(|| HostError::NoOwningProject(file.clone()))?;
    Self::info(project, configuration)
  }
}

impl SolutionMetadata for Manifest {
  fn solution(&self) -> SolutionInfo {
    self.solution.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const MANIFEST: &str = r#"
[solution]
name = "Game"

[settings]
kill_grace_ms = 500

[[projects]]
name = "Engine"
dir = "Engine"
[projects.build_commands]
"Debug|x64" = '"..\FBuild.bat" Engine-Debug-x64'

[[projects]]
name = "EngineTools"
dir = "Engine/Tools"
debugger = "gdb tools"
[projects.build_commands]
"Debug|x64" = '"..\..\FBuild.bat" EngineTools-Debug-x64'
"#;

  fn fixture() -> (TempDir, Manifest) {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("Engine/Tools")).unwrap();
    fs::write(temp.path().join("Engine/main.cpp"), "").unwrap();
    fs::write(temp.path().join("Engine/Tools/tool.cpp"), "").unwrap();
    let path = temp.path().join("fbtools.toml");
    fs::write(&path, MANIFEST).unwrap();
    let manifest = Manifest::load(&path).unwrap();
    (temp, manifest)
  }

  #[test]
  fn paths_resolve_against_manifest_dir() {
    let (temp, manifest) = fixture();
    let root = dunce::canonicalize(temp.path()).unwrap();

    assert_eq!(manifest.solution().dir, root);
    assert_eq!(manifest.solution().bff_path(), root.join("Game.bff"));
    let engine = manifest.project("Engine", "Debug|x64").unwrap();
    assert_eq!(engine.dir, root.join("Engine"));
    assert_eq!(engine.build_command, r#""..\FBuild.bat" Engine-Debug-x64"#);
    assert_eq!(manifest.settings().kill_grace_ms, 500);
  }

  #[test]
  fn file_belongs_to_longest_prefix() {
    let (temp, manifest) = fixture();

    let tool = manifest
      .project_for_file(&temp.path().join("Engine/Tools/tool.cpp"), "Debug|x64")
      .unwrap();
    assert_eq!(tool.name, "EngineTools");
    assert_eq!(tool.debugger.as_deref(), Some("gdb tools"));

    let engine = manifest
      .project_for_file(&temp.path().join("Engine/main.cpp"), "Debug|x64")
      .unwrap();
    assert_eq!(engine.name, "Engine");
  }

  #[test]
  fn lookups_report_missing_entries() {
    let (temp, manifest) = fixture();

    assert!(matches!(
      manifest.project("Missing", "Debug|x64"),
      Err(HostError::UnknownProject(name)) if name == "Missing"
    ));
    assert!(matches!(
      manifest.project("Engine", "Release|x64"),
      Err(HostError::NoBuildCommand { .. })
    ));
    assert!(matches!(
      manifest.project_for_file(&temp.path().join("elsewhere.cpp"), "Debug|x64"),
      Err(HostError::NoOwningProject(_))
    ));
  }

  #[test]
  fn invalid_manifest_is_a_parse_error() {
    let err = Manifest::parse(Path::new("fbtools.toml"), "[solution]\nnmae = 'x'").unwrap_err();
    assert!(matches!(err, HostError::Parse { .. }));
  }

  #[test]
  fn missing_manifest_is_a_read_error() {
    let err = Manifest::load(Path::new("/nonexistent/fbtools.toml")).unwrap_err();
    assert!(matches!(err, HostError::Read { .. }));
  }

  #[test]
  fn project_names_keep_declaration_order() {
    let (_temp, manifest) = fixture();
    assert_eq!(manifest.project_names().collect::<Vec<_>>(), vec!["Engine", "EngineTools"]);
  }
}
