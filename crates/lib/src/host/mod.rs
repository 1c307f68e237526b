//! Collaborator interfaces supplied by the host environment.
//!
//! The engine only needs a handful of facts about the solution it works on:
//! project directories and build command lines, the solution directory and
//! name. Hosts provide them through [`ProjectMetadata`] and [`SolutionMetadata`];
//! [`manifest::Manifest`] is the file-backed host used by the command line tool.

pub mod manifest;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::BFF_EXTENSION;
use crate::settings::Settings;

pub use manifest::Manifest;

#[derive(Debug, Error)]
pub enum HostError {
  #[error("unknown project '{0}'")]
  UnknownProject(String),

  #[error("{} does not belong to any project", .0.display())]
  NoOwningProject(PathBuf),

  #[error("project '{project}' has no build command for configuration '{configuration}'")]
  NoBuildCommand { project: String, configuration: String },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },
}

/// What the engine knows about one project for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
  pub name: String,
  pub dir: PathBuf,
  pub build_command: String,
  /// Command line that starts a debug session for the project, if any.
  pub debugger: Option<String>,
}

impl ProjectInfo {
  /// The per-project build description, `<dir>/<name>.bff`.
  pub fn bff_path(&self) -> PathBuf {
    self.dir.join(format!("{}.{BFF_EXTENSION}", self.name))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionInfo {
  pub dir: PathBuf,
  pub name: String,
}

impl SolutionInfo {
  /// The top-level build description, `<dir>/<name>.bff`.
  pub fn bff_path(&self) -> PathBuf {
    self.dir.join(format!("{}.{BFF_EXTENSION}", self.name))
  }

  pub fn launcher_path(&self, settings: &Settings) -> PathBuf {
    self.dir.join(&settings.launcher_script)
  }
}

pub trait ProjectMetadata {
  /// Look up a project by name.
  fn project(&self, name: &str, configuration: &str) -> Result<ProjectInfo, HostError>;

  /// The project that owns `file`.
  fn project_for_file(&self, file: &Path, configuration: &str) -> Result<ProjectInfo, HostError>;
}

pub trait SolutionMetadata {
  fn solution(&self) -> SolutionInfo;
}

/// Yes/no prompt shown before killing a build in progress.
pub trait Confirm: Send + Sync {
  fn confirm(&self, message: &str) -> bool;
}

/// Everything the engine needs from its host.
pub trait Host: ProjectMetadata + SolutionMetadata + Send + Sync {}

impl<T> Host for T where T: ProjectMetadata + SolutionMetadata + Send + Sync {}

/// A confirmation that always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
  fn confirm(&self, _message: &str) -> bool {
    self.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bff_paths_follow_names() {
    let project = ProjectInfo {
      name: "Engine".to_string(),
      dir: PathBuf::from("/sln/Engine"),
      build_command: String::new(),
      debugger: None,
    };
    assert_eq!(project.bff_path(), PathBuf::from("/sln/Engine/Engine.bff"));

    let solution = SolutionInfo {
      dir: PathBuf::from("/sln"),
      name: "Game".to_string(),
    };
    assert_eq!(solution.bff_path(), PathBuf::from("/sln/Game.bff"));
    assert_eq!(solution.launcher_path(&Settings::default()), PathBuf::from("/sln/FBuild.bat"));
  }

  #[test]
  fn error_messages_name_the_subject() {
    let err = HostError::NoBuildCommand {
      project: "Engine".to_string(),
      configuration: "Debug|x64".to_string(),
    };
    assert_eq!(
      err.to_string(),
      "project 'Engine' has no build command for configuration 'Debug|x64'"
    );
  }
}
