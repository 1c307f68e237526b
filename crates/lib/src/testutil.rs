//! Test utilities for fbtools-lib.
//!
//! [`Fixture`] lays out a small solution in a temporary directory:
//!
//! ```text
//! <root>/
//!   fbtools.toml      manifest with Engine, Game (launcher) and Tools (make)
//!   FBuild.bat        launcher naming bin/fbuild
//!   Game.bff          solution build description
//!   bin/fbuild        fake build executable echoing its arguments
//!   Engine/Engine.bff
//!   Engine/src/main.cpp
//!   Tools/tool.cpp
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use crate::engine::Engine;
use crate::host::Manifest;
use crate::lifecycle::FollowUp;

const MANIFEST: &str = r#"
[solution]
name = "Game"

[settings]
intermediate_segment = "/int/"
kill_grace_ms = 2000

[[projects]]
name = "Engine"
dir = "Engine"
[projects.build_commands]
"Debug|x64" = '"../FBuild.bat" Engine-Debug-x64'

[[projects]]
name = "Game"
dir = "Game"
debugger = "gdb ./bin/game"
[projects.build_commands]
"Debug|x64" = '"../FBuild.bat" -cache Game-Debug-x64'

[[projects]]
name = "Tools"
dir = "Tools"
[projects.build_commands]
"Debug|x64" = 'make tools'
"#;

const SOLUTION_BFF: &str = r#"// Game solution
#include "globalsettings.bff"
#include "Engine/Engine.bff"
#include "Game/Game.bff"

Alias( 'all' ) { .Targets = { 'Engine-Debug-x64', 'Game-Debug-x64' } }
"#;

const ENGINE_BFF: &str = r#"ObjectList( 'Engine-Debug-x64' )
{
    .Compiler = 'Clang'
    .CompilerInputPath = 'src/'
    .CompilerInputUnity = 'Engine-Unity'
    .CompilerOutputPath = .Intermediate
    .Intermediate = 'out/int/Engine/'
    .PreBuildDependencies = 'Copy_Engine_Assets'
}
"#;

/// Write `script` to `path` and make it executable.
pub fn write_executable(path: &Path, script: &str) {
  use std::os::unix::fs::PermissionsExt;

  fs::write(path, script).unwrap();
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// A follow-up that counts how often it ran.
pub fn counting_follow_up() -> (FollowUp, Arc<AtomicUsize>) {
  let count = Arc::new(AtomicUsize::new(0));
  let counter = count.clone();
  let follow_up = FollowUp::new("launch debugger", move || {
    counter.fetch_add(1, Ordering::SeqCst);
  });
  (follow_up, count)
}

pub struct Fixture {
  _temp: TempDir,
  root: PathBuf,
}

impl Fixture {
  /// A solution whose build executable succeeds.
  pub fn new() -> Self {
    Self::with_fbuild("exit 0")
  }

  /// A solution whose build executable echoes its arguments and then runs `body`.
  pub fn with_fbuild(body: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();

    for dir in ["bin", "Engine/src", "Game", "Tools"] {
      fs::create_dir_all(root.join(dir)).unwrap();
    }

    let fbuild = root.join("bin/fbuild");
    write_executable(&fbuild, &format!("#!/bin/sh\necho \"fbuild $*\"\n{body}\n"));
    fs::write(root.join("FBuild.bat"), format!("\"{}\" -summary %*\n", fbuild.display())).unwrap();

    fs::write(root.join("fbtools.toml"), MANIFEST).unwrap();
    fs::write(root.join("Game.bff"), SOLUTION_BFF).unwrap();
    fs::write(root.join("Engine/Engine.bff"), ENGINE_BFF).unwrap();
    fs::write(root.join("Engine/src/main.cpp"), "int main() { return 0; }\n").unwrap();
    fs::write(root.join("Tools/tool.cpp"), "").unwrap();

    Self { _temp: temp, root }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn fake_fbuild(&self) -> PathBuf {
    self.root.join("bin/fbuild")
  }

  pub fn source_file(&self) -> PathBuf {
    self.root.join("Engine/src/main.cpp")
  }

  pub fn tool_file(&self) -> PathBuf {
    self.root.join("Tools/tool.cpp")
  }

  pub fn manifest(&self) -> Manifest {
    Manifest::load(&self.root.join("fbtools.toml")).unwrap()
  }

  pub fn engine(&self) -> Engine<Manifest> {
    let manifest = self.manifest();
    let settings = manifest.settings().clone();
    Engine::new(manifest, settings)
  }
}
