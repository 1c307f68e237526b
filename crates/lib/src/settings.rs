//! Tunable names and limits used by the single-file engine.
//!
//! Every reserved literal the engine relies on lives here with its conventional
//! default, so a solution with unusual naming can override it from the
//! `[settings]` table of the host manifest.
//!
//! # Example
//!
//! ```toml
//! [settings]
//! global_include = "shared/globals.bff"
//! kill_grace_ms = 5000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
  /// Reserved name of the synthesized target. Also used as the extra
  /// intermediate directory segment.
  pub single_file_target: String,

  /// File name of the transient config, written beside the solution bff.
  pub transient_config: String,

  /// The one `#include` kept when filtering the solution document.
  pub global_include: String,

  /// Launcher script in the solution directory whose first quoted token is
  /// the build executable.
  pub launcher_script: String,

  /// Substring identifying a build command line that goes through the launcher.
  pub launcher_marker: String,

  /// Field marking aggregated compilation units.
  pub unity_field: String,

  /// Substring identifying post-build copy step references.
  pub copy_step_marker: String,

  /// Field prefix of intermediate output directories.
  pub intermediate_field: String,

  /// Path segment under which intermediate output lives, separators included.
  pub intermediate_segment: String,

  /// Token standing for the directory of the bff that declares a path.
  pub current_dir_placeholder: String,

  /// How long `kill` waits for a terminated process before releasing it.
  pub kill_grace_ms: u64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      single_file_target: "CompileSingleFile".to_string(),
      transient_config: "CompileSingleFile.bff".to_string(),
      global_include: "globalsettings.bff".to_string(),
      launcher_script: "FBuild.bat".to_string(),
      launcher_marker: "FBuild".to_string(),
      unity_field: ".CompilerInputUnity".to_string(),
      copy_step_marker: "'Copy_".to_string(),
      intermediate_field: ".Intermediate".to_string(),
      intermediate_segment: "\\int\\".to_string(),
      current_dir_placeholder: "\\$_CURRENT_BFF_DIR_$".to_string(),
      kill_grace_ms: 3000,
    }
  }
}

impl Settings {
  pub fn kill_grace(&self) -> Duration {
    Duration::from_millis(self.kill_grace_ms)
  }

  /// Directory separator used by path values, taken from the intermediate segment.
  pub fn path_separator(&self) -> char {
    self.intermediate_segment.chars().last().unwrap_or('\\')
  }

  /// The `\<target>\` segment identifying single-file output.
  pub fn channel_segment(&self) -> String {
    let sep = self.path_separator();
    format!("{sep}{}{sep}", self.single_file_target)
  }

  /// Replacement for `intermediate_segment` inside intermediate path fields.
  pub fn channel_intermediate_segment(&self) -> String {
    format!("{}{}{}", self.intermediate_segment, self.single_file_target, self.path_separator())
  }
}
