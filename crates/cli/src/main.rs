mod cmd;
mod output;
mod sink;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fbtools_lib::consts::{DEFAULT_CONFIGURATION, MANIFEST_FILENAME};

use crate::output::OutputFormat;

/// fbt - Single-file compilation and build coordination for FASTBuild solutions
#[derive(Parser)]
#[command(name = "fbt")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the host manifest
  #[arg(short, long, global = true, default_value = MANIFEST_FILENAME)]
  manifest: PathBuf,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a single source file through its project's target
  Compile {
    /// Source file to compile
    file: PathBuf,

    /// Build configuration, as `<configuration>|<platform>`
    #[arg(short, long, default_value = DEFAULT_CONFIGURATION)]
    config: String,
  },

  /// Build several projects in one invocation
  Build {
    /// Projects to build
    #[arg(required = true)]
    projects: Vec<String>,

    /// Build configuration, as `<configuration>|<platform>`
    #[arg(short, long, default_value = DEFAULT_CONFIGURATION)]
    config: String,

    /// Rebuild everything
    #[arg(long)]
    clean: bool,
  },

  /// Build a project, then start its debugger if the build succeeded
  Debug {
    /// Project to build and debug
    project: String,

    /// Build configuration, as `<configuration>|<platform>`
    #[arg(short, long, default_value = DEFAULT_CONFIGURATION)]
    config: String,
  },

  /// Write the single-file config for a source file without building
  Synth {
    /// Source file to synthesize a config for
    file: PathBuf,

    /// Build configuration, as `<configuration>|<platform>`
    #[arg(short, long, default_value = DEFAULT_CONFIGURATION)]
    config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  // Log to stderr so build output on stdout stays clean
  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Compile { file, config } => cmd::cmd_compile(&cli.manifest, &file, &config),
    Commands::Build {
      projects,
      config,
      clean,
    } => cmd::cmd_build(&cli.manifest, &projects, &config, clean),
    Commands::Debug { project, config } => cmd::cmd_debug(&cli.manifest, &project, &config),
    Commands::Synth { file, config, format } => cmd::cmd_synth(&cli.manifest, &file, &config, format),
  }
}
