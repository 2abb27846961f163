//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{BuildOptions, CONFIG_FILE};

/// Kiln asset build orchestrator
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build every asset once and write the manifest
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Asset names to leave untouched
        #[arg(short, long, value_delimiter = ',')]
        skip: Vec<String>,
    },

    /// Build, then rebuild assets as their watched files change
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

/// Shared arguments for Build and Watch commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(long)]
    pub silent: bool,

    /// Write outputs without content hashes (overrides every asset)
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub skip_hash: Option<bool>,

    /// Build environment; `production` enables uglify and imagemin
    #[arg(short, long)]
    pub env: Option<String>,
}

impl Cli {
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args, .. } | Commands::Watch { build_args } => build_args,
        }
    }

    /// Apply command-line overrides on top of loaded options.
    pub fn apply(&self, options: &mut BuildOptions) {
        let args = self.build_args();
        if args.silent {
            options.silent = true;
        }
        if args.skip_hash.is_some() {
            options.skip_hash = args.skip_hash;
        }
        if let Some(env) = &args.env {
            options.env = env.clone();
        }
        if let Commands::Build { skip, .. } = &self.command {
            options.skip.extend(skip.iter().cloned());
        }
    }

    pub const fn is_watch(&self) -> bool {
        matches!(self.command, Commands::Watch { .. })
    }
}
