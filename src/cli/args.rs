//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DEFAULT_MAX_CACHED_PATHS, ResolverOptions};

/// Sheaf script and stylesheet bundler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file paths, repeatable (default: sheaf.toml)
    #[arg(
        short = 'C',
        long,
        global = true,
        default_value = "sheaf.toml",
        value_hint = clap::ValueHint::FilePath
    )]
    pub config: Vec<PathBuf>,

    /// Maximum number of distinct paths each bundle resolves
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CACHED_PATHS)]
    pub max_cached_paths: usize,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build every bundle and write its compressed artifacts
    #[command(visible_alias = "b")]
    Build {
        /// Output directory
        #[arg(short, long, default_value = "dist", value_hint = clap::ValueHint::DirPath)]
        output: PathBuf,
    },

    /// Resolve one path and print its content
    #[command(visible_alias = "r")]
    Resolve {
        /// Root-relative path (`core/menu.js`, `core/core-<fingerprint>.js`)
        path: String,

        /// Print resource metadata instead of its bytes
        #[arg(short, long)]
        info: bool,
    },

    /// Print collection summaries as JSON
    #[command(visible_alias = "l")]
    List {
        /// Only this bundle
        bundle: Option<String>,
    },

    /// Build, then rebuild whenever a source or config file changes
    #[command(visible_alias = "w")]
    Watch {
        /// Output directory
        #[arg(short, long, default_value = "dist", value_hint = clap::ValueHint::DirPath)]
        output: PathBuf,
    },
}

impl Cli {
    pub const fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            max_cached_paths: self.max_cached_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sheaf", "build"]);
        assert_eq!(cli.config, [PathBuf::from("sheaf.toml")]);
        assert_eq!(cli.max_cached_paths, DEFAULT_MAX_CACHED_PATHS);
        assert!(matches!(cli.command, Commands::Build { ref output } if output == &PathBuf::from("dist")));
    }

    #[test]
    fn test_repeated_config() {
        let cli = Cli::parse_from([
            "sheaf", "-C", "a.toml", "--config", "b.json", "--max-cached-paths", "5", "list", "core",
        ]);
        assert_eq!(cli.config, [PathBuf::from("a.toml"), PathBuf::from("b.json")]);
        assert_eq!(cli.resolver_options().max_cached_paths, 5);
        assert!(matches!(cli.command, Commands::List { bundle: Some(ref b) } if b == "core"));
    }

    #[test]
    fn test_resolve_info() {
        let cli = Cli::parse_from(["sheaf", "resolve", "core/a.js", "--info"]);
        assert!(matches!(cli.command, Commands::Resolve { ref path, info: true } if path == "core/a.js"));
    }
}
